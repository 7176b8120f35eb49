mod common;

use std::sync::Arc;

use smc_core::SmcError;
use smc_engine::{ConstraintSpec, FnPotential, SmcEngine};

use common::{config, endless_model};

fn short_sequences_only() -> ConstraintSpec {
    ConstraintSpec::new()
        .with(FnPotential::batch("short-only", |seq| {
            Ok(if seq.len() > 3 { 0.0 } else { 1.0 })
        }))
        .unwrap()
}

#[test]
fn batch_potential_killing_everyone_surfaces_degeneracy() {
    let engine = SmcEngine::new(Arc::new(endless_model()));
    let err = engine
        .run("", &short_sequences_only(), &config(8, 20, 3))
        .unwrap_err();
    assert!(matches!(err, SmcError::DegenerateParticleSet(_)), "{err}");
    let info = err.info();
    assert_eq!(info.code, "all-particles-dead");
    assert_eq!(info.context.get("step").map(String::as_str), Some("4"));
    assert_eq!(info.context.get("surviving").map(String::as_str), Some("0"));
    assert!(info.hint.is_some());
}

#[test]
fn checkpoint_interval_delays_detection_to_the_next_checkpoint() {
    let engine = SmcEngine::new(Arc::new(endless_model()));
    let mut config = config(8, 20, 3);
    config.checkpoint_interval = 5;
    let err = engine.run("", &short_sequences_only(), &config).unwrap_err();
    assert_eq!(err.info().context.get("step").map(String::as_str), Some("5"));
}

#[test]
fn forbidden_empty_prefix_fails_before_the_first_step() {
    let potentials = ConstraintSpec::new()
        .with(FnPotential::incremental("nothing", |_| Ok(0.0)))
        .unwrap();
    let engine = SmcEngine::new(Arc::new(endless_model()));
    let err = engine.run("", &potentials, &config(4, 10, 1)).unwrap_err();
    assert!(matches!(err, SmcError::DegenerateParticleSet(_)));
    assert_eq!(err.info().context.get("step").map(String::as_str), Some("0"));
    assert_eq!(
        err.info().context.get("potential").map(String::as_str),
        Some("nothing")
    );
}

#[test]
fn exhausted_proposal_masks_kill_every_particle() {
    let potentials = ConstraintSpec::new()
        .with(FnPotential::incremental("empty-only", |seq| {
            Ok(if seq.is_empty() { 1.0 } else { 0.0 })
        }))
        .unwrap();
    let engine = SmcEngine::new(Arc::new(endless_model()));
    let err = engine.run("", &potentials, &config(4, 10, 1)).unwrap_err();
    assert!(matches!(err, SmcError::DegenerateParticleSet(_)));
    assert_eq!(err.info().context.get("step").map(String::as_str), Some("1"));
}

#[test]
fn partial_kills_are_attributed_to_the_potential() {
    let engine = SmcEngine::new(Arc::new(endless_model()));
    let potentials = ConstraintSpec::new()
        .with(FnPotential::batch("no-leading-a", |seq| {
            Ok(if seq.first() == Some(&common::A) { 0.0 } else { 1.0 })
        }))
        .unwrap();
    let result = engine.run("", &potentials, &config(32, 4, 9)).unwrap();
    for particle in &result.particles {
        assert_ne!(particle.tokens.first(), Some(&common::A));
    }
    let kills = result.trace.kills_by_potential["no-leading-a"];
    assert_eq!(kills, result.trace.summary().total_killed);
}

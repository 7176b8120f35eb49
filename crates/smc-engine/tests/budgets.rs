mod common;

use std::sync::Arc;
use std::time::Duration;

use smc_engine::{BudgetKind, ConstraintSpec, SmcEngine, Termination};

use common::{config, endless_model};

#[test]
fn wall_time_budget_returns_partial_sequences() {
    let model = endless_model().with_latency(Duration::from_millis(5));
    let mut config = config(4, 1000, 17);
    config.max_wall_time_ms = Some(50);
    let result = SmcEngine::new(Arc::new(model))
        .run("", &ConstraintSpec::new(), &config)
        .unwrap();

    assert_eq!(
        result.termination,
        Termination::BudgetExceeded {
            budget: BudgetKind::WallTime
        }
    );
    assert!(result.is_partial());
    assert!(result.steps < 1000);
    for particle in &result.particles {
        assert!(particle.tokens.len() < 1000);
        assert!(!particle.terminal);
    }
    let total: f64 = result.particles.iter().map(|p| p.weight).sum();
    assert!((total - 1.0).abs() < 1e-6);
}

#[test]
fn step_budget_stops_after_the_requested_steps() {
    let mut config = config(6, 50, 2);
    config.max_steps = Some(3);
    let result = SmcEngine::new(Arc::new(endless_model()))
        .run("", &ConstraintSpec::new(), &config)
        .unwrap();
    assert_eq!(
        result.termination,
        Termination::BudgetExceeded {
            budget: BudgetKind::Steps
        }
    );
    assert_eq!(result.steps, 3);
    assert_eq!(result.trace.steps.len(), 3);
    assert!(result.particles.iter().all(|p| p.tokens.len() == 3));
}

#[test]
fn max_tokens_completes_the_run() {
    let result = SmcEngine::new(Arc::new(endless_model()))
        .run("", &ConstraintSpec::new(), &config(5, 7, 8))
        .unwrap();
    assert_eq!(result.termination, Termination::Completed);
    assert!(!result.is_partial());
    assert_eq!(result.steps, 7);
    assert!(result
        .particles
        .iter()
        .all(|p| p.terminal && p.tokens.len() == 7));
}

#[test]
fn each_step_extends_active_particles_by_one_token() {
    let model = Arc::new(common::char_model());
    let engine = SmcEngine::new(model);
    for k in 1..=8 {
        let mut config = config(16, 20, 31);
        config.max_steps = Some(k);
        let result = engine.run("", &ConstraintSpec::new(), &config).unwrap();
        assert_eq!(result.steps, k);
        for particle in &result.particles {
            if particle.terminal {
                assert!(particle.tokens.len() <= k);
                assert_eq!(particle.tokens.last(), Some(&common::EOS));
            } else {
                assert_eq!(particle.tokens.len(), k, "step budget {k}");
            }
        }
    }
}

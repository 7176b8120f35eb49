use std::fs;

use smc_core::SmcError;
use smc_engine::{EngineConfig, SelectionMode};
use tempfile::tempdir;

#[test]
fn defaults_are_valid() {
    let config = EngineConfig::default();
    config.validate().unwrap();
    assert_eq!(config.selection_mode, SelectionMode::Sample);
    assert!(config.proposal_masking);
    assert!(config.max_wall_time().is_none());
}

#[test]
fn yaml_round_trip_through_a_file() {
    let mut config = EngineConfig::default();
    config.num_particles = 50;
    config.max_tokens = 20;
    config.max_wall_time_ms = Some(1500);
    config.selection_mode = SelectionMode::Argmax;
    config.seed_policy.label = Some("nightly".into());

    let dir = tempdir().unwrap();
    let path = dir.path().join("engine.yaml");
    fs::write(&path, config.to_yaml_string().unwrap()).unwrap();
    let loaded = EngineConfig::load(&path).unwrap();
    assert_eq!(loaded, config);
    assert_eq!(loaded.max_wall_time().unwrap().as_millis(), 1500);
}

#[test]
fn partial_yaml_fills_defaults() {
    let config = EngineConfig::from_yaml_str(
        "num_particles: 8\nselection_mode: argmax\nretry:\n  max_attempts: 5\n",
    )
    .unwrap();
    assert_eq!(config.num_particles, 8);
    assert_eq!(config.selection_mode, SelectionMode::Argmax);
    assert_eq!(config.retry.max_attempts, 5);
    assert_eq!(config.retry.base_delay_ms, EngineConfig::default().retry.base_delay_ms);
    assert_eq!(config.max_tokens, EngineConfig::default().max_tokens);
}

#[test]
fn invalid_values_are_rejected() {
    for yaml in [
        "num_particles: 0\n",
        "max_tokens: 0\n",
        "resample_threshold: 0.0\n",
        "resample_threshold: 1.5\n",
        "checkpoint_interval: 0\n",
    ] {
        let err = EngineConfig::from_yaml_str(yaml).unwrap_err();
        assert!(matches!(err, SmcError::Config(_)), "{yaml}: {err}");
        assert!(err.info().context.contains_key("field"), "{yaml}");
    }
}

#[test]
fn malformed_yaml_is_a_serde_error() {
    let err = EngineConfig::from_yaml_str("num_particles: [").unwrap_err();
    assert!(matches!(err, SmcError::Serde(_)));
}

#[test]
fn missing_file_is_reported() {
    let dir = tempdir().unwrap();
    let err = EngineConfig::load(&dir.path().join("absent.yaml")).unwrap_err();
    assert!(err.info().context.contains_key("path"));
}

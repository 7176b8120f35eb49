use smc_core::errors::{ErrorInfo, SmcError};

fn sample_info(code: &str, message: &str) -> ErrorInfo {
    ErrorInfo::new(code, message)
        .with_context("step", 4)
        .with_context("reason", "example")
}

#[test]
fn config_error_surface() {
    let err = SmcError::Config(sample_info("C001", "num_particles must be positive"));
    assert_eq!(err.info().code, "C001");
    assert!(err.info().context.contains_key("step"));
    assert!(!err.is_retryable());
}

#[test]
fn model_error_is_retryable() {
    let err = SmcError::Model(sample_info("M001", "endpoint unavailable"));
    assert!(err.is_retryable());
    assert_eq!(err.info().context.get("step").map(String::as_str), Some("4"));
}

#[test]
fn degenerate_error_surface() {
    let err = SmcError::DegenerateParticleSet(sample_info("D001", "all particles dead"))
        .with_context("num_particles", 50);
    assert_eq!(err.info().code, "D001");
    assert_eq!(
        err.info().context.get("num_particles").map(String::as_str),
        Some("50")
    );
}

#[test]
fn display_includes_context_and_hint() {
    let err = SmcError::Potential(
        ErrorInfo::new("negative-score", "potential returned -1")
            .with_context("potential", "regex")
            .with_hint("scores must be >= 0"),
    );
    let rendered = err.to_string();
    assert!(rendered.starts_with("potential error: potential returned -1"));
    assert!(rendered.contains("potential=regex"));
    assert!(rendered.contains("hint: scores must be >= 0"));
}

#[test]
fn errors_serialize_with_family_tag() {
    let err = SmcError::Cancelled(ErrorInfo::new("cancelled", "caller cancelled"));
    let json = serde_json::to_value(&err).unwrap();
    assert_eq!(json["family"], "Cancelled");
    let back: SmcError = serde_json::from_value(json).unwrap();
    assert_eq!(back, err);
}

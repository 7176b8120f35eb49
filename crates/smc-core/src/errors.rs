//! Structured error types shared across SMC crates.

use std::collections::BTreeMap;
use std::fmt::{self, Display};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Structured payload attached to every [`SmcError`] variant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorInfo {
    /// Stable machine readable error code.
    pub code: String,
    /// Human readable diagnostic message.
    pub message: String,
    /// Contextual key value pairs (step number, surviving particles, etc.).
    #[serde(default)]
    pub context: BTreeMap<String, String>,
    /// Optional hint that may help the caller resolve the issue.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

impl ErrorInfo {
    /// Creates a new error payload with the provided code and message.
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            context: BTreeMap::new(),
            hint: None,
        }
    }

    /// Adds a context entry to the payload.
    pub fn with_context(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.context.insert(key.into(), value.to_string());
        self
    }

    /// Sets a human readable hint for remediation.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

/// Canonical error type for the SMC engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[serde(tag = "family", content = "detail")]
pub enum SmcError {
    /// Invalid engine configuration or constraint registration.
    #[error("config error: {0}")]
    Config(ErrorInfo),
    /// Model inference failed (retryable until the retry budget is spent).
    #[error("model inference error: {0}")]
    Model(ErrorInfo),
    /// A potential broke its contract (negative or NaN score) or failed internally.
    #[error("potential error: {0}")]
    Potential(ErrorInfo),
    /// Every particle reached zero weight at the same time.
    #[error("degenerate particle set: {0}")]
    DegenerateParticleSet(ErrorInfo),
    /// The caller cancelled the run between steps.
    #[error("cancelled: {0}")]
    Cancelled(ErrorInfo),
    /// Randomness and seeding errors.
    #[error("rng error: {0}")]
    Rng(ErrorInfo),
    /// Serialization and schema errors.
    #[error("serde error: {0}")]
    Serde(ErrorInfo),
}

impl Display for ErrorInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (code: {})", self.message, self.code)?;
        if !self.context.is_empty() {
            write!(f, " | context: [")?;
            for (idx, (key, value)) in self.context.iter().enumerate() {
                if idx > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{key}={value}")?;
            }
            write!(f, "]")?;
        }
        if let Some(hint) = &self.hint {
            write!(f, " | hint: {hint}")?;
        }
        Ok(())
    }
}

impl SmcError {
    /// Returns a reference to the payload describing the error.
    pub fn info(&self) -> &ErrorInfo {
        match self {
            SmcError::Config(info)
            | SmcError::Model(info)
            | SmcError::Potential(info)
            | SmcError::DegenerateParticleSet(info)
            | SmcError::Cancelled(info)
            | SmcError::Rng(info)
            | SmcError::Serde(info) => info,
        }
    }

    /// Returns a copy of the error with an extra context entry.
    pub fn with_context(self, key: impl Into<String>, value: impl ToString) -> Self {
        match self {
            SmcError::Config(info) => SmcError::Config(info.with_context(key, value)),
            SmcError::Model(info) => SmcError::Model(info.with_context(key, value)),
            SmcError::Potential(info) => SmcError::Potential(info.with_context(key, value)),
            SmcError::DegenerateParticleSet(info) => {
                SmcError::DegenerateParticleSet(info.with_context(key, value))
            }
            SmcError::Cancelled(info) => SmcError::Cancelled(info.with_context(key, value)),
            SmcError::Rng(info) => SmcError::Rng(info.with_context(key, value)),
            SmcError::Serde(info) => SmcError::Serde(info.with_context(key, value)),
        }
    }

    /// Whether the failure is transient and the call may be retried.
    pub fn is_retryable(&self) -> bool {
        matches!(self, SmcError::Model(_))
    }
}

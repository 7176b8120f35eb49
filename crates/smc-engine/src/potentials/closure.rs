use std::sync::Arc;

use smc_core::{CostClass, Potential, SmcError, TokenId};

type ScoreFn = Arc<dyn Fn(&[TokenId]) -> Result<f64, SmcError> + Send + Sync>;

/// Potential backed by caller-supplied scoring closures.
///
/// This is the usual way to plug in external verifiers as batch potentials.
#[derive(Clone)]
pub struct FnPotential {
    name: String,
    cost_class: CostClass,
    prefix: ScoreFn,
    complete: Option<ScoreFn>,
}

impl std::fmt::Debug for FnPotential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnPotential")
            .field("name", &self.name)
            .field("cost_class", &self.cost_class)
            .finish_non_exhaustive()
    }
}

impl FnPotential {
    /// Creates a potential of the given cost class.
    pub fn new<F>(name: impl Into<String>, cost_class: CostClass, score: F) -> Self
    where
        F: Fn(&[TokenId]) -> Result<f64, SmcError> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            cost_class,
            prefix: Arc::new(score),
            complete: None,
        }
    }

    /// Shorthand for an incremental potential.
    pub fn incremental<F>(name: impl Into<String>, score: F) -> Self
    where
        F: Fn(&[TokenId]) -> Result<f64, SmcError> + Send + Sync + 'static,
    {
        Self::new(name, CostClass::Incremental, score)
    }

    /// Shorthand for a batch potential.
    pub fn batch<F>(name: impl Into<String>, score: F) -> Self
    where
        F: Fn(&[TokenId]) -> Result<f64, SmcError> + Send + Sync + 'static,
    {
        Self::new(name, CostClass::Batch, score)
    }

    /// Uses a different closure to score finished sequences.
    pub fn with_complete<F>(mut self, score: F) -> Self
    where
        F: Fn(&[TokenId]) -> Result<f64, SmcError> + Send + Sync + 'static,
    {
        self.complete = Some(Arc::new(score));
        self
    }
}

impl Potential for FnPotential {
    fn name(&self) -> &str {
        &self.name
    }

    fn cost_class(&self) -> CostClass {
        self.cost_class
    }

    fn evaluate(&self, sequence: &[TokenId]) -> Result<f64, SmcError> {
        (self.prefix)(sequence)
    }

    fn evaluate_complete(&self, sequence: &[TokenId]) -> Result<f64, SmcError> {
        match &self.complete {
            Some(complete) => complete(sequence),
            None => (self.prefix)(sequence),
        }
    }
}

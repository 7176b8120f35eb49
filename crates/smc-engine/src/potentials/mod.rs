//! Constraint registration and the scoring boundary.
//!
//! Every score produced by a [`Potential`] passes through [`log_score`], which
//! enforces the non-negativity contract and converts internal potential
//! failures into a zero score for the affected particle.

mod closure;
mod regex;
mod token_ban;

use std::sync::Arc;

use indexmap::IndexMap;
use smc_core::errors::ErrorInfo;
use smc_core::{CostClass, Potential, SmcError, TokenId};
use tracing::warn;

pub use closure::FnPotential;
pub use regex::RegexPotential;
pub use token_ban::TokenBanPotential;

/// Ordered product-of-experts collection of potentials.
#[derive(Clone, Default)]
pub struct ConstraintSpec {
    potentials: IndexMap<String, Arc<dyn Potential>>,
}

impl std::fmt::Debug for ConstraintSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConstraintSpec")
            .field("potentials", &self.names().collect::<Vec<_>>())
            .finish()
    }
}

impl ConstraintSpec {
    /// Creates an empty specification (the unconstrained base model).
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style registration; rejects duplicate names.
    pub fn with<P: Potential + 'static>(mut self, potential: P) -> Result<Self, SmcError> {
        self.push(Arc::new(potential))?;
        Ok(self)
    }

    /// Registers a shared potential; rejects duplicate names.
    pub fn push(&mut self, potential: Arc<dyn Potential>) -> Result<(), SmcError> {
        let name = potential.name().to_string();
        if self.potentials.contains_key(&name) {
            return Err(SmcError::Config(
                ErrorInfo::new("duplicate-potential", "potential names must be unique")
                    .with_context("potential", name),
            ));
        }
        self.potentials.insert(name, potential);
        Ok(())
    }

    /// Number of registered potentials.
    pub fn len(&self) -> usize {
        self.potentials.len()
    }

    /// Whether no potential is registered.
    pub fn is_empty(&self) -> bool {
        self.potentials.is_empty()
    }

    /// Potential names in registration order.
    pub fn names(&self) -> impl Iterator<Item = &str> + '_ {
        self.potentials.keys().map(String::as_str)
    }

    /// Looks up a potential by name.
    pub fn get(&self, name: &str) -> Option<&Arc<dyn Potential>> {
        self.potentials.get(name)
    }

    /// Potentials checked every step, in registration order.
    pub fn incremental(&self) -> Vec<Arc<dyn Potential>> {
        self.of_class(CostClass::Incremental)
    }

    /// Potentials checked at checkpoints, in registration order.
    pub fn batch(&self) -> Vec<Arc<dyn Potential>> {
        self.of_class(CostClass::Batch)
    }

    fn of_class(&self, class: CostClass) -> Vec<Arc<dyn Potential>> {
        self.potentials
            .values()
            .filter(|potential| potential.cost_class() == class)
            .cloned()
            .collect()
    }
}

/// Evaluates `potential` and returns the natural log of its score.
///
/// Negative, NaN or infinite scores are contract violations and surface as
/// [`SmcError::Potential`]. Any error returned by the potential itself is
/// logged and treated as a zero score (`-inf`).
pub fn log_score(
    potential: &dyn Potential,
    sequence: &[TokenId],
    complete: bool,
) -> Result<f64, SmcError> {
    let outcome = if complete {
        potential.evaluate_complete(sequence)
    } else {
        potential.evaluate(sequence)
    };
    match outcome {
        Ok(score) if score.is_nan() || score < 0.0 || score.is_infinite() => {
            Err(SmcError::Potential(
                ErrorInfo::new(
                    "invalid-score",
                    "potential returned a negative or non-finite score",
                )
                .with_context("potential", potential.name())
                .with_context("score", score)
                .with_context("sequence_len", sequence.len())
                .with_hint("potential scores must be finite and >= 0"),
            ))
        }
        Ok(score) if score == 0.0 => Ok(f64::NEG_INFINITY),
        Ok(score) => Ok(score.ln()),
        Err(err) => {
            warn!(
                potential = potential.name(),
                sequence_len = sequence.len(),
                error = %err,
                "potential evaluation failed; treating as zero score"
            );
            Ok(f64::NEG_INFINITY)
        }
    }
}

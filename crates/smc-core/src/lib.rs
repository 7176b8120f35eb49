#![deny(missing_docs)]
#![doc = "Core traits and data types for the constrained SMC generation engine."]

use serde::{Deserialize, Serialize};

pub mod errors;
pub mod rng;
mod types;

pub use errors::{ErrorInfo, SmcError};
pub use rng::{derive_substream_seed, RngHandle};
pub use types::{Distribution, TokenId, Vocabulary};

/// Black-box language model consumed by the sampler.
///
/// Implementations map a partial sequence (plus the caller's context string)
/// to a distribution over the next token. Calls may fail transiently; the
/// engine retries errors for which [`SmcError::is_retryable`] holds.
pub trait LanguageModel: Send + Sync {
    /// Returns the next-token distribution for a single partial sequence.
    fn next_token_distribution(
        &self,
        sequence: &[TokenId],
        context: &str,
    ) -> Result<Distribution, SmcError>;

    /// Returns next-token distributions for several sequences of equal length.
    ///
    /// Providers that can run one forward pass over a batch override this
    /// together with [`LanguageModel::supports_batching`].
    fn next_token_distributions(
        &self,
        sequences: &[&[TokenId]],
        context: &str,
    ) -> Result<Vec<Distribution>, SmcError> {
        sequences
            .iter()
            .map(|sequence| self.next_token_distribution(sequence, context))
            .collect()
    }

    /// Whether [`LanguageModel::next_token_distributions`] is a real batched call.
    fn supports_batching(&self) -> bool {
        false
    }

    /// Token that ends a sequence, if the model has one.
    fn eos_token(&self) -> Option<TokenId> {
        None
    }
}

/// How often a potential is evaluated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CostClass {
    /// Cheap check applied to every extension step.
    Incremental,
    /// Expensive check applied at checkpoints and on termination only.
    Batch,
}

/// Non-negative scoring function over token sequences.
///
/// Scores must be pure functions of the sequence. Zero marks a sequence as
/// forbidden; negative or NaN scores are contract violations.
pub trait Potential: Send + Sync {
    /// Stable name used in logs, traces and registration.
    fn name(&self) -> &str;

    /// Evaluation frequency of this potential.
    fn cost_class(&self) -> CostClass;

    /// Scores a prefix that may still be extended.
    fn evaluate(&self, sequence: &[TokenId]) -> Result<f64, SmcError>;

    /// Scores a finished sequence (end token emitted or length limit reached).
    fn evaluate_complete(&self, sequence: &[TokenId]) -> Result<f64, SmcError> {
        self.evaluate(sequence)
    }
}

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use smc_core::{Distribution, LanguageModel, SmcError, TokenId};

/// Context-free model that returns the same distribution at every position.
///
/// Useful as a baseline provider, for benchmarks and for exercising the
/// engine without a real network.
#[derive(Debug)]
pub struct UnigramModel {
    distribution: Distribution,
    eos: Option<TokenId>,
    latency: Option<Duration>,
    batching: bool,
    calls: AtomicUsize,
}

impl UnigramModel {
    /// Creates a provider that always returns `distribution`.
    pub fn new(distribution: Distribution) -> Self {
        Self {
            distribution,
            eos: None,
            latency: None,
            batching: false,
            calls: AtomicUsize::new(0),
        }
    }

    /// Declares the end-of-sequence token.
    pub fn with_eos(mut self, eos: TokenId) -> Self {
        self.eos = Some(eos);
        self
    }

    /// Sleeps for `latency` on every provider call.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Advertises batched calls.
    pub fn with_batching(mut self, batching: bool) -> Self {
        self.batching = batching;
        self
    }

    /// Number of provider calls served so far (a batch counts once).
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::Relaxed)
    }

    fn serve(&self) {
        self.calls.fetch_add(1, Ordering::Relaxed);
        if let Some(latency) = self.latency {
            std::thread::sleep(latency);
        }
    }
}

impl LanguageModel for UnigramModel {
    fn next_token_distribution(
        &self,
        _sequence: &[TokenId],
        _context: &str,
    ) -> Result<Distribution, SmcError> {
        self.serve();
        Ok(self.distribution.clone())
    }

    fn next_token_distributions(
        &self,
        sequences: &[&[TokenId]],
        _context: &str,
    ) -> Result<Vec<Distribution>, SmcError> {
        self.serve();
        Ok(vec![self.distribution.clone(); sequences.len()])
    }

    fn supports_batching(&self) -> bool {
        self.batching
    }

    fn eos_token(&self) -> Option<TokenId> {
        self.eos
    }
}

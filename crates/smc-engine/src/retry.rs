use std::time::Duration;

use smc_core::SmcError;
use tracing::warn;

use crate::config::RetryPolicy;

/// Delay slept after the `attempt`-th failed call (1-based).
pub fn backoff_delay(policy: &RetryPolicy, attempt: u32) -> Duration {
    let factor = 1u64.checked_shl(attempt.saturating_sub(1)).unwrap_or(u64::MAX);
    let millis = policy
        .base_delay_ms
        .saturating_mul(factor)
        .min(policy.max_delay_ms);
    Duration::from_millis(millis)
}

/// Runs `call` until it succeeds, fails with a non-retryable error, or the
/// policy's attempt budget is spent.
pub fn call_with_retry<T, F>(policy: &RetryPolicy, operation: &str, mut call: F) -> Result<T, SmcError>
where
    F: FnMut() -> Result<T, SmcError>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 0u32;
    loop {
        attempt += 1;
        match call() {
            Ok(value) => return Ok(value),
            Err(err) if err.is_retryable() && attempt < max_attempts => {
                let delay = backoff_delay(policy, attempt);
                warn!(
                    operation,
                    attempt,
                    max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "retrying after transient failure"
                );
                std::thread::sleep(delay);
            }
            Err(err) => {
                return Err(err
                    .with_context("operation", operation)
                    .with_context("attempts", attempt))
            }
        }
    }
}

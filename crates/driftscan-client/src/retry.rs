//! Retry policy for resource fetches.

use std::future::Future;

use driftscan_core::RetryConfig;
use tracing::debug;

use crate::error::TransportError;

/// Result of running an operation under a [`RetryPolicy`].
#[derive(Debug)]
pub enum RetryOutcome<T> {
    /// The operation succeeded.
    Success(T),
    /// Every attempt failed with a transient error; holds the last one.
    Exhausted(TransportError),
    /// An attempt failed with a non-transient error.
    Failed(TransportError),
}

/// Bounded retries with growing per-attempt deadlines and doubling backoff.
#[derive(Debug, Clone, Default)]
pub struct RetryPolicy {
    config: RetryConfig,
}

impl RetryPolicy {
    /// Create a policy from configuration.
    #[must_use]
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    /// The underlying configuration.
    #[must_use]
    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// Run `operation` until it succeeds, fails permanently, or runs out of
    /// attempts.
    ///
    /// Each attempt runs under its own deadline; a deadline miss counts as a
    /// transient [`TransportError::Timeout`].
    pub async fn execute<T, F, Fut>(&self, label: &str, mut operation: F) -> RetryOutcome<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, TransportError>>,
    {
        let max_attempts = self.config.max_attempts.max(1);
        let mut backoff = self.config.initial_backoff();
        let mut attempt = 0;

        loop {
            let deadline = self.config.attempt_timeout(attempt);
            let result = match tokio::time::timeout(deadline, operation()).await {
                Ok(result) => result,
                Err(_) => Err(TransportError::Timeout(deadline)),
            };

            let err = match result {
                Ok(value) => return RetryOutcome::Success(value),
                Err(err) if !err.is_transient() => return RetryOutcome::Failed(err),
                Err(err) => err,
            };

            attempt += 1;
            if attempt >= max_attempts {
                return RetryOutcome::Exhausted(err);
            }

            debug!(
                operation = %label,
                attempt,
                backoff_ms = u64::try_from(backoff.as_millis()).unwrap_or(u64::MAX),
                error = %err,
                "Transient failure, retrying"
            );
            tokio::time::sleep(backoff).await;
            backoff = backoff.saturating_mul(2);
        }
    }
}

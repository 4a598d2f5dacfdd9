//! Bounded retry with exponential backoff for transport failures

use std::future::Future;
use std::time::Duration;

use providers::AdapterResult;
use rand::Rng;
use shared::{component_debug, logging::ComponentId};
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub max_retries: u32,
    pub base_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_backoff: Duration::from_millis(500),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32, base_backoff: Duration) -> Self {
        Self { max_retries, base_backoff }
    }

    /// No retries at all
    pub fn none() -> Self {
        Self::new(0, Duration::ZERO)
    }

    /// `base * 2^attempt` plus up to half a base of random jitter
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exponential = self.base_backoff.saturating_mul(1u32 << attempt.min(16));
        let jitter_ceiling = self.base_backoff.as_millis() as u64 / 2;
        let jitter = if jitter_ceiling == 0 {
            0
        } else {
            rand::thread_rng().gen_range(0..=jitter_ceiling)
        };
        exponential + Duration::from_millis(jitter)
    }

    /// Delay before the next attempt, or `None` when the error is final
    pub fn should_retry(&self, retryable: bool, attempt: u32) -> Option<Duration> {
        if retryable && attempt < self.max_retries {
            Some(self.backoff(attempt))
        } else {
            None
        }
    }

    /// Run `operation` until it succeeds, fails terminally or retries run out.
    ///
    /// Cancellation during a backoff returns the last error immediately.
    pub async fn run<T, F, Fut>(&self, cancel: &CancellationToken, label: &str, mut operation: F) -> AdapterResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = AdapterResult<T>>,
    {
        let mut attempt = 0;
        loop {
            let err = match operation().await {
                Ok(value) => return Ok(value),
                Err(err) => err,
            };

            let Some(delay) = self.should_retry(err.is_retryable(), attempt) else {
                return Err(err);
            };

            component_debug!(
                ComponentId::Orchestrator,
                operation = label,
                attempt = attempt + 1,
                delay_ms = delay.as_millis() as u64,
                error = %err,
                "Retrying after transport failure"
            );

            tokio::select! {
                _ = cancel.cancelled() => return Err(err),
                _ = tokio::time::sleep(delay) => {}
            }
            attempt += 1;
        }
    }
}

//! Bounded retry with exponential backoff

use std::future::Future;
use std::time::Duration;
use tracing::warn;

use crate::config::NarratorConfig;
use crate::error::Error;

const MAX_BACKOFF: Duration = Duration::from_secs(8);

/// How often and how patiently to repeat a failing call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

/// The error that ended a retried call, with the number of attempts made
#[derive(Debug)]
pub struct RetryFailure {
    pub attempts: u32,
    pub error: Error,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, initial_backoff: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            initial_backoff,
            max_backoff: MAX_BACKOFF.max(initial_backoff),
        }
    }

    pub fn from_config(config: &NarratorConfig) -> Self {
        Self::new(config.retries, config.backoff_delay())
    }

    /// Delay after the `attempt`-th failure (1-based).
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.initial_backoff
            .saturating_mul(factor)
            .min(self.max_backoff)
    }

    /// Run `op` until it succeeds, fails with a non-retryable error, or the
    /// attempt budget is spent. `op` receives the 1-based attempt number.
    pub async fn run<T, F, Fut>(&self, mut op: F) -> std::result::Result<T, RetryFailure>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = crate::error::Result<T>>,
    {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match op(attempt).await {
                Ok(value) => return Ok(value),
                Err(error) if error.is_retryable() && attempt < self.max_attempts => {
                    let delay = self.delay_after(attempt);
                    warn!(
                        "Attempt {}/{} failed, retrying in {:?}: {}",
                        attempt, self.max_attempts, delay, error
                    );
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                }
                Err(error) => {
                    return Err(RetryFailure {
                        attempts: attempt,
                        error,
                    })
                }
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&NarratorConfig::default())
    }
}

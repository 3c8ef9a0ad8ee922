//! Bounded retry with exponential backoff.

use std::future::Future;
use std::time::Duration;

use tracing::warn;

/// Classifies an error as worth another attempt or not.
pub trait Retryable {
    fn is_retryable(&self) -> bool;
}

/// Retry configuration for the enrichment call.
///
/// Defaults to 3 attempts with waits of 5s, 10s, ... between them.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub multiplier: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(5),
            multiplier: 2,
        }
    }
}

impl RetryPolicy {
    /// Same attempt budget with no waiting between attempts.
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            base_delay: Duration::ZERO,
            multiplier: 2,
        }
    }

    /// Wait after the given zero-based failed attempt.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay * self.multiplier.saturating_pow(attempt)
    }

    /// Run `op` until it succeeds, fails fatally, or attempts run out.
    ///
    /// A non-retryable error is returned immediately. On exhaustion the last
    /// error is returned.
    pub async fn run<T, E, F, Fut>(&self, label: &str, mut op: F) -> Result<T, E>
    where
        E: Retryable + std::fmt::Display,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let attempts = self.max_attempts.max(1);
        let mut attempt = 0;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) if !e.is_retryable() => return Err(e),
                Err(e) if attempt + 1 >= attempts => {
                    warn!(label, attempts, error = %e, "giving up after final attempt");
                    return Err(e);
                }
                Err(e) => {
                    let wait = self.delay_for(attempt);
                    warn!(
                        label,
                        attempt = attempt + 1,
                        attempts,
                        wait_secs = wait.as_secs_f64(),
                        error = %e,
                        "retrying"
                    );
                    tokio::time::sleep(wait).await;
                    attempt += 1;
                }
            }
        }
    }
}

//! Bounded retry with a fixed delay.

use std::future::Future;
use std::time::Duration;

/// How often and how patiently to retry a publish.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    /// Wait between attempts. Not applied after the last one.
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay: Duration::from_secs(2),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay,
        }
    }

    /// Runs `operation` until it succeeds or the attempts run out, returning
    /// the last error. The closure receives the 1-based attempt number.
    pub async fn run<F, Fut, T, E>(&self, mut operation: F) -> Result<T, E>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::fmt::Display,
    {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match operation(attempt).await {
                Ok(value) => {
                    if attempt > 1 {
                        tracing::info!(attempt, "Operation succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(error) if attempt >= self.max_attempts => {
                    tracing::error!(attempt, error = %error, "Operation failed after all retries");
                    return Err(error);
                }
                Err(error) => {
                    tracing::warn!(
                        attempt,
                        max_attempts = self.max_attempts,
                        error = %error,
                        delay_ms = self.delay.as_millis() as u64,
                        "Operation failed, retrying after delay"
                    );
                    tokio::time::sleep(self.delay).await;
                }
            }
        }
    }
}

//! Fixed-delay retry policy.

use std::future::Future;
use std::time::Duration;

use tracing::warn;

use namecast_core::config::PublishConfig;

/// Retries an operation a fixed number of times with a fixed pause.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    /// Pause between attempts.
    pub delay: Duration,
}

/// The last failure of an exhausted retry loop.
#[derive(Debug)]
pub struct RetryExhausted<E> {
    /// Attempt number that produced `error` (1-based).
    pub attempt: u32,
    /// Error of that attempt.
    pub error: E,
}

impl RetryPolicy {
    /// Create a policy. `max_attempts` is raised to at least one.
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay,
        }
    }

    /// Policy from publish configuration.
    pub fn from_config(config: &PublishConfig) -> Self {
        Self::new(config.max_attempts, config.retry_delay())
    }

    /// Run `op` until it succeeds or the attempts are used up.
    ///
    /// `op` receives the 1-based attempt number.
    pub async fn run<T, E, F, Fut>(&self, label: &str, mut op: F) -> Result<T, RetryExhausted<E>>
    where
        E: std::fmt::Display,
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let mut attempt = 1;
        loop {
            match op(attempt).await {
                Ok(value) => return Ok(value),
                Err(error) if attempt >= self.max_attempts => {
                    return Err(RetryExhausted { attempt, error });
                }
                Err(error) => {
                    warn!(
                        target_name = label,
                        attempt,
                        max_attempts = self.max_attempts,
                        error = %error,
                        "Attempt failed, retrying"
                    );
                    tokio::time::sleep(self.delay).await;
                    attempt += 1;
                }
            }
        }
    }
}

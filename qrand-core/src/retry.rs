//! Retry logic with exponential backoff and jitter
//!
//! The bit cache never retries on its own; backends that talk to remote
//! hardware wrap each batch request in a `RetryPolicy` instead.

use crate::{config::QrandConfig, Result};
use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

/// Retry policy configuration
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum number of attempts, including the first
    pub max_attempts: u32,
    /// Initial backoff duration
    pub initial_backoff: Duration,
    /// Maximum backoff duration
    pub max_backoff: Duration,
    /// Multiplier for exponential backoff
    pub multiplier: f64,
    /// Add jitter to prevent thundering herd
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_secs(30),
            multiplier: 2.0,
            jitter: true,
        }
    }
}

impl RetryPolicy {
    /// Policy that makes exactly one attempt
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            ..Default::default()
        }
    }

    pub fn from_config(config: &QrandConfig) -> Self {
        Self {
            max_attempts: config.max_retries,
            initial_backoff: config.initial_backoff(),
            ..Default::default()
        }
    }

    /// Execute operation, retrying transient failures
    pub async fn execute<F, Fut, T>(&self, mut operation: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempt = 0;
        let mut backoff = self.initial_backoff;

        loop {
            attempt += 1;

            match operation().await {
                Ok(result) => {
                    if attempt > 1 {
                        debug!("Operation succeeded after {} attempts", attempt);
                    }
                    return Ok(result);
                }
                Err(e) if e.is_retryable() && attempt < self.max_attempts => {
                    warn!(
                        "Operation failed (attempt {}/{}): {}. Retrying after {:?}",
                        attempt, self.max_attempts, e, backoff
                    );

                    sleep(backoff).await;

                    backoff = Duration::from_secs_f64(
                        (backoff.as_secs_f64() * self.multiplier)
                            .min(self.max_backoff.as_secs_f64()),
                    );

                    if self.jitter {
                        backoff = self.add_jitter(backoff);
                    }
                }
                Err(e) => {
                    if attempt >= self.max_attempts && e.is_retryable() {
                        warn!("Operation failed after {} attempts: {}", attempt, e);
                    }
                    return Err(e);
                }
            }
        }
    }

    fn add_jitter(&self, duration: Duration) -> Duration {
        let jitter_ms = rand::thread_rng().gen_range(0..=duration.as_millis() / 4);
        duration + Duration::from_millis(jitter_ms as u64)
    }
}

//! Retry executor with bounded exponential backoff and jitter
//!
//! Wraps flaky external calls. Errors classified as fatal are surfaced
//! immediately; retryable ones are reattempted up to the configured limit,
//! with jitter so concurrently failing callers do not retry in lockstep.

use crate::config::RetryConfig;
use rand::Rng;
use std::time::Duration;
use tracing::{debug, error};

/// Classification hook the executor uses to decide whether to retry
pub trait RetryClassify {
    /// Whether another attempt can plausibly succeed
    fn is_retryable(&self) -> bool;
}

/// Retry executor
#[derive(Debug, Clone)]
pub struct RetryExecutor {
    config: RetryConfig,
}

impl RetryExecutor {
    /// Create an executor from configuration
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    /// Backoff delay before retrying after attempt `attempt` (1-based), without jitter
    ///
    /// Attempt `n` waits `min(base * 2^(n-1), max_delay)`.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let base = self.config.base_delay();
        let exp = attempt.saturating_sub(1).min(20);
        let delay = base.saturating_mul(1u32 << exp);
        delay.min(self.config.max_delay())
    }

    /// Execute `op`, retrying retryable failures up to `max_attempts` total attempts
    ///
    /// The last error is propagated once attempts are exhausted.
    pub async fn run<F, Fut, T, E>(&self, mut op: F) -> std::result::Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = std::result::Result<T, E>>,
        E: RetryClassify + std::fmt::Display,
    {
        let max_attempts = self.config.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            attempt += 1;

            match op().await {
                Ok(result) => {
                    if attempt > 1 {
                        debug!("Retry succeeded on attempt {}", attempt);
                    }
                    return Ok(result);
                }
                Err(err) => {
                    if !err.is_retryable() {
                        debug!("Fatal error on attempt {}: {}", attempt, err);
                        return Err(err);
                    }
                    if attempt >= max_attempts {
                        error!("Retry failed after {} attempts: {}", attempt, err);
                        return Err(err);
                    }

                    let delay = self.delay_for_attempt(attempt) + self.jitter();
                    debug!(
                        "Attempt {} failed: {}, retrying in {:?}",
                        attempt, err, delay
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    /// Uniform jitter in `[0, jitter_ms)`
    fn jitter(&self) -> Duration {
        if self.config.jitter_ms == 0 {
            return Duration::ZERO;
        }
        let millis = rand::thread_rng().gen_range(0..self.config.jitter_ms);
        Duration::from_millis(millis)
    }
}

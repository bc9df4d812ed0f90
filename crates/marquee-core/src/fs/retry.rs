//! Exponential backoff for operations against flaky mounts.
//!
//! Delay for attempt `n` (0-indexed) is `base * 2^n`, capped at `max_delay`,
//! optionally scaled by a jitter factor in `0.5..1.5` so that many items
//! stalled on the same mount do not retry in lockstep.

use crate::config::RetryDefaults;
use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

/// Configuration for retry behavior.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of attempts, the first one included.
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub exponential_base: f64,
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: RetryDefaults::MAX_ATTEMPTS,
            base_delay: RetryDefaults::BASE_DELAY,
            max_delay: RetryDefaults::MAX_DELAY,
            exponential_base: 2.0,
            jitter: true,
        }
    }
}

impl RetryConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts;
        self
    }

    pub fn with_base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = delay;
        self
    }

    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }

    /// Delay to wait after the given failed attempt (0-indexed).
    pub fn calculate_delay(&self, attempt: u32) -> Duration {
        let multiplier = self.exponential_base.powi(attempt as i32);
        let capped = (self.base_delay.as_secs_f64() * multiplier).min(self.max_delay.as_secs_f64());

        let secs = if self.jitter {
            let factor = rand::rng().random_range(0.5..1.5);
            (capped * factor).min(self.max_delay.as_secs_f64())
        } else {
            capped
        };

        Duration::from_secs_f64(secs)
    }
}

/// Statistics about a retried operation.
#[derive(Debug, Clone, Default)]
pub struct RetryStats {
    pub attempts: u32,
    pub total_delay: Duration,
    pub success: bool,
    /// Set when the last failure was still classified as retryable.
    pub exhausted: bool,
}

/// Run `operation` until it succeeds, fails with an error `should_retry`
/// rejects, or `config.max_attempts` is reached.
pub async fn retry_async<F, Fut, T, E>(
    config: &RetryConfig,
    mut operation: F,
    should_retry: impl Fn(&E) -> bool,
) -> (Result<T, E>, RetryStats)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let mut stats = RetryStats::default();
    let max_attempts = config.max_attempts.max(1);
    let mut attempt = 0;

    loop {
        stats.attempts = attempt + 1;

        let err = match operation().await {
            Ok(value) => {
                stats.success = true;
                if attempt > 0 {
                    debug!("Operation succeeded after {} attempts", stats.attempts);
                }
                return (Ok(value), stats);
            }
            Err(e) => e,
        };

        if !should_retry(&err) {
            debug!("Error is not retryable: {}", err);
            return (Err(err), stats);
        }

        if stats.attempts >= max_attempts {
            warn!(
                "All {} attempts exhausted. Last error: {}",
                max_attempts, err
            );
            stats.exhausted = true;
            return (Err(err), stats);
        }

        let delay = config.calculate_delay(attempt);
        stats.total_delay += delay;
        warn!(
            "Attempt {}/{} failed: {}. Retrying in {:?}",
            stats.attempts, max_attempts, err, delay
        );
        tokio::time::sleep(delay).await;
        attempt += 1;
    }
}

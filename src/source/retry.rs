//! Retry configuration, delay calculation, and the retrying source decorator.
//!
//! [`RetryingRatingSource`] wraps any [`RatingSource`] and retries transient
//! failures with exponential backoff. Both trait methods go through the
//! shared `with_retry()` helper.
//!
//! Retries happen inside a single cache fetch, so they all count against
//! the cache's fetch timeout.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::warn;

use super::traits::RatingSource;
use crate::telemetry;
use crate::types::{RatingAggregate, RatingRow};
use crate::Result;

/// Configuration for retry behaviour on transient errors.
///
/// ```rust
/// # use recipe_ratings::RetryConfig;
/// # use std::time::Duration;
/// let config = RetryConfig::new()
///     .max_attempts(5)
///     .initial_delay(Duration::from_millis(200));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
    /// Maximum number of attempts (including the initial request).
    /// 1 = no retry. Default: 3.
    pub max_attempts: u32,
    /// Base delay before the first retry. Default: 250ms.
    pub initial_delay: Duration,
    /// Maximum delay between retries. Default: 2s.
    pub max_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(250),
            max_delay: Duration::from_secs(2),
        }
    }
}

impl RetryConfig {
    /// Create a new config with sensible defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a config that disables retries (single attempt).
    pub fn disabled() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Set maximum attempts (including the initial request).
    pub fn max_attempts(mut self, n: u32) -> Self {
        self.max_attempts = n;
        self
    }

    /// Set the base delay before the first retry.
    pub fn initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Set the maximum delay between retries.
    pub fn max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Delay before retry number `attempt` (0-indexed):
    /// `initial_delay * 2^attempt`, capped at `max_delay`.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let delay = self
            .initial_delay
            .saturating_mul(2u32.saturating_pow(attempt));
        delay.min(self.max_delay)
    }
}

/// Run `f` until it succeeds, fails permanently, or runs out of attempts.
pub(crate) async fn with_retry<F, Fut, T>(
    config: &RetryConfig,
    source_name: &str,
    operation: &str,
    f: F,
) -> Result<T>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let max_attempts = config.max_attempts.max(1);
    let mut attempt = 0;
    loop {
        match f().await {
            Ok(result) => return Ok(result),
            Err(e) if e.is_transient() && attempt + 1 < max_attempts => {
                metrics::counter!(telemetry::RETRIES_TOTAL,
                    "source" => source_name.to_owned(),
                    "operation" => operation.to_owned(),
                )
                .increment(1);
                let delay = config.delay_for_attempt(attempt);
                warn!(
                    source = source_name,
                    operation,
                    attempt = attempt + 1,
                    max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "retrying after transient error"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

/// Decorator that wraps a [`RatingSource`] with retry logic.
///
/// Transient errors (as classified by
/// [`RatingsError::is_transient()`](crate::RatingsError::is_transient)) are
/// retried; permanent errors are returned immediately.
pub struct RetryingRatingSource {
    inner: Arc<dyn RatingSource>,
    config: RetryConfig,
}

impl RetryingRatingSource {
    /// Wrap a rating source with retry logic.
    pub fn new(inner: Arc<dyn RatingSource>, config: RetryConfig) -> Self {
        Self { inner, config }
    }
}

#[async_trait]
impl RatingSource for RetryingRatingSource {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn fetch_rating(&self, recipe_id: &str) -> Result<RatingAggregate> {
        with_retry(&self.config, self.inner.name(), "fetch_rating", || {
            self.inner.fetch_rating(recipe_id)
        })
        .await
    }

    async fn fetch_all(&self) -> Result<Vec<RatingRow>> {
        with_retry(&self.config, self.inner.name(), "fetch_all", || {
            self.inner.fetch_all()
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delay_doubles_then_caps() {
        let config = RetryConfig::new()
            .initial_delay(Duration::from_millis(100))
            .max_delay(Duration::from_millis(350));
        assert_eq!(config.delay_for_attempt(0), Duration::from_millis(100));
        assert_eq!(config.delay_for_attempt(1), Duration::from_millis(200));
        assert_eq!(config.delay_for_attempt(2), Duration::from_millis(350));
        assert_eq!(config.delay_for_attempt(30), Duration::from_millis(350));
    }

    #[test]
    fn disabled_is_single_attempt() {
        assert_eq!(RetryConfig::disabled().max_attempts, 1);
    }
}

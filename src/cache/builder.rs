//! Builder for configuring rating cache instances

use std::sync::Arc;
use std::time::Duration;

use super::RatingCache;
use crate::policy::{FailOpen, FailurePolicy};
use crate::source::http::DEFAULT_REQUEST_TIMEOUT;
use crate::source::{HttpRatingSource, RatingSource, RetryConfig, RetryingRatingSource};
use crate::{RatingsError, Result};

/// Tunables for the cache itself.
///
/// ```rust
/// # use recipe_ratings::RatingCacheConfig;
/// # use std::time::Duration;
/// let config = RatingCacheConfig::new().fetch_timeout(Duration::from_secs(5));
/// assert_eq!(config.fetch_timeout, Duration::from_secs(5));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct RatingCacheConfig {
    /// Upper bound on a single fetch (retries included). A fetch that
    /// exceeds it fails with [`RatingsError::Timeout`] and its id leaves the
    /// pending set. Default: 10s.
    pub fetch_timeout: Duration,
}

impl Default for RatingCacheConfig {
    fn default() -> Self {
        Self {
            fetch_timeout: Duration::from_secs(10),
        }
    }
}

impl RatingCacheConfig {
    /// Create a new config with sensible defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the per-fetch timeout.
    pub fn fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = timeout;
        self
    }
}

/// Builder for [`RatingCache`].
///
/// Either hand it a ready [`RatingSource`] or a backend URL to build an
/// [`HttpRatingSource`] from:
///
/// ```rust
/// # use recipe_ratings::{RatingCache, RetryConfig};
/// # use std::time::Duration;
/// let cache = RatingCache::builder()
///     .base_url("https://recipes.example.com/api")
///     .fetch_timeout(Duration::from_secs(5))
///     .retry(RetryConfig::new().max_attempts(2))
///     .build()
///     .unwrap();
/// assert_eq!(cache.revision(), 0);
/// ```
pub struct RatingCacheBuilder {
    source: Option<Arc<dyn RatingSource>>,
    base_url: Option<String>,
    bearer_token: Option<String>,
    request_timeout: Duration,
    retry: Option<RetryConfig>,
    policy: Arc<dyn FailurePolicy>,
    config: RatingCacheConfig,
}

impl RatingCacheBuilder {
    pub fn new() -> Self {
        Self {
            source: None,
            base_url: None,
            bearer_token: None,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            retry: None,
            policy: Arc::new(FailOpen),
            config: RatingCacheConfig::default(),
        }
    }

    /// Fetch through a custom source. Takes precedence over [`base_url`](Self::base_url).
    pub fn source(mut self, source: Arc<dyn RatingSource>) -> Self {
        self.source = Some(source);
        self
    }

    /// Fetch from the recipe backend rooted at `url`.
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Bearer token for the HTTP source.
    pub fn bearer_token(mut self, token: impl Into<String>) -> Self {
        self.bearer_token = Some(token.into());
        self
    }

    /// Client-level request timeout for the HTTP source (default: 30s).
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Retry transient fetch failures. Off unless set.
    pub fn retry(mut self, config: RetryConfig) -> Self {
        self.retry = Some(config);
        self
    }

    /// How failed fetches are recorded (default: [`FailOpen`]).
    pub fn failure_policy(mut self, policy: Arc<dyn FailurePolicy>) -> Self {
        self.policy = policy;
        self
    }

    /// Per-fetch timeout applied by the cache (default: 10s).
    pub fn fetch_timeout(mut self, timeout: Duration) -> Self {
        self.config.fetch_timeout = timeout;
        self
    }

    /// Replace the whole cache config.
    pub fn config(mut self, config: RatingCacheConfig) -> Self {
        self.config = config;
        self
    }

    /// Build the cache.
    ///
    /// Fails with [`RatingsError::NoSource`] when neither a source nor a
    /// base URL was given, or with a configuration error for a bad URL.
    pub fn build(self) -> Result<RatingCache> {
        let source: Arc<dyn RatingSource> = match (self.source, self.base_url) {
            (Some(source), _) => source,
            (None, Some(url)) => {
                let mut http = HttpRatingSource::with_timeout(&url, self.request_timeout)?;
                if let Some(token) = self.bearer_token {
                    http = http.bearer_token(token);
                }
                Arc::new(http)
            }
            (None, None) => return Err(RatingsError::NoSource),
        };

        let source: Arc<dyn RatingSource> = match self.retry {
            Some(config) if config.max_attempts > 1 => {
                Arc::new(RetryingRatingSource::new(source, config))
            }
            _ => source,
        };

        Ok(RatingCache::from_parts(source, self.policy, self.config))
    }
}

impl Default for RatingCacheBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_without_source_fails() {
        let err = RatingCacheBuilder::new().build().err().unwrap();
        assert!(matches!(err, RatingsError::NoSource));
    }

    #[test]
    fn build_with_bad_url_fails() {
        let err = RatingCacheBuilder::new()
            .base_url("::not a url::")
            .build()
            .err()
            .unwrap();
        assert!(matches!(err, RatingsError::Configuration(_)));
    }

    #[test]
    fn config_defaults() {
        assert_eq!(
            RatingCacheConfig::default().fetch_timeout,
            Duration::from_secs(10)
        );
    }
}

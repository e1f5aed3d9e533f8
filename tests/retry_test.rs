use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use recipe_ratings::{
    RatingAggregate, RatingRow, RatingSource, RatingsError, Result, RetryConfig,
    RetryingRatingSource,
};

/// Mock source that fails N times then succeeds.
struct FailThenSucceed {
    fail_count: AtomicU32,
    fail_with: fn() -> RatingsError,
    total_calls: AtomicU32,
}

impl FailThenSucceed {
    fn new(failures: u32, fail_with: fn() -> RatingsError) -> Self {
        Self {
            fail_count: AtomicU32::new(failures),
            fail_with,
            total_calls: AtomicU32::new(0),
        }
    }

    fn call_count(&self) -> u32 {
        self.total_calls.load(Ordering::Relaxed)
    }

    fn attempt(&self) -> Result<()> {
        self.total_calls.fetch_add(1, Ordering::Relaxed);
        let remaining = self.fail_count.load(Ordering::Relaxed);
        if remaining > 0 {
            self.fail_count.fetch_sub(1, Ordering::Relaxed);
            return Err((self.fail_with)());
        }
        Ok(())
    }
}

#[async_trait]
impl RatingSource for FailThenSucceed {
    fn name(&self) -> &str {
        "mock-retry"
    }

    async fn fetch_rating(&self, _recipe_id: &str) -> Result<RatingAggregate> {
        self.attempt()?;
        Ok(RatingAggregate::new(4.0, 3))
    }

    async fn fetch_all(&self) -> Result<Vec<RatingRow>> {
        self.attempt()?;
        Ok(vec![RatingRow {
            recipe_id: "1".into(),
            aggregate: RatingAggregate::new(4.0, 3),
        }])
    }
}

fn fast_retry(max_attempts: u32) -> RetryConfig {
    RetryConfig::new()
        .max_attempts(max_attempts)
        .initial_delay(Duration::from_millis(1))
        .max_delay(Duration::from_millis(5))
}

#[tokio::test]
async fn retries_on_transient_error_then_succeeds() {
    let inner = Arc::new(FailThenSucceed::new(2, || {
        RatingsError::Http("connection reset".into())
    }));
    let source = RetryingRatingSource::new(inner.clone(), fast_retry(3));

    let rating = source.fetch_rating("1").await.unwrap();
    assert_eq!(rating, RatingAggregate::new(4.0, 3));
    assert_eq!(inner.call_count(), 3);
}

#[tokio::test]
async fn gives_up_after_max_attempts() {
    let inner = Arc::new(FailThenSucceed::new(10, || RatingsError::Api {
        status: 502,
        message: "bad gateway".into(),
    }));
    let source = RetryingRatingSource::new(inner.clone(), fast_retry(3));

    let err = source.fetch_rating("1").await.unwrap_err();
    assert!(matches!(err, RatingsError::Api { status: 502, .. }));
    assert_eq!(inner.call_count(), 3);
}

#[tokio::test]
async fn permanent_error_not_retried() {
    let inner = Arc::new(FailThenSucceed::new(1, || {
        RatingsError::MalformedResponse("not json".into())
    }));
    let source = RetryingRatingSource::new(inner.clone(), fast_retry(5));

    assert!(source.fetch_rating("1").await.is_err());
    assert_eq!(inner.call_count(), 1);
}

#[tokio::test]
async fn disabled_config_makes_single_attempt() {
    let inner = Arc::new(FailThenSucceed::new(1, || RatingsError::Http("reset".into())));
    let source = RetryingRatingSource::new(inner.clone(), RetryConfig::disabled());

    assert!(source.fetch_rating("1").await.is_err());
    assert_eq!(inner.call_count(), 1);
}

#[tokio::test]
async fn bulk_fetch_is_retried() {
    let inner = Arc::new(FailThenSucceed::new(1, || {
        RatingsError::Timeout(Duration::from_secs(1))
    }));
    let source = RetryingRatingSource::new(inner.clone(), fast_retry(2));

    let rows = source.fetch_all().await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(inner.call_count(), 2);
}

#[tokio::test]
async fn decorator_keeps_inner_name() {
    let inner = Arc::new(FailThenSucceed::new(0, || RatingsError::NoSource));
    let source = RetryingRatingSource::new(inner, RetryConfig::default());
    assert_eq!(source.name(), "mock-retry");
}

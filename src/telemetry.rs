//! Telemetry metric name constants.
//!
//! Consumers install their own `metrics` recorder (e.g. prometheus, statsd);
//! without a recorder installed, all metric calls are no-ops.
//!
//! # Metric naming conventions
//!
//! All metrics are prefixed with `recipe_ratings_`. Counters end in `_total`,
//! histograms use meaningful units (e.g. `_seconds`).
//!
//! # Common labels
//!
//! - `operation`: "single", "bulk" or "refresh"
//! - `status`: outcome, "ok" or "error"

/// `load_rating` calls answered from the cache.
///
/// Synchronous `get_rating` reads are not counted.
pub const CACHE_HITS_TOTAL: &str = "recipe_ratings_cache_hits_total";

/// `load_rating` calls that found no entry.
pub const CACHE_MISSES_TOTAL: &str = "recipe_ratings_cache_misses_total";

/// Network fetches issued by the cache.
///
/// Labels: `operation`, `status` ("ok" | "error").
pub const FETCHES_TOTAL: &str = "recipe_ratings_fetches_total";

/// Fetch duration in seconds, timeout included.
///
/// Labels: `operation`.
pub const FETCH_DURATION_SECONDS: &str = "recipe_ratings_fetch_duration_seconds";

/// Callers that joined an in-flight fetch instead of issuing their own.
///
/// Labels: `operation`.
pub const COALESCED_TOTAL: &str = "recipe_ratings_coalesced_total";

/// Retry attempts (not counting the initial request).
///
/// Labels: `source`, `operation`.
pub const RETRIES_TOTAL: &str = "recipe_ratings_retries_total";

/// Unknown ids materialized as zero after the bulk preload completed.
pub const ZERO_FILLS_TOTAL: &str = "recipe_ratings_zero_fills_total";

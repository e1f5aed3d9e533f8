//! recipe-ratings - Shared client-side cache of recipe rating aggregates
//!
//! This crate keeps the average score and vote count of every recipe a
//! client has looked at, fetched from the recipe backend over HTTP. Many
//! independent screens share one [`RatingCache`] handle: reads are
//! synchronous, loads are asynchronous and de-duplicated per recipe, a
//! one-time bulk preload seeds the whole table, and a revision counter
//! tells consumers when to re-read.
//!
//! # Example
//!
//! ```rust,no_run
//! use recipe_ratings::{RatingAggregate, RatingCache};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> recipe_ratings::Result<()> {
//!     let cache = RatingCache::builder()
//!         .base_url("https://recipes.example.com/api")
//!         .build()?;
//!
//!     // Startup: seed everything in one round trip.
//!     cache.load_all_ratings().await;
//!
//!     // Render: never blocks, never fetches.
//!     if let Some(rating) = cache.get_rating("42").and_then(|r| r.stars()) {
//!         println!("{rating:.1} stars");
//!     }
//!
//!     // After the user submits a rating:
//!     cache.update_rating("42", RatingAggregate::new(4.5, 11));
//!     cache.load_and_update_rating("42").await;
//!     Ok(())
//! }
//! ```

pub mod cache;
#[cfg(feature = "cli")]
pub mod config;
pub mod error;
pub mod policy;
pub mod source;
pub mod telemetry;
pub mod types;

// Re-export main types at crate root
pub use cache::{CachePhase, RatingCache, RatingCacheBuilder, RatingCacheConfig};
pub use error::{RatingsError, Result};
pub use policy::{FailOpen, FailurePolicy, FailureResolution, LeaveUnknown};
pub use source::{HttpRatingSource, RatingSource, RetryConfig, RetryingRatingSource};
pub use types::{RatingAggregate, RatingRow};

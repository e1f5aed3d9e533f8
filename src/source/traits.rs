//! The backend seam the cache fetches through.
//!
//! The cache never talks HTTP itself. It holds an `Arc<dyn RatingSource>`
//! so tests can substitute an in-memory source and decorators (see
//! [`RetryingRatingSource`](super::RetryingRatingSource)) can wrap the real
//! one without the cache noticing.

use async_trait::async_trait;

use crate::Result;
use crate::types::{RatingAggregate, RatingRow};

/// Source of rating aggregates.
///
/// Implementations report failures as errors; turning those into
/// "no ratings" is the cache's job, not the source's.
#[async_trait]
pub trait RatingSource: Send + Sync {
    /// Source name for logging/metrics.
    fn name(&self) -> &str;

    /// Fetch the aggregate for one recipe.
    ///
    /// A recipe the backend knows but nobody has rated yet is
    /// `Ok(RatingAggregate::ZERO)`, not an error.
    async fn fetch_rating(&self, recipe_id: &str) -> Result<RatingAggregate>;

    /// Fetch the full rating table in one round trip.
    ///
    /// Recipes with no votes may be absent from the result.
    async fn fetch_all(&self) -> Result<Vec<RatingRow>>;
}

//! What the cache does with a fetch that failed.
//!
//! Load operations never hand errors to their callers. Instead the cache
//! asks its [`FailurePolicy`] how to resolve each failure. The default,
//! [`FailOpen`], records "no ratings" so a broken endpoint degrades to
//! empty stars instead of a spinner. [`LeaveUnknown`] records nothing, so
//! the id stays unknown and the next `load_rating` tries again.

use crate::RatingsError;
use crate::types::RatingAggregate;

/// Outcome of resolving a failed fetch.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FailureResolution {
    /// Write this aggregate into the cache (and bump the revision).
    Store(RatingAggregate),
    /// Leave the cache untouched.
    Skip,
}

/// Strategy for absorbing failed individual fetches.
pub trait FailurePolicy: Send + Sync {
    /// Policy name for logging.
    fn name(&self) -> &str;

    /// Decide what a failed fetch of `recipe_id` leaves behind.
    fn resolve(&self, recipe_id: &str, error: &RatingsError) -> FailureResolution;
}

/// Treat every failure as "no ratings yet".
#[derive(Debug, Clone, Copy, Default)]
pub struct FailOpen;

impl FailurePolicy for FailOpen {
    fn name(&self) -> &str {
        "fail-open"
    }

    fn resolve(&self, _recipe_id: &str, _error: &RatingsError) -> FailureResolution {
        FailureResolution::Store(RatingAggregate::ZERO)
    }
}

/// Keep failures out of the cache so they are never mistaken for zero votes.
#[derive(Debug, Clone, Copy, Default)]
pub struct LeaveUnknown;

impl FailurePolicy for LeaveUnknown {
    fn name(&self) -> &str {
        "leave-unknown"
    }

    fn resolve(&self, _recipe_id: &str, _error: &RatingsError) -> FailureResolution {
        FailureResolution::Skip
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fail_open_stores_zero() {
        let err = RatingsError::Http("connection refused".into());
        assert_eq!(
            FailOpen.resolve("7", &err),
            FailureResolution::Store(RatingAggregate::ZERO)
        );
    }

    #[test]
    fn leave_unknown_skips() {
        let err = RatingsError::MalformedResponse("bad".into());
        assert_eq!(LeaveUnknown.resolve("7", &err), FailureResolution::Skip);
    }
}

//! Rating sources: the trait the cache fetches through, the HTTP client for
//! the recipe backend, and a retry decorator.

pub mod http;
pub mod retry;
pub mod traits;

pub use http::HttpRatingSource;
pub use retry::{RetryConfig, RetryingRatingSource};
pub use traits::RatingSource;

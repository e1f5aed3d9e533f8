//! Rating cache error types

use std::time::Duration;

/// Errors produced while fetching rating aggregates.
///
/// The cache's public load operations never return these; they are handed
/// to the configured [`FailurePolicy`](crate::FailurePolicy) instead.
/// Sources, the retry layer and the probe binary see them directly.
#[derive(Debug, thiserror::Error)]
pub enum RatingsError {
    // Transport errors
    #[error("HTTP error: {0}")]
    Http(String),

    /// Non-success status, either from the transport or from the
    /// envelope's own `status` field.
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("fetch timed out after {0:?}")]
    Timeout(Duration),

    // Data errors
    /// Response body that does not decode as a rating envelope.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Well-formed JSON that breaks the envelope contract.
    #[error("malformed response: {0}")]
    MalformedResponse(String),

    /// The fetch task ended without producing a result (panicked source).
    #[error("fetch aborted: {0}")]
    FetchAborted(String),

    /// Recipe id that cannot be expressed as a single path segment.
    #[error("invalid recipe id: {0:?}")]
    InvalidRecipeId(String),

    // Configuration errors
    #[error("no rating source configured")]
    NoSource,

    #[error("configuration error: {0}")]
    Configuration(String),
}

impl RatingsError {
    /// Whether a retry has a reasonable chance of succeeding.
    ///
    /// Network failures, timeouts, 429 and 5xx are transient. Everything
    /// else (bad payloads, 4xx, configuration) is permanent.
    pub fn is_transient(&self) -> bool {
        match self {
            RatingsError::Http(_) | RatingsError::Timeout(_) => true,
            RatingsError::Api { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

impl From<reqwest::Error> for RatingsError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            RatingsError::MalformedResponse(err.to_string())
        } else {
            RatingsError::Http(err.to_string())
        }
    }
}

/// Result type alias for rating operations
pub type Result<T> = std::result::Result<T, RatingsError>;

//! HTTP client for the recipe backend's rating-summary endpoints.
//!
//! - `GET {base}/recipes/{id}/rating-summary` returns one aggregate.
//! - `GET {base}/recipes/0/rating-summary` returns the whole table; `0` is
//!   the backend's "all recipes" sentinel.
//!
//! Both wrap their payload in a [`RatingEnvelope`] whose own `status`
//! field must be 200 even when the transport status already is.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Url};
use serde::de::DeserializeOwned;
use tracing::debug;

use super::traits::RatingSource;
use crate::types::{RatingAggregate, RatingEnvelope, RatingRow};
use crate::{RatingsError, Result};

/// Recipe id the backend interprets as "every recipe".
const ALL_RECIPES_SENTINEL: &str = "0";

/// Default client-level request timeout.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Rating source backed by the recipe REST API.
#[derive(Clone)]
pub struct HttpRatingSource {
    http: Client,
    base_url: Url,
    bearer_token: Option<String>,
}

impl HttpRatingSource {
    /// Create a source for the backend rooted at `base_url`.
    pub fn new(base_url: &str) -> Result<Self> {
        Self::with_timeout(base_url, DEFAULT_REQUEST_TIMEOUT)
    }

    /// Create a source with a custom client-level request timeout.
    pub fn with_timeout(base_url: &str, timeout: Duration) -> Result<Self> {
        let base_url = Url::parse(base_url).map_err(|e| {
            RatingsError::Configuration(format!("invalid backend URL {base_url:?}: {e}"))
        })?;
        if base_url.cannot_be_a_base() {
            return Err(RatingsError::Configuration(format!(
                "backend URL {base_url} cannot carry a path"
            )));
        }

        let http = Client::builder().timeout(timeout).build().map_err(|e| {
            RatingsError::Configuration(format!("failed to build HTTP client: {e}"))
        })?;

        Ok(Self {
            http,
            base_url,
            bearer_token: None,
        })
    }

    /// Send `Authorization: Bearer <token>` with every request.
    pub fn bearer_token(mut self, token: impl Into<String>) -> Self {
        self.bearer_token = Some(token.into());
        self
    }

    /// Base URL requests are resolved against.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Build `{base}/recipes/{recipe_id}/rating-summary`, percent-encoding the id.
    ///
    /// Empty, `.` and `..` ids are rejected: the URL parser would collapse
    /// them into a different resource.
    fn summary_url(&self, recipe_id: &str) -> Result<Url> {
        if matches!(recipe_id, "" | "." | "..") {
            return Err(RatingsError::InvalidRecipeId(recipe_id.to_string()));
        }
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| {
                RatingsError::Configuration(format!("backend URL {} cannot carry a path", self.base_url))
            })?
            .pop_if_empty()
            .extend(["recipes", recipe_id, "rating-summary"]);
        Ok(url)
    }

    /// GET a summary URL and unwrap its envelope.
    async fn get_envelope<T: DeserializeOwned>(&self, url: Url) -> Result<T> {
        debug!(%url, "fetching rating summary");

        let mut request = self.http.get(url);
        if let Some(token) = &self.bearer_token {
            request = request.bearer_auth(token);
        }
        let response = request.send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(RatingsError::Api {
                status: status.as_u16(),
                message: format!("rating summary request failed: {status}"),
            });
        }

        let body = response.text().await?;
        parse_envelope(&body)
    }
}

/// Decode an envelope and insist on `status == 200` with a payload.
fn parse_envelope<T: DeserializeOwned>(body: &str) -> Result<T> {
    let envelope: RatingEnvelope<T> = serde_json::from_str(body)?;

    if envelope.status != 200 {
        return Err(RatingsError::Api {
            status: envelope.status,
            message: envelope
                .message
                .unwrap_or_else(|| "backend reported failure".to_string()),
        });
    }

    envelope
        .data
        .ok_or_else(|| RatingsError::MalformedResponse("envelope has no data".to_string()))
}

#[async_trait]
impl RatingSource for HttpRatingSource {
    fn name(&self) -> &str {
        "http"
    }

    async fn fetch_rating(&self, recipe_id: &str) -> Result<RatingAggregate> {
        let url = self.summary_url(recipe_id)?;
        self.get_envelope(url).await
    }

    async fn fetch_all(&self) -> Result<Vec<RatingRow>> {
        let url = self.summary_url(ALL_RECIPES_SENTINEL)?;
        self.get_envelope(url).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_url_appends_segments() {
        let source = HttpRatingSource::new("https://api.example.com/v1").unwrap();
        let url = source.summary_url("42").unwrap();
        assert_eq!(url.as_str(), "https://api.example.com/v1/recipes/42/rating-summary");
    }

    #[test]
    fn summary_url_tolerates_trailing_slash() {
        let source = HttpRatingSource::new("https://api.example.com/").unwrap();
        let url = source.summary_url("42").unwrap();
        assert_eq!(url.as_str(), "https://api.example.com/recipes/42/rating-summary");
    }

    #[test]
    fn summary_url_encodes_opaque_ids() {
        let source = HttpRatingSource::new("https://api.example.com").unwrap();
        let url = source.summary_url("a/b c").unwrap();
        assert_eq!(
            url.as_str(),
            "https://api.example.com/recipes/a%2Fb%20c/rating-summary"
        );
    }

    #[test]
    fn summary_url_rejects_dot_segments() {
        let source = HttpRatingSource::new("https://api.example.com/v1").unwrap();
        for id in ["", ".", ".."] {
            let err = source.summary_url(id).unwrap_err();
            assert!(
                matches!(&err, RatingsError::InvalidRecipeId(bad) if bad == id),
                "{id:?} should be rejected, got {err}"
            );
            assert!(!err.is_transient());
        }

        // dots inside a longer id are ordinary characters
        let url = source.summary_url("...").unwrap();
        assert_eq!(url.as_str(), "https://api.example.com/v1/recipes/.../rating-summary");
    }

    #[test]
    fn invalid_base_url_rejected() {
        let err = HttpRatingSource::new("not a url").err().unwrap();
        assert!(matches!(err, RatingsError::Configuration(_)));
    }

    #[test]
    fn envelope_non_200_is_api_error() {
        let err = parse_envelope::<RatingAggregate>(r#"{"status": 500, "message": "db down"}"#)
            .unwrap_err();
        match err {
            RatingsError::Api { status, message } => {
                assert_eq!(status, 500);
                assert_eq!(message, "db down");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn envelope_without_data_is_malformed() {
        let err = parse_envelope::<RatingAggregate>(r#"{"status": 200}"#).unwrap_err();
        assert!(matches!(err, RatingsError::MalformedResponse(_)));
    }

    #[test]
    fn envelope_garbage_is_json_error() {
        let err = parse_envelope::<RatingAggregate>("<html>oops</html>").unwrap_err();
        assert!(matches!(err, RatingsError::Json(_)));
    }
}

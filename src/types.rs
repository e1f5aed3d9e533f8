//! Rating aggregate and backend wire types.

use serde::{Deserialize, Deserializer, Serialize};

/// Average score and vote count for one recipe.
///
/// `vote_count == 0` means "no ratings yet"; `average` carries no meaning
/// in that case. Check [`has_ratings()`](Self::has_ratings) before
/// rendering stars.
///
/// On the wire a `null` or missing `average` means the recipe has no
/// ratings at all and decodes to [`ZERO`](Self::ZERO), whatever the
/// accompanying `voteCount` says.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", from = "RawAggregate")]
pub struct RatingAggregate {
    /// Mean score, conceptually in `[0, 5]`.
    pub average: f64,
    pub vote_count: u64,
}

impl RatingAggregate {
    /// The "no ratings" aggregate.
    pub const ZERO: RatingAggregate = RatingAggregate {
        average: 0.0,
        vote_count: 0,
    };

    pub fn new(average: f64, vote_count: u64) -> Self {
        Self {
            average,
            vote_count,
        }
    }

    /// Whether at least one vote has been recorded.
    pub fn has_ratings(&self) -> bool {
        self.vote_count > 0
    }

    /// Average to render, or `None` when there is nothing to render.
    pub fn stars(&self) -> Option<f64> {
        self.has_ratings().then_some(self.average)
    }
}

impl Default for RatingAggregate {
    fn default() -> Self {
        Self::ZERO
    }
}

/// One row of the bulk rating table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RatingRow {
    /// Backend recipe id. Numbers are coerced to their decimal string.
    #[serde(deserialize_with = "recipe_id_string")]
    pub recipe_id: String,
    #[serde(flatten)]
    pub aggregate: RatingAggregate,
}

/// Response envelope used by every backend endpoint.
///
/// `status` mirrors an HTTP status inside the body; anything other than
/// 200 means `data` is absent and `message` explains why.
#[derive(Debug, Clone, Deserialize)]
pub struct RatingEnvelope<T> {
    pub status: u16,
    pub data: Option<T>,
    pub message: Option<String>,
}

/// Accept a JSON number or string for a recipe id.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawRecipeId {
    Text(String),
    Integer(i64),
    Float(f64),
}

fn recipe_id_string<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match RawRecipeId::deserialize(deserializer)? {
        RawRecipeId::Text(s) => s,
        RawRecipeId::Integer(n) => n.to_string(),
        RawRecipeId::Float(f) => f.to_string(),
    })
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawAggregate {
    #[serde(default)]
    average: Option<f64>,
    #[serde(default)]
    vote_count: u64,
}

impl From<RawAggregate> for RatingAggregate {
    fn from(raw: RawAggregate) -> Self {
        match raw.average {
            Some(average) => RatingAggregate::new(average, raw.vote_count),
            None => RatingAggregate::ZERO,
        }
    }
}

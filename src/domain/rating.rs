//! Rating types
//!
//! A rating is an immutable 1..=5 score one exchange party gives the other.
//! The per-user aggregate is a cached projection of all ratings a user has
//! received and is always recomputed from the full set.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use super::DomainError;

/// Lowest accepted score
pub const MIN_SCORE: i64 = 1;

/// Highest accepted score
pub const MAX_SCORE: i64 = 5;

/// Validated rating score.
///
/// # Invariants
/// - Value is always within `MIN_SCORE..=MAX_SCORE`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub struct Score(u8);

impl Score {
    /// Create a new Score, rejecting anything outside 1..=5.
    pub fn new(value: i64) -> Result<Self, DomainError> {
        if !(MIN_SCORE..=MAX_SCORE).contains(&value) {
            return Err(DomainError::InvalidScore(value));
        }
        Ok(Self(value as u8))
    }

    pub fn value(&self) -> i32 {
        i32::from(self.0)
    }
}

impl TryFrom<i64> for Score {
    type Error = DomainError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Score::new(value)
    }
}

impl From<Score> for i64 {
    fn from(score: Score) -> Self {
        i64::from(score.0)
    }
}

impl fmt::Display for Score {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A persisted rating
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Rating {
    pub id: Uuid,
    pub from_user_id: Uuid,
    pub to_user_id: Uuid,
    pub exchange_id: Uuid,
    pub score: i32,
    pub comment: String,
    pub created_at: DateTime<Utc>,
}

/// A rating that has passed validation but is not stored yet
#[derive(Debug, Clone)]
pub struct NewRating {
    pub id: Uuid,
    pub from_user_id: Uuid,
    pub to_user_id: Uuid,
    pub exchange_id: Uuid,
    pub score: Score,
    pub comment: String,
}

impl NewRating {
    pub fn new(from_user_id: Uuid, to_user_id: Uuid, exchange_id: Uuid, score: Score) -> Self {
        Self {
            id: Uuid::new_v4(),
            from_user_id,
            to_user_id,
            exchange_id,
            score,
            comment: String::new(),
        }
    }

    pub fn with_comment(mut self, comment: String) -> Self {
        self.comment = comment;
        self
    }

    /// Materialize the stored record with the given creation time
    pub fn into_rating(self, created_at: DateTime<Utc>) -> Rating {
        Rating {
            id: self.id,
            from_user_id: self.from_user_id,
            to_user_id: self.to_user_id,
            exchange_id: self.exchange_id,
            score: self.score.value(),
            comment: self.comment,
            created_at,
        }
    }
}

/// Average score and count of all ratings a user has received
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RatingAggregate {
    pub rating: f64,
    pub rating_count: i64,
}

impl RatingAggregate {
    /// Build an aggregate from the raw output of `AVG`/`COUNT`.
    /// A missing average (no rows) becomes 0.
    pub fn new(average: Option<f64>, count: i64) -> Self {
        Self {
            rating: average.unwrap_or(0.0),
            rating_count: count,
        }
    }

    /// Compute the aggregate over a full set of scores
    pub fn from_scores<I>(scores: I) -> Self
    where
        I: IntoIterator<Item = i32>,
    {
        let (sum, count) = scores
            .into_iter()
            .fold((0i64, 0i64), |(sum, count), s| (sum + i64::from(s), count + 1));

        if count == 0 {
            return Self::default();
        }
        Self::new(Some(sum as f64 / count as f64), count)
    }
}

// =========================================================================
// Trust badges
// =========================================================================

/// Minimum average for the "very well rated" badge
const VERY_WELL_RATED_MIN_RATING: f64 = 4.5;

/// Minimum ratings for the "very well rated" badge
const VERY_WELL_RATED_MIN_COUNT: i64 = 5;

/// Minimum ratings for the "10+ exchanges" badge
const EXCHANGES_10_PLUS_MIN_COUNT: i64 = 10;

/// Badges shown on a public profile
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrustBadges {
    pub verified: bool,
    pub very_well_rated: bool,
    #[serde(rename = "exchanges10Plus")]
    pub exchanges_10_plus: bool,
}

impl TrustBadges {
    pub fn evaluate(email_verified: bool, aggregate: &RatingAggregate) -> Self {
        Self {
            verified: email_verified,
            very_well_rated: aggregate.rating >= VERY_WELL_RATED_MIN_RATING
                && aggregate.rating_count >= VERY_WELL_RATED_MIN_COUNT,
            exchanges_10_plus: aggregate.rating_count >= EXCHANGES_10_PLUS_MIN_COUNT,
        }
    }
}

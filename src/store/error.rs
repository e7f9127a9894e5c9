//! Store Errors
//!
//! Error types for storage operations.

use uuid::Uuid;

use crate::projection::ProjectionError;

/// Postgres constraint enforcing one rating per rater and exchange
pub(crate) const RATING_UNIQUE_CONSTRAINT: &str = "ratings_one_per_exchange";

/// Errors that can occur in the store
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The rater already rated this exchange
    #[error("Rating already exists for user {from_user_id} on exchange {exchange_id}")]
    DuplicateRating { from_user_id: Uuid, exchange_id: Uuid },

    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Backend could not serve the request
    #[error("Storage unavailable: {0}")]
    Unavailable(String),
}

impl StoreError {
    /// Check if this error is a duplicate rating
    pub fn is_duplicate(&self) -> bool {
        matches!(self, StoreError::DuplicateRating { .. })
    }

    /// Translate a unique violation on the rating constraint
    pub(crate) fn from_rating_insert(err: sqlx::Error, from_user_id: Uuid, exchange_id: Uuid) -> Self {
        let is_duplicate = matches!(
            &err,
            sqlx::Error::Database(db) if db.constraint() == Some(RATING_UNIQUE_CONSTRAINT)
        );

        if is_duplicate {
            StoreError::DuplicateRating {
                from_user_id,
                exchange_id,
            }
        } else {
            StoreError::Database(err)
        }
    }
}

impl From<ProjectionError> for StoreError {
    fn from(err: ProjectionError) -> Self {
        match err {
            ProjectionError::Database(e) => StoreError::Database(e),
            ProjectionError::UserNotFound(id) => {
                StoreError::Unavailable(format!("user {} missing while locked", id))
            }
        }
    }
}

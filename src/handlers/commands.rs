//! Command definitions
//!
//! Commands represent intentions to change the system state.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::RatingAggregate;

// =========================================================================
// SubmitRatingCommand
// =========================================================================

/// Command to rate the counterparty of an exchange.
///
/// `score` is carried raw; range validation happens in the handler so that
/// the rejection is reported the same way for every entry point.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitRatingCommand {
    pub to_user_id: Uuid,
    pub exchange_id: Uuid,
    pub score: i64,
    pub comment: Option<String>,
}

impl SubmitRatingCommand {
    pub fn new(to_user_id: Uuid, exchange_id: Uuid, score: i64) -> Self {
        Self {
            to_user_id,
            exchange_id,
            score,
            comment: None,
        }
    }

    pub fn with_comment(mut self, comment: String) -> Self {
        self.comment = Some(comment);
        self
    }
}

/// Result of a recompute
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecomputeResult {
    pub user_id: Uuid,
    pub aggregate: RatingAggregate,
}

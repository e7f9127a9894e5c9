//! Exchange offers
//!
//! An exchange offer links the user proposing a trade (`from_user_id`) to the
//! owner of the targeted listing (`to_user_id`). Only these two parties may
//! chat about it or rate each other for it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use super::DomainError;

/// Lifecycle status of an exchange offer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExchangeStatus {
    Pending,
    Accepted,
    Refused,
    InProgress,
    Completed,
    Cancelled,
}

impl ExchangeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExchangeStatus::Pending => "PENDING",
            ExchangeStatus::Accepted => "ACCEPTED",
            ExchangeStatus::Refused => "REFUSED",
            ExchangeStatus::InProgress => "IN_PROGRESS",
            ExchangeStatus::Completed => "COMPLETED",
            ExchangeStatus::Cancelled => "CANCELLED",
        }
    }

    /// Whether the recipient may move an offer to this status.
    /// `Pending` is only ever the initial state.
    pub fn is_settable(&self) -> bool {
        !matches!(self, ExchangeStatus::Pending)
    }
}

impl fmt::Display for ExchangeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExchangeStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(ExchangeStatus::Pending),
            "ACCEPTED" => Ok(ExchangeStatus::Accepted),
            "REFUSED" => Ok(ExchangeStatus::Refused),
            "IN_PROGRESS" => Ok(ExchangeStatus::InProgress),
            "COMPLETED" => Ok(ExchangeStatus::Completed),
            "CANCELLED" => Ok(ExchangeStatus::Cancelled),
            other => Err(DomainError::InvalidStatus(other.to_string())),
        }
    }
}

/// The two users bound to an exchange
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExchangeParties {
    pub from_user_id: Uuid,
    pub to_user_id: Uuid,
}

impl ExchangeParties {
    pub fn new(from_user_id: Uuid, to_user_id: Uuid) -> Self {
        Self {
            from_user_id,
            to_user_id,
        }
    }

    pub fn involves(&self, user_id: Uuid) -> bool {
        self.from_user_id == user_id || self.to_user_id == user_id
    }

    /// The party facing `user_id`, or `None` if `user_id` is not a party
    pub fn counterparty_of(&self, user_id: Uuid) -> Option<Uuid> {
        if self.from_user_id == user_id {
            Some(self.to_user_id)
        } else if self.to_user_id == user_id {
            Some(self.from_user_id)
        } else {
            None
        }
    }
}

/// Stored exchange offer
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct ExchangeOffer {
    pub id: Uuid,
    pub listing_id: Uuid,
    pub from_user_id: Uuid,
    pub to_user_id: Uuid,
    pub proposed_listing_ids: Vec<Uuid>,
    pub message: Option<String>,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

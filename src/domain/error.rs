//! Domain Error Types
//!
//! Pure domain errors that don't depend on infrastructure.

use thiserror::Error;

/// Domain-specific errors
///
/// These errors represent business rule violations.
/// They are independent of the web/infrastructure layer.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum DomainError {
    /// Score outside 1..=5
    #[error("Score must be between 1 and 5 (got {0})")]
    InvalidScore(i64),

    /// Rater tried to rate themselves
    #[error("Cannot rate yourself")]
    SelfRating,

    /// Caller is not one of the two exchange parties
    #[error("Not a party to this exchange")]
    NotExchangeParty,

    /// Rated user is not the rater's counterparty on the exchange
    #[error("Rated user is not the counterparty of this exchange")]
    NotCounterparty,

    /// The rater already rated this exchange
    #[error("Exchange {exchange_id} already rated by this user")]
    AlreadyRated { exchange_id: String },

    /// Unknown status value
    #[error("Invalid status: {0}")]
    InvalidStatus(String),

    /// Unknown report target type
    #[error("Invalid report target type: {0}")]
    InvalidReportTarget(String),
}

impl DomainError {
    /// Create an already-rated error
    pub fn already_rated(exchange_id: impl ToString) -> Self {
        Self::AlreadyRated {
            exchange_id: exchange_id.to_string(),
        }
    }

    /// Machine-readable code sent in error responses
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidScore(_) => "invalid_score",
            Self::SelfRating => "self_rating",
            Self::NotExchangeParty => "not_exchange_party",
            Self::NotCounterparty => "not_counterparty",
            Self::AlreadyRated { .. } => "already_rated",
            Self::InvalidStatus(_) => "invalid_status",
            Self::InvalidReportTarget(_) => "invalid_target_type",
        }
    }

    /// Check if this is a client input error (400)
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidScore(_)
                | Self::SelfRating
                | Self::InvalidStatus(_)
                | Self::InvalidReportTarget(_)
        )
    }

    /// Check if this is an authorization failure (403)
    pub fn is_forbidden(&self) -> bool {
        matches!(self, Self::NotExchangeParty | Self::NotCounterparty)
    }

    /// Check if this is a conflict with existing state (409)
    pub fn is_conflict_error(&self) -> bool {
        matches!(self, Self::AlreadyRated { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_score_error() {
        let err = DomainError::InvalidScore(7);

        assert!(err.is_client_error());
        assert!(!err.is_forbidden());
        assert!(err.to_string().contains('7'));
    }

    #[test]
    fn test_party_errors_are_forbidden() {
        assert!(DomainError::NotExchangeParty.is_forbidden());
        assert!(DomainError::NotCounterparty.is_forbidden());
        assert!(!DomainError::NotCounterparty.is_client_error());
    }

    #[test]
    fn test_already_rated_error() {
        let err = DomainError::already_rated("e1");

        assert!(err.is_conflict_error());
        assert!(!err.is_client_error());
        assert!(err.to_string().contains("e1"));
    }
}

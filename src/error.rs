//! Error handling module
//!
//! Centralized error types and HTTP response conversion.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::domain::DomainError;
use crate::store::StoreError;

/// Message returned for every 5xx; causes are logged, never sent
const SERVER_ERROR_MESSAGE: &str = "Internal server error";

/// Application-wide Result type
pub type AppResult<T> = Result<T, AppError>;

/// Application error types
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    // Client errors (4xx)
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Missing required fields: {}", .0.join(", "))]
    MissingFields(Vec<&'static str>),

    #[error("Missing bearer token")]
    MissingToken,

    #[error("Invalid or expired token")]
    InvalidToken,

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Exchange not found: {0}")]
    ExchangeNotFound(String),

    #[error("Listing not found: {0}")]
    ListingNotFound(String),

    #[error("User not found: {0}")]
    UserNotFound(String),

    #[error("Route not found")]
    RouteNotFound,

    // Domain errors
    #[error(transparent)]
    Domain(#[from] DomainError),

    // Server errors (5xx)
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),
}

impl AppError {
    /// Collect the names of absent fields; `Ok` when every field is present
    pub fn require(fields: &[(&'static str, bool)]) -> Result<(), AppError> {
        let missing: Vec<&'static str> = fields
            .iter()
            .filter(|(_, present)| !present)
            .map(|(name, _)| *name)
            .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(AppError::MissingFields(missing))
        }
    }
}

/// Error response body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub error_code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_code, details) = match &self {
            // 400 Bad Request
            AppError::InvalidRequest(msg) => {
                (StatusCode::BAD_REQUEST, "invalid_request", Some(msg.clone()))
            }
            AppError::MissingFields(fields) => {
                (StatusCode::BAD_REQUEST, "missing_fields", Some(fields.join(",")))
            }

            // 401 Unauthorized
            AppError::MissingToken => (StatusCode::UNAUTHORIZED, "missing_token", None),
            AppError::InvalidToken => (StatusCode::UNAUTHORIZED, "invalid_token", None),

            // 403 Forbidden
            AppError::Forbidden(msg) => {
                (StatusCode::FORBIDDEN, "forbidden", Some(msg.clone()))
            }

            // 404 Not Found
            AppError::ExchangeNotFound(id) => {
                (StatusCode::NOT_FOUND, "exchange_not_found", Some(id.clone()))
            }
            AppError::ListingNotFound(id) => {
                (StatusCode::NOT_FOUND, "listing_not_found", Some(id.clone()))
            }
            AppError::UserNotFound(id) => {
                (StatusCode::NOT_FOUND, "user_not_found", Some(id.clone()))
            }
            AppError::RouteNotFound => (StatusCode::NOT_FOUND, "route_not_found", None),

            // Domain errors - map to appropriate HTTP status
            AppError::Domain(domain_err) => {
                let status = if domain_err.is_client_error() {
                    StatusCode::BAD_REQUEST
                } else if domain_err.is_forbidden() {
                    StatusCode::FORBIDDEN
                } else if domain_err.is_conflict_error() {
                    StatusCode::CONFLICT
                } else {
                    StatusCode::UNPROCESSABLE_ENTITY
                };
                let details = match domain_err {
                    DomainError::AlreadyRated { exchange_id } => {
                        Some(exchange_id.clone())
                    }
                    _ => None,
                };
                (status, domain_err.error_code(), details)
            }

            // 500 Internal Server Error
            AppError::Store(e) => {
                tracing::error!("Store error: {:?}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "server_error", None)
            }
            AppError::Database(e) => {
                tracing::error!("Database error: {:?}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "server_error", None)
            }
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "server_error", None)
            }
            AppError::Config(e) => {
                tracing::error!("Config error: {:?}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "server_error", None)
            }
        };

        let error = if status.is_server_error() {
            SERVER_ERROR_MESSAGE.to_string()
        } else {
            self.to_string()
        };

        let body = ErrorResponse {
            error,
            error_code: error_code.to_string(),
            details,
        };

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_require_lists_missing_fields() {
        assert!(AppError::require(&[("toUserId", true), ("score", true)]).is_ok());

        let err = AppError::require(&[("toUserId", true), ("exchangeId", false), ("score", false)])
            .unwrap_err();
        assert!(matches!(&err, AppError::MissingFields(f) if f == &vec!["exchangeId", "score"]));
        assert_eq!(err.to_string(), "Missing required fields: exchangeId, score");
    }

    #[test]
    fn test_status_mapping() {
        let cases = vec![
            (AppError::MissingFields(vec!["score"]), StatusCode::BAD_REQUEST),
            (AppError::Domain(DomainError::InvalidScore(9)), StatusCode::BAD_REQUEST),
            (AppError::InvalidToken, StatusCode::UNAUTHORIZED),
            (AppError::Domain(DomainError::NotExchangeParty), StatusCode::FORBIDDEN),
            (AppError::ExchangeNotFound("x".into()), StatusCode::NOT_FOUND),
            (AppError::Domain(DomainError::already_rated("x")), StatusCode::CONFLICT),
            (AppError::Database(sqlx::Error::PoolTimedOut), StatusCode::INTERNAL_SERVER_ERROR),
        ];

        for (err, expected) in cases {
            assert_eq!(err.into_response().status(), expected);
        }
    }

    #[tokio::test]
    async fn test_domain_errors_follow_their_category() {
        let all = vec![
            DomainError::InvalidScore(0),
            DomainError::SelfRating,
            DomainError::NotExchangeParty,
            DomainError::NotCounterparty,
            DomainError::already_rated("e1"),
            DomainError::InvalidStatus("LOST".into()),
            DomainError::InvalidReportTarget("post".into()),
        ];

        for domain_err in all {
            let expected = if domain_err.is_client_error() {
                StatusCode::BAD_REQUEST
            } else if domain_err.is_forbidden() {
                StatusCode::FORBIDDEN
            } else {
                assert!(domain_err.is_conflict_error(), "{domain_err:?} has no category");
                StatusCode::CONFLICT
            };
            let code = domain_err.error_code();

            let response = AppError::Domain(domain_err).into_response();
            assert_eq!(response.status(), expected);

            let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
            let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
            assert_eq!(body["error_code"], code);
        }
    }

    #[tokio::test]
    async fn test_already_rated_details_carry_exchange_id() {
        let response = AppError::Domain(DomainError::already_rated("e42")).into_response();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["details"], "e42");
    }
}

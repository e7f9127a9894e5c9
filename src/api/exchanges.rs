//! Exchange offer endpoints

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::{DomainError, ExchangeOffer, ExchangeStatus};
use crate::error::AppError;

use super::middleware::RequestUser;

const EXCHANGE_COLUMNS: &str =
    "id, listing_id, from_user_id, to_user_id, proposed_listing_ids, message, status, created_at";

/// Body of `POST /api/exchanges`
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateExchangeRequest {
    pub listing_id: Option<Uuid>,
    #[serde(default)]
    pub proposed_listing_ids: Vec<Uuid>,
    pub message: Option<String>,
}

/// Body of `POST /api/exchanges/:id/status`
#[derive(Debug, Default, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: Option<String>,
}

impl UpdateStatusRequest {
    fn target_status(&self) -> Result<ExchangeStatus, AppError> {
        AppError::require(&[("status", self.status.is_some())])?;

        let status: ExchangeStatus = self.status.as_deref().unwrap_or_default().parse()?;
        if !status.is_settable() {
            return Err(DomainError::InvalidStatus(status.to_string()).into());
        }
        Ok(status)
    }
}

// =========================================================================
// POST /api/exchanges
// =========================================================================

/// Propose an exchange on someone else's listing
pub async fn create_exchange(
    State(pool): State<PgPool>,
    user: RequestUser,
    payload: Result<Json<CreateExchangeRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<ExchangeOffer>), AppError> {
    let Json(request) = payload.map_err(|e| AppError::InvalidRequest(e.body_text()))?;

    let Some(listing_id) = request.listing_id else {
        return Err(AppError::MissingFields(vec!["listingId"]));
    };

    let owner_id: Uuid = sqlx::query_scalar("SELECT owner_id FROM listings WHERE id = $1")
        .bind(listing_id)
        .fetch_optional(&pool)
        .await?
        .ok_or_else(|| AppError::ListingNotFound(listing_id.to_string()))?;

    if owner_id == user.user_id {
        return Err(AppError::InvalidRequest(
            "Cannot propose an exchange on your own listing".to_string(),
        ));
    }

    let sql = format!(
        r#"
        INSERT INTO exchange_offers (id, listing_id, from_user_id, to_user_id,
                                     proposed_listing_ids, message, status)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        RETURNING {EXCHANGE_COLUMNS}
        "#
    );

    let exchange = sqlx::query_as::<_, ExchangeOffer>(&sql)
        .bind(Uuid::new_v4())
        .bind(listing_id)
        .bind(user.user_id)
        .bind(owner_id)
        .bind(&request.proposed_listing_ids)
        .bind(request.message.as_deref())
        .bind(ExchangeStatus::Pending.as_str())
        .fetch_one(&pool)
        .await?;

    tracing::info!(
        exchange_id = %exchange.id,
        listing_id = %listing_id,
        from_user_id = %user.user_id,
        "Exchange proposed"
    );

    Ok((StatusCode::CREATED, Json(exchange)))
}

// =========================================================================
// GET /api/exchanges/mine
// =========================================================================

/// Exchanges where the caller is either party, newest first
pub async fn my_exchanges(
    State(pool): State<PgPool>,
    user: RequestUser,
) -> Result<Json<Vec<ExchangeOffer>>, AppError> {
    let sql = format!(
        r#"
        SELECT {EXCHANGE_COLUMNS}
        FROM exchange_offers
        WHERE from_user_id = $1 OR to_user_id = $1
        ORDER BY created_at DESC
        "#
    );

    let exchanges = sqlx::query_as::<_, ExchangeOffer>(&sql)
        .bind(user.user_id)
        .fetch_all(&pool)
        .await?;

    Ok(Json(exchanges))
}

// =========================================================================
// POST /api/exchanges/:exchange_id/status
// =========================================================================

/// Move an exchange to a new status; only the recipient may do so
pub async fn update_status(
    State(pool): State<PgPool>,
    user: RequestUser,
    Path(exchange_id): Path<Uuid>,
    payload: Result<Json<UpdateStatusRequest>, JsonRejection>,
) -> Result<Json<ExchangeOffer>, AppError> {
    let Json(request) = payload.map_err(|e| AppError::InvalidRequest(e.body_text()))?;
    let status = request.target_status()?;

    let recipient: Uuid =
        sqlx::query_scalar("SELECT to_user_id FROM exchange_offers WHERE id = $1")
            .bind(exchange_id)
            .fetch_optional(&pool)
            .await?
            .ok_or_else(|| AppError::ExchangeNotFound(exchange_id.to_string()))?;

    if recipient != user.user_id {
        return Err(AppError::Forbidden(
            "Only the recipient may change the exchange status".to_string(),
        ));
    }

    let sql = format!(
        r#"
        UPDATE exchange_offers SET status = $2
        WHERE id = $1
        RETURNING {EXCHANGE_COLUMNS}
        "#
    );

    let exchange = sqlx::query_as::<_, ExchangeOffer>(&sql)
        .bind(exchange_id)
        .bind(status.as_str())
        .fetch_one(&pool)
        .await?;

    tracing::info!(exchange_id = %exchange_id, status = %status, "Exchange status updated");

    Ok(Json(exchange))
}

//! Exchange chat endpoints
//!
//! Only the two parties of an exchange can read or post its messages.

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::listing::non_blank;
use crate::error::AppError;
use crate::store::{ExchangeLookup, PgStore};

use super::middleware::RequestUser;

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub id: Uuid,
    pub exchange_id: Uuid,
    pub sender_id: Uuid,
    pub text: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Default, Deserialize)]
pub struct PostMessageRequest {
    pub text: Option<String>,
}

impl PostMessageRequest {
    /// The text as sent; blank text counts as missing
    fn message_text(self) -> Result<String, AppError> {
        match self.text {
            Some(text) if non_blank(Some(text.as_str())).is_some() => Ok(text),
            _ => Err(AppError::MissingFields(vec!["text"])),
        }
    }
}

/// 404 if the exchange is missing, 403 if the caller is not a party
async fn ensure_party(pool: &PgPool, exchange_id: Uuid, user_id: Uuid) -> Result<(), AppError> {
    let parties = PgStore::new(pool.clone())
        .find_exchange_by_id(exchange_id)
        .await?
        .ok_or_else(|| AppError::ExchangeNotFound(exchange_id.to_string()))?;

    if !parties.involves(user_id) {
        return Err(AppError::Forbidden("Not a party to this exchange".to_string()));
    }

    Ok(())
}

/// Messages of an exchange, oldest first
pub async fn list_messages(
    State(pool): State<PgPool>,
    user: RequestUser,
    Path(exchange_id): Path<Uuid>,
) -> Result<Json<Vec<ChatMessage>>, AppError> {
    ensure_party(&pool, exchange_id, user.user_id).await?;

    let messages = sqlx::query_as::<_, ChatMessage>(
        r#"
        SELECT id, exchange_id, sender_id, text, created_at
        FROM chat_messages
        WHERE exchange_id = $1
        ORDER BY created_at ASC
        "#,
    )
    .bind(exchange_id)
    .fetch_all(&pool)
    .await?;

    Ok(Json(messages))
}

/// Post a message as the caller
pub async fn post_message(
    State(pool): State<PgPool>,
    user: RequestUser,
    Path(exchange_id): Path<Uuid>,
    payload: Result<Json<PostMessageRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<ChatMessage>), AppError> {
    let Json(request) = payload.map_err(|e| AppError::InvalidRequest(e.body_text()))?;

    let text = request.message_text()?;

    ensure_party(&pool, exchange_id, user.user_id).await?;

    let message = sqlx::query_as::<_, ChatMessage>(
        r#"
        INSERT INTO chat_messages (id, exchange_id, sender_id, text)
        VALUES ($1, $2, $3, $4)
        RETURNING id, exchange_id, sender_id, text, created_at
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(exchange_id)
    .bind(user.user_id)
    .bind(text)
    .fetch_one(&pool)
    .await?;

    tracing::debug!(exchange_id = %exchange_id, sender_id = %user.user_id, "Chat message posted");

    Ok((StatusCode::CREATED, Json(message)))
}

//! Abuse reports

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::listing::non_blank;
use crate::domain::ReportTarget;
use crate::error::AppError;

use super::middleware::RequestUser;

/// Body of `POST /api/reports`
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateReportRequest {
    pub target_type: Option<String>,
    pub target_user_id: Option<Uuid>,
    pub target_listing_id: Option<Uuid>,
    pub target_exchange_id: Option<Uuid>,
    pub category: Option<String>,
    pub message: Option<String>,
}

#[derive(Debug, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    pub id: Uuid,
    pub reporter_id: Uuid,
    pub target_type: String,
    pub target_user_id: Option<Uuid>,
    pub target_listing_id: Option<Uuid>,
    pub target_exchange_id: Option<Uuid>,
    pub category: String,
    pub message: String,
    pub created_at: DateTime<Utc>,
}

/// File a report. A report naming a user bumps that user's report count in
/// the same transaction.
pub async fn create_report(
    State(pool): State<PgPool>,
    user: RequestUser,
    payload: Result<Json<CreateReportRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Report>), AppError> {
    let Json(request) = payload.map_err(|e| AppError::InvalidRequest(e.body_text()))?;

    let target_type = non_blank(request.target_type.as_deref());
    let category = non_blank(request.category.as_deref());
    let message = non_blank(request.message.as_deref());

    AppError::require(&[
        ("targetType", target_type.is_some()),
        ("category", category.is_some()),
        ("message", message.is_some()),
    ])?;

    let target: ReportTarget = target_type.unwrap_or_default().parse()?;

    let mut tx = pool.begin().await?;

    if let Some(target_user_id) = request.target_user_id {
        let updated = sqlx::query("UPDATE users SET report_count = report_count + 1 WHERE id = $1")
            .bind(target_user_id)
            .execute(&mut *tx)
            .await?;

        if updated.rows_affected() == 0 {
            return Err(AppError::UserNotFound(target_user_id.to_string()));
        }
    }

    let report = sqlx::query_as::<_, Report>(
        r#"
        INSERT INTO reports (id, reporter_id, target_type, target_user_id, target_listing_id,
                             target_exchange_id, category, message)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        RETURNING id, reporter_id, target_type, target_user_id, target_listing_id,
                  target_exchange_id, category, message, created_at
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(user.user_id)
    .bind(target.as_str())
    .bind(request.target_user_id)
    .bind(request.target_listing_id)
    .bind(request.target_exchange_id)
    .bind(category)
    .bind(message)
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;

    tracing::info!(
        report_id = %report.id,
        target_type = target.as_str(),
        target_user_id = ?request.target_user_id,
        "Report filed"
    );

    Ok((StatusCode::CREATED, Json(report)))
}

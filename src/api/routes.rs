//! API Routes
//!
//! Router assembly plus the rating and user profile endpoints.

use axum::{
    extract::{rejection::JsonRejection, Extension, Path, Query, State},
    http::StatusCode,
    middleware,
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use tower_http::{
    cors::CorsLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use uuid::Uuid;

use crate::domain::{OperationContext, Rating, RatingAggregate, TrustBadges};
use crate::error::AppError;
use crate::handlers::{RatingAggregator, SubmitRatingCommand};
use crate::state::AppState;

use super::middleware::{auth_middleware, logging_middleware, RequestUser};
use super::{chat, exchanges, listings, reports};

/// Ratings shown on a public profile
const PUBLIC_PROFILE_RATINGS: i64 = 20;

// =========================================================================
// Request/Response types
// =========================================================================

/// Body of `POST /api/ratings`. Every field is optional here so that absent
/// fields produce a 400 listing them instead of a deserialization failure.
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitRatingRequest {
    #[serde(default)]
    pub to_user_id: Option<Uuid>,
    #[serde(default)]
    pub exchange_id: Option<Uuid>,
    #[serde(default)]
    pub score: Option<i64>,
    #[serde(default)]
    pub comment: Option<String>,
}

impl SubmitRatingRequest {
    fn into_command(self) -> Result<SubmitRatingCommand, AppError> {
        let (to_user_id, exchange_id, score) = match (self.to_user_id, self.exchange_id, self.score) {
            (Some(to_user_id), Some(exchange_id), Some(score)) => (to_user_id, exchange_id, score),
            (to_user_id, exchange_id, score) => {
                let missing = [
                    ("toUserId", to_user_id.is_none()),
                    ("exchangeId", exchange_id.is_none()),
                    ("score", score.is_none()),
                ]
                .into_iter()
                .filter_map(|(name, absent)| absent.then_some(name))
                .collect();
                return Err(AppError::MissingFields(missing));
            }
        };

        let command = SubmitRatingCommand::new(to_user_id, exchange_id, score);
        Ok(match self.comment {
            Some(comment) => command.with_comment(comment),
            None => command,
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct PageQuery {
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}

fn default_limit() -> i64 {
    50
}

#[derive(Debug, sqlx::FromRow)]
struct UserRow {
    id: Uuid,
    email: String,
    pseudo: String,
    city: String,
    zip_code: String,
    rating: f64,
    rating_count: i64,
    trust_score: i32,
    report_count: i32,
    warning_count: i32,
    email_verified: bool,
    created_at: DateTime<Utc>,
}

impl UserRow {
    fn aggregate(&self) -> RatingAggregate {
        RatingAggregate {
            rating: self.rating,
            rating_count: self.rating_count,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MeResponse {
    pub id: Uuid,
    pub email: String,
    pub pseudo: String,
    pub city: String,
    pub zip_code: String,
    pub rating: f64,
    pub rating_count: i64,
    pub trust_score: i32,
    pub report_count: i32,
    pub warning_count: i32,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicProfileResponse {
    pub id: Uuid,
    pub pseudo: String,
    pub city: String,
    pub rating: f64,
    pub rating_count: i64,
    pub created_at: DateTime<Utc>,
    pub listings_count: i64,
    pub trust_score: i32,
    pub badges: TrustBadges,
    pub last_ratings: Vec<Rating>,
}

// =========================================================================
// API Router
// =========================================================================

/// Create the full application router.
///
/// Every route sees the auth middleware; routes that need a caller take
/// [`RequestUser`] and answer 401 when no valid token was sent.
pub fn create_router(state: AppState) -> Router {
    let api = Router::new()
        // Ratings
        .route("/ratings", post(submit_rating))
        // Users
        .route("/users/me", get(get_me))
        .route("/users/:user_id/public", get(get_public_profile))
        .route("/users/:user_id/ratings", get(get_user_ratings))
        // Listings
        .route("/listings", get(listings::list_listings).post(listings::create_listing))
        .route(
            "/listings/:listing_id",
            get(listings::get_listing)
                .put(listings::update_listing)
                .delete(listings::archive_listing),
        )
        // Exchanges
        .route("/exchanges", post(exchanges::create_exchange))
        .route("/exchanges/mine", get(exchanges::my_exchanges))
        .route("/exchanges/:exchange_id/status", post(exchanges::update_status))
        // Chat
        .route(
            "/chat/:exchange_id",
            get(chat::list_messages).post(chat::post_message),
        )
        // Reports
        .route("/reports", post(reports::create_report));

    // Layers run last-added first:
    // request id -> trace -> cors -> auth -> logging -> handler
    Router::new()
        .route("/health", get(health_check))
        .nest("/api", api)
        .fallback(route_not_found)
        .layer(middleware::from_fn(logging_middleware))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .with_state(state)
}

/// Health check endpoint
async fn health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn route_not_found() -> AppError {
    AppError::RouteNotFound
}

// =========================================================================
// POST /api/ratings
// =========================================================================

/// Rate the counterparty of an exchange
async fn submit_rating(
    State(aggregator): State<RatingAggregator>,
    Extension(context): Extension<OperationContext>,
    _user: RequestUser,
    payload: Result<Json<SubmitRatingRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Rating>), AppError> {
    let Json(request) = payload.map_err(|e| AppError::InvalidRequest(e.body_text()))?;
    let command = request.into_command()?;

    let rating = aggregator.submit_rating(command, &context).await?;

    Ok((StatusCode::CREATED, Json(rating)))
}

// =========================================================================
// GET /api/users/:user_id/ratings
// =========================================================================

/// Ratings a user received, newest first
async fn get_user_ratings(
    State(pool): State<PgPool>,
    Path(user_id): Path<Uuid>,
    Query(page): Query<PageQuery>,
) -> Result<Json<Vec<Rating>>, AppError> {
    let ratings = fetch_ratings(&pool, user_id, page.limit.clamp(1, 200), page.offset.max(0)).await?;
    Ok(Json(ratings))
}

async fn fetch_ratings(
    pool: &PgPool,
    user_id: Uuid,
    limit: i64,
    offset: i64,
) -> Result<Vec<Rating>, AppError> {
    let ratings = sqlx::query_as::<_, Rating>(
        r#"
        SELECT id, from_user_id, to_user_id, exchange_id, score, comment, created_at
        FROM ratings
        WHERE to_user_id = $1
        ORDER BY created_at DESC
        LIMIT $2 OFFSET $3
        "#,
    )
    .bind(user_id)
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await?;

    Ok(ratings)
}

// =========================================================================
// GET /api/users/me
// =========================================================================

async fn fetch_user(pool: &PgPool, user_id: Uuid) -> Result<UserRow, AppError> {
    sqlx::query_as::<_, UserRow>(
        r#"
        SELECT id, email, pseudo, city, zip_code, rating, rating_count, trust_score,
               report_count, warning_count, email_verified, created_at
        FROM users
        WHERE id = $1
        "#,
    )
    .bind(user_id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| AppError::UserNotFound(user_id.to_string()))
}

/// Full profile of the caller
async fn get_me(
    State(pool): State<PgPool>,
    user: RequestUser,
) -> Result<Json<MeResponse>, AppError> {
    let row = fetch_user(&pool, user.user_id).await?;

    Ok(Json(MeResponse {
        id: row.id,
        email: row.email,
        pseudo: row.pseudo,
        city: row.city,
        zip_code: row.zip_code,
        rating: row.rating,
        rating_count: row.rating_count,
        trust_score: row.trust_score,
        report_count: row.report_count,
        warning_count: row.warning_count,
        created_at: row.created_at,
    }))
}

// =========================================================================
// GET /api/users/:user_id/public
// =========================================================================

/// Public profile with trust badges and latest ratings
async fn get_public_profile(
    State(pool): State<PgPool>,
    Path(user_id): Path<Uuid>,
) -> Result<Json<PublicProfileResponse>, AppError> {
    let row = fetch_user(&pool, user_id).await?;

    let listings_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM listings WHERE owner_id = $1")
        .bind(user_id)
        .fetch_one(&pool)
        .await?;

    let last_ratings = fetch_ratings(&pool, user_id, PUBLIC_PROFILE_RATINGS, 0).await?;
    let badges = TrustBadges::evaluate(row.email_verified, &row.aggregate());

    Ok(Json(PublicProfileResponse {
        id: row.id,
        pseudo: row.pseudo,
        city: row.city,
        rating: row.rating,
        rating_count: row.rating_count,
        created_at: row.created_at,
        listings_count,
        trust_score: row.trust_score,
        badges,
        last_ratings,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_submit_rating_request_deserialize() {
        let json = r#"{
            "toUserId": "550e8400-e29b-41d4-a716-446655440000",
            "exchangeId": "550e8400-e29b-41d4-a716-446655440001",
            "score": 4
        }"#;

        let request: SubmitRatingRequest = serde_json::from_str(json).unwrap();
        let command = request.into_command().unwrap();
        assert_eq!(command.score, 4);
        assert!(command.comment.is_none());
    }

    #[test]
    fn test_submit_rating_request_missing_score() {
        let json = r#"{
            "toUserId": "550e8400-e29b-41d4-a716-446655440000",
            "exchangeId": "550e8400-e29b-41d4-a716-446655440001"
        }"#;

        let request: SubmitRatingRequest = serde_json::from_str(json).unwrap();
        let err = request.into_command().unwrap_err();
        assert!(matches!(err, AppError::MissingFields(ref f) if f == &vec!["score"]));
    }

    #[test]
    fn test_submit_rating_request_lists_every_missing_field() {
        let err = SubmitRatingRequest::default().into_command().unwrap_err();
        assert!(matches!(
            err,
            AppError::MissingFields(ref f) if f == &vec!["toUserId", "exchangeId", "score"]
        ));
    }

    #[test]
    fn test_page_query_defaults() {
        let query: PageQuery = serde_json::from_str("{}").unwrap();
        assert_eq!(query.limit, 50);
        assert_eq!(query.offset, 0);
    }
}

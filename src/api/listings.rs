//! Listing endpoints
//!
//! Public browsing of active listings plus owner-only create, update and
//! archive.

use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::domain::listing::non_blank;
use crate::domain::ListingStatus;
use crate::error::AppError;

use super::middleware::RequestUser;

/// Maximum listings returned by a search
const SEARCH_LIMIT: i64 = 50;

#[derive(Debug, Default, Deserialize)]
pub struct ListingQuery {
    pub q: Option<String>,
    pub category: Option<String>,
    pub city: Option<String>,
}

/// Body of `POST /api/listings`
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateListingRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub city: Option<String>,
    pub zip_code: Option<String>,
    #[serde(default)]
    pub open_to_any_offer: bool,
    #[serde(default)]
    pub offers_what: Vec<String>,
    #[serde(default)]
    pub wants_what: Vec<String>,
    #[serde(default, rename = "imageUrls", alias = "images")]
    pub images: Vec<String>,
}

/// Body of `PUT /api/listings/:id`. Absent fields are left unchanged;
/// `imageUrls`, when present, replaces the whole set. `status` lets the
/// owner reactivate an archived listing.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateListingRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub city: Option<String>,
    pub zip_code: Option<String>,
    pub open_to_any_offer: Option<bool>,
    pub offers_what: Option<Vec<String>>,
    pub wants_what: Option<Vec<String>>,
    #[serde(default, rename = "imageUrls", alias = "images")]
    pub images: Option<Vec<String>>,
    pub status: Option<String>,
}

impl UpdateListingRequest {
    /// Parse the requested status, if any
    fn target_status(&self) -> Result<Option<ListingStatus>, AppError> {
        match non_blank(self.status.as_deref()) {
            Some(status) => Ok(Some(status.parse()?)),
            None => Ok(None),
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct ListingRow {
    id: Uuid,
    owner_id: Uuid,
    title: String,
    description: String,
    category: String,
    city: String,
    zip_code: String,
    open_to_any_offer: bool,
    offers_what: Vec<String>,
    wants_what: Vec<String>,
    status: String,
    created_at: DateTime<Utc>,
    owner_pseudo: String,
    owner_rating: f64,
    owner_rating_count: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OwnerSummary {
    pub id: Uuid,
    pub pseudo: String,
    pub rating: f64,
    pub rating_count: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListingResponse {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub category: String,
    pub city: String,
    pub zip_code: String,
    pub open_to_any_offer: bool,
    pub offers_what: Vec<String>,
    pub wants_what: Vec<String>,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub owner: OwnerSummary,
    pub images: Vec<String>,
}

impl ListingResponse {
    fn from_row(row: ListingRow, images: Vec<String>) -> Self {
        Self {
            id: row.id,
            title: row.title,
            description: row.description,
            category: row.category,
            city: row.city,
            zip_code: row.zip_code,
            open_to_any_offer: row.open_to_any_offer,
            offers_what: row.offers_what,
            wants_what: row.wants_what,
            status: row.status,
            created_at: row.created_at,
            owner: OwnerSummary {
                id: row.owner_id,
                pseudo: row.owner_pseudo,
                rating: row.owner_rating,
                rating_count: row.owner_rating_count,
            },
            images,
        }
    }
}

const LISTING_SELECT: &str = r#"
    SELECT l.id, l.owner_id, l.title, l.description, l.category, l.city, l.zip_code,
           l.open_to_any_offer, l.offers_what, l.wants_what, l.status, l.created_at,
           u.pseudo AS owner_pseudo, u.rating AS owner_rating,
           u.rating_count AS owner_rating_count
    FROM listings l
    JOIN users u ON u.id = l.owner_id
"#;

/// Escape `%`, `_` and `\` so user input matches literally inside ILIKE
pub fn like_pattern(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len() + 2);
    escaped.push('%');
    for c in input.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}

// =========================================================================
// GET /api/listings
// =========================================================================

/// Search active listings, newest first
pub async fn list_listings(
    State(pool): State<PgPool>,
    Query(query): Query<ListingQuery>,
) -> Result<Json<Vec<ListingResponse>>, AppError> {
    let pattern = non_blank(query.q.as_deref()).map(like_pattern);
    let category = non_blank(query.category.as_deref());
    let city = non_blank(query.city.as_deref());

    let sql = format!(
        r#"{LISTING_SELECT}
        WHERE l.status = $1
          AND ($2::text IS NULL OR l.title ILIKE $2 OR l.description ILIKE $2)
          AND ($3::text IS NULL OR l.category = $3)
          AND ($4::text IS NULL OR l.city = $4)
        ORDER BY l.created_at DESC
        LIMIT $5
        "#
    );

    let rows = sqlx::query_as::<_, ListingRow>(&sql)
        .bind(ListingStatus::Active.as_str())
        .bind(pattern)
        .bind(category)
        .bind(city)
        .bind(SEARCH_LIMIT)
        .fetch_all(&pool)
        .await?;

    let ids: Vec<Uuid> = rows.iter().map(|row| row.id).collect();
    let images: Vec<(Uuid, String)> = sqlx::query_as(
        r#"
        SELECT listing_id, url
        FROM listing_images
        WHERE listing_id = ANY($1)
        ORDER BY listing_id, position
        "#,
    )
    .bind(&ids)
    .fetch_all(&pool)
    .await?;

    let listings = rows
        .into_iter()
        .map(|row| {
            let urls = images
                .iter()
                .filter(|(listing_id, _)| *listing_id == row.id)
                .map(|(_, url)| url.clone())
                .collect();
            ListingResponse::from_row(row, urls)
        })
        .collect();

    Ok(Json(listings))
}

// =========================================================================
// GET /api/listings/:listing_id
// =========================================================================

async fn load_listing(
    conn: &mut PgConnection,
    listing_id: Uuid,
) -> Result<ListingResponse, AppError> {
    let sql = format!("{LISTING_SELECT} WHERE l.id = $1");

    let row = sqlx::query_as::<_, ListingRow>(&sql)
        .bind(listing_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| AppError::ListingNotFound(listing_id.to_string()))?;

    let images: Vec<String> = sqlx::query_scalar(
        "SELECT url FROM listing_images WHERE listing_id = $1 ORDER BY position",
    )
    .bind(listing_id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(ListingResponse::from_row(row, images))
}

pub async fn get_listing(
    State(pool): State<PgPool>,
    Path(listing_id): Path<Uuid>,
) -> Result<Json<ListingResponse>, AppError> {
    let mut conn = pool.acquire().await?;
    Ok(Json(load_listing(&mut conn, listing_id).await?))
}

// =========================================================================
// POST /api/listings
// =========================================================================

async fn replace_images(
    conn: &mut PgConnection,
    listing_id: Uuid,
    urls: &[String],
) -> Result<(), AppError> {
    sqlx::query("DELETE FROM listing_images WHERE listing_id = $1")
        .bind(listing_id)
        .execute(&mut *conn)
        .await?;

    for (position, url) in urls.iter().enumerate() {
        sqlx::query(
            r#"
            INSERT INTO listing_images (id, listing_id, url, position)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(listing_id)
        .bind(url)
        .bind(position as i32)
        .execute(&mut *conn)
        .await?;
    }

    Ok(())
}

/// Create a listing owned by the caller
pub async fn create_listing(
    State(pool): State<PgPool>,
    user: RequestUser,
    payload: Result<Json<CreateListingRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<ListingResponse>), AppError> {
    let Json(request) = payload.map_err(|e| AppError::InvalidRequest(e.body_text()))?;

    let title = non_blank(request.title.as_deref());
    let description = non_blank(request.description.as_deref());
    let category = non_blank(request.category.as_deref());
    let city = non_blank(request.city.as_deref());
    let zip_code = non_blank(request.zip_code.as_deref());

    AppError::require(&[
        ("title", title.is_some()),
        ("description", description.is_some()),
        ("category", category.is_some()),
        ("city", city.is_some()),
        ("zipCode", zip_code.is_some()),
    ])?;

    let listing_id = Uuid::new_v4();
    let mut tx = pool.begin().await?;

    sqlx::query(
        r#"
        INSERT INTO listings (id, owner_id, title, description, category, city, zip_code,
                              open_to_any_offer, offers_what, wants_what, status)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
        "#,
    )
    .bind(listing_id)
    .bind(user.user_id)
    .bind(title)
    .bind(description)
    .bind(category)
    .bind(city)
    .bind(zip_code)
    .bind(request.open_to_any_offer)
    .bind(&request.offers_what)
    .bind(&request.wants_what)
    .bind(ListingStatus::Active.as_str())
    .execute(&mut *tx)
    .await?;

    replace_images(&mut tx, listing_id, &request.images).await?;
    let listing = load_listing(&mut tx, listing_id).await?;

    tx.commit().await?;

    tracing::info!(listing_id = %listing_id, owner_id = %user.user_id, "Listing created");

    Ok((StatusCode::CREATED, Json(listing)))
}

// =========================================================================
// PUT /api/listings/:listing_id
// =========================================================================

/// Lock the listing and check that the caller owns it
async fn lock_owned_listing(
    conn: &mut PgConnection,
    listing_id: Uuid,
    user_id: Uuid,
) -> Result<(), AppError> {
    let owner_id: Uuid =
        sqlx::query_scalar("SELECT owner_id FROM listings WHERE id = $1 FOR NO KEY UPDATE")
            .bind(listing_id)
            .fetch_optional(&mut *conn)
            .await?
            .ok_or_else(|| AppError::ListingNotFound(listing_id.to_string()))?;

    if owner_id != user_id {
        return Err(AppError::Forbidden("Only the owner may modify this listing".to_string()));
    }

    Ok(())
}

/// Partially update a listing owned by the caller
pub async fn update_listing(
    State(pool): State<PgPool>,
    user: RequestUser,
    Path(listing_id): Path<Uuid>,
    payload: Result<Json<UpdateListingRequest>, JsonRejection>,
) -> Result<Json<ListingResponse>, AppError> {
    let Json(request) = payload.map_err(|e| AppError::InvalidRequest(e.body_text()))?;
    let status = request.target_status()?;

    let mut tx = pool.begin().await?;
    lock_owned_listing(&mut tx, listing_id, user.user_id).await?;

    sqlx::query(
        r#"
        UPDATE listings SET
            title = COALESCE($2, title),
            description = COALESCE($3, description),
            category = COALESCE($4, category),
            city = COALESCE($5, city),
            zip_code = COALESCE($6, zip_code),
            open_to_any_offer = COALESCE($7, open_to_any_offer),
            offers_what = COALESCE($8, offers_what),
            wants_what = COALESCE($9, wants_what),
            status = COALESCE($10, status)
        WHERE id = $1
        "#,
    )
    .bind(listing_id)
    .bind(non_blank(request.title.as_deref()))
    .bind(non_blank(request.description.as_deref()))
    .bind(non_blank(request.category.as_deref()))
    .bind(non_blank(request.city.as_deref()))
    .bind(non_blank(request.zip_code.as_deref()))
    .bind(request.open_to_any_offer)
    .bind(&request.offers_what)
    .bind(&request.wants_what)
    .bind(status.map(|s| s.as_str()))
    .execute(&mut *tx)
    .await?;

    if let Some(images) = &request.images {
        replace_images(&mut tx, listing_id, images).await?;
    }

    let listing = load_listing(&mut tx, listing_id).await?;
    tx.commit().await?;

    tracing::info!(listing_id = %listing_id, "Listing updated");

    Ok(Json(listing))
}

// =========================================================================
// DELETE /api/listings/:listing_id
// =========================================================================

/// Archive a listing owned by the caller. Archived listings stay reachable
/// by id so past exchanges keep their context.
pub async fn archive_listing(
    State(pool): State<PgPool>,
    user: RequestUser,
    Path(listing_id): Path<Uuid>,
) -> Result<Json<ListingResponse>, AppError> {
    let mut tx = pool.begin().await?;
    lock_owned_listing(&mut tx, listing_id, user.user_id).await?;

    sqlx::query("UPDATE listings SET status = $2 WHERE id = $1")
        .bind(listing_id)
        .bind(ListingStatus::Archived.as_str())
        .execute(&mut *tx)
        .await?;

    let listing = load_listing(&mut tx, listing_id).await?;
    tx.commit().await?;

    tracing::info!(listing_id = %listing_id, "Listing archived");

    Ok(Json(listing))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern("velo"), "%velo%");
        assert_eq!(like_pattern("50%_off"), "%50\\%\\_off%");
        assert_eq!(like_pattern("a\\b"), "%a\\\\b%");
    }

    #[test]
    fn test_create_request_defaults() {
        let request: CreateListingRequest =
            serde_json::from_str(r#"{"title":"Bike","zipCode":"69001"}"#).unwrap();
        assert_eq!(request.title.as_deref(), Some("Bike"));
        assert_eq!(request.zip_code.as_deref(), Some("69001"));
        assert!(!request.open_to_any_offer);
        assert!(request.images.is_empty());
    }

    #[test]
    fn test_update_request_distinguishes_absent_images() {
        let untouched: UpdateListingRequest = serde_json::from_str(r#"{"title":"New"}"#).unwrap();
        assert!(untouched.images.is_none());

        let cleared: UpdateListingRequest = serde_json::from_str(r#"{"imageUrls":[]}"#).unwrap();
        assert_eq!(cleared.images, Some(vec![]));
    }

    #[test]
    fn test_image_urls_field_is_read() {
        let created: CreateListingRequest =
            serde_json::from_str(r#"{"title":"Bike","imageUrls":["http://x/1.jpg"]}"#).unwrap();
        assert_eq!(created.images, vec!["http://x/1.jpg".to_string()]);

        let updated: UpdateListingRequest =
            serde_json::from_str(r#"{"imageUrls":["http://x/2.jpg","http://x/3.jpg"]}"#).unwrap();
        assert_eq!(updated.images.map(|urls| urls.len()), Some(2));

        let legacy: CreateListingRequest =
            serde_json::from_str(r#"{"images":["http://x/4.jpg"]}"#).unwrap();
        assert_eq!(legacy.images.len(), 1);
    }

    #[test]
    fn test_update_status_parsing() {
        let reactivate: UpdateListingRequest =
            serde_json::from_str(r#"{"status":"ACTIVE"}"#).unwrap();
        assert_eq!(reactivate.target_status().unwrap(), Some(ListingStatus::Active));

        let untouched = UpdateListingRequest::default();
        assert_eq!(untouched.target_status().unwrap(), None);

        let bogus: UpdateListingRequest = serde_json::from_str(r#"{"status":"SOLD"}"#).unwrap();
        assert!(matches!(
            bogus.target_status(),
            Err(AppError::Domain(crate::domain::DomainError::InvalidStatus(_)))
        ));
    }
}

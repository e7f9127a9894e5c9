//! Rating Projection
//!
//! Maintains the `users.rating` / `users.rating_count` read model.
//! The stored pair is a cache of the `ratings` table and is always rebuilt
//! from the full rating set, never adjusted incrementally.

use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::domain::RatingAggregate;

/// Drift tolerated between a stored and a recomputed average
const AVERAGE_EPSILON: f64 = 1e-9;

/// Projection Service for the per-user rating aggregate
#[derive(Debug, Clone)]
pub struct RatingProjection {
    pool: PgPool,
}

impl RatingProjection {
    /// Create a new RatingProjection
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    // =========================================================================
    // Row lock
    // =========================================================================

    /// Lock the user row for the rest of the transaction.
    /// Returns false if the user does not exist.
    ///
    /// `NO KEY UPDATE` serializes aggregate writers on this user but leaves
    /// the `KEY SHARE` lock free, so foreign-key checks from ratings written
    /// by this user in another transaction do not wait on it.
    pub async fn lock_user(conn: &mut PgConnection, user_id: Uuid) -> Result<bool, ProjectionError> {
        let locked: Option<Uuid> = sqlx::query_scalar(
            r#"
            SELECT id FROM users WHERE id = $1 FOR NO KEY UPDATE
            "#,
        )
        .bind(user_id)
        .fetch_optional(conn)
        .await?;

        Ok(locked.is_some())
    }

    // =========================================================================
    // Aggregate read / write
    // =========================================================================

    /// Compute average and count over every rating `user_id` received
    pub async fn compute(conn: &mut PgConnection, user_id: Uuid) -> Result<RatingAggregate, ProjectionError> {
        let (average, count): (Option<f64>, i64) = sqlx::query_as(
            r#"
            SELECT AVG(score)::float8, COUNT(*)
            FROM ratings
            WHERE to_user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_one(conn)
        .await?;

        Ok(RatingAggregate::new(average, count))
    }

    /// Overwrite the cached aggregate on the user row
    pub async fn store(
        conn: &mut PgConnection,
        user_id: Uuid,
        aggregate: &RatingAggregate,
    ) -> Result<(), ProjectionError> {
        let rows_affected = sqlx::query(
            r#"
            UPDATE users
            SET rating = $2, rating_count = $3
            WHERE id = $1
            "#,
        )
        .bind(user_id)
        .bind(aggregate.rating)
        .bind(aggregate.rating_count)
        .execute(conn)
        .await?
        .rows_affected();

        if rows_affected == 0 {
            return Err(ProjectionError::UserNotFound(user_id));
        }

        tracing::debug!(
            user_id = %user_id,
            rating = aggregate.rating,
            rating_count = aggregate.rating_count,
            "Rating aggregate updated"
        );

        Ok(())
    }

    // =========================================================================
    // Reconciliation
    // =========================================================================

    /// Users whose stored aggregate differs from their rating set
    pub async fn find_stale_users(&self) -> Result<Vec<Uuid>, ProjectionError> {
        let ids: Vec<Uuid> = sqlx::query_scalar(
            r#"
            SELECT u.id
            FROM users u
            LEFT JOIN (
                SELECT to_user_id, AVG(score)::float8 AS average, COUNT(*) AS total
                FROM ratings
                GROUP BY to_user_id
            ) r ON r.to_user_id = u.id
            WHERE u.rating_count <> COALESCE(r.total, 0)
               OR ABS(u.rating - COALESCE(r.average, 0)) > $1
            ORDER BY u.id
            "#,
        )
        .bind(AVERAGE_EPSILON)
        .fetch_all(&self.pool)
        .await?;

        Ok(ids)
    }

    /// Every user id, for a full rebuild
    pub async fn all_users(&self) -> Result<Vec<Uuid>, ProjectionError> {
        let ids: Vec<Uuid> = sqlx::query_scalar("SELECT id FROM users ORDER BY id")
            .fetch_all(&self.pool)
            .await?;

        Ok(ids)
    }
}

/// Projection errors
#[derive(Debug, thiserror::Error)]
pub enum ProjectionError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("User not found: {0}")]
    UserNotFound(Uuid),
}

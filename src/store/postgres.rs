//! Postgres store
//!
//! Each rating unit of work is one database transaction that starts by
//! locking the rated user's row, so concurrent submissions for the same user
//! run their insert/aggregate/write sequence one after another.

use async_trait::async_trait;
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::domain::{ExchangeParties, NewRating, Rating, RatingAggregate};
use crate::projection::RatingProjection;

use super::{ExchangeLookup, RatingStore, RatingUnitOfWork, StoreError};

/// Store backed by a Postgres pool
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Create a new PgStore
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ExchangeLookup for PgStore {
    async fn find_exchange_by_id(&self, id: Uuid) -> Result<Option<ExchangeParties>, StoreError> {
        let parties: Option<(Uuid, Uuid)> = sqlx::query_as(
            r#"
            SELECT from_user_id, to_user_id
            FROM exchange_offers
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(parties.map(|(from, to)| ExchangeParties::new(from, to)))
    }
}

#[async_trait]
impl RatingStore for PgStore {
    async fn begin_for_user(
        &self,
        user_id: Uuid,
    ) -> Result<Option<Box<dyn RatingUnitOfWork>>, StoreError> {
        let mut tx = self.pool.begin().await?;

        if !RatingProjection::lock_user(&mut tx, user_id).await? {
            tx.rollback().await?;
            return Ok(None);
        }

        Ok(Some(Box::new(PgRatingUnitOfWork { tx })))
    }
}

/// Rating unit of work over an open transaction
struct PgRatingUnitOfWork {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl RatingUnitOfWork for PgRatingUnitOfWork {
    async fn insert_rating(&mut self, rating: NewRating) -> Result<Rating, StoreError> {
        let from_user_id = rating.from_user_id;
        let exchange_id = rating.exchange_id;

        sqlx::query_as::<_, Rating>(
            r#"
            INSERT INTO ratings (id, from_user_id, to_user_id, exchange_id, score, comment)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, from_user_id, to_user_id, exchange_id, score, comment, created_at
            "#,
        )
        .bind(rating.id)
        .bind(rating.from_user_id)
        .bind(rating.to_user_id)
        .bind(rating.exchange_id)
        .bind(rating.score.value())
        .bind(&rating.comment)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(|e| StoreError::from_rating_insert(e, from_user_id, exchange_id))
    }

    async fn aggregate_ratings_for_user(&mut self, user_id: Uuid) -> Result<RatingAggregate, StoreError> {
        Ok(RatingProjection::compute(&mut self.tx, user_id).await?)
    }

    async fn update_user_aggregate(
        &mut self,
        user_id: Uuid,
        aggregate: RatingAggregate,
    ) -> Result<(), StoreError> {
        Ok(RatingProjection::store(&mut self.tx, user_id, &aggregate).await?)
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        self.tx.commit().await?;
        Ok(())
    }
}

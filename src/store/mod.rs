//! Store module
//!
//! Storage seams consumed by the rating flow, with a Postgres backend and an
//! in-memory backend.
//!
//! The rating flow never touches the pool directly: it reads exchange parties
//! through [`ExchangeLookup`] and performs its insert/aggregate/write sequence
//! inside a [`RatingUnitOfWork`] obtained from [`RatingStore`]. A unit of work
//! is exclusive per rated user and is discarded unless committed.

mod error;
pub mod memory;
mod postgres;

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::{ExchangeParties, NewRating, Rating, RatingAggregate};

pub use error::StoreError;
pub use memory::{FailPoint, InMemoryStore};
pub use postgres::PgStore;

/// Read access to exchange parties
#[async_trait]
pub trait ExchangeLookup: Send + Sync {
    async fn find_exchange_by_id(&self, id: Uuid) -> Result<Option<ExchangeParties>, StoreError>;
}

/// Entry point for rating writes
#[async_trait]
pub trait RatingStore: Send + Sync {
    /// Open a unit of work holding exclusive write access to `user_id`'s
    /// aggregate. Returns `None` if the user does not exist.
    async fn begin_for_user(
        &self,
        user_id: Uuid,
    ) -> Result<Option<Box<dyn RatingUnitOfWork>>, StoreError>;
}

/// One atomic rating write. Dropping it without `commit` discards every change.
#[async_trait]
pub trait RatingUnitOfWork: Send {
    async fn insert_rating(&mut self, rating: NewRating) -> Result<Rating, StoreError>;

    async fn aggregate_ratings_for_user(&mut self, user_id: Uuid) -> Result<RatingAggregate, StoreError>;

    async fn update_user_aggregate(
        &mut self,
        user_id: Uuid,
        aggregate: RatingAggregate,
    ) -> Result<(), StoreError>;

    async fn commit(self: Box<Self>) -> Result<(), StoreError>;
}

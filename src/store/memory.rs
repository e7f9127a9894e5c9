//! In-memory store
//!
//! Process-local backend with the same unit-of-work semantics as Postgres:
//! a unit of work holds the state lock until it is committed or dropped and
//! works on a private copy, so an uncommitted unit leaves nothing behind.
//! Failure points can be armed to exercise the rollback paths.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use uuid::Uuid;

use crate::domain::{ExchangeParties, NewRating, Rating, RatingAggregate};

use super::{ExchangeLookup, RatingStore, RatingUnitOfWork, StoreError};

/// Step at which an armed store fails
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailPoint {
    Insert,
    Aggregate,
    Update,
    Commit,
}

#[derive(Debug, Clone, Default)]
struct MarketState {
    users: HashMap<Uuid, RatingAggregate>,
    exchanges: HashMap<Uuid, ExchangeParties>,
    ratings: Vec<Rating>,
}

/// Shared in-memory backend; clones see the same data
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    state: Arc<AsyncMutex<MarketState>>,
    fail_point: Arc<Mutex<Option<FailPoint>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a user with an empty aggregate
    pub async fn add_user(&self, user_id: Uuid) {
        self.state
            .lock()
            .await
            .users
            .insert(user_id, RatingAggregate::default());
    }

    pub async fn add_exchange(&self, exchange_id: Uuid, parties: ExchangeParties) {
        self.state.lock().await.exchanges.insert(exchange_id, parties);
    }

    /// Seed a rating without touching the aggregate
    pub async fn add_rating(&self, rating: Rating) {
        self.state.lock().await.ratings.push(rating);
    }

    /// Stored aggregate for a user
    pub async fn user_aggregate(&self, user_id: Uuid) -> Option<RatingAggregate> {
        self.state.lock().await.users.get(&user_id).copied()
    }

    /// Ratings a user has received, in insertion order
    pub async fn ratings_for(&self, user_id: Uuid) -> Vec<Rating> {
        self.state
            .lock()
            .await
            .ratings
            .iter()
            .filter(|r| r.to_user_id == user_id)
            .cloned()
            .collect()
    }

    pub async fn rating_count(&self) -> usize {
        self.state.lock().await.ratings.len()
    }

    /// Make every later unit of work fail at `point`
    pub fn fail_at(&self, point: FailPoint) {
        *self.fail_point.lock().unwrap_or_else(|e| e.into_inner()) = Some(point);
    }

    pub fn clear_failure(&self) {
        *self.fail_point.lock().unwrap_or_else(|e| e.into_inner()) = None;
    }

    fn armed(&self) -> Option<FailPoint> {
        *self.fail_point.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl ExchangeLookup for InMemoryStore {
    async fn find_exchange_by_id(&self, id: Uuid) -> Result<Option<ExchangeParties>, StoreError> {
        Ok(self.state.lock().await.exchanges.get(&id).copied())
    }
}

#[async_trait]
impl RatingStore for InMemoryStore {
    async fn begin_for_user(
        &self,
        user_id: Uuid,
    ) -> Result<Option<Box<dyn RatingUnitOfWork>>, StoreError> {
        let guard = self.state.clone().lock_owned().await;
        if !guard.users.contains_key(&user_id) {
            return Ok(None);
        }

        let working = guard.clone();
        Ok(Some(Box::new(InMemoryUnitOfWork {
            guard,
            working,
            fail_point: self.armed(),
        })))
    }
}

struct InMemoryUnitOfWork {
    guard: OwnedMutexGuard<MarketState>,
    working: MarketState,
    fail_point: Option<FailPoint>,
}

impl InMemoryUnitOfWork {
    fn check(&self, point: FailPoint) -> Result<(), StoreError> {
        if self.fail_point == Some(point) {
            return Err(StoreError::Unavailable(format!("injected failure at {:?}", point)));
        }
        Ok(())
    }
}

#[async_trait]
impl RatingUnitOfWork for InMemoryUnitOfWork {
    async fn insert_rating(&mut self, rating: NewRating) -> Result<Rating, StoreError> {
        self.check(FailPoint::Insert)?;

        let duplicate = self
            .working
            .ratings
            .iter()
            .any(|r| r.from_user_id == rating.from_user_id && r.exchange_id == rating.exchange_id);
        if duplicate {
            return Err(StoreError::DuplicateRating {
                from_user_id: rating.from_user_id,
                exchange_id: rating.exchange_id,
            });
        }

        let rating = rating.into_rating(Utc::now());
        self.working.ratings.push(rating.clone());
        Ok(rating)
    }

    async fn aggregate_ratings_for_user(&mut self, user_id: Uuid) -> Result<RatingAggregate, StoreError> {
        self.check(FailPoint::Aggregate)?;

        Ok(RatingAggregate::from_scores(
            self.working
                .ratings
                .iter()
                .filter(|r| r.to_user_id == user_id)
                .map(|r| r.score),
        ))
    }

    async fn update_user_aggregate(
        &mut self,
        user_id: Uuid,
        aggregate: RatingAggregate,
    ) -> Result<(), StoreError> {
        self.check(FailPoint::Update)?;

        match self.working.users.get_mut(&user_id) {
            Some(stored) => {
                *stored = aggregate;
                Ok(())
            }
            None => Err(StoreError::Unavailable(format!("user {} missing", user_id))),
        }
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        self.check(FailPoint::Commit)?;

        let InMemoryUnitOfWork {
            mut guard, working, ..
        } = *self;
        *guard = working;
        Ok(())
    }
}

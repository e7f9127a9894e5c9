//! Shared application state

use axum::extract::FromRef;
use sqlx::PgPool;

use crate::auth::TokenService;
use crate::handlers::RatingAggregator;

/// State handed to every route; handlers extract the part they need
#[derive(Clone, FromRef)]
pub struct AppState {
    pub pool: PgPool,
    pub tokens: TokenService,
    pub ratings: RatingAggregator,
}

impl AppState {
    /// Postgres-backed state
    pub fn new(pool: PgPool, tokens: TokenService) -> Self {
        Self {
            ratings: RatingAggregator::new(pool.clone()),
            pool,
            tokens,
        }
    }

    /// Replace the rating aggregator, keeping pool and tokens
    pub fn with_ratings(mut self, ratings: RatingAggregator) -> Self {
        self.ratings = ratings;
        self
    }
}

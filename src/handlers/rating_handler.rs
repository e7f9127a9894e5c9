//! Rating Aggregator
//!
//! Persists a rating and refreshes the rated user's cached aggregate in the
//! same unit of work. Validation runs before the unit of work is opened, so
//! rejected submissions never write anything.

use std::sync::Arc;

use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::{DomainError, NewRating, OperationContext, Rating, RatingAggregate, Score};
use crate::error::{AppError, AppResult};
use crate::store::{ExchangeLookup, PgStore, RatingStore, StoreError};

use super::{RecomputeResult, SubmitRatingCommand};

/// Handler for rating submissions and aggregate recomputation
#[derive(Clone)]
pub struct RatingAggregator {
    exchanges: Arc<dyn ExchangeLookup>,
    ratings: Arc<dyn RatingStore>,
}

impl RatingAggregator {
    /// Aggregator backed by Postgres
    pub fn new(pool: PgPool) -> Self {
        let store = Arc::new(PgStore::new(pool));
        Self {
            exchanges: store.clone(),
            ratings: store,
        }
    }

    /// Aggregator over arbitrary store implementations
    pub fn with_stores(exchanges: Arc<dyn ExchangeLookup>, ratings: Arc<dyn RatingStore>) -> Self {
        Self { exchanges, ratings }
    }

    /// Execute the submit rating command
    pub async fn submit_rating(
        &self,
        command: SubmitRatingCommand,
        context: &OperationContext,
    ) -> AppResult<Rating> {
        let rater_id = context.request_user_id.ok_or(AppError::MissingToken)?;

        let score = Score::new(command.score)?;

        if command.to_user_id == rater_id {
            return Err(DomainError::SelfRating.into());
        }

        // Only the two parties of an exchange may rate each other for it
        let parties = self
            .exchanges
            .find_exchange_by_id(command.exchange_id)
            .await?
            .ok_or_else(|| AppError::ExchangeNotFound(command.exchange_id.to_string()))?;

        match parties.counterparty_of(rater_id) {
            None => return Err(DomainError::NotExchangeParty.into()),
            Some(counterparty) if counterparty != command.to_user_id => {
                return Err(DomainError::NotCounterparty.into());
            }
            Some(_) => {}
        }

        let uow = self
            .ratings
            .begin_for_user(command.to_user_id)
            .await?
            .ok_or_else(|| AppError::UserNotFound(command.to_user_id.to_string()))?;

        let new_rating = NewRating::new(rater_id, command.to_user_id, command.exchange_id, score)
            .with_comment(command.comment.unwrap_or_default());

        let to_user_id = command.to_user_id;
        let outcome = async move {
            let mut uow = uow;
            let rating = uow.insert_rating(new_rating).await?;
            let aggregate = uow.aggregate_ratings_for_user(to_user_id).await?;
            uow.update_user_aggregate(to_user_id, aggregate).await?;
            uow.commit().await?;
            Ok::<_, StoreError>((rating, aggregate))
        }
        .await;

        match outcome {
            Ok((rating, aggregate)) => {
                tracing::info!(
                    rating_id = %rating.id,
                    exchange_id = %rating.exchange_id,
                    to_user_id = %to_user_id,
                    rating = aggregate.rating,
                    rating_count = aggregate.rating_count,
                    correlation_id = ?context.correlation_id,
                    "Rating recorded"
                );
                Ok(rating)
            }
            Err(StoreError::DuplicateRating { exchange_id, .. }) => {
                Err(DomainError::already_rated(exchange_id).into())
            }
            Err(e) => {
                tracing::error!(
                    rater_id = %rater_id,
                    to_user_id = %to_user_id,
                    exchange_id = %command.exchange_id,
                    correlation_id = ?context.correlation_id,
                    error = %e,
                    "Rating submission rolled back, aggregate unchanged"
                );
                Err(e.into())
            }
        }
    }

    /// Rebuild one user's aggregate from their full rating set
    pub async fn recompute(&self, user_id: Uuid) -> AppResult<RecomputeResult> {
        let mut uow = self
            .ratings
            .begin_for_user(user_id)
            .await?
            .ok_or_else(|| AppError::UserNotFound(user_id.to_string()))?;

        let aggregate: RatingAggregate = uow.aggregate_ratings_for_user(user_id).await?;
        uow.update_user_aggregate(user_id, aggregate).await?;
        uow.commit().await?;

        Ok(RecomputeResult { user_id, aggregate })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_submit_rating_command() {
        let cmd = SubmitRatingCommand::new(Uuid::new_v4(), Uuid::new_v4(), 4)
            .with_comment("Smooth trade".to_string());

        assert_eq!(cmd.score, 4);
        assert_eq!(cmd.comment, Some("Smooth trade".to_string()));
    }
}

//! Scenario tests for the rating flow
//!
//! These run against the in-memory store, which mirrors the Postgres
//! unit-of-work semantics (exclusive per user, discarded unless committed).

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::Utc;
    use uuid::Uuid;

    use crate::domain::{DomainError, ExchangeParties, NewRating, OperationContext, Score};
    use crate::error::AppError;
    use crate::handlers::{RatingAggregator, SubmitRatingCommand};
    use crate::store::{FailPoint, InMemoryStore, StoreError};

    struct Market {
        store: InMemoryStore,
        aggregator: RatingAggregator,
        alice: Uuid,
        bob: Uuid,
        exchange: Uuid,
    }

    /// Alice proposed exchange `exchange` on one of Bob's listings
    async fn market() -> Market {
        let store = InMemoryStore::new();
        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();
        let exchange = Uuid::new_v4();

        store.add_user(alice).await;
        store.add_user(bob).await;
        store.add_exchange(exchange, ExchangeParties::new(alice, bob)).await;

        let shared = Arc::new(store.clone());
        let aggregator = RatingAggregator::with_stores(shared.clone(), shared);

        Market {
            store,
            aggregator,
            alice,
            bob,
            exchange,
        }
    }

    fn as_user(user_id: Uuid) -> OperationContext {
        OperationContext::new().with_request_user(user_id)
    }

    async fn seed_rating(store: &InMemoryStore, to_user_id: Uuid, score: i64) {
        let rating = NewRating::new(Uuid::new_v4(), to_user_id, Uuid::new_v4(), Score::new(score).unwrap())
            .into_rating(Utc::now());
        store.add_rating(rating).await;
    }

    fn assert_close(actual: f64, expected: f64) {
        assert!((actual - expected).abs() < 1e-9, "expected {}, got {}", expected, actual);
    }

    // =========================================================================
    // Aggregate scenarios
    // =========================================================================

    #[tokio::test]
    async fn test_first_rating_sets_aggregate() {
        let m = market().await;

        let rating = m
            .aggregator
            .submit_rating(SubmitRatingCommand::new(m.bob, m.exchange, 5), &as_user(m.alice))
            .await
            .unwrap();

        assert_eq!(rating.from_user_id, m.alice);
        assert_eq!(rating.to_user_id, m.bob);
        assert_eq!(rating.score, 5);
        assert_eq!(rating.comment, "");

        let agg = m.store.user_aggregate(m.bob).await.unwrap();
        assert_close(agg.rating, 5.0);
        assert_eq!(agg.rating_count, 1);
    }

    #[tokio::test]
    async fn test_new_rating_averages_with_history() {
        let m = market().await;
        seed_rating(&m.store, m.bob, 3).await;
        seed_rating(&m.store, m.bob, 5).await;
        m.aggregator.recompute(m.bob).await.unwrap();

        let before = m.store.user_aggregate(m.bob).await.unwrap();
        assert_close(before.rating, 4.0);
        assert_eq!(before.rating_count, 2);

        m.aggregator
            .submit_rating(
                SubmitRatingCommand::new(m.bob, m.exchange, 4).with_comment("Fair trade".into()),
                &as_user(m.alice),
            )
            .await
            .unwrap();

        let after = m.store.user_aggregate(m.bob).await.unwrap();
        assert_close(after.rating, 4.0);
        assert_eq!(after.rating_count, 3);
    }

    #[tokio::test]
    async fn test_aggregate_matches_rating_rows() {
        let m = market().await;
        for score in [1, 2, 5, 5] {
            seed_rating(&m.store, m.alice, score).await;
        }

        m.aggregator
            .submit_rating(SubmitRatingCommand::new(m.alice, m.exchange, 3), &as_user(m.bob))
            .await
            .unwrap();

        let rows = m.store.ratings_for(m.alice).await;
        let mean = rows.iter().map(|r| f64::from(r.score)).sum::<f64>() / rows.len() as f64;
        let agg = m.store.user_aggregate(m.alice).await.unwrap();

        assert_eq!(agg.rating_count, rows.len() as i64);
        assert_close(agg.rating, mean);
    }

    #[tokio::test]
    async fn test_recompute_is_idempotent() {
        let m = market().await;
        seed_rating(&m.store, m.bob, 2).await;
        seed_rating(&m.store, m.bob, 5).await;

        let first = m.aggregator.recompute(m.bob).await.unwrap();
        let second = m.aggregator.recompute(m.bob).await.unwrap();

        assert_eq!(first.aggregate, second.aggregate);
        assert_close(first.aggregate.rating, 3.5);
    }

    #[tokio::test]
    async fn test_recompute_without_ratings_is_zero() {
        let m = market().await;
        let result = m.aggregator.recompute(m.alice).await.unwrap();

        assert_eq!(result.aggregate.rating_count, 0);
        assert_close(result.aggregate.rating, 0.0);
    }

    #[tokio::test]
    async fn test_concurrent_submissions_converge() {
        let m = market().await;
        let carol = Uuid::new_v4();
        let second_exchange = Uuid::new_v4();
        m.store.add_user(carol).await;
        m.store
            .add_exchange(second_exchange, ExchangeParties::new(carol, m.bob))
            .await;

        let alice_ctx = as_user(m.alice);
        let carol_ctx = as_user(carol);
        let from_alice = m
            .aggregator
            .submit_rating(SubmitRatingCommand::new(m.bob, m.exchange, 2), &alice_ctx);
        let from_carol = m
            .aggregator
            .submit_rating(SubmitRatingCommand::new(m.bob, second_exchange, 5), &carol_ctx);

        let (a, c) = tokio::join!(from_alice, from_carol);
        a.unwrap();
        c.unwrap();

        let agg = m.store.user_aggregate(m.bob).await.unwrap();
        assert_eq!(agg.rating_count, 2);
        assert_close(agg.rating, 3.5);
    }

    // =========================================================================
    // Rejections leave storage untouched
    // =========================================================================

    #[tokio::test]
    async fn test_non_party_is_forbidden() {
        let m = market().await;
        let mallory = Uuid::new_v4();
        m.store.add_user(mallory).await;

        let err = m
            .aggregator
            .submit_rating(SubmitRatingCommand::new(m.bob, m.exchange, 1), &as_user(mallory))
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::Domain(DomainError::NotExchangeParty)));
        assert_eq!(m.store.rating_count().await, 0);
        assert_eq!(m.store.user_aggregate(m.bob).await.unwrap().rating_count, 0);
    }

    #[tokio::test]
    async fn test_rating_someone_else_on_exchange_is_forbidden() {
        let m = market().await;
        let carol = Uuid::new_v4();
        m.store.add_user(carol).await;

        let err = m
            .aggregator
            .submit_rating(SubmitRatingCommand::new(carol, m.exchange, 1), &as_user(m.alice))
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::Domain(DomainError::NotCounterparty)));
        assert_eq!(m.store.rating_count().await, 0);
    }

    #[tokio::test]
    async fn test_unknown_exchange_is_not_found() {
        let m = market().await;
        let missing = Uuid::new_v4();

        let err = m
            .aggregator
            .submit_rating(SubmitRatingCommand::new(m.bob, missing, 4), &as_user(m.alice))
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::ExchangeNotFound(ref id) if *id == missing.to_string()));
        assert_eq!(m.store.rating_count().await, 0);
    }

    #[tokio::test]
    async fn test_unknown_rated_user_is_not_found() {
        let store = InMemoryStore::new();
        let (alice, ghost, exchange) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        store.add_user(alice).await;
        store.add_exchange(exchange, ExchangeParties::new(alice, ghost)).await;
        let shared = Arc::new(store.clone());
        let aggregator = RatingAggregator::with_stores(shared.clone(), shared);

        let err = aggregator
            .submit_rating(SubmitRatingCommand::new(ghost, exchange, 4), &as_user(alice))
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::UserNotFound(_)));
        assert_eq!(store.rating_count().await, 0);
    }

    #[tokio::test]
    async fn test_out_of_range_score_is_rejected() {
        let m = market().await;

        for score in [0, 6, -1] {
            let err = m
                .aggregator
                .submit_rating(SubmitRatingCommand::new(m.bob, m.exchange, score), &as_user(m.alice))
                .await
                .unwrap_err();
            assert!(matches!(err, AppError::Domain(DomainError::InvalidScore(s)) if s == score));
        }
        assert_eq!(m.store.rating_count().await, 0);
    }

    #[tokio::test]
    async fn test_self_rating_is_rejected() {
        let m = market().await;

        let err = m
            .aggregator
            .submit_rating(SubmitRatingCommand::new(m.alice, m.exchange, 5), &as_user(m.alice))
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::Domain(DomainError::SelfRating)));
    }

    #[tokio::test]
    async fn test_missing_caller_is_unauthorized() {
        let m = market().await;

        let err = m
            .aggregator
            .submit_rating(SubmitRatingCommand::new(m.bob, m.exchange, 5), &OperationContext::new())
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::MissingToken));
    }

    #[tokio::test]
    async fn test_second_rating_for_same_exchange_conflicts() {
        let m = market().await;
        let cmd = SubmitRatingCommand::new(m.bob, m.exchange, 5);

        m.aggregator.submit_rating(cmd.clone(), &as_user(m.alice)).await.unwrap();
        let err = m
            .aggregator
            .submit_rating(SubmitRatingCommand { score: 1, ..cmd }, &as_user(m.alice))
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::Domain(DomainError::AlreadyRated { .. })));
        let agg = m.store.user_aggregate(m.bob).await.unwrap();
        assert_eq!(agg.rating_count, 1);
        assert_close(agg.rating, 5.0);
    }

    // =========================================================================
    // Storage failures roll back the whole unit
    // =========================================================================

    #[tokio::test]
    async fn test_failed_aggregate_write_rolls_back_insert() {
        let m = market().await;
        m.store.fail_at(FailPoint::Update);

        let err = m
            .aggregator
            .submit_rating(SubmitRatingCommand::new(m.bob, m.exchange, 5), &as_user(m.alice))
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::Store(StoreError::Unavailable(_))));
        assert_eq!(m.store.rating_count().await, 0);
        assert_eq!(m.store.user_aggregate(m.bob).await.unwrap().rating_count, 0);

        // Once storage recovers the same submission goes through
        m.store.clear_failure();
        m.aggregator
            .submit_rating(SubmitRatingCommand::new(m.bob, m.exchange, 5), &as_user(m.alice))
            .await
            .unwrap();
        assert_eq!(m.store.user_aggregate(m.bob).await.unwrap().rating_count, 1);
    }

    #[tokio::test]
    async fn test_failed_commit_leaves_nothing() {
        let m = market().await;
        m.store.fail_at(FailPoint::Commit);

        let result = m
            .aggregator
            .submit_rating(SubmitRatingCommand::new(m.bob, m.exchange, 3), &as_user(m.alice))
            .await;

        assert!(result.is_err());
        assert_eq!(m.store.rating_count().await, 0);
    }
}

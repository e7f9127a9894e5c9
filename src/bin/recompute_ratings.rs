//! Rating reconciliation tool
//!
//! Recomputes stored rating aggregates from the ratings table.
//!
//! Run with:
//!   cargo run --bin recompute_ratings -- --user <uuid>   one user
//!   cargo run --bin recompute_ratings -- --all           every user
//!   cargo run --bin recompute_ratings                    only users whose aggregate drifted

use std::time::Instant;

use barter_api::handlers::RatingAggregator;
use barter_api::projection::RatingProjection;
use barter_api::{db, Config};
use uuid::Uuid;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "barter_api=info".into()),
        )
        .init();

    let args: Vec<String> = std::env::args().collect();
    let single_user: Option<Uuid> = match args.iter().position(|a| a == "--user") {
        Some(i) => {
            let raw = args
                .get(i + 1)
                .ok_or_else(|| anyhow::anyhow!("--user requires a user id"))?;
            Some(Uuid::parse_str(raw)?)
        }
        None => None,
    };
    let rebuild_all = args.iter().any(|a| a == "--all");

    let config = Config::from_env()?;
    println!("Connecting to database...");
    let pool = db::connect(&config).await?;

    let projection = RatingProjection::new(pool.clone());
    let user_ids = match single_user {
        Some(user_id) => vec![user_id],
        None if rebuild_all => projection.all_users().await?,
        None => projection.find_stale_users().await?,
    };

    println!("Recomputing {} user aggregate(s)", user_ids.len());

    let aggregator = RatingAggregator::new(pool.clone());
    let start = Instant::now();
    let mut updated = 0u64;
    let mut failed = 0u64;

    for user_id in user_ids {
        match aggregator.recompute(user_id).await {
            Ok(result) => {
                updated += 1;
                println!(
                    "{}  rating={:.3} count={}",
                    result.user_id, result.aggregate.rating, result.aggregate.rating_count
                );
            }
            Err(e) => {
                failed += 1;
                eprintln!("{}  failed: {}", user_id, e);
            }
        }
    }

    println!("\n=== Recompute Results ===");
    println!("Updated: {}", updated);
    println!("Failed: {}", failed);
    println!("Time: {:.2}s", start.elapsed().as_secs_f64());

    pool.close().await;

    if failed > 0 {
        anyhow::bail!("{} aggregate(s) could not be recomputed", failed);
    }

    Ok(())
}

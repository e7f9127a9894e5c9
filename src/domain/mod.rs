//! Domain module
//!
//! Core domain types and business rules.

pub mod context;
pub mod error;
pub mod exchange;
pub mod listing;
pub mod rating;

pub use context::OperationContext;
pub use error::DomainError;
pub use exchange::{ExchangeOffer, ExchangeParties, ExchangeStatus};
pub use listing::{ListingStatus, ReportTarget};
pub use rating::{NewRating, Rating, RatingAggregate, Score, TrustBadges};

//! barter_api Library
//!
//! Re-exports modules for integration testing and the operator binaries.

pub mod api;
pub mod auth;
pub mod domain;
pub mod handlers;
pub mod projection;
pub mod state;
pub mod store;

pub mod config;
pub mod db;
mod error;

pub use config::Config;
pub use error::{AppError, AppResult};
pub use domain::{DomainError, OperationContext, Rating, RatingAggregate};
pub use state::AppState;

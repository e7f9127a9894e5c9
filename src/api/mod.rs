//! API module
//!
//! HTTP API endpoints and middleware.

mod chat;
mod exchanges;
mod listings;
pub mod middleware;
mod reports;
pub mod routes;

pub use routes::create_router;

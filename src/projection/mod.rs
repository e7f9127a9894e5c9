//! Projection module
//!
//! Read-model tables derived from source rows.

mod service;

pub use service::{ProjectionError, RatingProjection};

//! Command Handlers module
//!
//! Handlers that orchestrate multi-step write operations over the store.

mod commands;
mod rating_handler;

#[cfg(test)]
mod tests;

pub use commands::*;
pub use rating_handler::RatingAggregator;

//! Authentication
//!
//! Verifies bearer tokens and exposes the caller identity. Issuing tokens to
//! end users (login, registration, social sign-in) happens elsewhere; the
//! issuing half here serves operators and tests.

mod token;

pub use token::{Claims, TokenError, TokenService};

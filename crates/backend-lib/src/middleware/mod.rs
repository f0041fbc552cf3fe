// crates/backend-lib/src/middleware/mod.rs

//! Middleware for the `authgate` server.

pub mod auth;

pub use auth::{authenticate, bearer_token, optional_auth, require_auth, AuthUser, GuardRejection};

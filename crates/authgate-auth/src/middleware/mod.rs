//! Axum integration: Bearer token extraction and error responses.

pub mod auth;
pub mod error;

pub use auth::{AuthContext, AuthState, BearerAuth};

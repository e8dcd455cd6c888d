//! # authgate-auth
//!
//! Session/token control plane for the Authgate server.
//!
//! This crate provides:
//! - Stateless access/refresh token pairs (HS256, distinct secrets per kind)
//! - Verification with revocation checks (signature denylist + per-subject
//!   watermark)
//! - Refresh token rotation and logout/logout-everywhere
//! - Axum middleware that maps verification failures to 401 responses
//!
//! ## Modules
//!
//! - [`config`] - token secrets, lifetimes, issuer/audience
//! - [`token`] - codec, lifecycle service, revocation store
//! - [`middleware`] - Bearer extractor and error responses
//! - [`error`] - the `AuthError` taxonomy

pub mod config;
pub mod error;
pub mod middleware;
pub mod token;

pub use config::AuthConfig;
pub use error::AuthError;
pub use middleware::{AuthContext, AuthState, BearerAuth};
pub use token::{
    Claims, RevocationReason, RevocationStore, TokenCodec, TokenKind, TokenPair, TokenService,
    TokenSubject,
};

/// Type alias for authentication results.
pub type AuthResult<T> = Result<T, AuthError>;

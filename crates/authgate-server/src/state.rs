//! Shared application state.
//!
//! All dependencies are injected here at startup; handlers and middleware
//! receive them through axum's `State`/`FromRef` machinery rather than
//! reaching for globals.

use std::sync::Arc;

use axum::extract::FromRef;

use authgate_auth::{AuthState, TokenService};
use authgate_cache::{Cache, RateLimiter};

use crate::config::RateLimitConfig;
use crate::user::UserStore;

/// Application-wide state, cheap to clone.
#[derive(Clone)]
pub struct AppState {
    /// Token issuance, verification, rotation, revocation.
    pub tokens: Arc<TokenService>,
    /// Cache-aside layer over the shared key-value store.
    pub cache: Cache,
    /// Fixed-window rate limiter over the same store.
    pub rate_limiter: RateLimiter,
    /// Login rate limit settings.
    pub rate_limit: RateLimitConfig,
    /// User account lookup.
    pub users: Arc<dyn UserStore>,
}

impl FromRef<AppState> for AuthState {
    fn from_ref(state: &AppState) -> Self {
        AuthState::new(state.tokens.clone())
    }
}

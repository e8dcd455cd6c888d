//! Bearer token authentication extractor.
//!
//! # Example
//!
//! ```ignore
//! use authgate_auth::middleware::BearerAuth;
//!
//! async fn protected_handler(BearerAuth(auth): BearerAuth) -> String {
//!     format!("Hello, {}!", auth.email())
//! }
//! ```

use std::sync::Arc;

use axum::{
    extract::{FromRef, FromRequestParts},
    http::{header::AUTHORIZATION, request::Parts},
};

use crate::error::AuthError;
use crate::token::codec::Claims;
use crate::token::service::TokenService;

// ============================================================================
// Auth State
// ============================================================================

/// State required by the [`BearerAuth`] extractor.
///
/// Include it in your application state and expose it via `FromRef`:
///
/// ```ignore
/// #[derive(Clone)]
/// struct AppState {
///     auth: AuthState,
///     // ... other state
/// }
///
/// impl FromRef<AppState> for AuthState {
///     fn from_ref(state: &AppState) -> Self {
///         state.auth.clone()
///     }
/// }
/// ```
#[derive(Clone)]
pub struct AuthState {
    /// Token lifecycle service used to verify presented tokens.
    pub tokens: Arc<TokenService>,
}

impl AuthState {
    /// Creates a new auth state.
    #[must_use]
    pub fn new(tokens: Arc<TokenService>) -> Self {
        Self { tokens }
    }
}

// ============================================================================
// Auth Context
// ============================================================================

/// The verified identity attached to a request.
#[derive(Debug, Clone)]
pub struct AuthContext {
    /// Verified access token claims (in an `Arc` for cheap cloning).
    pub claims: Arc<Claims>,
}

impl AuthContext {
    /// Subject id of the authenticated user.
    #[must_use]
    pub fn subject_id(&self) -> i64 {
        self.claims.sub
    }

    /// Email of the authenticated user, as recorded at issuance.
    #[must_use]
    pub fn email(&self) -> &str {
        &self.claims.email
    }

    /// Role of the authenticated user, as recorded at issuance.
    #[must_use]
    pub fn role(&self) -> &str {
        &self.claims.role
    }
}

// ============================================================================
// Bearer Auth Extractor
// ============================================================================

/// Axum extractor that verifies the `Authorization: Bearer` access token.
///
/// Verification includes revocation state, so a denylisted or superseded
/// token is rejected here before the handler runs.
///
/// # Errors
///
/// Rejects with `AuthError` (which implements `IntoResponse`) when the
/// header is missing/empty or the token fails verification.
pub struct BearerAuth(pub AuthContext);

impl<S> FromRequestParts<S> for BearerAuth
where
    S: Send + Sync,
    AuthState: FromRef<S>,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let auth_state = AuthState::from_ref(state);

        let token = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|h| h.to_str().ok())
            .and_then(|h| h.strip_prefix("Bearer "))
            .filter(|t| !t.is_empty())
            .ok_or_else(|| AuthError::unauthorized("Missing Authorization header"))?;

        let claims = auth_state.tokens.verify_access(token).await.map_err(|e| {
            tracing::debug!(reason = e.reason_code(), "access token rejected");
            e
        })?;

        Ok(Self(AuthContext {
            claims: Arc::new(claims),
        }))
    }
}

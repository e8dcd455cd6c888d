//! HTTP handlers for the authentication endpoints.

use axum::{
    Json,
    extract::State,
    http::{StatusCode, header::AUTHORIZATION, request::Parts},
};
use serde::{Deserialize, Serialize};

use authgate_auth::{AuthError, BearerAuth, RevocationReason, TokenPair};
use authgate_cache::CacheTtl;

use crate::state::AppState;
use crate::user::{UserRecord, verify_password};

// ============================================================================
// Request / Response Bodies
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct LogoutRequest {
    /// Also denylist the session's refresh token when provided.
    #[serde(default)]
    pub refresh_token: Option<String>,
}

/// Public view of a user account. Never carries the password hash.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: i64,
    pub email: String,
    pub role: String,
    pub is_active: bool,
}

impl From<&UserRecord> for UserProfile {
    fn from(user: &UserRecord) -> Self {
        Self {
            id: user.id,
            email: user.email.clone(),
            role: user.role.clone(),
            is_active: user.is_active,
        }
    }
}

fn profile_cache_key(subject_id: i64) -> String {
    format!("user:profile:{subject_id}")
}

// ============================================================================
// Handlers
// ============================================================================

/// `POST /auth/login` - verify credentials, issue a token pair.
///
/// Unknown account, wrong password, and deactivated account all produce the
/// same `invalid_credentials` response.
pub async fn login(
    State(state): State<AppState>,
    Json(body): Json<LoginRequest>,
) -> Result<Json<TokenPair>, AuthError> {
    let user = state
        .users
        .find_by_email(&body.email)
        .await?
        .ok_or(AuthError::InvalidCredentials)?;

    if !verify_password(&body.password, &user.password_hash) {
        tracing::debug!(email = %body.email, "login rejected: bad password");
        return Err(AuthError::InvalidCredentials);
    }
    if !user.is_active {
        tracing::debug!(subject_id = user.id, "login rejected: account deactivated");
        return Err(AuthError::InvalidCredentials);
    }

    let pair = state.tokens.issue_pair(&user.subject())?;
    tracing::info!(subject_id = user.id, "login succeeded");
    Ok(Json(pair))
}

/// `POST /auth/refresh` - rotate a refresh token into a fresh pair.
///
/// The presented refresh token is consumed: a second rotation with the same
/// token is rejected as revoked.
pub async fn refresh(
    State(state): State<AppState>,
    Json(body): Json<RefreshRequest>,
) -> Result<Json<TokenPair>, AuthError> {
    let pair = state.tokens.rotate(&body.refresh_token).await?;
    Ok(Json(pair))
}

/// `POST /auth/logout` - denylist the session's tokens.
///
/// The access token comes from the Authorization header; the refresh token
/// optionally from the JSON body (`{}` logs out the access token only).
pub async fn logout(
    parts: Parts,
    State(state): State<AppState>,
    Json(body): Json<LogoutRequest>,
) -> Result<StatusCode, AuthError> {
    let access_token = bearer_token(&parts)?;

    state
        .tokens
        .logout(access_token, body.refresh_token.as_deref())
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// `POST /auth/logout-all` - revoke every outstanding token for the caller.
///
/// The cached profile is invalidated only after the watermark write has
/// committed; a failed write leaves both token state and cache untouched.
pub async fn logout_all(
    State(state): State<AppState>,
    BearerAuth(auth): BearerAuth,
) -> Result<StatusCode, AuthError> {
    let subject_id = auth.subject_id();
    state
        .tokens
        .revoke_all(subject_id, RevocationReason::Logout)
        .await?;
    state.cache.invalidate(&profile_cache_key(subject_id)).await;
    Ok(StatusCode::NO_CONTENT)
}

/// `GET /auth/me` - the caller's profile, cache-aside over the user store.
pub async fn me(
    State(state): State<AppState>,
    BearerAuth(auth): BearerAuth,
) -> Result<Json<UserProfile>, AuthError> {
    let subject_id = auth.subject_id();
    let email = auth.email().to_string();

    let profile = state
        .cache
        .get_or_load(
            &profile_cache_key(subject_id),
            CacheTtl::Medium,
            || async {
                state
                    .users
                    .find_by_email(&email)
                    .await?
                    .as_ref()
                    .map(UserProfile::from)
                    .ok_or_else(|| AuthError::unauthorized("account no longer exists"))
            },
        )
        .await?;
    Ok(Json(profile))
}

/// `GET /healthz` - liveness probe.
pub async fn healthz() -> StatusCode {
    StatusCode::OK
}

fn bearer_token(parts: &Parts) -> Result<&str, AuthError> {
    parts
        .headers
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .filter(|t| !t.is_empty())
        .ok_or_else(|| AuthError::unauthorized("Missing Authorization header"))
}

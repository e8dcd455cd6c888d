//! Stateless JWT signing and verification.
//!
//! Two token kinds exist: short-lived *access* tokens and long-lived
//! *refresh* tokens, signed with distinct HS256 secrets so one can never be
//! presented as the other. Both carry the same claim shape; the only
//! difference between the members of a pair is `exp` and which secret
//! signed them.

use std::time::Duration;

use jsonwebtoken::{
    Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode,
};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::config::AuthConfig;
use crate::error::AuthError;

// ============================================================================
// Token Kind
// ============================================================================

/// The two signed encodings issued per subject.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    /// Short-lived credential authorizing API calls.
    Access,
    /// Long-lived credential used solely to obtain new access tokens.
    Refresh,
}

impl TokenKind {
    /// Returns the kind name as used in logs.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Access => "access",
            Self::Refresh => "refresh",
        }
    }
}

impl std::fmt::Display for TokenKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ============================================================================
// Claims
// ============================================================================

/// Signed token payload.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Claims {
    /// Subject id (the user's primary key).
    pub sub: i64,

    /// Subject email at issuance time.
    pub email: String,

    /// Subject role at issuance time.
    pub role: String,

    /// Issued at (Unix timestamp, seconds).
    pub iat: i64,

    /// Expiration time (Unix timestamp, seconds).
    pub exp: i64,

    /// Issuer.
    pub iss: String,

    /// Audience.
    pub aud: String,
}

// ============================================================================
// Codec
// ============================================================================

struct KindKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    lifetime: Duration,
}

impl KindKeys {
    fn new(secret: &str, lifetime: Duration) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            lifetime,
        }
    }
}

/// Signs and verifies the two token kinds.
///
/// Pure, in-process computation: no suspension points, safe to call from any
/// task. Thread-safe (`Send + Sync`).
pub struct TokenCodec {
    access: KindKeys,
    refresh: KindKeys,
    issuer: String,
    audience: String,
}

impl TokenCodec {
    /// Builds a codec from configuration.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Configuration`] when the configuration cannot
    /// sign tokens (missing/identical secrets, inverted lifetimes). This is
    /// fatal: the process must not start.
    pub fn new(config: &AuthConfig) -> Result<Self, AuthError> {
        config.validate()?;
        Ok(Self {
            access: KindKeys::new(&config.access_secret, config.access_token_lifetime),
            refresh: KindKeys::new(&config.refresh_secret, config.refresh_token_lifetime),
            issuer: config.issuer.clone(),
            audience: config.audience.clone(),
        })
    }

    fn keys(&self, kind: TokenKind) -> &KindKeys {
        match kind {
            TokenKind::Access => &self.access,
            TokenKind::Refresh => &self.refresh,
        }
    }

    /// Lifetime of the given token kind.
    #[must_use]
    pub fn lifetime(&self, kind: TokenKind) -> Duration {
        self.keys(kind).lifetime
    }

    /// Signs a token of the given kind for `subject` at `issued_at`.
    ///
    /// `iat`/`exp` are always set; `exp = issued_at + lifetime(kind)`.
    /// Returns the signed token together with the claims it encodes.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Invalid`] if encoding fails.
    pub fn issue(
        &self,
        kind: TokenKind,
        subject_id: i64,
        email: &str,
        role: &str,
        issued_at: OffsetDateTime,
    ) -> Result<(String, Claims), AuthError> {
        let keys = self.keys(kind);
        let iat = issued_at.unix_timestamp();
        let claims = Claims {
            sub: subject_id,
            email: email.to_string(),
            role: role.to_string(),
            iat,
            exp: iat + keys.lifetime.as_secs() as i64,
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &keys.encoding)
            .map_err(|e| AuthError::invalid(format!("failed to encode token: {e}")))?;
        Ok((token, claims))
    }

    /// Verifies a token of the given kind and returns its claims.
    ///
    /// # Errors
    ///
    /// - [`AuthError::Expired`] - `exp` has passed
    /// - [`AuthError::Malformed`] - not a structurally valid JWT
    /// - [`AuthError::Invalid`] - bad signature, issuer, or audience
    pub fn verify(&self, kind: TokenKind, token: &str) -> Result<Claims, AuthError> {
        let keys = self.keys(kind);
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[&self.issuer]);
        validation.set_audience(&[&self.audience]);
        validation.validate_exp = true;

        decode::<Claims>(token, &keys.decoding, &validation)
            .map(|data| data.claims)
            .map_err(map_jwt_error)
    }

    /// Decodes claims without verifying the signature or expiry.
    ///
    /// For logging/telemetry only. Never use the result for authorization
    /// decisions.
    #[must_use]
    pub fn decode_unverified(token: &str) -> Option<Claims> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.insecure_disable_signature_validation();
        validation.validate_exp = false;
        validation.validate_aud = false;
        validation.required_spec_claims.clear();

        decode::<Claims>(token, &DecodingKey::from_secret(b""), &validation)
            .map(|data| data.claims)
            .ok()
    }

    /// Returns the signature segment of a JWT.
    ///
    /// Revocation records are keyed by this segment (hashed) rather than the
    /// full token, to bound key size.
    #[must_use]
    pub fn signature(token: &str) -> Option<&str> {
        let mut parts = token.split('.');
        let (_header, _payload, signature) = (parts.next()?, parts.next()?, parts.next()?);
        if parts.next().is_some() || signature.is_empty() {
            return None;
        }
        Some(signature)
    }
}

fn map_jwt_error(err: jsonwebtoken::errors::Error) -> AuthError {
    use jsonwebtoken::errors::ErrorKind;

    match err.kind() {
        ErrorKind::ExpiredSignature => AuthError::Expired,
        ErrorKind::InvalidToken
        | ErrorKind::Base64(_)
        | ErrorKind::Json(_)
        | ErrorKind::Utf8(_) => AuthError::malformed(err.to_string()),
        _ => AuthError::invalid(err.to_string()),
    }
}

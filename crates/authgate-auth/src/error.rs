//! Authentication error types.
//!
//! Verification failures are split into `Expired` / `Malformed` / `Invalid` /
//! `Revoked` because callers react differently: an expired access token
//! prompts a refresh, everything else is rejected outright. Each variant
//! carries a short machine-distinguishable reason code for HTTP responses.

/// Errors that can occur during token issuance and verification.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// The token's `exp` claim has passed.
    #[error("Token expired")]
    Expired,

    /// The token's structure or encoding is invalid (not a decodable JWT).
    #[error("Malformed token: {message}")]
    Malformed {
        /// Description of the structural problem.
        message: String,
    },

    /// The token failed cryptographic verification or claim validation.
    #[error("Invalid token: {message}")]
    Invalid {
        /// Description of the verification failure.
        message: String,
    },

    /// The token has been revoked (denylisted or superseded by a watermark).
    #[error("Token revoked")]
    Revoked,

    /// The request lacks usable credentials (no/empty Authorization header).
    #[error("Unauthorized: {message}")]
    Unauthorized {
        /// Description of what is missing.
        message: String,
    },

    /// Login failed: unknown user, wrong password, or inactive account.
    ///
    /// Deliberately carries no detail so responses cannot be used to probe
    /// which accounts exist.
    #[error("Invalid credentials")]
    InvalidCredentials,

    /// A revocation write could not be persisted.
    ///
    /// This is the one store failure that propagates: swallowing it would
    /// leave a rotated-out or logged-out token usable.
    #[error("Store error: {message}")]
    Store {
        /// Description of the store failure.
        message: String,
    },

    /// The token configuration is unusable (missing secret, inverted
    /// lifetimes). Fatal at startup, never per-request.
    #[error("Configuration error: {message}")]
    Configuration {
        /// Description of the configuration problem.
        message: String,
    },
}

impl AuthError {
    /// Creates a new `Malformed` error.
    #[must_use]
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::Malformed {
            message: message.into(),
        }
    }

    /// Creates a new `Invalid` error.
    #[must_use]
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::Invalid {
            message: message.into(),
        }
    }

    /// Creates a new `Unauthorized` error.
    #[must_use]
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::Unauthorized {
            message: message.into(),
        }
    }

    /// Creates a new `Store` error.
    #[must_use]
    pub fn store(message: impl Into<String>) -> Self {
        Self::Store {
            message: message.into(),
        }
    }

    /// Creates a new `Configuration` error.
    #[must_use]
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Returns `true` for failures the authentication middleware maps to 401.
    #[must_use]
    pub fn is_authentication_error(&self) -> bool {
        matches!(
            self,
            Self::Expired
                | Self::Malformed { .. }
                | Self::Invalid { .. }
                | Self::Revoked
                | Self::Unauthorized { .. }
                | Self::InvalidCredentials
        )
    }

    /// Short stable reason code used in response bodies and logs.
    #[must_use]
    pub fn reason_code(&self) -> &'static str {
        match self {
            Self::Expired => "token_expired",
            Self::Malformed { .. } => "token_malformed",
            Self::Invalid { .. } => "token_invalid",
            Self::Revoked => "token_revoked",
            Self::Unauthorized { .. } => "unauthorized",
            Self::InvalidCredentials => "invalid_credentials",
            Self::Store { .. } | Self::Configuration { .. } => "server_error",
        }
    }
}

impl From<authgate_cache::StoreError> for AuthError {
    fn from(err: authgate_cache::StoreError) -> Self {
        Self::store(err.to_string())
    }
}

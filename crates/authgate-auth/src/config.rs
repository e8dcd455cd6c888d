//! Token configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::AuthError;

/// Token signing and lifetime configuration.
///
/// Secrets have no defaults on purpose: a process without both secrets must
/// refuse to start ([`AuthConfig::validate`]) rather than fail per-request.
///
/// # Example (TOML)
///
/// ```toml
/// [auth]
/// issuer = "authgate"
/// audience = "authgate-api"
/// access_secret = "..."
/// refresh_secret = "..."
/// access_token_lifetime = "15m"
/// refresh_token_lifetime = "7d"
/// ```
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Value of the `iss` claim on every issued token.
    pub issuer: String,

    /// Value of the `aud` claim on every issued token.
    pub audience: String,

    /// HMAC secret for access tokens.
    pub access_secret: String,

    /// HMAC secret for refresh tokens. Must differ from `access_secret` so a
    /// leaked access token can never be replayed as a refresh token.
    pub refresh_secret: String,

    /// Access token lifetime (minutes scale).
    #[serde(with = "humantime_serde")]
    pub access_token_lifetime: Duration,

    /// Refresh token lifetime (days scale). Must exceed the access lifetime.
    #[serde(with = "humantime_serde")]
    pub refresh_token_lifetime: Duration,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            issuer: "authgate".to_string(),
            audience: "authgate-api".to_string(),
            access_secret: String::new(),
            refresh_secret: String::new(),
            access_token_lifetime: Duration::from_secs(15 * 60),
            refresh_token_lifetime: Duration::from_secs(7 * 24 * 3600),
        }
    }
}

impl AuthConfig {
    /// Checks that the configuration can actually sign and verify tokens.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Configuration`] if a secret is missing, the two
    /// secrets are identical, or the refresh lifetime does not exceed the
    /// access lifetime.
    pub fn validate(&self) -> Result<(), AuthError> {
        if self.access_secret.is_empty() {
            return Err(AuthError::configuration("access token secret is not set"));
        }
        if self.refresh_secret.is_empty() {
            return Err(AuthError::configuration("refresh token secret is not set"));
        }
        if self.access_secret == self.refresh_secret {
            return Err(AuthError::configuration(
                "access and refresh secrets must differ",
            ));
        }
        if self.refresh_token_lifetime <= self.access_token_lifetime {
            return Err(AuthError::configuration(
                "refresh token lifetime must exceed access token lifetime",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid() -> AuthConfig {
        AuthConfig {
            access_secret: "access-secret".to_string(),
            refresh_secret: "refresh-secret".to_string(),
            ..AuthConfig::default()
        }
    }

    #[test]
    fn test_valid_config() {
        assert!(valid().validate().is_ok());
    }

    #[test]
    fn test_missing_secrets_rejected() {
        assert!(AuthConfig::default().validate().is_err());

        let config = AuthConfig {
            refresh_secret: String::new(),
            ..valid()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_identical_secrets_rejected() {
        let config = AuthConfig {
            refresh_secret: "access-secret".to_string(),
            ..valid()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_inverted_lifetimes_rejected() {
        let config = AuthConfig {
            access_token_lifetime: Duration::from_secs(3600),
            refresh_token_lifetime: Duration::from_secs(60),
            ..valid()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_toml_durations_parse() {
        let parsed: AuthConfig = serde_json::from_str(
            r#"{
                "access_secret": "a",
                "refresh_secret": "r",
                "access_token_lifetime": "15m",
                "refresh_token_lifetime": "7d"
            }"#,
        )
        .unwrap();
        assert_eq!(parsed.access_token_lifetime, Duration::from_secs(900));
        assert_eq!(
            parsed.refresh_token_lifetime,
            Duration::from_secs(7 * 24 * 3600)
        );
    }
}

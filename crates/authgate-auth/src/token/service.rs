//! Token lifecycle: pair issuance, verification, rotation, revocation.
//!
//! The service wires the stateless [`TokenCodec`] to the stateful
//! [`RevocationStore`]. Verification is ordered cheapest-first: signature and
//! claim checks run locally before any store round trip, and the denylist is
//! consulted before the per-subject watermark.

use std::sync::Arc;
use std::time::Duration;

use time::OffsetDateTime;

use crate::error::AuthError;
use crate::token::codec::{Claims, TokenCodec, TokenKind};
use crate::token::revocation::{RevocationReason, RevocationStore};

// ============================================================================
// Subject and Pair
// ============================================================================

/// The identity a token pair is issued for.
#[derive(Debug, Clone)]
pub struct TokenSubject {
    /// Subject id (the user's primary key).
    pub id: i64,
    /// Subject email.
    pub email: String,
    /// Subject role.
    pub role: String,
}

impl From<&Claims> for TokenSubject {
    fn from(claims: &Claims) -> Self {
        Self {
            id: claims.sub,
            email: claims.email.clone(),
            role: claims.role.clone(),
        }
    }
}

/// An access/refresh token pair, issued atomically with shared `iat`.
#[derive(Debug, Clone, serde::Serialize)]
pub struct TokenPair {
    /// Short-lived access token.
    pub access_token: String,
    /// Long-lived refresh token.
    pub refresh_token: String,
    /// Unix timestamp at which the access token expires.
    pub access_expires_at: i64,
}

// ============================================================================
// Token Service
// ============================================================================

/// Issues, verifies, rotates, and revokes token pairs.
#[derive(Clone)]
pub struct TokenService {
    codec: Arc<TokenCodec>,
    revocation: RevocationStore,
}

impl TokenService {
    /// Creates a token service from a codec and revocation store.
    #[must_use]
    pub fn new(codec: Arc<TokenCodec>, revocation: RevocationStore) -> Self {
        Self { codec, revocation }
    }

    /// Issues a fresh access/refresh pair for `subject`, dated now.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Invalid`] if signing fails.
    pub fn issue_pair(&self, subject: &TokenSubject) -> Result<TokenPair, AuthError> {
        self.issue_pair_at(subject, OffsetDateTime::now_utc())
    }

    /// Issues a pair dated `issued_at`. Both tokens share the same `iat`, so
    /// a watermark either invalidates the whole pair or neither half.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Invalid`] if signing fails.
    pub fn issue_pair_at(
        &self,
        subject: &TokenSubject,
        issued_at: OffsetDateTime,
    ) -> Result<TokenPair, AuthError> {
        let (access_token, access_claims) = self.codec.issue(
            TokenKind::Access,
            subject.id,
            &subject.email,
            &subject.role,
            issued_at,
        )?;
        let (refresh_token, _) = self.codec.issue(
            TokenKind::Refresh,
            subject.id,
            &subject.email,
            &subject.role,
            issued_at,
        )?;

        tracing::debug!(subject_id = subject.id, "token pair issued");
        Ok(TokenPair {
            access_token,
            refresh_token,
            access_expires_at: access_claims.exp,
        })
    }

    /// Verifies an access token, including revocation state.
    ///
    /// # Errors
    ///
    /// - [`AuthError::Expired`] / [`AuthError::Malformed`] /
    ///   [`AuthError::Invalid`] - codec verification failed
    /// - [`AuthError::Revoked`] - denylisted or superseded by a watermark
    pub async fn verify_access(&self, token: &str) -> Result<Claims, AuthError> {
        self.verify(TokenKind::Access, token).await
    }

    /// Verifies a refresh token, including revocation state.
    ///
    /// # Errors
    ///
    /// Same contract as [`TokenService::verify_access`].
    pub async fn verify_refresh(&self, token: &str) -> Result<Claims, AuthError> {
        self.verify(TokenKind::Refresh, token).await
    }

    async fn verify(&self, kind: TokenKind, token: &str) -> Result<Claims, AuthError> {
        let claims = self.codec.verify(kind, token)?;

        // verify() only succeeds on well-formed tokens, so the segment exists.
        if let Some(signature) = TokenCodec::signature(token)
            && self.revocation.is_blacklisted(signature).await
        {
            tracing::debug!(subject_id = claims.sub, kind = %kind, "denylisted token rejected");
            return Err(AuthError::Revoked);
        }
        if self.revocation.is_superseded(claims.sub, claims.iat).await {
            tracing::debug!(subject_id = claims.sub, kind = %kind, "superseded token rejected");
            return Err(AuthError::Revoked);
        }

        Ok(claims)
    }

    /// Exchanges a valid refresh token for a fresh pair, consuming it.
    ///
    /// The old refresh token is denylisted for its remaining validity, so a
    /// given refresh token rotates successfully at most once. The new pair is
    /// issued before the old token is denylisted; if the denylist write fails
    /// the whole rotation fails and the caller gets no new pair.
    ///
    /// # Errors
    ///
    /// - verification errors from [`TokenService::verify_refresh`]
    /// - [`AuthError::Store`] - the denylist write failed
    pub async fn rotate(&self, refresh_token: &str) -> Result<TokenPair, AuthError> {
        let claims = self.verify_refresh(refresh_token).await?;
        let subject = TokenSubject::from(&claims);
        let pair = self.issue_pair(&subject)?;

        let signature = TokenCodec::signature(refresh_token)
            .ok_or_else(|| AuthError::malformed("refresh token has no signature segment"))?;
        self.revocation
            .blacklist(
                signature,
                RevocationReason::TokenRotation,
                remaining_validity(claims.exp),
            )
            .await?;

        tracing::debug!(subject_id = subject.id, "refresh token rotated");
        Ok(pair)
    }

    /// Revokes every outstanding token for `subject_id` by setting the
    /// watermark to now. Tokens issued strictly after this call still verify.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Store`] if the watermark write failed; in that
    /// case nothing was revoked and the caller must not report success.
    pub async fn revoke_all(
        &self,
        subject_id: i64,
        reason: RevocationReason,
    ) -> Result<(), AuthError> {
        self.revocation
            .set_watermark(subject_id, reason, self.codec.lifetime(TokenKind::Refresh))
            .await
    }

    /// Logs out one session by denylisting its tokens.
    ///
    /// An already-expired token needs no denylist entry and is skipped; any
    /// other verification failure propagates so a bad request is not reported
    /// as a successful logout.
    ///
    /// # Errors
    ///
    /// - verification errors other than `Expired`
    /// - [`AuthError::Store`] - a denylist write failed
    pub async fn logout(
        &self,
        access_token: &str,
        refresh_token: Option<&str>,
    ) -> Result<(), AuthError> {
        self.blacklist_if_live(TokenKind::Access, access_token)
            .await?;
        if let Some(refresh_token) = refresh_token {
            self.blacklist_if_live(TokenKind::Refresh, refresh_token)
                .await?;
        }
        Ok(())
    }

    async fn blacklist_if_live(&self, kind: TokenKind, token: &str) -> Result<(), AuthError> {
        let claims = match self.codec.verify(kind, token) {
            Ok(claims) => claims,
            Err(AuthError::Expired) => return Ok(()),
            Err(e) => return Err(e),
        };
        let signature = TokenCodec::signature(token)
            .ok_or_else(|| AuthError::malformed("token has no signature segment"))?;
        self.revocation
            .blacklist(
                signature,
                RevocationReason::Logout,
                remaining_validity(claims.exp),
            )
            .await?;
        tracing::debug!(subject_id = claims.sub, kind = %kind, "token denylisted on logout");
        Ok(())
    }
}

/// Seconds until `exp`, clamped to at least one second so a record written
/// for a token on the edge of expiry still lands with a TTL.
fn remaining_validity(exp: i64) -> Duration {
    let remaining = exp - OffsetDateTime::now_utc().unix_timestamp();
    Duration::from_secs(remaining.max(1) as u64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use authgate_cache::{KeyValueStore, MemoryStore, StoreError, StoreResult};
    use crate::config::AuthConfig;

    struct UnavailableStore;

    #[async_trait::async_trait]
    impl KeyValueStore for UnavailableStore {
        async fn get(&self, _: &str) -> StoreResult<Option<Vec<u8>>> {
            Err(StoreError::unavailable("simulated outage"))
        }
        async fn set(&self, _: &str, _: &[u8], _: Option<Duration>) -> StoreResult<()> {
            Err(StoreError::unavailable("simulated outage"))
        }
        async fn delete(&self, _: &str) -> StoreResult<u64> {
            Err(StoreError::unavailable("simulated outage"))
        }
        async fn delete_pattern(&self, _: &str) -> StoreResult<u64> {
            Err(StoreError::unavailable("simulated outage"))
        }
        async fn incr(&self, _: &str) -> StoreResult<i64> {
            Err(StoreError::unavailable("simulated outage"))
        }
        async fn expire(&self, _: &str, _: Duration) -> StoreResult<bool> {
            Err(StoreError::unavailable("simulated outage"))
        }
        async fn ttl(&self, _: &str) -> StoreResult<Option<Duration>> {
            Err(StoreError::unavailable("simulated outage"))
        }
        async fn exists(&self, _: &str) -> StoreResult<bool> {
            Err(StoreError::unavailable("simulated outage"))
        }
    }

    fn service_over(store: Arc<dyn KeyValueStore>) -> TokenService {
        let config = AuthConfig {
            access_secret: "test-access-secret".to_string(),
            refresh_secret: "test-refresh-secret".to_string(),
            ..AuthConfig::default()
        };
        TokenService::new(
            Arc::new(TokenCodec::new(&config).unwrap()),
            RevocationStore::new(store),
        )
    }

    fn service() -> TokenService {
        service_over(Arc::new(MemoryStore::new()))
    }

    fn subject() -> TokenSubject {
        TokenSubject {
            id: 1,
            email: "a@b.com".to_string(),
            role: "user".to_string(),
        }
    }

    #[tokio::test]
    async fn test_issued_pair_verifies() {
        let service = service();
        let pair = service.issue_pair(&subject()).unwrap();

        let access = service.verify_access(&pair.access_token).await.unwrap();
        let refresh = service.verify_refresh(&pair.refresh_token).await.unwrap();
        assert_eq!(access.sub, 1);
        assert_eq!(access.iat, refresh.iat);
        assert_eq!(access.exp, pair.access_expires_at);
    }

    #[tokio::test]
    async fn test_rotation_consumes_refresh_token() {
        let service = service();
        let pair = service.issue_pair(&subject()).unwrap();

        let rotated = service.rotate(&pair.refresh_token).await.unwrap();
        assert!(service.verify_refresh(&rotated.refresh_token).await.is_ok());

        // Second use of the consumed token is rejected as revoked.
        assert!(matches!(
            service.rotate(&pair.refresh_token).await,
            Err(AuthError::Revoked)
        ));
        assert!(matches!(
            service.verify_refresh(&pair.refresh_token).await,
            Err(AuthError::Revoked)
        ));
    }

    #[tokio::test]
    async fn test_rotation_does_not_touch_access_token() {
        let service = service();
        let pair = service.issue_pair(&subject()).unwrap();

        service.rotate(&pair.refresh_token).await.unwrap();
        assert!(service.verify_access(&pair.access_token).await.is_ok());
    }

    #[tokio::test]
    async fn test_revoke_all_invalidates_outstanding_pairs() {
        let service = service();
        let old = service.issue_pair(&subject()).unwrap();

        service
            .revoke_all(1, RevocationReason::PasswordChange)
            .await
            .unwrap();

        assert!(matches!(
            service.verify_access(&old.access_token).await,
            Err(AuthError::Revoked)
        ));
        assert!(matches!(
            service.verify_refresh(&old.refresh_token).await,
            Err(AuthError::Revoked)
        ));

        // A pair issued strictly after the cutoff verifies again.
        let later = OffsetDateTime::now_utc() + time::Duration::seconds(2);
        let fresh = service.issue_pair_at(&subject(), later).unwrap();
        assert!(service.verify_access(&fresh.access_token).await.is_ok());
    }

    #[tokio::test]
    async fn test_revoke_all_is_per_subject() {
        let service = service();
        let other = TokenSubject {
            id: 2,
            email: "c@d.com".to_string(),
            role: "user".to_string(),
        };
        let pair = service.issue_pair(&other).unwrap();

        service
            .revoke_all(1, RevocationReason::AdminAction)
            .await
            .unwrap();
        assert!(service.verify_access(&pair.access_token).await.is_ok());
    }

    #[tokio::test]
    async fn test_logout_denylists_both_tokens() {
        let service = service();
        let pair = service.issue_pair(&subject()).unwrap();

        service
            .logout(&pair.access_token, Some(&pair.refresh_token))
            .await
            .unwrap();

        assert!(matches!(
            service.verify_access(&pair.access_token).await,
            Err(AuthError::Revoked)
        ));
        assert!(matches!(
            service.verify_refresh(&pair.refresh_token).await,
            Err(AuthError::Revoked)
        ));
    }

    #[tokio::test]
    async fn test_logout_rejects_garbage() {
        let service = service();
        assert!(matches!(
            service.logout("not-a-jwt", None).await,
            Err(AuthError::Malformed { .. })
        ));
    }

    #[tokio::test]
    async fn test_verification_fails_open_when_store_is_down() {
        let service = service_over(Arc::new(UnavailableStore));
        let pair = service.issue_pair(&subject()).unwrap();

        // Issuance is pure and revocation reads fail open.
        assert!(service.verify_access(&pair.access_token).await.is_ok());
        assert!(service.verify_refresh(&pair.refresh_token).await.is_ok());
    }

    #[tokio::test]
    async fn test_revocation_writes_propagate_when_store_is_down() {
        let service = service_over(Arc::new(UnavailableStore));
        let pair = service.issue_pair(&subject()).unwrap();

        assert!(matches!(
            service.rotate(&pair.refresh_token).await,
            Err(AuthError::Store { .. })
        ));
        assert!(matches!(
            service.revoke_all(1, RevocationReason::Logout).await,
            Err(AuthError::Store { .. })
        ));
        assert!(matches!(
            service.logout(&pair.access_token, None).await,
            Err(AuthError::Store { .. })
        ));
    }
}

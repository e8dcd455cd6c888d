//! Token revocation records.
//!
//! Two record shapes live in the key-value store:
//!
//! - **Denylist entries**, keyed by a SHA-256 digest of the token's
//!   signature segment, with TTL equal to the token's remaining validity.
//!   A revocation record never outlives the token it blocks, so the store
//!   self-prunes.
//! - **Per-subject watermarks**: a cutoff timestamp under which every token
//!   issued at or before it is treated as revoked, without enumerating
//!   outstanding tokens. Used for password changes and logout-everywhere.
//!
//! ## Failure policy
//!
//! Reads fail open: if the store is unreachable the token is treated as not
//! revoked and a warning is logged. This trades strict revocation for
//! availability and is a deliberate, documented choice. Writes propagate
//! errors, because silently losing a denylist entry would leave a
//! rotated-out refresh token usable.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use time::OffsetDateTime;

use authgate_cache::KeyValueStore;

use crate::error::AuthError;

const DENYLIST_PREFIX: &str = "token:denylist:";
const WATERMARK_PREFIX: &str = "token:watermark:";

// ============================================================================
// Revocation Reason
// ============================================================================

/// Why a token or subject was revoked. Stored for support tooling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RevocationReason {
    /// Explicit logout of one session.
    Logout,
    /// The refresh token was consumed by a rotation.
    TokenRotation,
    /// The subject changed their password.
    PasswordChange,
    /// An operator revoked the subject's sessions.
    AdminAction,
}

impl RevocationReason {
    /// Returns the reason as a stable string.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Logout => "logout",
            Self::TokenRotation => "token_rotation",
            Self::PasswordChange => "password_change",
            Self::AdminAction => "admin_action",
        }
    }
}

impl std::fmt::Display for RevocationReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ============================================================================
// Records
// ============================================================================

#[derive(Debug, Serialize, Deserialize)]
struct DenylistRecord {
    reason: RevocationReason,
    revoked_at: i64,
}

#[derive(Debug, Serialize, Deserialize)]
struct WatermarkRecord {
    cutoff: i64,
    reason: RevocationReason,
}

// ============================================================================
// Revocation Store
// ============================================================================

/// Denylist and watermark storage over the shared [`KeyValueStore`].
#[derive(Clone)]
pub struct RevocationStore {
    store: Arc<dyn KeyValueStore>,
}

impl RevocationStore {
    /// Creates a revocation store over the shared store handle.
    #[must_use]
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// Denylists a token by its signature segment.
    ///
    /// `ttl` must be the token's remaining validity so the record expires
    /// with the token.
    ///
    /// # Errors
    ///
    /// Propagates store failures as [`AuthError::Store`].
    pub async fn blacklist(
        &self,
        signature: &str,
        reason: RevocationReason,
        ttl: Duration,
    ) -> Result<(), AuthError> {
        let record = DenylistRecord {
            reason,
            revoked_at: OffsetDateTime::now_utc().unix_timestamp(),
        };
        let value = serde_json::to_vec(&record)
            .map_err(|e| AuthError::store(format!("failed to encode denylist record: {e}")))?;
        self.store
            .set(&denylist_key(signature), &value, Some(ttl))
            .await?;
        tracing::debug!(reason = %reason, "token denylisted");
        Ok(())
    }

    /// Checks whether a token signature has been denylisted.
    ///
    /// Fails open: a store outage reads as "not revoked".
    pub async fn is_blacklisted(&self, signature: &str) -> bool {
        match self.store.exists(&denylist_key(signature)).await {
            Ok(revoked) => revoked,
            Err(e) => {
                tracing::warn!(error = %e,
                    "revocation check unavailable, failing open (token treated as not revoked)");
                false
            }
        }
    }

    /// Sets the subject's invalidation watermark to now.
    ///
    /// Every token with `iat` at or before the cutoff is treated as revoked.
    /// `ttl` should be the refresh token lifetime: after that, no token old
    /// enough to be blocked can still be alive.
    ///
    /// # Errors
    ///
    /// Propagates store failures as [`AuthError::Store`].
    pub async fn set_watermark(
        &self,
        subject_id: i64,
        reason: RevocationReason,
        ttl: Duration,
    ) -> Result<(), AuthError> {
        let record = WatermarkRecord {
            cutoff: OffsetDateTime::now_utc().unix_timestamp(),
            reason,
        };
        let value = serde_json::to_vec(&record)
            .map_err(|e| AuthError::store(format!("failed to encode watermark: {e}")))?;
        self.store
            .set(&watermark_key(subject_id), &value, Some(ttl))
            .await?;
        tracing::info!(subject_id, reason = %reason, "subject watermark set");
        Ok(())
    }

    /// Checks whether a token issued at `issued_at` is superseded by the
    /// subject's watermark. Absence of a watermark means never invalidated.
    ///
    /// Fails open: a store outage reads as "not superseded".
    pub async fn is_superseded(&self, subject_id: i64, issued_at: i64) -> bool {
        let raw = match self.store.get(&watermark_key(subject_id)).await {
            Ok(Some(raw)) => raw,
            Ok(None) => return false,
            Err(e) => {
                tracing::warn!(subject_id, error = %e,
                    "watermark check unavailable, failing open (token treated as not revoked)");
                return false;
            }
        };

        match serde_json::from_slice::<WatermarkRecord>(&raw) {
            Ok(record) => issued_at <= record.cutoff,
            Err(e) => {
                tracing::warn!(subject_id, error = %e, "undecodable watermark record ignored");
                false
            }
        }
    }
}

fn denylist_key(signature: &str) -> String {
    // Hash the signature so key size stays bounded regardless of algorithm.
    let digest = Sha256::digest(signature.as_bytes());
    format!("{DENYLIST_PREFIX}{}", hex::encode(digest))
}

fn watermark_key(subject_id: i64) -> String {
    format!("{WATERMARK_PREFIX}{subject_id}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use authgate_cache::{MemoryStore, StoreError, StoreResult};

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

    #[tokio::test]
    async fn test_blacklist_round_trip() {
        let store = RevocationStore::new(Arc::new(MemoryStore::new()));

        assert!(!store.is_blacklisted("sig-a").await);
        store
            .blacklist("sig-a", RevocationReason::Logout, Duration::from_secs(60))
            .await
            .unwrap();
        assert!(store.is_blacklisted("sig-a").await);
        assert!(!store.is_blacklisted("sig-b").await);
    }

    #[tokio::test]
    async fn test_record_expires_with_token() {
        let store = RevocationStore::new(Arc::new(MemoryStore::new()));
        store
            .blacklist(
                "sig-a",
                RevocationReason::TokenRotation,
                Duration::from_millis(10),
            )
            .await
            .unwrap();
        assert!(store.is_blacklisted("sig-a").await);

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!store.is_blacklisted("sig-a").await);
    }

    #[tokio::test]
    async fn test_watermark_supersedes_older_tokens() {
        let store = RevocationStore::new(Arc::new(MemoryStore::new()));
        let now = OffsetDateTime::now_utc().unix_timestamp();

        // No watermark: never invalidated.
        assert!(!store.is_superseded(1, now - 100).await);

        store
            .set_watermark(1, RevocationReason::PasswordChange, Duration::from_secs(60))
            .await
            .unwrap();
        assert!(store.is_superseded(1, now - 100).await);
        assert!(store.is_superseded(1, now).await);
        assert!(!store.is_superseded(1, now + 100).await);
        // Other subjects are untouched.
        assert!(!store.is_superseded(2, now - 100).await);
    }

    #[tokio::test]
    async fn test_reads_fail_open_writes_propagate() {
        let store = RevocationStore::new(Arc::new(UnavailableStore));

        assert!(!store.is_blacklisted("sig-a").await);
        assert!(!store.is_superseded(1, 0).await);

        let result = store
            .blacklist("sig-a", RevocationReason::Logout, Duration::from_secs(60))
            .await;
        assert!(matches!(result, Err(AuthError::Store { .. })));

        let result = store
            .set_watermark(1, RevocationReason::AdminAction, Duration::from_secs(60))
            .await;
        assert!(matches!(result, Err(AuthError::Store { .. })));
    }

    #[test]
    fn test_denylist_key_is_bounded() {
        let short = denylist_key("abc");
        let long = denylist_key(&"x".repeat(4096));
        assert_eq!(short.len(), long.len());
    }
}

//! Fixed-window request rate limiter.
//!
//! Counts requests per client identifier in a fixed window: `INCR` the
//! per-identifier key, and whichever caller sees the count come back as `1`
//! won the race to create the key and arms its expiry. This is NOT a true
//! sliding window; up to ~2x the nominal rate can pass across a window
//! boundary. That approximation is accepted.
//!
//! Increment and expire are two store calls, so a crash between them could
//! leave a counter without an expiry. `check` re-arms the window whenever it
//! observes a counter with no TTL, which turns that lockout into at most one
//! extra window.
//!
//! ## Failure policy
//!
//! Fail-open: if the store is unreachable the request is allowed and a
//! warning is logged. Rate limiting must never be the cause of an outage.

use std::sync::Arc;
use std::time::Duration;

use crate::store::KeyValueStore;

const KEY_PREFIX: &str = "ratelimit:";

/// Outcome of a rate-limit check, with everything needed for the
/// `RateLimit-*` response headers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitDecision {
    /// Whether the request may proceed.
    pub allowed: bool,
    /// The configured maximum for the window.
    pub limit: u32,
    /// Requests left in the current window.
    pub remaining: u32,
    /// Time until the current window resets.
    pub reset_after: Duration,
}

impl RateLimitDecision {
    fn open(limit: u32, window: Duration) -> Self {
        Self {
            allowed: true,
            limit,
            remaining: limit,
            reset_after: window,
        }
    }
}

/// Administrative view of one identifier's counter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitStatus {
    /// Requests counted in the current window.
    pub count: u64,
    /// Time until the window resets, if an expiry is armed.
    pub reset_after: Option<Duration>,
}

/// Fixed-window counter rate limiter over a [`KeyValueStore`].
#[derive(Clone)]
pub struct RateLimiter {
    store: Arc<dyn KeyValueStore>,
}

impl RateLimiter {
    /// Creates a limiter over the shared store handle.
    #[must_use]
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// Counts one request for `identifier` and decides whether it is allowed.
    ///
    /// `identifier` is whatever distinguishes clients for the guarded route
    /// (an IP, a user id, an API key). Counters for distinct identifiers are
    /// fully independent.
    pub async fn check(
        &self,
        identifier: &str,
        window: Duration,
        max_requests: u32,
    ) -> RateLimitDecision {
        let key = counter_key(identifier);

        let count = match self.store.incr(&key).await {
            Ok(count) => count,
            Err(e) => {
                tracing::warn!(identifier = %identifier, error = %e,
                    "rate-limit store unavailable, failing open");
                return RateLimitDecision::open(max_requests, window);
            }
        };

        if count == 1 {
            // This caller created the key and owns arming the window.
            if let Err(e) = self.store.expire(&key, window).await {
                tracing::warn!(identifier = %identifier, error = %e,
                    "failed to arm rate-limit window");
            }
        }

        let reset_after = match self.store.ttl(&key).await {
            Ok(Some(ttl)) => ttl,
            Ok(None) => {
                // Counter lost its expiry (crash between INCR and EXPIRE).
                // Re-arm rather than locking the identifier out permanently.
                if count > 1 {
                    let _ = self.store.expire(&key, window).await;
                }
                window
            }
            Err(e) => {
                tracing::warn!(identifier = %identifier, error = %e,
                    "failed to read rate-limit window TTL");
                window
            }
        };

        let allowed = count <= i64::from(max_requests);
        let remaining = u32::try_from(i64::from(max_requests) - count).unwrap_or(0);

        if !allowed {
            tracing::debug!(identifier = %identifier, count, limit = max_requests,
                "rate limit exceeded");
        }

        RateLimitDecision {
            allowed,
            limit: max_requests,
            remaining,
            reset_after,
        }
    }

    /// Clears the counter for `identifier`. Support tooling only.
    ///
    /// Returns `true` if a counter existed.
    pub async fn reset(&self, identifier: &str) -> bool {
        match self.store.delete(&counter_key(identifier)).await {
            Ok(removed) => removed > 0,
            Err(e) => {
                tracing::warn!(identifier = %identifier, error = %e, "rate-limit reset failed");
                false
            }
        }
    }

    /// Reports the current counter for `identifier`, if any. Support tooling.
    pub async fn status(&self, identifier: &str) -> Option<RateLimitStatus> {
        let key = counter_key(identifier);
        let raw = self.store.get(&key).await.ok()??;
        let count = std::str::from_utf8(&raw).ok()?.parse().ok()?;
        let reset_after = self.store.ttl(&key).await.ok().flatten();
        Some(RateLimitStatus { count, reset_after })
    }
}

fn counter_key(identifier: &str) -> String {
    format!("{KEY_PREFIX}{identifier}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{StoreError, StoreResult};
    use crate::store::MemoryStore;
    use async_trait::async_trait;

    const WINDOW: Duration = Duration::from_secs(60);

    struct UnavailableStore;

    #[async_trait]
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
    async fn test_first_n_allowed_then_denied() {
        let limiter = RateLimiter::new(Arc::new(MemoryStore::new()));

        for i in 0..5u32 {
            let decision = limiter.check("ip:1.2.3.4", WINDOW, 5).await;
            assert!(decision.allowed, "request {} should be allowed", i + 1);
            assert_eq!(decision.remaining, 4 - i);
        }

        let decision = limiter.check("ip:1.2.3.4", WINDOW, 5).await;
        assert!(!decision.allowed);
        assert_eq!(decision.remaining, 0);
        assert!(decision.reset_after <= WINDOW);
    }

    #[tokio::test]
    async fn test_identifiers_are_independent() {
        let limiter = RateLimiter::new(Arc::new(MemoryStore::new()));

        assert!(limiter.check("ip:a", WINDOW, 1).await.allowed);
        assert!(!limiter.check("ip:a", WINDOW, 1).await.allowed);
        assert!(limiter.check("ip:b", WINDOW, 1).await.allowed);
    }

    #[tokio::test]
    async fn test_window_expiry_resets_counter() {
        let limiter = RateLimiter::new(Arc::new(MemoryStore::new()));
        let window = Duration::from_millis(20);

        assert!(limiter.check("ip:c", window, 1).await.allowed);
        assert!(!limiter.check("ip:c", window, 1).await.allowed);

        tokio::time::sleep(Duration::from_millis(40)).await;
        assert!(limiter.check("ip:c", window, 1).await.allowed);
    }

    #[tokio::test]
    async fn test_fail_open_when_store_unreachable() {
        let limiter = RateLimiter::new(Arc::new(UnavailableStore));

        // Allowed regardless of how many calls were made before.
        for _ in 0..20 {
            let decision = limiter.check("ip:1.2.3.4", WINDOW, 5).await;
            assert!(decision.allowed);
            assert_eq!(decision.remaining, 5);
        }
    }

    #[tokio::test]
    async fn test_reset_and_status() {
        let limiter = RateLimiter::new(Arc::new(MemoryStore::new()));

        assert_eq!(limiter.status("ip:d").await, None);
        limiter.check("ip:d", WINDOW, 5).await;
        limiter.check("ip:d", WINDOW, 5).await;

        let status = limiter.status("ip:d").await.unwrap();
        assert_eq!(status.count, 2);
        assert!(status.reset_after.is_some());

        assert!(limiter.reset("ip:d").await);
        assert_eq!(limiter.status("ip:d").await, None);
        assert!(limiter.check("ip:d", WINDOW, 5).await.remaining == 4);
    }

    #[tokio::test]
    async fn test_missing_expiry_is_rearmed() {
        let store = Arc::new(MemoryStore::new());
        // Simulate a crash after INCR: counter exists with no TTL.
        store.incr("ratelimit:ip:e").await.unwrap();
        let limiter = RateLimiter::new(store.clone());

        let decision = limiter.check("ip:e", WINDOW, 5).await;
        assert!(decision.allowed);
        // The window was re-armed.
        assert!(store.ttl("ratelimit:ip:e").await.unwrap().is_some());
    }
}

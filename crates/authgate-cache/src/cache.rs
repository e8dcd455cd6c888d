//! Cache-aside layer for hot entity reads.
//!
//! Callers check the cache, fall back to the source of truth on a miss, and
//! populate the cache with the result. Keys are namespaced strings such as
//! `country:id:7` or `country:list:{"page":1}`; values are serde_json
//! snapshots with typed decode errors.
//!
//! ## Failure policy
//!
//! Every operation is best-effort. Store outages and decode failures are
//! logged and treated as misses; `invalidate` never returns an error so a
//! cache outage can never block a write from committing.
//!
//! ## Concurrency
//!
//! Concurrent misses for the same key are NOT deduplicated: each caller
//! invokes the loader independently and the last write wins. Loaders are
//! idempotent reads, so this is correct, but it is a thundering-herd risk
//! for very hot keys.
//!
//! ## Ordering
//!
//! Write paths must call `invalidate` only after the underlying write has
//! committed. Invalidating first would let a concurrent stale read
//! repopulate the cache from pre-write data.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::store::KeyValueStore;

/// Time-to-live tiers for cache namespaces.
///
/// Reference data (countries, roles) changes rarely and sits in the long
/// tier; list queries default to short so pagination drift self-corrects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheTtl {
    /// 60 seconds.
    Short,
    /// 5 minutes.
    Medium,
    /// 1 hour.
    Long,
    /// Caller-supplied duration.
    Custom(Duration),
}

impl CacheTtl {
    /// Resolves the tier to a concrete duration.
    #[must_use]
    pub fn as_duration(self) -> Duration {
        match self {
            Self::Short => Duration::from_secs(60),
            Self::Medium => Duration::from_secs(300),
            Self::Long => Duration::from_secs(3600),
            Self::Custom(duration) => duration,
        }
    }
}

/// Read-through / invalidate-on-write cache over a [`KeyValueStore`].
#[derive(Clone)]
pub struct Cache {
    store: Arc<dyn KeyValueStore>,
}

impl Cache {
    /// Creates a cache over the shared store handle.
    #[must_use]
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// Gets a typed value, or `None` on miss, store outage, or decode failure.
    ///
    /// An entry that no longer decodes into `T` is evicted so the next read
    /// repopulates it from the source of truth.
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let data = match self.store.get(key).await {
            Ok(Some(data)) => data,
            Ok(None) => {
                tracing::debug!(key = %key, "cache miss");
                return None;
            }
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "cache read failed, treating as miss");
                return None;
            }
        };

        match serde_json::from_slice(&data) {
            Ok(value) => {
                tracing::debug!(key = %key, "cache hit");
                Some(value)
            }
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "cached value failed to decode, evicting");
                self.invalidate(key).await;
                None
            }
        }
    }

    /// Stores a typed value with the namespace's TTL. Best-effort.
    pub async fn put<T: Serialize>(&self, key: &str, value: &T, ttl: CacheTtl) {
        let data = match serde_json::to_vec(value) {
            Ok(data) => data,
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "failed to serialize value for cache");
                return;
            }
        };
        if let Err(e) = self
            .store
            .set(key, &data, Some(ttl.as_duration()))
            .await
        {
            tracing::warn!(key = %key, error = %e, "cache write failed");
        }
    }

    /// Returns the cached value for `key`, loading and caching it on a miss.
    ///
    /// Loader errors propagate unchanged; cache errors never do.
    pub async fn get_or_load<T, E, F, Fut>(
        &self,
        key: &str,
        ttl: CacheTtl,
        loader: F,
    ) -> Result<T, E>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        if let Some(cached) = self.get::<T>(key).await {
            return Ok(cached);
        }

        let value = loader().await?;
        self.put(key, &value, ttl).await;
        Ok(value)
    }

    /// Removes one cache entry. Best-effort: failures are logged, never thrown.
    pub async fn invalidate(&self, key: &str) {
        if let Err(e) = self.store.delete(key).await {
            tracing::warn!(key = %key, error = %e, "cache invalidation failed");
        } else {
            tracing::debug!(key = %key, "cache invalidated");
        }
    }

    /// Removes every entry matching a glob pattern, e.g. `country:list:*`.
    ///
    /// Used after writes to clear list/query caches whose keys embed
    /// serialized query options. Best-effort.
    pub async fn invalidate_pattern(&self, pattern: &str) {
        match self.store.delete_pattern(pattern).await {
            Ok(removed) => {
                tracing::debug!(pattern = %pattern, removed, "cache pattern invalidated");
            }
            Err(e) => {
                tracing::warn!(pattern = %pattern, error = %e, "cache pattern invalidation failed");
            }
        }
    }
}

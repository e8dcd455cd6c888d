//! Key-value store abstraction and backends.
//!
//! The [`KeyValueStore`] trait is the single seam between this crate and the
//! networked TTL store. Two backends are provided:
//!
//! - [`RedisStore`] - deadpool-redis backed, for multi-instance deployments
//! - [`MemoryStore`] - DashMap backed, for single-instance mode and tests
//!
//! Consumers (cache, rate limiter, revocation store) depend only on the
//! trait, so backends can be swapped without touching call sites.

pub mod memory;
pub mod redis;

use std::time::Duration;

use async_trait::async_trait;

use crate::error::StoreResult;

pub use memory::MemoryStore;
pub use redis::RedisStore;

/// Asynchronous key-value store with expiring keys.
///
/// All operations are network-bound suspension points with bounded timeouts.
/// Per-key atomicity (single increment, single set) is provided by the
/// backend; no additional locking is layered on top.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Gets the raw value stored at `key`, or `None` if absent or expired.
    async fn get(&self, key: &str) -> StoreResult<Option<Vec<u8>>>;

    /// Sets `key` to `value`, optionally with a time-to-live.
    async fn set(&self, key: &str, value: &[u8], ttl: Option<Duration>) -> StoreResult<()>;

    /// Deletes `key`. Returns the number of keys removed (0 or 1).
    async fn delete(&self, key: &str) -> StoreResult<u64>;

    /// Deletes every key matching a glob-style pattern (`*` wildcard).
    ///
    /// Returns the number of keys removed. Used for list-cache namespaces
    /// keyed by serialized query options.
    async fn delete_pattern(&self, pattern: &str) -> StoreResult<u64>;

    /// Atomically increments the integer at `key` by one, creating it at 0
    /// first if absent. Returns the post-increment value.
    async fn incr(&self, key: &str) -> StoreResult<i64>;

    /// Sets a time-to-live on an existing key.
    ///
    /// Returns `false` if the key does not exist.
    async fn expire(&self, key: &str, ttl: Duration) -> StoreResult<bool>;

    /// Returns the remaining time-to-live of `key`.
    ///
    /// `None` means the key is absent or has no expiry.
    async fn ttl(&self, key: &str) -> StoreResult<Option<Duration>>;

    /// Returns `true` if `key` exists.
    async fn exists(&self, key: &str) -> StoreResult<bool>;
}

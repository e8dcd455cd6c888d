//! Redis-backed key-value store.
//!
//! Wraps a shared `deadpool_redis::Pool` behind the [`KeyValueStore`] trait.
//! The pool is created once at process start and reused by every request;
//! reconnection and backoff are owned by the pool, never by call sites.
//!
//! Every operation carries a bounded timeout. A timed-out call is reported
//! as [`StoreError::Timeout`] and treated by callers exactly like an
//! unreachable store. The store tracks its own availability so that state
//! transitions are logged once instead of on every failing call.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use deadpool_redis::Pool;
use redis::AsyncCommands;

use crate::error::{StoreError, StoreResult};

use super::KeyValueStore;

/// Default per-operation timeout.
pub const DEFAULT_OP_TIMEOUT: Duration = Duration::from_millis(500);

/// Redis-backed implementation of [`KeyValueStore`].
pub struct RedisStore {
    pool: Pool,
    prefix: String,
    op_timeout: Duration,
    available: AtomicBool,
}

impl RedisStore {
    /// Creates a new store over an existing connection pool.
    ///
    /// `prefix` is prepended to every key so multiple applications can share
    /// one Redis instance (e.g. `"authgate:"`).
    #[must_use]
    pub fn new(pool: Pool, prefix: impl Into<String>) -> Self {
        Self {
            pool,
            prefix: prefix.into(),
            op_timeout: DEFAULT_OP_TIMEOUT,
            available: AtomicBool::new(true),
        }
    }

    /// Sets the per-operation timeout.
    #[must_use]
    pub fn with_op_timeout(mut self, timeout: Duration) -> Self {
        self.op_timeout = timeout;
        self
    }

    /// Returns `true` if the last store operation succeeded.
    #[must_use]
    pub fn is_available(&self) -> bool {
        self.available.load(Ordering::Relaxed)
    }

    /// Round-trips a `PING` to the backend. Used by health checks.
    pub async fn ping(&self) -> StoreResult<()> {
        let mut conn = self.connection().await?;
        self.run(redis::cmd("PING").query_async::<()>(&mut conn))
            .await
    }

    fn namespaced(&self, key: &str) -> String {
        format!("{}{}", self.prefix, key)
    }

    async fn connection(&self) -> StoreResult<deadpool_redis::Connection> {
        match tokio::time::timeout(self.op_timeout, self.pool.get()).await {
            Ok(Ok(conn)) => Ok(conn),
            Ok(Err(e)) => {
                let err = StoreError::unavailable(e.to_string());
                self.mark_unavailable(&err);
                Err(err)
            }
            Err(_) => {
                let err = self.timeout_error();
                self.mark_unavailable(&err);
                Err(err)
            }
        }
    }

    /// Runs one backend call under the operation timeout, updating the
    /// availability flag from the outcome.
    async fn run<T>(&self, fut: impl Future<Output = redis::RedisResult<T>>) -> StoreResult<T> {
        match tokio::time::timeout(self.op_timeout, fut).await {
            Ok(Ok(value)) => {
                self.mark_available();
                Ok(value)
            }
            Ok(Err(e)) => {
                let err = StoreError::from(e);
                if err.is_unavailable() {
                    self.mark_unavailable(&err);
                }
                Err(err)
            }
            Err(_) => {
                let err = self.timeout_error();
                self.mark_unavailable(&err);
                Err(err)
            }
        }
    }

    fn timeout_error(&self) -> StoreError {
        StoreError::Timeout {
            timeout_ms: self.op_timeout.as_millis() as u64,
        }
    }

    fn mark_available(&self) {
        if !self.available.swap(true, Ordering::Relaxed) {
            tracing::info!("key-value store reachable again");
        }
    }

    fn mark_unavailable(&self, err: &StoreError) {
        if self.available.swap(false, Ordering::Relaxed) {
            tracing::warn!(error = %err, "key-value store unreachable, degrading");
        }
    }
}

#[async_trait]
impl KeyValueStore for RedisStore {
    async fn get(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        let key = self.namespaced(key);
        let mut conn = self.connection().await?;
        self.run(conn.get::<_, Option<Vec<u8>>>(&key)).await
    }

    async fn set(&self, key: &str, value: &[u8], ttl: Option<Duration>) -> StoreResult<()> {
        let key = self.namespaced(key);
        let mut conn = self.connection().await?;
        match ttl {
            Some(ttl) => {
                // SETEX with a zero TTL is a Redis error; clamp to 1s.
                let secs = ttl.as_secs().max(1);
                self.run(conn.set_ex::<_, _, ()>(&key, value, secs)).await
            }
            None => self.run(conn.set::<_, _, ()>(&key, value)).await,
        }
    }

    async fn delete(&self, key: &str) -> StoreResult<u64> {
        let key = self.namespaced(key);
        let mut conn = self.connection().await?;
        self.run(conn.del::<_, u64>(&key)).await
    }

    async fn delete_pattern(&self, pattern: &str) -> StoreResult<u64> {
        let pattern = self.namespaced(pattern);
        let mut conn = self.connection().await?;

        // SCAN instead of KEYS: bounded per-iteration cost on a shared store.
        let keys: Vec<String> = {
            let mut iter = self.run(conn.scan_match::<_, String>(&pattern)).await?;
            let mut keys = Vec::new();
            while let Some(key) = iter.next_item().await {
                keys.push(key);
            }
            keys
        };

        if keys.is_empty() {
            return Ok(0);
        }
        self.run(conn.del::<_, u64>(keys)).await
    }

    async fn incr(&self, key: &str) -> StoreResult<i64> {
        let key = self.namespaced(key);
        let mut conn = self.connection().await?;
        self.run(conn.incr::<_, _, i64>(&key, 1i64)).await
    }

    async fn expire(&self, key: &str, ttl: Duration) -> StoreResult<bool> {
        let key = self.namespaced(key);
        let mut conn = self.connection().await?;
        self.run(conn.expire::<_, bool>(&key, ttl.as_secs().max(1) as i64))
            .await
    }

    async fn ttl(&self, key: &str) -> StoreResult<Option<Duration>> {
        let key = self.namespaced(key);
        let mut conn = self.connection().await?;
        let secs = self.run(conn.ttl::<_, i64>(&key)).await?;
        // -2 = key absent, -1 = key present without expiry.
        if secs < 0 {
            Ok(None)
        } else {
            Ok(Some(Duration::from_secs(secs as u64)))
        }
    }

    async fn exists(&self, key: &str) -> StoreResult<bool> {
        let key = self.namespaced(key);
        let mut conn = self.connection().await?;
        self.run(conn.exists::<_, bool>(&key)).await
    }
}

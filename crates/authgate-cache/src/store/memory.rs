//! In-process key-value store.
//!
//! DashMap-backed [`KeyValueStore`] with TTL support. Used for
//! single-instance deployments where Redis is disabled, and as the store
//! double in tests. Semantics mirror the Redis backend: lazily expired
//! keys, counter keys stored as ASCII integers, glob `*` patterns.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;

use crate::error::{StoreError, StoreResult};

use super::KeyValueStore;

#[derive(Clone, Debug)]
struct Entry {
    value: Vec<u8>,
    expires_at: Option<Instant>,
}

impl Entry {
    fn new(value: Vec<u8>, ttl: Option<Duration>) -> Self {
        Self {
            value,
            expires_at: ttl.map(|ttl| Instant::now() + ttl),
        }
    }

    fn is_expired(&self) -> bool {
        self.expires_at.is_some_and(|at| at <= Instant::now())
    }
}

/// In-memory implementation of [`KeyValueStore`].
#[derive(Default)]
pub struct MemoryStore {
    entries: DashMap<String, Entry>,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live (non-expired) entries. Used by tests and stats.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries
            .iter()
            .filter(|entry| !entry.is_expired())
            .count()
    }

    /// Returns `true` if the store holds no live entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn live_entry(&self, key: &str) -> Option<Entry> {
        let entry = self.entries.get(key)?;
        if entry.is_expired() {
            drop(entry);
            self.entries.remove(key);
            return None;
        }
        Some(entry.clone())
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        Ok(self.live_entry(key).map(|entry| entry.value))
    }

    async fn set(&self, key: &str, value: &[u8], ttl: Option<Duration>) -> StoreResult<()> {
        self.entries
            .insert(key.to_string(), Entry::new(value.to_vec(), ttl));
        Ok(())
    }

    async fn delete(&self, key: &str) -> StoreResult<u64> {
        Ok(u64::from(self.entries.remove(key).is_some()))
    }

    async fn delete_pattern(&self, pattern: &str) -> StoreResult<u64> {
        let mut removed = 0u64;
        self.entries.retain(|key, _| {
            if pattern_matches(pattern, key) {
                removed += 1;
                false
            } else {
                true
            }
        });
        Ok(removed)
    }

    async fn incr(&self, key: &str) -> StoreResult<i64> {
        let mut entry = self
            .entries
            .entry(key.to_string())
            .or_insert_with(|| Entry::new(b"0".to_vec(), None));
        if entry.is_expired() {
            *entry = Entry::new(b"0".to_vec(), None);
        }
        let current: i64 = std::str::from_utf8(&entry.value)
            .ok()
            .and_then(|s| s.parse().ok())
            .ok_or_else(|| StoreError::backend("value is not an integer"))?;
        let next = current + 1;
        entry.value = next.to_string().into_bytes();
        Ok(next)
    }

    async fn expire(&self, key: &str, ttl: Duration) -> StoreResult<bool> {
        match self.entries.get_mut(key) {
            Some(mut entry) if !entry.is_expired() => {
                entry.expires_at = Some(Instant::now() + ttl);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn ttl(&self, key: &str) -> StoreResult<Option<Duration>> {
        Ok(self
            .live_entry(key)
            .and_then(|entry| entry.expires_at)
            .map(|at| at.saturating_duration_since(Instant::now())))
    }

    async fn exists(&self, key: &str) -> StoreResult<bool> {
        Ok(self.live_entry(key).is_some())
    }
}

/// Glob match supporting only the `*` wildcard, anchored at both ends.
fn pattern_matches(pattern: &str, key: &str) -> bool {
    let mut parts = pattern.split('*');
    let first = parts.next().unwrap_or("");
    if !key.starts_with(first) {
        return false;
    }
    let mut rest = &key[first.len()..];
    let mut segments: Vec<&str> = parts.collect();
    if segments.is_empty() {
        // No wildcard at all: exact match required.
        return rest.is_empty();
    }
    let last = segments.pop().unwrap_or("");
    for segment in segments {
        if segment.is_empty() {
            continue;
        }
        match rest.find(segment) {
            Some(pos) => rest = &rest[pos + segment.len()..],
            None => return false,
        }
    }
    rest.ends_with(last)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pattern_matches() {
        assert!(pattern_matches("country:*", "country:id:7"));
        assert!(pattern_matches("country:list:*", "country:list:{\"page\":1}"));
        assert!(!pattern_matches("country:list:*", "role:list:all"));
        assert!(pattern_matches("exact", "exact"));
        assert!(!pattern_matches("exact", "exact:more"));
        assert!(pattern_matches("*:id:7", "country:id:7"));
        assert!(pattern_matches("a*c*e", "abcde"));
        assert!(!pattern_matches("a*c*e", "abde"));
    }

    #[tokio::test]
    async fn test_set_get_delete() {
        let store = MemoryStore::new();
        store.set("k", b"v", None).await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), Some(b"v".to_vec()));
        assert_eq!(store.delete("k").await.unwrap(), 1);
        assert_eq!(store.get("k").await.unwrap(), None);
        assert_eq!(store.delete("k").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_ttl_expiry() {
        let store = MemoryStore::new();
        store
            .set("k", b"v", Some(Duration::from_millis(10)))
            .await
            .unwrap();
        assert!(store.exists("k").await.unwrap());
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!store.exists("k").await.unwrap());
        assert_eq!(store.get("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_incr_and_expire() {
        let store = MemoryStore::new();
        assert_eq!(store.incr("counter").await.unwrap(), 1);
        assert_eq!(store.incr("counter").await.unwrap(), 2);

        assert!(store.expire("counter", Duration::from_secs(60)).await.unwrap());
        let ttl = store.ttl("counter").await.unwrap().unwrap();
        assert!(ttl <= Duration::from_secs(60));

        assert!(!store.expire("missing", Duration::from_secs(1)).await.unwrap());
    }

    #[tokio::test]
    async fn test_incr_non_integer_value() {
        let store = MemoryStore::new();
        store.set("k", b"not a number", None).await.unwrap();
        assert!(store.incr("k").await.is_err());
    }

    #[tokio::test]
    async fn test_expired_counter_restarts() {
        let store = MemoryStore::new();
        store.incr("c").await.unwrap();
        store.expire("c", Duration::from_millis(10)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(store.incr("c").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_delete_pattern() {
        let store = MemoryStore::new();
        store.set("country:id:1", b"a", None).await.unwrap();
        store.set("country:id:2", b"b", None).await.unwrap();
        store.set("role:id:1", b"c", None).await.unwrap();

        assert_eq!(store.delete_pattern("country:*").await.unwrap(), 2);
        assert!(!store.exists("country:id:1").await.unwrap());
        assert!(store.exists("role:id:1").await.unwrap());
    }

    #[tokio::test]
    async fn test_ttl_absent_and_persistent() {
        let store = MemoryStore::new();
        assert_eq!(store.ttl("missing").await.unwrap(), None);
        store.set("k", b"v", None).await.unwrap();
        assert_eq!(store.ttl("k").await.unwrap(), None);
    }
}

//! # authgate-cache
//!
//! Shared key-value plane for the Authgate server: a thin client over a
//! TTL key-value store, a cache-aside layer for hot entity reads, and a
//! fixed-window request rate limiter.
//!
//! ## Overview
//!
//! All three components share one [`KeyValueStore`] handle. The store is
//! constructed once at process start and injected into every consumer;
//! nothing in this crate holds global state.
//!
//! ## Graceful degradation
//!
//! Cache reads/writes and rate-limit checks are best-effort: when the
//! backing store is unreachable or times out, they log a warning and
//! degrade (cache miss, request allowed) instead of surfacing an error
//! to the caller. See [`error::StoreError`] for the failure taxonomy.
//!
//! ## Modules
//!
//! - [`store`] - the `KeyValueStore` trait plus Redis and in-memory backends
//! - [`cache`] - typed read-through / invalidate-on-write cache
//! - [`rate_limit`] - fixed-window counter rate limiter

pub mod cache;
pub mod error;
pub mod rate_limit;
pub mod store;

pub use cache::{Cache, CacheTtl};
pub use error::{StoreError, StoreResult};
pub use rate_limit::{RateLimitDecision, RateLimitStatus, RateLimiter};
pub use store::{KeyValueStore, MemoryStore, RedisStore};

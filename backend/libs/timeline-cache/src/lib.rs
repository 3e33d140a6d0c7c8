//! Timeline caching layer
//!
//! Two caches sit on top of a key-value store with list operations:
//! - [`ObjectCache`]: read-through snapshots of single entities, evicted
//!   explicitly by the code that mutates them
//! - [`BoundedListCache`]: per-owner capped list of the newest entries,
//!   populated on miss and extended by write-through appends
//!
//! Neither cache ever surfaces a store failure to its caller. Errors are
//! logged, counted, and degrade to a miss (reads) or a no-op (writes).

mod codec;
mod error;
mod keys;
mod list;
mod metrics;
mod object;
mod redis_store;

pub mod memory;

pub use codec::{decode, encode, Cacheable};
pub use error::{CacheError, CacheResult};
pub use keys::{CacheKey, CACHE_VERSION};
pub use list::{AppendOutcome, BoundedListCache};
pub use memory::MemoryCacheStore;
pub use metrics::CacheMetrics;
pub use object::ObjectCache;
pub use redis_store::RedisCacheStore;

/// Default TTL values (seconds)
pub mod ttl {
    pub const TIMELINE_LIST: u64 = 24 * 60 * 60; // 1 day
    pub const OBJECT: u64 = 60 * 60; // 1 hour, safety net only
    pub const GENERATION: u64 = 24 * 60 * 60; // outlives any in-flight load
}

/// Key-value store with the list primitives the caches are built on.
///
/// Every method is a single atomic operation, including the conditional
/// writes that inspect a second key or the key's existence.
#[async_trait::async_trait]
pub trait CacheStore: Send + Sync {
    /// Get a string value
    async fn get(&self, key: &str) -> CacheResult<Option<String>>;

    /// Set a string value, with an optional TTL in seconds
    async fn set(&self, key: &str, value: &str, ttl_secs: Option<u64>) -> CacheResult<()>;

    /// Check if key exists
    async fn exists(&self, key: &str) -> CacheResult<bool>;

    /// Delete a key
    async fn delete(&self, key: &str) -> CacheResult<()>;

    /// Increment a counter (absent counts as 0) and refresh its TTL.
    /// Returns the new value.
    async fn incr(&self, key: &str, ttl_secs: u64) -> CacheResult<u64>;

    /// Set a string value only while the counter at `guard_key` still reads
    /// `expected` (absent reads as 0). Returns whether the value was written.
    async fn set_if_unchanged(
        &self,
        key: &str,
        value: &str,
        ttl_secs: Option<u64>,
        guard_key: &str,
        expected: u64,
    ) -> CacheResult<bool>;

    /// Push to the head of an existing list (LPUSHX).
    ///
    /// Returns the new length, or 0 when the list does not exist, in which
    /// case nothing is written.
    async fn list_push_front(&self, key: &str, value: &str) -> CacheResult<usize>;

    /// Keep only `start..=stop` (LTRIM, negative indices count from the tail)
    async fn list_trim(&self, key: &str, start: isize, stop: isize) -> CacheResult<()>;

    /// Read `start..=stop` (LRANGE, negative indices count from the tail)
    async fn list_range(&self, key: &str, start: isize, stop: isize) -> CacheResult<Vec<String>>;

    /// Create the list from `values` with a TTL, unless the key already
    /// exists. Returns whether the list was written; an empty `values`
    /// writes nothing.
    async fn list_create(&self, key: &str, values: &[String], ttl_secs: u64) -> CacheResult<bool>;

    /// Refresh a key's TTL
    async fn expire(&self, key: &str, ttl_secs: u64) -> CacheResult<()>;
}

/// Add up to 10% jitter to a TTL so keys written together do not expire together
pub(crate) fn add_jitter(ttl_secs: u64) -> u64 {
    let jitter_percent = (rand::random::<u32>() % 10) as f64 / 100.0;
    let jitter = (ttl_secs as f64 * jitter_percent).round() as u64;
    ttl_secs + jitter
}

//! Read-through cache for single entities.

use crate::{
    add_jitter, decode, encode, ttl, CacheError, CacheKey, CacheMetrics, CacheStore, Cacheable,
};
use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, error, warn};

/// Get-or-load cache for entity snapshots.
///
/// Entries are correct only as long as every mutation of the backing entity
/// calls [`ObjectCache::invalidate`]. The optional TTL is a safety net, not
/// the consistency mechanism. Negative results are never cached.
///
/// Each key has an invalidation counter. A reader notes the counter before
/// running its loader and only fills if the counter is unchanged, so a value
/// loaded before a concurrent mutation is never written back after that
/// mutation's invalidation. If the counter cannot be read the value is
/// returned but not cached.
#[derive(Clone)]
pub struct ObjectCache {
    store: Arc<dyn CacheStore>,
    ttl_secs: Option<u64>,
    metrics: CacheMetrics,
}

impl ObjectCache {
    pub fn new(store: Arc<dyn CacheStore>, ttl_secs: Option<u64>) -> Self {
        Self {
            store,
            ttl_secs: ttl_secs.filter(|ttl| *ttl > 0),
            metrics: CacheMetrics::new(),
        }
    }

    /// Return the cached snapshot of `T` with `id`, or run `loader`, cache its
    /// value and return it.
    ///
    /// Loader errors (including "not found") are returned as-is and leave the
    /// cache untouched. Cache failures only cost a trip to the loader.
    pub async fn get_or_load<T, E, F, Fut>(&self, id: impl Display, loader: F) -> Result<T, E>
    where
        T: Cacheable,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let key = CacheKey::object(T::KIND, &id);

        if let Some(value) = self.lookup::<T>(&key).await {
            return Ok(value);
        }

        let generation = self.generation(&key).await;
        let value = loader().await?;
        if let Some(generation) = generation {
            self.fill(&key, &value, generation).await;
        }
        Ok(value)
    }

    /// Evict the snapshot of `T` with `id`. The next read repopulates lazily.
    ///
    /// Returns whether the eviction reached the store. A failed eviction is
    /// logged at error level; the safety-net TTL bounds the staleness.
    pub async fn invalidate<T: Cacheable>(&self, id: impl Display) -> bool {
        self.invalidate_key(&CacheKey::object(T::KIND, id)).await
    }

    async fn invalidate_key(&self, key: &str) -> bool {
        // Bump before deleting: a fill landing in between must already see
        // the new generation.
        let guard = CacheKey::generation(key);
        let bumped = match self.store.incr(&guard, ttl::GENERATION).await {
            Ok(_) => true,
            Err(e) => {
                error!(key = %key, error = %e, "Object cache generation bump failed");
                self.metrics.record_error(key, "incr");
                false
            }
        };

        let evicted = match self.store.delete(key).await {
            Ok(()) => {
                debug!(key = %key, "Object cache invalidated");
                self.metrics.record_invalidation(key);
                true
            }
            Err(e) => {
                error!(key = %key, error = %e, "Object cache invalidation failed");
                self.metrics.record_error(key, "invalidate");
                false
            }
        };
        bumped && evicted
    }

    async fn generation(&self, key: &str) -> Option<u64> {
        let guard = CacheKey::generation(key);
        match self.store.get(&guard).await {
            Ok(None) => Some(0),
            Ok(Some(raw)) => match raw.parse() {
                Ok(generation) => Some(generation),
                Err(_) => {
                    warn!(key = %guard, "Unreadable cache generation, not filling");
                    None
                }
            },
            Err(e) => {
                warn!(key = %key, error = %e, "Cache generation read failed, not filling");
                self.metrics.record_error(key, "generation");
                None
            }
        }
    }

    async fn lookup<T: Cacheable>(&self, key: &str) -> Option<T> {
        let raw = match self.store.get(key).await {
            Ok(Some(raw)) => raw,
            Ok(None) => {
                debug!(key = %key, "Object cache miss");
                self.metrics.record_miss(key);
                return None;
            }
            Err(e) => {
                warn!(key = %key, error = %e, "Object cache read failed, loading from source");
                self.metrics.record_error(key, "get");
                return None;
            }
        };

        match decode::<T>(&raw) {
            Ok(value) => {
                debug!(key = %key, "Object cache hit");
                self.metrics.record_hit(key);
                Some(value)
            }
            Err(e) => {
                match &e {
                    CacheError::SchemaMismatch { .. } => {
                        debug!(key = %key, error = %e, "Discarding cached object from older schema")
                    }
                    _ => warn!(key = %key, error = %e, "Discarding undecodable cached object"),
                }
                self.metrics.record_miss(key);
                let _ = self.store.delete(key).await;
                None
            }
        }
    }

    async fn fill<T: Cacheable>(&self, key: &str, value: &T, generation: u64) {
        let raw = match encode(value) {
            Ok(raw) => raw,
            Err(e) => {
                warn!(key = %key, error = %e, "Object cache serialization failed");
                self.metrics.record_error(key, "encode");
                return;
            }
        };

        let guard = CacheKey::generation(key);
        match self
            .store
            .set_if_unchanged(key, &raw, self.ttl_secs.map(add_jitter), &guard, generation)
            .await
        {
            Ok(true) => self.metrics.record_write(key),
            Ok(false) => {
                debug!(key = %key, "Invalidated while loading, not caching the loaded value");
            }
            Err(e) => {
                warn!(key = %key, error = %e, "Object cache write failed");
                self.metrics.record_error(key, "set");
            }
        }
    }
}

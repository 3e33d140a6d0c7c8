//! Bounded per-owner list cache.
//!
//! Holds, newest first, at most `capacity` entries of an owner's history.
//! An absent key and an empty list are the same thing: a miss. An empty
//! history is never cached, so a reader that misses always consults the
//! durable store.
//!
//! A list is only ever created when its key is absent, and afterwards only
//! grows by appends. A populate racing with an append therefore can never
//! erase the appended entry; the loser of the race leaves the winner's list
//! in place. Concurrent writers may still leave an entry twice or slightly
//! out of order, so readers that need strict order normalize what they read.

use crate::{add_jitter, decode, encode, CacheKey, CacheMetrics, CacheStore, Cacheable};
use std::fmt::Display;
use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;
use tracing::{debug, warn};

/// What [`BoundedListCache::append`] ended up doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppendOutcome {
    /// Entry pushed onto a cached list
    Pushed,
    /// List was cold and has been loaded from the durable source
    Populated,
    /// Nothing written (cache unavailable, empty source, or source failed)
    Skipped,
}

enum Fill {
    Created,
    Exists,
    Failed,
}

pub struct BoundedListCache<T> {
    store: Arc<dyn CacheStore>,
    capacity: usize,
    ttl_secs: u64,
    metrics: CacheMetrics,
    _entry: PhantomData<fn() -> T>,
}

impl<T> Clone for BoundedListCache<T> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            capacity: self.capacity,
            ttl_secs: self.ttl_secs,
            metrics: self.metrics,
            _entry: PhantomData,
        }
    }
}

impl<T: Cacheable> BoundedListCache<T> {
    pub fn new(store: Arc<dyn CacheStore>, capacity: usize, ttl_secs: u64) -> Self {
        Self {
            store,
            capacity: capacity.max(1),
            ttl_secs,
            metrics: CacheMetrics::new(),
            _entry: PhantomData,
        }
    }

    /// Maximum number of entries kept per owner (`LIST_LIMIT`)
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    fn key(owner: impl Display) -> String {
        CacheKey::list(T::KIND, owner)
    }

    /// Cached entries for `owner`, newest first, or `None` on a miss.
    pub async fn read(&self, owner: impl Display) -> Option<Vec<T>> {
        let key = Self::key(owner);

        let raw = match self.store.list_range(&key, 0, -1).await {
            Ok(raw) if raw.is_empty() => {
                debug!(key = %key, "List cache miss");
                self.metrics.record_miss(&key);
                return None;
            }
            Ok(raw) => raw,
            Err(e) => {
                warn!(key = %key, error = %e, "List cache read failed, treating as miss");
                self.metrics.record_error(&key, "lrange");
                return None;
            }
        };

        let mut entries = Vec::with_capacity(raw.len().min(self.capacity));
        for item in raw.iter().take(self.capacity) {
            match decode::<T>(item) {
                Ok(entry) => entries.push(entry),
                Err(e) => {
                    warn!(key = %key, error = %e, "Dropping undecodable cached list");
                    self.metrics.record_miss(&key);
                    let _ = self.store.delete(&key).await;
                    return None;
                }
            }
        }

        debug!(key = %key, len = entries.len(), "List cache hit");
        self.metrics.record_hit(&key);
        Some(entries)
    }

    /// Cache the newest `capacity` entries of `source` (which must already be
    /// newest first), unless a list is already cached for `owner`.
    ///
    /// Returns whether the list was written. An existing list is never
    /// replaced, and an empty source writes nothing.
    pub async fn populate(&self, owner: impl Display, source: &[T]) -> bool {
        matches!(self.fill(&Self::key(owner), source).await, Fill::Created)
    }

    async fn fill(&self, key: &str, source: &[T]) -> Fill {
        if source.is_empty() {
            debug!(key = %key, "Skipping list cache population for empty source");
            return Fill::Failed;
        }

        let mut values = Vec::with_capacity(source.len().min(self.capacity));
        for entry in source.iter().take(self.capacity) {
            match encode(entry) {
                Ok(raw) => values.push(raw),
                Err(e) => {
                    warn!(key = %key, error = %e, "List cache serialization failed");
                    self.metrics.record_error(key, "encode");
                    return Fill::Failed;
                }
            }
        }

        match self
            .store
            .list_create(key, &values, add_jitter(self.ttl_secs))
            .await
        {
            Ok(true) => {
                debug!(key = %key, len = values.len(), "List cache populated");
                self.metrics.record_write(key);
                Fill::Created
            }
            Ok(false) => {
                debug!(key = %key, "List cache already populated, keeping it");
                Fill::Exists
            }
            Err(e) => {
                warn!(key = %key, error = %e, "List cache population failed");
                self.metrics.record_error(key, "populate");
                Fill::Failed
            }
        }
    }

    async fn push(&self, key: &str, raw: &str) -> Option<usize> {
        match self.store.list_push_front(key, raw).await {
            Ok(len) => Some(len),
            Err(e) => {
                warn!(key = %key, error = %e, "List cache push failed");
                self.metrics.record_error(key, "lpushx");
                None
            }
        }
    }

    /// Write-through append of a single new entry.
    ///
    /// A cached list gets the entry prepended and is trimmed back to
    /// `capacity`. A cold list is loaded in bulk from `load_source`, which is
    /// only awaited in that case and must reflect the entry already. If
    /// another writer creates the list in the meantime the entry is pushed
    /// onto theirs.
    pub async fn append<E, F, Fut>(
        &self,
        owner: impl Display,
        entry: &T,
        load_source: F,
    ) -> AppendOutcome
    where
        E: Display,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Vec<T>, E>>,
    {
        let key = Self::key(&owner);

        let raw = match encode(entry) {
            Ok(raw) => raw,
            Err(e) => {
                warn!(key = %key, error = %e, "List cache serialization failed");
                self.metrics.record_error(&key, "encode");
                return AppendOutcome::Skipped;
            }
        };

        let Some(mut len) = self.push(&key, &raw).await else {
            return AppendOutcome::Skipped;
        };

        if len == 0 {
            let source = match load_source().await {
                Ok(source) => source,
                Err(e) => {
                    warn!(key = %key, error = %e, "Cold list cache left empty, source load failed");
                    return AppendOutcome::Skipped;
                }
            };
            match self.fill(&key, &source).await {
                Fill::Created => return AppendOutcome::Populated,
                Fill::Failed => return AppendOutcome::Skipped,
                // Someone cached the list after our push missed; it may
                // predate our entry, so push onto it.
                Fill::Exists => match self.push(&key, &raw).await {
                    Some(0) | None => return AppendOutcome::Skipped,
                    Some(pushed) => len = pushed,
                },
            }
        }

        if len > self.capacity {
            if let Err(e) = self
                .store
                .list_trim(&key, 0, self.capacity as isize - 1)
                .await
            {
                warn!(key = %key, error = %e, "List cache trim failed");
                self.metrics.record_error(&key, "ltrim");
            }
        }
        if let Err(e) = self.store.expire(&key, add_jitter(self.ttl_secs)).await {
            warn!(key = %key, error = %e, "List cache TTL refresh failed");
            self.metrics.record_error(&key, "expire");
        }

        self.metrics.record_write(&key);
        AppendOutcome::Pushed
    }

    /// Drop the cached list for `owner`.
    pub async fn invalidate(&self, owner: impl Display) -> bool {
        let key = Self::key(owner);
        match self.store.delete(&key).await {
            Ok(()) => {
                self.metrics.record_invalidation(&key);
                true
            }
            Err(e) => {
                warn!(key = %key, error = %e, "List cache invalidation failed");
                self.metrics.record_error(&key, "invalidate");
                false
            }
        }
    }
}

//! In-process [`CacheStore`] with Redis list semantics.
//!
//! Used by tests and by local runs without a Redis instance. The
//! availability switch simulates an outage: while it is off every command
//! fails with [`CacheError::Unavailable`].

use crate::{CacheError, CacheResult, CacheStore};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
enum Value {
    Str(String),
    List(VecDeque<String>),
}

#[derive(Debug, Clone)]
struct Entry {
    value: Value,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.map(|at| at <= now).unwrap_or(false)
    }
}

#[derive(Default)]
pub struct MemoryCacheStore {
    entries: Mutex<HashMap<String, Entry>>,
    unavailable: AtomicBool,
    commands: AtomicUsize,
}

impl MemoryCacheStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Toggle simulated outage.
    pub fn set_available(&self, available: bool) {
        self.unavailable.store(!available, Ordering::SeqCst);
    }

    /// Number of commands served (failed ones included).
    pub fn command_count(&self) -> usize {
        self.commands.load(Ordering::SeqCst)
    }

    /// Live keys, sorted.
    pub fn keys(&self) -> Vec<String> {
        let now = Instant::now();
        let Ok(entries) = self.entries.lock() else {
            return Vec::new();
        };
        let mut keys: Vec<String> = entries
            .iter()
            .filter(|(_, entry)| !entry.is_expired(now))
            .map(|(key, _)| key.clone())
            .collect();
        keys.sort();
        keys
    }

    /// Remaining TTL of a key, if it has one.
    pub fn ttl(&self, key: &str) -> Option<Duration> {
        let entries = self.entries.lock().ok()?;
        let at = entries.get(key)?.expires_at?;
        Some(at.saturating_duration_since(Instant::now()))
    }

    pub fn clear(&self) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.clear();
        }
    }

    fn begin(&self) -> CacheResult<MutexGuard<'_, HashMap<String, Entry>>> {
        self.commands.fetch_add(1, Ordering::SeqCst);
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(CacheError::Unavailable);
        }
        let mut entries = self.entries.lock().map_err(|_| CacheError::Unavailable)?;
        let now = Instant::now();
        entries.retain(|_, entry| !entry.is_expired(now));
        Ok(entries)
    }
}

fn expiry(ttl_secs: u64) -> Option<Instant> {
    Some(Instant::now() + Duration::from_secs(ttl_secs))
}

fn wrong_type(key: &str) -> CacheError {
    CacheError::Redis(redis::RedisError::from((
        redis::ErrorKind::TypeError,
        "WRONGTYPE Operation against a key holding the wrong kind of value",
        key.to_string(),
    )))
}

fn counter_value(key: &str, raw: &str) -> CacheResult<u64> {
    raw.parse().map_err(|_| {
        CacheError::Redis(redis::RedisError::from((
            redis::ErrorKind::TypeError,
            "ERR value is not an integer or out of range",
            key.to_string(),
        )))
    })
}

/// Resolve Redis-style inclusive `start..=stop` against `len`.
fn resolve_range(start: isize, stop: isize, len: usize) -> Option<(usize, usize)> {
    let len = len as isize;
    let start = if start < 0 { (len + start).max(0) } else { start };
    let stop = if stop < 0 { len + stop } else { stop.min(len - 1) };
    if len == 0 || start > stop || start >= len {
        return None;
    }
    Some((start as usize, stop as usize))
}

#[async_trait::async_trait]
impl CacheStore for MemoryCacheStore {
    async fn get(&self, key: &str) -> CacheResult<Option<String>> {
        let entries = self.begin()?;
        match entries.get(key).map(|e| &e.value) {
            Some(Value::Str(s)) => Ok(Some(s.clone())),
            Some(Value::List(_)) => Err(wrong_type(key)),
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: &str, ttl_secs: Option<u64>) -> CacheResult<()> {
        let mut entries = self.begin()?;
        entries.insert(
            key.to_string(),
            Entry {
                value: Value::Str(value.to_string()),
                expires_at: ttl_secs.and_then(expiry),
            },
        );
        Ok(())
    }

    async fn exists(&self, key: &str) -> CacheResult<bool> {
        Ok(self.begin()?.contains_key(key))
    }

    async fn delete(&self, key: &str) -> CacheResult<()> {
        self.begin()?.remove(key);
        Ok(())
    }

    async fn incr(&self, key: &str, ttl_secs: u64) -> CacheResult<u64> {
        let mut entries = self.begin()?;
        let current = match entries.get(key).map(|e| &e.value) {
            Some(Value::Str(s)) => counter_value(key, s)?,
            Some(Value::List(_)) => return Err(wrong_type(key)),
            None => 0,
        };
        let next = current + 1;
        entries.insert(
            key.to_string(),
            Entry {
                value: Value::Str(next.to_string()),
                expires_at: expiry(ttl_secs),
            },
        );
        Ok(next)
    }

    async fn set_if_unchanged(
        &self,
        key: &str,
        value: &str,
        ttl_secs: Option<u64>,
        guard_key: &str,
        expected: u64,
    ) -> CacheResult<bool> {
        let mut entries = self.begin()?;
        let current = match entries.get(guard_key).map(|e| &e.value) {
            Some(Value::Str(s)) => counter_value(guard_key, s)?,
            Some(Value::List(_)) => return Err(wrong_type(guard_key)),
            None => 0,
        };
        if current != expected {
            return Ok(false);
        }
        entries.insert(
            key.to_string(),
            Entry {
                value: Value::Str(value.to_string()),
                expires_at: ttl_secs.and_then(expiry),
            },
        );
        Ok(true)
    }

    async fn list_push_front(&self, key: &str, value: &str) -> CacheResult<usize> {
        let mut entries = self.begin()?;
        match entries.get_mut(key).map(|e| &mut e.value) {
            Some(Value::List(list)) => {
                list.push_front(value.to_string());
                Ok(list.len())
            }
            Some(Value::Str(_)) => Err(wrong_type(key)),
            None => Ok(0),
        }
    }

    async fn list_trim(&self, key: &str, start: isize, stop: isize) -> CacheResult<()> {
        let mut entries = self.begin()?;
        let Some(entry) = entries.get_mut(key) else {
            return Ok(());
        };
        let Value::List(list) = &mut entry.value else {
            return Err(wrong_type(key));
        };
        match resolve_range(start, stop, list.len()) {
            Some((from, to)) => {
                let kept: VecDeque<String> = list.drain(from..=to).collect();
                *list = kept;
            }
            None => {
                entries.remove(key);
            }
        }
        Ok(())
    }

    async fn list_range(&self, key: &str, start: isize, stop: isize) -> CacheResult<Vec<String>> {
        let entries = self.begin()?;
        match entries.get(key).map(|e| &e.value) {
            Some(Value::List(list)) => Ok(resolve_range(start, stop, list.len())
                .map(|(from, to)| list.range(from..=to).cloned().collect())
                .unwrap_or_default()),
            Some(Value::Str(_)) => Err(wrong_type(key)),
            None => Ok(Vec::new()),
        }
    }

    async fn list_create(&self, key: &str, values: &[String], ttl_secs: u64) -> CacheResult<bool> {
        let mut entries = self.begin()?;
        if values.is_empty() || entries.contains_key(key) {
            return Ok(false);
        }
        entries.insert(
            key.to_string(),
            Entry {
                value: Value::List(values.iter().cloned().collect()),
                expires_at: expiry(ttl_secs),
            },
        );
        Ok(true)
    }

    async fn expire(&self, key: &str, ttl_secs: u64) -> CacheResult<()> {
        let mut entries = self.begin()?;
        if let Some(entry) = entries.get_mut(key) {
            entry.expires_at = expiry(ttl_secs);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::{assert_err, assert_ok};

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_push_front_requires_existing_list() {
        let store = MemoryCacheStore::new();
        assert_eq!(store.list_push_front("l", "a").await.unwrap(), 0);
        assert!(!store.exists("l").await.unwrap());

        assert!(store.list_create("l", &strings(&["b"]), 60).await.unwrap());
        assert_eq!(store.list_push_front("l", "a").await.unwrap(), 2);
        assert_eq!(store.list_range("l", 0, -1).await.unwrap(), strings(&["a", "b"]));
    }

    #[tokio::test]
    async fn test_trim_and_range_follow_redis_indices() {
        let store = MemoryCacheStore::new();
        store
            .list_create("l", &strings(&["a", "b", "c", "d"]), 60)
            .await
            .unwrap();
        assert_eq!(store.list_range("l", 1, 2).await.unwrap(), strings(&["b", "c"]));
        assert_eq!(store.list_range("l", -2, -1).await.unwrap(), strings(&["c", "d"]));
        assert!(store.list_range("l", 5, 9).await.unwrap().is_empty());

        store.list_trim("l", 0, 2).await.unwrap();
        assert_eq!(store.list_range("l", 0, -1).await.unwrap(), strings(&["a", "b", "c"]));

        assert_ok!(store.list_trim("l", 3, 1).await);
        assert!(!store.exists("l").await.unwrap());
    }

    #[tokio::test]
    async fn test_create_never_overwrites_existing_list() {
        let store = MemoryCacheStore::new();
        assert!(!store.list_create("l", &[], 60).await.unwrap());
        assert!(store.keys().is_empty());

        assert!(store.list_create("l", &strings(&["a"]), 60).await.unwrap());
        assert!(!store.list_create("l", &strings(&["b", "c"]), 60).await.unwrap());
        assert_eq!(store.list_range("l", 0, -1).await.unwrap(), strings(&["a"]));
    }

    #[tokio::test]
    async fn test_guarded_set_follows_counter() {
        let store = MemoryCacheStore::new();
        assert!(store.set_if_unchanged("k", "v1", None, "g", 0).await.unwrap());
        assert_eq!(store.get("k").await.unwrap(), Some("v1".to_string()));

        assert_eq!(store.incr("g", 60).await.unwrap(), 1);
        assert!(!store.set_if_unchanged("k", "v0", None, "g", 0).await.unwrap());
        assert_eq!(store.get("k").await.unwrap(), Some("v1".to_string()));

        assert!(store.set_if_unchanged("k", "v2", Some(60), "g", 1).await.unwrap());
        assert_eq!(store.get("k").await.unwrap(), Some("v2".to_string()));
        assert_eq!(store.incr("g", 60).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_zero_ttl_expires_immediately() {
        let store = MemoryCacheStore::new();
        store.set("k", "v", Some(0)).await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), None);

        store.set("k", "v", None).await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), Some("v".to_string()));
        assert!(store.ttl("k").is_none());
    }

    #[tokio::test]
    async fn test_outage_fails_every_command() {
        let store = MemoryCacheStore::new();
        store.set("k", "v", None).await.unwrap();
        store.set_available(false);
        assert!(matches!(store.get("k").await, Err(CacheError::Unavailable)));
        assert!(matches!(
            store.list_push_front("l", "a").await,
            Err(CacheError::Unavailable)
        ));
        store.set_available(true);
        assert_eq!(store.get("k").await.unwrap(), Some("v".to_string()));
    }

    #[tokio::test]
    async fn test_type_mismatch_is_reported() {
        let store = MemoryCacheStore::new();
        store.set("k", "v", None).await.unwrap();
        let err = assert_err!(store.list_range("k", 0, -1).await);
        assert!(matches!(err, CacheError::Redis(_)));
        assert_err!(store.list_push_front("k", "v").await);
        assert_err!(store.incr("k", 60).await);
    }
}

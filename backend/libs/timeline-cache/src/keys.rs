//! Cache key schema
//!
//! Key format: v{VERSION}:{family}:...
//! - single objects: v1:obj:{kind}:{id}
//! - bounded lists:  v1:{namespace}:{owner_id}
//! - fill guards:    {object key}:gen

use std::fmt::Display;

/// Cache schema version - increment when changing key formats
pub const CACHE_VERSION: u32 = 1;

const OBJECT_FAMILY: &str = "obj";

/// Cache key builder
pub struct CacheKey;

impl CacheKey {
    /// Single-entity snapshot
    /// Format: v1:obj:{kind}:{id}
    pub fn object(kind: &str, id: impl Display) -> String {
        format!("v{}:{}:{}:{}", CACHE_VERSION, OBJECT_FAMILY, kind, id)
    }

    /// Owner-scoped bounded list
    /// Format: v1:{namespace}:{owner_id}
    pub fn list(namespace: &str, owner_id: impl Display) -> String {
        format!("v{}:{}:{}", CACHE_VERSION, namespace, owner_id)
    }

    /// Invalidation counter guarding fills of `key`
    /// Format: {key}:gen
    pub fn generation(key: &str) -> String {
        format!("{}:gen", key)
    }

    /// Entity label used for metrics: the object kind for object keys,
    /// the namespace for list keys.
    pub fn entity_type(key: &str) -> Option<&str> {
        let mut parts = key.split(':');
        let _version = parts.next()?;
        match parts.next()? {
            OBJECT_FAMILY => parts.next(),
            namespace => Some(namespace),
        }
    }
}

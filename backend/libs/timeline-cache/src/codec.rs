//! Versioned serialization contract for cached values.
//!
//! Every cached value is wrapped in `{"v": <schema_version>, "data": ...}`.
//! A payload written by an older deploy decodes to `SchemaMismatch` and is
//! treated as a miss by the caches.

use crate::{CacheError, CacheResult};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Implemented once per cached entity type.
pub trait Cacheable: Serialize + DeserializeOwned + Send + Sync {
    /// Entity kind, used in keys and metric labels.
    const KIND: &'static str;

    /// Bump whenever the serialized shape changes incompatibly.
    const SCHEMA_VERSION: u32 = 1;
}

#[derive(Serialize)]
struct EnvelopeRef<'a, T> {
    v: u32,
    data: &'a T,
}

#[derive(Deserialize)]
struct Envelope {
    v: u32,
    data: serde_json::Value,
}

pub fn encode<T: Cacheable>(value: &T) -> CacheResult<String> {
    let envelope = EnvelopeRef {
        v: T::SCHEMA_VERSION,
        data: value,
    };
    Ok(serde_json::to_string(&envelope)?)
}

pub fn decode<T: Cacheable>(raw: &str) -> CacheResult<T> {
    let envelope: Envelope = serde_json::from_str(raw)?;
    if envelope.v != T::SCHEMA_VERSION {
        return Err(CacheError::SchemaMismatch {
            kind: T::KIND,
            expected: T::SCHEMA_VERSION,
            found: envelope.v,
        });
    }
    Ok(serde_json::from_value(envelope.data)?)
}

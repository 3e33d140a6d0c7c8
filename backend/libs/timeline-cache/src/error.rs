//! Cache error types

use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CacheError {
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Cache command timed out after {}ms", .0.as_millis())]
    Timeout(Duration),

    #[error("Cached {kind} has schema v{found}, expected v{expected}")]
    SchemaMismatch {
        kind: &'static str,
        expected: u32,
        found: u32,
    },

    #[error("Cache store unavailable")]
    Unavailable,
}

impl From<redis_utils::CommandError> for CacheError {
    fn from(err: redis_utils::CommandError) -> Self {
        match err {
            redis_utils::CommandError::Redis(e) => CacheError::Redis(e),
            redis_utils::CommandError::Elapsed(limit) => CacheError::Timeout(limit),
        }
    }
}

pub type CacheResult<T> = Result<T, CacheError>;

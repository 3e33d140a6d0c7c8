//! Redis implementation of [`CacheStore`].

use crate::{CacheError, CacheResult, CacheStore};
use redis::aio::ConnectionManager;
use redis::Script;
use redis_utils::{with_timeout, RedisPool};
use std::time::Duration;
use tracing::{debug, warn};

/// KEYS[1] list, ARGV[1] ttl, ARGV[2..] values
const CREATE_LIST: &str = r#"
if redis.call('EXISTS', KEYS[1]) == 1 then
    return 0
end
redis.call('RPUSH', KEYS[1], unpack(ARGV, 2))
redis.call('EXPIRE', KEYS[1], ARGV[1])
return 1
"#;

/// KEYS[1] value key, KEYS[2] counter, ARGV[1] value, ARGV[2] expected
/// counter, ARGV[3] ttl (0 = none)
const SET_IF_UNCHANGED: &str = r#"
local current = tonumber(redis.call('GET', KEYS[2]) or '0')
if current ~= tonumber(ARGV[2]) then
    return 0
end
if tonumber(ARGV[3]) > 0 then
    redis.call('SET', KEYS[1], ARGV[1], 'EX', ARGV[3])
else
    redis.call('SET', KEYS[1], ARGV[1])
end
return 1
"#;

/// Cache store backed by Redis.
///
/// Every command is bounded by `command_timeout`; an elapsed command
/// surfaces as [`CacheError::Timeout`] and is handled like any other
/// cache failure by the layers above.
#[derive(Clone)]
pub struct RedisCacheStore {
    conn: ConnectionManager,
    command_timeout: Duration,
}

impl RedisCacheStore {
    pub fn new(conn: ConnectionManager, command_timeout: Duration) -> Self {
        Self {
            conn,
            command_timeout,
        }
    }

    pub fn from_pool(pool: &RedisPool) -> Self {
        Self::new(pool.manager(), pool.command_timeout())
    }

    fn conn(&self) -> ConnectionManager {
        self.conn.clone()
    }

    fn fail(key: &str, command: &str, err: redis_utils::CommandError) -> CacheError {
        warn!(key = %key, command = command, error = %err, "Redis command failed");
        CacheError::from(err)
    }
}

#[async_trait::async_trait]
impl CacheStore for RedisCacheStore {
    async fn get(&self, key: &str) -> CacheResult<Option<String>> {
        let mut conn = self.conn();
        with_timeout(self.command_timeout, async move {
            redis::cmd("GET")
                .arg(key)
                .query_async::<_, Option<String>>(&mut conn)
                .await
        })
        .await
        .map_err(|e| Self::fail(key, "GET", e))
    }

    async fn set(&self, key: &str, value: &str, ttl_secs: Option<u64>) -> CacheResult<()> {
        let mut cmd = redis::cmd("SET");
        cmd.arg(key).arg(value);
        if let Some(ttl) = ttl_secs {
            cmd.arg("EX").arg(ttl);
        }

        let mut conn = self.conn();
        with_timeout(self.command_timeout, async move {
            cmd.query_async::<_, ()>(&mut conn).await
        })
        .await
        .map_err(|e| Self::fail(key, "SET", e))
    }

    async fn exists(&self, key: &str) -> CacheResult<bool> {
        let mut conn = self.conn();
        with_timeout(self.command_timeout, async move {
            redis::cmd("EXISTS")
                .arg(key)
                .query_async::<_, bool>(&mut conn)
                .await
        })
        .await
        .map_err(|e| Self::fail(key, "EXISTS", e))
    }

    async fn delete(&self, key: &str) -> CacheResult<()> {
        let mut conn = self.conn();
        with_timeout(self.command_timeout, async move {
            redis::cmd("DEL").arg(key).query_async::<_, ()>(&mut conn).await
        })
        .await
        .map_err(|e| Self::fail(key, "DEL", e))
    }

    async fn incr(&self, key: &str, ttl_secs: u64) -> CacheResult<u64> {
        let mut pipe = redis::pipe();
        pipe.atomic()
            .cmd("INCR")
            .arg(key)
            .cmd("EXPIRE")
            .arg(key)
            .arg(ttl_secs)
            .ignore();

        let mut conn = self.conn();
        let (value,) = with_timeout(self.command_timeout, async move {
            pipe.query_async::<_, (u64,)>(&mut conn).await
        })
        .await
        .map_err(|e| Self::fail(key, "INCR", e))?;
        Ok(value)
    }

    async fn set_if_unchanged(
        &self,
        key: &str,
        value: &str,
        ttl_secs: Option<u64>,
        guard_key: &str,
        expected: u64,
    ) -> CacheResult<bool> {
        let mut conn = self.conn();
        let written = with_timeout(self.command_timeout, async move {
            Script::new(SET_IF_UNCHANGED)
                .key(key)
                .key(guard_key)
                .arg(value)
                .arg(expected)
                .arg(ttl_secs.unwrap_or(0))
                .invoke_async::<_, i64>(&mut conn)
                .await
        })
        .await
        .map_err(|e| Self::fail(key, "EVALSHA", e))?;
        Ok(written == 1)
    }

    async fn list_push_front(&self, key: &str, value: &str) -> CacheResult<usize> {
        let mut conn = self.conn();
        with_timeout(self.command_timeout, async move {
            redis::cmd("LPUSHX")
                .arg(key)
                .arg(value)
                .query_async::<_, usize>(&mut conn)
                .await
        })
        .await
        .map_err(|e| Self::fail(key, "LPUSHX", e))
    }

    async fn list_trim(&self, key: &str, start: isize, stop: isize) -> CacheResult<()> {
        let mut conn = self.conn();
        with_timeout(self.command_timeout, async move {
            redis::cmd("LTRIM")
                .arg(key)
                .arg(start)
                .arg(stop)
                .query_async::<_, ()>(&mut conn)
                .await
        })
        .await
        .map_err(|e| Self::fail(key, "LTRIM", e))
    }

    async fn list_range(&self, key: &str, start: isize, stop: isize) -> CacheResult<Vec<String>> {
        let mut conn = self.conn();
        with_timeout(self.command_timeout, async move {
            redis::cmd("LRANGE")
                .arg(key)
                .arg(start)
                .arg(stop)
                .query_async::<_, Vec<String>>(&mut conn)
                .await
        })
        .await
        .map_err(|e| Self::fail(key, "LRANGE", e))
    }

    async fn list_create(&self, key: &str, values: &[String], ttl_secs: u64) -> CacheResult<bool> {
        if values.is_empty() {
            return Ok(false);
        }

        let mut conn = self.conn();
        let created = with_timeout(self.command_timeout, async move {
            Script::new(CREATE_LIST)
                .key(key)
                .arg(ttl_secs)
                .arg(values)
                .invoke_async::<_, i64>(&mut conn)
                .await
        })
        .await
        .map_err(|e| Self::fail(key, "EVALSHA", e))?;

        debug!(key = %key, len = values.len(), ttl = ttl_secs, created = created == 1, "List create");
        Ok(created == 1)
    }

    async fn expire(&self, key: &str, ttl_secs: u64) -> CacheResult<()> {
        let mut conn = self.conn();
        with_timeout(self.command_timeout, async move {
            redis::cmd("EXPIRE")
                .arg(key)
                .arg(ttl_secs)
                .query_async::<_, ()>(&mut conn)
                .await
        })
        .await
        .map_err(|e| Self::fail(key, "EXPIRE", e))
    }
}

use anyhow::{Context, Result};
use redis::aio::ConnectionManager;
use redis::{Client, ConnectionInfo, IntoConnectionInfo, RedisError};
use std::fmt;
use std::future::Future;
use tokio::time::{timeout, Duration};
use tracing::info;

/// Default upper bound for a single cache command.
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_millis(250);

/// Connection settings for the cache store.
#[derive(Clone)]
pub struct RedisSettings {
    pub url: String,
    /// Upper bound applied to every command issued through [`with_timeout`].
    pub command_timeout: Duration,
}

impl RedisSettings {
    pub fn new(url: impl Into<String>, command_timeout: Duration) -> Self {
        Self {
            url: url.into(),
            command_timeout,
        }
    }
}

impl fmt::Debug for RedisSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedisSettings")
            .field("url", &redact_url(&self.url))
            .field("command_timeout", &self.command_timeout)
            .finish()
    }
}

/// Explicitly constructed handle to the cache store.
///
/// Opened once at process start and handed to every component that needs it.
/// `ConnectionManager` is multiplexed and reconnects on its own, so callers
/// clone it per command instead of sharing a lock.
#[derive(Clone)]
pub struct RedisPool {
    manager: ConnectionManager,
    command_timeout: Duration,
}

impl RedisPool {
    pub async fn connect(settings: &RedisSettings) -> Result<Self> {
        let info: ConnectionInfo = settings
            .url
            .as_str()
            .into_connection_info()
            .context("failed to parse REDIS_URL connection string")?;

        let client = Client::open(info).context("failed to construct Redis client")?;
        let mut manager = ConnectionManager::new(client)
            .await
            .context("failed to initialize Redis connection manager")?;

        let pong: String = redis::cmd("PING")
            .query_async(&mut manager)
            .await
            .context("Redis PING failed during startup")?;

        info!(
            url = %redact_url(&settings.url),
            reply = %pong,
            "Redis connection established"
        );

        Ok(Self {
            manager,
            command_timeout: settings.command_timeout,
        })
    }

    pub fn manager(&self) -> ConnectionManager {
        self.manager.clone()
    }

    pub fn command_timeout(&self) -> Duration {
        self.command_timeout
    }
}

/// Failure of a time-bounded Redis command.
#[derive(Debug)]
pub enum CommandError {
    Redis(RedisError),
    Elapsed(Duration),
}

impl fmt::Display for CommandError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandError::Redis(e) => write!(f, "redis command failed: {}", e),
            CommandError::Elapsed(limit) => {
                write!(f, "redis command exceeded {}ms", limit.as_millis())
            }
        }
    }
}

impl std::error::Error for CommandError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CommandError::Redis(e) => Some(e),
            CommandError::Elapsed(_) => None,
        }
    }
}

/// Run a Redis command future with an upper bound on latency.
pub async fn with_timeout<F, T>(limit: Duration, fut: F) -> Result<T, CommandError>
where
    F: Future<Output = Result<T, RedisError>>,
{
    match timeout(limit, fut).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => Err(CommandError::Redis(e)),
        Err(_) => Err(CommandError::Elapsed(limit)),
    }
}

/// Mask the password component of a redis URL for logging.
pub fn redact_url(raw: &str) -> String {
    let Some((scheme, rest)) = raw.split_once("://") else {
        return raw.to_string();
    };
    match rest.rsplit_once('@') {
        Some((userinfo, host)) => {
            let user = userinfo.split(':').next().unwrap_or_default();
            if userinfo.contains(':') {
                format!("{}://{}:***@{}", scheme, user, host)
            } else {
                format!("{}://{}@{}", scheme, user, host)
            }
        }
        None => raw.to_string(),
    }
}

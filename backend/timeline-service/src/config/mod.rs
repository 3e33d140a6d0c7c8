use serde::{Deserialize, Serialize};
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub app: AppConfig,
    pub database: DatabaseConfig,
    pub cache: CacheConfig,
    pub timeline: TimelineConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub env: String,
    pub port: u16,
    pub log_level: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub run_migrations: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheBackend {
    Redis,
    /// Process-local store, for development only
    Memory,
}

impl FromStr for CacheBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "redis" => Ok(CacheBackend::Redis),
            "memory" => Ok(CacheBackend::Memory),
            other => Err(format!("unknown cache backend '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    pub backend: CacheBackend,
    pub redis_url: String,
    pub command_timeout_ms: u64,
    /// Safety-net TTL for object snapshots; 0 disables expiry
    pub object_ttl_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimelineConfig {
    /// Max entries kept per cached timeline
    pub list_limit: usize,
    pub list_ttl_secs: u64,
    pub page_size: usize,
    pub max_page_size: usize,
}

impl Default for TimelineConfig {
    fn default() -> Self {
        Self {
            list_limit: 200,
            list_ttl_secs: timeline_cache::ttl::TIMELINE_LIST,
            page_size: 20,
            max_page_size: 50,
        }
    }
}

impl TimelineConfig {
    /// Clamp a requested page size into `1..=max_page_size`
    pub fn page_size_for(&self, requested: Option<usize>) -> usize {
        requested
            .unwrap_or(self.page_size)
            .clamp(1, self.max_page_size.max(1))
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("invalid value for {key}: '{value}' ({reason})")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from an arbitrary variable source
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = TimelineConfig::default();

        let timeline = TimelineConfig {
            list_limit: parse_or(&lookup, "TIMELINE_LIST_LIMIT", defaults.list_limit)?,
            list_ttl_secs: parse_or(&lookup, "TIMELINE_LIST_TTL_SECS", defaults.list_ttl_secs)?,
            page_size: parse_or(&lookup, "TIMELINE_PAGE_SIZE", defaults.page_size)?,
            max_page_size: parse_or(&lookup, "TIMELINE_MAX_PAGE_SIZE", defaults.max_page_size)?,
        };
        if timeline.list_limit == 0 {
            return Err(invalid("TIMELINE_LIST_LIMIT", "0", "must be positive"));
        }
        if timeline.page_size == 0 || timeline.page_size > timeline.max_page_size {
            return Err(invalid(
                "TIMELINE_PAGE_SIZE",
                &timeline.page_size.to_string(),
                "must be between 1 and TIMELINE_MAX_PAGE_SIZE",
            ));
        }

        Ok(Config {
            app: AppConfig {
                env: lookup("APP_ENV").unwrap_or_else(|| "development".to_string()),
                port: parse_or(&lookup, "APP_PORT", 8000)?,
                log_level: lookup("LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
            },
            database: DatabaseConfig {
                url: lookup("DATABASE_URL").ok_or(ConfigError::Missing("DATABASE_URL"))?,
                max_connections: parse_or(&lookup, "DATABASE_MAX_CONNECTIONS", 10)?,
                run_migrations: parse_or(&lookup, "DATABASE_RUN_MIGRATIONS", true)?,
            },
            cache: CacheConfig {
                backend: parse_or(&lookup, "CACHE_BACKEND", CacheBackend::Redis)?,
                redis_url: lookup("REDIS_URL")
                    .unwrap_or_else(|| "redis://127.0.0.1:6379".to_string()),
                command_timeout_ms: parse_or(&lookup, "REDIS_COMMAND_TIMEOUT_MS", 250)?,
                object_ttl_secs: parse_or(
                    &lookup,
                    "OBJECT_CACHE_TTL_SECS",
                    timeline_cache::ttl::OBJECT,
                )?,
            },
            timeline,
        })
    }
}

fn parse_or<F, T>(lookup: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e: T::Err| invalid(key, &raw, &e.to_string())),
        None => Ok(default),
    }
}

fn invalid(key: &'static str, value: &str, reason: &str) -> ConfigError {
    ConfigError::Invalid {
        key,
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

//! Application configuration from the environment

use crate::cache::CacheConfig;
use crate::db::SurrealConfig;
use crate::error::{Result, StoreError};
use crate::storage::FileStorage;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Everything needed to wire the data layer
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub surreal: SurrealConfig,
    pub cache: CacheConfig,
    /// Favorites file; `None` keeps favorites in memory only
    pub storage_path: Option<PathBuf>,
}

impl AppConfig {
    /// Load `.env` if present, then read the process environment
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build the configuration from `lookup`
    ///
    /// Unset variables take their defaults. Set but unparsable numbers
    /// are a `ConfigError`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = SurrealConfig::default();
        let surreal = SurrealConfig {
            url: lookup("SURREALDB_URL").unwrap_or(defaults.url),
            namespace: lookup("SURREALDB_NS").unwrap_or(defaults.namespace),
            database: lookup("SURREALDB_DB").unwrap_or(defaults.database),
            username: lookup("SURREALDB_USER"),
            password: lookup("SURREALDB_PASS"),
            timeout: parse::<u64>(&lookup, "SURREALDB_TIMEOUT_SECS")?
                .map(Duration::from_secs)
                .unwrap_or(defaults.timeout),
        };

        let mut cache = CacheConfig::builder();
        if let Some(ms) = parse::<u64>(&lookup, "CACHE_TTL_MS")? {
            cache = cache.default_ttl(Duration::from_millis(ms));
        }
        if let Some(ms) = parse::<u64>(&lookup, "CACHE_SEARCH_TTL_MS")? {
            cache = cache.search_ttl(Duration::from_millis(ms));
        }
        if let Some(ms) = parse::<u64>(&lookup, "CACHE_SWR_MS")? {
            cache = cache.swr_window(Duration::from_millis(ms));
        }
        let cache = cache.build();
        cache.validate().map_err(StoreError::ConfigError)?;

        let storage_path = lookup("STORAGE_PATH")
            .map(PathBuf::from)
            .or_else(FileStorage::default_location);

        Ok(Self {
            surreal,
            cache,
            storage_path,
        })
    }
}

fn parse<T>(lookup: &impl Fn(&str) -> Option<String>, name: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(name) {
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| StoreError::ConfigError(format!("{}={}: {}", name, raw, e))),
        None => Ok(None),
    }
}

//! Cache timings

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for the data cache
///
/// Entity and table reads default to a 60 second TTL, fulltext search
/// results to 10 seconds. The SWR window is off unless configured.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CacheConfig {
    /// TTL for table, record and query reads
    pub default_ttl: Duration,

    /// TTL for fulltext search results
    pub search_ttl: Duration,

    /// Grace period after expiry during which a stale value is served
    /// while a background refresh runs. Zero disables SWR.
    pub swr_window: Duration,

    /// TTL jitter factor (0.0 - 1.0), spreads expiry of entries
    /// written together
    pub ttl_jitter: f64,

    /// Enable the periodic sweep of expired entries
    pub enable_auto_cleanup: bool,

    /// Interval for the periodic sweep
    pub cleanup_interval: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            default_ttl: Duration::from_secs(60),
            search_ttl: Duration::from_secs(10),
            swr_window: Duration::ZERO,
            ttl_jitter: 0.0,
            enable_auto_cleanup: true,
            cleanup_interval: Duration::from_secs(300),
        }
    }
}

impl CacheConfig {
    pub fn builder() -> CacheConfigBuilder {
        CacheConfigBuilder::default()
    }

    /// Reject zero TTLs, a zero sweep interval while sweeping is on, and
    /// jitter outside 0.0..=1.0
    pub fn validate(&self) -> Result<(), String> {
        if self.default_ttl.is_zero() {
            return Err("default_ttl must be greater than 0".to_string());
        }

        if self.search_ttl.is_zero() {
            return Err("search_ttl must be greater than 0".to_string());
        }

        if !(0.0..=1.0).contains(&self.ttl_jitter) {
            return Err(format!("ttl_jitter {} is outside 0.0..=1.0", self.ttl_jitter));
        }

        if self.enable_auto_cleanup && self.cleanup_interval.is_zero() {
            return Err("cleanup_interval must be greater than 0".to_string());
        }

        Ok(())
    }

    /// `ttl` moved by a random amount of at most `ttl_jitter * ttl` in
    /// either direction, never below one millisecond
    ///
    /// A non-finite jitter is treated as zero.
    pub fn ttl_with_jitter(&self, ttl: Duration) -> Duration {
        if !self.ttl_jitter.is_finite() || self.ttl_jitter <= 0.0 || ttl.is_zero() {
            return ttl;
        }

        let spread = ttl.as_secs_f64() * self.ttl_jitter;
        let offset = rand::thread_rng().gen_range(-spread..=spread);
        Duration::from_secs_f64((ttl.as_secs_f64() + offset).max(0.001))
    }
}

/// Builder starting from [`CacheConfig::default`]
#[derive(Debug, Default)]
pub struct CacheConfigBuilder {
    config: CacheConfig,
}

impl CacheConfigBuilder {
    pub fn default_ttl(mut self, ttl: Duration) -> Self {
        self.config.default_ttl = ttl;
        self
    }

    pub fn search_ttl(mut self, ttl: Duration) -> Self {
        self.config.search_ttl = ttl;
        self
    }

    /// Zero turns stale-while-revalidate off
    pub fn swr_window(mut self, window: Duration) -> Self {
        self.config.swr_window = window;
        self
    }

    /// Fraction of the TTL, 0.0 to 1.0
    pub fn ttl_jitter(mut self, jitter: f64) -> Self {
        self.config.ttl_jitter = jitter;
        self
    }

    pub fn enable_auto_cleanup(mut self, enable: bool) -> Self {
        self.config.enable_auto_cleanup = enable;
        self
    }

    pub fn cleanup_interval(mut self, interval: Duration) -> Self {
        self.config.cleanup_interval = interval;
        self
    }

    pub fn build(self) -> CacheConfig {
        self.config
    }
}

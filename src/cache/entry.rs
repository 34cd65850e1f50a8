//! Cache entry management with TTL support

use chrono::{DateTime, Utc};
use std::time::Duration;
use tokio::time::Instant;

/// A cached value with its expiry deadline
///
/// Deadlines use the tokio clock so they follow `tokio::time::pause` and
/// `advance` in tests.
#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
    /// The cached value
    pub value: V,

    /// Instant after which the entry is no longer fresh
    pub expires_at: Instant,

    /// Wall-clock time the value was stored
    pub created_at: DateTime<Utc>,
}

impl<V> CacheEntry<V> {
    /// Create a new entry that stays fresh for `ttl`
    pub fn new(value: V, ttl: Duration) -> Self {
        Self::with_expiration(value, Instant::now() + ttl)
    }

    /// Create a new entry with a fixed deadline
    pub fn with_expiration(value: V, expires_at: Instant) -> Self {
        Self {
            value,
            expires_at,
            created_at: Utc::now(),
        }
    }

    /// Fresh means strictly before the deadline
    pub fn is_fresh(&self, now: Instant) -> bool {
        self.expires_at > now
    }

    /// Check if the entry has expired
    pub fn is_expired(&self) -> bool {
        !self.is_fresh(Instant::now())
    }

    /// Expired, but still inside the stale-while-revalidate window
    pub fn is_within_grace(&self, now: Instant, swr: Duration) -> bool {
        !swr.is_zero() && !self.is_fresh(now) && now < self.expires_at + swr
    }

    /// Past the deadline and past any grace window
    pub fn is_past_grace(&self, now: Instant, swr: Duration) -> bool {
        now >= self.expires_at + swr
    }

    /// Get time until expiration
    pub fn time_until_expiration(&self) -> Option<Duration> {
        let now = Instant::now();
        if self.is_fresh(now) {
            Some(self.expires_at - now)
        } else {
            None
        }
    }
}

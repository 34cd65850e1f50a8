//! Cached value type and counters

use serde::{Deserialize, Serialize};
use std::fmt;

/// Default cached payload: a JSON document or result set from the database
pub type CacheValue = serde_json::Value;

/// Statistics for cache behaviour monitoring
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct CacheStats {
    /// Reads answered from a fresh entry
    pub hits: u64,

    /// Reads that found no usable entry
    pub misses: u64,

    /// Reads answered with a stale value inside the SWR window
    pub stale_hits: u64,

    /// Callers that joined a fetch already in flight
    pub coalesced: u64,

    /// Underlying fetches started (cold and background)
    pub fetches: u64,

    /// Underlying fetches that failed
    pub fetch_failures: u64,

    /// Stored entries at the time of the snapshot
    pub entries: usize,

    /// Entries dropped because their TTL ran out
    pub evictions_ttl: u64,

    /// Entries dropped by explicit invalidation or clear
    pub invalidations: u64,
}

impl CacheStats {
    /// Percentage of reads answered from the store, stale or fresh
    pub fn hit_rate(&self) -> f64 {
        let served = self.hits + self.stale_hits;
        let total = served + self.misses;
        if total == 0 {
            0.0
        } else {
            (served as f64 / total as f64) * 100.0
        }
    }

    /// Percentage of reads that had to wait for a fetch
    pub fn miss_rate(&self) -> f64 {
        100.0 - self.hit_rate()
    }

    /// Fetches saved by coalescing onto an in-flight request
    pub fn deduplication_rate(&self) -> f64 {
        let total = self.fetches + self.coalesced;
        if total == 0 {
            0.0
        } else {
            (self.coalesced as f64 / total as f64) * 100.0
        }
    }
}

impl fmt::Display for CacheStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "CacheStats {{ hits: {}, stale_hits: {}, misses: {}, hit_rate: {:.2}%, entries: {}, fetches: {}, coalesced: {} }}",
            self.hits,
            self.stale_hits,
            self.misses,
            self.hit_rate(),
            self.entries,
            self.fetches,
            self.coalesced
        )
    }
}

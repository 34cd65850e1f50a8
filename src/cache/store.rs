//! Cache store: fresh values with per-key TTL plus the in-flight table

use crate::cache::{
    config::CacheConfig,
    entry::CacheEntry,
    invalidation::{InvalidationEvent, InvalidationReason, WriteInvalidation},
    keys::CacheKey,
    types::{CacheStats, CacheValue},
};
use crate::error::StoreError;
use futures::future::{BoxFuture, Shared};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info};

/// A fetch shared by every caller of one key
pub(crate) type SharedFetch<V, E> = Shared<BoxFuture<'static, Result<V, E>>>;

/// Pending fetch registered for a key
pub(crate) struct InFlight<V, E> {
    /// Registration id; a settling fetch only touches the table if its
    /// registration is still the current one
    pub(crate) id: u64,
    pub(crate) future: SharedFetch<V, E>,
}

/// Internal cache storage
pub(crate) struct CacheState<V, E> {
    /// Main storage: key -> entry
    pub(crate) entries: HashMap<CacheKey, CacheEntry<V>>,

    /// At most one pending fetch per key
    pub(crate) in_flight: HashMap<CacheKey, InFlight<V, E>>,

    pub(crate) stats: CacheStats,

    pub(crate) next_flight_id: u64,
}

impl<V, E> CacheState<V, E> {
    fn new() -> Self {
        Self {
            entries: HashMap::new(),
            in_flight: HashMap::new(),
            stats: CacheStats::default(),
            next_flight_id: 0,
        }
    }

    /// Remove every entry and in-flight marker whose key matches, returning
    /// the removed entry keys
    fn remove_where(&mut self, matches: impl Fn(&CacheKey) -> bool) -> Vec<String> {
        let keys: Vec<CacheKey> = self
            .entries
            .keys()
            .filter(|k| matches(k))
            .cloned()
            .collect();

        for key in &keys {
            self.entries.remove(key);
        }
        self.in_flight.retain(|k, _| !matches(k));
        self.stats.invalidations += keys.len() as u64;

        keys.into_iter().map(|k| k.to_string()).collect()
    }
}

/// TTL cache with single-flight fetching and stale-while-revalidate
///
/// This is an explicitly constructed handle: clones share the same
/// storage, separate `new` calls are fully isolated. All state sits behind
/// one `RwLock` and no operation awaits while holding it, so each
/// operation is atomic with respect to the others.
///
/// `V` is the cached value type, `E` the error type produced by fetchers;
/// both must be `Clone` so one fetch can be handed to many callers.
pub struct DataCache<V = CacheValue, E = StoreError> {
    pub(crate) config: Arc<CacheConfig>,
    pub(crate) state: Arc<RwLock<CacheState<V, E>>>,
}

impl<V, E> Clone for DataCache<V, E> {
    fn clone(&self) -> Self {
        Self {
            config: Arc::clone(&self.config),
            state: Arc::clone(&self.state),
        }
    }
}

impl<V, E> fmt::Debug for DataCache<V, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataCache")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl<V, E> Default for DataCache<V, E>
where
    V: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new(CacheConfig::default())
    }
}

impl<V, E> DataCache<V, E>
where
    V: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    /// Create a new, empty cache
    pub fn new(config: CacheConfig) -> Self {
        debug!("Initializing data cache with config: {:?}", config);

        Self {
            config: Arc::new(config),
            state: Arc::new(RwLock::new(CacheState::new())),
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Get a fresh value
    ///
    /// An expired entry is removed on read and reported as absent.
    pub async fn get(&self, key: &CacheKey) -> Option<V> {
        let now = Instant::now();
        let mut state = self.state.write().await;

        let fresh = state.entries.get(key).map(|entry| entry.is_fresh(now));
        match fresh {
            Some(true) => {
                state.stats.hits += 1;
                debug!("Cache hit: {}", key);
                state.entries.get(key).map(|entry| entry.value.clone())
            }
            Some(false) => {
                state.entries.remove(key);
                state.stats.evictions_ttl += 1;
                state.stats.misses += 1;
                debug!("Cache entry expired: {}", key);
                None
            }
            None => {
                state.stats.misses += 1;
                debug!("Cache miss: {}", key);
                None
            }
        }
    }

    /// Store a value fresh for `ttl`, replacing any previous entry
    pub async fn set(&self, key: CacheKey, value: V, ttl: Duration) {
        let ttl = self.config.ttl_with_jitter(ttl);
        let mut state = self.state.write().await;

        debug!("Storing cache entry: {} (ttl {:?})", key, ttl);
        state.entries.insert(key, CacheEntry::new(value, ttl));
    }

    /// Remove one key from the store and the in-flight table
    ///
    /// The event lists the key when a stored entry was removed.
    pub async fn invalidate(&self, key: &CacheKey) -> InvalidationEvent {
        let mut state = self.state.write().await;

        let removed = state.remove_where(|k| k == key);
        if !removed.is_empty() {
            debug!("Invalidated cache entry: {}", key);
        }
        InvalidationEvent::new(InvalidationReason::Manual, removed)
    }

    /// Remove every key starting with `prefix` from the store and the
    /// in-flight table
    pub async fn invalidate_prefix(&self, prefix: &str) -> InvalidationEvent {
        let mut state = self.state.write().await;

        let removed = state.remove_where(|key| key.starts_with(prefix));
        debug!("Invalidated {} entries with prefix: {}", removed.len(), prefix);
        InvalidationEvent::new(
            InvalidationReason::PrefixMatch {
                prefix: prefix.to_string(),
            },
            removed,
        )
    }

    /// Apply the write policy: drop the record key, the table key and the
    /// whole query namespace in one step
    pub async fn invalidate_write(&self, write: &WriteInvalidation) -> InvalidationEvent {
        let exact = write.keys();
        let prefix = write.prefix();

        let mut state = self.state.write().await;
        let removed =
            state.remove_where(|key| key.starts_with(prefix) || exact.iter().any(|k| k == key));

        debug!(
            "Write to {} invalidated {} entries",
            write.table,
            removed.len()
        );
        InvalidationEvent::new(write.reason(), removed)
    }

    /// Empty the store and the in-flight table
    ///
    /// Returns the number of stored entries removed.
    pub async fn clear(&self) -> usize {
        let mut state = self.state.write().await;

        let count = state.entries.len();
        state.entries.clear();
        state.in_flight.clear();
        state.stats.invalidations += count as u64;

        info!("Cleared {} entries from cache", count);
        count
    }

    /// Empty the cache because the session changed
    pub async fn clear_for_session(&self) -> InvalidationEvent {
        let mut state = self.state.write().await;

        let keys: Vec<String> = state.entries.keys().map(|k| k.to_string()).collect();
        state.entries.clear();
        state.in_flight.clear();
        state.stats.invalidations += keys.len() as u64;

        info!("Session changed, cleared {} entries from cache", keys.len());
        InvalidationEvent::new(InvalidationReason::SessionChanged, keys)
    }

    /// Remove entries that are past their TTL and past the configured
    /// SWR window
    pub async fn cleanup_expired(&self) -> Vec<InvalidationEvent> {
        let now = Instant::now();
        let swr = self.config.swr_window;
        let mut state = self.state.write().await;

        let expired_keys: Vec<CacheKey> = state
            .entries
            .iter()
            .filter(|(_, entry)| entry.is_past_grace(now, swr))
            .map(|(key, _)| key.clone())
            .collect();

        if expired_keys.is_empty() {
            return Vec::new();
        }

        for key in &expired_keys {
            state.entries.remove(key);
        }
        state.stats.evictions_ttl += expired_keys.len() as u64;

        debug!("Cleaned up {} expired entries", expired_keys.len());
        let count = expired_keys.len();
        vec![InvalidationEvent::new(
            InvalidationReason::Expired,
            expired_keys.into_iter().map(|k| k.to_string()).collect(),
        )
        .with_context(format!("Cleaned up {} expired entries", count))]
    }

    /// Start the periodic sweep if enabled in the configuration
    pub fn spawn_cleanup(&self) -> Option<JoinHandle<()>> {
        if !self.config.enable_auto_cleanup {
            return None;
        }
        Some(tokio::spawn(start_auto_cleanup(self.clone())))
    }

    /// Get cache statistics
    pub async fn stats(&self) -> CacheStats {
        let state = self.state.read().await;
        let mut stats = state.stats.clone();
        stats.entries = state.entries.len();
        stats
    }

    /// Number of stored entries, expired ones included until swept
    pub async fn len(&self) -> usize {
        self.state.read().await.entries.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.state.read().await.entries.is_empty()
    }

    /// Check if a key is stored (without expiry check or stats update)
    pub async fn contains_key(&self, key: &CacheKey) -> bool {
        self.state.read().await.entries.contains_key(key)
    }

    /// Check if a fetch for `key` is pending
    pub async fn is_in_flight(&self, key: &CacheKey) -> bool {
        self.state.read().await.in_flight.contains_key(key)
    }
}

/// Background task for automatic cache cleanup
pub async fn start_auto_cleanup<V, E>(cache: DataCache<V, E>)
where
    V: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    let interval = cache.config.cleanup_interval;

    info!("Starting automatic cache cleanup task (interval: {:?})", interval);

    loop {
        tokio::time::sleep(interval).await;

        let events = cache.cleanup_expired().await;
        if !events.is_empty() {
            debug!("Auto cleanup: {} events", events.len());
        }
    }
}

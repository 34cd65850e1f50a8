//! Coalescing fetch-through reads
//!
//! `get_or_fetch` answers from a fresh entry, falls back to a stale entry
//! inside the SWR window while refreshing in the background, joins a fetch
//! already in flight for the same key, and only then starts a new fetch.

use crate::cache::{
    entry::CacheEntry,
    keys::CacheKey,
    store::{CacheState, DataCache, InFlight, SharedFetch},
};
use futures::FutureExt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, warn};

impl<V, E> DataCache<V, E>
where
    V: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    /// Read `key` through the cache, calling `fetcher` at most once per key
    /// no matter how many callers ask concurrently
    ///
    /// * fresh entry: returned without fetching
    /// * expired entry and `now < expires_at + swr`: the stale value is
    ///   returned immediately and a background refresh is started unless
    ///   one is already running; refresh errors are logged and dropped
    /// * fetch in flight: its outcome is awaited and shared
    /// * otherwise: `fetcher` runs, a success is stored for `ttl`, and the
    ///   outcome (value or the unchanged error) goes to every waiter
    ///
    /// Fetches run to completion on a driver task even if every caller
    /// drops its future.
    pub async fn get_or_fetch<F, Fut>(
        &self,
        key: &CacheKey,
        fetcher: F,
        ttl: Duration,
        swr: Duration,
    ) -> Result<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>> + Send + 'static,
    {
        let now = Instant::now();
        let mut state = self.state.write().await;

        let cached = state
            .entries
            .get(key)
            .map(|entry| (entry.is_fresh(now), entry.is_within_grace(now, swr)));

        match cached {
            Some((true, _)) => {
                state.stats.hits += 1;
                debug!("Cache hit: {}", key);
                if let Some(entry) = state.entries.get(key) {
                    return Ok(entry.value.clone());
                }
            }
            Some((false, true)) => {
                let stale = state.entries.get(key).map(|entry| entry.value.clone());
                if let Some(stale) = stale {
                    state.stats.stale_hits += 1;

                    if !state.in_flight.contains_key(key) {
                        debug!("Serving stale entry, refreshing in background: {}", key);
                        let refresh = self.register_fetch(&mut state, key, fetcher, ttl);
                        drop(state);
                        tokio::spawn(refresh.map(|_| ()));
                    } else {
                        debug!("Serving stale entry, refresh already running: {}", key);
                    }

                    return Ok(stale);
                }
            }
            Some((false, false)) => {
                state.entries.remove(key);
                state.stats.evictions_ttl += 1;
                debug!("Cache entry expired: {}", key);
            }
            None => {}
        }

        if let Some(flight) = state.in_flight.get(key) {
            let pending = flight.future.clone();
            state.stats.coalesced += 1;
            drop(state);

            debug!("Joining in-flight fetch: {}", key);
            return pending.await;
        }

        state.stats.misses += 1;
        debug!("Cache miss, fetching: {}", key);
        let pending = self.register_fetch(&mut state, key, fetcher, ttl);
        drop(state);

        tokio::spawn(pending.clone().map(|_| ()));
        pending.await
    }

    /// Start `fetcher` and record it as the in-flight fetch for `key`
    ///
    /// On settle the fetch clears its own marker and, on success, stores the
    /// value. Both happen only while its registration is still current: an
    /// invalidation in between makes the outcome reach the waiters without
    /// being cached.
    fn register_fetch<F, Fut>(
        &self,
        state: &mut CacheState<V, E>,
        key: &CacheKey,
        fetcher: F,
        ttl: Duration,
    ) -> SharedFetch<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>> + Send + 'static,
    {
        let id = state.next_flight_id;
        state.next_flight_id += 1;
        state.stats.fetches += 1;

        let fetch = fetcher();
        let shared_state = Arc::clone(&self.state);
        let settle_key = key.clone();
        let ttl = self.config.ttl_with_jitter(ttl);

        let future = async move {
            let outcome = fetch.await;

            let mut state = shared_state.write().await;
            let current = state
                .in_flight
                .get(&settle_key)
                .is_some_and(|flight| flight.id == id);

            if current {
                state.in_flight.remove(&settle_key);
            }

            match &outcome {
                Ok(value) if current => {
                    state
                        .entries
                        .insert(settle_key.clone(), CacheEntry::new(value.clone(), ttl));
                    debug!("Fetch stored: {}", settle_key);
                }
                Ok(_) => {
                    debug!("Fetch finished after invalidation, not stored: {}", settle_key);
                }
                Err(_) => {
                    state.stats.fetch_failures += 1;
                    warn!("Fetch failed: {}", settle_key);
                }
            }

            outcome
        }
        .boxed()
        .shared();

        state.in_flight.insert(
            key.clone(),
            InFlight {
                id,
                future: future.clone(),
            },
        );

        future
    }
}

#[cfg(test)]
mod tests {
    use crate::cache::{CacheConfig, CacheKey, DataCache};
    use crate::error::StoreError;
    use serde_json::{json, Value};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::sync::oneshot;

    const TTL: Duration = Duration::from_secs(60);

    fn cache() -> DataCache<Value, StoreError> {
        DataCache::new(CacheConfig::default())
    }

    async fn settle(cache: &DataCache<Value, StoreError>, key: &CacheKey) {
        while cache.is_in_flight(key).await {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test]
    async fn test_cold_fetch_stores_value() {
        let cache = cache();
        let key = CacheKey::table("event");

        let value = cache
            .get_or_fetch(&key, || async { Ok(json!(["e1"])) }, TTL, Duration::ZERO)
            .await
            .unwrap();

        assert_eq!(value, json!(["e1"]));
        assert_eq!(cache.get(&key).await, Some(json!(["e1"])));
        assert!(!cache.is_in_flight(&key).await);
    }

    #[tokio::test]
    async fn test_fresh_hit_skips_fetcher() {
        let cache = cache();
        let key = CacheKey::table("event");
        cache.set(key.clone(), json!("cached"), TTL).await;
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();

        let value = cache
            .get_or_fetch(
                &key,
                move || async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Ok(json!("fetched"))
                },
                TTL,
                Duration::ZERO,
            )
            .await
            .unwrap();

        assert_eq!(value, json!("cached"));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_failure_is_not_cached() {
        let cache = cache();
        let key = CacheKey::table("event");

        let err = cache
            .get_or_fetch(
                &key,
                || async { Err(StoreError::ConnectionError("down".into())) },
                TTL,
                Duration::ZERO,
            )
            .await
            .unwrap_err();

        assert_eq!(err, StoreError::ConnectionError("down".into()));
        assert!(!cache.contains_key(&key).await);
        assert!(!cache.is_in_flight(&key).await);

        let value = cache
            .get_or_fetch(&key, || async { Ok(json!(1)) }, TTL, Duration::ZERO)
            .await
            .unwrap();
        assert_eq!(value, json!(1));
        assert_eq!(cache.stats().await.fetch_failures, 1);
    }

    #[tokio::test]
    async fn test_waiters_share_one_fetch() {
        let cache = cache();
        let key = CacheKey::table("location");
        let calls = Arc::new(AtomicUsize::new(0));
        let (release, gate) = oneshot::channel::<()>();

        let first = {
            let cache = cache.clone();
            let key = key.clone();
            let calls = calls.clone();
            tokio::spawn(async move {
                cache
                    .get_or_fetch(
                        &key,
                        move || async move {
                            calls.fetch_add(1, Ordering::SeqCst);
                            let _ = gate.await;
                            Ok(json!("loaded"))
                        },
                        TTL,
                        Duration::ZERO,
                    )
                    .await
            })
        };

        while !cache.is_in_flight(&key).await {
            tokio::task::yield_now().await;
        }

        let second = {
            let cache = cache.clone();
            let key = key.clone();
            let calls = calls.clone();
            tokio::spawn(async move {
                cache
                    .get_or_fetch(
                        &key,
                        move || async move {
                            calls.fetch_add(1, Ordering::SeqCst);
                            Ok(json!("second"))
                        },
                        TTL,
                        Duration::ZERO,
                    )
                    .await
            })
        };

        while cache.stats().await.coalesced == 0 {
            tokio::task::yield_now().await;
        }
        release.send(()).unwrap();

        assert_eq!(first.await.unwrap().unwrap(), json!("loaded"));
        assert_eq!(second.await.unwrap().unwrap(), json!("loaded"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_invalidate_during_flight_skips_store() {
        let cache = cache();
        let key = CacheKey::query("SELECT * FROM event", None);
        let (release, gate) = oneshot::channel::<()>();

        let pending = {
            let cache = cache.clone();
            let key = key.clone();
            tokio::spawn(async move {
                cache
                    .get_or_fetch(
                        &key,
                        move || async move {
                            let _ = gate.await;
                            Ok(json!("before write"))
                        },
                        TTL,
                        Duration::ZERO,
                    )
                    .await
            })
        };

        while !cache.is_in_flight(&key).await {
            tokio::task::yield_now().await;
        }
        cache.invalidate_prefix("query:").await;
        assert!(!cache.is_in_flight(&key).await);

        release.send(()).unwrap();
        assert_eq!(pending.await.unwrap().unwrap(), json!("before write"));
        assert!(!cache.contains_key(&key).await);
    }

    #[tokio::test]
    async fn test_fetch_completes_after_caller_drops() {
        let cache = cache();
        let key = CacheKey::table("organizer");
        let (release, gate) = oneshot::channel::<()>();

        let caller = {
            let cache = cache.clone();
            let key = key.clone();
            tokio::spawn(async move {
                cache
                    .get_or_fetch(
                        &key,
                        move || async move {
                            let _ = gate.await;
                            Ok(json!("late"))
                        },
                        TTL,
                        Duration::ZERO,
                    )
                    .await
            })
        };

        while !cache.is_in_flight(&key).await {
            tokio::task::yield_now().await;
        }
        caller.abort();
        let _ = caller.await;

        release.send(()).unwrap();
        settle(&cache, &key).await;

        assert_eq!(cache.get(&key).await, Some(json!("late")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_value_served_within_window() {
        let cache = cache();
        let key = CacheKey::table("event");
        let swr = Duration::from_secs(30);

        cache.set(key.clone(), json!("old"), Duration::from_secs(10)).await;
        tokio::time::advance(Duration::from_secs(15)).await;

        let value = cache
            .get_or_fetch(&key, || async { Ok(json!("new")) }, TTL, swr)
            .await
            .unwrap();
        assert_eq!(value, json!("old"));

        settle(&cache, &key).await;
        assert_eq!(cache.get(&key).await, Some(json!("new")));
        assert_eq!(cache.stats().await.stale_hits, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_background_refresh_failure_keeps_stale() {
        let cache = cache();
        let key = CacheKey::table("event");
        let swr = Duration::from_secs(30);

        cache.set(key.clone(), json!("old"), Duration::from_secs(10)).await;
        tokio::time::advance(Duration::from_secs(15)).await;

        let value = cache
            .get_or_fetch(
                &key,
                || async { Err(StoreError::QueryError("boom".into())) },
                TTL,
                swr,
            )
            .await
            .unwrap();
        assert_eq!(value, json!("old"));
        settle(&cache, &key).await;

        // still within the window: stale again, and a new refresh is tried
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let value = cache
            .get_or_fetch(
                &key,
                move || async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Ok(json!("fixed"))
                },
                TTL,
                swr,
            )
            .await
            .unwrap();
        assert_eq!(value, json!("old"));
        settle(&cache, &key).await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.get(&key).await, Some(json!("fixed")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_past_window_fetches_cold() {
        let cache = cache();
        let key = CacheKey::table("event");

        cache.set(key.clone(), json!("old"), Duration::from_secs(10)).await;
        tokio::time::advance(Duration::from_secs(45)).await;

        let value = cache
            .get_or_fetch(
                &key,
                || async { Ok(json!("new")) },
                TTL,
                Duration::from_secs(30),
            )
            .await
            .unwrap();
        assert_eq!(value, json!("new"));
    }
}

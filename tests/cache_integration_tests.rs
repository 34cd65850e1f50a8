//! Integration tests for the cache module
//!
//! These tests verify the complete cache functionality including:
//! - Single-flight fetches under concurrency
//! - TTL expiration on a paused clock
//! - Stale-while-revalidate
//! - Prefix invalidation and clearing

use radolfzell_events::cache::{CacheConfig, CacheKey, DataCache, WriteInvalidation};
use radolfzell_events::{RecordId, StoreError};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

const TTL: Duration = Duration::from_secs(60);

fn cache() -> DataCache<Value, StoreError> {
    DataCache::new(CacheConfig::default())
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_reads_share_one_fetch() {
    let cache = cache();
    let key = CacheKey::table("event");
    let calls = Arc::new(AtomicUsize::new(0));

    let mut handles = Vec::new();
    for _ in 0..16 {
        let cache = cache.clone();
        let key = key.clone();
        let calls = Arc::clone(&calls);
        handles.push(tokio::spawn(async move {
            cache
                .get_or_fetch(
                    &key,
                    move || async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(50)).await;
                        Ok(json!([{ "id": "event:1" }]))
                    },
                    TTL,
                    Duration::ZERO,
                )
                .await
        }));
    }

    for handle in handles {
        assert_eq!(handle.await.unwrap().unwrap(), json!([{ "id": "event:1" }]));
    }
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    let stats = cache.stats().await;
    assert_eq!(stats.fetches, 1);
    assert_eq!(stats.misses + stats.coalesced, 16);
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_failure_reaches_every_caller() {
    let cache = cache();
    let key = CacheKey::raw("record:event:1");
    let calls = Arc::new(AtomicUsize::new(0));

    let fetch = |calls: Arc<AtomicUsize>| {
        move || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(10)).await;
            Err::<Value, _>(StoreError::ConnectionError("refused".to_string()))
        }
    };

    let (a, b) = tokio::join!(
        cache.get_or_fetch(&key, fetch(Arc::clone(&calls)), TTL, Duration::ZERO),
        cache.get_or_fetch(&key, fetch(Arc::clone(&calls)), TTL, Duration::ZERO),
    );

    let expected = StoreError::ConnectionError("refused".to_string());
    assert_eq!(a.unwrap_err(), expected);
    assert_eq!(b.unwrap_err(), expected);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(!cache.contains_key(&key).await);
}

#[tokio::test(start_paused = true)]
async fn test_two_fetchers_in_one_tick() {
    let cache = cache();
    let key = CacheKey::raw("record:event:1");
    let calls = Arc::new(AtomicUsize::new(0));

    let a_calls = Arc::clone(&calls);
    let b_calls = Arc::clone(&calls);
    let (a, b) = tokio::join!(
        cache.get_or_fetch(
            &key,
            move || async move {
                a_calls.fetch_add(1, Ordering::SeqCst);
                Ok(json!({ "id": "event:1", "from": "A" }))
            },
            TTL,
            Duration::ZERO,
        ),
        cache.get_or_fetch(
            &key,
            move || async move {
                b_calls.fetch_add(1, Ordering::SeqCst);
                Ok(json!({ "id": "event:1", "from": "B" }))
            },
            TTL,
            Duration::ZERO,
        ),
    );

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(a.unwrap(), b.unwrap());
}

#[tokio::test(start_paused = true)]
async fn test_entry_fresh_until_ttl() {
    let cache = cache();
    let key = CacheKey::record(&"event:1".parse::<RecordId>().unwrap());
    let ttl = Duration::from_millis(500);

    cache.set(key.clone(), json!("v"), ttl).await;

    tokio::time::advance(ttl - Duration::from_millis(1)).await;
    assert_eq!(cache.get(&key).await, Some(json!("v")));

    tokio::time::advance(Duration::from_millis(1)).await;
    assert_eq!(cache.get(&key).await, None);
    assert_eq!(cache.stats().await.evictions_ttl, 1);
}

#[tokio::test(start_paused = true)]
async fn test_table_listing_expires() {
    let cache = cache();
    let key = CacheKey::table("event");
    let events = json!([{ "id": "event:e1" }, { "id": "event:e2" }]);

    cache.set(key.clone(), events.clone(), Duration::from_millis(60_000)).await;
    assert_eq!(cache.get(&key).await, Some(events));

    tokio::time::advance(Duration::from_millis(61_000)).await;
    assert_eq!(cache.get(&key).await, None);
}

#[tokio::test(start_paused = true)]
async fn test_stale_while_revalidate() {
    let cache = cache();
    let key = CacheKey::table("topic");
    let swr = Duration::from_secs(30);

    cache.set(key.clone(), json!(["old"]), Duration::from_secs(10)).await;
    tokio::time::advance(Duration::from_secs(15)).await;

    let value = cache
        .get_or_fetch(
            &key,
            || async {
                tokio::time::sleep(Duration::from_millis(100)).await;
                Ok(json!(["new"]))
            },
            TTL,
            swr,
        )
        .await
        .unwrap();
    assert_eq!(value, json!(["old"]));
    assert!(cache.is_in_flight(&key).await);

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(!cache.is_in_flight(&key).await);
    assert_eq!(cache.get(&key).await, Some(json!(["new"])));
    assert_eq!(cache.stats().await.stale_hits, 1);
}

#[tokio::test]
async fn test_prefix_invalidation() {
    let cache = cache();

    cache.set(CacheKey::query("SELECT * FROM event", None), json!([]), TTL).await;
    cache
        .set(
            CacheKey::query("SELECT * FROM event WHERE x = $x", Some(&json!({ "x": 1 }))),
            json!([]),
            TTL,
        )
        .await;
    cache.set(CacheKey::table("event"), json!([]), TTL).await;

    assert_eq!(cache.invalidate_prefix("query:").await.keys.len(), 2);
    assert_eq!(cache.get(&CacheKey::query("SELECT * FROM event", None)).await, None);
    assert_eq!(cache.get(&CacheKey::table("event")).await, Some(json!([])));
}

#[tokio::test]
async fn test_write_policy() {
    let cache = cache();
    let id: RecordId = "event:1".parse().unwrap();
    let other: RecordId = "event:2".parse().unwrap();

    cache.set(CacheKey::table("event"), json!([]), TTL).await;
    cache.set(CacheKey::table("topic"), json!([]), TTL).await;
    cache.set(CacheKey::record(&id), json!({}), TTL).await;
    cache.set(CacheKey::record(&other), json!({}), TTL).await;
    cache.set(CacheKey::query("SELECT * FROM topic", None), json!([]), TTL).await;

    let event = cache.invalidate_write(&WriteInvalidation::for_record(&id)).await;
    assert_eq!(event.keys.len(), 3);

    assert!(!cache.contains_key(&CacheKey::table("event")).await);
    assert!(!cache.contains_key(&CacheKey::record(&id)).await);
    assert!(!cache.contains_key(&CacheKey::query("SELECT * FROM topic", None)).await);
    assert!(cache.contains_key(&CacheKey::table("topic")).await);
    assert!(cache.contains_key(&CacheKey::record(&other)).await);
}

#[tokio::test]
async fn test_clear() {
    let cache = cache();
    for table in ["event", "location", "organizer", "topic"] {
        cache.set(CacheKey::table(table), json!([]), TTL).await;
    }

    assert_eq!(cache.clear().await, 4);
    for table in ["event", "location", "organizer", "topic"] {
        assert_eq!(cache.get(&CacheKey::table(table)).await, None);
    }
}

#[tokio::test(start_paused = true)]
async fn test_cleanup_sweeps_expired_entries() {
    let cache = DataCache::<Value, StoreError>::new(
        CacheConfig::builder()
            .swr_window(Duration::from_secs(5))
            .build(),
    );

    cache.set(CacheKey::table("a"), json!(1), Duration::from_secs(1)).await;
    cache.set(CacheKey::table("b"), json!(2), Duration::from_secs(10)).await;

    tokio::time::advance(Duration::from_secs(3)).await;
    assert!(cache.cleanup_expired().await.is_empty());

    tokio::time::advance(Duration::from_secs(4)).await;
    let events = cache.cleanup_expired().await;
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].keys, vec!["table:a".to_string()]);
    assert_eq!(cache.len().await, 1);
}

//! Cached repository and service behavior against the in-memory store

use radolfzell_events::cache::{CacheConfig, CacheKey, DataCache};
use radolfzell_events::schema::{Event, EventService, Location, LocationService};
use radolfzell_events::{
    CachedRepository, CurrentRoute, DocumentStore, MemoryStore, QueryParams, RecordId, Session,
    StoreError,
};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

struct Fixture {
    store: Arc<MemoryStore>,
    repo: CachedRepository,
}

async fn fixture() -> Fixture {
    let store = Arc::new(MemoryStore::new().with_query_handler(|sql, params| {
        Ok(vec![json!({ "sql": sql, "params": params })])
    }));
    store
        .seed(
            "event",
            vec![
                json!({ "id": "event:1", "title": "Hausherrenfest", "date_start": "2026-07-19T10:00:00Z" }),
                json!({ "id": "event:2", "title": "Seenachtfest", "date_start": "2026-08-08T20:00:00Z" }),
            ],
        )
        .await
        .unwrap();

    let repo = CachedRepository::new(
        store.clone(),
        DataCache::new(CacheConfig::default()),
        CurrentRoute::default(),
    );
    Fixture { store, repo }
}

#[tokio::test]
async fn test_reads_are_cached() {
    let Fixture { store, repo } = fixture().await;
    let id: RecordId = "event:1".parse().unwrap();

    assert_eq!(repo.select_all("event").await.unwrap().len(), 2);
    assert_eq!(repo.select_all("event").await.unwrap().len(), 2);
    repo.select(&id).await.unwrap();
    repo.select(&id).await.unwrap();
    repo.query("SELECT * FROM event", &QueryParams::new()).await.unwrap();
    repo.query("SELECT * FROM event", &QueryParams::new()).await.unwrap();

    let calls = store.calls();
    assert_eq!(calls.select_table, 1);
    assert_eq!(calls.select_record, 1);
    assert_eq!(calls.query, 1);
    assert_eq!(repo.cache().stats().await.hits, 3);
}

#[tokio::test]
async fn test_update_invalidates_record_table_and_queries() {
    let Fixture { store, repo } = fixture().await;
    let id: RecordId = "event:1".parse().unwrap();
    let other: RecordId = "event:2".parse().unwrap();

    repo.select_all("event").await.unwrap();
    repo.select(&id).await.unwrap();
    repo.select(&other).await.unwrap();
    repo.query("SELECT * FROM topic", &QueryParams::new()).await.unwrap();

    repo.merge(&id, json!({ "title": "Hausherrenfest 2026" })).await.unwrap();

    let cache = repo.cache();
    assert!(!cache.contains_key(&CacheKey::table("event")).await);
    assert!(!cache.contains_key(&CacheKey::record(&id)).await);
    assert!(!cache.contains_key(&CacheKey::query("SELECT * FROM topic", None)).await);
    assert!(cache.contains_key(&CacheKey::record(&other)).await);

    let record = repo.select(&id).await.unwrap().unwrap();
    assert_eq!(record["title"], "Hausherrenfest 2026");
    assert_eq!(store.calls().select_record, 3);
}

#[tokio::test]
async fn test_create_and_delete_refresh_listing() {
    let Fixture { repo, .. } = fixture().await;

    assert_eq!(repo.select_all("event").await.unwrap().len(), 2);
    let created = repo
        .create("event", json!({ "title": "Stadtlauf", "date_start": "2026-09-13T09:00:00Z" }))
        .await
        .unwrap();
    assert_eq!(repo.select_all("event").await.unwrap().len(), 3);

    let id: RecordId = created["id"].as_str().unwrap().parse().unwrap();
    repo.delete(&id).await.unwrap();
    assert_eq!(repo.select_all("event").await.unwrap().len(), 2);
    assert_eq!(repo.select(&id).await.unwrap(), None);
}

#[tokio::test]
async fn test_admin_route_bypasses_cache() {
    let Fixture { store, repo } = fixture().await;

    repo.route().navigate("/admin/events");
    repo.select_all("event").await.unwrap();
    repo.select_all("event").await.unwrap();
    assert_eq!(store.calls().select_table, 2);
    assert!(repo.cache().is_empty().await);

    repo.route().navigate("/events");
    repo.select_all("event").await.unwrap();
    repo.select_all("event").await.unwrap();
    assert_eq!(store.calls().select_table, 3);
}

#[tokio::test]
async fn test_admin_bypass_ignores_existing_entries() {
    let Fixture { store, repo } = fixture().await;

    repo.select_all("event").await.unwrap();
    store
        .create("event", json!({ "title": "Direkt", "date_start": "2026-01-01T00:00:00Z" }))
        .await
        .unwrap();

    assert_eq!(repo.select_all("event").await.unwrap().len(), 2);
    repo.route().navigate("/admin");
    assert_eq!(repo.select_all("event").await.unwrap().len(), 3);
}

#[tokio::test]
async fn test_store_errors_are_not_cached() {
    let Fixture { store, repo } = fixture().await;

    store
        .fail_next(StoreError::TimeoutError {
            timeout_seconds: 10,
            context: "select event".to_string(),
        })
        .await;
    assert!(matches!(
        repo.select_all("event").await,
        Err(StoreError::TimeoutError { .. })
    ));
    assert_eq!(repo.select_all("event").await.unwrap().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_search_uses_short_ttl() {
    let Fixture { store, repo } = fixture().await;
    let mut params = QueryParams::new();
    params.insert("term".to_string(), json!("fest"));

    repo.search("SELECT * FROM event WHERE title @@ $term", &params).await.unwrap();
    repo.query("SELECT * FROM event", &QueryParams::new()).await.unwrap();

    tokio::time::advance(Duration::from_secs(11)).await;
    repo.search("SELECT * FROM event WHERE title @@ $term", &params).await.unwrap();
    repo.query("SELECT * FROM event", &QueryParams::new()).await.unwrap();

    assert_eq!(store.calls().query, 3);
}

#[tokio::test]
async fn test_login_clears_cached_reads() {
    let Fixture { store, repo } = fixture().await;
    let session = Session::new(repo.cache().clone());

    repo.select_all("event").await.unwrap();
    session.login("token").await;
    repo.select_all("event").await.unwrap();

    assert_eq!(store.calls().select_table, 2);
}

#[tokio::test]
async fn test_event_service_filters_bind_record_ids() {
    let Fixture { repo, .. } = fixture().await;
    let store = Arc::new(MemoryStore::new().with_query_handler(|_, params| {
        Ok(vec![json!({
            "id": "event:9",
            "title": "Gefiltert",
            "date_start": "2026-05-01T18:00:00Z",
            "location": params.get("location").cloned().unwrap_or(serde_json::Value::Null)
        })])
    }));
    let events = EventService::new(CachedRepository::new(
        store.clone(),
        repo.cache().clone(),
        CurrentRoute::default(),
    ));

    let milchwerk: RecordId = "location:milchwerk".parse().unwrap();
    let found: Vec<Event> = events.by_location(&milchwerk).await.unwrap();
    assert_eq!(found[0].location.as_ref(), Some(&milchwerk));

    events.by_location(&milchwerk).await.unwrap();
    assert_eq!(store.calls().query, 1);
}

#[tokio::test]
async fn test_location_service_roundtrip() {
    let Fixture { repo, .. } = fixture().await;
    let locations = LocationService::new(repo);

    let mut location = Location::new("Milchwerk");
    location.city = Some("Radolfzell".to_string());
    let created = locations.create(&location).await.unwrap();

    let listed = locations.list().await.unwrap();
    assert_eq!(listed, vec![created.clone()]);
    assert_eq!(
        locations.get(created.id.as_ref().unwrap()).await.unwrap(),
        Some(created)
    );
}

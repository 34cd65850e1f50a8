//! Cache Demo Application
//!
//! Wires configuration, logging, the document store, the cached repository
//! and the services, then shows hits, invalidation and favorites.
//!
//! Usage:
//!   cargo run --example cache_demo
//!
//! Environment variables (also read from `.env`):
//!   SURREALDB_URL  - SurrealDB HTTP endpoint (default: http://localhost:8000)
//!   SURREALDB_NS   - Namespace (default: radolfzell)
//!   SURREALDB_DB   - Database (default: events)
//!   SURREALDB_USER / SURREALDB_PASS - Basic auth credentials
//!   CACHE_TTL_MS, CACHE_SEARCH_TTL_MS, CACHE_SWR_MS - Cache timings
//!   STORAGE_PATH   - Favorites file
//!
//! Falls back to an in-memory store when SurrealDB is not reachable.

use chrono::{Duration as ChronoDuration, Utc};
use radolfzell_events::logging::init_tracing;
use radolfzell_events::schema::{Event, EventService, Topic, TopicService};
use radolfzell_events::{
    AppConfig, CachedRepository, CurrentRoute, DataCache, DocumentStore, FavoriteService,
    FileStorage, LocalStorage, MemoryStorage, MemoryStore, Session, SurrealClient,
};
use std::sync::Arc;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    info!("=== Radolfzell Events Cache Demo ===");
    let config = AppConfig::from_env()?;

    let store: Arc<dyn DocumentStore> = match connect(&config).await {
        Some(client) => Arc::new(client),
        None => {
            warn!("SurrealDB not reachable, using in-memory store");
            Arc::new(MemoryStore::new())
        }
    };

    let cache: DataCache = DataCache::new(config.cache.clone());
    let _cleanup = cache.spawn_cleanup();
    let route = CurrentRoute::default();
    let repo = CachedRepository::new(store, cache.clone(), route.clone());
    let session = Session::new(cache.clone());

    let topics = TopicService::new(repo.clone());
    let events = EventService::new(repo.clone());

    info!("\n--- Writes ---");
    let music = topics.create(&Topic::new("Musik")).await?;
    let mut fest = Event::new("Hausherrenfest", Utc::now() + ChronoDuration::days(30));
    fest.topics = music.id.clone().into_iter().collect();
    let fest = events.create(&fest).await?;
    info!("Created {:?} and {:?}", music.id, fest.id);

    info!("\n--- Cached reads ---");
    for _ in 0..3 {
        let listed = events.list().await?;
        info!("Listed {} events", listed.len());
    }
    info!("{}", cache.stats().await);

    info!("\n--- Admin route ---");
    route.navigate("/admin/events");
    let listed = events.list().await?;
    info!("Admin listing read {} events uncached", listed.len());
    route.navigate("/");

    info!("\n--- Session change ---");
    session.login("demo-token").await;
    info!("Cache entries after login: {}", cache.len().await);

    info!("\n--- Favorites ---");
    let storage: Arc<dyn LocalStorage> = match &config.storage_path {
        Some(path) => Arc::new(FileStorage::open(path)?),
        None => Arc::new(MemoryStorage::new()),
    };
    let favorites = FavoriteService::new(storage);
    let mut changes = favorites.subscribe();

    if let Some(id) = &fest.id {
        let saved = favorites.toggle(id)?;
        changes.changed().await?;
        info!("{} saved: {} (now {} favorites)", id, saved, changes.borrow().len());
    }

    info!("\n=== Demo Complete ===");
    Ok(())
}

async fn connect(config: &AppConfig) -> Option<SurrealClient> {
    let client = match SurrealClient::new(config.surreal.clone()) {
        Ok(client) => client,
        Err(e) => {
            warn!("Invalid SurrealDB configuration: {}", e);
            return None;
        }
    };

    let health = client.health_check_detailed().await;
    info!(
        "SurrealDB health: {:?} ({}ms)",
        health.status, health.response_time_ms
    );
    health.status.is_operational().then_some(client)
}

//! # Radolfzell Events (radolfzell-events)
//!
//! Data layer for the Radolfzell event listings: a SurrealDB client behind
//! a TTL cache with request coalescing, plus locally persisted favorites.
//!
//! ## Features
//!
//! - TTL cache with single-flight fetches and stale-while-revalidate
//! - Namespaced cache keys with write-driven invalidation
//! - Admin routes read around the cache
//! - SurrealDB HTTP client with three-tier health checks
//! - Favorites persisted to local storage and observable through a watch
//!   channel
//!
//! ## Cached Reads
//!
//! ```no_run
//! use radolfzell_events::{
//!     CacheConfig, CachedRepository, CurrentRoute, DataCache, SurrealClient, SurrealConfig,
//!     schema::EventService,
//! };
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let client = SurrealClient::new(SurrealConfig::default())?;
//!     let repo = CachedRepository::new(
//!         Arc::new(client),
//!         DataCache::new(CacheConfig::default()),
//!         CurrentRoute::default(),
//!     );
//!
//!     let events = EventService::new(repo);
//!     for event in events.search("Hausherrenfest").await? {
//!         println!("{} ({})", event.title, event.date_start);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Health Check with Retry
//!
//! ```no_run
//! use radolfzell_events::{SurrealClient, SurrealConfig};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let client = SurrealClient::new(SurrealConfig::default())?;
//!
//!     let result = client.health_check_with_retry().await;
//!     if result.status.is_operational() {
//!         println!("Database is operational");
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Favorites
//!
//! ```
//! use radolfzell_events::{FavoriteService, MemoryStorage, RecordId};
//! use std::sync::Arc;
//!
//! # fn main() -> Result<(), radolfzell_events::StoreError> {
//! let favorites = FavoriteService::new(Arc::new(MemoryStorage::new()));
//! let id: RecordId = "event:seenachtfest".parse()?;
//!
//! favorites.save(&id)?;
//! assert!(favorites.is_saved(&id));
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod config;
pub mod db;
pub mod error;
pub mod favorites;
pub mod logging;
pub mod record_id;
pub mod repository;
pub mod route;
pub mod schema;
pub mod session;
pub mod storage;

// Re-export main types for convenience
pub use cache::{
    CacheConfig, CacheConfigBuilder, CacheEntry, CacheKey, CacheStats, CacheValue, DataCache,
    InvalidationEvent, InvalidationReason, KeyNamespace, WriteInvalidation,
};
pub use config::AppConfig;
pub use db::{
    DocumentStore, HealthCheckConfig, HealthCheckMetadata, HealthCheckMethod, HealthCheckResult,
    HealthStatus, MemoryStore, QueryParams, SurrealClient, SurrealConfig,
};
pub use error::{Result, StoreError};
pub use favorites::FavoriteService;
pub use record_id::RecordId;
pub use repository::CachedRepository;
pub use route::CurrentRoute;
pub use session::{AuthState, Session};
pub use storage::{FileStorage, LocalStorage, MemoryStorage};

//! # Data Cache
//!
//! A TTL cache that fronts the remote document database.
//!
//! ## Features
//!
//! - **TTL-Based Expiration**: per-key deadlines, lazily evicted on read
//! - **Single-Flight**: concurrent reads of one key share a single fetch
//! - **Stale-While-Revalidate**: optional grace window serving stale data
//!   while a background refresh runs
//! - **Namespaced Keys**: `table:`, `record:` and `query:` prefixes
//! - **Write Invalidation**: exact-key and prefix eviction after writes
//!
//! ## Example
//!
//! ```rust
//! use radolfzell_events::cache::{CacheConfig, CacheKey, DataCache};
//! use radolfzell_events::StoreError;
//! use serde_json::json;
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), StoreError> {
//! let cache: DataCache = DataCache::new(CacheConfig::default());
//! let key = CacheKey::table("event");
//!
//! let events = cache
//!     .get_or_fetch(
//!         &key,
//!         || async { Ok(json!([{ "id": "event:1" }])) },
//!         Duration::from_secs(60),
//!         Duration::ZERO,
//!     )
//!     .await?;
//!
//! assert_eq!(cache.get(&key).await, Some(events));
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod entry;
pub mod fetch;
pub mod invalidation;
pub mod keys;
pub mod store;
pub mod types;

pub use config::{CacheConfig, CacheConfigBuilder};
pub use entry::CacheEntry;
pub use invalidation::{InvalidationEvent, InvalidationReason, WriteInvalidation};
pub use keys::{CacheKey, KeyNamespace};
pub use store::{start_auto_cleanup, DataCache};
pub use types::{CacheStats, CacheValue};

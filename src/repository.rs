//! Cached data access
//!
//! [`CachedRepository`] puts the [`DataCache`] in front of a
//! [`DocumentStore`]: reads go through `get_or_fetch` under namespaced
//! keys, writes go straight to the store and then evict every key the
//! write may have made stale.

use crate::cache::{CacheKey, DataCache, WriteInvalidation};
use crate::db::{DocumentStore, QueryParams};
use crate::error::Result;
use crate::record_id::RecordId;
use crate::route::CurrentRoute;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Document store access through the shared cache
#[derive(Clone)]
pub struct CachedRepository {
    store: Arc<dyn DocumentStore>,
    cache: DataCache,
    route: CurrentRoute,
}

impl CachedRepository {
    pub fn new(store: Arc<dyn DocumentStore>, cache: DataCache, route: CurrentRoute) -> Self {
        Self { store, cache, route }
    }

    pub fn cache(&self) -> &DataCache {
        &self.cache
    }

    pub fn route(&self) -> &CurrentRoute {
        &self.route
    }

    pub fn store(&self) -> &Arc<dyn DocumentStore> {
        &self.store
    }

    /// Every record of `table`, cached under `table:<name>`
    pub async fn select_all(&self, table: &str) -> Result<Vec<Value>> {
        let key = CacheKey::table(table);
        if self.bypass(&key) {
            return self.store.select_table(table).await;
        }

        let store = Arc::clone(&self.store);
        let table = table.to_string();
        let value = self
            .read(&key, self.cache.config().default_ttl, move || async move {
                store.select_table(&table).await.map(Value::Array)
            })
            .await?;

        Ok(into_rows(value))
    }

    /// One record, cached under `record:<table>:<id>`
    ///
    /// A missing record is cached as absent until it is written.
    pub async fn select(&self, id: &RecordId) -> Result<Option<Value>> {
        let key = CacheKey::record(id);
        if self.bypass(&key) {
            return self.store.select_record(id).await;
        }

        let store = Arc::clone(&self.store);
        let id = id.clone();
        let value = self
            .read(&key, self.cache.config().default_ttl, move || async move {
                Ok(store.select_record(&id).await?.unwrap_or(Value::Null))
            })
            .await?;

        Ok(match value {
            Value::Null => None,
            record => Some(record),
        })
    }

    /// Rows of a query, cached under `query:<sql>[:<params>]`
    pub async fn query(&self, sql: &str, params: &QueryParams) -> Result<Vec<Value>> {
        self.query_with_ttl(sql, params, self.cache.config().default_ttl)
            .await
    }

    /// Like [`query`](Self::query) but kept only for the search TTL
    pub async fn search(&self, sql: &str, params: &QueryParams) -> Result<Vec<Value>> {
        self.query_with_ttl(sql, params, self.cache.config().search_ttl)
            .await
    }

    pub async fn select_all_as<T: DeserializeOwned>(&self, table: &str) -> Result<Vec<T>> {
        decode_rows(self.select_all(table).await?)
    }

    pub async fn select_as<T: DeserializeOwned>(&self, id: &RecordId) -> Result<Option<T>> {
        match self.select(id).await? {
            Some(record) => Ok(Some(serde_json::from_value(record)?)),
            None => Ok(None),
        }
    }

    pub async fn query_as<T: DeserializeOwned>(
        &self,
        sql: &str,
        params: &QueryParams,
    ) -> Result<Vec<T>> {
        decode_rows(self.query(sql, params).await?)
    }

    pub async fn search_as<T: DeserializeOwned>(
        &self,
        sql: &str,
        params: &QueryParams,
    ) -> Result<Vec<T>> {
        decode_rows(self.search(sql, params).await?)
    }

    /// Create a record and evict the table listing, the record key and
    /// every cached query
    pub async fn create(&self, table: &str, data: Value) -> Result<Value> {
        let created = self.store.create(table, data).await?;

        let write = match created
            .get("id")
            .and_then(Value::as_str)
            .and_then(|raw| raw.parse::<RecordId>().ok())
        {
            Some(id) => WriteInvalidation::for_record(&id),
            None => WriteInvalidation::for_table(table),
        };
        self.cache.invalidate_write(&write).await;

        Ok(created)
    }

    /// Replace a record's content
    pub async fn update(&self, id: &RecordId, data: Value) -> Result<Value> {
        let updated = self.store.update(id, data).await?;
        self.cache
            .invalidate_write(&WriteInvalidation::for_record(id))
            .await;
        Ok(updated)
    }

    /// Merge fields into a record
    pub async fn merge(&self, id: &RecordId, data: Value) -> Result<Value> {
        let merged = self.store.merge(id, data).await?;
        self.cache
            .invalidate_write(&WriteInvalidation::for_record(id))
            .await;
        Ok(merged)
    }

    pub async fn delete(&self, id: &RecordId) -> Result<()> {
        self.store.delete(id).await?;
        self.cache
            .invalidate_write(&WriteInvalidation::for_record(id))
            .await;
        Ok(())
    }

    /// Drop every cached entry
    pub async fn clear_cache(&self) -> usize {
        self.cache.clear().await
    }

    async fn query_with_ttl(
        &self,
        sql: &str,
        params: &QueryParams,
        ttl: Duration,
    ) -> Result<Vec<Value>> {
        let key = CacheKey::query(sql, Some(&Value::Object(params.clone())));
        if self.bypass(&key) {
            return self.store.query(sql, params).await;
        }

        let store = Arc::clone(&self.store);
        let sql = sql.to_string();
        let params = params.clone();
        let value = self
            .read(&key, ttl, move || async move {
                store.query(&sql, &params).await.map(Value::Array)
            })
            .await?;

        Ok(into_rows(value))
    }

    async fn read<F, Fut>(&self, key: &CacheKey, ttl: Duration, fetcher: F) -> Result<Value>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = Result<Value>> + Send + 'static,
    {
        let swr = self.cache.config().swr_window;
        self.cache.get_or_fetch(key, fetcher, ttl, swr).await
    }

    fn bypass(&self, key: &CacheKey) -> bool {
        let bypass = self.route.is_admin();
        if bypass {
            debug!("Admin route {}, reading {} uncached", self.route.path(), key);
        }
        bypass
    }
}

fn into_rows(value: Value) -> Vec<Value> {
    match value {
        Value::Array(rows) => rows,
        Value::Null => Vec::new(),
        other => vec![other],
    }
}

fn decode_rows<T: DeserializeOwned>(rows: Vec<Value>) -> Result<Vec<T>> {
    rows.into_iter()
        .map(|row| serde_json::from_value(row).map_err(Into::into))
        .collect()
}

//! In-process document store
//!
//! Keeps tables in memory with SurrealDB-shaped records (`id` field holding
//! the `table:id` string). Counts calls per operation and can be told to
//! fail the next call, which makes it the backend of choice for exercising
//! the cache and repository.

use crate::db::{DocumentStore, QueryParams};
use crate::error::{Result, StoreError};
use crate::record_id::RecordId;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::{Mutex, RwLock};
use tracing::debug;

type QueryHandler = Box<dyn Fn(&str, &QueryParams) -> Result<Vec<Value>> + Send + Sync>;

/// Snapshot of how often each operation was called
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreCalls {
    pub select_table: usize,
    pub select_record: usize,
    pub query: usize,
    pub create: usize,
    pub update: usize,
    pub merge: usize,
    pub delete: usize,
}

impl StoreCalls {
    /// Calls that read from the store
    pub fn reads(&self) -> usize {
        self.select_table + self.select_record + self.query
    }

    /// Calls that wrote to the store
    pub fn writes(&self) -> usize {
        self.create + self.update + self.merge + self.delete
    }
}

#[derive(Default)]
struct CallCounters {
    select_table: AtomicUsize,
    select_record: AtomicUsize,
    query: AtomicUsize,
    create: AtomicUsize,
    update: AtomicUsize,
    merge: AtomicUsize,
    delete: AtomicUsize,
}

/// In-memory [`DocumentStore`]
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<HashMap<String, BTreeMap<String, Value>>>,
    query_handler: Option<QueryHandler>,
    next_failure: Mutex<Option<StoreError>>,
    calls: CallCounters,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer `query` calls with `handler`
    ///
    /// Without a handler every query fails with a `QueryError`.
    pub fn with_query_handler<H>(mut self, handler: H) -> Self
    where
        H: Fn(&str, &QueryParams) -> Result<Vec<Value>> + Send + Sync + 'static,
    {
        self.query_handler = Some(Box::new(handler));
        self
    }

    /// Insert records without counting them as calls
    ///
    /// Records without an `id` get a generated one.
    pub async fn seed(&self, table: &str, records: Vec<Value>) -> Result<Vec<RecordId>> {
        let mut tables = self.tables.write().await;
        let rows = tables.entry(table.to_string()).or_default();

        let mut ids = Vec::with_capacity(records.len());
        for data in records {
            let (id, record) = Self::prepare(table, data)?;
            rows.insert(id.id().to_string(), record);
            ids.push(id);
        }
        Ok(ids)
    }

    /// Make the next operation, whichever it is, fail with `error`
    pub async fn fail_next(&self, error: StoreError) {
        *self.next_failure.lock().await = Some(error);
    }

    pub fn calls(&self) -> StoreCalls {
        let c = &self.calls;
        StoreCalls {
            select_table: c.select_table.load(Ordering::SeqCst),
            select_record: c.select_record.load(Ordering::SeqCst),
            query: c.query.load(Ordering::SeqCst),
            create: c.create.load(Ordering::SeqCst),
            update: c.update.load(Ordering::SeqCst),
            merge: c.merge.load(Ordering::SeqCst),
            delete: c.delete.load(Ordering::SeqCst),
        }
    }

    async fn enter(&self, counter: &AtomicUsize) -> Result<()> {
        counter.fetch_add(1, Ordering::SeqCst);
        match self.next_failure.lock().await.take() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    /// Resolve the record id for `data` and stamp it into the object
    fn prepare(table: &str, data: Value) -> Result<(RecordId, Value)> {
        let Value::Object(mut fields) = data else {
            return Err(StoreError::QueryError(format!(
                "record content for {} must be an object",
                table
            )));
        };

        let id = match fields.get("id").and_then(Value::as_str) {
            Some(raw) => {
                let id: RecordId = raw.parse()?;
                if id.table() != table {
                    return Err(StoreError::QueryError(format!(
                        "record {} does not belong to table {}",
                        id, table
                    )));
                }
                id
            }
            None => RecordId::new(table, uuid::Uuid::new_v4().simple().to_string())?,
        };

        fields.insert("id".to_string(), Value::String(id.to_string()));
        Ok((id, Value::Object(fields)))
    }

    async fn upsert(&self, id: &RecordId, data: Value, merge: bool) -> Result<Value> {
        let mut tables = self.tables.write().await;
        let rows = tables.entry(id.table().to_string()).or_default();

        let content = match (merge, rows.get(id.id()), data) {
            (true, Some(Value::Object(existing)), Value::Object(patch)) => {
                let mut merged = existing.clone();
                merged.extend(patch);
                Value::Object(merged)
            }
            (_, _, data) => data,
        };

        let mut with_id = content;
        if let Value::Object(fields) = &mut with_id {
            fields.insert("id".to_string(), Value::String(id.to_string()));
        }
        let (_, record) = Self::prepare(id.table(), with_id)?;

        rows.insert(id.id().to_string(), record.clone());
        Ok(record)
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn select_table(&self, table: &str) -> Result<Vec<Value>> {
        self.enter(&self.calls.select_table).await?;
        debug!("MemoryStore select table {}", table);

        let tables = self.tables.read().await;
        Ok(tables
            .get(table)
            .map(|rows| rows.values().cloned().collect())
            .unwrap_or_default())
    }

    async fn select_record(&self, id: &RecordId) -> Result<Option<Value>> {
        self.enter(&self.calls.select_record).await?;
        debug!("MemoryStore select record {}", id);

        let tables = self.tables.read().await;
        Ok(tables
            .get(id.table())
            .and_then(|rows| rows.get(id.id()))
            .cloned())
    }

    async fn query(&self, sql: &str, params: &QueryParams) -> Result<Vec<Value>> {
        self.enter(&self.calls.query).await?;
        debug!("MemoryStore query {}", sql);

        match &self.query_handler {
            Some(handler) => handler(sql, params),
            None => Err(StoreError::QueryError(
                "MemoryStore has no query handler".to_string(),
            )),
        }
    }

    async fn create(&self, table: &str, data: Value) -> Result<Value> {
        self.enter(&self.calls.create).await?;

        let (id, record) = Self::prepare(table, data)?;
        let mut tables = self.tables.write().await;
        let rows = tables.entry(table.to_string()).or_default();

        if rows.contains_key(id.id()) {
            return Err(StoreError::QueryError(format!(
                "Database record `{}` already exists",
                id
            )));
        }

        debug!("MemoryStore create {}", id);
        rows.insert(id.id().to_string(), record.clone());
        Ok(record)
    }

    async fn update(&self, id: &RecordId, data: Value) -> Result<Value> {
        self.enter(&self.calls.update).await?;
        debug!("MemoryStore update {}", id);
        self.upsert(id, data, false).await
    }

    async fn merge(&self, id: &RecordId, data: Value) -> Result<Value> {
        self.enter(&self.calls.merge).await?;
        debug!("MemoryStore merge {}", id);
        self.upsert(id, data, true).await
    }

    async fn delete(&self, id: &RecordId) -> Result<()> {
        self.enter(&self.calls.delete).await?;
        debug!("MemoryStore delete {}", id);

        let mut tables = self.tables.write().await;
        if let Some(rows) = tables.get_mut(id.table()) {
            rows.remove(id.id());
        }
        Ok(())
    }
}

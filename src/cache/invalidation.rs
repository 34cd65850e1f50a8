//! Cache invalidation
//!
//! Writes are handled conservatively: any insert, update or delete drops
//! the written record's key, the table listing and every cached query,
//! because a query result may depend on any row.

use crate::cache::keys::{CacheKey, KeyNamespace};
use crate::record_id::RecordId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Why entries left the cache
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InvalidationReason {
    /// Past its TTL (and SWR window)
    Expired,

    /// Explicit `invalidate` call
    Manual,

    /// Invalidated by key prefix
    PrefixMatch { prefix: String },

    /// Invalidated because the backing table was written
    Write { table: String },

    /// Cache emptied because the session changed (login/logout)
    SessionChanged,
}

impl std::fmt::Display for InvalidationReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InvalidationReason::Expired => write!(f, "expired"),
            InvalidationReason::Manual => write!(f, "manual"),
            InvalidationReason::PrefixMatch { prefix } => write!(f, "prefix match: {}", prefix),
            InvalidationReason::Write { table } => write!(f, "write to table: {}", table),
            InvalidationReason::SessionChanged => write!(f, "session changed"),
        }
    }
}

/// Keys to drop after a write
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteInvalidation {
    /// Table that was written
    pub table: String,

    /// Record that was written, when known
    pub record: Option<RecordId>,
}

impl WriteInvalidation {
    /// Write to a known record
    pub fn for_record(id: &RecordId) -> Self {
        Self {
            table: id.table().to_string(),
            record: Some(id.clone()),
        }
    }

    /// Write whose record id is not known (e.g. a create the backend
    /// answered without an id)
    pub fn for_table(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            record: None,
        }
    }

    /// Exact keys to drop
    pub fn keys(&self) -> Vec<CacheKey> {
        let mut keys = vec![CacheKey::table(&self.table)];
        if let Some(record) = &self.record {
            keys.push(CacheKey::record(record));
        }
        keys
    }

    /// Prefix to drop in bulk
    pub fn prefix(&self) -> &'static str {
        KeyNamespace::Query.prefix()
    }

    pub fn reason(&self) -> InvalidationReason {
        InvalidationReason::Write {
            table: self.table.clone(),
        }
    }
}

/// Record of one eviction step
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvalidationEvent {
    /// Why the keys were removed
    pub reason: InvalidationReason,

    /// Time of removal
    pub timestamp: DateTime<Utc>,

    /// Removed keys
    pub keys: Vec<String>,

    /// Additional context
    pub context: Option<String>,
}

impl InvalidationEvent {
    /// Event stamped with the current time
    pub fn new(reason: InvalidationReason, keys: Vec<String>) -> Self {
        Self {
            reason,
            timestamp: Utc::now(),
            keys,
            context: None,
        }
    }

    /// Attach a free-text note
    pub fn with_context(mut self, context: String) -> Self {
        self.context = Some(context);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

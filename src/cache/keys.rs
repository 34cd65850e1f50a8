//! Cache key derivation
//!
//! Keys live in three namespaces so writes can invalidate by prefix:
//! `table:<name>`, `record:<table>:<id>` and `query:<sql>[:<params>]`.

use crate::record_id::RecordId;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Key namespace, rendered as the key prefix
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KeyNamespace {
    /// Full-table listing
    Table,

    /// Single record
    Record,

    /// Arbitrary or fulltext query result
    Query,
}

impl KeyNamespace {
    /// Prefix shared by every key of this namespace, including the colon
    pub fn prefix(&self) -> &'static str {
        match self {
            KeyNamespace::Table => "table:",
            KeyNamespace::Record => "record:",
            KeyNamespace::Query => "query:",
        }
    }
}

impl fmt::Display for KeyNamespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyNamespace::Table => write!(f, "table"),
            KeyNamespace::Record => write!(f, "record"),
            KeyNamespace::Query => write!(f, "query"),
        }
    }
}

/// A cache key
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CacheKey(String);

impl CacheKey {
    /// Key for the full listing of `table`
    pub fn table(name: &str) -> Self {
        Self(format!("{}{}", KeyNamespace::Table.prefix(), name))
    }

    /// Key for a single record
    pub fn record(id: &RecordId) -> Self {
        Self(format!("{}{}", KeyNamespace::Record.prefix(), id))
    }

    /// Key for a query result
    ///
    /// Parameter object keys are sorted at every depth so equivalent
    /// parameter sets produce the same key. Absent or empty parameters
    /// add no suffix.
    pub fn query(sql: &str, params: Option<&Value>) -> Self {
        let mut key = format!("{}{}", KeyNamespace::Query.prefix(), sql);

        if let Some(params) = params.filter(|p| !is_empty_params(p)) {
            key.push(':');
            key.push_str(&normalize(params).to_string());
        }

        Self(key)
    }

    /// Wrap a raw key string
    pub fn raw(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn starts_with(&self, prefix: &str) -> bool {
        self.0.starts_with(prefix)
    }

    /// Namespace of this key, if it has a known prefix
    pub fn namespace(&self) -> Option<KeyNamespace> {
        [KeyNamespace::Table, KeyNamespace::Record, KeyNamespace::Query]
            .into_iter()
            .find(|ns| self.starts_with(ns.prefix()))
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CacheKey {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for CacheKey {
    fn from(s: String) -> Self {
        Self(s)
    }
}

fn is_empty_params(params: &Value) -> bool {
    match params {
        Value::Null => true,
        Value::Object(map) => map.is_empty(),
        _ => false,
    }
}

/// Rebuild a JSON value with object keys in sorted order
fn normalize(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));

            let mut sorted = Map::new();
            for (k, v) in entries {
                sorted.insert(k.clone(), normalize(v));
            }
            Value::Object(sorted)
        }
        Value::Array(items) => Value::Array(items.iter().map(normalize).collect()),
        other => other.clone(),
    }
}

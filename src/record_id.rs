//! Typed SurrealDB record identifiers
//!
//! Record ids travel as `"table:id"` strings on the wire. They are parsed
//! once into a [`RecordId`] at the data-access boundary and carried typed
//! from there on.

use crate::error::StoreError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// A record identifier: the table name plus the id within that table
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RecordId {
    table: String,
    id: String,
}

impl RecordId {
    /// Create a record id from its parts
    ///
    /// Both parts must be non-empty and the table must not contain `:`.
    pub fn new(table: impl Into<String>, id: impl Into<String>) -> Result<Self, StoreError> {
        let table = table.into();
        let id = id.into();

        if table.is_empty() || table.contains(':') {
            return Err(StoreError::InvalidRecordId(format!("{}:{}", table, id)));
        }
        if id.is_empty() {
            return Err(StoreError::InvalidRecordId(format!("{}:", table)));
        }

        Ok(Self { table, id })
    }

    /// Table part
    pub fn table(&self) -> &str {
        &self.table
    }

    /// Id part, without any `⟨…⟩` escaping
    pub fn id(&self) -> &str {
        &self.id
    }

    fn needs_escaping(&self) -> bool {
        !self
            .id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_')
    }
}

impl FromStr for RecordId {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (table, raw_id) = s
            .split_once(':')
            .ok_or_else(|| StoreError::InvalidRecordId(s.to_string()))?;

        let id = raw_id
            .strip_prefix('⟨')
            .and_then(|rest| rest.strip_suffix('⟩'))
            .or_else(|| {
                raw_id
                    .strip_prefix('`')
                    .and_then(|rest| rest.strip_suffix('`'))
            })
            .unwrap_or(raw_id);

        RecordId::new(table, id).map_err(|_| StoreError::InvalidRecordId(s.to_string()))
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.needs_escaping() {
            write!(f, "{}:⟨{}⟩", self.table, self.id)
        } else {
            write!(f, "{}:{}", self.table, self.id)
        }
    }
}

impl Serialize for RecordId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for RecordId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

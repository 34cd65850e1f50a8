//! Document database boundary
//!
//! [`DocumentStore`] is the small set of operations the data layer needs
//! from SurrealDB. [`SurrealClient`] talks to a real server over its HTTP
//! API; [`MemoryStore`] keeps tables in process for tests and demos.

pub mod health;
pub mod memory;
pub mod surreal;

pub use health::{
    HealthCheckConfig, HealthCheckMetadata, HealthCheckMethod, HealthCheckResult, HealthStatus,
};
pub use memory::{MemoryStore, StoreCalls};
pub use surreal::{SurrealClient, SurrealConfig};

use crate::error::Result;
use crate::record_id::RecordId;
use async_trait::async_trait;
use serde_json::{Map, Value};

/// Named query parameters, bound as `$name`
pub type QueryParams = Map<String, Value>;

/// Operations on a remote document database
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Every record of `table`
    async fn select_table(&self, table: &str) -> Result<Vec<Value>>;

    /// One record, `None` if it does not exist
    async fn select_record(&self, id: &RecordId) -> Result<Option<Value>>;

    /// Run a query and return the rows of its final statement
    async fn query(&self, sql: &str, params: &QueryParams) -> Result<Vec<Value>>;

    /// Create a record in `table`; the backend assigns the id unless
    /// `data` carries one
    async fn create(&self, table: &str, data: Value) -> Result<Value>;

    /// Replace the content of a record
    async fn update(&self, id: &RecordId, data: Value) -> Result<Value>;

    /// Merge fields into a record
    async fn merge(&self, id: &RecordId, data: Value) -> Result<Value>;

    /// Delete a record
    async fn delete(&self, id: &RecordId) -> Result<()>;
}

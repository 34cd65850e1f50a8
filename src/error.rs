//! Error types for data-access operations
//!
//! This module defines the error type shared by the document stores, the
//! cached repository and the local persistence layer. It is `Clone` so a
//! single failed fetch can be handed unchanged to every coalesced caller.

use thiserror::Error;

/// Main error type for data-access operations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StoreError {
    /// Connection error - network or transport issues
    #[error("Connection error: {0}")]
    ConnectionError(String),

    /// Authentication error - rejected credentials or missing permissions
    #[error("Authentication error: {0}")]
    AuthenticationError(String),

    /// Query execution error reported by the database
    #[error("Query error: {0}")]
    QueryError(String),

    /// Operation timeout
    #[error("Operation timed out after {timeout_seconds}s: {context}")]
    TimeoutError {
        timeout_seconds: u64,
        context: String,
    },

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Serialization/Deserialization error
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// A record identifier that is not of the form `table:id`
    #[error("Invalid record id: {0}")]
    InvalidRecordId(String),

    /// Local persistence failure (favorites, settings)
    #[error("Storage error: {0}")]
    StorageError(String),

    /// Generic error with context
    #[error("Error: {0}")]
    Other(String),
}

/// Result type alias for data-access operations
pub type Result<T> = std::result::Result<T, StoreError>;

impl From<String> for StoreError {
    fn from(s: String) -> Self {
        StoreError::Other(s)
    }
}

impl From<&str> for StoreError {
    fn from(s: &str) -> Self {
        StoreError::Other(s.to_string())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        StoreError::SerializationError(e.to_string())
    }
}

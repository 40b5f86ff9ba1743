//! Table service error handling
//!
//! Typed errors raised by the table service and by client-side table
//! handles. These reach callers unchanged; nothing above this layer retries
//! or reclassifies them.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while talking to the table service
#[derive(Error, Debug)]
pub enum BackendError {
    /// Credentials were missing or rejected
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// The service could not be reached or opened
    #[error("Table service unavailable at '{path}': {source}")]
    Unavailable {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    /// Failed to create the service's data directory
    #[error("Failed to create data directory '{path}': {source}")]
    CreateDirectory {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// No table with this name in the catalog
    #[error("Table not found: '{0}'")]
    TableNotFound(String),

    /// A table with this name already exists
    #[error("Table already exists: '{0}'")]
    TableExists(String),

    /// Item operation attempted before the table's key schema was loaded
    #[error("Schema for table '{0}' has not been loaded. Request its hash key first.")]
    SchemaNotLoaded(String),

    /// Item does not carry the table's hash key
    #[error("Item for table '{table}' is missing its hash key attribute '{key}'")]
    MissingKey { table: String, key: String },

    /// Hash key value is not a string or number
    #[error("Hash key '{key}' of table '{table}' must be a string or number, got {found}")]
    InvalidKey {
        table: String,
        key: String,
        found: &'static str,
    },

    /// Update addressed the hash key attribute itself
    #[error("Cannot update hash key attribute '{key}' of table '{table}'")]
    KeyUpdate { table: String, key: String },

    /// Set update does not fit the stored attribute type
    #[error("Type mismatch on attribute '{attribute}': expected {expected}, found {found}")]
    TypeMismatch {
        attribute: String,
        expected: &'static str,
        found: &'static str,
    },

    /// Stored item could not be decoded
    #[error("Corrupt item in table '{table}': {source}")]
    CorruptItem {
        table: String,
        #[source]
        source: serde_json::Error,
    },

    /// SQLite database error
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// The service's connection lock was poisoned by a panicking caller
    #[error("Table service connection is poisoned")]
    Poisoned,
}

impl BackendError {
    /// Whether the error comes from the caller's request rather than the service
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            BackendError::TableNotFound(_)
                | BackendError::TableExists(_)
                | BackendError::SchemaNotLoaded(_)
                | BackendError::MissingKey { .. }
                | BackendError::InvalidKey { .. }
                | BackendError::KeyUpdate { .. }
                | BackendError::TypeMismatch { .. }
                | BackendError::Authentication(_)
        )
    }
}

/// Result type for table service operations
pub type BackendResult<T> = Result<T, BackendError>;

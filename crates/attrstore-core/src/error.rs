//! Errors returned by the persistence layer

use thiserror::Error;

use crate::storage::BackendError;

/// Errors from store and interface operations
///
/// Missing records are not errors; lookups return `None` or an empty list.
#[derive(Error, Debug)]
pub enum StoreError {
    /// The operation is part of the contract but has no implementation
    #[error("Operation not implemented: {operation}")]
    NotImplemented { operation: &'static str },

    /// The collection is not in the backend's table catalog
    #[error("Collection not found: '{0}'")]
    CollectionNotFound(String),

    /// Failure reported by the table service
    #[error(transparent)]
    Backend(#[from] BackendError),
}

impl StoreError {
    pub fn not_implemented(operation: &'static str) -> Self {
        StoreError::NotImplemented { operation }
    }
}

/// Result type for store and interface operations
pub type StoreResult<T> = Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_errors_are_transparent() {
        let err = StoreError::from(BackendError::TableNotFound("fruits".to_string()));
        assert_eq!(err.to_string(), "Table not found: 'fruits'");
    }

    #[test]
    fn test_not_implemented_names_operation() {
        let err = StoreError::not_implemented("delete_field");
        assert_eq!(err.to_string(), "Operation not implemented: delete_field");
    }
}

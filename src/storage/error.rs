//! This module contains the error types for the rule storage layer.

use thiserror::Error;

/// Errors that can occur in the rule storage layer.
#[derive(Error, Debug)]
pub enum StorageError {
    /// A general error occurred during a data store operation.
    #[error("A rule store operation failed: {0}")]
    OperationFailed(String),

    /// The requested rule was not found in the data store.
    #[error("The requested rule was not found: {0}")]
    NotFound(String),

    /// A stored row could not be decoded into a rule.
    #[error("Failed to decode a stored rule: {0}")]
    Decode(String),

    /// An error occurred during a database migration.
    #[error("A data migration failed: {0}")]
    Migration(String),
}

impl From<sqlx::Error> for StorageError {
    fn from(e: sqlx::Error) -> Self {
        match e {
            sqlx::Error::RowNotFound => StorageError::NotFound(e.to_string()),
            other => StorageError::OperationFailed(other.to_string()),
        }
    }
}

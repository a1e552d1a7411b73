//! Storage operation errors.

use thiserror::Error;

use crate::serialization::SerializationError;

/// Errors from the RocksDB backend.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Database failed to open.
    #[error("Failed to open database at '{path}': {message}")]
    OpenFailed {
        /// Database directory
        path: String,
        /// Underlying error text
        message: String,
    },

    /// Column family missing (never happens when the DB opened correctly).
    #[error("Column family '{name}' not found")]
    ColumnFamilyNotFound {
        /// The missing column family
        name: String,
    },

    /// Write operation failed.
    #[error("Write failed: {0}")]
    WriteFailed(String),

    /// Read operation failed.
    #[error("Read failed: {0}")]
    ReadFailed(String),

    /// Serialization or deserialization failed.
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<SerializationError> for StorageError {
    fn from(e: SerializationError) -> Self {
        StorageError::Serialization(e.to_string())
    }
}

/// Result type alias for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

//! Error types for storage operations.

use crate::collection::Collection;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The relational engine reported an error.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// The log file is corrupted.
    #[error("storage corrupted: {0}")]
    Corrupted(String),

    /// The backend has not been opened, or was closed.
    #[error("storage is closed")]
    Closed,

    /// Another process holds the store's directory lock.
    #[error("storage locked: another process has exclusive access to {}", path.display())]
    Locked {
        /// The locked store directory.
        path: PathBuf,
    },

    /// More than one row was found for an id that must be unique.
    #[error("duplicate record for {id:?} in collection {collection}")]
    DuplicateRecord {
        /// The collection that was searched.
        collection: Collection,
        /// The id with more than one row.
        id: String,
    },

    /// A namespaced key could not be split into collection and id.
    #[error("invalid key: {0}")]
    InvalidKey(String),
}

impl StorageError {
    /// Creates a corruption error.
    pub fn corrupted(message: impl Into<String>) -> Self {
        Self::Corrupted(message.into())
    }
}

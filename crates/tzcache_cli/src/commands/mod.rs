//! Command implementations.

pub mod bootstrap;
pub mod compact;
pub mod diff;
pub mod inspect;
pub mod query;
pub mod sync;

use crate::BackendKind;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tzcache_core::{Store, TzConfig};

/// SQLite file name inside the store directory.
pub const SQLITE_FILE: &str = "tzcache.db";

/// Errors reported by commands.
#[derive(Debug, Error)]
pub enum CliError {
    /// Store failure.
    #[error(transparent)]
    Core(#[from] tzcache_core::CoreError),

    /// Sync failure.
    #[error(transparent)]
    Sync(#[from] tzcache_sync_engine::SyncError),

    /// Primary failure.
    #[error(transparent)]
    Primary(#[from] tzcache_primary::PrimaryError),

    /// Wire format failure.
    #[error(transparent)]
    Protocol(#[from] tzcache_protocol::ProtocolError),

    /// File or console failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON output failure.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Bad argument value.
    #[error("{0}")]
    Usage(String),
}

/// Result type for commands.
pub type CliResult<T> = Result<T, CliError>;

/// Where the store lives and which engine reads it.
#[derive(Debug, Clone)]
pub struct StoreTarget {
    path: PathBuf,
    backend: BackendKind,
}

impl StoreTarget {
    /// Creates a target.
    pub fn new(path: PathBuf, backend: BackendKind) -> Self {
        Self { path, backend }
    }

    /// The store directory.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Opens the store with `config`.
    pub fn open(&self, config: TzConfig) -> Store {
        match self.backend {
            BackendKind::Log => Store::log(&self.path, config),
            BackendKind::Sqlite => Store::sqlite(&self.path.join(SQLITE_FILE), config),
        }
    }

    /// Opens the store for local reads and admin writes.
    pub fn open_local(&self) -> Store {
        self.open(TzConfig::new().with_source_id("tzcache-cli"))
    }
}

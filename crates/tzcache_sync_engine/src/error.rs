//! Error types for the sync engine.

use thiserror::Error;

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors that can occur during sync operations.
#[derive(Error, Debug)]
pub enum SyncError {
    /// Network or transport error.
    #[error("transport error: {message}")]
    Transport {
        /// Error message.
        message: String,
        /// Whether the operation can be retried.
        retryable: bool,
    },

    /// The primary answered with something the protocol does not allow.
    #[error("protocol error: {0}")]
    Protocol(#[from] tzcache_protocol::ProtocolError),

    /// The primary reported an internal failure.
    #[error("primary error: {0}")]
    ServerError(String),

    /// Store error during sync.
    #[error("store error: {0}")]
    Core(#[from] tzcache_core::CoreError),

    /// The refresh thread could not be started.
    #[error("scheduler error: {0}")]
    Scheduler(#[from] std::io::Error),

    /// No primary is configured for this store.
    #[error("no primary configured")]
    NotConfigured,
}

impl SyncError {
    /// Creates a retryable transport error.
    pub fn transport_retryable(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            retryable: true,
        }
    }

    /// Creates a non-retryable transport error.
    pub fn transport_fatal(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            retryable: false,
        }
    }

    /// Returns true if this error can be retried.
    pub fn is_retryable(&self) -> bool {
        match self {
            SyncError::Transport { retryable, .. } => *retryable,
            SyncError::ServerError(_) => true,
            _ => false,
        }
    }

    /// Returns true if the error came from the store rather than the primary.
    pub fn is_store_error(&self) -> bool {
        matches!(self, SyncError::Core(_))
    }
}

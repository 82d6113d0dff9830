//! Error types for TZCache core.

use std::io;
use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur in TZCache core operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Storage backend error.
    #[error("storage error: {0}")]
    Storage(#[from] tzcache_storage::StorageError),

    /// JSON codec error.
    #[error("codec error: {0}")]
    Codec(#[from] tzcache_codec::CodecError),

    /// I/O error outside the storage engine (dataset files).
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A diff entry disagrees with the store about whether its timezone
    /// exists.
    #[error("inconsistent diff for {tzid}: add={add} but the timezone {}", existence(.add))]
    InconsistentDiff {
        /// The offending timezone.
        tzid: String,
        /// The entry's `add` flag.
        add: bool,
    },

    /// A diff entry that changes the body carries none.
    #[error("diff entry for {tzid} has no timezone body")]
    MissingSpecBody {
        /// The offending timezone.
        tzid: String,
    },

    /// An alias report line could not be parsed.
    #[error("invalid alias report at line {line}: {message}")]
    InvalidAliasReport {
        /// 1-based line number.
        line: usize,
        /// What is wrong.
        message: String,
    },

    /// A bootstrap dataset is unusable.
    #[error("invalid dataset: {message}")]
    InvalidDataset {
        /// What is wrong.
        message: String,
    },
}

fn existence(add: &bool) -> &'static str {
    if *add {
        "already exists"
    } else {
        "does not exist"
    }
}

impl CoreError {
    /// Creates an invalid dataset error.
    pub fn invalid_dataset(message: impl Into<String>) -> Self {
        Self::InvalidDataset {
            message: message.into(),
        }
    }

    /// Returns `true` for errors raised by the storage engine.
    pub fn is_storage(&self) -> bool {
        matches!(self, Self::Storage(_))
    }
}

//! Error types for encoding and decoding.

use thiserror::Error;

/// Result type for codec operations.
pub type CodecResult<T> = Result<T, CodecError>;

/// Errors that can occur during encoding or decoding.
#[derive(Debug, Error)]
pub enum CodecError {
    /// The document is not valid JSON for the target type.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// A timestamp did not match any accepted format.
    #[error("invalid dtstamp: {0:?}")]
    InvalidDtstamp(String),

    /// A stored document carries a different id than the key it was read from.
    #[error("document id mismatch: expected {expected:?}, found {found:?}")]
    IdMismatch {
        /// The key the document was stored under.
        expected: String,
        /// The id inside the document.
        found: String,
    },
}

impl CodecError {
    /// Creates an invalid-dtstamp error.
    pub fn invalid_dtstamp(value: impl Into<String>) -> Self {
        Self::InvalidDtstamp(value.into())
    }
}

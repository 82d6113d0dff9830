//! Protocol errors.

use thiserror::Error;

/// Result type for protocol operations.
pub type ProtocolResult<T> = Result<T, ProtocolError>;

/// Errors raised while building or reading protocol messages.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// A message body is not valid JSON for its type.
    #[error("malformed message: {0}")]
    Json(#[from] serde_json::Error),

    /// A request path does not name a known resource.
    #[error("unknown request path: {0}")]
    UnknownPath(String),

    /// A response body is not UTF-8 text.
    #[error("response body is not UTF-8")]
    NotUtf8,

    /// A response carried a status the protocol does not define.
    #[error("unexpected HTTP status {status} for {path}")]
    UnexpectedStatus {
        /// The status code.
        status: u16,
        /// The request path.
        path: String,
    },
}

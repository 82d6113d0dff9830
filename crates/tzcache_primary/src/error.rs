//! Error types for the primary.

use thiserror::Error;

/// Result type for primary operations.
pub type PrimaryResult<T> = Result<T, PrimaryError>;

/// Errors that can occur while answering a request.
#[derive(Error, Debug)]
pub enum PrimaryError {
    /// The request could not be understood.
    #[error("invalid request: {0}")]
    InvalidRequest(#[from] tzcache_protocol::ProtocolError),

    /// A response could not be produced.
    #[error("internal error: {0}")]
    Internal(String),

    /// The local store failed.
    #[error("store error: {0}")]
    Store(#[from] tzcache_core::CoreError),
}

impl PrimaryError {
    /// Returns true if this is a client error (4xx).
    pub fn is_client_error(&self) -> bool {
        matches!(self, PrimaryError::InvalidRequest(_))
    }

    /// The HTTP status for this error.
    pub fn status(&self) -> u16 {
        if self.is_client_error() {
            tzcache_protocol::http::STATUS_BAD_REQUEST
        } else {
            tzcache_protocol::http::STATUS_INTERNAL_ERROR
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tzcache_protocol::ProtocolError;

    #[test]
    fn status_codes() {
        let err = PrimaryError::from(ProtocolError::UnknownPath("/x".into()));
        assert!(err.is_client_error());
        assert_eq!(err.status(), 400);

        let err = PrimaryError::from(tzcache_core::CoreError::invalid_dataset("x"));
        assert_eq!(err.status(), 500);
    }
}

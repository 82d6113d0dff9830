//! Transport-neutral HTTP response.

use crate::error::{ProtocolError, ProtocolResult};

/// Status: OK.
pub const STATUS_OK: u16 = 200;
/// Status: not modified.
pub const STATUS_NOT_MODIFIED: u16 = 304;
/// Status: bad request.
pub const STATUS_BAD_REQUEST: u16 = 400;
/// Status: not found.
pub const STATUS_NOT_FOUND: u16 = 404;
/// Status: internal error.
pub const STATUS_INTERNAL_ERROR: u16 = 500;

/// The parts of an HTTP response the protocol reads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    /// Status code.
    pub status: u16,
    /// `ETag` header, unquoted.
    pub etag: Option<String>,
    /// Body bytes.
    pub body: Vec<u8>,
}

impl HttpResponse {
    /// A 200 response.
    pub fn ok(body: impl Into<Vec<u8>>) -> Self {
        Self {
            status: STATUS_OK,
            etag: None,
            body: body.into(),
        }
    }

    /// Sets the etag.
    #[must_use]
    pub fn with_etag(mut self, etag: impl Into<String>) -> Self {
        self.etag = Some(etag.into());
        self
    }

    /// A response with no body.
    pub fn empty(status: u16) -> Self {
        Self {
            status,
            etag: None,
            body: Vec::new(),
        }
    }

    /// A response with a plain text message.
    pub fn message(status: u16, message: impl Into<String>) -> Self {
        Self {
            status,
            etag: None,
            body: message.into().into_bytes(),
        }
    }

    /// Returns the body as text.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::NotUtf8`] if the body is not UTF-8.
    pub fn text(&self) -> ProtocolResult<&str> {
        std::str::from_utf8(&self.body).map_err(|_| ProtocolError::NotUtf8)
    }
}

/// Strips surrounding quotes and a weak prefix from an `ETag` header value.
#[must_use]
pub fn unquote_etag(value: &str) -> &str {
    let value = value.trim();
    let value = value.strip_prefix("W/").unwrap_or(value);
    value
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
        .unwrap_or(value)
}

/// Quotes an etag for an `ETag` or `If-None-Match` header.
#[must_use]
pub fn quote_etag(etag: &str) -> String {
    format!("\"{etag}\"")
}

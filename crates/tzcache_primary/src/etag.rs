//! Content-derived etags.

use sha2::{Digest, Sha256};
use std::fmt::Write;

/// Returns the lowercase hex SHA-256 of `body`.
pub fn content_etag(body: &str) -> String {
    let digest = Sha256::digest(body.as_bytes());
    let mut hex = String::with_capacity(digest.len() * 2);
    for byte in digest {
        let _ = write!(hex, "{byte:02x}");
    }
    hex
}

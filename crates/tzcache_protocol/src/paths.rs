//! Request paths of the HTTP mapping.
//!
//! - `GET /zones?changedsince=T` lists changes
//! - `GET /zones/{tzid}` fetches one definition
//!
//! Each tzid segment is percent-encoded separately so `America/New_York`
//! stays a readable two-segment path.

use crate::error::{ProtocolError, ProtocolResult};

/// Root of every request path.
pub const ZONES: &str = "/zones";

/// Query parameter carrying the sync token.
pub const CHANGED_SINCE: &str = "changedsince";

/// A decoded request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PrimaryRequest {
    /// List changes since the given token.
    List {
        /// The token, if any.
        changed_since: Option<String>,
    },
    /// Fetch one timezone.
    Fetch {
        /// The timezone id.
        tzid: String,
    },
}

/// Path for a change list request.
#[must_use]
pub fn list_path(changed_since: Option<&str>) -> String {
    match changed_since {
        Some(token) => format!(
            "{ZONES}?{CHANGED_SINCE}={}",
            urlencoding::encode(token)
        ),
        None => ZONES.to_string(),
    }
}

/// Path for a fetch request.
#[must_use]
pub fn zone_path(tzid: &str) -> String {
    let encoded: Vec<_> = tzid.split('/').map(urlencoding::encode).collect();
    format!("{ZONES}/{}", encoded.join("/"))
}

/// Decodes a request path (with optional query string).
///
/// # Errors
///
/// Returns [`ProtocolError::UnknownPath`] for anything outside `/zones`.
pub fn parse_path(path: &str) -> ProtocolResult<PrimaryRequest> {
    let unknown = || ProtocolError::UnknownPath(path.to_string());
    let (route, query) = match path.split_once('?') {
        Some((route, query)) => (route, Some(query)),
        None => (path, None),
    };

    let rest = route.strip_prefix(ZONES).ok_or_else(unknown)?;
    if rest.is_empty() || rest == "/" {
        let changed_since = query
            .into_iter()
            .flat_map(|q| q.split('&'))
            .filter_map(|pair| pair.split_once('='))
            .find(|(name, _)| *name == CHANGED_SINCE)
            .map(|(_, value)| decode(value, path))
            .transpose()?
            .filter(|value| !value.is_empty());
        return Ok(PrimaryRequest::List { changed_since });
    }

    let rest = rest.strip_prefix('/').ok_or_else(unknown)?;
    let segments = rest
        .split('/')
        .map(|segment| decode(segment, path))
        .collect::<ProtocolResult<Vec<_>>>()?;
    if segments.iter().any(String::is_empty) {
        return Err(unknown());
    }
    Ok(PrimaryRequest::Fetch {
        tzid: segments.join("/"),
    })
}

fn decode(value: &str, path: &str) -> ProtocolResult<String> {
    urlencoding::decode(value)
        .map(|decoded| decoded.into_owned())
        .map_err(|_| ProtocolError::UnknownPath(path.to_string()))
}

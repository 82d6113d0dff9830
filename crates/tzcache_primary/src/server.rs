//! Request handling for a primary.

use crate::error::{PrimaryError, PrimaryResult};
use crate::etag::content_etag;
use std::sync::Arc;
use tracing::{debug, error};
use tzcache_codec::{format_dtstamp, now_dtstamp, parse_dtstamp, TimezoneSpec};
use tzcache_core::{AliasGraph, Store};
use tzcache_protocol::http::{unquote_etag, STATUS_NOT_FOUND, STATUS_NOT_MODIFIED};
use tzcache_protocol::paths::parse_path;
use tzcache_protocol::{ChangeEntry, ChangeList, FetchResult, HttpResponse, LocalName, PrimaryRequest};

/// Serves the change list and zone bodies of a store.
///
/// # Example
///
/// ```rust,ignore
/// use std::sync::Arc;
/// use tzcache_core::{Store, TzConfig};
/// use tzcache_primary::PrimaryServer;
///
/// let store = Arc::new(Store::in_memory(TzConfig::new().with_is_primary(true)));
/// let server = PrimaryServer::new(store);
/// let list = server.handle_list(None)?;
/// ```
pub struct PrimaryServer {
    store: Arc<Store>,
}

impl PrimaryServer {
    /// Creates a server over `store`.
    pub fn new(store: Arc<Store>) -> Self {
        Self { store }
    }

    /// Returns the store.
    pub fn store(&self) -> &Arc<Store> {
        &self.store
    }

    /// Lists active timezones changed since `changed_since`.
    ///
    /// An entry is listed when its dtstamp is strictly later than
    /// `changed_since`. Everything is listed when the parameter is absent or
    /// does not parse as a dtstamp. The returned sync token is the stored one,
    /// or the current time when the store has none.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    pub fn handle_list(&self, changed_since: Option<&str>) -> PrimaryResult<ChangeList> {
        let threshold = changed_since.and_then(|value| match parse_dtstamp(value) {
            Ok(stamp) => Some(stamp),
            Err(_) => {
                debug!(changed_since = value, "unparsable changedsince, listing everything");
                None
            }
        });

        let session = self.store.session()?;
        let graph = AliasGraph::build(&session)?;
        let token = session
            .sync_token()?
            .unwrap_or_else(|| format_dtstamp(&now_dtstamp()));

        let entries: Vec<ChangeEntry> = session
            .specs()?
            .into_iter()
            .filter(|spec| spec.active)
            .filter(|spec| match (threshold, spec.dtstamp) {
                (None, _) => true,
                (Some(since), Some(stamp)) => stamp > since,
                (Some(_), None) => false,
            })
            .map(|spec| change_entry(&graph, spec))
            .collect();

        debug!(entries = entries.len(), token = %token, "answered change list");
        Ok(ChangeList::new(token, entries))
    }

    /// Returns the body of `tzid`, unless `etag` already matches it.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    pub fn handle_fetch(&self, tzid: &str, etag: Option<&str>) -> PrimaryResult<FetchResult> {
        let session = self.store.session()?;
        let Some(spec) = session.get_spec(tzid)?.filter(|spec| spec.active) else {
            return Ok(FetchResult::NotFound);
        };
        let Some(body) = spec.vtimezone else {
            return Ok(FetchResult::NotFound);
        };

        let current = spec.etag.unwrap_or_else(|| content_etag(&body));
        if etag == Some(current.as_str()) {
            return Ok(FetchResult::Unchanged);
        }
        Ok(FetchResult::modified(current, body))
    }

    /// Answers a GET of one of the protocol paths.
    ///
    /// Unknown paths get 400 and store failures 500.
    pub fn handle_get(&self, path: &str, if_none_match: Option<&str>) -> HttpResponse {
        match self.route(path, if_none_match) {
            Ok(response) => response,
            Err(err) => {
                if err.is_client_error() {
                    debug!(path, error = %err, "rejected request");
                } else {
                    error!(path, error = %err, "request failed");
                }
                HttpResponse::message(err.status(), err.to_string())
            }
        }
    }

    fn route(&self, path: &str, if_none_match: Option<&str>) -> PrimaryResult<HttpResponse> {
        match parse_path(path)? {
            PrimaryRequest::List { changed_since } => {
                let list = self.handle_list(changed_since.as_deref())?;
                let body = list
                    .encode()
                    .map_err(|e| PrimaryError::Internal(e.to_string()))?;
                Ok(HttpResponse::ok(body))
            }
            PrimaryRequest::Fetch { tzid } => {
                let response = match self.handle_fetch(&tzid, if_none_match.map(unquote_etag))? {
                    FetchResult::Modified { etag, body } => {
                        let response = HttpResponse::ok(body);
                        match etag {
                            Some(etag) => response.with_etag(etag),
                            None => response,
                        }
                    }
                    FetchResult::Unchanged => {
                        let mut response = HttpResponse::empty(STATUS_NOT_MODIFIED);
                        response.etag = if_none_match.map(|v| unquote_etag(v).to_string());
                        response
                    }
                    FetchResult::NotFound => {
                        HttpResponse::message(STATUS_NOT_FOUND, format!("no such timezone: {tzid}"))
                    }
                };
                Ok(response)
            }
        }
    }
}

fn change_entry(graph: &AliasGraph, spec: TimezoneSpec) -> ChangeEntry {
    let mut entry = ChangeEntry::new(spec.tzid.as_str()).with_aliases(graph.aliases_of(&spec.tzid));
    entry.last_modified = spec.dtstamp;
    entry.local_names = spec
        .display_names
        .as_deref()
        .unwrap_or_default()
        .iter()
        .map(LocalName::from)
        .collect();
    entry
}

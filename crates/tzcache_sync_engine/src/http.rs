//! HTTP transport implementation.
//!
//! This module provides an HTTP-based [`PrimarySource`]. The actual HTTP
//! client is abstracted via a trait so the engine can run over `reqwest`
//! in production and over an in-process loopback in tests.

use crate::config::SyncConfig;
use crate::error::{SyncError, SyncResult};
use crate::transport::PrimarySource;
use parking_lot::RwLock;
use tracing::{debug, warn};
use tzcache_protocol::http::{
    quote_etag, unquote_etag, STATUS_NOT_FOUND, STATUS_NOT_MODIFIED, STATUS_OK,
};
use tzcache_protocol::paths::{list_path, zone_path, ZONES};
use tzcache_protocol::{ChangeList, FetchResult, HttpResponse, ProtocolError};

/// HTTP client abstraction.
///
/// Implement this trait to provide the actual HTTP transport.
pub trait HttpClient: Send + Sync {
    /// Sends a GET request, with an `If-None-Match` header when `if_none_match`
    /// is set. `Err` means no response was received at all.
    fn get(&self, url: &str, if_none_match: Option<&str>) -> Result<HttpResponse, String>;
}

/// A primary reached over HTTP.
pub struct HttpPrimary<C: HttpClient> {
    /// Base URL of the primary (e.g., "https://tz.example.com/api").
    base_url: String,
    /// HTTP client implementation.
    client: C,
    /// Last error message.
    last_error: RwLock<Option<String>>,
}

impl<C: HttpClient> HttpPrimary<C> {
    /// Creates a new HTTP primary.
    pub fn new(base_url: impl Into<String>, client: C) -> Self {
        let base_url = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
            last_error: RwLock::new(None),
        }
    }

    /// Returns the base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Returns the last error message.
    pub fn last_error(&self) -> Option<String> {
        self.last_error.read().clone()
    }

    fn send(&self, path: &str, if_none_match: Option<&str>) -> SyncResult<HttpResponse> {
        let url = format!("{}{}", self.base_url, path);
        debug!(%url, "GET");
        match self.client.get(&url, if_none_match) {
            Ok(response) => {
                *self.last_error.write() = None;
                Ok(response)
            }
            Err(e) => {
                warn!(%url, error = %e, "primary request failed");
                *self.last_error.write() = Some(e.clone());
                Err(SyncError::transport_retryable(e))
            }
        }
    }

    fn unexpected(&self, response: &HttpResponse, path: &str) -> SyncError {
        let message = String::from_utf8_lossy(&response.body).into_owned();
        *self.last_error.write() = Some(format!("HTTP {}: {}", response.status, message));
        if response.status >= 500 {
            SyncError::ServerError(format!("HTTP {} for {path}: {message}", response.status))
        } else {
            ProtocolError::UnexpectedStatus {
                status: response.status,
                path: path.to_string(),
            }
            .into()
        }
    }
}

impl<C: HttpClient> PrimarySource for HttpPrimary<C> {
    fn list(&self, changed_since: Option<&str>) -> SyncResult<ChangeList> {
        let path = list_path(changed_since);
        let response = self.send(&path, None)?;
        if response.status != STATUS_OK {
            return Err(self.unexpected(&response, &path));
        }
        Ok(ChangeList::decode(&response.body)?)
    }

    fn fetch(&self, tzid: &str, etag: Option<&str>) -> SyncResult<FetchResult> {
        let path = zone_path(tzid);
        let header = etag.map(quote_etag);
        let response = self.send(&path, header.as_deref())?;
        match response.status {
            STATUS_OK => Ok(FetchResult::Modified {
                body: response.text()?.to_string(),
                etag: response.etag,
            }),
            STATUS_NOT_MODIFIED => Ok(FetchResult::Unchanged),
            STATUS_NOT_FOUND => Ok(FetchResult::NotFound),
            _ => Err(self.unexpected(&response, &path)),
        }
    }
}

impl<C: HttpClient> std::fmt::Debug for HttpPrimary<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpPrimary")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

/// [`HttpClient`] backed by a blocking `reqwest` client.
#[derive(Debug, Clone)]
pub struct ReqwestClient {
    client: reqwest::blocking::Client,
}

impl ReqwestClient {
    /// Builds a client from the sync configuration.
    ///
    /// # Errors
    ///
    /// Returns a fatal transport error if the TLS backend cannot be set up.
    pub fn new(config: &SyncConfig) -> SyncResult<Self> {
        let mut builder = reqwest::blocking::Client::builder().user_agent(config.user_agent.clone());
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| SyncError::transport_fatal(e.to_string()))?;
        Ok(Self { client })
    }
}

impl HttpClient for ReqwestClient {
    fn get(&self, url: &str, if_none_match: Option<&str>) -> Result<HttpResponse, String> {
        let mut request = self.client.get(url);
        if let Some(etag) = if_none_match {
            request = request.header(reqwest::header::IF_NONE_MATCH, etag);
        }
        let response = request.send().map_err(|e| e.to_string())?;

        let status = response.status().as_u16();
        let etag = response
            .headers()
            .get(reqwest::header::ETAG)
            .and_then(|value| value.to_str().ok())
            .map(|value| unquote_etag(value).to_string());
        let body = response.bytes().map_err(|e| e.to_string())?.to_vec();

        Ok(HttpResponse { status, etag, body })
    }
}

/// A loopback HTTP client that routes requests directly to a primary.
///
/// Useful for testing without actual network overhead.
pub struct LoopbackClient<S: LoopbackServer> {
    server: S,
}

impl<S: LoopbackServer> LoopbackClient<S> {
    /// Creates a new loopback client connected to the given server.
    pub fn new(server: S) -> Self {
        Self { server }
    }
}

/// Trait for servers that can handle loopback requests.
pub trait LoopbackServer: Send + Sync {
    /// Handles a GET of `path` (with query string) and returns the response.
    fn handle_get(&self, path: &str, if_none_match: Option<&str>) -> HttpResponse;
}

impl<S: LoopbackServer> HttpClient for LoopbackClient<S> {
    fn get(&self, url: &str, if_none_match: Option<&str>) -> Result<HttpResponse, String> {
        let path = url.find(ZONES).map(|i| &url[i..]).unwrap_or(url);
        Ok(self.server.handle_get(path, if_none_match))
    }
}

//! Access to the primary authority.

use crate::error::{SyncError, SyncResult};
use parking_lot::Mutex;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tzcache_protocol::{ChangeList, FetchResult};

/// A primary authority for timezone definitions.
///
/// This trait abstracts the network layer, allowing for different
/// implementations (HTTP, an in-process primary, a mock for testing).
pub trait PrimarySource: Send + Sync {
    /// Lists timezones changed since `changed_since` (everything when `None`).
    fn list(&self, changed_since: Option<&str>) -> SyncResult<ChangeList>;

    /// Fetches one definition unless `etag` is still current.
    fn fetch(&self, tzid: &str, etag: Option<&str>) -> SyncResult<FetchResult>;
}

impl<P: PrimarySource + ?Sized> PrimarySource for Arc<P> {
    fn list(&self, changed_since: Option<&str>) -> SyncResult<ChangeList> {
        (**self).list(changed_since)
    }

    fn fetch(&self, tzid: &str, etag: Option<&str>) -> SyncResult<FetchResult> {
        (**self).fetch(tzid, etag)
    }
}

#[derive(Debug, Default)]
struct MockState {
    change_list: Option<ChangeList>,
    zones: BTreeMap<String, (String, String)>,
    failing: BTreeSet<String>,
    unreachable: bool,
    list_calls: Vec<Option<String>>,
    fetch_calls: Vec<(String, Option<String>)>,
}

/// A scripted primary for testing.
#[derive(Debug, Default)]
pub struct MockPrimary {
    state: Mutex<MockState>,
}

impl MockPrimary {
    /// Creates a mock with no zones and no change list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the response to every `list` call.
    pub fn set_change_list(&self, list: ChangeList) {
        self.state.lock().change_list = Some(list);
    }

    /// Publishes a zone under `etag`.
    pub fn set_zone(&self, tzid: &str, etag: &str, body: &str) {
        self.state
            .lock()
            .zones
            .insert(tzid.to_string(), (etag.to_string(), body.to_string()));
    }

    /// Withdraws a zone, so fetching it answers `NotFound`.
    pub fn remove_zone(&self, tzid: &str) {
        self.state.lock().zones.remove(tzid);
    }

    /// Makes every fetch of `tzid` fail with a transport error.
    pub fn fail_fetch(&self, tzid: &str) {
        self.state.lock().failing.insert(tzid.to_string());
    }

    /// Lets every previously failing fetch succeed again.
    pub fn clear_fetch_failures(&self) {
        self.state.lock().failing.clear();
    }

    /// Simulates the primary going down or coming back.
    pub fn set_reachable(&self, reachable: bool) {
        self.state.lock().unreachable = !reachable;
    }

    /// The `changed_since` argument of every `list` call so far.
    pub fn list_calls(&self) -> Vec<Option<String>> {
        self.state.lock().list_calls.clone()
    }

    /// The arguments of every `fetch` call so far.
    pub fn fetch_calls(&self) -> Vec<(String, Option<String>)> {
        self.state.lock().fetch_calls.clone()
    }
}

impl PrimarySource for MockPrimary {
    fn list(&self, changed_since: Option<&str>) -> SyncResult<ChangeList> {
        let mut state = self.state.lock();
        state.list_calls.push(changed_since.map(str::to_string));
        if state.unreachable {
            return Err(SyncError::transport_retryable("primary unreachable"));
        }
        state
            .change_list
            .clone()
            .ok_or_else(|| SyncError::ServerError("no change list scripted".into()))
    }

    fn fetch(&self, tzid: &str, etag: Option<&str>) -> SyncResult<FetchResult> {
        let mut state = self.state.lock();
        state
            .fetch_calls
            .push((tzid.to_string(), etag.map(str::to_string)));
        if state.unreachable || state.failing.contains(tzid) {
            return Err(SyncError::transport_retryable(format!("fetch of {tzid} failed")));
        }
        Ok(match state.zones.get(tzid) {
            Some((current, _)) if Some(current.as_str()) == etag => FetchResult::Unchanged,
            Some((current, body)) => FetchResult::modified(current.clone(), body.clone()),
            None => FetchResult::NotFound,
        })
    }
}

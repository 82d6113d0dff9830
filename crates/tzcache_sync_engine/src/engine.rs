//! Pull sync from a primary.
//!
//! One cycle:
//!
//! 1. `list(changedSince = stored token)`
//! 2. advance the token (before or after merging, per [`TokenPolicy`])
//! 3. build the alias graph once
//! 4. for every listed entry: conditional fetch, upsert the spec, reconcile
//!    its aliases
//!
//! Entries are independent: a failed fetch skips that entry only, and earlier
//! entries are never rolled back. A failed `list` ends the cycle without
//! touching the store. Store errors abort the cycle and propagate.

use crate::config::SyncConfig;
use crate::error::{SyncError, SyncResult};
use crate::transport::PrimarySource;
use parking_lot::RwLock;
use std::fmt;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use tzcache_codec::{whole_seconds, LocalizedName, TimezoneSpec};
use tzcache_core::{AliasChanges, AliasGraph, Session, TokenPolicy};
use tzcache_protocol::{ChangeEntry, ChangeList, FetchResult};

/// The current state of the sync engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    /// Engine is idle, not syncing.
    Idle,
    /// Engine is asking the primary for changes.
    Listing,
    /// Engine is fetching and merging entries.
    Merging,
    /// Engine has completed a sync cycle.
    Synced,
    /// The last cycle failed.
    Error,
}

impl SyncState {
    /// Returns true if a cycle is in progress.
    pub fn is_active(&self) -> bool {
        matches!(self, SyncState::Listing | SyncState::Merging)
    }
}

/// Outcome of the last cycle, as reported to operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStatus {
    /// The cycle completed.
    Success,
    /// The cycle failed.
    Failed,
}

impl SyncStatus {
    /// Returns `"Success"` or `"Failed"`.
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncStatus::Success => "Success",
            SyncStatus::Failed => "Failed",
        }
    }
}

impl fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Statistics about sync operations.
#[derive(Debug, Clone, Default)]
pub struct SyncStats {
    /// Cycles run, successful or not.
    pub cycles: u64,
    /// Cycles that failed.
    pub failures: u64,
    /// Entries returned by `list`.
    pub entries_listed: u64,
    /// Fetches that returned a body.
    pub fetches: u64,
    /// Fetches answered `Unchanged`.
    pub unchanged: u64,
    /// Listed entries the primary then reported missing.
    pub missing: u64,
    /// Fetches that failed in transport.
    pub fetch_failures: u64,
    /// Specs written.
    pub specs_written: u64,
    /// Alias records written.
    pub aliases_written: u64,
    /// Alias records deleted.
    pub aliases_deleted: u64,
    /// Retries of the `list` call.
    pub retries: u64,
    /// Status of the last cycle.
    pub last_status: Option<SyncStatus>,
    /// Last error message.
    pub last_error: Option<String>,
    /// When the last cycle finished.
    pub last_sync_time: Option<Instant>,
}

impl SyncStats {
    /// Returns the last status as text, `"Never"` before the first cycle.
    pub fn last_status_str(&self) -> &'static str {
        self.last_status.map_or("Never", |s| s.as_str())
    }
}

/// Result of one sync cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncOutcome {
    /// Whether the cycle completed.
    pub success: bool,
    /// The cycle did nothing because this node does not pull.
    pub not_applicable: bool,
    /// Entries returned by `list`.
    pub entries_listed: u64,
    /// Fetches that returned a body.
    pub fetched: u64,
    /// Fetches answered `Unchanged`.
    pub unchanged: u64,
    /// Listed entries the primary reported missing.
    pub missing: u64,
    /// Fetches that failed in transport.
    pub fetch_failures: u64,
    /// Specs written.
    pub specs_written: u64,
    /// Alias mutations.
    pub aliases: AliasChanges,
    /// The token stored by this cycle, if it changed.
    pub token_advanced: Option<String>,
    /// Why the cycle failed.
    pub error: Option<String>,
    /// Wall time of the cycle.
    pub duration: Duration,
}

impl SyncOutcome {
    fn not_applicable() -> Self {
        Self {
            success: true,
            not_applicable: true,
            ..Self::default()
        }
    }

    /// Number of store mutations made by the cycle.
    pub fn mutations(&self) -> u64 {
        self.specs_written
            + self.aliases.written
            + self.aliases.deleted
            + u64::from(self.token_advanced.is_some())
    }

    /// The status reported for this cycle.
    pub fn status(&self) -> SyncStatus {
        if self.success {
            SyncStatus::Success
        } else {
            SyncStatus::Failed
        }
    }
}

/// The sync engine pulls changes from one primary into a store.
pub struct SyncEngine<P: PrimarySource> {
    config: SyncConfig,
    primary: P,
    state: RwLock<SyncState>,
    stats: RwLock<SyncStats>,
}

impl<P: PrimarySource> SyncEngine<P> {
    /// Creates an engine with the default configuration.
    pub fn new(primary: P) -> Self {
        Self::with_config(SyncConfig::default(), primary)
    }

    /// Creates an engine.
    pub fn with_config(config: SyncConfig, primary: P) -> Self {
        Self {
            config,
            primary,
            state: RwLock::new(SyncState::Idle),
            stats: RwLock::new(SyncStats::default()),
        }
    }

    /// Returns the primary.
    pub fn primary(&self) -> &P {
        &self.primary
    }

    /// Returns the engine configuration.
    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Returns the current state.
    pub fn state(&self) -> SyncState {
        *self.state.read()
    }

    /// Returns a copy of the statistics.
    pub fn stats(&self) -> SyncStats {
        self.stats.read().clone()
    }

    /// Runs one cycle against `session`.
    ///
    /// Returns `Ok` with `success == false` if the primary could not be
    /// listed; nothing was written in that case.
    ///
    /// # Errors
    ///
    /// Returns a store error raised while merging. Entries merged before the
    /// error stay merged; whether the token advanced depends on the policy.
    pub fn synchronize_from_primary(&self, session: &mut Session<'_>) -> SyncResult<SyncOutcome> {
        let config = session.config();
        if !config.pulls_from_primary() {
            debug!(is_primary = config.is_primary, "no primary to pull from");
            return Ok(SyncOutcome::not_applicable());
        }

        let start = Instant::now();
        let mut outcome = SyncOutcome::default();
        let result = self.run_cycle(session, &mut outcome);
        outcome.duration = start.elapsed();

        match result {
            Ok(completed) => {
                outcome.success = completed;
                *self.state.write() = if completed {
                    SyncState::Synced
                } else {
                    SyncState::Error
                };
                self.record(&outcome);
                Ok(outcome)
            }
            Err(err) => {
                outcome.success = false;
                outcome.error = Some(err.to_string());
                *self.state.write() = SyncState::Error;
                self.record(&outcome);
                warn!(error = %err, "sync cycle aborted");
                Err(err)
            }
        }
    }

    /// Records a cycle that failed before a session could be opened.
    pub fn record_failed_cycle(&self, error: impl Into<String>) {
        let outcome = SyncOutcome {
            error: Some(error.into()),
            ..SyncOutcome::default()
        };
        *self.state.write() = SyncState::Error;
        self.record(&outcome);
    }

    fn run_cycle(&self, session: &mut Session<'_>, outcome: &mut SyncOutcome) -> SyncResult<bool> {
        let config = session.config();
        let source = config.primary_url.clone().ok_or(SyncError::NotConfigured)?;
        let policy = config.token_policy;

        *self.state.write() = SyncState::Listing;
        let stored = session.sync_token()?;
        let list = match self.list_with_retry(stored.as_deref()) {
            Ok(list) => list,
            Err(err) => {
                warn!(primary = %source, error = %err, "failed to list changes");
                outcome.error = Some(err.to_string());
                return Ok(false);
            }
        };
        outcome.entries_listed = list.entries.len() as u64;
        debug!(
            token = %list.sync_token,
            entries = list.entries.len(),
            "primary listed changes"
        );

        let advance = stored.as_deref() != Some(list.sync_token.as_str());
        if advance && policy == TokenPolicy::AdvanceBeforeMerge {
            self.advance_token(session, &list, outcome)?;
        }

        *self.state.write() = SyncState::Merging;
        let mut graph = AliasGraph::build(session)?;
        for entry in &list.entries {
            self.merge_entry(session, &mut graph, entry, &source, outcome)?;
        }

        if advance && policy == TokenPolicy::AdvanceAfterMerge {
            if outcome.fetch_failures == 0 {
                self.advance_token(session, &list, outcome)?;
            } else {
                warn!(
                    failed = outcome.fetch_failures,
                    "keeping previous token so skipped entries are listed again"
                );
            }
        }

        info!(
            listed = outcome.entries_listed,
            fetched = outcome.fetched,
            unchanged = outcome.unchanged,
            missing = outcome.missing,
            failed = outcome.fetch_failures,
            aliases_written = outcome.aliases.written,
            aliases_deleted = outcome.aliases.deleted,
            "sync cycle complete"
        );
        Ok(true)
    }

    fn advance_token(
        &self,
        session: &mut Session<'_>,
        list: &ChangeList,
        outcome: &mut SyncOutcome,
    ) -> SyncResult<()> {
        session.set_sync_token(&list.sync_token)?;
        outcome.token_advanced = Some(list.sync_token.clone());
        Ok(())
    }

    fn list_with_retry(&self, changed_since: Option<&str>) -> SyncResult<ChangeList> {
        let retry = &self.config.retry;
        let attempts = retry.max_attempts.max(1);
        let mut attempt = 0;
        loop {
            match self.primary.list(changed_since) {
                Ok(list) => return Ok(list),
                Err(err) if err.is_retryable() && attempt + 1 < attempts => {
                    attempt += 1;
                    let delay = retry.delay_for_attempt(attempt);
                    debug!(attempt, ?delay, error = %err, "retrying list");
                    self.stats.write().retries += 1;
                    std::thread::sleep(delay);
                }
                Err(err) => return Err(err),
            }
        }
    }

    fn merge_entry(
        &self,
        session: &mut Session<'_>,
        graph: &mut AliasGraph,
        entry: &ChangeEntry,
        source: &str,
        outcome: &mut SyncOutcome,
    ) -> SyncResult<()> {
        let existing = session.get_spec(&entry.tzid)?;
        let etag = existing.as_ref().and_then(|spec| spec.etag.as_deref());

        let (new_etag, body) = match self.primary.fetch(&entry.tzid, etag) {
            Ok(FetchResult::Modified { etag, body }) => (etag, body),
            Ok(FetchResult::Unchanged) => {
                debug!(tzid = %entry.tzid, "unchanged");
                outcome.unchanged += 1;
                return Ok(());
            }
            Ok(FetchResult::NotFound) => {
                warn!(tzid = %entry.tzid, "listed by primary but not found");
                outcome.missing += 1;
                return Ok(());
            }
            Err(err) if err.is_store_error() => return Err(err),
            Err(err) => {
                warn!(tzid = %entry.tzid, error = %err, "fetch failed, skipping entry");
                outcome.fetch_failures += 1;
                return Ok(());
            }
        };
        outcome.fetched += 1;

        let mut spec = existing.unwrap_or_else(|| TimezoneSpec::new(entry.tzid.clone()));
        spec.vtimezone = Some(body);
        spec.etag = new_etag;
        spec.dtstamp = entry.last_modified.map(whole_seconds);
        spec.source = Some(source.to_string());
        spec.active = true;
        if !entry.local_names.is_empty() {
            spec.replace_display_names(entry.local_names.iter().cloned().map(LocalizedName::from));
        }
        session.put_spec(&spec)?;
        outcome.specs_written += 1;
        debug!(tzid = %entry.tzid, etag = ?spec.etag, "spec updated");

        let changes = graph.reconcile(session, &entry.tzid, &entry.aliases)?;
        outcome.aliases.absorb(changes);
        Ok(())
    }

    fn record(&self, outcome: &SyncOutcome) {
        let mut stats = self.stats.write();
        stats.cycles += 1;
        if !outcome.success {
            stats.failures += 1;
        }
        stats.entries_listed += outcome.entries_listed;
        stats.fetches += outcome.fetched;
        stats.unchanged += outcome.unchanged;
        stats.missing += outcome.missing;
        stats.fetch_failures += outcome.fetch_failures;
        stats.specs_written += outcome.specs_written;
        stats.aliases_written += outcome.aliases.written;
        stats.aliases_deleted += outcome.aliases.deleted;
        stats.last_status = Some(outcome.status());
        stats.last_error = outcome.error.clone();
        stats.last_sync_time = Some(Instant::now());
    }
}

impl<P: PrimarySource> fmt::Debug for SyncEngine<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyncEngine")
            .field("state", &self.state())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RetryConfig;
    use crate::transport::MockPrimary;
    use pretty_assertions::assert_eq;
    use tzcache_codec::{AliasRecord, LocalizedName};
    use tzcache_core::{Store, TzConfig};
    use tzcache_protocol::ChangeEntry;

    fn config() -> TzConfig {
        TzConfig::new().with_primary_url("mock://primary")
    }

    fn engine() -> SyncEngine<MockPrimary> {
        SyncEngine::with_config(
            SyncConfig::new().with_retry(RetryConfig::no_retry()),
            MockPrimary::new(),
        )
    }

    fn scenario_t1(engine: &SyncEngine<MockPrimary>) {
        let primary = engine.primary();
        primary.set_change_list(ChangeList::new(
            "T1",
            vec![
                ChangeEntry::new("X"),
                ChangeEntry::new("Y")
                    .with_aliases(["Z"])
                    .with_local_name("en", "Why"),
            ],
        ));
        primary.set_zone("X", "EX", "BODY-X");
        primary.set_zone("Y", "EY", "BODY-Y");
    }

    #[test]
    fn primary_nodes_do_not_pull() {
        let store = Store::in_memory(config().with_is_primary(true));
        let engine = engine();
        let mut session = store.session().unwrap();

        let outcome = engine.synchronize_from_primary(&mut session).unwrap();
        assert!(outcome.success);
        assert!(outcome.not_applicable);
        assert!(engine.primary().list_calls().is_empty());

        let unconfigured = Store::in_memory(TzConfig::new());
        let mut session = unconfigured.session().unwrap();
        assert!(engine.synchronize_from_primary(&mut session).unwrap().not_applicable);
    }

    #[test]
    fn first_sync_populates_store() {
        let store = Store::in_memory(config());
        let engine = engine();
        scenario_t1(&engine);

        let mut session = store.session().unwrap();
        let outcome = engine.synchronize_from_primary(&mut session).unwrap();

        assert!(outcome.success);
        assert_eq!(outcome.fetched, 2);
        assert_eq!(outcome.specs_written, 2);
        assert_eq!(outcome.aliases.written, 1);
        assert_eq!(outcome.token_advanced.as_deref(), Some("T1"));

        let y = session.get_spec("Y").unwrap().unwrap();
        assert_eq!(y.etag.as_deref(), Some("EY"));
        assert_eq!(y.vtimezone.as_deref(), Some("BODY-Y"));
        assert_eq!(y.source.as_deref(), Some("mock://primary"));
        assert_eq!(y.display_names, Some(vec![LocalizedName::new("en", "Why")]));
        assert!(session.get_spec("X").unwrap().is_some());
        assert_eq!(
            session.get_alias("Z").unwrap(),
            Some(AliasRecord::with_targets("Z", ["Y"]))
        );
        assert_eq!(session.sync_token().unwrap().as_deref(), Some("T1"));
        assert_eq!(engine.primary().list_calls(), vec![None]);
    }

    #[test]
    fn second_sync_with_no_changes_mutates_nothing() {
        let store = Store::in_memory(config());
        let engine = engine();
        scenario_t1(&engine);
        {
            let mut session = store.session().unwrap();
            engine.synchronize_from_primary(&mut session).unwrap();
        }

        engine.primary().set_change_list(ChangeList::new("T1", vec![]));
        let before = store.stats().snapshot();
        let graph_before = AliasGraph::build(&store.session().unwrap()).unwrap();

        let mut session = store.session().unwrap();
        let outcome = engine.synchronize_from_primary(&mut session).unwrap();
        assert!(outcome.success);
        assert_eq!(outcome.mutations(), 0);
        assert_eq!(store.stats().snapshot().mutations(), before.mutations());
        assert_eq!(AliasGraph::build(&session).unwrap(), graph_before);
        assert_eq!(
            engine.primary().list_calls().last().cloned().flatten().as_deref(),
            Some("T1")
        );
    }

    #[test]
    fn conditional_fetch_leaves_spec_untouched() {
        let store = Store::in_memory(config());
        let engine = engine();
        let original = TimezoneSpec::new("X").with_etag("E1").with_vtimezone("OLD");
        store.session().unwrap().put_spec(&original).unwrap();

        engine
            .primary()
            .set_change_list(ChangeList::new("T2", vec![ChangeEntry::new("X")]));
        engine.primary().set_zone("X", "E1", "NEW");

        let mut session = store.session().unwrap();
        let outcome = engine.synchronize_from_primary(&mut session).unwrap();
        assert_eq!(outcome.unchanged, 1);
        assert_eq!(outcome.specs_written, 0);
        assert_eq!(session.get_spec("X").unwrap(), Some(original));
        assert_eq!(
            engine.primary().fetch_calls(),
            vec![("X".to_string(), Some("E1".to_string()))]
        );
    }

    #[test]
    fn alias_reconciliation_removes_unreported() {
        let store = Store::in_memory(config());
        {
            let mut session = store.session().unwrap();
            session.put_spec(&TimezoneSpec::new("X").with_etag("old")).unwrap();
            session.put_alias(&AliasRecord::with_targets("a1", ["X"])).unwrap();
            session
                .put_alias(&AliasRecord::with_targets("a2", ["X", "W"]))
                .unwrap();
            session.put_alias(&AliasRecord::with_targets("a3", ["X"])).unwrap();
            session.put_alias(&AliasRecord::with_targets("a4", ["X"])).unwrap();
        }

        let engine = engine();
        engine.primary().set_change_list(ChangeList::new(
            "T3",
            vec![ChangeEntry::new("X").with_aliases(["a1", "a3"])],
        ));
        engine.primary().set_zone("X", "new", "BODY");

        let mut session = store.session().unwrap();
        engine.synchronize_from_primary(&mut session).unwrap();

        assert_eq!(
            session.get_alias("a2").unwrap(),
            Some(AliasRecord::with_targets("a2", ["W"]))
        );
        assert_eq!(session.get_alias("a4").unwrap(), None);
        assert_eq!(
            AliasGraph::build(&session).unwrap().report(),
            "a1=X\na2=W\na3=X\n"
        );
    }

    #[test]
    fn unreachable_primary_fails_without_mutation() {
        let store = Store::in_memory(config());
        let engine = engine();
        engine.primary().set_reachable(false);

        let mut session = store.session().unwrap();
        let outcome = engine.synchronize_from_primary(&mut session).unwrap();
        assert!(!outcome.success);
        assert_eq!(outcome.status().as_str(), "Failed");
        assert_eq!(store.stats().writes(), 0);

        let stats = engine.stats();
        assert_eq!(stats.failures, 1);
        assert_eq!(stats.last_status_str(), "Failed");
        assert!(stats.last_error.unwrap().contains("unreachable"));
        assert_eq!(engine.state(), SyncState::Error);
    }

    #[test]
    fn failed_fetch_skips_only_that_entry() {
        let store = Store::in_memory(config());
        let engine = engine();
        scenario_t1(&engine);
        engine.primary().fail_fetch("X");
        engine.primary().remove_zone("Y");
        engine.primary().set_change_list(ChangeList::new(
            "T1",
            vec![
                ChangeEntry::new("X"),
                ChangeEntry::new("Y"),
                ChangeEntry::new("Q"),
            ],
        ));
        engine.primary().set_zone("Q", "EQ", "BODY-Q");

        let mut session = store.session().unwrap();
        let outcome = engine.synchronize_from_primary(&mut session).unwrap();
        assert!(outcome.success);
        assert_eq!(outcome.fetch_failures, 1);
        assert_eq!(outcome.missing, 1);
        assert_eq!(outcome.fetched, 1);
        assert!(session.get_spec("Q").unwrap().is_some());
        assert!(session.get_spec("X").unwrap().is_none());
    }

    #[test]
    fn after_merge_holds_token_while_fetches_fail() {
        let store = Store::in_memory(config().with_token_policy(TokenPolicy::AdvanceAfterMerge));
        let engine = engine();
        scenario_t1(&engine);
        engine.primary().fail_fetch("X");

        let mut session = store.session().unwrap();
        let outcome = engine.synchronize_from_primary(&mut session).unwrap();
        assert!(outcome.success);
        assert_eq!(outcome.fetch_failures, 1);
        assert_eq!(outcome.token_advanced, None);
        assert_eq!(session.sync_token().unwrap(), None);
        assert!(session.get_spec("Y").unwrap().is_some());

        engine.primary().clear_fetch_failures();
        let outcome = engine.synchronize_from_primary(&mut session).unwrap();
        assert_eq!(outcome.fetch_failures, 0);
        assert_eq!(engine.primary().list_calls(), vec![None, None]);
        assert!(session.get_spec("X").unwrap().is_some());
        assert_eq!(session.sync_token().unwrap().as_deref(), Some("T1"));
    }

    #[test]
    fn before_merge_advances_past_failed_fetches() {
        let store = Store::in_memory(config());
        let engine = engine();
        scenario_t1(&engine);
        engine.primary().fail_fetch("X");

        let mut session = store.session().unwrap();
        let outcome = engine.synchronize_from_primary(&mut session).unwrap();
        assert_eq!(outcome.fetch_failures, 1);
        assert_eq!(session.sync_token().unwrap().as_deref(), Some("T1"));
    }

    #[test]
    fn fractional_last_modified_is_stored_in_whole_seconds() {
        use chrono::TimeZone;

        let store = Store::in_memory(config());
        let engine = engine();
        let stamp = chrono::Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        engine.primary().set_change_list(ChangeList::new(
            "T1",
            vec![ChangeEntry::new("X")
                .with_last_modified(stamp + chrono::Duration::nanoseconds(123_456_789))],
        ));
        engine.primary().set_zone("X", "EX", "BODY-X");

        let mut session = store.session().unwrap();
        engine.synchronize_from_primary(&mut session).unwrap();
        let spec = session.get_spec("X").unwrap().unwrap();
        assert_eq!(spec.dtstamp, Some(stamp));
    }

    #[test]
    fn list_is_retried_when_configured() {
        let store = Store::in_memory(config());
        let engine = SyncEngine::with_config(
            SyncConfig::new().with_retry(
                RetryConfig::new(3)
                    .with_initial_delay(Duration::from_millis(1))
                    .without_jitter(),
            ),
            MockPrimary::new(),
        );
        engine.primary().set_reachable(false);

        let mut session = store.session().unwrap();
        let outcome = engine.synchronize_from_primary(&mut session).unwrap();
        assert!(!outcome.success);
        assert_eq!(engine.primary().list_calls().len(), 3);
        assert_eq!(engine.stats().retries, 2);
    }

    #[test]
    fn display_names_kept_when_not_reported() {
        let store = Store::in_memory(config());
        let mut existing = TimezoneSpec::new("X").with_etag("old");
        existing.replace_display_names([LocalizedName::new("de", "Iks")]);
        store.session().unwrap().put_spec(&existing).unwrap();

        let engine = engine();
        engine
            .primary()
            .set_change_list(ChangeList::new("T4", vec![ChangeEntry::new("X")]));
        engine.primary().set_zone("X", "new", "BODY");

        let mut session = store.session().unwrap();
        engine.synchronize_from_primary(&mut session).unwrap();
        let spec = session.get_spec("X").unwrap().unwrap();
        assert_eq!(spec.display_name("de"), Some("Iks"));
        assert_eq!(spec.etag.as_deref(), Some("new"));
    }
}

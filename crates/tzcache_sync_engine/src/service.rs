//! The read and administration surface of a timezone cache.

use crate::engine::{SyncEngine, SyncStats};
use crate::error::SyncResult;
use crate::scheduler::RefreshScheduler;
use crate::transport::PrimarySource;
use chrono::{DateTime, Utc};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::debug;
use tzcache_codec::TimezoneSpec;
use tzcache_core::{AliasGraph, DiffOutcome, Store, StoreStatsSnapshot};
use tzcache_protocol::DiffListEntry;

/// Counters of a service.
#[derive(Debug, Clone)]
pub struct ServiceStats {
    /// Store counters.
    pub store: StoreStatsSnapshot,
    /// Sync counters and last status.
    pub sync: SyncStats,
}

/// A store, its sync engine and (once started) its refresh thread.
pub struct TzService<P: PrimarySource + 'static> {
    store: Arc<Store>,
    engine: Arc<SyncEngine<P>>,
    scheduler: Option<RefreshScheduler>,
}

impl<P: PrimarySource + 'static> TzService<P> {
    /// Creates a service. No refresh thread runs until [`Self::start_refresh`].
    pub fn new(store: Arc<Store>, engine: SyncEngine<P>) -> Self {
        Self {
            store,
            engine: Arc::new(engine),
            scheduler: None,
        }
    }

    /// Starts the refresh thread, if it is not already running.
    ///
    /// # Errors
    ///
    /// Returns an error if the thread cannot be spawned.
    pub fn start_refresh(&mut self) -> SyncResult<()> {
        if self.scheduler.is_none() {
            self.scheduler = Some(RefreshScheduler::start(
                Arc::clone(&self.store),
                Arc::clone(&self.engine),
            )?);
        }
        Ok(())
    }

    /// Stops the refresh thread.
    pub fn shutdown(&mut self) {
        if let Some(scheduler) = self.scheduler.take() {
            scheduler.stop();
        }
    }

    /// Returns the store.
    pub fn store(&self) -> &Arc<Store> {
        &self.store
    }

    /// Returns the sync engine.
    pub fn engine(&self) -> &SyncEngine<P> {
        &self.engine
    }

    /// Looks up a timezone definition.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    pub fn get_spec(&self, tzid: &str) -> SyncResult<Option<TimezoneSpec>> {
        let session = self.store.session()?;
        Ok(session.get_spec(tzid)?)
    }

    /// Returns the targets of an alias.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    pub fn get_aliased_targets(&self, alias_id: &str) -> SyncResult<Option<BTreeSet<String>>> {
        let session = self.store.session()?;
        Ok(session.get_alias(alias_id)?.map(|record| record.target_ids))
    }

    /// Finds tzids by substring of their id or of an alias.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    pub fn find_ids(&self, pattern: &str) -> SyncResult<BTreeSet<String>> {
        let session = self.store.session()?;
        Ok(tzcache_core::find_ids(&session, pattern)?)
    }

    /// Renders every alias as `alias=target1,target2` lines.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    pub fn get_aliases_report(&self) -> SyncResult<String> {
        let session = self.store.session()?;
        Ok(AliasGraph::build(&session)?.report())
    }

    /// Returns the stored sync token.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    pub fn get_sync_token(&self) -> SyncResult<Option<String>> {
        let session = self.store.session()?;
        Ok(session.sync_token()?)
    }

    /// Runs a sync cycle now and returns whether it succeeded.
    ///
    /// With a running refresh thread the cycle runs there; otherwise it runs
    /// on the calling thread.
    ///
    /// # Errors
    ///
    /// Without a refresh thread, returns any store error from the cycle.
    pub fn refresh_now(&self) -> SyncResult<bool> {
        if let Some(scheduler) = &self.scheduler {
            return Ok(scheduler.refresh_now());
        }
        let mut session = self.store.session()?;
        Ok(self.engine.synchronize_from_primary(&mut session)?.success)
    }

    /// Wakes the refresh thread. Does nothing if none is running.
    pub fn check_now(&self) {
        match &self.scheduler {
            Some(scheduler) => scheduler.check_now(),
            None => debug!("check requested with no refresh thread"),
        }
    }

    /// Applies an administrative diff batch.
    ///
    /// # Errors
    ///
    /// Returns `InconsistentDiff` or any store error; see
    /// [`tzcache_core::apply_diff`].
    pub fn apply_diff(
        &self,
        dtstamp: DateTime<Utc>,
        entries: &[DiffListEntry],
    ) -> SyncResult<DiffOutcome> {
        let mut session = self.store.session()?;
        Ok(tzcache_core::apply_diff(&mut session, dtstamp, entries)?)
    }

    /// Returns a snapshot of the counters.
    pub fn stats(&self) -> ServiceStats {
        ServiceStats {
            store: self.store.stats().snapshot(),
            sync: self.engine.stats(),
        }
    }
}

impl<P: PrimarySource + 'static> Drop for TzService<P> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{RetryConfig, SyncConfig};
    use crate::transport::MockPrimary;
    use chrono::TimeZone;
    use tzcache_codec::AliasRecord;
    use tzcache_core::{CoreError, TzConfig};
    use tzcache_protocol::{ChangeEntry, ChangeList};

    fn service() -> TzService<MockPrimary> {
        let store = Arc::new(Store::in_memory(
            TzConfig::new().with_primary_url("mock://primary"),
        ));
        let engine = SyncEngine::with_config(
            SyncConfig::new().with_retry(RetryConfig::no_retry()),
            MockPrimary::new(),
        );
        TzService::new(store, engine)
    }

    #[test]
    fn reads_after_inline_refresh() {
        let service = service();
        service.engine().primary().set_change_list(ChangeList::new(
            "T1",
            vec![ChangeEntry::new("America/NY").with_aliases(["AmNY"])],
        ));
        service.engine().primary().set_zone("America/NY", "E1", "BODY");

        assert!(service.refresh_now().unwrap());
        assert!(service.get_spec("America/NY").unwrap().is_some());
        assert_eq!(
            service.get_aliased_targets("AmNY").unwrap(),
            Some(BTreeSet::from(["America/NY".to_string()]))
        );
        assert!(service.find_ids("a").unwrap().contains("America/NY"));
        assert_eq!(service.get_aliases_report().unwrap(), "AmNY=America/NY\n");
        assert_eq!(service.get_sync_token().unwrap().as_deref(), Some("T1"));

        let stats = service.stats();
        assert_eq!(stats.sync.cycles, 1);
        assert_eq!(stats.sync.last_status_str(), "Success");
        assert!(stats.store.writes > 0);
    }

    #[test]
    fn refresh_through_scheduler() {
        let mut service = service();
        service
            .engine()
            .primary()
            .set_change_list(ChangeList::new("T1", vec![]));
        service.start_refresh().unwrap();
        assert!(service.refresh_now().unwrap());
        service.check_now();
        service.shutdown();
    }

    #[test]
    fn apply_diff_surfaces_inconsistency() {
        let service = service();
        let stamp = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        service
            .apply_diff(stamp, &[DiffListEntry::added("X", "BEGIN:VTIMEZONE\r\nEND:VTIMEZONE")])
            .unwrap();

        let err = service
            .apply_diff(stamp, &[DiffListEntry::added("X", "BEGIN:VTIMEZONE\r\nEND:VTIMEZONE")])
            .unwrap_err();
        assert!(matches!(
            err,
            crate::SyncError::Core(CoreError::InconsistentDiff { add: true, .. })
        ));
    }

    #[test]
    fn missing_alias_is_none() {
        let service = service();
        {
            let mut session = service.store().session().unwrap();
            session.put_alias(&AliasRecord::with_targets("a", ["X"])).unwrap();
        }
        assert!(service.get_aliased_targets("b").unwrap().is_none());
        assert!(service.get_aliased_targets("a").unwrap().is_some());
    }
}

//! Integration tests for the sync engine against a real primary.

use pretty_assertions::assert_eq;
use proptest::prelude::*;
use std::sync::Arc;
use tzcache_codec::{format_dtstamp, TimezoneSpec};
use tzcache_core::{AliasGraph, Store, TokenPolicy, TzConfig};
use tzcache_primary::PrimaryServer;
use tzcache_protocol::{ChangeEntry, ChangeList, DiffListEntry, FetchResult, HttpResponse};
use tzcache_storage::Collection;
use tzcache_sync_engine::{
    HttpPrimary, LoopbackClient, LoopbackServer, MockPrimary, PrimarySource, RetryConfig,
    SyncConfig, SyncEngine, SyncError, SyncResult, TzService,
};
use tzcache_testkit::{
    alias_records, calendar, january, vtimezone, zone_set_strategy, DatasetBuilder, FlakyBackend,
    TestStore,
};

const PRIMARY_URL: &str = "http://primary.test";

/// Routes loopback HTTP requests to an in-process primary.
struct Loopback(Arc<PrimaryServer>);

impl LoopbackServer for Loopback {
    fn handle_get(&self, path: &str, if_none_match: Option<&str>) -> HttpResponse {
        self.0.handle_get(path, if_none_match)
    }
}

/// Calls the primary handlers directly, skipping HTTP.
struct InProcess(Arc<PrimaryServer>);

impl PrimarySource for InProcess {
    fn list(&self, changed_since: Option<&str>) -> SyncResult<ChangeList> {
        self.0
            .handle_list(changed_since)
            .map_err(|e| SyncError::ServerError(e.to_string()))
    }

    fn fetch(&self, tzid: &str, etag: Option<&str>) -> SyncResult<FetchResult> {
        self.0
            .handle_fetch(tzid, etag)
            .map_err(|e| SyncError::ServerError(e.to_string()))
    }
}

type LoopbackPrimary = HttpPrimary<LoopbackClient<Loopback>>;

fn sync_config() -> SyncConfig {
    SyncConfig::new().with_retry(RetryConfig::no_retry())
}

fn secondary_config() -> TzConfig {
    TzConfig::new()
        .with_source_id("secondary")
        .with_primary_url(PRIMARY_URL)
}

fn primary_store() -> Arc<Store> {
    Arc::new(Store::in_memory(TzConfig::new().with_is_primary(true)))
}

fn loopback_engine(server: &Arc<PrimaryServer>) -> SyncEngine<LoopbackPrimary> {
    let client = LoopbackClient::new(Loopback(Arc::clone(server)));
    SyncEngine::with_config(sync_config(), HttpPrimary::new(PRIMARY_URL, client))
}

fn bootstrapped_primary() -> (Arc<PrimaryServer>, DatasetBuilder) {
    let dataset = DatasetBuilder::new()
        .zone("America/New_York")
        .zone("Europe/Paris")
        .zone("UTC")
        .aliases("US/Eastern=America/New_York\nEtc/UTC=UTC\nZulu=UTC\n")
        .version("2024-01-01T00:00:00Z");

    let store = primary_store();
    {
        let mut session = store.session().unwrap();
        tzcache_core::bootstrap(&mut session, dataset.path()).unwrap();
    }
    (Arc::new(PrimaryServer::new(store)), dataset)
}

fn contents(store: &Store) -> (Vec<String>, String, Option<String>) {
    let session = store.session().unwrap();
    let ids = session.spec_ids().unwrap();
    let report = AliasGraph::build(&session).unwrap().report();
    (ids, report, session.sync_token().unwrap())
}

#[test]
fn secondary_mirrors_bootstrapped_primary_over_loopback() {
    let (server, _dataset) = bootstrapped_primary();
    let engine = loopback_engine(&server);

    for secondary in TestStore::all(secondary_config()) {
        let outcome = {
            let mut session = secondary.session().unwrap();
            engine.synchronize_from_primary(&mut session).unwrap()
        };
        assert!(outcome.success);
        assert_eq!(outcome.specs_written, 3);
        assert_eq!(outcome.aliases.written, 3);

        assert_eq!(contents(&secondary), contents(server.store()));

        let session = secondary.session().unwrap();
        let utc = session.get_spec("UTC").unwrap().unwrap();
        assert_eq!(utc.vtimezone.as_deref(), Some(calendar("UTC").as_str()));
        assert_eq!(utc.source.as_deref(), Some(PRIMARY_URL));
        assert_eq!(utc.dtstamp, Some(january(1)));
        assert_eq!(utc.etag.map(|e| e.len()), Some(64));
    }
}

#[test]
fn second_sync_is_a_no_op() {
    let (server, _dataset) = bootstrapped_primary();
    let engine = loopback_engine(&server);
    let secondary = TestStore::log(secondary_config());

    let mut session = secondary.session().unwrap();
    engine.synchronize_from_primary(&mut session).unwrap();
    let again = engine.synchronize_from_primary(&mut session).unwrap();

    assert!(again.success);
    assert_eq!(again.entries_listed, 0);
    assert_eq!(again.mutations(), 0);
    assert_eq!(again.token_advanced, None);
}

#[test]
fn primary_diff_reaches_secondary() {
    let (server, _dataset) = bootstrapped_primary();
    let engine = loopback_engine(&server);
    let secondary = TestStore::sqlite(secondary_config());
    {
        let mut session = secondary.session().unwrap();
        engine.synchronize_from_primary(&mut session).unwrap();
    }

    {
        let mut session = server.store().session().unwrap();
        tzcache_core::apply_diff(
            &mut session,
            january(5),
            &[
                DiffListEntry::updated("Europe/Paris", vtimezone_with("Europe/Paris", "+0100"))
                    .with_aliases(["Europe/Monaco"]),
                DiffListEntry::added("Asia/Tokyo", vtimezone("Asia/Tokyo")),
            ],
        )
        .unwrap();
    }

    let outcome = {
        let mut session = secondary.session().unwrap();
        engine.synchronize_from_primary(&mut session).unwrap()
    };
    assert_eq!(outcome.entries_listed, 2);
    assert_eq!(outcome.token_advanced.as_deref(), Some("2024-01-05T00:00:00Z"));

    assert_eq!(contents(&secondary), contents(server.store()));
    let session = secondary.session().unwrap();
    assert_eq!(
        session.get_alias("Europe/Monaco").unwrap().map(|r| r.target_ids.len()),
        Some(1)
    );
    assert!(session
        .get_spec("Europe/Paris")
        .unwrap()
        .unwrap()
        .vtimezone
        .unwrap()
        .contains("+0100"));
}

fn vtimezone_with(tzid: &str, offset: &str) -> String {
    tzcache_testkit::vtimezone_with_offset(tzid, offset)
}

#[test]
fn alias_only_diffs_are_not_relisted() {
    let (server, _dataset) = bootstrapped_primary();
    let engine = loopback_engine(&server);
    let secondary = TestStore::memory(secondary_config());
    let mut session = secondary.session().unwrap();
    engine.synchronize_from_primary(&mut session).unwrap();

    {
        let mut primary = server.store().session().unwrap();
        tzcache_core::apply_diff(
            &mut primary,
            january(6),
            &[DiffListEntry::alias_change("UTC").with_aliases(["Zulu"])],
        )
        .unwrap();
    }

    let outcome = engine.synchronize_from_primary(&mut session).unwrap();
    assert_eq!(outcome.entries_listed, 0);
    assert_eq!(outcome.token_advanced.as_deref(), Some("2024-01-06T00:00:00Z"));
    assert!(session.get_alias("Etc/UTC").unwrap().is_some());
}

#[test]
fn relisted_zones_are_fetched_conditionally() {
    let (server, _dataset) = bootstrapped_primary();
    let engine = loopback_engine(&server);
    let secondary = TestStore::memory(secondary_config());

    let mut session = secondary.session().unwrap();
    engine.synchronize_from_primary(&mut session).unwrap();
    session.set_sync_token("2023-12-31T00:00:00Z").unwrap();

    let outcome = engine.synchronize_from_primary(&mut session).unwrap();
    assert_eq!(outcome.entries_listed, 3);
    assert_eq!(outcome.unchanged, 3);
    assert_eq!(outcome.specs_written, 0);
    assert_eq!(outcome.token_advanced.as_deref(), Some("2024-01-01T00:00:00Z"));
}

#[test]
fn in_process_and_loopback_agree() {
    let (server, _dataset) = bootstrapped_primary();
    let direct = SyncEngine::with_config(sync_config(), InProcess(Arc::clone(&server)));
    let http = loopback_engine(&server);

    let a = TestStore::memory(secondary_config());
    let b = TestStore::memory(secondary_config());
    direct
        .synchronize_from_primary(&mut a.session().unwrap())
        .unwrap();
    http.synchronize_from_primary(&mut b.session().unwrap())
        .unwrap();

    assert_eq!(contents(&a), contents(&b));
}

#[test]
fn service_refreshes_in_background() {
    let (server, _dataset) = bootstrapped_primary();
    let secondary = TestStore::memory(secondary_config());
    let mut service = TzService::new(secondary.shared(), loopback_engine(&server));

    service.start_refresh().unwrap();
    assert!(service.refresh_now().unwrap());
    assert_eq!(
        service.get_sync_token().unwrap().as_deref(),
        Some("2024-01-01T00:00:00Z")
    );
    assert!(service.find_ids("Zulu").unwrap().contains("UTC"));
    assert_eq!(service.stats().sync.last_status_str(), "Success");
    service.shutdown();
}

fn flaky_secondary(policy: TokenPolicy) -> (Store, tzcache_testkit::FaultSwitch) {
    let backend = FlakyBackend::new(Collection::Specs);
    let switch = backend.switch();
    let store = Store::new(backend, secondary_config().with_token_policy(policy));
    (store, switch)
}

fn scripted_engine() -> SyncEngine<MockPrimary> {
    let engine = SyncEngine::with_config(sync_config(), MockPrimary::new());
    engine.primary().set_change_list(ChangeList::new(
        "T1",
        vec![ChangeEntry::new("X"), ChangeEntry::new("Y")],
    ));
    engine.primary().set_zone("X", "EX", "BODY-X");
    engine.primary().set_zone("Y", "EY", "BODY-Y");
    engine
}

#[test]
fn token_advances_before_a_failed_merge() {
    let (store, switch) = flaky_secondary(TokenPolicy::AdvanceBeforeMerge);
    let engine = scripted_engine();
    switch.set(true);

    let mut session = store.session().unwrap();
    let err = engine.synchronize_from_primary(&mut session).unwrap_err();
    assert!(err.is_store_error());
    assert!(switch.tripped() > 0);
    assert_eq!(session.sync_token().unwrap().as_deref(), Some("T1"));
    assert_eq!(engine.stats().last_status_str(), "Failed");
}

#[test]
fn token_waits_for_merge_when_configured() {
    let (store, switch) = flaky_secondary(TokenPolicy::AdvanceAfterMerge);
    let engine = scripted_engine();
    switch.set(true);

    let mut session = store.session().unwrap();
    assert!(engine.synchronize_from_primary(&mut session).is_err());
    assert_eq!(session.sync_token().unwrap(), None);

    switch.set(false);
    let outcome = engine.synchronize_from_primary(&mut session).unwrap();
    assert!(outcome.success);
    assert_eq!(outcome.specs_written, 2);
    assert_eq!(session.sync_token().unwrap().as_deref(), Some("T1"));
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn secondary_converges_to_any_primary(zones in zone_set_strategy()) {
        let primary = primary_store();
        {
            let mut session = primary.session().unwrap();
            for tzid in zones.keys() {
                let spec = TimezoneSpec::new(tzid.as_str())
                    .with_vtimezone(calendar(tzid))
                    .with_dtstamp(january(2));
                session.put_spec(&spec).unwrap();
            }
            for record in alias_records(&zones) {
                session.put_alias(&record).unwrap();
            }
            session.set_sync_token(&format_dtstamp(&january(2))).unwrap();
        }
        let server = Arc::new(PrimaryServer::new(primary));
        let engine = loopback_engine(&server);

        let secondary = TestStore::memory(secondary_config());
        {
            let mut session = secondary.session().unwrap();
            let outcome = engine.synchronize_from_primary(&mut session).unwrap();
            prop_assert!(outcome.success);
            prop_assert_eq!(outcome.specs_written, zones.len() as u64);
        }
        prop_assert_eq!(contents(&secondary), contents(server.store()));
    }
}

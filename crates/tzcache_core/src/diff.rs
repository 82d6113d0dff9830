//! Administrative diff batches.

use crate::alias::{AliasChanges, AliasGraph};
use crate::error::{CoreError, CoreResult};
use crate::store::Session;
use chrono::{DateTime, Utc};
use tracing::{debug, info};
use tzcache_codec::{calendar::wrap_vtimezone, format_dtstamp, whole_seconds, TimezoneSpec};
use tzcache_protocol::DiffListEntry;

/// Counts from one applied diff batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiffOutcome {
    /// Timezones created.
    pub specs_created: u64,
    /// Timezones whose body was replaced.
    pub specs_updated: u64,
    /// Alias mutations.
    pub aliases: AliasChanges,
    /// The sync token stored at the end of the batch.
    pub sync_token: String,
}

/// Applies `entries` in order and then stores `dtstamp` as the sync token.
///
/// One alias graph is built up front and shared by the whole batch. An entry
/// whose `add` flag disagrees with the store stops the batch: entries before
/// it stay applied, it and the rest are untouched, and the token is not
/// advanced.
///
/// # Errors
///
/// Returns [`CoreError::InconsistentDiff`] as described above, or any
/// storage or codec error.
pub fn apply_diff(
    session: &mut Session<'_>,
    dtstamp: DateTime<Utc>,
    entries: &[DiffListEntry],
) -> CoreResult<DiffOutcome> {
    let dtstamp = whole_seconds(dtstamp);
    let mut graph = AliasGraph::build(session)?;
    let mut outcome = DiffOutcome::default();
    let source = session.config().source_id.clone();

    for entry in entries {
        if !entry.alias_change_only {
            let existing = session.get_spec(&entry.tzid)?;
            if entry.add == existing.is_some() {
                return Err(CoreError::InconsistentDiff {
                    tzid: entry.tzid.clone(),
                    add: entry.add,
                });
            }
            let fragment = entry.tz_spec.as_deref().ok_or_else(|| CoreError::MissingSpecBody {
                tzid: entry.tzid.clone(),
            })?;

            let mut spec = existing.unwrap_or_else(|| TimezoneSpec::new(entry.tzid.clone()));
            spec.vtimezone = Some(wrap_vtimezone(fragment));
            // The body changed, so any etag from a primary no longer describes it.
            spec.etag = None;
            spec.dtstamp = Some(dtstamp);
            spec.source = Some(source.clone());
            spec.active = true;
            session.put_spec(&spec)?;

            if entry.add {
                outcome.specs_created += 1;
            } else {
                outcome.specs_updated += 1;
            }
            debug!(tzid = %entry.tzid, add = entry.add, "diff entry applied");
        }

        let changes = graph.reconcile(session, &entry.tzid, &entry.aliases)?;
        outcome.aliases.absorb(changes);
    }

    let token = format_dtstamp(&dtstamp);
    session.set_sync_token(&token)?;
    outcome.sync_token = token;

    info!(
        created = outcome.specs_created,
        updated = outcome.specs_updated,
        aliases_written = outcome.aliases.written,
        aliases_deleted = outcome.aliases.deleted,
        "diff batch applied"
    );
    Ok(outcome)
}

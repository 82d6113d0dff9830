//! Alias index.
//!
//! The alias collection stores `aliasId -> {targetIds}`. Sync and diff
//! sessions need the reverse direction as well, so they start by building an
//! [`AliasGraph`] from one scan, mutate it in place while reconciling, and drop
//! it when the session ends.

use crate::error::{CoreError, CoreResult};
use crate::store::Session;
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;
use tzcache_codec::AliasRecord;

/// Mutations performed by alias reconciliation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AliasChanges {
    /// Alias records written (created or updated).
    pub written: u64,
    /// Alias records deleted because they lost their last target.
    pub deleted: u64,
}

impl AliasChanges {
    /// Adds `other` to `self`.
    pub fn absorb(&mut self, other: AliasChanges) {
        self.written += other.written;
        self.deleted += other.deleted;
    }
}

/// Bidirectional alias index for one session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AliasGraph {
    by_tzid: BTreeMap<String, BTreeSet<String>>,
    by_alias: BTreeMap<String, AliasRecord>,
}

impl AliasGraph {
    /// Builds the graph from a full scan of the alias collection.
    ///
    /// # Errors
    ///
    /// Returns an error if the scan fails.
    pub fn build(session: &Session<'_>) -> CoreResult<Self> {
        let graph = Self::from_records(session.aliases()?);
        debug!(aliases = graph.by_alias.len(), tzids = graph.by_tzid.len(), "built alias graph");
        Ok(graph)
    }

    /// Builds the graph from records already in hand.
    pub fn from_records<I: IntoIterator<Item = AliasRecord>>(records: I) -> Self {
        let mut graph = Self::default();
        for record in records {
            graph.insert(record);
        }
        graph
    }

    fn insert(&mut self, record: AliasRecord) {
        for target in &record.target_ids {
            self.by_tzid
                .entry(target.clone())
                .or_default()
                .insert(record.alias_id.clone());
        }
        self.by_alias.insert(record.alias_id.clone(), record);
    }

    /// Aliases resolving to `tzid`, sorted.
    pub fn aliases_of(&self, tzid: &str) -> impl Iterator<Item = &str> {
        self.by_tzid
            .get(tzid)
            .into_iter()
            .flatten()
            .map(String::as_str)
    }

    /// Targets of `alias_id`.
    pub fn targets_of(&self, alias_id: &str) -> Option<&BTreeSet<String>> {
        self.by_alias.get(alias_id).map(|r| &r.target_ids)
    }

    /// All alias records, ordered by alias id.
    pub fn records(&self) -> impl Iterator<Item = &AliasRecord> {
        self.by_alias.values()
    }

    /// Number of alias records.
    pub fn len(&self) -> usize {
        self.by_alias.len()
    }

    /// Returns `true` if there are no aliases.
    pub fn is_empty(&self) -> bool {
        self.by_alias.is_empty()
    }

    /// Renders the flattened report: one `alias=target1,target2` line per
    /// alias, sorted by alias id, targets sorted.
    pub fn report(&self) -> String {
        let mut out = String::new();
        for record in self.by_alias.values() {
            out.push_str(&record.alias_id);
            out.push('=');
            let targets: Vec<&str> = record.target_ids.iter().map(String::as_str).collect();
            out.push_str(&targets.join(","));
            out.push('\n');
        }
        out
    }

    /// Makes `reported` the exact set of aliases pointing at `tzid`.
    ///
    /// Every reported alias gains `tzid` as a target, created if missing.
    /// Every alias that pointed at `tzid` but is no longer reported loses it,
    /// and is deleted once it has no targets left. Records are only written
    /// when they change.
    ///
    /// # Errors
    ///
    /// Returns an error if a write or delete fails. The graph is updated for
    /// every mutation that reached the store.
    pub fn reconcile(
        &mut self,
        session: &mut Session<'_>,
        tzid: &str,
        reported: &[String],
    ) -> CoreResult<AliasChanges> {
        let mut changes = AliasChanges::default();
        let mut stale = self.by_tzid.get(tzid).cloned().unwrap_or_default();

        for alias_id in reported {
            stale.remove(alias_id);
            let mut record = self
                .by_alias
                .get(alias_id)
                .cloned()
                .unwrap_or_else(|| AliasRecord::new(alias_id.clone()));
            if !record.add_target(tzid) {
                continue;
            }
            session.put_alias(&record)?;
            changes.written += 1;
            debug!(alias = %alias_id, tzid, "alias now targets timezone");
            self.by_tzid
                .entry(tzid.to_string())
                .or_default()
                .insert(alias_id.clone());
            self.by_alias.insert(alias_id.clone(), record);
        }

        for alias_id in stale {
            let Some(mut record) = self.by_alias.get(&alias_id).cloned() else {
                continue;
            };
            record.remove_target(tzid);
            if record.is_orphaned() {
                session.delete_alias(&alias_id)?;
                changes.deleted += 1;
                debug!(alias = %alias_id, "alias deleted, no targets left");
                self.by_alias.remove(&alias_id);
            } else {
                session.put_alias(&record)?;
                changes.written += 1;
                self.by_alias.insert(alias_id.clone(), record);
            }
            if let Some(aliases) = self.by_tzid.get_mut(tzid) {
                aliases.remove(&alias_id);
                if aliases.is_empty() {
                    self.by_tzid.remove(tzid);
                }
            }
        }

        Ok(changes)
    }
}

/// Parses the flattened alias report.
///
/// Blank lines and lines starting with `#` are skipped. Repeated aliases
/// merge their targets.
///
/// # Errors
///
/// Returns [`CoreError::InvalidAliasReport`] for a line without `=`, with an
/// empty alias, or with no targets.
pub fn parse_alias_report(text: &str) -> CoreResult<Vec<AliasRecord>> {
    let mut records: BTreeMap<String, AliasRecord> = BTreeMap::new();

    for (index, raw) in text.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let invalid = |message: &str| CoreError::InvalidAliasReport {
            line: index + 1,
            message: message.to_string(),
        };

        let (alias, targets) = line.split_once('=').ok_or_else(|| invalid("missing '='"))?;
        let alias = alias.trim();
        if alias.is_empty() {
            return Err(invalid("empty alias id"));
        }

        let record = records
            .entry(alias.to_string())
            .or_insert_with(|| AliasRecord::new(alias));
        for target in targets.split(',').map(str::trim).filter(|t| !t.is_empty()) {
            record.add_target(target);
        }
        if record.is_orphaned() {
            return Err(invalid("alias has no targets"));
        }
    }

    Ok(records.into_values().collect())
}

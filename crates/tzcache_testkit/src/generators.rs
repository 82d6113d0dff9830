//! Property-based test generators using proptest.

use proptest::prelude::*;
use std::collections::{BTreeMap, BTreeSet};
use tzcache_codec::AliasRecord;

/// Strategy for `Area/City` style tzids.
pub fn tzid_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[A-Z][a-z]{2,7}/[A-Z][a-z]{2,7}").expect("Invalid regex")
}

/// Strategy for alias ids, disjoint from [`tzid_strategy`].
pub fn alias_id_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-z]{1,6}").expect("Invalid regex")
}

/// A set of zones, each with the aliases that point at it.
///
/// Aliases may be shared between zones.
pub fn zone_set_strategy() -> impl Strategy<Value = BTreeMap<String, BTreeSet<String>>> {
    prop::collection::btree_map(
        tzid_strategy(),
        prop::collection::btree_set(alias_id_strategy(), 0..4),
        0..6,
    )
}

/// Alias records implied by a zone set.
pub fn alias_records(zones: &BTreeMap<String, BTreeSet<String>>) -> Vec<AliasRecord> {
    let mut records: BTreeMap<&str, AliasRecord> = BTreeMap::new();
    for (tzid, aliases) in zones {
        for alias in aliases {
            records
                .entry(alias.as_str())
                .or_insert_with(|| AliasRecord::new(alias.as_str()))
                .add_target(tzid);
        }
    }
    records.into_values().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    proptest! {
        #[test]
        fn alias_records_are_never_orphaned(zones in zone_set_strategy()) {
            let records = alias_records(&zones);
            prop_assert!(records.iter().all(|r| !r.is_orphaned()));
            for record in &records {
                for target in &record.target_ids {
                    prop_assert!(zones[target].contains(&record.alias_id));
                }
            }
        }
    }
}

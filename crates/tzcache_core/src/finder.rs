//! Identifier search.

use crate::error::CoreResult;
use crate::store::Session;
use std::collections::BTreeSet;

/// Finds every tzid matching `pattern`.
///
/// A tzid matches if it contains `pattern`, or if any alias pointing at it
/// contains `pattern`. Matching is a case-sensitive substring test.
///
/// # Errors
///
/// Returns an error if either collection cannot be scanned.
pub fn find_ids(session: &Session<'_>, pattern: &str) -> CoreResult<BTreeSet<String>> {
    let mut found: BTreeSet<String> = session
        .spec_ids()?
        .into_iter()
        .filter(|id| id.contains(pattern))
        .collect();

    for record in session.aliases()? {
        if record.alias_id.contains(pattern) {
            found.extend(record.target_ids);
        }
    }

    Ok(found)
}

//! Logical collections and the key namespacing shared by all engines.
//!
//! Engines that multiplex every collection into one ordered keyspace (the
//! log engine) prefix each id with the collection tag. Engines with real
//! tables (SQLite) map each collection to its own table instead. Both paths
//! go through this module so the mapping lives in exactly one place.

use crate::error::{StorageError, StorageResult};
use std::fmt;

/// A logical collection of documents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Collection {
    /// Timezone specs keyed by tzid.
    Specs,
    /// Alias records keyed by alias id.
    Aliases,
    /// Store metadata (the sync token).
    Meta,
}

impl Collection {
    /// Every collection, in key order.
    pub const ALL: [Collection; 3] = [Collection::Aliases, Collection::Meta, Collection::Specs];

    /// Returns the key prefix used in a multiplexed keyspace.
    #[must_use]
    pub const fn prefix(self) -> &'static str {
        match self {
            Collection::Specs => "TZ:",
            Collection::Aliases => "AL:",
            Collection::Meta => "MD:",
        }
    }

    /// Returns the table name used by relational engines.
    #[must_use]
    pub const fn table(self) -> &'static str {
        match self {
            Collection::Specs => "tzspecs",
            Collection::Aliases => "aliases",
            Collection::Meta => "meta",
        }
    }

    fn from_prefix(prefix: &[u8]) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|collection| collection.prefix().as_bytes() == prefix)
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.table())
    }
}

const PREFIX_LEN: usize = 3;

/// Builds the namespaced key for `id` in `collection`.
#[must_use]
pub fn namespaced_key(collection: Collection, id: &str) -> Vec<u8> {
    let mut key = Vec::with_capacity(PREFIX_LEN + id.len());
    key.extend_from_slice(collection.prefix().as_bytes());
    key.extend_from_slice(id.as_bytes());
    key
}

/// Splits a namespaced key back into its collection and id.
///
/// # Errors
///
/// Returns [`StorageError::InvalidKey`] if the prefix is unknown or the id is
/// not valid UTF-8.
pub fn split_key(key: &[u8]) -> StorageResult<(Collection, String)> {
    if key.len() < PREFIX_LEN {
        return Err(StorageError::InvalidKey(format!("{key:?}")));
    }
    let (prefix, id) = key.split_at(PREFIX_LEN);
    let collection = Collection::from_prefix(prefix)
        .ok_or_else(|| StorageError::InvalidKey(String::from_utf8_lossy(key).into_owned()))?;
    let id = std::str::from_utf8(id)
        .map_err(|_| StorageError::InvalidKey(String::from_utf8_lossy(key).into_owned()))?;
    Ok((collection, id.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn prefixes_match_layout() {
        assert_eq!(namespaced_key(Collection::Specs, "Europe/Paris"), b"TZ:Europe/Paris");
        assert_eq!(namespaced_key(Collection::Aliases, "US/Eastern"), b"AL:US/Eastern");
        assert_eq!(namespaced_key(Collection::Meta, "sync_token"), b"MD:sync_token");
    }

    #[test]
    fn split_rejects_unknown_prefix() {
        assert!(matches!(split_key(b"XX:foo"), Err(StorageError::InvalidKey(_))));
        assert!(matches!(split_key(b"TZ"), Err(StorageError::InvalidKey(_))));
    }

    #[test]
    fn split_allows_empty_id() {
        let (collection, id) = split_key(b"AL:").unwrap();
        assert_eq!(collection, Collection::Aliases);
        assert!(id.is_empty());
    }

    proptest! {
        #[test]
        fn split_inverts_namespacing(id in "\\PC{0,40}", idx in 0usize..3) {
            let collection = Collection::ALL[idx];
            let key = namespaced_key(collection, &id);
            let (back, back_id) = split_key(&key).unwrap();
            prop_assert_eq!(back, collection);
            prop_assert_eq!(back_id, id);
        }
    }
}

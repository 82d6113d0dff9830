//! In-memory storage backend for testing.

use crate::backend::StorageBackend;
use crate::collection::Collection;
use crate::error::StorageResult;
use std::collections::BTreeMap;

/// An in-memory storage backend.
///
/// This backend keeps every collection in an ordered map and is suitable for:
/// - Unit tests
/// - Integration tests
/// - Ephemeral caches that don't need persistence
///
/// # Example
///
/// ```rust
/// use tzcache_storage::{Collection, InMemoryBackend, StorageBackend};
///
/// let mut backend = InMemoryBackend::new();
/// backend.put(Collection::Specs, "Europe/Oslo", b"{}").unwrap();
/// assert_eq!(backend.get(Collection::Specs, "Europe/Oslo").unwrap(), Some(b"{}".to_vec()));
/// ```
#[derive(Debug, Default, Clone)]
pub struct InMemoryBackend {
    data: BTreeMap<Collection, BTreeMap<String, Vec<u8>>>,
}

impl InMemoryBackend {
    /// Creates a new empty in-memory backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of documents in `collection`.
    #[must_use]
    pub fn len(&self, collection: Collection) -> usize {
        self.data.get(&collection).map_or(0, BTreeMap::len)
    }

    /// Returns true if no collection holds any document.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.values().all(BTreeMap::is_empty)
    }
}

impl StorageBackend for InMemoryBackend {
    fn name(&self) -> &'static str {
        "memory"
    }

    fn get(&self, collection: Collection, id: &str) -> StorageResult<Option<Vec<u8>>> {
        Ok(self
            .data
            .get(&collection)
            .and_then(|docs| docs.get(id))
            .cloned())
    }

    fn put(&mut self, collection: Collection, id: &str, doc: &[u8]) -> StorageResult<()> {
        self.data
            .entry(collection)
            .or_default()
            .insert(id.to_string(), doc.to_vec());
        Ok(())
    }

    fn delete(&mut self, collection: Collection, id: &str) -> StorageResult<bool> {
        Ok(self
            .data
            .get_mut(&collection)
            .is_some_and(|docs| docs.remove(id).is_some()))
    }

    fn scan(&self, collection: Collection) -> StorageResult<Vec<(String, Vec<u8>)>> {
        Ok(self
            .data
            .get(&collection)
            .map(|docs| {
                docs.iter()
                    .map(|(id, doc)| (id.clone(), doc.clone()))
                    .collect()
            })
            .unwrap_or_default())
    }

    fn clear(&mut self) -> StorageResult<()> {
        self.data.clear();
        Ok(())
    }
}

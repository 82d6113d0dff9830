//! Storage backend trait definition.

use crate::collection::Collection;
use crate::error::StorageResult;

/// A persistent key-value store over the logical [`Collection`]s.
///
/// Backends are **opaque document stores**. They map `(collection, id)` to a
/// byte document and never interpret the document. All sync, diff, alias and
/// search logic is written once against this trait, so no caller may depend
/// on which physical engine is in use.
///
/// # Invariants
///
/// - `get` returns exactly the bytes of the last `put` for that key, or
///   `None` after a `delete` or `clear`
/// - `scan` returns every live `(id, document)` of one collection, ordered
///   by id
/// - every call is atomic on its own; nothing spans calls
/// - data operations on a backend that needs opening fail with
///   [`crate::StorageError::Closed`] until `open` succeeds
///
/// # Implementors
///
/// - [`super::InMemoryBackend`] - For testing
/// - [`super::LogBackend`] - Append-only log with an ordered in-memory index
/// - [`super::SqliteBackend`] - One table per collection
pub trait StorageBackend: Send {
    /// Short engine name for logs.
    fn name(&self) -> &'static str;

    /// Prepares the backend for use. Must be idempotent.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying files or connection cannot be
    /// opened. The backend stays closed in that case.
    fn open(&mut self) -> StorageResult<()> {
        Ok(())
    }

    /// Makes all previous writes durable at the end of a session.
    ///
    /// # Errors
    ///
    /// Returns an error if flushing fails.
    fn close(&mut self) -> StorageResult<()> {
        Ok(())
    }

    /// Reads the document stored under `id`.
    ///
    /// # Errors
    ///
    /// Returns an error on I/O failure or a duplicate-row violation.
    fn get(&self, collection: Collection, id: &str) -> StorageResult<Option<Vec<u8>>>;

    /// Stores `doc` under `id`, replacing any previous document.
    ///
    /// # Errors
    ///
    /// Returns an error on I/O failure.
    fn put(&mut self, collection: Collection, id: &str, doc: &[u8]) -> StorageResult<()>;

    /// Removes the document stored under `id`.
    ///
    /// Returns whether a document was present.
    ///
    /// # Errors
    ///
    /// Returns an error on I/O failure.
    fn delete(&mut self, collection: Collection, id: &str) -> StorageResult<bool>;

    /// Returns every document in `collection`, ordered by id.
    ///
    /// # Errors
    ///
    /// Returns an error on I/O failure.
    fn scan(&self, collection: Collection) -> StorageResult<Vec<(String, Vec<u8>)>>;

    /// Removes every document from every collection.
    ///
    /// Used for cold bootstrap and explicit resets only.
    ///
    /// # Errors
    ///
    /// Returns an error on I/O failure.
    fn clear(&mut self) -> StorageResult<()>;

    /// Reclaims space held by overwritten and deleted documents.
    ///
    /// Engines that never hold dead data keep the default no-op.
    ///
    /// # Errors
    ///
    /// Returns an error on I/O failure.
    fn compact(&mut self) -> StorageResult<()> {
        Ok(())
    }
}

impl<B: StorageBackend + ?Sized> StorageBackend for Box<B> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn open(&mut self) -> StorageResult<()> {
        (**self).open()
    }

    fn close(&mut self) -> StorageResult<()> {
        (**self).close()
    }

    fn get(&self, collection: Collection, id: &str) -> StorageResult<Option<Vec<u8>>> {
        (**self).get(collection, id)
    }

    fn put(&mut self, collection: Collection, id: &str, doc: &[u8]) -> StorageResult<()> {
        (**self).put(collection, id, doc)
    }

    fn delete(&mut self, collection: Collection, id: &str) -> StorageResult<bool> {
        (**self).delete(collection, id)
    }

    fn scan(&self, collection: Collection) -> StorageResult<Vec<(String, Vec<u8>)>> {
        (**self).scan(collection)
    }

    fn clear(&mut self) -> StorageResult<()> {
        (**self).clear()
    }

    fn compact(&mut self) -> StorageResult<()> {
        (**self).compact()
    }
}

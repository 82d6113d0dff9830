//! Store handle and sessions.
//!
//! A [`Store`] owns one storage backend behind one mutex. All reads and
//! writes go through a [`Session`], which is the held guard: while a session
//! is alive no other sync, diff, or reader can touch the backend. The backend
//! is opened when the session starts and closed when it is dropped.

use crate::config::TzConfig;
use crate::error::CoreResult;
use crate::stats::StoreStats;
use parking_lot::{Mutex, MutexGuard};
use std::path::Path;
use tracing::{debug, warn};
use tzcache_codec::{AliasRecord, Document, TimezoneSpec};
use tzcache_storage::{Collection, InMemoryBackend, LogBackend, SqliteBackend, StorageBackend};

/// Metadata id of the global sync token.
pub const SYNC_TOKEN_ID: &str = "sync_token";

/// A timezone store.
pub struct Store {
    backend: Mutex<Box<dyn StorageBackend>>,
    config: TzConfig,
    stats: StoreStats,
}

impl Store {
    /// Creates a store over any backend.
    pub fn new(backend: impl StorageBackend + 'static, config: TzConfig) -> Self {
        Self::with_boxed_backend(Box::new(backend), config)
    }

    /// Creates a store over an already boxed backend.
    pub fn with_boxed_backend(backend: Box<dyn StorageBackend>, config: TzConfig) -> Self {
        Self {
            backend: Mutex::new(backend),
            config,
            stats: StoreStats::new(),
        }
    }

    /// Creates a store held entirely in memory.
    pub fn in_memory(config: TzConfig) -> Self {
        Self::new(InMemoryBackend::new(), config)
    }

    /// Creates a store over the log-structured engine in `dir`.
    ///
    /// The directory is created and locked by the first session.
    pub fn log(dir: &Path, config: TzConfig) -> Self {
        Self::new(LogBackend::new(dir), config)
    }

    /// Creates a store over the SQLite engine at `path`.
    pub fn sqlite(path: &Path, config: TzConfig) -> Self {
        Self::new(SqliteBackend::new(path), config)
    }

    /// Returns the configuration.
    pub fn config(&self) -> &TzConfig {
        &self.config
    }

    /// Returns the operation counters.
    pub fn stats(&self) -> &StoreStats {
        &self.stats
    }

    /// Opens a session, blocking until no other session is active.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the backend cannot be opened. No session
    /// exists in that case.
    pub fn session(&self) -> CoreResult<Session<'_>> {
        let mut backend = self.backend.lock();
        backend.open()?;
        self.stats.record_session();
        debug!(backend = backend.name(), "session opened");
        Ok(Session {
            backend,
            config: &self.config,
            stats: &self.stats,
            open: true,
        })
    }

    /// Opens a session if no other one is active.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the backend cannot be opened.
    pub fn try_session(&self) -> CoreResult<Option<Session<'_>>> {
        let Some(mut backend) = self.backend.try_lock() else {
            return Ok(None);
        };
        backend.open()?;
        self.stats.record_session();
        Ok(Some(Session {
            backend,
            config: &self.config,
            stats: &self.stats,
            open: true,
        }))
    }
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store")
            .field("config", &self.config)
            .field("stats", &self.stats.snapshot())
            .finish_non_exhaustive()
    }
}

/// Exclusive access to a store's backend.
pub struct Session<'a> {
    backend: MutexGuard<'a, Box<dyn StorageBackend>>,
    config: &'a TzConfig,
    stats: &'a StoreStats,
    open: bool,
}

impl<'a> Session<'a> {
    /// Returns the store configuration.
    pub fn config(&self) -> &'a TzConfig {
        self.config
    }

    /// Returns the backend name.
    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    /// Looks up a timezone definition.
    ///
    /// # Errors
    ///
    /// Returns an error if the read fails or the stored document is invalid.
    pub fn get_spec(&self, tzid: &str) -> CoreResult<Option<TimezoneSpec>> {
        self.stats.record_read();
        match self.backend.get(Collection::Specs, tzid)? {
            Some(bytes) => Ok(Some(TimezoneSpec::decode_keyed(tzid, &bytes)?)),
            None => Ok(None),
        }
    }

    /// Inserts or replaces a timezone definition.
    ///
    /// # Errors
    ///
    /// Returns an error if encoding or the write fails.
    pub fn put_spec(&mut self, spec: &TimezoneSpec) -> CoreResult<()> {
        let bytes = spec.encode()?;
        self.stats.record_write();
        self.backend.put(Collection::Specs, &spec.tzid, &bytes)?;
        Ok(())
    }

    /// Returns every timezone definition, ordered by tzid.
    ///
    /// # Errors
    ///
    /// Returns an error if the scan fails or a document is invalid.
    pub fn specs(&self) -> CoreResult<Vec<TimezoneSpec>> {
        self.stats.record_scan();
        self.backend
            .scan(Collection::Specs)?
            .into_iter()
            .map(|(id, bytes)| Ok(TimezoneSpec::decode_keyed(&id, &bytes)?))
            .collect()
    }

    /// Returns every tzid without decoding the documents.
    ///
    /// # Errors
    ///
    /// Returns an error if the scan fails.
    pub fn spec_ids(&self) -> CoreResult<Vec<String>> {
        self.stats.record_scan();
        Ok(self
            .backend
            .scan(Collection::Specs)?
            .into_iter()
            .map(|(id, _)| id)
            .collect())
    }

    /// Looks up an alias record.
    ///
    /// # Errors
    ///
    /// Returns an error if the read fails or the stored document is invalid.
    pub fn get_alias(&self, alias_id: &str) -> CoreResult<Option<AliasRecord>> {
        self.stats.record_read();
        match self.backend.get(Collection::Aliases, alias_id)? {
            Some(bytes) => Ok(Some(AliasRecord::decode_keyed(alias_id, &bytes)?)),
            None => Ok(None),
        }
    }

    /// Inserts or replaces an alias record.
    ///
    /// # Errors
    ///
    /// Returns an error if encoding or the write fails.
    pub fn put_alias(&mut self, record: &AliasRecord) -> CoreResult<()> {
        let bytes = record.encode()?;
        self.stats.record_write();
        self.backend
            .put(Collection::Aliases, &record.alias_id, &bytes)?;
        Ok(())
    }

    /// Deletes an alias record. Returns whether it existed.
    ///
    /// # Errors
    ///
    /// Returns an error if the delete fails.
    pub fn delete_alias(&mut self, alias_id: &str) -> CoreResult<bool> {
        self.stats.record_delete();
        Ok(self.backend.delete(Collection::Aliases, alias_id)?)
    }

    /// Returns every alias record, ordered by alias id.
    ///
    /// # Errors
    ///
    /// Returns an error if the scan fails or a document is invalid.
    pub fn aliases(&self) -> CoreResult<Vec<AliasRecord>> {
        self.stats.record_scan();
        self.backend
            .scan(Collection::Aliases)?
            .into_iter()
            .map(|(id, bytes)| Ok(AliasRecord::decode_keyed(&id, &bytes)?))
            .collect()
    }

    /// Returns the global sync token, if one was ever stored.
    ///
    /// # Errors
    ///
    /// Returns an error if the read fails.
    pub fn sync_token(&self) -> CoreResult<Option<String>> {
        self.stats.record_read();
        match self.backend.get(Collection::Meta, SYNC_TOKEN_ID)? {
            Some(bytes) => Ok(Some(tzcache_codec::from_json(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Persists the global sync token.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    pub fn set_sync_token(&mut self, token: &str) -> CoreResult<()> {
        let bytes = tzcache_codec::to_json(token)?;
        self.stats.record_write();
        self.backend.put(Collection::Meta, SYNC_TOKEN_ID, &bytes)?;
        debug!(token, "sync token stored");
        Ok(())
    }

    /// Removes every record from every collection.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be cleared.
    pub fn clear(&mut self) -> CoreResult<()> {
        self.stats.record_delete();
        self.backend.clear()?;
        Ok(())
    }

    /// Closes the session, reporting any error from the backend.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the backend fails to close cleanly.
    pub fn close(mut self) -> CoreResult<()> {
        self.open = false;
        self.backend.close()?;
        Ok(())
    }

    /// Reclaims space in the backend.
    ///
    /// # Errors
    ///
    /// Returns a storage error if compaction fails.
    pub fn compact(&mut self) -> CoreResult<()> {
        self.backend.compact()?;
        debug!(backend = self.backend.name(), "store compacted");
        Ok(())
    }
}

impl Drop for Session<'_> {
    fn drop(&mut self) {
        if !self.open {
            return;
        }
        if let Err(err) = self.backend.close() {
            warn!(backend = self.backend.name(), error = %err, "failed to close session");
        }
    }
}

impl std::fmt::Debug for Session<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("backend", &self.backend.name())
            .finish_non_exhaustive()
    }
}

//! A backend that fails on demand.
//!
//! Wraps [`InMemoryBackend`] and, while its [`FaultSwitch`] is on, rejects
//! every write to the chosen collection with [`StorageError::Corrupted`].
//! Used to check what a sync cycle leaves behind when it dies halfway.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tzcache_storage::{Collection, InMemoryBackend, StorageBackend, StorageError, StorageResult};

/// Shared on/off switch of a [`FlakyBackend`].
#[derive(Debug, Clone, Default)]
pub struct FaultSwitch {
    on: Arc<AtomicBool>,
    tripped: Arc<AtomicU64>,
}

impl FaultSwitch {
    /// Turns failures on or off.
    pub fn set(&self, on: bool) {
        self.on.store(on, Ordering::SeqCst);
    }

    /// Whether failures are on.
    pub fn is_on(&self) -> bool {
        self.on.load(Ordering::SeqCst)
    }

    /// Number of writes rejected so far.
    pub fn tripped(&self) -> u64 {
        self.tripped.load(Ordering::SeqCst)
    }
}

/// In-memory backend whose writes to one collection can be made to fail.
#[derive(Debug)]
pub struct FlakyBackend {
    inner: InMemoryBackend,
    target: Collection,
    switch: FaultSwitch,
}

impl FlakyBackend {
    /// Creates a backend that fails writes to `target` while switched on.
    pub fn new(target: Collection) -> Self {
        Self {
            inner: InMemoryBackend::new(),
            target,
            switch: FaultSwitch::default(),
        }
    }

    /// Returns a handle to the switch.
    pub fn switch(&self) -> FaultSwitch {
        self.switch.clone()
    }

    fn check(&self, collection: Collection) -> StorageResult<()> {
        if collection == self.target && self.switch.is_on() {
            self.switch.tripped.fetch_add(1, Ordering::SeqCst);
            return Err(StorageError::corrupted(format!(
                "injected write failure on {collection}"
            )));
        }
        Ok(())
    }
}

impl StorageBackend for FlakyBackend {
    fn name(&self) -> &'static str {
        "flaky"
    }

    fn get(&self, collection: Collection, id: &str) -> StorageResult<Option<Vec<u8>>> {
        self.inner.get(collection, id)
    }

    fn put(&mut self, collection: Collection, id: &str, doc: &[u8]) -> StorageResult<()> {
        self.check(collection)?;
        self.inner.put(collection, id, doc)
    }

    fn delete(&mut self, collection: Collection, id: &str) -> StorageResult<bool> {
        self.check(collection)?;
        self.inner.delete(collection, id)
    }

    fn scan(&self, collection: Collection) -> StorageResult<Vec<(String, Vec<u8>)>> {
        self.inner.scan(collection)
    }

    fn clear(&mut self) -> StorageResult<()> {
        self.inner.clear()
    }
}

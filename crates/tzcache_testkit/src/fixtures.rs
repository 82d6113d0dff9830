//! Stores, timezone bodies and dataset directories for tests.

use chrono::{DateTime, TimeZone, Utc};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;
use tzcache_codec::calendar::wrap_vtimezone;
use tzcache_core::{Store, TzConfig};

/// A store with automatic cleanup of its files.
pub struct TestStore {
    /// The store.
    pub store: Arc<Store>,
    _temp_dir: Option<TempDir>,
}

impl TestStore {
    /// Creates an in-memory store.
    pub fn memory(config: TzConfig) -> Self {
        Self {
            store: Arc::new(Store::in_memory(config)),
            _temp_dir: None,
        }
    }

    /// Creates a store over the log engine in a temporary directory.
    pub fn log(config: TzConfig) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let store = Store::log(&temp_dir.path().join("store"), config);
        Self {
            store: Arc::new(store),
            _temp_dir: Some(temp_dir),
        }
    }

    /// Creates a store over SQLite in a temporary directory.
    pub fn sqlite(config: TzConfig) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let store = Store::sqlite(&temp_dir.path().join("tzcache.db"), config);
        Self {
            store: Arc::new(store),
            _temp_dir: Some(temp_dir),
        }
    }

    /// One store per backend.
    pub fn all(config: TzConfig) -> Vec<Self> {
        vec![
            Self::memory(config.clone()),
            Self::log(config.clone()),
            Self::sqlite(config),
        ]
    }

    /// Returns the temporary directory, if file-based.
    pub fn path(&self) -> Option<&Path> {
        self._temp_dir.as_ref().map(TempDir::path)
    }

    /// Returns a new handle to the store.
    pub fn shared(&self) -> Arc<Store> {
        Arc::clone(&self.store)
    }
}

impl std::ops::Deref for TestStore {
    type Target = Store;

    fn deref(&self) -> &Self::Target {
        &self.store
    }
}

/// A minimal VTIMEZONE component for `tzid`.
pub fn vtimezone(tzid: &str) -> String {
    vtimezone_with_offset(tzid, "+0000")
}

/// A VTIMEZONE component with one STANDARD observance at `offset`.
pub fn vtimezone_with_offset(tzid: &str, offset: &str) -> String {
    format!(
        "BEGIN:VTIMEZONE\r\n\
         TZID:{tzid}\r\n\
         BEGIN:STANDARD\r\n\
         DTSTART:19700101T000000\r\n\
         TZOFFSETFROM:{offset}\r\n\
         TZOFFSETTO:{offset}\r\n\
         END:STANDARD\r\n\
         END:VTIMEZONE\r\n"
    )
}

/// A full VCALENDAR carrying [`vtimezone`] for `tzid`.
pub fn calendar(tzid: &str) -> String {
    wrap_vtimezone(&vtimezone(tzid))
}

/// Midnight UTC on the given day of January 2024.
pub fn january(day: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, day, 0, 0, 0)
        .single()
        .expect("Invalid day of January")
}

/// Builds a bulk dataset directory for bootstrap tests.
pub struct DatasetBuilder {
    dir: TempDir,
}

impl DatasetBuilder {
    /// Creates an empty dataset with a `zoneinfo/` directory.
    pub fn new() -> Self {
        let dir = TempDir::new().expect("Failed to create temp directory");
        fs::create_dir_all(dir.path().join(tzcache_core::bootstrap::ZONEINFO_DIR))
            .expect("Failed to create zoneinfo directory");
        Self { dir }
    }

    /// Adds `zoneinfo/<tzid>.ics` holding [`vtimezone`].
    #[must_use]
    pub fn zone(self, tzid: &str) -> Self {
        let text = vtimezone(tzid);
        self.file(&format!("{}/{tzid}.ics", tzcache_core::bootstrap::ZONEINFO_DIR), &text)
    }

    /// Writes the alias report.
    #[must_use]
    pub fn aliases(self, report: &str) -> Self {
        self.file(tzcache_core::bootstrap::ALIASES_FILE, report)
    }

    /// Writes the version file.
    #[must_use]
    pub fn version(self, dtstamp: &str) -> Self {
        self.file(tzcache_core::bootstrap::VERSION_FILE, dtstamp)
    }

    /// Writes an arbitrary file relative to the dataset root.
    #[must_use]
    pub fn file(self, relative: &str, text: &str) -> Self {
        let path = self.dir.path().join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("Failed to create dataset directory");
        }
        fs::write(&path, text).expect("Failed to write dataset file");
        self
    }

    /// Returns the dataset root.
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Returns the dataset root as an owned path.
    pub fn path_buf(&self) -> PathBuf {
        self.dir.path().to_path_buf()
    }
}

impl Default for DatasetBuilder {
    fn default() -> Self {
        Self::new()
    }
}

//! Relational storage engine backed by SQLite.
//!
//! Each logical collection gets its own two-column table:
//!
//! ```sql
//! CREATE TABLE tzspecs (id TEXT PRIMARY KEY, blob BLOB NOT NULL);
//! CREATE TABLE aliases (id TEXT PRIMARY KEY, blob BLOB NOT NULL);
//! CREATE TABLE meta    (id TEXT PRIMARY KEY, blob BLOB NOT NULL);
//! ```

use crate::backend::StorageBackend;
use crate::collection::Collection;
use crate::error::{StorageError, StorageResult};
use rusqlite::{params, Connection};
use std::path::{Path, PathBuf};
use tracing::{debug, error};

/// Where the database lives.
#[derive(Debug, Clone)]
enum Location {
    File(PathBuf),
    Memory,
}

/// SQLite storage engine.
///
/// The connection is established lazily by [`StorageBackend::open`] and kept
/// for the lifetime of the backend; `close` only checkpoints the WAL.
pub struct SqliteBackend {
    location: Location,
    conn: Option<Connection>,
}

impl SqliteBackend {
    /// Creates a closed backend for the database file at `path`.
    #[must_use]
    pub fn new(path: &Path) -> Self {
        Self {
            location: Location::File(path.to_path_buf()),
            conn: None,
        }
    }

    /// Creates a closed backend over a private in-memory database.
    #[must_use]
    pub fn in_memory() -> Self {
        Self {
            location: Location::Memory,
            conn: None,
        }
    }

    /// Creates and opens a backend for the database file at `path`.
    ///
    /// # Errors
    ///
    /// See [`StorageBackend::open`].
    pub fn open_path(path: &Path) -> StorageResult<Self> {
        let mut backend = Self::new(path);
        backend.open()?;
        Ok(backend)
    }

    fn conn(&self) -> StorageResult<&Connection> {
        self.conn.as_ref().ok_or(StorageError::Closed)
    }

    fn create_schema(conn: &Connection) -> StorageResult<()> {
        for collection in Collection::ALL {
            conn.execute_batch(&format!(
                "CREATE TABLE IF NOT EXISTS {} (
                    id TEXT PRIMARY KEY,
                    blob BLOB NOT NULL
                );",
                collection.table()
            ))?;
        }
        Ok(())
    }
}

impl std::fmt::Debug for SqliteBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteBackend")
            .field("location", &self.location)
            .field("open", &self.conn.is_some())
            .finish()
    }
}

impl StorageBackend for SqliteBackend {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    fn open(&mut self) -> StorageResult<()> {
        if self.conn.is_some() {
            return Ok(());
        }

        let conn = match &self.location {
            Location::File(path) => {
                if let Some(parent) = path.parent() {
                    std::fs::create_dir_all(parent)?;
                }
                let conn = Connection::open(path)?;
                conn.execute_batch("PRAGMA journal_mode=WAL;")?;
                conn.execute_batch("PRAGMA synchronous=NORMAL;")?;
                conn
            }
            Location::Memory => Connection::open_in_memory()?,
        };
        Self::create_schema(&conn)?;
        debug!(location = ?self.location, "opened sqlite store");

        self.conn = Some(conn);
        Ok(())
    }

    fn close(&mut self) -> StorageResult<()> {
        if let (Some(conn), Location::File(_)) = (self.conn.as_ref(), &self.location) {
            conn.execute_batch("PRAGMA wal_checkpoint(PASSIVE);")?;
        }
        Ok(())
    }

    fn get(&self, collection: Collection, id: &str) -> StorageResult<Option<Vec<u8>>> {
        let conn = self.conn()?;
        let mut stmt =
            conn.prepare_cached(&format!("SELECT blob FROM {} WHERE id = ?1", collection.table()))?;
        let mut rows = stmt.query(params![id])?;

        let Some(row) = rows.next()? else {
            return Ok(None);
        };
        let blob: Vec<u8> = row.get(0)?;

        if rows.next()?.is_some() {
            error!(%collection, id, "more than one row for a unique id");
            return Err(StorageError::DuplicateRecord {
                collection,
                id: id.to_string(),
            });
        }
        Ok(Some(blob))
    }

    fn put(&mut self, collection: Collection, id: &str, doc: &[u8]) -> StorageResult<()> {
        self.conn()?.execute(
            &format!(
                "INSERT INTO {} (id, blob) VALUES (?1, ?2)
                 ON CONFLICT(id) DO UPDATE SET blob = excluded.blob",
                collection.table()
            ),
            params![id, doc],
        )?;
        Ok(())
    }

    fn delete(&mut self, collection: Collection, id: &str) -> StorageResult<bool> {
        let removed = self.conn()?.execute(
            &format!("DELETE FROM {} WHERE id = ?1", collection.table()),
            params![id],
        )?;
        Ok(removed > 0)
    }

    fn scan(&self, collection: Collection) -> StorageResult<Vec<(String, Vec<u8>)>> {
        let conn = self.conn()?;
        let mut stmt =
            conn.prepare_cached(&format!("SELECT id, blob FROM {} ORDER BY id", collection.table()))?;
        let rows = stmt.query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, Vec<u8>>(1)?)))?;

        let mut results = Vec::new();
        for row in rows {
            results.push(row?);
        }
        Ok(results)
    }

    fn clear(&mut self) -> StorageResult<()> {
        let conn = self.conn.as_mut().ok_or(StorageError::Closed)?;
        let tx = conn.transaction()?;
        for collection in Collection::ALL {
            tx.execute(&format!("DELETE FROM {}", collection.table()), [])?;
        }
        tx.commit()?;
        Ok(())
    }

    fn compact(&mut self) -> StorageResult<()> {
        self.conn()?.execute_batch("VACUUM;")?;
        Ok(())
    }
}

//! Append-only data file used by the log engine.

use crate::error::{StorageError, StorageResult};
use parking_lot::RwLock;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

/// An append-only file with positional reads.
///
/// # Durability
///
/// - `flush()` calls `File::flush()` to push data to the OS
/// - `sync()` calls `File::sync_all()` to ensure data is on disk
#[derive(Debug)]
pub struct LogFile {
    path: PathBuf,
    file: RwLock<File>,
    size: u64,
}

impl LogFile {
    /// Opens or creates the file at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened or created.
    pub fn open(path: &Path) -> StorageResult<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;

        let size = file.metadata()?.len();

        Ok(Self {
            path: path.to_path_buf(),
            file: RwLock::new(file),
            size,
        })
    }

    /// Returns the path to the underlying file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the current size in bytes, which is where the next append lands.
    #[must_use]
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Reads `len` bytes starting at `offset`.
    ///
    /// # Errors
    ///
    /// Returns an error if the read extends past the end of the file.
    pub fn read_at(&self, offset: u64, len: usize) -> StorageResult<Vec<u8>> {
        let end = offset.saturating_add(len as u64);
        if offset > self.size || end > self.size {
            return Err(StorageError::corrupted(format!(
                "read beyond end of log: offset {offset}, len {len}, size {}",
                self.size
            )));
        }

        if len == 0 {
            return Ok(Vec::new());
        }

        let mut file = self.file.write();
        file.seek(SeekFrom::Start(offset))?;

        let mut buffer = vec![0u8; len];
        file.read_exact(&mut buffer)?;

        Ok(buffer)
    }

    /// Appends `data` and returns the offset it was written at.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    pub fn append(&mut self, data: &[u8]) -> StorageResult<u64> {
        let offset = self.size;
        if data.is_empty() {
            return Ok(offset);
        }

        let mut file = self.file.write();
        file.seek(SeekFrom::Start(offset))?;
        if let Err(err) = file.write_all(data) {
            // Drop whatever part of `data` made it out, so the next append
            // still lands at `offset`.
            if let Err(rollback) = file.set_len(offset) {
                tracing::warn!(error = %rollback, offset, "failed to roll back partial append");
            }
            return Err(err.into());
        }
        self.size += data.len() as u64;

        Ok(offset)
    }

    /// Flushes buffered writes to the OS.
    ///
    /// # Errors
    ///
    /// Returns an error if the flush fails.
    pub fn flush(&mut self) -> StorageResult<()> {
        self.file.write().flush()?;
        Ok(())
    }

    /// Syncs data and metadata to disk.
    ///
    /// # Errors
    ///
    /// Returns an error if the sync fails.
    pub fn sync(&mut self) -> StorageResult<()> {
        self.file.write().sync_all()?;
        Ok(())
    }

    /// Truncates the file to `new_size` bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if `new_size` is beyond the current size or the
    /// truncation fails.
    pub fn truncate(&mut self, new_size: u64) -> StorageResult<()> {
        if new_size > self.size {
            return Err(StorageError::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!(
                    "cannot truncate to size {} which is greater than current size {}",
                    new_size, self.size
                ),
            )));
        }

        let file = self.file.write();
        file.set_len(new_size)?;
        file.sync_all()?;
        drop(file);
        self.size = new_size;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn file_append_and_read() {
        let dir = tempdir().unwrap();
        let mut file = LogFile::open(&dir.path().join("data.log")).unwrap();

        assert_eq!(file.append(b"hello").unwrap(), 0);
        assert_eq!(file.append(b" world").unwrap(), 5);
        assert_eq!(file.size(), 11);
        assert_eq!(file.read_at(6, 5).unwrap(), b"world");
    }

    #[test]
    fn file_read_past_end_fails() {
        let dir = tempdir().unwrap();
        let mut file = LogFile::open(&dir.path().join("data.log")).unwrap();
        file.append(b"hello").unwrap();

        assert!(matches!(file.read_at(3, 10), Err(StorageError::Corrupted(_))));
    }

    #[test]
    fn file_persistence() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("data.log");

        {
            let mut file = LogFile::open(&path).unwrap();
            file.append(b"persistent data").unwrap();
            file.sync().unwrap();
        }

        let file = LogFile::open(&path).unwrap();
        assert_eq!(file.size(), 15);
        assert_eq!(file.read_at(0, 15).unwrap(), b"persistent data");
    }

    #[test]
    fn append_lands_at_recorded_size() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("data.log");
        let mut file = LogFile::open(&path).unwrap();
        file.append(b"hello").unwrap();

        // Leftover bytes past the recorded size, as a torn write leaves them.
        let mut stray = OpenOptions::new().append(true).open(&path).unwrap();
        stray.write_all(b"junk").unwrap();
        drop(stray);

        assert_eq!(file.append(b"world").unwrap(), 5);
        assert_eq!(file.size(), 10);
        assert_eq!(file.read_at(5, 5).unwrap(), b"world");
        assert_eq!(std::fs::read(&path).unwrap(), b"helloworld");
    }

    #[test]
    fn file_truncate() {
        let dir = tempdir().unwrap();
        let mut file = LogFile::open(&dir.path().join("data.log")).unwrap();
        file.append(b"hello world").unwrap();

        file.truncate(5).unwrap();
        assert_eq!(file.size(), 5);
        assert!(file.truncate(100).is_err());
    }
}

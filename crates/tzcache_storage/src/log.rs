//! Log-structured storage engine.
//!
//! Every mutation is appended to one data file as a self-describing record;
//! an ordered in-memory index maps each live namespaced key to the offset of
//! its latest record. The index is rebuilt by replaying the log on open.
//!
//! ```text
//! <dir>/
//! ├─ LOCK        # Advisory lock for the single operator
//! └─ data.log    # Append-only record log
//! ```
//!
//! Record layout (little endian):
//!
//! ```text
//! record_len u32 | flags u8 | key_len u16 | key | payload | crc32 u32
//! ```
//!
//! `record_len` covers the whole record. The CRC covers everything before it.

use crate::backend::StorageBackend;
use crate::collection::{namespaced_key, split_key, Collection};
use crate::error::{StorageError, StorageResult};
use crate::file::LogFile;
use fs2::FileExt;
use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

const LOCK_FILE: &str = "LOCK";
const DATA_FILE: &str = "data.log";
const COMPACT_FILE: &str = "data.log.compact";

const FLAG_TOMBSTONE: u8 = 0x01;

/// A record in the log.
#[derive(Debug, Clone, PartialEq, Eq)]
struct LogRecord {
    key: Vec<u8>,
    payload: Vec<u8>,
    tombstone: bool,
}

impl LogRecord {
    /// record_len (4) + flags (1) + key_len (2)
    const HEADER_SIZE: usize = 7;
    const CRC_SIZE: usize = 4;

    fn put(key: Vec<u8>, payload: Vec<u8>) -> Self {
        Self {
            key,
            payload,
            tombstone: false,
        }
    }

    fn tombstone(key: Vec<u8>) -> Self {
        Self {
            key,
            payload: Vec::new(),
            tombstone: true,
        }
    }

    fn encode(&self) -> StorageResult<Vec<u8>> {
        let key_len = u16::try_from(self.key.len())
            .map_err(|_| StorageError::InvalidKey(String::from_utf8_lossy(&self.key).into_owned()))?;
        let record_len = Self::HEADER_SIZE + self.key.len() + self.payload.len() + Self::CRC_SIZE;
        let record_len_u32 = u32::try_from(record_len)
            .map_err(|_| StorageError::corrupted(format!("record too large: {record_len} bytes")))?;

        let mut buf = Vec::with_capacity(record_len);
        buf.extend_from_slice(&record_len_u32.to_le_bytes());
        buf.push(if self.tombstone { FLAG_TOMBSTONE } else { 0 });
        buf.extend_from_slice(&key_len.to_le_bytes());
        buf.extend_from_slice(&self.key);
        buf.extend_from_slice(&self.payload);

        let crc = compute_crc32(&buf);
        buf.extend_from_slice(&crc.to_le_bytes());
        Ok(buf)
    }

    fn decode(data: &[u8]) -> StorageResult<Self> {
        if data.len() < Self::HEADER_SIZE + Self::CRC_SIZE {
            return Err(StorageError::corrupted("record shorter than header"));
        }

        let (body, crc_bytes) = data.split_at(data.len() - Self::CRC_SIZE);
        let stored = u32::from_le_bytes([crc_bytes[0], crc_bytes[1], crc_bytes[2], crc_bytes[3]]);
        let actual = compute_crc32(body);
        if stored != actual {
            return Err(StorageError::corrupted(format!(
                "checksum mismatch: expected {stored:08x}, got {actual:08x}"
            )));
        }

        let flags = body[4];
        let key_len = usize::from(u16::from_le_bytes([body[5], body[6]]));
        let key_end = Self::HEADER_SIZE + key_len;
        if key_end > body.len() {
            return Err(StorageError::corrupted("key extends beyond record"));
        }

        Ok(Self {
            key: body[Self::HEADER_SIZE..key_end].to_vec(),
            payload: body[key_end..].to_vec(),
            tombstone: flags & FLAG_TOMBSTONE != 0,
        })
    }
}

/// Log-structured storage engine with an ordered key index.
///
/// The backend is created closed; [`StorageBackend::open`] takes the
/// directory lock and replays the log. A record torn by a crash at the very
/// end of the log is discarded on replay; a checksum failure anywhere else
/// is reported as [`StorageError::Corrupted`].
///
/// # Example
///
/// ```no_run
/// use tzcache_storage::{Collection, LogBackend, StorageBackend};
/// use std::path::Path;
///
/// let mut backend = LogBackend::new(Path::new("tzcache-data"));
/// backend.open().unwrap();
/// backend.put(Collection::Specs, "Europe/Paris", b"{}").unwrap();
/// backend.close().unwrap();
/// ```
#[derive(Debug)]
pub struct LogBackend {
    dir: PathBuf,
    file: Option<LogFile>,
    index: BTreeMap<Vec<u8>, u64>,
    lock: Option<File>,
}

impl LogBackend {
    /// Creates a closed backend rooted at `dir`.
    #[must_use]
    pub fn new(dir: &Path) -> Self {
        Self {
            dir: dir.to_path_buf(),
            file: None,
            index: BTreeMap::new(),
            lock: None,
        }
    }

    /// Creates and opens a backend rooted at `dir`.
    ///
    /// # Errors
    ///
    /// See [`StorageBackend::open`].
    pub fn open_dir(dir: &Path) -> StorageResult<Self> {
        let mut backend = Self::new(dir);
        backend.open()?;
        Ok(backend)
    }

    /// Returns the store directory.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Returns the number of live keys across all collections.
    #[must_use]
    pub fn live_keys(&self) -> usize {
        self.index.len()
    }

    /// Returns the size of the log in bytes, or 0 when closed.
    #[must_use]
    pub fn log_size(&self) -> u64 {
        self.file.as_ref().map_or(0, LogFile::size)
    }

    /// Rewrites the log so it holds only the latest record of each live key.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend is closed or any I/O fails. On failure
    /// the original log is left in place.
    pub fn compact(&mut self) -> StorageResult<()> {
        let before = self.log_size();
        let compact_path = self.dir.join(COMPACT_FILE);
        if compact_path.exists() {
            fs::remove_file(&compact_path)?;
        }

        let mut compacted = LogFile::open(&compact_path)?;
        let mut new_index = BTreeMap::new();
        {
            let file = self.file.as_ref().ok_or(StorageError::Closed)?;
            for (key, &offset) in &self.index {
                let record = read_record(file, offset)?;
                let new_offset = compacted.append(&record.encode()?)?;
                new_index.insert(key.clone(), new_offset);
            }
        }
        compacted.sync()?;
        drop(compacted);

        self.file = None;
        fs::rename(&compact_path, self.dir.join(DATA_FILE))?;
        self.file = Some(LogFile::open(&self.dir.join(DATA_FILE))?);
        self.index = new_index;

        debug!(before, after = self.log_size(), "compacted log");
        Ok(())
    }

    fn file_mut(&mut self) -> StorageResult<&mut LogFile> {
        self.file.as_mut().ok_or(StorageError::Closed)
    }

    fn acquire_lock(&self) -> StorageResult<File> {
        let lock_file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(self.dir.join(LOCK_FILE))?;

        if lock_file.try_lock_exclusive().is_err() {
            return Err(StorageError::Locked {
                path: self.dir.clone(),
            });
        }
        Ok(lock_file)
    }

    /// Replays the log into a fresh index, truncating a torn tail record.
    fn replay(file: &mut LogFile) -> StorageResult<BTreeMap<Vec<u8>, u64>> {
        let size = file.size();
        let mut index = BTreeMap::new();
        let mut offset = 0u64;
        let mut torn_at = None;

        while offset < size {
            if offset + 4 > size {
                torn_at = Some(offset);
                break;
            }

            let len_bytes = file.read_at(offset, 4)?;
            let record_len =
                u32::from_le_bytes([len_bytes[0], len_bytes[1], len_bytes[2], len_bytes[3]]) as usize;

            if offset + record_len as u64 > size {
                torn_at = Some(offset);
                break;
            }

            let data = file.read_at(offset, record_len)?;
            let record = match LogRecord::decode(&data) {
                Ok(record) => record,
                Err(_) if offset + record_len as u64 == size => {
                    torn_at = Some(offset);
                    break;
                }
                Err(e) => return Err(e),
            };

            if record.tombstone {
                index.remove(&record.key);
            } else {
                index.insert(record.key, offset);
            }
            offset += record_len as u64;
        }

        if let Some(torn) = torn_at {
            warn!(offset = torn, size, "discarding torn record at end of log");
            file.truncate(torn)?;
        }

        Ok(index)
    }
}

fn read_record(file: &LogFile, offset: u64) -> StorageResult<LogRecord> {
    let len_bytes = file.read_at(offset, 4)?;
    let record_len =
        u32::from_le_bytes([len_bytes[0], len_bytes[1], len_bytes[2], len_bytes[3]]) as usize;
    let data = file.read_at(offset, record_len)?;
    LogRecord::decode(&data)
}

impl StorageBackend for LogBackend {
    fn name(&self) -> &'static str {
        "log"
    }

    fn open(&mut self) -> StorageResult<()> {
        if self.file.is_some() {
            return Ok(());
        }

        fs::create_dir_all(&self.dir)?;
        let lock = match self.lock.take() {
            Some(lock) => lock,
            None => self.acquire_lock()?,
        };

        let mut file = LogFile::open(&self.dir.join(DATA_FILE))?;
        let index = Self::replay(&mut file)?;
        debug!(dir = %self.dir.display(), keys = index.len(), "opened log store");

        self.index = index;
        self.file = Some(file);
        self.lock = Some(lock);
        Ok(())
    }

    fn close(&mut self) -> StorageResult<()> {
        if let Some(file) = self.file.as_mut() {
            file.flush()?;
            file.sync()?;
        }
        Ok(())
    }

    fn get(&self, collection: Collection, id: &str) -> StorageResult<Option<Vec<u8>>> {
        let file = self.file.as_ref().ok_or(StorageError::Closed)?;
        let key = namespaced_key(collection, id);

        let Some(&offset) = self.index.get(&key) else {
            return Ok(None);
        };

        let record = read_record(file, offset)?;
        if record.key != key {
            return Err(StorageError::corrupted(format!(
                "index points at wrong record for {collection}/{id}"
            )));
        }
        Ok(Some(record.payload))
    }

    fn put(&mut self, collection: Collection, id: &str, doc: &[u8]) -> StorageResult<()> {
        let key = namespaced_key(collection, id);
        let encoded = LogRecord::put(key.clone(), doc.to_vec()).encode()?;
        let offset = self.file_mut()?.append(&encoded)?;
        self.index.insert(key, offset);
        Ok(())
    }

    fn delete(&mut self, collection: Collection, id: &str) -> StorageResult<bool> {
        let key = namespaced_key(collection, id);
        if !self.index.contains_key(&key) {
            self.file_mut()?;
            return Ok(false);
        }

        let encoded = LogRecord::tombstone(key.clone()).encode()?;
        self.file_mut()?.append(&encoded)?;
        self.index.remove(&key);
        Ok(true)
    }

    fn scan(&self, collection: Collection) -> StorageResult<Vec<(String, Vec<u8>)>> {
        let file = self.file.as_ref().ok_or(StorageError::Closed)?;
        let prefix = collection.prefix().as_bytes();

        let mut results = Vec::new();
        for (key, &offset) in self.index.range(prefix.to_vec()..) {
            if !key.starts_with(prefix) {
                break;
            }
            let (_, id) = split_key(key)?;
            let record = read_record(file, offset)?;
            results.push((id, record.payload));
        }
        Ok(results)
    }

    fn clear(&mut self) -> StorageResult<()> {
        self.file_mut()?.truncate(0)?;
        self.index.clear();
        Ok(())
    }

    fn compact(&mut self) -> StorageResult<()> {
        LogBackend::compact(self)
    }
}

/// Computes CRC32 (IEEE polynomial) of data.
fn compute_crc32(data: &[u8]) -> u32 {
    const CRC32_TABLE: [u32; 256] = {
        let mut table = [0u32; 256];
        let mut i = 0;
        while i < 256 {
            let mut crc = i as u32;
            let mut j = 0;
            while j < 8 {
                if crc & 1 != 0 {
                    crc = (crc >> 1) ^ 0xEDB8_8320;
                } else {
                    crc >>= 1;
                }
                j += 1;
            }
            table[i] = crc;
            i += 1;
        }
        table
    };

    let mut crc = 0xFFFF_FFFF_u32;
    for &byte in data {
        let index = ((crc ^ u32::from(byte)) & 0xFF) as usize;
        crc = (crc >> 8) ^ CRC32_TABLE[index];
    }
    !crc
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::tempdir;

    #[test]
    fn crc32_known_value() {
        assert_eq!(compute_crc32(b"123456789"), 0xCBF4_3926);
    }

    #[test]
    fn record_roundtrip() {
        let record = LogRecord::put(b"TZ:Europe/Rome".to_vec(), b"{\"tzid\":1}".to_vec());
        let decoded = LogRecord::decode(&record.encode().unwrap()).unwrap();
        assert_eq!(decoded, record);

        let tombstone = LogRecord::tombstone(b"AL:Rome".to_vec());
        assert!(LogRecord::decode(&tombstone.encode().unwrap()).unwrap().tombstone);
    }

    #[test]
    fn record_detects_bit_flip() {
        let mut encoded = LogRecord::put(b"TZ:X".to_vec(), b"body".to_vec()).encode().unwrap();
        encoded[9] ^= 0xFF;
        assert!(matches!(LogRecord::decode(&encoded), Err(StorageError::Corrupted(_))));
    }

    #[test]
    fn log_requires_open() {
        let dir = tempdir().unwrap();
        let mut backend = LogBackend::new(dir.path());
        assert!(matches!(backend.get(Collection::Specs, "X"), Err(StorageError::Closed)));
        assert!(matches!(backend.put(Collection::Specs, "X", b"x"), Err(StorageError::Closed)));
    }

    #[test]
    fn log_survives_reopen() {
        let dir = tempdir().unwrap();
        {
            let mut backend = LogBackend::open_dir(dir.path()).unwrap();
            backend.put(Collection::Specs, "X", b"one").unwrap();
            backend.put(Collection::Specs, "X", b"two").unwrap();
            backend.put(Collection::Aliases, "Z", b"alias").unwrap();
            backend.put(Collection::Specs, "Y", b"gone").unwrap();
            assert!(backend.delete(Collection::Specs, "Y").unwrap());
            backend.close().unwrap();
        }

        let backend = LogBackend::open_dir(dir.path()).unwrap();
        assert_eq!(backend.get(Collection::Specs, "X").unwrap(), Some(b"two".to_vec()));
        assert_eq!(backend.get(Collection::Specs, "Y").unwrap(), None);
        assert_eq!(backend.get(Collection::Aliases, "Z").unwrap(), Some(b"alias".to_vec()));
        assert_eq!(backend.live_keys(), 2);
    }

    #[test]
    fn log_scan_stays_inside_collection() {
        let dir = tempdir().unwrap();
        let mut backend = LogBackend::open_dir(dir.path()).unwrap();
        backend.put(Collection::Aliases, "a", b"1").unwrap();
        backend.put(Collection::Meta, "sync_token", b"t").unwrap();
        backend.put(Collection::Specs, "b", b"2").unwrap();
        backend.put(Collection::Specs, "a", b"3").unwrap();

        let specs = backend.scan(Collection::Specs).unwrap();
        assert_eq!(
            specs,
            vec![("a".to_string(), b"3".to_vec()), ("b".to_string(), b"2".to_vec())]
        );
        assert_eq!(backend.scan(Collection::Aliases).unwrap().len(), 1);
    }

    #[test]
    fn log_discards_torn_tail() {
        let dir = tempdir().unwrap();
        {
            let mut backend = LogBackend::open_dir(dir.path()).unwrap();
            backend.put(Collection::Specs, "X", b"kept").unwrap();
            backend.close().unwrap();
        }

        // Half of a record, as left by a crash mid-append.
        let torn = LogRecord::put(b"TZ:Y".to_vec(), b"lost".to_vec()).encode().unwrap();
        let mut raw = OpenOptions::new()
            .append(true)
            .open(dir.path().join(DATA_FILE))
            .unwrap();
        raw.write_all(&torn[..torn.len() / 2]).unwrap();
        drop(raw);

        let mut backend = LogBackend::open_dir(dir.path()).unwrap();
        assert_eq!(backend.get(Collection::Specs, "X").unwrap(), Some(b"kept".to_vec()));
        assert_eq!(backend.get(Collection::Specs, "Y").unwrap(), None);

        backend.put(Collection::Specs, "Y", b"new").unwrap();
        assert_eq!(backend.get(Collection::Specs, "Y").unwrap(), Some(b"new".to_vec()));
    }

    #[test]
    fn log_second_open_is_locked() {
        let dir = tempdir().unwrap();
        let _first = LogBackend::open_dir(dir.path()).unwrap();
        let second = LogBackend::open_dir(dir.path());
        assert!(matches!(second, Err(StorageError::Locked { .. })));
    }

    #[test]
    fn log_clear_and_compact() {
        let dir = tempdir().unwrap();
        let mut backend = LogBackend::open_dir(dir.path()).unwrap();
        for i in 0..10 {
            backend.put(Collection::Specs, "X", format!("v{i}").as_bytes()).unwrap();
        }
        backend.put(Collection::Aliases, "Z", b"z").unwrap();

        let before = backend.log_size();
        backend.compact().unwrap();
        assert!(backend.log_size() < before);
        assert_eq!(backend.get(Collection::Specs, "X").unwrap(), Some(b"v9".to_vec()));
        assert_eq!(backend.get(Collection::Aliases, "Z").unwrap(), Some(b"z".to_vec()));

        backend.clear().unwrap();
        assert_eq!(backend.log_size(), 0);
        assert!(backend.scan(Collection::Specs).unwrap().is_empty());
    }
}

//! DurableStore: MemoryStore image backed by a write-ahead log
//!
//! Every mutation is appended to `records.wal` before it is applied to the
//! in-memory image; reads never touch the file. Opening a directory
//! replays the log to rebuild the image.
//!
//! # Recovery
//!
//! - A torn final frame (crash mid-append) is truncated away with a warning
//! - Damage with any intact frame after it, including a damaged length
//!   field, fails the open with `Corruption` and leaves the file untouched
//! - A leftover `records.wal.tmp` from an interrupted checkpoint is discarded;
//!   the previous log is still intact because the rename never happened

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use tracing::{info, warn};

use recordstore_core::{OrderedStore, StoreResult};

use crate::memory::MemoryStore;
use crate::wal::{encode_entry, read_log, DurabilityMode, WalEntry, WalWriter};

/// Log file name inside the store directory
pub const WAL_FILE_NAME: &str = "records.wal";

/// Temporary file written by `checkpoint`
pub const CHECKPOINT_TMP_NAME: &str = "records.wal.tmp";

/// Persistent ordered store
///
/// # Example
///
/// ```ignore
/// use recordstore_storage::{DurableStore, DurabilityMode};
///
/// let store = DurableStore::open("/path/to/data", DurabilityMode::Strict)?;
/// store.upsert("data", b"key", b"value")?;
/// ```
#[derive(Debug)]
pub struct DurableStore {
    dir: PathBuf,
    image: MemoryStore,
    /// Held across append + apply so the image follows log order
    wal: Mutex<WalWriter>,
}

impl DurableStore {
    /// Open (or create) a store in `dir` and replay its log
    pub fn open<P: AsRef<Path>>(dir: P, durability_mode: DurabilityMode) -> StoreResult<Self> {
        let dir = dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&dir)?;

        let tmp = dir.join(CHECKPOINT_TMP_NAME);
        if tmp.exists() {
            warn!(target: "recordstore::wal", path = ?tmp, "Discarding unfinished checkpoint");
            std::fs::remove_file(&tmp)?;
        }

        let path = dir.join(WAL_FILE_NAME);
        let replay = read_log(&path)?;

        if replay.torn_bytes > 0 {
            warn!(
                target: "recordstore::wal",
                path = ?path,
                valid_len = replay.valid_len,
                torn_bytes = replay.torn_bytes,
                "Truncating torn write at end of log"
            );
            let file = OpenOptions::new().write(true).open(&path)?;
            file.set_len(replay.valid_len)?;
            file.sync_all()?;
        }

        let image = MemoryStore::new();
        for entry in &replay.entries {
            image.apply(entry);
        }

        info!(
            target: "recordstore::wal",
            path = ?path,
            entries = replay.entries.len(),
            mode = durability_mode.description(),
            "Opened durable store"
        );

        let wal = WalWriter::open(&path, durability_mode)?;

        Ok(Self {
            dir,
            image,
            wal: Mutex::new(wal),
        })
    }

    /// Store directory
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Current log size in bytes
    pub fn wal_size(&self) -> u64 {
        self.wal.lock().size()
    }

    /// Rewrite the log so it holds only the live state
    ///
    /// Writes a fresh log to `records.wal.tmp`, fsyncs it and renames it
    /// over `records.wal`. Writers are blocked for the duration.
    pub fn checkpoint(&self) -> StoreResult<()> {
        let mut wal = self.wal.lock();
        wal.fsync()?;

        let entries = self.image.snapshot_entries();
        let tmp = self.dir.join(CHECKPOINT_TMP_NAME);
        let path = self.dir.join(WAL_FILE_NAME);

        {
            let file = File::create(&tmp)?;
            let mut writer = BufWriter::new(file);
            for entry in &entries {
                writer.write_all(&encode_entry(entry)?)?;
            }
            writer.flush()?;
            writer.get_ref().sync_all()?;
        }

        std::fs::rename(&tmp, &path)?;

        let before = wal.size();
        let mode = wal.durability_mode();
        *wal = WalWriter::open(&path, mode)?;

        info!(
            target: "recordstore::wal",
            entries = entries.len(),
            before_bytes = before,
            after_bytes = wal.size(),
            "Checkpoint complete"
        );
        Ok(())
    }

    fn log(&self, wal: &mut WalWriter, entry: WalEntry) -> StoreResult<()> {
        wal.append(&entry)?;
        self.image.apply(&entry);
        Ok(())
    }
}

impl OrderedStore for DurableStore {
    fn get(&self, map: &str, key: &[u8]) -> StoreResult<Option<Vec<u8>>> {
        self.image.get(map, key)
    }

    fn upsert(&self, map: &str, key: &[u8], value: &[u8]) -> StoreResult<()> {
        let mut wal = self.wal.lock();
        self.log(
            &mut wal,
            WalEntry::Upsert {
                map: map.to_string(),
                key: key.to_vec(),
                value: value.to_vec(),
            },
        )
    }

    fn delete(&self, map: &str, key: &[u8]) -> StoreResult<bool> {
        let mut wal = self.wal.lock();
        if self.image.get(map, key)?.is_none() {
            return Ok(false);
        }
        self.log(
            &mut wal,
            WalEntry::Delete {
                map: map.to_string(),
                key: key.to_vec(),
            },
        )?;
        Ok(true)
    }

    fn scan_prefix(&self, map: &str, prefix: &[u8]) -> StoreResult<Vec<(Vec<u8>, Vec<u8>)>> {
        self.image.scan_prefix(map, prefix)
    }

    fn last_key(&self, map: &str) -> StoreResult<Option<Vec<u8>>> {
        self.image.last_key(map)
    }

    fn clear(&self, map: &str) -> StoreResult<()> {
        let mut wal = self.wal.lock();
        self.log(
            &mut wal,
            WalEntry::Clear {
                map: map.to_string(),
            },
        )
    }

    fn len(&self, map: &str) -> StoreResult<usize> {
        self.image.len(map)
    }

    fn flush(&self) -> StoreResult<()> {
        self.wal.lock().fsync()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_reopen_restores_state() {
        let dir = TempDir::new().unwrap();
        {
            let store = DurableStore::open(dir.path(), DurabilityMode::Strict).unwrap();
            store.upsert("data", b"a", b"1").unwrap();
            store.upsert("data", b"b", b"2").unwrap();
            store.upsert("index", b"a", b"").unwrap();
            assert!(store.delete("data", b"a").unwrap());
        }

        let store = DurableStore::open(dir.path(), DurabilityMode::Strict).unwrap();
        assert_eq!(store.get("data", b"a").unwrap(), None);
        assert_eq!(store.get("data", b"b").unwrap(), Some(b"2".to_vec()));
        assert_eq!(store.len("index").unwrap(), 1);
    }

    #[test]
    fn test_delete_of_absent_key_is_not_logged() {
        let dir = TempDir::new().unwrap();
        let store = DurableStore::open(dir.path(), DurabilityMode::Strict).unwrap();
        let size = store.wal_size();
        assert!(!store.delete("data", b"missing").unwrap());
        assert_eq!(store.wal_size(), size);
    }

    #[test]
    fn test_clear_survives_reopen() {
        let dir = TempDir::new().unwrap();
        {
            let store = DurableStore::open(dir.path(), DurabilityMode::Strict).unwrap();
            store.upsert("index", b"x", b"").unwrap();
            store.upsert("data", b"x", b"v").unwrap();
            store.clear("index").unwrap();
        }
        let store = DurableStore::open(dir.path(), DurabilityMode::Strict).unwrap();
        assert_eq!(store.len("index").unwrap(), 0);
        assert_eq!(store.len("data").unwrap(), 1);
    }

    #[test]
    fn test_checkpoint_shrinks_log() {
        let dir = TempDir::new().unwrap();
        let store = DurableStore::open(dir.path(), DurabilityMode::Strict).unwrap();
        for i in 0..50u8 {
            store.upsert("data", b"hot", &[i]).unwrap();
        }
        let before = store.wal_size();

        store.checkpoint().unwrap();
        assert!(store.wal_size() < before);
        assert!(!dir.path().join(CHECKPOINT_TMP_NAME).exists());

        store.upsert("data", b"cold", b"c").unwrap();
        drop(store);

        let store = DurableStore::open(dir.path(), DurabilityMode::Strict).unwrap();
        assert_eq!(store.get("data", b"hot").unwrap(), Some(vec![49]));
        assert_eq!(store.get("data", b"cold").unwrap(), Some(b"c".to_vec()));
    }

    #[test]
    fn test_stale_checkpoint_file_is_discarded() {
        let dir = TempDir::new().unwrap();
        {
            let store = DurableStore::open(dir.path(), DurabilityMode::Strict).unwrap();
            store.upsert("data", b"k", b"v").unwrap();
        }
        std::fs::write(dir.path().join(CHECKPOINT_TMP_NAME), b"garbage").unwrap();

        let store = DurableStore::open(dir.path(), DurabilityMode::Strict).unwrap();
        assert_eq!(store.get("data", b"k").unwrap(), Some(b"v".to_vec()));
        assert!(!dir.path().join(CHECKPOINT_TMP_NAME).exists());
    }
}

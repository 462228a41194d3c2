//! DurableStore crash and corruption tests
//!
//! These tests exercise the log on disk directly:
//! - Writes survive a reopen in both durability modes
//! - A torn final frame is truncated and the store keeps working
//! - Damage before the final frame fails the open and leaves the log alone
//! - The type index persists alongside data

use std::fs::OpenOptions;
use std::sync::Arc;

use recordstore_core::{OrderedStore, StoreError, TypeTag};
use recordstore_storage::{DurabilityMode, DurableStore, TypeIndex, WAL_FILE_NAME};
use tempfile::TempDir;

fn wal_len(dir: &TempDir) -> u64 {
    std::fs::metadata(dir.path().join(WAL_FILE_NAME))
        .unwrap()
        .len()
}

#[test]
fn test_batched_writes_survive_clean_close() {
    let dir = TempDir::new().unwrap();
    {
        let store = DurableStore::open(dir.path(), DurabilityMode::standard_default()).unwrap();
        for i in 0u8..50 {
            store.upsert("data", &[i], &[i; 4]).unwrap();
        }
        store.flush().unwrap();
    }

    let store = DurableStore::open(dir.path(), DurabilityMode::Strict).unwrap();
    assert_eq!(store.len("data").unwrap(), 50);
    assert_eq!(store.get("data", &[49]).unwrap(), Some(vec![49; 4]));
}

#[test]
fn test_torn_tail_is_truncated_on_open() {
    let dir = TempDir::new().unwrap();
    let intact_len;
    {
        let store = DurableStore::open(dir.path(), DurabilityMode::Strict).unwrap();
        store.upsert("data", b"a", b"1").unwrap();
        store.upsert("data", b"b", b"2").unwrap();
        intact_len = wal_len(&dir);
        store.upsert("data", b"c", b"3").unwrap();
    }

    // Simulate a crash mid-append: chop the last frame in half
    let full_len = wal_len(&dir);
    let torn_len = intact_len + (full_len - intact_len) / 2;
    OpenOptions::new()
        .write(true)
        .open(dir.path().join(WAL_FILE_NAME))
        .unwrap()
        .set_len(torn_len)
        .unwrap();

    let store = DurableStore::open(dir.path(), DurabilityMode::Strict).unwrap();
    assert_eq!(store.get("data", b"a").unwrap(), Some(b"1".to_vec()));
    assert_eq!(store.get("data", b"b").unwrap(), Some(b"2".to_vec()));
    assert_eq!(store.get("data", b"c").unwrap(), None);
    assert_eq!(wal_len(&dir), intact_len);

    // Appends after truncation land on a clean boundary
    store.upsert("data", b"d", b"4").unwrap();
    drop(store);
    let store = DurableStore::open(dir.path(), DurabilityMode::Strict).unwrap();
    assert_eq!(store.get("data", b"d").unwrap(), Some(b"4".to_vec()));
    assert_eq!(store.len("data").unwrap(), 3);
}

#[test]
fn test_mid_log_corruption_fails_open() {
    let dir = TempDir::new().unwrap();
    {
        let store = DurableStore::open(dir.path(), DurabilityMode::Strict).unwrap();
        for i in 0u8..5 {
            store.upsert("data", &[i], b"payload").unwrap();
        }
    }

    // Flip a byte inside the first frame's payload
    let path = dir.path().join(WAL_FILE_NAME);
    let mut bytes = std::fs::read(&path).unwrap();
    bytes[6] ^= 0xFF;
    std::fs::write(&path, bytes).unwrap();

    let result = DurableStore::open(dir.path(), DurabilityMode::Strict);
    assert!(matches!(result, Err(StoreError::Corruption(_))));
}

#[test]
fn test_damaged_length_field_fails_open_without_truncating() {
    let dir = TempDir::new().unwrap();
    {
        let store = DurableStore::open(dir.path(), DurabilityMode::Strict).unwrap();
        for i in 0u8..5 {
            store.upsert("data", &[i], b"payload").unwrap();
        }
    }
    let before = wal_len(&dir);

    // High byte of the first frame's length: it now reaches past the file end
    let path = dir.path().join(WAL_FILE_NAME);
    let mut bytes = std::fs::read(&path).unwrap();
    bytes[3] ^= 0x01;
    std::fs::write(&path, &bytes).unwrap();

    let result = DurableStore::open(dir.path(), DurabilityMode::Strict);
    assert!(matches!(result, Err(StoreError::Corruption(_))));
    assert_eq!(wal_len(&dir), before);

    // Undo the damage and every record is still there
    bytes[3] ^= 0x01;
    std::fs::write(&path, &bytes).unwrap();
    let store = DurableStore::open(dir.path(), DurabilityMode::Strict).unwrap();
    assert_eq!(store.len("data").unwrap(), 5);
}

#[test]
fn test_type_index_persists() {
    let dir = TempDir::new().unwrap();
    let widget = TypeTag::new("widget").unwrap();
    {
        let engine: Arc<dyn OrderedStore> =
            Arc::new(DurableStore::open(dir.path(), DurabilityMode::Strict).unwrap());
        let index: TypeIndex<u64> = TypeIndex::new(engine, "index");
        index.add(&widget, &3).unwrap();
        index.add(&widget, &1).unwrap();
        index.add(&widget, &2).unwrap();
        index.remove(&widget, &2).unwrap();
    }

    let engine: Arc<dyn OrderedStore> =
        Arc::new(DurableStore::open(dir.path(), DurabilityMode::Strict).unwrap());
    let index: TypeIndex<u64> = TypeIndex::new(engine, "index");
    assert_eq!(index.list(&widget).unwrap(), vec![1, 3]);
}

#[test]
fn test_checkpoint_then_crash_keeps_state() {
    let dir = TempDir::new().unwrap();
    {
        let store = DurableStore::open(dir.path(), DurabilityMode::Strict).unwrap();
        for round in 0u8..10 {
            store.upsert("data", b"hot", &[round]).unwrap();
        }
        store.delete("data", b"hot").unwrap();
        store.upsert("data", b"cold", b"x").unwrap();
        let before = store.wal_size();
        store.checkpoint().unwrap();
        assert!(store.wal_size() < before);
        store.upsert("data", b"after", b"y").unwrap();
    }

    let store = DurableStore::open(dir.path(), DurabilityMode::Strict).unwrap();
    assert_eq!(store.get("data", b"hot").unwrap(), None);
    assert_eq!(store.get("data", b"cold").unwrap(), Some(b"x".to_vec()));
    assert_eq!(store.get("data", b"after").unwrap(), Some(b"y".to_vec()));
}

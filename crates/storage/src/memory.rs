//! MemoryStore: volatile ordered engine with named sub-maps
//!
//! This module implements the OrderedStore trait using:
//! - `BTreeMap<Vec<u8>, Vec<u8>>` per sub-map for ordered byte keys
//! - `parking_lot::RwLock` for thread-safe access
//!
//! # Design Notes
//!
//! - **Lazy sub-maps**: a sub-map is created by its first write; reads of an
//!   unknown sub-map see an empty map
//! - **Single lock**: all sub-maps share one lock, so a reader never observes
//!   a half-applied replay batch
//! - **No history**: each key stores only its latest value

use std::collections::{BTreeMap, HashMap};

use parking_lot::RwLock;

use recordstore_core::{OrderedStore, StoreResult};

use crate::wal::WalEntry;

type SubMap = BTreeMap<Vec<u8>, Vec<u8>>;

/// Volatile ordered store
///
/// Thread-safe through `parking_lot::RwLock`. Used directly for ephemeral
/// stores and as the in-memory image behind [`crate::DurableStore`].
#[derive(Debug, Default)]
pub struct MemoryStore {
    maps: RwLock<HashMap<String, SubMap>>,
}

impl MemoryStore {
    /// Create a new empty MemoryStore
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply a logged mutation
    pub(crate) fn apply(&self, entry: &WalEntry) {
        let mut maps = self.maps.write();
        match entry {
            WalEntry::Upsert { map, key, value } => {
                maps.entry(map.clone())
                    .or_default()
                    .insert(key.clone(), value.clone());
            }
            WalEntry::Delete { map, key } => {
                if let Some(sub) = maps.get_mut(map) {
                    sub.remove(key);
                }
            }
            WalEntry::Clear { map } => {
                maps.remove(map);
            }
        }
    }

    /// Live state as upsert entries, sub-maps in name order
    pub(crate) fn snapshot_entries(&self) -> Vec<WalEntry> {
        let maps = self.maps.read();
        let mut names: Vec<&String> = maps.keys().collect();
        names.sort();

        let mut entries = Vec::new();
        for name in names {
            for (key, value) in &maps[name] {
                entries.push(WalEntry::Upsert {
                    map: name.clone(),
                    key: key.clone(),
                    value: value.clone(),
                });
            }
        }
        entries
    }

    /// Names of sub-maps holding at least one entry
    pub fn map_names(&self) -> Vec<String> {
        let maps = self.maps.read();
        let mut names: Vec<String> = maps
            .iter()
            .filter(|(_, sub)| !sub.is_empty())
            .map(|(name, _)| name.clone())
            .collect();
        names.sort();
        names
    }
}

impl OrderedStore for MemoryStore {
    fn get(&self, map: &str, key: &[u8]) -> StoreResult<Option<Vec<u8>>> {
        let maps = self.maps.read();
        Ok(maps.get(map).and_then(|sub| sub.get(key)).cloned())
    }

    fn upsert(&self, map: &str, key: &[u8], value: &[u8]) -> StoreResult<()> {
        let mut maps = self.maps.write();
        maps.entry(map.to_string())
            .or_default()
            .insert(key.to_vec(), value.to_vec());
        Ok(())
    }

    fn delete(&self, map: &str, key: &[u8]) -> StoreResult<bool> {
        let mut maps = self.maps.write();
        Ok(maps
            .get_mut(map)
            .map(|sub| sub.remove(key).is_some())
            .unwrap_or(false))
    }

    fn scan_prefix(&self, map: &str, prefix: &[u8]) -> StoreResult<Vec<(Vec<u8>, Vec<u8>)>> {
        let maps = self.maps.read();
        let Some(sub) = maps.get(map) else {
            return Ok(Vec::new());
        };

        let results = sub
            .range(prefix.to_vec()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();

        Ok(results)
    }

    fn last_key(&self, map: &str) -> StoreResult<Option<Vec<u8>>> {
        let maps = self.maps.read();
        Ok(maps
            .get(map)
            .and_then(|sub| sub.keys().next_back())
            .cloned())
    }

    fn clear(&self, map: &str) -> StoreResult<()> {
        self.maps.write().remove(map);
        Ok(())
    }

    fn len(&self, map: &str) -> StoreResult<usize> {
        Ok(self.maps.read().get(map).map(|sub| sub.len()).unwrap_or(0))
    }

    fn flush(&self) -> StoreResult<()> {
        Ok(())
    }
}

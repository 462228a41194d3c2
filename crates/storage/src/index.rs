//! TypeIndex: TypeTag → set of record ids
//!
//! The index lives in its own sub-map of an [`OrderedStore`] (separate from
//! the data sub-map) as a single combined map keyed by `(tag, id)`:
//!
//! ```text
//! [tag_len: u16 BE][tag bytes][id key bytes]  →  (empty value)
//! ```
//!
//! The length prefix keeps one tag's range from bleeding into another
//! (`"a"` vs `"ab"`), and because id key bytes are order-preserving, a
//! prefix scan over one tag yields its ids in ascending order.
//!
//! The index is derived state: it can always be rebuilt from the data
//! sub-map, so `add` and `remove` are plain idempotent writes.

use std::marker::PhantomData;
use std::sync::Arc;

use byteorder::{BigEndian, ByteOrder};

use recordstore_core::{OrderedStore, StoreError, StoreKey, StoreResult, TypeTag};

/// Default sub-map name for the index
pub const DEFAULT_INDEX_MAP: &str = "index";

/// Encode the scan prefix covering every entry of `tag`
pub fn tag_prefix(tag: &TypeTag) -> Vec<u8> {
    let bytes = tag.as_bytes();
    let mut buf = vec![0u8; 2 + bytes.len()];
    // Tags are validated to at most MAX_TAG_BYTES, well inside u16
    BigEndian::write_u16(&mut buf[..2], bytes.len() as u16);
    buf[2..].copy_from_slice(bytes);
    buf
}

/// Encode the index key for `(tag, id bytes)`
pub fn index_key(tag: &TypeTag, id_bytes: &[u8]) -> Vec<u8> {
    let mut buf = tag_prefix(tag);
    buf.extend_from_slice(id_bytes);
    buf
}

/// Split an index key back into `(tag, id bytes)`
pub fn split_index_key(raw: &[u8]) -> StoreResult<(TypeTag, &[u8])> {
    if raw.len() < 2 {
        return Err(StoreError::Corruption(format!(
            "Index key too short: {} bytes",
            raw.len()
        )));
    }
    let tag_len = BigEndian::read_u16(&raw[..2]) as usize;
    if raw.len() < 2 + tag_len {
        return Err(StoreError::Corruption(format!(
            "Index key declares {}-byte tag but has {} bytes",
            tag_len,
            raw.len() - 2
        )));
    }
    let tag = std::str::from_utf8(&raw[2..2 + tag_len])
        .map_err(|e| StoreError::Corruption(format!("Index tag is not UTF-8: {}", e)))?;
    let tag = TypeTag::new(tag)
        .map_err(|e| StoreError::Corruption(format!("Index tag is invalid: {}", e)))?;
    Ok((tag, &raw[2 + tag_len..]))
}

/// Secondary index: TypeTag → ids
///
/// Generic over the id type so `list` can hand back typed ids.
pub struct TypeIndex<K: StoreKey> {
    store: Arc<dyn OrderedStore>,
    map: String,
    _key: PhantomData<fn() -> K>,
}

impl<K: StoreKey> TypeIndex<K> {
    /// Create an index over `map` in `store`
    pub fn new(store: Arc<dyn OrderedStore>, map: impl Into<String>) -> Self {
        Self {
            store,
            map: map.into(),
            _key: PhantomData,
        }
    }

    /// Sub-map holding the index
    pub fn map_name(&self) -> &str {
        &self.map
    }

    /// Register `id` under `tag`; a no-op if already present
    pub fn add(&self, tag: &TypeTag, id: &K) -> StoreResult<()> {
        let key = index_key(tag, &id.to_key_bytes());
        if self.store.get(&self.map, &key)?.is_some() {
            return Ok(());
        }
        self.store.upsert(&self.map, &key, &[])
    }

    /// Unregister `id` from `tag`; a no-op if absent
    pub fn remove(&self, tag: &TypeTag, id: &K) -> StoreResult<()> {
        let key = index_key(tag, &id.to_key_bytes());
        self.store.delete(&self.map, &key)?;
        Ok(())
    }

    /// Whether `id` is registered under `tag`
    pub fn contains(&self, tag: &TypeTag, id: &K) -> StoreResult<bool> {
        let key = index_key(tag, &id.to_key_bytes());
        Ok(self.store.get(&self.map, &key)?.is_some())
    }

    /// All ids registered under `tag`, ascending
    pub fn list(&self, tag: &TypeTag) -> StoreResult<Vec<K>> {
        let prefix = tag_prefix(tag);
        self.store
            .scan_prefix(&self.map, &prefix)?
            .into_iter()
            .map(|(raw, _)| {
                K::from_key_bytes(&raw[prefix.len()..]).ok_or_else(|| {
                    StoreError::Corruption(format!(
                        "Index entry for tag '{}' holds a malformed id",
                        tag
                    ))
                })
            })
            .collect()
    }

    /// Number of ids registered under `tag`
    pub fn count(&self, tag: &TypeTag) -> StoreResult<usize> {
        Ok(self.store.scan_prefix(&self.map, &tag_prefix(tag))?.len())
    }

    /// Every `(tag, id)` pair in the index, in index order
    pub fn entries(&self) -> StoreResult<Vec<(TypeTag, K)>> {
        self.store
            .scan_prefix(&self.map, &[])?
            .into_iter()
            .map(|(raw, _)| {
                let (tag, id_bytes) = split_index_key(&raw)?;
                let id = K::from_key_bytes(id_bytes).ok_or_else(|| {
                    StoreError::Corruption(format!(
                        "Index entry for tag '{}' holds a malformed id",
                        tag
                    ))
                })?;
                Ok((tag, id))
            })
            .collect()
    }

    /// Distinct tags with at least one id, in index order
    pub fn tags(&self) -> StoreResult<Vec<TypeTag>> {
        let mut tags: Vec<TypeTag> = Vec::new();
        for (raw, _) in self.store.scan_prefix(&self.map, &[])? {
            let (tag, _) = split_index_key(&raw)?;
            if tags.last() != Some(&tag) {
                tags.push(tag);
            }
        }
        Ok(tags)
    }

    /// Drop every index entry
    pub fn clear(&self) -> StoreResult<()> {
        self.store.clear(&self.map)
    }
}

impl<K: StoreKey> Clone for TypeIndex<K> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            map: self.map.clone(),
            _key: PhantomData,
        }
    }
}

impl<K: StoreKey> std::fmt::Debug for TypeIndex<K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TypeIndex").field("map", &self.map).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemoryStore;

    fn tag(s: &str) -> TypeTag {
        TypeTag::new(s).unwrap()
    }

    fn index() -> TypeIndex<u64> {
        TypeIndex::new(Arc::new(MemoryStore::new()), DEFAULT_INDEX_MAP)
    }

    #[test]
    fn test_type_index_add_and_list() {
        let index = index();
        index.add(&tag("widget"), &300).unwrap();
        index.add(&tag("widget"), &7).unwrap();
        index.add(&tag("widget"), &1001).unwrap();

        assert_eq!(index.list(&tag("widget")).unwrap(), vec![7, 300, 1001]);
        assert_eq!(index.count(&tag("widget")).unwrap(), 3);
    }

    #[test]
    fn test_type_index_add_is_idempotent() {
        let index = index();
        index.add(&tag("widget"), &1).unwrap();
        index.add(&tag("widget"), &1).unwrap();
        assert_eq!(index.list(&tag("widget")).unwrap(), vec![1]);
    }

    #[test]
    fn test_type_index_remove() {
        let index = index();
        index.add(&tag("widget"), &1).unwrap();
        index.add(&tag("widget"), &2).unwrap();

        index.remove(&tag("widget"), &1).unwrap();
        assert_eq!(index.list(&tag("widget")).unwrap(), vec![2]);
        assert!(!index.contains(&tag("widget"), &1).unwrap());

        // Absent key is a no-op
        index.remove(&tag("widget"), &1).unwrap();
        index.remove(&tag("never"), &9).unwrap();
        assert_eq!(index.list(&tag("widget")).unwrap(), vec![2]);
    }

    #[test]
    fn test_type_index_multiple_types() {
        let index = index();
        index.add(&tag("a"), &1).unwrap();
        index.add(&tag("ab"), &2).unwrap();
        index.add(&tag("b"), &3).unwrap();

        // Length prefix keeps "a" from swallowing "ab"
        assert_eq!(index.list(&tag("a")).unwrap(), vec![1]);
        assert_eq!(index.list(&tag("ab")).unwrap(), vec![2]);
        assert_eq!(index.list(&tag("b")).unwrap(), vec![3]);
        assert!(index.list(&tag("c")).unwrap().is_empty());

        let mut tags: Vec<String> = index
            .tags()
            .unwrap()
            .into_iter()
            .map(|t| t.to_string())
            .collect();
        tags.sort();
        assert_eq!(tags, vec!["a", "ab", "b"]);
    }

    #[test]
    fn test_type_index_entries_and_clear() {
        let index = index();
        index.add(&tag("widget"), &1).unwrap();
        index.add(&tag("gadget"), &2).unwrap();

        let mut entries = index.entries().unwrap();
        entries.sort();
        assert_eq!(entries, vec![(tag("gadget"), 2), (tag("widget"), 1)]);

        index.clear().unwrap();
        assert!(index.entries().unwrap().is_empty());
        assert!(index.tags().unwrap().is_empty());
    }

    #[test]
    fn test_index_key_round_trip() {
        let key = index_key(&tag("widget"), &[0, 1, 2]);
        let (t, id) = split_index_key(&key).unwrap();
        assert_eq!(t, tag("widget"));
        assert_eq!(id, &[0, 1, 2]);
    }

    #[test]
    fn test_split_rejects_malformed() {
        assert!(split_index_key(&[0]).is_err());
        assert!(split_index_key(&[0, 10, b'a']).is_err());
        assert!(split_index_key(&[0, 0]).is_err()); // empty tag
    }

    proptest::proptest! {
        #[test]
        fn test_list_is_sorted_and_deduplicated(ids in proptest::collection::vec(proptest::prelude::any::<u64>(), 0..64)) {
            let index = index();
            for id in &ids {
                index.add(&tag("widget"), id).unwrap();
            }
            let mut expected = ids.clone();
            expected.sort_unstable();
            expected.dedup();
            proptest::prop_assert_eq!(index.list(&tag("widget")).unwrap(), expected);
        }
    }

    #[test]
    fn test_malformed_id_is_corruption() {
        let store: Arc<dyn OrderedStore> = Arc::new(MemoryStore::new());
        let index: TypeIndex<u64> = TypeIndex::new(Arc::clone(&store), DEFAULT_INDEX_MAP);
        store
            .upsert(DEFAULT_INDEX_MAP, &index_key(&tag("widget"), &[1, 2, 3]), &[])
            .unwrap();
        assert!(matches!(
            index.list(&tag("widget")),
            Err(StoreError::Corruption(_))
        ));
    }
}

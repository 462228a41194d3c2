//! Capability traits consumed by the record store
//!
//! These traits let the record store stay ignorant of how bytes are kept,
//! how ids are minted and how values are encoded:
//! - [`OrderedStore`]: sorted byte map with named sub-maps
//! - [`IdGenerator`]: source of fresh ids
//! - [`Codec`]: typed value <-> payload bytes

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::StoreResult;

/// Ordered key-value engine hosting multiple named sub-maps
///
/// Keys and values are raw bytes; keys within a sub-map are kept in
/// ascending byte order. Sub-maps spring into existence on first write,
/// and reading a sub-map that was never written behaves like reading an
/// empty one.
///
/// Thread safety: All methods must be safe to call concurrently from
/// multiple threads (requires Send + Sync).
pub trait OrderedStore: Send + Sync {
    /// Point lookup
    fn get(&self, map: &str, key: &[u8]) -> StoreResult<Option<Vec<u8>>>;

    /// Insert or overwrite
    fn upsert(&self, map: &str, key: &[u8], value: &[u8]) -> StoreResult<()>;

    /// Remove a key; returns whether it existed
    fn delete(&self, map: &str, key: &[u8]) -> StoreResult<bool>;

    /// All entries whose key starts with `prefix`, ascending by key
    ///
    /// An empty prefix scans the whole sub-map.
    fn scan_prefix(&self, map: &str, prefix: &[u8]) -> StoreResult<Vec<(Vec<u8>, Vec<u8>)>>;

    /// Largest key in the sub-map
    fn last_key(&self, map: &str) -> StoreResult<Option<Vec<u8>>>;

    /// Remove every entry of a sub-map
    fn clear(&self, map: &str) -> StoreResult<()>;

    /// Number of entries in a sub-map
    fn len(&self, map: &str) -> StoreResult<usize>;

    /// Whether a sub-map has no entries
    fn is_empty(&self, map: &str) -> StoreResult<bool> {
        Ok(self.len(map)? == 0)
    }

    /// Make completed writes durable; a no-op for volatile engines
    fn flush(&self) -> StoreResult<()>;
}

/// Source of unique record ids
///
/// `create_id` must never return the same value twice for the lifetime of
/// the generator, and must not return an id currently used by a live record.
pub trait IdGenerator<K>: Send + Sync {
    /// Produce a fresh id
    fn create_id(&self) -> K;

    /// Never hand out `id` or anything ordered before it again
    ///
    /// Called when a store reopens with the highest id it has issued.
    /// Generators without an ordering (random ids) keep the default no-op.
    fn skip_through(&self, _id: &K) {}
}

/// Deterministic encoding between typed values and payload bytes
pub trait Codec: Send + Sync + 'static {
    /// Short codec name for diagnostics
    fn name(&self) -> &'static str;

    /// Encode a value
    fn encode<T: Serialize>(&self, value: &T) -> StoreResult<Vec<u8>>;

    /// Decode a payload
    ///
    /// `Ok(None)` means the payload decoded to an empty (null) value.
    fn decode<T: DeserializeOwned>(&self, payload: &[u8]) -> StoreResult<Option<T>>;
}

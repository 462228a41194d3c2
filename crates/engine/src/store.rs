//! RecordStore: typed CRUD over an ordered engine
//!
//! One physical engine holds records of many types. Records live in the
//! data sub-map under their id's key bytes, wrapped in an envelope carrying
//! their type tag; the [`TypeIndex`] in a second sub-map maps each tag to
//! its live ids.
//!
//! ## Protocol
//!
//! | Operation | Reads | Writes | Failure kinds |
//! |-----------|-------|--------|---------------|
//! | `get` | data | none | NotFound, Decode |
//! | `get_many` | data | none | Decode (missing ids skipped) |
//! | `insert` | data | data, index | AlreadyExists, Decode |
//! | `save` | data | data, index | none beyond engine errors |
//! | `delete` | data | data, index | NotFound, Decode |
//! | `get_all_ids` | index | none | none beyond engine errors |
//!
//! Every operation takes a [`CancelToken`] and returns `Cancelled` if it is
//! signalled before the first mutation. The data write always happens
//! before the index update and the two are not separated by a cancellation
//! check; a crash between them leaves drift that `rebuild_index` repairs.
//!
//! ## Concurrency
//!
//! Reads go straight to the engine. Writes to the same id serialize through
//! [`KeyLocks`], so `insert`'s existence check and its write are atomic with
//! respect to other writers on this store instance.
//!
//! ## Id high-water mark
//!
//! Every generated id is recorded in a small meta sub-map before its record
//! is written. Reopening moves the generator past that mark, so deleting
//! the newest record never lets its id be issued again.

use std::fmt;
use std::iter::FusedIterator;
use std::marker::PhantomData;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

use recordstore_core::{
    CancelToken, Codec, IdGenerator, OrderedStore, Record, StoreError, StoreKey, StoreResult,
    TypeTag,
};
use recordstore_storage::{DurableStore, MemoryStore, TypeIndex, DEFAULT_INDEX_MAP};

use crate::codec::{AnyCodec, JsonCodec};
use crate::config::{StoreConfig, DEFAULT_DATA_MAP};
use crate::envelope::{decode_envelope, encode_envelope};
use crate::locks::KeyLocks;
use crate::tags::TagRegistry;

/// Key of the generated-id high-water mark in the meta sub-map
const HIGH_WATER_KEY: &[u8] = b"id_high_water";

/// Meta sub-map paired with a data sub-map
pub fn meta_map_name(data_map: &str) -> String {
    format!("_rs/{}/meta", data_map)
}

pub(crate) struct Inner<K: StoreKey, C> {
    pub(crate) engine: Arc<dyn OrderedStore>,
    pub(crate) data_map: String,
    pub(crate) meta_map: String,
    pub(crate) index: TypeIndex<K>,
    pub(crate) codec: C,
    pub(crate) ids: Arc<dyn IdGenerator<K>>,
    pub(crate) tags: TagRegistry,
    pub(crate) locks: KeyLocks,
    /// Serializes read-compare-write of the high-water mark
    pub(crate) high_water: Mutex<()>,
}

/// Typed record store
///
/// Cheap to clone; clones share the engine, index, tag registry and locks.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use recordstore_core::{CancelToken, Record};
/// use recordstore_engine::{JsonCodec, RecordStore, SequenceGenerator};
/// use recordstore_storage::MemoryStore;
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
/// struct Widget {
///     name: String,
/// }
///
/// impl Record<u64> for Widget {
///     const TYPE_TAG: &'static str = "widget";
/// }
///
/// let store: RecordStore<u64> = RecordStore::new(
///     Arc::new(MemoryStore::new()),
///     JsonCodec,
///     Arc::new(SequenceGenerator::starting_at(1001)),
/// );
/// let cancel = CancelToken::none();
///
/// let (result, id) = store.insert(Widget { name: "a".into() }, &cancel);
/// assert_eq!(id, 1001);
/// assert_eq!(result.unwrap().name, "a");
/// assert_eq!(store.get_all_ids::<Widget>(&cancel).unwrap(), vec![1001]);
/// ```
///
/// The type index is only written through the store's own operations:
///
/// ```compile_fail
/// # use std::sync::Arc;
/// # use recordstore_engine::{JsonCodec, RecordStore, SequenceGenerator};
/// # use recordstore_storage::MemoryStore;
/// let store: RecordStore<u64> = RecordStore::new(
///     Arc::new(MemoryStore::new()),
///     JsonCodec,
///     Arc::new(SequenceGenerator::default()),
/// );
/// store.index().clear().unwrap();
/// ```
pub struct RecordStore<K: StoreKey, C = JsonCodec> {
    pub(crate) inner: Arc<Inner<K, C>>,
}

impl<K: StoreKey, C> Clone for RecordStore<K, C> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<K: StoreKey, C: Codec> fmt::Debug for RecordStore<K, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecordStore")
            .field("data_map", &self.inner.data_map)
            .field("index_map", &self.inner.index.map_name())
            .field("codec", &self.inner.codec.name())
            .finish()
    }
}

impl<K: StoreKey> RecordStore<K, AnyCodec> {
    /// Open a store as described by `config`
    ///
    /// A config with a `path` opens a [`DurableStore`] in that directory;
    /// without one the store is in-memory. The index is rebuilt first when
    /// `rebuild_index_on_open` is set, and `ids` is moved past every id the
    /// store has issued (see [`resume_ids`](Self::resume_ids)).
    pub fn open(config: &StoreConfig, ids: Arc<dyn IdGenerator<K>>) -> StoreResult<Self> {
        config.validate()?;
        let engine: Arc<dyn OrderedStore> = match &config.path {
            Some(dir) => Arc::new(DurableStore::open(dir, config.durability_mode()?)?),
            None => Arc::new(MemoryStore::new()),
        };
        let store = Self::with_maps(
            engine,
            config.codec()?,
            ids,
            config.data_map.clone(),
            config.index_map.clone(),
        )?;
        let cancel = CancelToken::none();
        if config.rebuild_index_on_open {
            store.rebuild_index(&cancel)?;
        }
        store.resume_ids(&cancel)?;
        Ok(store)
    }

    /// Open a durable store in `dir`, reading or creating its `recordstore.toml`
    pub fn open_dir(
        dir: impl AsRef<std::path::Path>,
        ids: Arc<dyn IdGenerator<K>>,
    ) -> StoreResult<Self> {
        let config = StoreConfig::load_dir(dir.as_ref())?;
        Self::open(&config, ids)
    }
}

impl<K: StoreKey, C: Codec> RecordStore<K, C> {
    /// Store over `engine` using the default sub-map names
    pub fn new(engine: Arc<dyn OrderedStore>, codec: C, ids: Arc<dyn IdGenerator<K>>) -> Self {
        Self::build(
            engine,
            codec,
            ids,
            DEFAULT_DATA_MAP.to_string(),
            DEFAULT_INDEX_MAP.to_string(),
        )
    }

    /// Store over `engine` using explicit sub-map names
    ///
    /// The names must be non-empty and distinct, and the index sub-map may
    /// not take the data sub-map's meta name.
    pub fn with_maps(
        engine: Arc<dyn OrderedStore>,
        codec: C,
        ids: Arc<dyn IdGenerator<K>>,
        data_map: impl Into<String>,
        index_map: impl Into<String>,
    ) -> StoreResult<Self> {
        let data_map = data_map.into();
        let index_map = index_map.into();
        if data_map.is_empty() || index_map.is_empty() {
            return Err(StoreError::InvalidInput(
                "Sub-map names cannot be empty".to_string(),
            ));
        }
        if data_map == index_map {
            return Err(StoreError::InvalidInput(format!(
                "Data and index sub-maps must differ, both are '{}'",
                data_map
            )));
        }
        if index_map == meta_map_name(&data_map) {
            return Err(StoreError::InvalidInput(format!(
                "Index sub-map '{}' is reserved",
                index_map
            )));
        }
        Ok(Self::build(engine, codec, ids, data_map, index_map))
    }

    fn build(
        engine: Arc<dyn OrderedStore>,
        codec: C,
        ids: Arc<dyn IdGenerator<K>>,
        data_map: String,
        index_map: String,
    ) -> Self {
        let index = TypeIndex::new(Arc::clone(&engine), index_map);
        let meta_map = meta_map_name(&data_map);
        Self {
            inner: Arc::new(Inner {
                engine,
                data_map,
                meta_map,
                index,
                codec,
                ids,
                tags: TagRegistry::new(),
                locks: KeyLocks::new(),
                high_water: Mutex::new(()),
            }),
        }
    }

    /// Codec used for payloads
    pub fn codec(&self) -> &C {
        &self.inner.codec
    }

    /// Sub-map holding record envelopes
    pub fn data_map(&self) -> &str {
        &self.inner.data_map
    }

    /// Sub-map holding the type index
    pub fn index_map(&self) -> &str {
        self.inner.index.map_name()
    }


    // ========================================================================
    // Reads
    // ========================================================================

    /// Fetch the record at `id` as `T`
    ///
    /// `NotFound` if nothing is stored at `id`; `Decode` if the stored
    /// record has another tag, fails to decode, or decodes to null.
    pub fn get<T: Record<K>>(&self, id: &K, cancel: &CancelToken) -> StoreResult<T> {
        cancel.check()?;
        let tag = self.inner.tags.resolve::<K, T>()?;
        let raw = self
            .inner
            .engine
            .get(&self.inner.data_map, &id.to_key_bytes())?
            .ok_or_else(|| StoreError::not_found(id))?;
        self.decode_record(id, &tag, &raw)
    }

    /// Lazily fetch each id in `ids` as `T`, in input order
    ///
    /// Ids with nothing stored are skipped. Ids whose record fails to decode
    /// yield a `Decode` error and iteration continues. If `cancel` fires,
    /// the iterator yields one `Cancelled` and then ends.
    pub fn get_many<T, I>(&self, ids: I, cancel: &CancelToken) -> GetMany<K, C, T, I::IntoIter>
    where
        T: Record<K>,
        I: IntoIterator<Item = K>,
    {
        let (tag, pending) = match self.inner.tags.resolve::<K, T>() {
            Ok(tag) => (Some(tag), None),
            Err(e) => (None, Some(e)),
        };
        GetMany {
            store: self.clone(),
            ids: ids.into_iter(),
            tag,
            pending,
            cancel: cancel.clone(),
            done: false,
            _record: PhantomData,
        }
    }

    /// Ids registered for `T`, ascending
    pub fn get_all_ids<T: Record<K>>(&self, cancel: &CancelToken) -> StoreResult<Vec<K>> {
        cancel.check()?;
        let tag = self.inner.tags.resolve::<K, T>()?;
        self.inner.index.list(&tag)
    }

    /// Every record of type `T` with its id, ascending by id
    ///
    /// Index entries whose record has gone missing are skipped, like
    /// [`get_many`](Self::get_many).
    pub fn get_all<T: Record<K>>(&self, cancel: &CancelToken) -> StoreResult<Vec<(K, T)>> {
        let ids = self.get_all_ids::<T>(cancel)?;
        let tag = self.inner.tags.resolve::<K, T>()?;
        let mut records = Vec::with_capacity(ids.len());
        for id in ids {
            cancel.check()?;
            if let Some(raw) = self.inner.engine.get(&self.inner.data_map, &id.to_key_bytes())? {
                let record = self.decode_record(&id, &tag, &raw)?;
                records.push((id, record));
            }
        }
        Ok(records)
    }

    /// Number of ids registered for `T`
    pub fn count<T: Record<K>>(&self, cancel: &CancelToken) -> StoreResult<usize> {
        cancel.check()?;
        let tag = self.inner.tags.resolve::<K, T>()?;
        self.inner.index.count(&tag)
    }

    /// Whether a record stored as `T` exists at `id`
    ///
    /// Checks the stored tag only; the payload is not decoded.
    pub fn contains<T: Record<K>>(&self, id: &K, cancel: &CancelToken) -> StoreResult<bool> {
        cancel.check()?;
        let tag = self.inner.tags.resolve::<K, T>()?;
        match self.inner.engine.get(&self.inner.data_map, &id.to_key_bytes())? {
            Some(raw) => Ok(matches!(decode_envelope(&raw), Ok((stored, _)) if stored == tag)),
            None => Ok(false),
        }
    }

    /// Largest id in the data sub-map, across all types
    ///
    /// Drops when the newest record is deleted; use
    /// [`id_high_water`](Self::id_high_water) to seed a generator.
    pub fn last_id(&self, cancel: &CancelToken) -> StoreResult<Option<K>> {
        cancel.check()?;
        let raw = self.inner.engine.last_key(&self.inner.data_map)?;
        self.parse_id(raw, &self.inner.data_map)
    }

    /// Largest id this store has generated or holds, across restarts
    ///
    /// Never drops: a generated id stays counted after its record is deleted.
    pub fn id_high_water(&self, cancel: &CancelToken) -> StoreResult<Option<K>> {
        let last = self.last_id(cancel)?;
        let raw = self.inner.engine.get(&self.inner.meta_map, HIGH_WATER_KEY)?;
        let mark = self.parse_id(raw, &self.inner.meta_map)?;
        Ok(match (last, mark) {
            (Some(a), Some(b)) => Some(if a.to_key_bytes() >= b.to_key_bytes() { a } else { b }),
            (a, b) => a.or(b),
        })
    }

    /// Move the id generator past [`id_high_water`](Self::id_high_water)
    ///
    /// Returns the mark it moved past.
    pub fn resume_ids(&self, cancel: &CancelToken) -> StoreResult<Option<K>> {
        let mark = self.id_high_water(cancel)?;
        if let Some(id) = &mark {
            self.inner.ids.skip_through(id);
            debug!(target: "recordstore::store", id = ?id, "Id generator resumed");
        }
        Ok(mark)
    }

    fn parse_id(&self, raw: Option<Vec<u8>>, map: &str) -> StoreResult<Option<K>> {
        match raw {
            Some(raw) => K::from_key_bytes(&raw).map(Some).ok_or_else(|| {
                StoreError::Corruption(format!("Sub-map '{}' holds a malformed id", map))
            }),
            None => Ok(None),
        }
    }

    // ========================================================================
    // Writes
    // ========================================================================

    /// Store a new record and return it with the id it was stored under
    ///
    /// The id is the record's own (`Record::record_id`) or, failing that,
    /// a fresh one from the id generator. The id is returned even when the
    /// insert fails. A record already stored at the id, of any type, is
    /// `AlreadyExists`; one of the same type that fails to decode surfaces
    /// as `Decode` and is left untouched.
    pub fn insert<T: Record<K>>(&self, data: T, cancel: &CancelToken) -> (StoreResult<T>, K) {
        let (id, generated) = self.resolve_id(&data);
        let result = self.insert_at(&id, generated, data, cancel);
        (result, id)
    }

    /// The record's own id, or a generated one (flagged `true`)
    pub(crate) fn resolve_id<T: Record<K>>(&self, data: &T) -> (K, bool) {
        match data.record_id() {
            Some(id) => (id, false),
            None => (self.inner.ids.create_id(), true),
        }
    }

    pub(crate) fn insert_at<T: Record<K>>(
        &self,
        id: &K,
        generated: bool,
        data: T,
        cancel: &CancelToken,
    ) -> StoreResult<T> {
        cancel.check()?;
        let tag = self.inner.tags.resolve::<K, T>()?;
        let key = id.to_key_bytes();
        let _guard = self.inner.locks.lock(&key);
        cancel.check()?;

        if let Some(raw) = self.inner.engine.get(&self.inner.data_map, &key)? {
            return Err(self.collision::<T>(id, &tag, &raw));
        }

        let payload = self.inner.codec.encode(&data)?;
        if generated {
            self.raise_high_water(&key)?;
        }
        self.inner
            .engine
            .upsert(&self.inner.data_map, &key, &encode_envelope(&tag, &payload))?;
        self.inner.index.add(&tag, id)?;

        debug!(target: "recordstore::store", id = ?id, tag = %tag, "Record inserted");
        Ok(data)
    }

    /// Record `key` as the high-water mark if it sorts after the current one
    fn raise_high_water(&self, key: &[u8]) -> StoreResult<()> {
        let _guard = self.inner.high_water.lock();
        let current = self.inner.engine.get(&self.inner.meta_map, HIGH_WATER_KEY)?;
        if current.as_deref().map_or(true, |mark| key > mark) {
            self.inner
                .engine
                .upsert(&self.inner.meta_map, HIGH_WATER_KEY, key)?;
        }
        Ok(())
    }

    /// Classify an existing record found by `insert`
    fn collision<T: Record<K>>(&self, id: &K, tag: &TypeTag, raw: &[u8]) -> StoreError {
        match decode_envelope(raw) {
            Ok((stored, _)) if stored != *tag => StoreError::already_exists(id),
            _ => match self.decode_record::<T>(id, tag, raw) {
                Ok(_) => StoreError::already_exists(id),
                Err(e) => e,
            },
        }
    }

    /// Write `data` at `id` whether or not something is stored there
    ///
    /// Registers `id` under `T`'s tag. If `id` held a record of another
    /// type, that type's index entry is dropped.
    pub fn save<T: Record<K>>(&self, id: &K, data: T, cancel: &CancelToken) -> StoreResult<T> {
        cancel.check()?;
        let tag = self.inner.tags.resolve::<K, T>()?;
        let payload = self.inner.codec.encode(&data)?;
        let key = id.to_key_bytes();
        let _guard = self.inner.locks.lock(&key);
        cancel.check()?;

        let previous = self.inner.engine.get(&self.inner.data_map, &key)?;
        self.inner
            .engine
            .upsert(&self.inner.data_map, &key, &encode_envelope(&tag, &payload))?;

        if let Some(Ok((previous_tag, _))) = previous.as_deref().map(decode_envelope) {
            if previous_tag != tag {
                self.inner.index.remove(&previous_tag, id)?;
            }
        }
        self.inner.index.add(&tag, id)?;

        debug!(
            target: "recordstore::store",
            id = ?id,
            tag = %tag,
            replaced = previous.is_some(),
            "Record saved"
        );
        Ok(data)
    }

    /// Remove the record at `id` and return it
    ///
    /// The record is read first; if it is missing or does not decode as
    /// `T`, nothing is written and the `get` error is returned.
    pub fn delete<T: Record<K>>(&self, id: &K, cancel: &CancelToken) -> StoreResult<T> {
        cancel.check()?;
        let tag = self.inner.tags.resolve::<K, T>()?;
        let key = id.to_key_bytes();
        let _guard = self.inner.locks.lock(&key);
        cancel.check()?;

        let raw = self
            .inner
            .engine
            .get(&self.inner.data_map, &key)?
            .ok_or_else(|| StoreError::not_found(id))?;
        let value = self.decode_record(id, &tag, &raw)?;

        self.inner.engine.delete(&self.inner.data_map, &key)?;
        self.inner.index.remove(&tag, id)?;

        debug!(target: "recordstore::store", id = ?id, tag = %tag, "Record deleted");
        Ok(value)
    }

    /// Make completed writes durable
    pub fn flush(&self, cancel: &CancelToken) -> StoreResult<()> {
        cancel.check()?;
        self.inner.engine.flush()
    }

    // ========================================================================
    // Helpers
    // ========================================================================

    pub(crate) fn decode_record<T: Record<K>>(
        &self,
        id: &K,
        tag: &TypeTag,
        raw: &[u8],
    ) -> StoreResult<T> {
        let (stored, payload) =
            decode_envelope(raw).map_err(|e| StoreError::decode(id, e.to_string()))?;
        if stored != *tag {
            return Err(StoreError::decode(
                id,
                format!("stored as '{}', requested as '{}'", stored, tag),
            ));
        }
        match self.inner.codec.decode::<T>(payload) {
            Ok(Some(value)) => Ok(value),
            Ok(None) => Err(StoreError::decode(id, "payload decoded to null")),
            Err(e) => Err(StoreError::decode(id, e.to_string())),
        }
    }
}

/// Lazy batch lookup returned by [`RecordStore::get_many`]
pub struct GetMany<K: StoreKey, C, T, I> {
    store: RecordStore<K, C>,
    ids: I,
    tag: Option<TypeTag>,
    pending: Option<StoreError>,
    cancel: CancelToken,
    done: bool,
    _record: PhantomData<fn() -> T>,
}

impl<K, C, T, I> Iterator for GetMany<K, C, T, I>
where
    K: StoreKey,
    C: Codec,
    T: Record<K>,
    I: Iterator<Item = K>,
{
    type Item = StoreResult<T>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        if let Some(err) = self.pending.take() {
            self.done = true;
            return Some(Err(err));
        }
        let tag = self.tag.as_ref()?;

        loop {
            if self.cancel.is_cancelled() {
                self.done = true;
                return Some(Err(StoreError::Cancelled));
            }
            let Some(id) = self.ids.next() else {
                self.done = true;
                return None;
            };
            let inner = &self.store.inner;
            match inner.engine.get(&inner.data_map, &id.to_key_bytes()) {
                Ok(Some(raw)) => return Some(self.store.decode_record(&id, tag, &raw)),
                Ok(None) => continue,
                Err(e) => return Some(Err(e)),
            }
        }
    }
}

impl<K, C, T, I> FusedIterator for GetMany<K, C, T, I>
where
    K: StoreKey,
    C: Codec,
    T: Record<K>,
    I: Iterator<Item = K>,
{
}

impl<K: StoreKey, C, T, I> fmt::Debug for GetMany<K, C, T, I> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GetMany")
            .field("tag", &self.tag)
            .field("done", &self.done)
            .finish()
    }
}

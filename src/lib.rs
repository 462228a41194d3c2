//! Recordstore - typed records over an ordered key-value engine
//!
//! Recordstore lets one physical ordered engine hold records of many types.
//! Each record type names a stable tag; a type index in its own sub-map
//! tracks which ids belong to which tag, so "all ids of type T" is a prefix
//! scan instead of a full table walk.
//!
//! # Quick Start
//!
//! ```
//! use std::sync::Arc;
//! use recordstore::{AnyCodec, CancelToken, Record, RecordStore, SequenceGenerator, StoreConfig};
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
//! struct Widget {
//!     name: String,
//! }
//!
//! impl Record<u64> for Widget {
//!     const TYPE_TAG: &'static str = "widget";
//! }
//!
//! # fn main() -> recordstore::StoreResult<()> {
//! // In-memory store; set `path` for a durable one
//! let store = RecordStore::<u64, AnyCodec>::open(
//!     &StoreConfig::in_memory(),
//!     Arc::new(SequenceGenerator::default()),
//! )?;
//! let cancel = CancelToken::none();
//!
//! let (widget, id) = store.insert(Widget { name: "a".into() }, &cancel);
//! assert_eq!(widget?.name, "a");
//! assert_eq!(store.get::<Widget>(&id, &cancel)?.name, "a");
//! assert_eq!(store.get_all_ids::<Widget>(&cancel)?, vec![id]);
//! # Ok(())
//! # }
//! ```
//!
//! # Architecture
//!
//! - `recordstore-core`: keys, tags, errors, cancellation, capability traits
//! - `recordstore-storage`: memory and WAL-backed engines, the type index
//! - `recordstore-engine`: the record store, codecs, id generators, config

pub use recordstore_core::{
    CancelToken, Codec, IdGenerator, OrderedStore, Record, StoreError, StoreKey, StoreResult,
    TagError, TypeTag,
};
pub use recordstore_engine::{
    AnyCodec, GetMany, IndexReport, JsonCodec, MsgPackCodec, RebuildStats, RecordStore,
    SequenceGenerator, StoreConfig, UuidGenerator, CONFIG_FILE_NAME,
};
pub use recordstore_storage::{DurabilityMode, DurableStore, MemoryStore, TypeIndex};

#[cfg(feature = "async")]
pub use recordstore_engine::AsyncRecordStore;

pub use recordstore_core as types;
pub use recordstore_engine as engine;
pub use recordstore_storage as storage;

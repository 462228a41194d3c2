//! Record store engine for recordstore
//!
//! This crate puts typed records on top of an ordered engine:
//! - RecordStore: CRUD protocol, type index upkeep, per-key write locks
//! - Codecs: JSON and MessagePack payload encoding
//! - Id generators: monotonic sequence and random UUIDs
//! - StoreConfig: `recordstore.toml` loading and validation
//! - Index recovery: verify and rebuild the type index from data
//! - AsyncRecordStore: tokio adapter (feature `async`)

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod codec;
pub mod config;
pub mod envelope;
pub mod ids;
pub mod locks;
pub mod repair;
pub mod store;
pub mod tags;

#[cfg(feature = "async")]
pub mod async_store;

pub use codec::{AnyCodec, JsonCodec, MsgPackCodec};
pub use config::{StoreConfig, CONFIG_FILE_NAME, DEFAULT_DATA_MAP};
pub use envelope::{decode_envelope, encode_envelope};
pub use ids::{SequenceGenerator, UuidGenerator};
pub use locks::{KeyLocks, LOCK_STRIPES};
pub use repair::{IndexReport, RebuildStats};
pub use store::{meta_map_name, GetMany, RecordStore};
pub use tags::TagRegistry;

#[cfg(feature = "async")]
pub use async_store::AsyncRecordStore;

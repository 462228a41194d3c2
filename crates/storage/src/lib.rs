//! Storage layer for recordstore
//!
//! This crate implements the ordered engines and the type index:
//! - MemoryStore: BTreeMap-per-sub-map storage with RwLock
//! - DurableStore: MemoryStore image + write-ahead log with replay and checkpoint
//! - TypeIndex: combined `(tag, id)` index in its own sub-map
//! - WAL: CRC-framed entry encoding, writer and replay

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod durable;
pub mod index;
pub mod memory;
pub mod wal;

pub use durable::{DurableStore, CHECKPOINT_TMP_NAME, WAL_FILE_NAME};
pub use index::{index_key, split_index_key, tag_prefix, TypeIndex, DEFAULT_INDEX_MAP};
pub use memory::MemoryStore;
pub use wal::{DurabilityMode, WalEntry};

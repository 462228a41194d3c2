//! Write-Ahead Log (WAL) module.
//!
//! - **Single log file**: `records.wal` in the store directory
//! - **Self-delimiting records**: Each record has length prefix and CRC32 checksum
//! - **Durability modes**: Strict, Batched
//! - **Crash recovery**: Replay tolerates a torn final write, rejects mid-log damage
//!
//! # Key Invariants
//!
//! - The log is append-only between checkpoints
//! - A checkpoint replaces the log atomically (write temp file, fsync, rename)

mod durability;
pub mod entry;
pub mod reader;
pub mod writer;

pub use durability::DurabilityMode;
pub use entry::{decode_entry, encode_entry, FrameError, WalEntry};
pub use reader::{decode_log, read_log, WalReplay};
pub use writer::WalWriter;

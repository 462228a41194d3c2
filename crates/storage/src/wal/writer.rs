//! Append side of the write-ahead log
//!
//! The log is a single file of self-delimiting frames (see [`super::entry`]).
//! Appends go through a `BufWriter`; the durability mode decides when the
//! buffer is flushed and fsynced.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;

use recordstore_core::{StoreError, StoreResult};

use super::durability::DurabilityMode;
use super::entry::{encode_entry, WalEntry};

/// Write-Ahead Log file handle
///
/// Not internally synchronized: callers serialize appends (the durable
/// store holds it behind a mutex together with the in-memory image).
#[derive(Debug)]
pub struct WalWriter {
    path: PathBuf,
    writer: BufWriter<File>,
    size: u64,
    durability_mode: DurabilityMode,
    last_fsync: Instant,
    writes_since_fsync: usize,
}

impl WalWriter {
    /// Open an existing log for appending, or create it
    ///
    /// Creates parent directories if they don't exist.
    pub fn open<P: AsRef<Path>>(path: P, durability_mode: DurabilityMode) -> StoreResult<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        let size = file.metadata()?.len();

        Ok(Self {
            path,
            writer: BufWriter::new(file),
            size,
            durability_mode,
            last_fsync: Instant::now(),
            writes_since_fsync: 0,
        })
    }

    /// Append an entry, honouring the durability mode
    ///
    /// Returns the offset at which the entry starts.
    pub fn append(&mut self, entry: &WalEntry) -> StoreResult<u64> {
        let offset = self.size;
        let encoded = encode_entry(entry)?;

        self.writer.write_all(&encoded).map_err(|e| {
            StoreError::Storage(format!("Failed to write entry at offset {}: {}", offset, e))
        })?;
        self.size += encoded.len() as u64;

        match self.durability_mode {
            DurabilityMode::Strict => self.fsync()?,
            DurabilityMode::Batched {
                interval_ms,
                batch_size,
            } => {
                self.writes_since_fsync += 1;
                let elapsed = self.last_fsync.elapsed().as_millis() as u64;
                if elapsed >= interval_ms || self.writes_since_fsync >= batch_size {
                    self.fsync()?;
                }
            }
        }

        Ok(offset)
    }

    /// Force buffered entries to disk (flush + fsync)
    pub fn fsync(&mut self) -> StoreResult<()> {
        self.writer
            .flush()
            .map_err(|e| StoreError::Storage(format!("Failed to flush WAL: {}", e)))?;
        self.writer
            .get_ref()
            .sync_all()
            .map_err(|e| StoreError::Storage(format!("Failed to fsync WAL: {}", e)))?;
        self.last_fsync = Instant::now();
        self.writes_since_fsync = 0;
        Ok(())
    }

    /// Current file size (offset of the next append)
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Log file path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Configured durability mode
    pub fn durability_mode(&self) -> DurabilityMode {
        self.durability_mode
    }
}

impl Drop for WalWriter {
    fn drop(&mut self) {
        let _ = self.writer.flush();
    }
}

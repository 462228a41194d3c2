//! Replay side of the write-ahead log
//!
//! Reads every complete frame from the start of the file. When a frame
//! fails to decode, the rest of the file is searched for any later frame
//! that passes its CRC:
//!
//! - none found: the bad bytes are a torn write from a crash, and replay
//!   reports how many bytes are valid so the caller can truncate
//! - one found: committed frames sit behind the damage, so the replay fails
//!   with `Corruption` and nothing is truncated
//!
//! This covers a damaged length field too, which can make an early frame
//! look as if it runs past the end of the file.

use std::path::Path;

use recordstore_core::{StoreError, StoreResult};

use super::entry::{decode_entry, FrameError, WalEntry};

/// Outcome of reading a log file
#[derive(Debug, Default)]
pub struct WalReplay {
    /// Entries in append order
    pub entries: Vec<WalEntry>,
    /// Byte length of the valid prefix
    pub valid_len: u64,
    /// Bytes after the valid prefix (a torn final write)
    pub torn_bytes: u64,
}

/// Read all entries of the log at `path`
///
/// A missing file replays as empty.
pub fn read_log(path: &Path) -> StoreResult<WalReplay> {
    let buf = match std::fs::read(path) {
        Ok(buf) => buf,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(WalReplay::default()),
        Err(e) => return Err(e.into()),
    };
    decode_log(&buf)
}

/// Decode an in-memory copy of a log
pub fn decode_log(buf: &[u8]) -> StoreResult<WalReplay> {
    let mut replay = WalReplay::default();
    let mut offset = 0usize;

    while offset < buf.len() {
        match decode_entry(&buf[offset..]) {
            Ok((entry, consumed)) => {
                replay.entries.push(entry);
                offset += consumed;
            }
            Err(err) => {
                if let Some(next) = next_valid_frame(buf, offset + 1) {
                    let reason = match err {
                        FrameError::Incomplete { have, needed } => {
                            format!("frame needs {} bytes but only {} remain", needed, have)
                        }
                        FrameError::Corrupt(reason) => reason,
                    };
                    return Err(StoreError::Corruption(format!(
                        "WAL offset {}: {} (valid frame follows at offset {})",
                        offset, reason, next
                    )));
                }
                break;
            }
        }
    }

    replay.valid_len = offset as u64;
    replay.torn_bytes = (buf.len() - offset) as u64;
    Ok(replay)
}

/// Offset of the first frame at or after `from` that decodes cleanly
fn next_valid_frame(buf: &[u8], from: usize) -> Option<usize> {
    (from..buf.len()).find(|&start| decode_entry(&buf[start..]).is_ok())
}

//! WAL entry encoding and decoding
//!
//! ## Entry Format
//!
//! ```text
//! [length: u32][type: u8][payload: bytes][crc32: u32]
//! ```
//!
//! - **length**: Total size of type + payload + crc (NOT including length itself)
//! - **type**: Entry type tag (1=Upsert, 2=Delete, 3=Clear)
//! - **payload**: bincode-serialized WalEntry
//! - **crc32**: CRC32 checksum over \[type\]\[payload\]
//!
//! All integers are little-endian.

use crc32fast::Hasher;
use serde::{Deserialize, Serialize};

use recordstore_core::{StoreError, StoreResult};

const TYPE_UPSERT: u8 = 1;
const TYPE_DELETE: u8 = 2;
const TYPE_CLEAR: u8 = 3;

/// Minimum value of the length field: type(1) + crc(4)
const MIN_ENTRY_LEN: usize = 5;

/// Maximum value of the length field
///
/// A larger length can only come from a damaged header.
pub const MAX_ENTRY_LEN: usize = 64 * 1024 * 1024;

/// A logged mutation of one sub-map
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum WalEntry {
    /// Insert or overwrite a key
    Upsert {
        /// Sub-map name
        map: String,
        /// Key bytes
        key: Vec<u8>,
        /// Value bytes
        value: Vec<u8>,
    },
    /// Remove a key
    Delete {
        /// Sub-map name
        map: String,
        /// Key bytes
        key: Vec<u8>,
    },
    /// Remove every key of a sub-map
    Clear {
        /// Sub-map name
        map: String,
    },
}

impl WalEntry {
    fn type_tag(&self) -> u8 {
        match self {
            WalEntry::Upsert { .. } => TYPE_UPSERT,
            WalEntry::Delete { .. } => TYPE_DELETE,
            WalEntry::Clear { .. } => TYPE_CLEAR,
        }
    }
}

/// Why a frame could not be decoded
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameError {
    /// Buffer ends before the frame does (torn write at the tail)
    Incomplete {
        /// Bytes available
        have: usize,
        /// Bytes the frame needs
        needed: usize,
    },
    /// Frame is complete but invalid
    Corrupt(String),
}

/// Encode a WAL entry to bytes
///
/// Format: `[length: u32][type: u8][payload: bytes][crc32: u32]`
pub fn encode_entry(entry: &WalEntry) -> StoreResult<Vec<u8>> {
    let type_tag = entry.type_tag();
    let payload = bincode::serialize(entry)?;

    let total_len = 1 + payload.len() + 4;
    if total_len > MAX_ENTRY_LEN {
        return Err(StoreError::InvalidInput(format!(
            "WAL entry too large: {} bytes (maximum is {})",
            total_len, MAX_ENTRY_LEN
        )));
    }
    let total_len_u32 = total_len as u32;

    let mut buf = Vec::with_capacity(4 + total_len);
    buf.extend_from_slice(&total_len_u32.to_le_bytes());
    buf.push(type_tag);
    buf.extend_from_slice(&payload);

    let mut hasher = Hasher::new();
    hasher.update(&[type_tag]);
    hasher.update(&payload);
    buf.extend_from_slice(&hasher.finalize().to_le_bytes());

    Ok(buf)
}

/// Decode one WAL entry from the front of `buf` with CRC validation
///
/// Returns the decoded entry and the number of bytes consumed.
pub fn decode_entry(buf: &[u8]) -> Result<(WalEntry, usize), FrameError> {
    if buf.len() < 4 {
        return Err(FrameError::Incomplete {
            have: buf.len(),
            needed: 4,
        });
    }
    let total_len = u32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]) as usize;

    if total_len < MIN_ENTRY_LEN {
        return Err(FrameError::Corrupt(format!(
            "Invalid entry length {} (minimum is {} bytes)",
            total_len, MIN_ENTRY_LEN
        )));
    }
    if total_len > MAX_ENTRY_LEN {
        return Err(FrameError::Corrupt(format!(
            "Invalid entry length {} (maximum is {} bytes)",
            total_len, MAX_ENTRY_LEN
        )));
    }

    if buf.len() < 4 + total_len {
        return Err(FrameError::Incomplete {
            have: buf.len(),
            needed: 4 + total_len,
        });
    }

    let type_tag = buf[4];
    let payload = &buf[5..4 + total_len - 4];
    let crc_start = 4 + total_len - 4;
    let expected_crc = u32::from_le_bytes([
        buf[crc_start],
        buf[crc_start + 1],
        buf[crc_start + 2],
        buf[crc_start + 3],
    ]);

    let mut hasher = Hasher::new();
    hasher.update(&[type_tag]);
    hasher.update(payload);
    let actual_crc = hasher.finalize();

    if actual_crc != expected_crc {
        return Err(FrameError::Corrupt(format!(
            "CRC mismatch: expected {:08x}, got {:08x}",
            expected_crc, actual_crc
        )));
    }

    let entry: WalEntry = bincode::deserialize(payload)
        .map_err(|e| FrameError::Corrupt(format!("Deserialization failed: {}", e)))?;

    if entry.type_tag() != type_tag {
        return Err(FrameError::Corrupt(format!(
            "Type tag mismatch: header says {}, payload is {}",
            type_tag,
            entry.type_tag()
        )));
    }

    Ok((entry, 4 + total_len))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn upsert() -> WalEntry {
        WalEntry::Upsert {
            map: "data".to_string(),
            key: 1001u64.to_be_bytes().to_vec(),
            value: br#"{"name":"a"}"#.to_vec(),
        }
    }

    #[test]
    fn test_encode_layout() {
        let bytes = encode_entry(&upsert()).unwrap();
        let total_len = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as usize;
        assert_eq!(bytes.len(), 4 + total_len);
        assert_eq!(bytes[4], TYPE_UPSERT);
    }

    #[test]
    fn test_decode_consumes_exactly_one_frame() {
        let mut buf = encode_entry(&upsert()).unwrap();
        let first_len = buf.len();
        buf.extend(
            encode_entry(&WalEntry::Clear {
                map: "index".to_string(),
            })
            .unwrap(),
        );

        let (entry, consumed) = decode_entry(&buf).unwrap();
        assert_eq!(entry, upsert());
        assert_eq!(consumed, first_len);

        let (entry, _) = decode_entry(&buf[consumed..]).unwrap();
        assert_eq!(
            entry,
            WalEntry::Clear {
                map: "index".to_string()
            }
        );
    }

    #[test]
    fn test_truncated_frame_is_incomplete() {
        let bytes = encode_entry(&upsert()).unwrap();
        let result = decode_entry(&bytes[..bytes.len() - 3]);
        assert!(matches!(result, Err(FrameError::Incomplete { .. })));

        let result = decode_entry(&bytes[..2]);
        assert!(matches!(result, Err(FrameError::Incomplete { needed: 4, .. })));
    }

    #[test]
    fn test_flipped_bit_is_corrupt() {
        let mut bytes = encode_entry(&upsert()).unwrap();
        let mid = bytes.len() / 2;
        bytes[mid] ^= 0x01;
        let result = decode_entry(&bytes);
        assert!(matches!(result, Err(FrameError::Corrupt(_))));
    }

    #[test]
    fn test_oversized_length_is_corrupt() {
        let mut bytes = encode_entry(&upsert()).unwrap();
        bytes[3] = 0xFF;
        assert!(matches!(decode_entry(&bytes), Err(FrameError::Corrupt(_))));
    }

    #[test]
    fn test_tiny_length_is_corrupt() {
        let bytes = [2u8, 0, 0, 0, 1, 0];
        assert!(matches!(decode_entry(&bytes), Err(FrameError::Corrupt(_))));
    }
}

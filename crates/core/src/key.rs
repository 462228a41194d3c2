//! Record ids and their byte encoding
//!
//! The engine orders keys by raw bytes, so every [`StoreKey`] encoding must
//! preserve the key's `Ord`: for any `a < b`, `a.to_key_bytes() < b.to_key_bytes()`.
//! Integers use big-endian bytes (signed integers flip the sign bit),
//! strings use their UTF-8 bytes and UUIDs their 16 raw bytes.

use std::fmt::Debug;

use uuid::Uuid;

/// Identifier type accepted by a record store
pub trait StoreKey: Ord + Clone + Debug + Send + Sync + 'static {
    /// Order-preserving byte encoding
    fn to_key_bytes(&self) -> Vec<u8>;

    /// Decode bytes produced by `to_key_bytes`; `None` if malformed
    fn from_key_bytes(bytes: &[u8]) -> Option<Self>;
}

impl StoreKey for u64 {
    fn to_key_bytes(&self) -> Vec<u8> {
        self.to_be_bytes().to_vec()
    }

    fn from_key_bytes(bytes: &[u8]) -> Option<Self> {
        Some(u64::from_be_bytes(bytes.try_into().ok()?))
    }
}

impl StoreKey for u32 {
    fn to_key_bytes(&self) -> Vec<u8> {
        self.to_be_bytes().to_vec()
    }

    fn from_key_bytes(bytes: &[u8]) -> Option<Self> {
        Some(u32::from_be_bytes(bytes.try_into().ok()?))
    }
}

const SIGN_BIT: u64 = 1 << 63;

impl StoreKey for i64 {
    fn to_key_bytes(&self) -> Vec<u8> {
        ((*self as u64) ^ SIGN_BIT).to_be_bytes().to_vec()
    }

    fn from_key_bytes(bytes: &[u8]) -> Option<Self> {
        let raw = u64::from_be_bytes(bytes.try_into().ok()?);
        Some((raw ^ SIGN_BIT) as i64)
    }
}

impl StoreKey for String {
    fn to_key_bytes(&self) -> Vec<u8> {
        self.as_bytes().to_vec()
    }

    fn from_key_bytes(bytes: &[u8]) -> Option<Self> {
        String::from_utf8(bytes.to_vec()).ok()
    }
}

impl StoreKey for Uuid {
    fn to_key_bytes(&self) -> Vec<u8> {
        self.as_bytes().to_vec()
    }

    fn from_key_bytes(bytes: &[u8]) -> Option<Self> {
        Uuid::from_slice(bytes).ok()
    }
}

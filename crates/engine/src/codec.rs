//! Payload codecs
//!
//! - [`JsonCodec`]: `serde_json`, human-readable payloads
//! - [`MsgPackCodec`]: `rmp-serde` with named fields, compact payloads
//! - [`AnyCodec`]: one of the above, chosen at runtime from configuration
//!
//! All codecs decode through `Option<T>`, so a stored null comes back as
//! `Ok(None)` rather than an error; the record store reports that as a
//! decode failure of the record.

use std::str::FromStr;

use serde::de::DeserializeOwned;
use serde::Serialize;

use recordstore_core::{Codec, StoreError, StoreResult};

/// JSON payloads via `serde_json`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct JsonCodec;

impl Codec for JsonCodec {
    fn name(&self) -> &'static str {
        "json"
    }

    fn encode<T: Serialize>(&self, value: &T) -> StoreResult<Vec<u8>> {
        serde_json::to_vec(value).map_err(|e| StoreError::Serialization(e.to_string()))
    }

    fn decode<T: DeserializeOwned>(&self, payload: &[u8]) -> StoreResult<Option<T>> {
        serde_json::from_slice::<Option<T>>(payload)
            .map_err(|e| StoreError::Serialization(e.to_string()))
    }
}

/// MessagePack payloads via `rmp-serde`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MsgPackCodec;

impl Codec for MsgPackCodec {
    fn name(&self) -> &'static str {
        "msgpack"
    }

    fn encode<T: Serialize>(&self, value: &T) -> StoreResult<Vec<u8>> {
        rmp_serde::to_vec_named(value).map_err(|e| StoreError::Serialization(e.to_string()))
    }

    fn decode<T: DeserializeOwned>(&self, payload: &[u8]) -> StoreResult<Option<T>> {
        rmp_serde::from_slice::<Option<T>>(payload)
            .map_err(|e| StoreError::Serialization(e.to_string()))
    }
}

/// Runtime-selected codec
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnyCodec {
    /// JSON
    Json(JsonCodec),
    /// MessagePack
    MsgPack(MsgPackCodec),
}

impl Default for AnyCodec {
    fn default() -> Self {
        AnyCodec::Json(JsonCodec)
    }
}

impl FromStr for AnyCodec {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "json" => Ok(AnyCodec::Json(JsonCodec)),
            "msgpack" => Ok(AnyCodec::MsgPack(MsgPackCodec)),
            other => Err(StoreError::InvalidInput(format!(
                "Unknown codec '{}'. Expected \"json\" or \"msgpack\".",
                other
            ))),
        }
    }
}

impl Codec for AnyCodec {
    fn name(&self) -> &'static str {
        match self {
            AnyCodec::Json(c) => c.name(),
            AnyCodec::MsgPack(c) => c.name(),
        }
    }

    fn encode<T: Serialize>(&self, value: &T) -> StoreResult<Vec<u8>> {
        match self {
            AnyCodec::Json(c) => c.encode(value),
            AnyCodec::MsgPack(c) => c.encode(value),
        }
    }

    fn decode<T: DeserializeOwned>(&self, payload: &[u8]) -> StoreResult<Option<T>> {
        match self {
            AnyCodec::Json(c) => c.decode(payload),
            AnyCodec::MsgPack(c) => c.decode(payload),
        }
    }
}

//! Error types for recordstore
//!
//! Every fallible operation returns [`StoreResult`]. The first four variants
//! are the caller-facing outcomes of the record protocol (`NotFound`,
//! `Decode`, `AlreadyExists`, `Cancelled`); the rest describe failures of the
//! underlying engine, codec or configuration.
//!
//! We use `thiserror` for automatic `Display` and `Error` trait implementations.

use std::fmt;
use std::io;

use thiserror::Error;

use crate::types::TagError;

/// Result type alias for recordstore operations
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Error types for recordstore
#[derive(Debug, Error)]
pub enum StoreError {
    /// No payload exists at the given id
    #[error("Record not found: {id}")]
    NotFound {
        /// Debug rendering of the id
        id: String,
    },

    /// A payload exists but cannot be decoded as the requested type
    #[error("Failed to decode record {id}: {reason}")]
    Decode {
        /// Debug rendering of the id
        id: String,
        /// Why decoding failed
        reason: String,
    },

    /// Insert collided with an existing record
    #[error("Record already exists: {id}")]
    AlreadyExists {
        /// Debug rendering of the id
        id: String,
    },

    /// Operation abandoned because its cancel token was signalled
    #[error("Operation cancelled")]
    Cancelled,

    /// Two different record types claimed the same type tag
    #[error("Type tag '{tag}' is bound to {existing}, cannot reuse it for {requested}")]
    TagConflict {
        /// The contested tag
        tag: String,
        /// Type the tag was first bound to
        existing: &'static str,
        /// Type that attempted to reuse it
        requested: &'static str,
    },

    /// Type tag failed validation
    #[error("Invalid type tag: {0}")]
    InvalidTypeTag(#[from] TagError),

    /// Encoding a value failed
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Persisted bytes are malformed (WAL frame, key or envelope)
    #[error("Data corruption: {0}")]
    Corruption(String),

    /// Storage engine failure
    #[error("Storage error: {0}")]
    Storage(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Invalid configuration or argument
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl StoreError {
    /// Build a `NotFound` error for an id
    pub fn not_found(id: &impl fmt::Debug) -> Self {
        StoreError::NotFound {
            id: format!("{:?}", id),
        }
    }

    /// Build a `Decode` error for an id
    pub fn decode(id: &impl fmt::Debug, reason: impl Into<String>) -> Self {
        StoreError::Decode {
            id: format!("{:?}", id),
            reason: reason.into(),
        }
    }

    /// Build an `AlreadyExists` error for an id
    pub fn already_exists(id: &impl fmt::Debug) -> Self {
        StoreError::AlreadyExists {
            id: format!("{:?}", id),
        }
    }

    /// True for `NotFound`
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound { .. })
    }

    /// True for `Decode`
    pub fn is_decode(&self) -> bool {
        matches!(self, StoreError::Decode { .. })
    }

    /// True for `AlreadyExists`
    pub fn is_already_exists(&self) -> bool {
        matches!(self, StoreError::AlreadyExists { .. })
    }

    /// True for `Cancelled`
    pub fn is_cancelled(&self) -> bool {
        matches!(self, StoreError::Cancelled)
    }
}

impl From<bincode::Error> for StoreError {
    fn from(e: bincode::Error) -> Self {
        StoreError::Serialization(e.to_string())
    }
}

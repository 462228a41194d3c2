//! Core types and traits for recordstore
//!
//! This crate defines the foundational types used throughout the system:
//! - StoreKey: Order-preserving byte encoding for record ids
//! - TypeTag: Explicit discriminator partitioning the type index
//! - Record: Trait implemented by every persisted type
//! - CancelToken: Cooperative cancellation signal
//! - StoreError: Error taxonomy
//! - Traits: Capability traits (OrderedStore, IdGenerator, Codec)

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod cancel;
pub mod error;
pub mod key;
pub mod traits;
pub mod types;

pub use cancel::CancelToken;
pub use error::{StoreError, StoreResult};
pub use key::StoreKey;
pub use traits::{Codec, IdGenerator, OrderedStore};
pub use types::{validate_tag, Record, TagError, TypeTag, MAX_TAG_BYTES, RESERVED_TAG_PREFIX};

//! Record typing: type tags and the `Record` trait
//!
//! A [`TypeTag`] is the explicit, stable discriminator that partitions the
//! type index. Each record type names its tag through [`Record::TYPE_TAG`];
//! nothing is derived from runtime type identity.
//!
//! ## Tag rules
//!
//! - Tags must not be empty
//! - Tags must not contain NUL bytes (\0)
//! - Tags must not start with reserved prefix `_rs/`
//! - Tags must not exceed `MAX_TAG_BYTES` (128)

use std::fmt;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Reserved prefix for internal tags
pub const RESERVED_TAG_PREFIX: &str = "_rs/";

/// Maximum tag length in bytes
pub const MAX_TAG_BYTES: usize = 128;

/// Type tag validation errors
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TagError {
    /// Tag is empty (length 0)
    #[error("Type tag cannot be empty")]
    Empty,

    /// Tag contains NUL byte (\0)
    #[error("Type tag cannot contain NUL bytes")]
    ContainsNul,

    /// Tag uses the reserved prefix
    #[error("Type tag cannot use reserved prefix '{}'", RESERVED_TAG_PREFIX)]
    ReservedPrefix,

    /// Tag exceeds maximum length
    #[error("Type tag too long: {actual} bytes exceeds maximum {max}")]
    TooLong {
        /// Actual tag length in bytes
        actual: usize,
        /// Maximum allowed length
        max: usize,
    },
}

/// Validate a raw tag string
pub fn validate_tag(tag: &str) -> Result<(), TagError> {
    if tag.is_empty() {
        return Err(TagError::Empty);
    }
    if tag.contains('\x00') {
        return Err(TagError::ContainsNul);
    }
    if tag.starts_with(RESERVED_TAG_PREFIX) {
        return Err(TagError::ReservedPrefix);
    }
    if tag.len() > MAX_TAG_BYTES {
        return Err(TagError::TooLong {
            actual: tag.len(),
            max: MAX_TAG_BYTES,
        });
    }
    Ok(())
}

/// Discriminator identifying which logical record type an id belongs to
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TypeTag(String);

impl TypeTag {
    /// Create a validated tag
    pub fn new(tag: impl Into<String>) -> Result<Self, TagError> {
        let tag = tag.into();
        validate_tag(&tag)?;
        Ok(TypeTag(tag))
    }

    /// Tag for a record type
    pub fn of<K, T: Record<K>>() -> Result<Self, TagError> {
        Self::new(T::TYPE_TAG)
    }

    /// Tag as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Tag as raw bytes
    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for TypeTag {
    type Error = TagError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        TypeTag::new(value)
    }
}

impl From<TypeTag> for String {
    fn from(tag: TypeTag) -> Self {
        tag.0
    }
}

/// A value that can be persisted in a record store keyed by `K`
///
/// # Example
///
/// ```
/// use recordstore_core::Record;
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Serialize, Deserialize)]
/// struct Widget {
///     name: String,
/// }
///
/// impl Record<u64> for Widget {
///     const TYPE_TAG: &'static str = "widget";
/// }
/// ```
pub trait Record<K>: Serialize + DeserializeOwned + Send + 'static {
    /// Stable discriminator for this type; must be unique per store
    const TYPE_TAG: &'static str;

    /// The record's own id, if the type carries identity
    ///
    /// Returning `None` makes `insert` ask the id generator for a fresh id.
    fn record_id(&self) -> Option<K> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Serialize, Deserialize)]
    struct Note {
        id: u64,
    }

    impl Record<u64> for Note {
        const TYPE_TAG: &'static str = "note";

        fn record_id(&self) -> Option<u64> {
            Some(self.id)
        }
    }

    #[test]
    fn test_valid_tags() {
        assert!(TypeTag::new("widget").is_ok());
        assert!(TypeTag::new("billing.invoice/v2").is_ok());
        assert!(TypeTag::new("x".repeat(MAX_TAG_BYTES)).is_ok());
    }

    #[test]
    fn test_invalid_tags() {
        assert_eq!(TypeTag::new(""), Err(TagError::Empty));
        assert_eq!(TypeTag::new("a\0b"), Err(TagError::ContainsNul));
        assert_eq!(TypeTag::new("_rs/index"), Err(TagError::ReservedPrefix));
        assert_eq!(
            TypeTag::new("x".repeat(MAX_TAG_BYTES + 1)),
            Err(TagError::TooLong {
                actual: MAX_TAG_BYTES + 1,
                max: MAX_TAG_BYTES
            })
        );
    }

    #[test]
    fn test_tag_of_record() {
        let tag = TypeTag::of::<u64, Note>().unwrap();
        assert_eq!(tag.as_str(), "note");
        assert_eq!(tag.to_string(), "note");
    }

    #[test]
    fn test_record_id_default_and_override() {
        #[derive(Serialize, Deserialize)]
        struct Anonymous;
        impl Record<u64> for Anonymous {
            const TYPE_TAG: &'static str = "anonymous";
        }

        assert_eq!(Anonymous.record_id(), None);
        assert_eq!(Note { id: 7 }.record_id(), Some(7));
    }

    #[test]
    fn test_tag_serde_validates() {
        let ok: Result<TypeTag, _> = bincode::deserialize(&bincode::serialize("widget").unwrap());
        assert!(ok.is_ok());
        let bad: Result<TypeTag, _> = bincode::deserialize(&bincode::serialize("").unwrap());
        assert!(bad.is_err());
    }
}

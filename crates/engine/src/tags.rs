//! Tag registry: binds each type tag to one Rust type per store
//!
//! Tags are explicit strings, so two unrelated record types could declare
//! the same one by accident. The registry records the first type to use a
//! tag and rejects any other type that later claims it.

use std::any::{type_name, TypeId};

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use recordstore_core::{Record, StoreError, StoreResult, TypeTag};

#[derive(Debug, Clone, Copy)]
struct Binding {
    type_id: TypeId,
    type_name: &'static str,
}

/// Tag → type bindings for one store
#[derive(Debug, Default)]
pub struct TagRegistry {
    bindings: DashMap<TypeTag, Binding>,
}

impl TagRegistry {
    /// Empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate `T`'s tag and bind it to `T` on first use
    ///
    /// Fails with `InvalidTypeTag` for a malformed tag and `TagConflict` if
    /// the tag is already bound to a different type.
    pub fn resolve<K, T: Record<K>>(&self) -> StoreResult<TypeTag> {
        let tag = TypeTag::of::<K, T>()?;
        let requested = Binding {
            type_id: TypeId::of::<T>(),
            type_name: type_name::<T>(),
        };

        match self.bindings.entry(tag.clone()) {
            Entry::Occupied(existing) => {
                let existing = *existing.get();
                if existing.type_id != requested.type_id {
                    return Err(StoreError::TagConflict {
                        tag: tag.to_string(),
                        existing: existing.type_name,
                        requested: requested.type_name,
                    });
                }
            }
            Entry::Vacant(slot) => {
                slot.insert(requested);
            }
        }
        Ok(tag)
    }

    /// Name of the type bound to `tag`, if any
    pub fn bound_type(&self, tag: &TypeTag) -> Option<&'static str> {
        self.bindings.get(tag).map(|b| b.type_name)
    }

    /// Number of bound tags
    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    /// Whether no tag is bound yet
    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}

//! Id generators
//!
//! - [`SequenceGenerator`]: strictly increasing `u64` ids
//! - [`UuidGenerator`]: random v4 `Uuid` ids
//!
//! Increasing ids append to the end of the ordered engine, which keeps the
//! data sub-map's hot range small.

use std::sync::atomic::{AtomicU64, Ordering};

use tracing::warn;
use uuid::Uuid;

use recordstore_core::IdGenerator;

/// Monotonic `u64` ids
///
/// Ids are unique across threads and strictly increasing. A store opened
/// through `RecordStore::open` moves the sequence past the highest id it
/// ever issued, so ids of deleted records are not handed out again after a
/// restart. Stores built with `RecordStore::new` do the same through
/// `RecordStore::resume_ids`.
///
/// The sequence saturates at `u64::MAX`: once that id is issued every
/// later call returns it again, and inserting at it fails with
/// `AlreadyExists` rather than wrapping around to low ids.
#[derive(Debug)]
pub struct SequenceGenerator {
    next: AtomicU64,
}

impl SequenceGenerator {
    /// First id handed out is `start`
    pub fn starting_at(start: u64) -> Self {
        Self {
            next: AtomicU64::new(start),
        }
    }

    /// First id handed out is one past `last`, or 1 if there is none
    pub fn resume_after(last: Option<u64>) -> Self {
        Self::starting_at(last.map_or(1, |last| last.saturating_add(1)))
    }

    /// Id the next call to `create_id` returns
    pub fn peek(&self) -> u64 {
        self.next.load(Ordering::SeqCst)
    }
}

impl Default for SequenceGenerator {
    fn default() -> Self {
        Self::starting_at(1)
    }
}

impl IdGenerator<u64> for SequenceGenerator {
    fn create_id(&self) -> u64 {
        match self
            .next
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_add(1))
        {
            Ok(id) => id,
            Err(id) => {
                warn!(target: "recordstore::store", id, "Id sequence exhausted");
                id
            }
        }
    }

    fn skip_through(&self, id: &u64) {
        self.next.fetch_max(id.saturating_add(1), Ordering::SeqCst);
    }
}

/// Random v4 UUIDs
#[derive(Debug, Clone, Copy, Default)]
pub struct UuidGenerator;

impl IdGenerator<Uuid> for UuidGenerator {
    fn create_id(&self) -> Uuid {
        Uuid::new_v4()
    }
}

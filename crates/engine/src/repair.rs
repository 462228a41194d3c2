//! Type index recovery
//!
//! The index is derived from the data sub-map: every envelope names its tag,
//! so `(tag, id)` pairs can always be recomputed. Data and index writes are
//! not atomic with each other, so a crash between them can leave drift.
//!
//! - `verify_index` compares the two without writing anything.
//! - `rebuild_index` discards the index and recomputes it, excluding all
//!   writers while it runs.
//!
//! Only records `get` can return count as indexed: an envelope whose
//! payload is null or does not decode is reported as unreadable.

use std::collections::BTreeSet;

use serde::de::IgnoredAny;
use tracing::{info, warn};

use recordstore_core::{CancelToken, Codec, StoreKey, StoreResult, TypeTag};

use crate::envelope::decode_envelope;
use crate::store::RecordStore;

/// Outcome of [`RecordStore::rebuild_index`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RebuildStats {
    /// Index entries written
    pub indexed: usize,
    /// Data entries skipped because their key, envelope or payload is unreadable
    pub unreadable: usize,
}

/// Outcome of [`RecordStore::verify_index`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexReport<K> {
    /// Stored records with no index entry
    pub missing: Vec<(TypeTag, K)>,
    /// Index entries with no record, or a record of another tag
    pub stale: Vec<(TypeTag, K)>,
    /// Data entries whose key, envelope or payload is unreadable
    pub unreadable: usize,
}

impl<K> IndexReport<K> {
    /// True when index and data agree
    pub fn is_consistent(&self) -> bool {
        self.missing.is_empty() && self.stale.is_empty()
    }
}

impl<K: StoreKey, C: Codec> RecordStore<K, C> {
    /// Recompute the type index from the data sub-map
    ///
    /// Writers are blocked throughout. Readers are not: between clearing the
    /// index and refilling it, `get_all_ids` can briefly return fewer ids.
    /// Cancellation is honoured while scanning, before the index is cleared;
    /// once clearing starts the rebuild runs to completion.
    pub fn rebuild_index(&self, cancel: &CancelToken) -> StoreResult<RebuildStats> {
        let inner = &self.inner;
        let _writers = inner.locks.lock_all();

        let mut stats = RebuildStats::default();
        let pairs = self.scan_data(&mut stats.unreadable, cancel)?;
        cancel.check()?;

        inner.index.clear()?;
        for (tag, id) in pairs {
            inner.index.add(&tag, &id)?;
            stats.indexed += 1;
        }

        info!(
            target: "recordstore::index",
            data_map = %inner.data_map,
            indexed = stats.indexed,
            unreadable = stats.unreadable,
            "Type index rebuilt"
        );
        Ok(stats)
    }

    /// Compare the type index against the data sub-map
    pub fn verify_index(&self, cancel: &CancelToken) -> StoreResult<IndexReport<K>> {
        let mut unreadable = 0;
        let expected: BTreeSet<(TypeTag, K)> =
            self.scan_data(&mut unreadable, cancel)?.into_iter().collect();
        cancel.check()?;
        let actual: BTreeSet<(TypeTag, K)> = self.inner.index.entries()?.into_iter().collect();

        let report = IndexReport {
            missing: expected.difference(&actual).cloned().collect(),
            stale: actual.difference(&expected).cloned().collect(),
            unreadable,
        };
        if !report.is_consistent() {
            warn!(
                target: "recordstore::index",
                missing = report.missing.len(),
                stale = report.stale.len(),
                "Type index drifted from data"
            );
        }
        Ok(report)
    }

    /// Every readable `(tag, id)` in the data sub-map
    fn scan_data(
        &self,
        unreadable: &mut usize,
        cancel: &CancelToken,
    ) -> StoreResult<Vec<(TypeTag, K)>> {
        let inner = &self.inner;
        let mut pairs = Vec::new();
        for (key, raw) in inner.engine.scan_prefix(&inner.data_map, &[])? {
            cancel.check()?;
            let Some(id) = K::from_key_bytes(&key) else {
                warn!(target: "recordstore::index", key = ?key, "Skipping malformed id");
                *unreadable += 1;
                continue;
            };
            let (tag, payload) = match decode_envelope(&raw) {
                Ok(parts) => parts,
                Err(e) => {
                    warn!(target: "recordstore::index", id = ?id, error = %e, "Skipping unreadable record");
                    *unreadable += 1;
                    continue;
                }
            };
            match inner.codec.decode::<IgnoredAny>(payload) {
                Ok(Some(_)) => pairs.push((tag, id)),
                Ok(None) => {
                    warn!(target: "recordstore::index", id = ?id, tag = %tag, "Skipping null record");
                    *unreadable += 1;
                }
                Err(e) => {
                    warn!(target: "recordstore::index", id = ?id, tag = %tag, error = %e, "Skipping undecodable record");
                    *unreadable += 1;
                }
            }
        }
        Ok(pairs)
    }
}

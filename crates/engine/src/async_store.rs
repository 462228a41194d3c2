//! Async adapter over [`RecordStore`]
//!
//! Each call clones the store handle and runs the blocking operation on
//! tokio's blocking pool, so callers on a runtime never stall a worker on
//! engine I/O or fsync. Cancel tokens are passed through unchanged.

use std::sync::Arc;

use tokio::task::{self, JoinError};

use recordstore_core::{CancelToken, Codec, IdGenerator, Record, StoreError, StoreKey, StoreResult};

use crate::codec::AnyCodec;
use crate::config::StoreConfig;
use crate::repair::{IndexReport, RebuildStats};
use crate::store::RecordStore;

/// Async handle to a record store
pub struct AsyncRecordStore<K: StoreKey, C> {
    inner: RecordStore<K, C>,
}

impl<K: StoreKey> AsyncRecordStore<K, AnyCodec> {
    /// Open a store as described by `config` on the blocking pool
    pub async fn open(config: StoreConfig, ids: Arc<dyn IdGenerator<K>>) -> StoreResult<Self> {
        task::spawn_blocking(move || RecordStore::open(&config, ids))
            .await
            .map_err(map_join_error)?
            .map(Self::new)
    }
}

impl<K: StoreKey, C: Codec> AsyncRecordStore<K, C> {
    /// Wrap a blocking store
    pub fn new(inner: RecordStore<K, C>) -> Self {
        Self { inner }
    }

    /// The underlying blocking store
    pub fn blocking(&self) -> &RecordStore<K, C> {
        &self.inner
    }

    /// See [`RecordStore::get`]
    pub async fn get<T: Record<K>>(&self, id: K, cancel: &CancelToken) -> StoreResult<T> {
        let inner = self.inner.clone();
        let cancel = cancel.clone();
        task::spawn_blocking(move || inner.get::<T>(&id, &cancel))
            .await
            .map_err(map_join_error)?
    }

    /// See [`RecordStore::get_many`]; results are collected on the blocking pool
    pub async fn get_many<T: Record<K>>(
        &self,
        ids: Vec<K>,
        cancel: &CancelToken,
    ) -> StoreResult<Vec<StoreResult<T>>> {
        let inner = self.inner.clone();
        let cancel = cancel.clone();
        task::spawn_blocking(move || inner.get_many::<T, _>(ids, &cancel).collect())
            .await
            .map_err(map_join_error)
    }

    /// See [`RecordStore::insert`]
    ///
    /// A panicked worker is reported as `Storage` together with the id that
    /// was resolved before the worker ran.
    pub async fn insert<T: Record<K>>(&self, data: T, cancel: &CancelToken) -> (StoreResult<T>, K) {
        let (id, generated) = self.inner.resolve_id(&data);
        let inner = self.inner.clone();
        let cancel = cancel.clone();
        let task_id = id.clone();
        let result =
            task::spawn_blocking(move || inner.insert_at(&task_id, generated, data, &cancel))
                .await
                .map_err(map_join_error)
                .and_then(|r| r);
        (result, id)
    }

    /// See [`RecordStore::save`]
    pub async fn save<T: Record<K>>(&self, id: K, data: T, cancel: &CancelToken) -> StoreResult<T> {
        let inner = self.inner.clone();
        let cancel = cancel.clone();
        task::spawn_blocking(move || inner.save(&id, data, &cancel))
            .await
            .map_err(map_join_error)?
    }

    /// See [`RecordStore::delete`]
    pub async fn delete<T: Record<K>>(&self, id: K, cancel: &CancelToken) -> StoreResult<T> {
        let inner = self.inner.clone();
        let cancel = cancel.clone();
        task::spawn_blocking(move || inner.delete::<T>(&id, &cancel))
            .await
            .map_err(map_join_error)?
    }

    /// See [`RecordStore::get_all_ids`]
    pub async fn get_all_ids<T: Record<K>>(&self, cancel: &CancelToken) -> StoreResult<Vec<K>> {
        let inner = self.inner.clone();
        let cancel = cancel.clone();
        task::spawn_blocking(move || inner.get_all_ids::<T>(&cancel))
            .await
            .map_err(map_join_error)?
    }

    /// See [`RecordStore::get_all`]
    pub async fn get_all<T: Record<K>>(&self, cancel: &CancelToken) -> StoreResult<Vec<(K, T)>> {
        let inner = self.inner.clone();
        let cancel = cancel.clone();
        task::spawn_blocking(move || inner.get_all::<T>(&cancel))
            .await
            .map_err(map_join_error)?
    }

    /// See [`RecordStore::rebuild_index`]
    pub async fn rebuild_index(&self, cancel: &CancelToken) -> StoreResult<RebuildStats> {
        let inner = self.inner.clone();
        let cancel = cancel.clone();
        task::spawn_blocking(move || inner.rebuild_index(&cancel))
            .await
            .map_err(map_join_error)?
    }

    /// See [`RecordStore::id_high_water`]
    pub async fn id_high_water(&self, cancel: &CancelToken) -> StoreResult<Option<K>> {
        let inner = self.inner.clone();
        let cancel = cancel.clone();
        task::spawn_blocking(move || inner.id_high_water(&cancel))
            .await
            .map_err(map_join_error)?
    }

    /// See [`RecordStore::verify_index`]
    pub async fn verify_index(&self, cancel: &CancelToken) -> StoreResult<IndexReport<K>> {
        let inner = self.inner.clone();
        let cancel = cancel.clone();
        task::spawn_blocking(move || inner.verify_index(&cancel))
            .await
            .map_err(map_join_error)?
    }

    /// See [`RecordStore::flush`]
    pub async fn flush(&self, cancel: &CancelToken) -> StoreResult<()> {
        let inner = self.inner.clone();
        let cancel = cancel.clone();
        task::spawn_blocking(move || inner.flush(&cancel))
            .await
            .map_err(map_join_error)?
    }
}

impl<K: StoreKey, C> Clone for AsyncRecordStore<K, C> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<K: StoreKey, C> From<RecordStore<K, C>> for AsyncRecordStore<K, C> {
    fn from(inner: RecordStore<K, C>) -> Self {
        Self { inner }
    }
}

fn map_join_error(err: JoinError) -> StoreError {
    StoreError::Storage(format!("Blocking store task failed: {}", err))
}

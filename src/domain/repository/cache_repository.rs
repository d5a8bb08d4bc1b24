//! Read-through cache repository
//!
//! Lookup order for a read is request memo, then the shared cache, then the
//! record store; each layer that missed is filled on the way back up. Writes
//! happen elsewhere and are followed by [`CacheRepository::update_cache`] or
//! [`CacheRepository::invalidate`].
//!
//! Nothing here locks: concurrent misses on one id may each hit the store
//! and rewrite the same entry, and `get_multi`'s cache and store phases are
//! not atomic with respect to concurrent invalidation.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use tracing::{debug, error, warn};

use super::memo::RequestMemo;
use super::record_store::RecordStore;
use crate::domain::DomainError;
use crate::domain::cache::{CacheClient, KeySpace};
use crate::domain::codec::{BufferPool, Codec};
use crate::domain::entity::Entity;

pub struct CacheRepository<T: Entity> {
    store: Arc<dyn RecordStore<T>>,
    cache: Arc<dyn CacheClient>,
    codec: Codec,
    keys: KeySpace,
    buffers: BufferPool,
}

impl<T: Entity> fmt::Debug for CacheRepository<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheRepository")
            .field("entity", &T::NAMESPACE)
            .field("codec", &self.codec)
            .field("store", &self.store)
            .field("cache", &self.cache)
            .finish()
    }
}

impl<T: Entity> CacheRepository<T> {
    pub fn new(store: Arc<dyn RecordStore<T>>, cache: Arc<dyn CacheClient>, codec: Codec) -> Self {
        Self {
            store,
            cache,
            codec,
            keys: KeySpace::new(T::NAMESPACE),
            buffers: BufferPool::default(),
        }
    }

    pub fn codec(&self) -> Codec {
        self.codec
    }

    /// Cache key for `id`
    pub fn key(&self, id: T::Id) -> String {
        self.keys.key(id)
    }

    /// Returns the entity for `id`, failing with `NotFound` when the store has
    /// no such row
    pub async fn get(&self, id: T::Id) -> Result<T, DomainError> {
        self.resolve(id, None).await
    }

    /// Like [`get`](Self::get), consulting and filling `memo` first
    pub async fn get_memoized(&self, id: T::Id, memo: &RequestMemo<T>) -> Result<T, DomainError> {
        self.resolve(id, Some(memo)).await
    }

    /// Returns every existing entity among `ids`, keyed by id
    ///
    /// Duplicate ids are collapsed, the cache is read in one batch and the
    /// remaining ids are loaded in one store query. Ids with no row are left
    /// out of the map.
    pub async fn get_multi(&self, ids: &[T::Id]) -> Result<HashMap<T::Id, T>, DomainError> {
        self.resolve_many(ids, None).await
    }

    pub async fn get_multi_memoized(
        &self,
        ids: &[T::Id],
        memo: &RequestMemo<T>,
    ) -> Result<HashMap<T::Id, T>, DomainError> {
        self.resolve_many(ids, Some(memo)).await
    }

    /// Overwrites the cache entry for `entity` after a write
    pub async fn update_cache(&self, entity: &T) -> Result<(), DomainError> {
        self.write_entry(entity).await
    }

    /// Drops the cache entry for `id`; absent entries are fine
    pub async fn invalidate(&self, id: T::Id) -> Result<(), DomainError> {
        let key = self.keys.key(id);
        let existed = self.cache.delete(&key).await?;
        debug!(entity = T::NAMESPACE, %key, existed, "Invalidated cache entry");
        Ok(())
    }

    /// Wipes the whole shared cache, every entity type included
    pub async fn flush(&self) -> Result<(), DomainError> {
        self.cache.flush_all().await
    }

    async fn resolve(&self, id: T::Id, memo: Option<&RequestMemo<T>>) -> Result<T, DomainError> {
        if let Some(memo) = memo {
            if let Some(entity) = memo.get(&id).await {
                return Ok(entity);
            }
        }

        let entity = self.load(id).await?;

        if let Some(memo) = memo {
            memo.insert(entity.clone()).await;
        }

        Ok(entity)
    }

    async fn load(&self, id: T::Id) -> Result<T, DomainError> {
        let key = self.keys.key(id);

        if let Some(payload) = self.cache.get(&key).await? {
            debug!(entity = T::NAMESPACE, %key, "Cache hit");
            return self.codec.decode(&payload);
        }

        debug!(entity = T::NAMESPACE, %key, "Cache miss, loading from store");

        let entity = match self.store.fetch(id).await {
            Ok(Some(entity)) => entity,
            Ok(None) => {
                return Err(DomainError::not_found(format!(
                    "{} '{}' not found",
                    T::NAMESPACE,
                    id
                )));
            }
            Err(e) => {
                error!(entity = T::NAMESPACE, %id, error = %e, "Failed to load from store");
                return Err(e);
            }
        };

        self.populate(&entity).await;
        Ok(entity)
    }

    async fn resolve_many(
        &self,
        ids: &[T::Id],
        memo: Option<&RequestMemo<T>>,
    ) -> Result<HashMap<T::Id, T>, DomainError> {
        let mut found = HashMap::with_capacity(ids.len());
        let mut seen = HashSet::with_capacity(ids.len());
        let mut pending = Vec::with_capacity(ids.len());

        for &id in ids {
            if !seen.insert(id) {
                continue;
            }

            if let Some(memo) = memo {
                if let Some(entity) = memo.get(&id).await {
                    found.insert(id, entity);
                    continue;
                }
            }

            pending.push(id);
        }

        if pending.is_empty() {
            return Ok(found);
        }

        let keys: Vec<String> = pending.iter().map(|&id| self.keys.key(id)).collect();
        let cached = self.cache.get_multi(&keys).await?;

        let mut missing = Vec::new();
        for (&id, key) in pending.iter().zip(&keys) {
            match cached.get(key) {
                Some(payload) => {
                    found.insert(id, self.codec.decode(payload)?);
                }
                None => missing.push(id),
            }
        }

        debug!(
            entity = T::NAMESPACE,
            requested = pending.len(),
            cache_hits = pending.len() - missing.len(),
            "Batch cache lookup"
        );

        if !missing.is_empty() {
            let rows = self.store.fetch_many(&missing).await.inspect_err(|e| {
                error!(entity = T::NAMESPACE, count = missing.len(), error = %e, "Failed to batch load from store");
            })?;

            for entity in rows {
                self.populate(&entity).await;
                found.insert(entity.id(), entity);
            }
        }

        if let Some(memo) = memo {
            memo.extend(pending.iter().filter_map(|id| found.get(id).cloned()))
                .await;
        }

        Ok(found)
    }

    /// Best-effort fill after a store read; failures never fail the read
    async fn populate(&self, entity: &T) {
        if let Err(e) = self.write_entry(entity).await {
            warn!(
                entity = T::NAMESPACE,
                id = %entity.id(),
                error = %e,
                "Cache population failed, serving value loaded from store"
            );
        }
    }

    async fn write_entry(&self, entity: &T) -> Result<(), DomainError> {
        let mut buf = self.buffers.acquire();
        self.codec.encode_into(entity, &mut buf)?;

        self.cache.set(&self.keys.key(entity.id()), &buf, None).await
    }
}

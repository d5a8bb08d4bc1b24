//! User repository: the generic cache repository plus the bump cooldown

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use super::cache_repository::CacheRepository;
use super::memo::RequestMemo;
use super::rate_gate::RateGate;
use super::record_store::RecordStore;
use crate::domain::DomainError;
use crate::domain::cache::CacheClient;
use crate::domain::codec::Codec;
use crate::domain::entity::User;

/// Namespace of the bump cooldown markers
pub const DEFAULT_BUMP_NAMESPACE: &str = "user_dump";

/// Seconds a user must wait between two bumps
pub const DEFAULT_BUMP_COOLDOWN: Duration = Duration::from_secs(3);

#[derive(Debug)]
pub struct UserRepository {
    records: CacheRepository<User>,
    bumps: RateGate,
}

impl UserRepository {
    pub fn new(
        store: Arc<dyn RecordStore<User>>,
        cache: Arc<dyn CacheClient>,
        codec: Codec,
        bumps: RateGate,
    ) -> Self {
        Self {
            records: CacheRepository::new(store, cache, codec),
            bumps,
        }
    }

    /// Builds the repository with the default `user_dump` gate
    pub fn with_default_gate(
        store: Arc<dyn RecordStore<User>>,
        cache: Arc<dyn CacheClient>,
        codec: Codec,
    ) -> Self {
        let bumps = RateGate::new(cache.clone(), DEFAULT_BUMP_NAMESPACE, DEFAULT_BUMP_COOLDOWN);
        Self::new(store, cache, codec, bumps)
    }

    pub fn records(&self) -> &CacheRepository<User> {
        &self.records
    }

    pub async fn get(&self, id: i64) -> Result<User, DomainError> {
        self.records.get(id).await
    }

    pub async fn get_memoized(&self, id: i64, memo: &RequestMemo<User>) -> Result<User, DomainError> {
        self.records.get_memoized(id, memo).await
    }

    pub async fn get_multi(&self, ids: &[i64]) -> Result<HashMap<i64, User>, DomainError> {
        self.records.get_multi(ids).await
    }

    pub async fn get_multi_memoized(
        &self,
        ids: &[i64],
        memo: &RequestMemo<User>,
    ) -> Result<HashMap<i64, User>, DomainError> {
        self.records.get_multi_memoized(ids, memo).await
    }

    pub async fn update_cache(&self, user: &User) -> Result<(), DomainError> {
        self.records.update_cache(user).await
    }

    pub async fn invalidate(&self, id: i64) -> Result<(), DomainError> {
        self.records.invalidate(id).await
    }

    pub async fn flush(&self) -> Result<(), DomainError> {
        self.records.flush().await
    }

    /// Records that `id` just bumped an item, starting the cooldown
    pub async fn bump(&self, id: i64) -> Result<(), DomainError> {
        self.bumps.bump(id).await
    }

    /// Fails with `RateLimited` while the last bump of `id` is cooling down
    pub async fn last_bump(&self, id: i64) -> Result<(), DomainError> {
        self.bumps.check(id).await
    }
}

//! In-memory cache implementation using moka

use std::collections::HashMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use bytes::Bytes;
use moka::Expiry;
use moka::future::Cache as MokaCache;

use crate::domain::DomainError;
use crate::domain::cache::CacheClient;

/// Configuration for in-memory cache
#[derive(Debug, Clone)]
pub struct InMemoryCacheConfig {
    /// Maximum number of entries
    pub max_capacity: u64,
}

impl Default for InMemoryCacheConfig {
    fn default() -> Self {
        Self {
            max_capacity: 100_000,
        }
    }
}

impl InMemoryCacheConfig {
    /// Creates a new configuration with specified max capacity
    pub fn with_max_capacity(mut self, capacity: u64) -> Self {
        self.max_capacity = capacity;
        self
    }
}

/// Cache entry stored in moka
#[derive(Debug, Clone)]
struct CacheEntry {
    data: Bytes,
    /// Time to live from the last write, `None` never expires
    ttl: Option<Duration>,
}

/// Expires each entry after its own TTL; every write restarts the clock
struct EntryExpiry;

impl Expiry<String, CacheEntry> for EntryExpiry {
    fn expire_after_create(
        &self,
        _key: &String,
        entry: &CacheEntry,
        _created_at: Instant,
    ) -> Option<Duration> {
        entry.ttl
    }

    fn expire_after_update(
        &self,
        _key: &String,
        entry: &CacheEntry,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        entry.ttl
    }
}

/// Thread-safe in-memory cache implementation using moka
///
/// Entries without an expiration stay until deleted, flushed, or evicted by
/// the capacity bound. Suitable for single-process deployments and tests.
#[derive(Debug, Clone)]
pub struct InMemoryCache {
    cache: MokaCache<String, CacheEntry>,
}

impl InMemoryCache {
    /// Creates a new in-memory cache with default configuration
    pub fn new() -> Self {
        Self::with_config(InMemoryCacheConfig::default())
    }

    /// Creates a new in-memory cache with the given configuration
    pub fn with_config(config: InMemoryCacheConfig) -> Self {
        Self {
            cache: MokaCache::builder()
                .max_capacity(config.max_capacity)
                .expire_after(EntryExpiry)
                .build(),
        }
    }
}

impl Default for InMemoryCache {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CacheClient for InMemoryCache {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, DomainError> {
        Ok(self.cache.get(key).await.map(|entry| entry.data.to_vec()))
    }

    async fn get_multi(&self, keys: &[String]) -> Result<HashMap<String, Vec<u8>>, DomainError> {
        let mut found = HashMap::with_capacity(keys.len());

        for key in keys {
            if let Some(entry) = self.cache.get(key).await {
                found.insert(key.clone(), entry.data.to_vec());
            }
        }

        Ok(found)
    }

    async fn set(
        &self,
        key: &str,
        value: &[u8],
        expiration: Option<Duration>,
    ) -> Result<(), DomainError> {
        if expiration.is_some_and(|ttl| ttl.is_zero()) {
            self.cache.remove(key).await;
            return Ok(());
        }

        let entry = CacheEntry {
            data: Bytes::copy_from_slice(value),
            ttl: expiration,
        };

        self.cache.insert(key.to_string(), entry).await;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool, DomainError> {
        Ok(self.cache.remove(key).await.is_some())
    }

    async fn flush_all(&self) -> Result<(), DomainError> {
        self.cache.invalidate_all();
        self.cache.run_pending_tasks().await;
        Ok(())
    }
}

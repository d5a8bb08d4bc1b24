//! Redis cache implementation

use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client};

use crate::domain::DomainError;
use crate::domain::cache::CacheClient;

/// Configuration for Redis cache
#[derive(Debug, Clone)]
pub struct RedisCacheConfig {
    /// Redis connection URL (e.g., "redis://127.0.0.1:6379")
    pub url: String,
    /// Key prefix for namespacing
    pub key_prefix: Option<String>,
}

impl Default for RedisCacheConfig {
    fn default() -> Self {
        Self {
            url: "redis://127.0.0.1:6379".to_string(),
            key_prefix: None,
        }
    }
}

impl RedisCacheConfig {
    /// Creates a new configuration with the given URL
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    /// Sets the key prefix
    pub fn with_key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.key_prefix = Some(prefix.into());
        self
    }
}

/// Redis cache implementation
///
/// Batched reads use MGET. Without a key prefix `flush_all` issues FLUSHDB,
/// so the whole logical database is wiped; with a prefix only prefixed keys
/// are removed.
#[derive(Clone)]
pub struct RedisCache {
    connection: ConnectionManager,
    config: RedisCacheConfig,
}

impl fmt::Debug for RedisCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedisCache")
            .field("config", &self.config)
            .field("connection", &"<ConnectionManager>")
            .finish()
    }
}

impl RedisCache {
    /// Creates a new Redis cache connection
    pub async fn new(config: RedisCacheConfig) -> Result<Self, DomainError> {
        let client = Client::open(config.url.as_str())
            .map_err(|e| DomainError::cache(format!("Failed to create Redis client: {}", e)))?;

        let connection = ConnectionManager::new(client)
            .await
            .map_err(|e| DomainError::cache(format!("Failed to connect to Redis: {}", e)))?;

        Ok(Self { connection, config })
    }

    /// Creates a Redis cache with default configuration
    pub async fn with_url(url: impl Into<String>) -> Result<Self, DomainError> {
        Self::new(RedisCacheConfig::new(url)).await
    }

    fn prefix_key(&self, key: &str) -> String {
        prefixed(self.config.key_prefix.as_deref(), key)
    }

    async fn delete_prefixed(&self, prefix: &str) -> Result<usize, DomainError> {
        let pattern = format!("{}:*", prefix);
        let mut conn = self.connection.clone();

        // SCAN instead of KEYS to avoid blocking the server
        let mut cursor = 0u64;
        let mut total_deleted = 0usize;

        loop {
            let (new_cursor, keys): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(&pattern)
                .arg("COUNT")
                .arg(100)
                .query_async(&mut conn)
                .await
                .map_err(|e| {
                    DomainError::cache(format!("Failed to scan keys with pattern '{}': {}", pattern, e))
                })?;

            if !keys.is_empty() {
                let deleted: i32 = conn
                    .del(&keys)
                    .await
                    .map_err(|e| DomainError::cache(format!("Failed to delete keys: {}", e)))?;
                total_deleted += deleted as usize;
            }

            cursor = new_cursor;

            if cursor == 0 {
                break;
            }
        }

        Ok(total_deleted)
    }
}

fn prefixed(prefix: Option<&str>, key: &str) -> String {
    match prefix {
        Some(prefix) => format!("{}:{}", prefix, key),
        None => key.to_string(),
    }
}

#[async_trait]
impl CacheClient for RedisCache {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, DomainError> {
        let prefixed_key = self.prefix_key(key);
        let mut conn = self.connection.clone();

        let result: Option<Vec<u8>> = conn
            .get(&prefixed_key)
            .await
            .map_err(|e| DomainError::cache(format!("Failed to get key '{}': {}", key, e)))?;

        Ok(result)
    }

    async fn get_multi(&self, keys: &[String]) -> Result<HashMap<String, Vec<u8>>, DomainError> {
        if keys.is_empty() {
            return Ok(HashMap::new());
        }

        let prefixed_keys: Vec<String> = keys.iter().map(|k| self.prefix_key(k)).collect();
        let mut conn = self.connection.clone();

        let values: Vec<Option<Vec<u8>>> = redis::cmd("MGET")
            .arg(&prefixed_keys)
            .query_async(&mut conn)
            .await
            .map_err(|e| {
                DomainError::cache(format!("Failed to get {} keys: {}", keys.len(), e))
            })?;

        Ok(keys
            .iter()
            .zip(values)
            .filter_map(|(key, value)| value.map(|v| (key.clone(), v)))
            .collect())
    }

    async fn set(
        &self,
        key: &str,
        value: &[u8],
        expiration: Option<Duration>,
    ) -> Result<(), DomainError> {
        let prefixed_key = self.prefix_key(key);
        let mut conn = self.connection.clone();

        let result: redis::RedisResult<()> = match expiration.map(ttl_millis) {
            Some(Some(ttl_ms)) => conn.pset_ex(&prefixed_key, value, ttl_ms).await,
            Some(None) => conn.del(&prefixed_key).await,
            None => conn.set(&prefixed_key, value).await,
        };

        result.map_err(|e| DomainError::cache(format!("Failed to set key '{}': {}", key, e)))
    }

    async fn delete(&self, key: &str) -> Result<bool, DomainError> {
        let prefixed_key = self.prefix_key(key);
        let mut conn = self.connection.clone();

        let deleted: i32 = conn
            .del(&prefixed_key)
            .await
            .map_err(|e| DomainError::cache(format!("Failed to delete key '{}': {}", key, e)))?;

        Ok(deleted > 0)
    }

    async fn flush_all(&self) -> Result<(), DomainError> {
        match &self.config.key_prefix {
            Some(prefix) => {
                self.delete_prefixed(prefix).await?;
            }
            None => {
                let mut conn = self.connection.clone();
                let _: () = redis::cmd("FLUSHDB")
                    .query_async(&mut conn)
                    .await
                    .map_err(|e| DomainError::cache(format!("Failed to flush cache: {}", e)))?;
            }
        }

        Ok(())
    }
}

/// Millisecond TTL for PSETEX, rounded up; `None` for a zero TTL, which
/// expires the key immediately
fn ttl_millis(ttl: Duration) -> Option<u64> {
    if ttl.is_zero() {
        return None;
    }
    Some(u64::try_from(ttl.as_nanos().div_ceil(1_000_000)).unwrap_or(u64::MAX))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_redis_config_default() {
        let config = RedisCacheConfig::default();
        assert_eq!(config.url, "redis://127.0.0.1:6379");
        assert!(config.key_prefix.is_none());
    }

    #[test]
    fn test_redis_config_builder() {
        let config = RedisCacheConfig::new("redis://cache:6379").with_key_prefix("isucari");

        assert_eq!(config.url, "redis://cache:6379");
        assert_eq!(config.key_prefix.as_deref(), Some("isucari"));
    }

    #[test]
    fn test_prefixed_keys() {
        assert_eq!(prefixed(Some("isucari"), "user/1"), "isucari:user/1");
        assert_eq!(prefixed(None, "user/1"), "user/1");
    }

    #[test]
    fn test_ttl_millis_keeps_sub_second_cooldowns() {
        assert_eq!(ttl_millis(Duration::from_millis(500)), Some(500));
        assert_eq!(ttl_millis(Duration::from_micros(1)), Some(1));
        assert_eq!(ttl_millis(Duration::from_secs(3)), Some(3000));
        assert_eq!(ttl_millis(Duration::ZERO), None);
    }

    // Integration tests require a running Redis instance
    #[tokio::test]
    #[ignore]
    async fn test_redis_round_trip() {
        let cache = RedisCache::new(RedisCacheConfig::new("redis://127.0.0.1:6379").with_key_prefix("test"))
            .await
            .unwrap();

        cache.set("user/1", b"alice", None).await.unwrap();
        let found = cache
            .get_multi(&["user/1".to_string(), "user/2".to_string()])
            .await
            .unwrap();
        assert_eq!(found.len(), 1);

        cache.flush_all().await.unwrap();
        assert!(cache.get("user/1").await.unwrap().is_none());
    }
}

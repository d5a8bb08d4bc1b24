//! Cache client trait definition

use std::collections::HashMap;
use std::fmt::Debug;
use std::time::Duration;

use async_trait::async_trait;

use crate::domain::DomainError;

/// Uniform byte-oriented operations over a distributed key-value cache
///
/// A clean miss is `Ok(None)`, never an error. `expiration: None` stores the
/// entry without a TTL; it then lives until deleted, flushed, or evicted by
/// the backend's own capacity policy.
#[async_trait]
pub trait CacheClient: Send + Sync + Debug {
    /// Gets a raw payload from the cache
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, DomainError>;

    /// Gets several payloads in one round trip; missing keys are absent from the map
    async fn get_multi(&self, keys: &[String]) -> Result<HashMap<String, Vec<u8>>, DomainError> {
        let mut found = HashMap::with_capacity(keys.len());

        for key in keys {
            if let Some(value) = self.get(key).await? {
                found.insert(key.clone(), value);
            }
        }

        Ok(found)
    }

    /// Stores a payload, optionally expiring after `expiration`
    ///
    /// A zero `expiration` leaves no entry behind.
    async fn set(
        &self,
        key: &str,
        value: &[u8],
        expiration: Option<Duration>,
    ) -> Result<(), DomainError>;

    /// Deletes a key, returning whether it existed
    async fn delete(&self, key: &str) -> Result<bool, DomainError>;

    /// Wipes every entry of the underlying store
    async fn flush_all(&self) -> Result<(), DomainError>;
}

//! Cooldown markers stored in the shared cache

use std::fmt::Display;
use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use crate::domain::DomainError;
use crate::domain::cache::{CacheClient, KeySpace};

const MARKER: &[u8] = b"1";

/// Presence-only cache entries that expire after a fixed cooldown
///
/// `bump` opens a cooldown window; `check` fails with `RateLimited` until the
/// marker expires. The marker carries no data and lives in its own key
/// namespace, apart from entity entries.
#[derive(Debug, Clone)]
pub struct RateGate {
    cache: Arc<dyn CacheClient>,
    keys: KeySpace,
    cooldown: Duration,
}

impl RateGate {
    pub fn new(cache: Arc<dyn CacheClient>, namespace: impl Into<String>, cooldown: Duration) -> Self {
        Self {
            cache,
            keys: KeySpace::new(namespace),
            cooldown,
        }
    }

    pub fn cooldown(&self) -> Duration {
        self.cooldown
    }

    pub fn key(&self, id: impl Display) -> String {
        self.keys.key(id)
    }

    /// Starts a cooldown window for `id`
    pub async fn bump(&self, id: impl Display) -> Result<(), DomainError> {
        let key = self.keys.key(id);
        self.cache.set(&key, MARKER, Some(self.cooldown)).await?;
        debug!(%key, cooldown_secs = self.cooldown.as_secs(), "Rate gate armed");
        Ok(())
    }

    /// Succeeds when no cooldown is active for `id`
    pub async fn check(&self, id: impl Display) -> Result<(), DomainError> {
        let key = self.keys.key(&id);

        match self.cache.get(&key).await? {
            Some(_) => Err(DomainError::rate_limited(format!(
                "{} {} is cooling down",
                self.keys, id
            ))),
            None => Ok(()),
        }
    }
}

//! Process-local config repository
//!
//! Settings rows change only through re-initialisation, so values are kept
//! in process memory rather than the shared cache and dropped wholesale by
//! `flush`.

use std::fmt::Debug;
use std::sync::Arc;

use async_trait::async_trait;
use moka::future::Cache;
use tracing::debug;

use crate::domain::DomainError;

const MAX_ENTRIES: u64 = 1_024;

/// Lookup of named settings in the relational store
#[async_trait]
pub trait ConfigStore: Send + Sync + Debug {
    async fn fetch_value(&self, name: &str) -> Result<Option<String>, DomainError>;
}

#[derive(Debug)]
pub struct ConfigRepository {
    store: Arc<dyn ConfigStore>,
    data: Cache<String, String>,
}

impl ConfigRepository {
    pub fn new(store: Arc<dyn ConfigStore>) -> Self {
        Self {
            store,
            data: Cache::builder().max_capacity(MAX_ENTRIES).build(),
        }
    }

    /// Returns the value of `name`, `None` when no such setting exists
    ///
    /// Only found values are remembered; a missing setting is looked up
    /// again on the next call.
    pub async fn get(&self, name: &str) -> Result<Option<String>, DomainError> {
        if let Some(value) = self.data.get(name).await {
            return Ok(Some(value));
        }

        let value = self.store.fetch_value(name).await?;
        if let Some(value) = &value {
            debug!(name, "Memoising config value");
            self.data.insert(name.to_string(), value.clone()).await;
        }

        Ok(value)
    }

    /// Forgets every memoised value
    pub fn flush(&self) {
        self.data.invalidate_all();
    }
}

#[cfg(test)]
pub mod mock {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug, Default)]
    pub struct MockConfigStore {
        values: Mutex<HashMap<String, String>>,
        calls: AtomicUsize,
    }

    impl MockConfigStore {
        pub fn with_value(self, name: &str, value: &str) -> Self {
            self.set(name, value);
            self
        }

        pub fn set(&self, name: &str, value: &str) {
            self.values
                .lock()
                .unwrap()
                .insert(name.to_string(), value.to_string());
        }

        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ConfigStore for MockConfigStore {
        async fn fetch_value(&self, name: &str) -> Result<Option<String>, DomainError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.values.lock().unwrap().get(name).cloned())
        }
    }
}

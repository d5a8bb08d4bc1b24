//! SQL-backed settings lookup

use std::sync::Arc;

use async_trait::async_trait;
use tracing::error;

use crate::domain::DomainError;
use crate::domain::repository::ConfigStore;
use crate::infrastructure::sql::Database;

const SELECT_VALUE: &str = "SELECT val FROM configs WHERE name = $1";

/// Reads `val` from the `configs(name, val)` table
#[derive(Debug)]
pub struct SqlConfigStore {
    db: Arc<Database>,
}

impl SqlConfigStore {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl ConfigStore for SqlConfigStore {
    async fn fetch_value(&self, name: &str) -> Result<Option<String>, DomainError> {
        let row = self
            .db
            .query_optional(SELECT_VALUE, &[name.into()])
            .await
            .map_err(|e| {
                error!(name, error = %e, "Failed to load config value");
                e
            })?;

        row.map(|row| row.get_string("val")).transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::sql::Row;
    use crate::domain::sql::mock::FakeDriver;
    use crate::infrastructure::sql::PoolOptions;

    #[tokio::test]
    async fn test_fetch_value() {
        let fake = FakeDriver::extended().with_rows(vec![Row::new().with("val", "http://pay")]);
        let store = SqlConfigStore::new(Arc::new(Database::new(Arc::new(fake.clone()), "dsn", PoolOptions::new(1)).unwrap()));

        let value = store.fetch_value("payment_service_url").await.unwrap();

        assert_eq!(value.as_deref(), Some("http://pay"));
        assert!(fake.events().contains(&format!("query_context {}", SELECT_VALUE)));
    }

    #[tokio::test]
    async fn test_missing_value() {
        let fake = FakeDriver::extended();
        let store = SqlConfigStore::new(Arc::new(Database::new(Arc::new(fake), "dsn", PoolOptions::new(1)).unwrap()));

        assert!(store.fetch_value("missing").await.unwrap().is_none());
    }
}

//! SQL-backed record store for cached entities

use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, error};

use crate::domain::DomainError;
use crate::domain::entity::Entity;
use crate::domain::repository::RecordStore;
use crate::domain::sql::SqlValue;
use crate::infrastructure::sql::Database;

/// Loads entity rows by key column from `T::TABLE`
pub struct SqlRecordStore<T: Entity> {
    db: Arc<Database>,
    _phantom: PhantomData<T>,
}

impl<T: Entity> fmt::Debug for SqlRecordStore<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SqlRecordStore")
            .field("table", &T::TABLE)
            .finish_non_exhaustive()
    }
}

impl<T: Entity> SqlRecordStore<T> {
    pub fn new(db: Arc<Database>) -> Self {
        Self {
            db,
            _phantom: PhantomData,
        }
    }

    fn select_one() -> String {
        format!("SELECT * FROM {} WHERE {} = $1", T::TABLE, T::KEY_COLUMN)
    }

    fn select_many(count: usize) -> String {
        let placeholders: Vec<String> = (1..=count).map(|n| format!("${}", n)).collect();
        format!(
            "SELECT * FROM {} WHERE {} IN ({})",
            T::TABLE,
            T::KEY_COLUMN,
            placeholders.join(", ")
        )
    }
}

#[async_trait]
impl<T: Entity> RecordStore<T> for SqlRecordStore<T> {
    async fn fetch(&self, id: T::Id) -> Result<Option<T>, DomainError> {
        let row = self
            .db
            .query_optional(&Self::select_one(), &[id.into()])
            .await
            .map_err(|e| {
                error!(table = T::TABLE, %id, error = %e, "Failed to load row");
                e
            })?;

        row.as_ref().map(T::from_row).transpose()
    }

    async fn fetch_many(&self, ids: &[T::Id]) -> Result<Vec<T>, DomainError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let args: Vec<SqlValue> = ids.iter().map(|id| (*id).into()).collect();
        let rows = self
            .db
            .query(&Self::select_many(ids.len()), &args)
            .await
            .map_err(|e| {
                error!(table = T::TABLE, count = ids.len(), error = %e, "Failed to load rows");
                e
            })?;

        debug!(table = T::TABLE, requested = ids.len(), found = rows.len(), "Loaded rows");
        rows.iter().map(T::from_row).collect()
    }
}

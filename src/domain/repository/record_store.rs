//! Backing store trait for cached entities

use std::fmt::Debug;

use async_trait::async_trait;

use crate::domain::DomainError;
use crate::domain::entity::Entity;

/// Primary-key reads against the relational store
#[async_trait]
pub trait RecordStore<T: Entity>: Send + Sync + Debug {
    /// Loads the row for `id`, `None` when no row matches
    async fn fetch(&self, id: T::Id) -> Result<Option<T>, DomainError>;

    /// Loads every existing row among `ids` in one query; missing ids are
    /// simply absent from the result
    async fn fetch_many(&self, ids: &[T::Id]) -> Result<Vec<T>, DomainError>;
}

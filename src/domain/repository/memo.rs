//! Request-scoped memo

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;

use crate::domain::entity::Entity;

/// Entities already resolved during one logical request
///
/// Create one per request and drop it when the request ends. Clones share
/// the same map, so a request that fans out across tasks can hand each task
/// a clone; never share one across requests.
#[derive(Debug)]
pub struct RequestMemo<T: Entity> {
    entries: Arc<RwLock<HashMap<T::Id, T>>>,
}

impl<T: Entity> Clone for RequestMemo<T> {
    fn clone(&self) -> Self {
        Self {
            entries: Arc::clone(&self.entries),
        }
    }
}

impl<T: Entity> Default for RequestMemo<T> {
    fn default() -> Self {
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
        }
    }
}

impl<T: Entity> RequestMemo<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, id: &T::Id) -> Option<T> {
        self.entries.read().await.get(id).cloned()
    }

    pub async fn insert(&self, entity: T) {
        self.entries.write().await.insert(entity.id(), entity);
    }

    pub async fn extend(&self, entities: impl IntoIterator<Item = T>) {
        let mut entries = self.entries.write().await;

        for entity in entities {
            entries.insert(entity.id(), entity);
        }
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entity::{User, fixtures};

    #[tokio::test]
    async fn test_memo_get_and_insert() {
        let memo = RequestMemo::<User>::new();
        assert!(memo.get(&1).await.is_none());

        memo.insert(fixtures::user(1, "alice")).await;
        assert_eq!(memo.get(&1).await.unwrap().account_name, "alice");
    }

    #[tokio::test]
    async fn test_clones_share_entries_across_tasks() {
        let memo = RequestMemo::<User>::new();

        let handles: Vec<_> = (1..=8)
            .map(|id| {
                let memo = memo.clone();
                tokio::spawn(async move {
                    memo.insert(fixtures::user(id, "fan-out")).await;
                })
            })
            .collect();

        for result in futures::future::join_all(handles).await {
            result.unwrap();
        }

        assert_eq!(memo.len().await, 8);
    }

    #[tokio::test]
    async fn test_separate_memos_are_isolated() {
        let first = RequestMemo::<User>::new();
        let second = RequestMemo::<User>::new();

        first.insert(fixtures::user(1, "alice")).await;
        assert!(second.is_empty().await);
    }
}

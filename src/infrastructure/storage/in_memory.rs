//! In-memory storage implementation

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::RwLock;

use async_trait::async_trait;

use crate::domain::storage::{Storage, StorageEntity, StorageKey};
use crate::domain::DomainError;

/// Thread-safe in-memory storage implementation
///
/// Useful for testing and development. Data is lost when the process terminates.
#[derive(Debug)]
pub struct InMemoryStorage<E>
where
    E: StorageEntity,
{
    entities: RwLock<HashMap<String, E>>,
}

impl<E> Default for InMemoryStorage<E>
where
    E: StorageEntity,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<E> InMemoryStorage<E>
where
    E: StorageEntity,
{
    /// Creates a new empty in-memory storage
    pub fn new() -> Self {
        Self {
            entities: RwLock::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl<E> Storage<E> for InMemoryStorage<E>
where
    E: StorageEntity + 'static,
{
    async fn get(&self, key: &E::Key) -> Result<Option<E>, DomainError> {
        let entities = self.entities.read().map_err(|e| {
            DomainError::storage(format!("Failed to acquire read lock: {}", e))
        })?;

        Ok(entities.get(key.as_str()).cloned())
    }

    async fn list(&self) -> Result<Vec<E>, DomainError> {
        let entities = self.entities.read().map_err(|e| {
            DomainError::storage(format!("Failed to acquire read lock: {}", e))
        })?;

        Ok(entities.values().cloned().collect())
    }

    async fn create(&self, entity: E) -> Result<E, DomainError> {
        let key = entity.key().as_str().to_string();
        let mut entities = self.entities.write().map_err(|e| {
            DomainError::storage(format!("Failed to acquire write lock: {}", e))
        })?;

        if entities.contains_key(&key) {
            return Err(DomainError::conflict(format!(
                "Entity with key '{}' already exists",
                key
            )));
        }

        entities.insert(key, entity.clone());
        Ok(entity)
    }

    async fn create_if_absent(&self, entity: E) -> Result<bool, DomainError> {
        let key = entity.key().as_str().to_string();
        let mut entities = self.entities.write().map_err(|e| {
            DomainError::storage(format!("Failed to acquire write lock: {}", e))
        })?;

        match entities.entry(key) {
            Entry::Occupied(_) => Ok(false),
            Entry::Vacant(slot) => {
                slot.insert(entity);
                Ok(true)
            }
        }
    }

    async fn count(&self) -> Result<usize, DomainError> {
        let entities = self.entities.read().map_err(|e| {
            DomainError::storage(format!("Failed to acquire read lock: {}", e))
        })?;

        Ok(entities.len())
    }

    async fn exists(&self, key: &E::Key) -> Result<bool, DomainError> {
        let entities = self.entities.read().map_err(|e| {
            DomainError::storage(format!("Failed to acquire read lock: {}", e))
        })?;

        Ok(entities.contains_key(key.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::experiment::{ExperimentName, Identity, Participation, ParticipationKey};
    use std::sync::Arc;

    fn participation(visitor: &str, variant: &str) -> Participation {
        Participation::new(
            Identity::from(visitor),
            ExperimentName::new("checkout"),
            variant,
        )
    }

    #[tokio::test]
    async fn test_create_and_get() {
        let storage: InMemoryStorage<Participation> = InMemoryStorage::new();
        storage.create(participation("v1", "a")).await.unwrap();

        let key = ParticipationKey::new(
            &Identity::from("v1"),
            &ExperimentName::new("checkout"),
        );
        let fetched = storage.get(&key).await.unwrap().unwrap();
        assert_eq!(fetched.variant(), "a");
        assert!(storage.exists(&key).await.unwrap());
    }

    #[tokio::test]
    async fn test_create_duplicate_fails() {
        let storage: InMemoryStorage<Participation> = InMemoryStorage::new();
        storage.create(participation("v1", "a")).await.unwrap();

        let result = storage.create(participation("v1", "b")).await;
        assert!(matches!(result, Err(DomainError::Conflict { .. })));
    }

    #[tokio::test]
    async fn test_create_if_absent_is_write_once() {
        let storage: InMemoryStorage<Participation> = InMemoryStorage::new();

        assert!(storage.create_if_absent(participation("v1", "a")).await.unwrap());
        assert!(!storage.create_if_absent(participation("v1", "b")).await.unwrap());

        let all = storage.list().await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].variant(), "a");
    }

    #[tokio::test]
    async fn test_concurrent_create_if_absent_single_winner() {
        let storage: Arc<InMemoryStorage<Participation>> = Arc::new(InMemoryStorage::new());
        let mut tasks = tokio::task::JoinSet::new();

        for i in 0..32 {
            let storage = Arc::clone(&storage);
            let variant = if i % 2 == 0 { "a" } else { "b" };
            tasks.spawn(async move {
                storage
                    .create_if_absent(participation("v1", variant))
                    .await
                    .unwrap()
            });
        }

        let mut winners = 0;
        while let Some(inserted) = tasks.join_next().await {
            if inserted.unwrap() {
                winners += 1;
            }
        }

        assert_eq!(winners, 1);
        assert_eq!(storage.count().await.unwrap(), 1);
    }
}

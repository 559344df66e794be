//! Storage factory for runtime storage selection

use std::sync::Arc;

use sqlx::PgPool;
use tracing::info;

use crate::domain::storage::{Storage, StorageEntity};
use crate::domain::DomainError;

use super::in_memory::InMemoryStorage;
use super::postgres::{PostgresConfig, PostgresStorage};

/// Supported storage types
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageType {
    /// In-memory storage (for testing/development)
    InMemory,
    /// PostgreSQL storage
    Postgres,
}

impl StorageType {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "memory" | "inmemory" | "in-memory" | "in_memory" => Some(Self::InMemory),
            "postgres" | "postgresql" | "pg" => Some(Self::Postgres),
            _ => None,
        }
    }
}

/// Storage configuration
#[derive(Debug, Clone)]
pub enum StorageConfig {
    /// In-memory storage configuration
    InMemory,
    /// PostgreSQL storage configuration
    Postgres(PostgresConfig),
}

impl StorageConfig {
    /// Creates an in-memory storage configuration
    pub fn in_memory() -> Self {
        Self::InMemory
    }

    /// Creates a PostgreSQL storage configuration
    pub fn postgres(config: PostgresConfig) -> Self {
        Self::Postgres(config)
    }

    /// Returns the storage type
    pub fn storage_type(&self) -> StorageType {
        match self {
            Self::InMemory => StorageType::InMemory,
            Self::Postgres(_) => StorageType::Postgres,
        }
    }
}

/// Factory for creating storage instances
///
/// Connects once; every storage created afterwards shares the same pool.
#[derive(Debug, Clone)]
pub struct StorageFactory {
    pool: Option<PgPool>,
}

impl StorageFactory {
    /// Connects to the backing store described by the configuration
    pub async fn connect(config: &StorageConfig) -> Result<Self, DomainError> {
        match config {
            StorageConfig::InMemory => {
                info!("Using in-memory storage");
                Ok(Self::in_memory())
            }
            StorageConfig::Postgres(pg_config) => {
                info!("Connecting to PostgreSQL...");
                let pool = pg_config.connect().await?;
                info!("PostgreSQL connection established");
                Ok(Self { pool: Some(pool) })
            }
        }
    }

    /// Creates a factory that only hands out in-memory storages
    pub fn in_memory() -> Self {
        Self { pool: None }
    }

    /// Returns the storage type this factory creates
    pub fn storage_type(&self) -> StorageType {
        if self.pool.is_some() {
            StorageType::Postgres
        } else {
            StorageType::InMemory
        }
    }

    /// Creates a storage for one entity type
    pub async fn create<E>(&self, table_name: &str) -> Result<Arc<dyn Storage<E>>, DomainError>
    where
        E: StorageEntity + 'static,
    {
        match &self.pool {
            None => Ok(Arc::new(InMemoryStorage::<E>::new())),
            Some(pool) => {
                let storage = PostgresStorage::<E>::new(pool.clone(), table_name);
                storage.ensure_table().await?;
                Ok(Arc::new(storage))
            }
        }
    }
}

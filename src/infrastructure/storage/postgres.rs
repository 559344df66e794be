//! PostgreSQL storage: one JSONB key/value table per entity type

use std::fmt;
use std::marker::PhantomData;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::Row;

use crate::domain::storage::{Storage, StorageEntity, StorageKey};
use crate::domain::DomainError;

/// Connection settings for the shared pool
#[derive(Debug, Clone)]
pub struct PostgresConfig {
    pub url: String,
    pub max_connections: u32,
    /// Seconds to wait for a pooled connection
    pub acquire_timeout_secs: u64,
}

impl Default for PostgresConfig {
    fn default() -> Self {
        Self {
            url: "postgres://localhost/pmp_split_engine".to_string(),
            max_connections: 10,
            acquire_timeout_secs: 30,
        }
    }
}

impl PostgresConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    pub fn with_max_connections(mut self, max: u32) -> Self {
        self.max_connections = max;
        self
    }

    pub async fn connect(&self) -> Result<PgPool, DomainError> {
        PgPoolOptions::new()
            .max_connections(self.max_connections)
            .acquire_timeout(Duration::from_secs(self.acquire_timeout_secs))
            .connect(&self.url)
            .await
            .map_err(|e| DomainError::storage(format!("Failed to connect to PostgreSQL: {}", e)))
    }
}

/// Statements for one table, rendered once at construction
#[derive(Debug, Clone, PartialEq, Eq)]
struct TableQueries {
    create_table: String,
    select_one: String,
    select_all: String,
    insert: String,
    insert_if_absent: String,
}

impl TableQueries {
    // keys embed caller-supplied identities, so the column is unbounded
    fn for_table(table: &str) -> Self {
        Self {
            create_table: format!(
                "CREATE TABLE IF NOT EXISTS {table} (\
                 key TEXT PRIMARY KEY, \
                 data JSONB NOT NULL, \
                 created_at TIMESTAMPTZ NOT NULL DEFAULT NOW())"
            ),
            select_one: format!("SELECT data FROM {table} WHERE key = $1"),
            select_all: format!("SELECT data FROM {table} ORDER BY created_at"),
            insert: format!("INSERT INTO {table} (key, data) VALUES ($1, $2)"),
            insert_if_absent: format!(
                "INSERT INTO {table} (key, data) VALUES ($1, $2) ON CONFLICT (key) DO NOTHING"
            ),
        }
    }
}

/// Write-once entity storage backed by a PostgreSQL table
pub struct PostgresStorage<E> {
    pool: PgPool,
    table: String,
    queries: TableQueries,
    _entity: PhantomData<fn() -> E>,
}

impl<E> fmt::Debug for PostgresStorage<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PostgresStorage")
            .field("table", &self.table)
            .finish_non_exhaustive()
    }
}

impl<E: StorageEntity> PostgresStorage<E> {
    pub fn new(pool: PgPool, table: impl Into<String>) -> Self {
        let table = table.into();
        Self {
            pool,
            queries: TableQueries::for_table(&table),
            table,
            _entity: PhantomData,
        }
    }

    /// Create the backing table if it does not exist yet
    pub async fn ensure_table(&self) -> Result<(), DomainError> {
        sqlx::query(&self.queries.create_table)
            .execute(&self.pool)
            .await
            .map_err(|e| self.error("create table", e))?;
        Ok(())
    }

    fn error(&self, action: &str, error: sqlx::Error) -> DomainError {
        DomainError::storage(format!("Failed to {} in '{}': {}", action, self.table, error))
    }

    fn decode(&self, row: PgRow) -> Result<E, DomainError> {
        let data: Value = row.get("data");
        serde_json::from_value(data).map_err(|e| {
            DomainError::storage(format!("Corrupt row in '{}': {}", self.table, e))
        })
    }

    fn encode(entity: &E) -> Result<(String, Value), DomainError> {
        let data = serde_json::to_value(entity)
            .map_err(|e| DomainError::storage(format!("Failed to serialize entity: {}", e)))?;
        Ok((entity.key().as_str().to_string(), data))
    }
}

fn is_unique_violation(error: &sqlx::Error) -> bool {
    error
        .as_database_error()
        .is_some_and(|db| db.is_unique_violation())
}

#[async_trait]
impl<E> Storage<E> for PostgresStorage<E>
where
    E: StorageEntity + 'static,
{
    async fn get(&self, key: &E::Key) -> Result<Option<E>, DomainError> {
        let row = sqlx::query(&self.queries.select_one)
            .bind(key.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| self.error("read", e))?;

        row.map(|row| self.decode(row)).transpose()
    }

    async fn list(&self) -> Result<Vec<E>, DomainError> {
        let rows = sqlx::query(&self.queries.select_all)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| self.error("list", e))?;

        rows.into_iter().map(|row| self.decode(row)).collect()
    }

    async fn create(&self, entity: E) -> Result<E, DomainError> {
        let (key, data) = Self::encode(&entity)?;

        sqlx::query(&self.queries.insert)
            .bind(&key)
            .bind(&data)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    DomainError::conflict(format!("Entity with key '{}' already exists", key))
                } else {
                    self.error("insert", e)
                }
            })?;

        Ok(entity)
    }

    async fn create_if_absent(&self, entity: E) -> Result<bool, DomainError> {
        let (key, data) = Self::encode(&entity)?;

        let result = sqlx::query(&self.queries.insert_if_absent)
            .bind(&key)
            .bind(&data)
            .execute(&self.pool)
            .await
            .map_err(|e| self.error("insert", e))?;

        Ok(result.rows_affected() == 1)
    }
}

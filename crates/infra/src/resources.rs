//! Resource directory: existence checks and legacy bitfield reads.
//!
//! Member and event rows are owned by the CRUD side of the system; this
//! subsystem only reads them, and only to resolve a route's subject and to
//! read the legacy `flags` integer.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use sqlx::PgPool;
use std::sync::Arc;
use tracing::instrument;

use memberhub_core::{DomainError, DomainResult, EntityId};

use crate::sqlx_error::map_sqlx_error;

/// Read-only view over resource rows.
#[async_trait]
pub trait ResourceDirectory: Send + Sync {
    /// True iff a row of `entity_type` with `id` exists. Unknown entity
    /// types resolve to false, not an error.
    async fn exists(&self, entity_type: &str, id: EntityId) -> DomainResult<bool>;

    /// The legacy `flags` bitfield of the row, or NotFound.
    async fn flags_bitfield(&self, entity_type: &str, id: EntityId) -> DomainResult<u64>;
}

/// Postgres-backed directory over the CRUD-owned tables.
#[derive(Debug, Clone)]
pub struct PostgresResourceDirectory {
    pool: Arc<PgPool>,
}

impl PostgresResourceDirectory {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    /// Entity types are a closed set; table names are never interpolated
    /// from request input.
    fn table_for(entity_type: &str) -> Option<&'static str> {
        match entity_type {
            "member" => Some("members"),
            "event" => Some("events"),
            _ => None,
        }
    }
}

#[async_trait]
impl ResourceDirectory for PostgresResourceDirectory {
    #[instrument(skip(self), err)]
    async fn exists(&self, entity_type: &str, id: EntityId) -> DomainResult<bool> {
        let Some(table) = Self::table_for(entity_type) else {
            return Ok(false);
        };

        let found: Option<i32> =
            sqlx::query_scalar(&format!("SELECT 1 FROM {table} WHERE id = $1"))
                .bind(id.as_i64())
                .fetch_optional(&*self.pool)
                .await
                .map_err(|e| map_sqlx_error("resources.exists", e))?;

        Ok(found.is_some())
    }

    #[instrument(skip(self), err)]
    async fn flags_bitfield(&self, entity_type: &str, id: EntityId) -> DomainResult<u64> {
        let Some(table) = Self::table_for(entity_type) else {
            return Err(DomainError::not_found(entity_type, Some(id.as_i64())));
        };

        let flags: Option<i64> =
            sqlx::query_scalar(&format!("SELECT flags FROM {table} WHERE id = $1"))
                .bind(id.as_i64())
                .fetch_optional(&*self.pool)
                .await
                .map_err(|e| map_sqlx_error("resources.flags_bitfield", e))?;

        flags
            .map(|f| f as u64)
            .ok_or_else(|| DomainError::not_found(entity_type, Some(id.as_i64())))
    }
}

/// In-memory directory for tests/dev.
#[derive(Debug, Default)]
pub struct InMemoryResourceDirectory {
    rows: RwLock<HashMap<(String, i64), u64>>,
}

impl InMemoryResourceDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, entity_type: &str, id: EntityId, flags: u64) {
        if let Ok(mut rows) = self.rows.write() {
            rows.insert((entity_type.to_string(), id.as_i64()), flags);
        }
    }
}

#[async_trait]
impl ResourceDirectory for InMemoryResourceDirectory {
    async fn exists(&self, entity_type: &str, id: EntityId) -> DomainResult<bool> {
        Ok(self
            .rows
            .read()
            .map_err(|_| DomainError::unknown("resource directory lock poisoned"))?
            .contains_key(&(entity_type.to_string(), id.as_i64())))
    }

    async fn flags_bitfield(&self, entity_type: &str, id: EntityId) -> DomainResult<u64> {
        self.rows
            .read()
            .map_err(|_| DomainError::unknown("resource directory lock poisoned"))?
            .get(&(entity_type.to_string(), id.as_i64()))
            .copied()
            .ok_or_else(|| DomainError::not_found(entity_type, Some(id.as_i64())))
    }
}

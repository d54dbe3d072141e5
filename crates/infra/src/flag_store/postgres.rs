//! Postgres-backed flag store.
//!
//! Grants live in `flag_grants` with primary key (subject_id, flag_id); the
//! upsert uses `ON CONFLICT DO UPDATE`, so concurrent grant/revoke of the
//! same key serialize on the row lock with last-writer-wins semantics and no
//! duplicate rows. Definitions live in `flag_definitions`.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row};
use tracing::instrument;

use memberhub_auth::{FlagCategory, FlagDefinition, FlagGrant, FlagId};
use memberhub_core::{DomainError, DomainResult, SubjectId};

use crate::sqlx_error::{is_unique_violation, map_sqlx_error, map_tx_error};

use super::FlagStore;

#[derive(Debug, Clone)]
pub struct PostgresFlagStore {
    pool: Arc<PgPool>,
}

impl PostgresFlagStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }
}

#[async_trait]
impl FlagStore for PostgresFlagStore {
    #[instrument(skip(self, definition), fields(flag_id = %definition.id), err)]
    async fn define(&self, definition: FlagDefinition) -> DomainResult<()> {
        sqlx::query(
            r#"
            INSERT INTO flag_definitions (flag_id, name, description, category)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(definition.id.as_str())
        .bind(&definition.name)
        .bind(&definition.description)
        .bind(definition.category.as_str())
        .execute(&*self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                DomainError::UniqueConstraint {
                    field: "flag_id".to_string(),
                    value: definition.id.to_string(),
                }
            } else {
                map_sqlx_error("flag_store.define", e)
            }
        })?;

        Ok(())
    }

    #[instrument(skip(self), err)]
    async fn definitions(&self) -> DomainResult<Vec<FlagDefinition>> {
        let rows = sqlx::query(
            r#"
            SELECT flag_id, name, description, category
            FROM flag_definitions
            ORDER BY flag_id ASC
            "#,
        )
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("flag_store.definitions", e))?;

        let mut definitions = Vec::with_capacity(rows.len());
        for row in rows {
            definitions.push(definition_from_row(&row)?);
        }
        Ok(definitions)
    }

    #[instrument(skip(self), fields(flag_id = %flag_id), err)]
    async fn definition(&self, flag_id: &FlagId) -> DomainResult<Option<FlagDefinition>> {
        let row = sqlx::query(
            r#"
            SELECT flag_id, name, description, category
            FROM flag_definitions
            WHERE flag_id = $1
            "#,
        )
        .bind(flag_id.as_str())
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("flag_store.definition", e))?;

        row.map(|r| definition_from_row(&r)).transpose()
    }

    #[instrument(
        skip(self, grant),
        fields(subject_id = %grant.subject_id, flag_id = %grant.flag_id),
        err
    )]
    async fn grant(&self, grant: FlagGrant) -> DomainResult<()> {
        // Definition check and upsert share one transaction so a concurrent
        // definition delete cannot race the insert past the FK.
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_tx_error("flag_store.grant.begin", e))?;

        let known: Option<i32> = sqlx::query_scalar(
            "SELECT 1 FROM flag_definitions WHERE flag_id = $1",
        )
        .bind(grant.flag_id.as_str())
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("flag_store.grant.lookup", e))?;

        if known.is_none() {
            return Err(DomainError::flag_invalid(format!(
                "unknown flag '{}'",
                grant.flag_id
            )));
        }

        sqlx::query(
            r#"
            INSERT INTO flag_grants
                (subject_id, flag_id, granted_at, granted_by, expires_at, metadata)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (subject_id, flag_id)
            DO UPDATE SET
                granted_at = EXCLUDED.granted_at,
                granted_by = EXCLUDED.granted_by,
                expires_at = EXCLUDED.expires_at,
                metadata = EXCLUDED.metadata
            "#,
        )
        .bind(grant.subject_id.as_i64())
        .bind(grant.flag_id.as_str())
        .bind(grant.granted_at)
        .bind(grant.granted_by.as_str())
        .bind(grant.expires_at)
        .bind(&grant.metadata)
        .execute(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("flag_store.grant.upsert", e))?;

        tx.commit()
            .await
            .map_err(|e| map_tx_error("flag_store.grant.commit", e))?;

        Ok(())
    }

    #[instrument(skip(self), fields(subject_id = %subject_id, flag_id = %flag_id), err)]
    async fn revoke(
        &self,
        subject_id: SubjectId,
        flag_id: &FlagId,
        reason: Option<&str>,
    ) -> DomainResult<()> {
        let result = sqlx::query(
            "DELETE FROM flag_grants WHERE subject_id = $1 AND flag_id = $2",
        )
        .bind(subject_id.as_i64())
        .bind(flag_id.as_str())
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("flag_store.revoke", e))?;

        if result.rows_affected() > 0 {
            tracing::info!(
                subject_id = %subject_id,
                flag_id = %flag_id,
                reason = reason.unwrap_or("unspecified"),
                "flag revoked"
            );
        }

        Ok(())
    }

    #[instrument(skip(self), fields(subject_id = %subject_id, flag_id = %flag_id), err)]
    async fn is_active(
        &self,
        subject_id: SubjectId,
        flag_id: &FlagId,
        now: DateTime<Utc>,
    ) -> DomainResult<bool> {
        let row = sqlx::query(
            "SELECT expires_at FROM flag_grants WHERE subject_id = $1 AND flag_id = $2",
        )
        .bind(subject_id.as_i64())
        .bind(flag_id.as_str())
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("flag_store.is_active", e))?;

        let Some(row) = row else {
            return Ok(false);
        };

        // Expiry is evaluated here against the injected clock, not in SQL
        // against the database clock.
        let expires_at: Option<DateTime<Utc>> = row
            .try_get("expires_at")
            .map_err(|e| map_sqlx_error("flag_store.is_active", e))?;

        Ok(expires_at.is_none_or(|e| e > now))
    }

    #[instrument(skip(self), fields(subject_id = %subject_id), err)]
    async fn list_for_subject(
        &self,
        subject_id: SubjectId,
        now: DateTime<Utc>,
    ) -> DomainResult<HashSet<FlagId>> {
        let rows = sqlx::query(
            "SELECT flag_id, expires_at FROM flag_grants WHERE subject_id = $1",
        )
        .bind(subject_id.as_i64())
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("flag_store.list_for_subject", e))?;

        let mut active = HashSet::with_capacity(rows.len());
        for row in rows {
            let expires_at: Option<DateTime<Utc>> = row
                .try_get("expires_at")
                .map_err(|e| map_sqlx_error("flag_store.list_for_subject", e))?;
            if expires_at.is_none_or(|e| e > now) {
                let flag_id: String = row
                    .try_get("flag_id")
                    .map_err(|e| map_sqlx_error("flag_store.list_for_subject", e))?;
                active.insert(FlagId::new(flag_id));
            }
        }
        Ok(active)
    }
}

fn definition_from_row(row: &sqlx::postgres::PgRow) -> DomainResult<FlagDefinition> {
    let flag_id: String = row
        .try_get("flag_id")
        .map_err(|e| map_sqlx_error("flag_store.read_definition", e))?;
    let name: String = row
        .try_get("name")
        .map_err(|e| map_sqlx_error("flag_store.read_definition", e))?;
    let description: Option<String> = row
        .try_get("description")
        .map_err(|e| map_sqlx_error("flag_store.read_definition", e))?;
    let category: String = row
        .try_get("category")
        .map_err(|e| map_sqlx_error("flag_store.read_definition", e))?;

    Ok(FlagDefinition {
        id: FlagId::new(flag_id),
        name,
        description,
        category: FlagCategory::parse(&category),
    })
}

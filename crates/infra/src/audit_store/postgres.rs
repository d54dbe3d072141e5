//! Postgres-backed audit store.
//!
//! Single-row insert per entry; no read-modify-write of prior entries ever.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row};
use tracing::instrument;

use memberhub_core::{Action, DomainResult};

use crate::sqlx_error::map_sqlx_error;

use super::{AuditEntry, AuditFilter, AuditQueryResult, AuditStore, Pagination};

#[derive(Debug, Clone)]
pub struct PostgresAuditStore {
    pool: Arc<PgPool>,
}

impl PostgresAuditStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }
}

#[async_trait]
impl AuditStore for PostgresAuditStore {
    #[instrument(
        skip(self, entry),
        fields(entity_type = %entry.entity_type, action = %entry.action),
        err
    )]
    async fn append(&self, entry: AuditEntry) -> DomainResult<()> {
        sqlx::query(
            r#"
            INSERT INTO audit_entries (
                entity_type,
                entity_id,
                action,
                user_session_id,
                user_id,
                user_ip,
                new_values,
                old_values,
                metadata,
                created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(&entry.entity_type)
        .bind(entry.entity_id)
        .bind(entry.action.as_str())
        .bind(&entry.user_session_id)
        .bind(&entry.user_id)
        .bind(&entry.user_ip)
        .bind(&entry.new_values)
        .bind(&entry.old_values)
        .bind(&entry.metadata)
        .bind(entry.created_at)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("audit_store.append", e))?;

        Ok(())
    }

    #[instrument(skip(self, filter), err)]
    async fn query(
        &self,
        filter: AuditFilter,
        pagination: Pagination,
    ) -> DomainResult<AuditQueryResult> {
        let action_param: Option<&str> = filter.action.map(|a| a.as_str());

        let count_row = sqlx::query(
            r#"
            SELECT COUNT(*) as total
            FROM audit_entries
            WHERE ($1::text IS NULL OR entity_type = $1)
                AND ($2::bigint IS NULL OR entity_id = $2)
                AND ($3::text IS NULL OR action = $3)
                AND ($4::text IS NULL OR user_id = $4)
                AND ($5::timestamptz IS NULL OR created_at >= $5)
                AND ($6::timestamptz IS NULL OR created_at <= $6)
            "#,
        )
        .bind(&filter.entity_type)
        .bind(filter.entity_id)
        .bind(action_param)
        .bind(&filter.user_id)
        .bind(filter.created_after)
        .bind(filter.created_before)
        .fetch_one(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("audit_store.count", e))?;

        let total: i64 = count_row
            .try_get("total")
            .map_err(|e| map_sqlx_error("audit_store.count", e))?;

        let rows = sqlx::query(
            r#"
            SELECT
                entity_type,
                entity_id,
                action,
                user_session_id,
                user_id,
                user_ip,
                new_values,
                old_values,
                metadata,
                created_at
            FROM audit_entries
            WHERE ($1::text IS NULL OR entity_type = $1)
                AND ($2::bigint IS NULL OR entity_id = $2)
                AND ($3::text IS NULL OR action = $3)
                AND ($4::text IS NULL OR user_id = $4)
                AND ($5::timestamptz IS NULL OR created_at >= $5)
                AND ($6::timestamptz IS NULL OR created_at <= $6)
            ORDER BY created_at DESC
            LIMIT $7 OFFSET $8
            "#,
        )
        .bind(&filter.entity_type)
        .bind(filter.entity_id)
        .bind(action_param)
        .bind(&filter.user_id)
        .bind(filter.created_after)
        .bind(filter.created_before)
        .bind(i64::from(pagination.limit))
        .bind(i64::from(pagination.offset))
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("audit_store.query", e))?;

        let mut entries = Vec::with_capacity(rows.len());
        for row in rows {
            entries.push(entry_from_row(&row)?);
        }

        // Widen before adding; offset + limit can exceed u32.
        let has_more = total > i64::from(pagination.offset) + i64::from(pagination.limit);

        Ok(AuditQueryResult {
            entries,
            total: total as u64,
            pagination,
            has_more,
        })
    }
}

fn entry_from_row(row: &sqlx::postgres::PgRow) -> DomainResult<AuditEntry> {
    let read = |e: sqlx::Error| map_sqlx_error("audit_store.read_entry", e);

    let action: String = row.try_get("action").map_err(read)?;
    let created_at: DateTime<Utc> = row.try_get("created_at").map_err(read)?;

    Ok(AuditEntry {
        entity_type: row.try_get("entity_type").map_err(read)?,
        entity_id: row.try_get("entity_id").map_err(read)?,
        action: Action::parse(&action),
        user_session_id: row.try_get("user_session_id").map_err(read)?,
        user_id: row.try_get("user_id").map_err(read)?,
        user_ip: row.try_get("user_ip").map_err(read)?,
        new_values: row.try_get("new_values").map_err(read)?,
        old_values: row.try_get("old_values").map_err(read)?,
        metadata: row.try_get("metadata").map_err(read)?,
        created_at,
    })
}

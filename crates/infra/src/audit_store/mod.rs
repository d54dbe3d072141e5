//! Append-only audit trail storage.
//!
//! Entries are immutable once written; the store exposes append and filtered
//! query only, never update or delete.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use memberhub_core::{Action, DomainResult};

mod in_memory;
mod postgres;

pub use in_memory::InMemoryAuditStore;
pub use postgres::PostgresAuditStore;

/// One immutable audit record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub entity_type: String,
    /// None for collection-level actions (e.g. search, create).
    pub entity_id: Option<i64>,
    pub action: Action,
    pub user_session_id: Option<String>,
    pub user_id: Option<String>,
    pub user_ip: Option<String>,
    /// Request payload snapshot, present only for create/update.
    pub new_values: Option<serde_json::Value>,
    /// Reserved for before/after diffing; currently always None.
    pub old_values: Option<serde_json::Value>,
    /// User agent, referer, method, path, final status code.
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

/// Optional filters for audit queries. All absent means "everything".
#[derive(Debug, Clone, Default)]
pub struct AuditFilter {
    pub entity_type: Option<String>,
    pub entity_id: Option<i64>,
    pub action: Option<Action>,
    pub user_id: Option<String>,
    pub created_after: Option<DateTime<Utc>>,
    pub created_before: Option<DateTime<Utc>>,
}

/// Limit/offset pagination.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    pub limit: u32,
    pub offset: u32,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            limit: 50,
            offset: 0,
        }
    }
}

/// Query result page, newest entries first.
#[derive(Debug, Clone, Serialize)]
pub struct AuditQueryResult {
    pub entries: Vec<AuditEntry>,
    pub total: u64,
    pub pagination: Pagination,
    pub has_more: bool,
}

/// Append-only audit persistence.
#[async_trait]
pub trait AuditStore: Send + Sync {
    async fn append(&self, entry: AuditEntry) -> DomainResult<()>;

    async fn query(
        &self,
        filter: AuditFilter,
        pagination: Pagination,
    ) -> DomainResult<AuditQueryResult>;
}

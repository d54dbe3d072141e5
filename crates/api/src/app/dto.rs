//! Request/response DTOs for the flag and audit endpoints.

use chrono::{DateTime, Utc};
use serde::Deserialize;

use memberhub_core::Action;
use memberhub_infra::{AuditFilter, Pagination};

#[derive(Debug, Deserialize)]
pub struct DefineFlagRequest {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    /// Category code; unknown codes fall back to "other".
    #[serde(default)]
    pub category: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct GrantFlagRequest {
    pub flag_id: String,
    /// Absent means the grant is permanent.
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub metadata: Option<serde_json::Value>,
}

#[derive(Debug, Default, Deserialize)]
pub struct RevokeFlagQuery {
    /// Free-text revocation reason; logged, not persisted.
    #[serde(default)]
    pub reason: Option<String>,
}

/// Query string for `GET /api/audit`.
#[derive(Debug, Default, Deserialize)]
pub struct AuditQuery {
    #[serde(default)]
    pub entity_type: Option<String>,
    #[serde(default)]
    pub entity_id: Option<i64>,
    #[serde(default)]
    pub action: Option<String>,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub created_after: Option<DateTime<Utc>>,
    #[serde(default)]
    pub created_before: Option<DateTime<Utc>>,
    #[serde(default)]
    pub limit: Option<u32>,
    #[serde(default)]
    pub offset: Option<u32>,
}

const MAX_PAGE_SIZE: u32 = 200;

impl AuditQuery {
    pub fn filter(&self) -> AuditFilter {
        AuditFilter {
            entity_type: self.entity_type.clone(),
            entity_id: self.entity_id,
            action: self.action.as_deref().map(Action::parse),
            user_id: self.user_id.clone(),
            created_after: self.created_after,
            created_before: self.created_before,
        }
    }

    pub fn pagination(&self) -> Pagination {
        let default = Pagination::default();
        Pagination {
            limit: self.limit.unwrap_or(default.limit).clamp(1, MAX_PAGE_SIZE),
            offset: self.offset.unwrap_or(default.offset),
        }
    }
}

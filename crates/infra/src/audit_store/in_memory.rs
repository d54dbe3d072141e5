//! In-memory audit store for tests/dev.

use std::sync::RwLock;

use async_trait::async_trait;

use memberhub_core::{DomainError, DomainResult};

use super::{AuditEntry, AuditFilter, AuditQueryResult, AuditStore, Pagination};

#[derive(Debug, Default)]
pub struct InMemoryAuditStore {
    entries: RwLock<Vec<AuditEntry>>,
}

impl InMemoryAuditStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything recorded so far, oldest first.
    pub fn all(&self) -> Vec<AuditEntry> {
        self.entries.read().map(|e| e.clone()).unwrap_or_default()
    }
}

fn matches(entry: &AuditEntry, filter: &AuditFilter) -> bool {
    if let Some(entity_type) = &filter.entity_type {
        if &entry.entity_type != entity_type {
            return false;
        }
    }
    if let Some(entity_id) = filter.entity_id {
        if entry.entity_id != Some(entity_id) {
            return false;
        }
    }
    if let Some(action) = filter.action {
        if entry.action != action {
            return false;
        }
    }
    if let Some(user_id) = &filter.user_id {
        if entry.user_id.as_deref() != Some(user_id.as_str()) {
            return false;
        }
    }
    if let Some(after) = filter.created_after {
        if entry.created_at < after {
            return false;
        }
    }
    if let Some(before) = filter.created_before {
        if entry.created_at > before {
            return false;
        }
    }
    true
}

#[async_trait]
impl AuditStore for InMemoryAuditStore {
    async fn append(&self, entry: AuditEntry) -> DomainResult<()> {
        self.entries
            .write()
            .map_err(|_| DomainError::unknown("audit store lock poisoned"))?
            .push(entry);
        Ok(())
    }

    async fn query(
        &self,
        filter: AuditFilter,
        pagination: Pagination,
    ) -> DomainResult<AuditQueryResult> {
        let entries = self
            .entries
            .read()
            .map_err(|_| DomainError::unknown("audit store lock poisoned"))?;

        let mut hits: Vec<AuditEntry> = entries
            .iter()
            .filter(|e| matches(e, &filter))
            .cloned()
            .collect();
        hits.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        let total = hits.len() as u64;
        let page: Vec<AuditEntry> = hits
            .into_iter()
            .skip(pagination.offset as usize)
            .take(pagination.limit as usize)
            .collect();
        // Widen before adding; offset + limit can exceed u32.
        let has_more = total > u64::from(pagination.offset) + u64::from(pagination.limit);

        Ok(AuditQueryResult {
            entries: page,
            total,
            pagination,
            has_more,
        })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

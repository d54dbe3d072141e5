//! In-memory flag store.
//!
//! Intended for tests/dev. The single `RwLock` stands in for the row-level
//! serialization the Postgres store gets from its upsert.

use std::collections::{HashMap, HashSet};
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use memberhub_auth::{FlagDefinition, FlagGrant, FlagId};
use memberhub_core::{DomainError, DomainResult, SubjectId};

use super::FlagStore;

#[derive(Debug, Default)]
struct Inner {
    definitions: HashMap<FlagId, FlagDefinition>,
    grants: HashMap<(SubjectId, FlagId), FlagGrant>,
}

#[derive(Debug, Default)]
pub struct InMemoryFlagStore {
    inner: RwLock<Inner>,
}

impl InMemoryFlagStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> DomainResult<std::sync::RwLockReadGuard<'_, Inner>> {
        self.inner
            .read()
            .map_err(|_| DomainError::unknown("flag store lock poisoned"))
    }

    fn write(&self) -> DomainResult<std::sync::RwLockWriteGuard<'_, Inner>> {
        self.inner
            .write()
            .map_err(|_| DomainError::unknown("flag store lock poisoned"))
    }
}

#[async_trait]
impl FlagStore for InMemoryFlagStore {
    async fn define(&self, definition: FlagDefinition) -> DomainResult<()> {
        let mut inner = self.write()?;
        if inner.definitions.contains_key(&definition.id) {
            return Err(DomainError::UniqueConstraint {
                field: "flag_id".to_string(),
                value: definition.id.to_string(),
            });
        }
        inner.definitions.insert(definition.id.clone(), definition);
        Ok(())
    }

    async fn definitions(&self) -> DomainResult<Vec<FlagDefinition>> {
        let inner = self.read()?;
        let mut definitions: Vec<_> = inner.definitions.values().cloned().collect();
        definitions.sort_by(|a, b| a.id.as_str().cmp(b.id.as_str()));
        Ok(definitions)
    }

    async fn definition(&self, flag_id: &FlagId) -> DomainResult<Option<FlagDefinition>> {
        Ok(self.read()?.definitions.get(flag_id).cloned())
    }

    async fn grant(&self, grant: FlagGrant) -> DomainResult<()> {
        let mut inner = self.write()?;
        if !inner.definitions.contains_key(&grant.flag_id) {
            return Err(DomainError::flag_invalid(format!(
                "unknown flag '{}'",
                grant.flag_id
            )));
        }
        // Last writer wins; never more than one row per key.
        inner
            .grants
            .insert((grant.subject_id, grant.flag_id.clone()), grant);
        Ok(())
    }

    async fn revoke(
        &self,
        subject_id: SubjectId,
        flag_id: &FlagId,
        _reason: Option<&str>,
    ) -> DomainResult<()> {
        self.write()?
            .grants
            .remove(&(subject_id, flag_id.clone()));
        Ok(())
    }

    async fn is_active(
        &self,
        subject_id: SubjectId,
        flag_id: &FlagId,
        now: DateTime<Utc>,
    ) -> DomainResult<bool> {
        Ok(self
            .read()?
            .grants
            .get(&(subject_id, flag_id.clone()))
            .is_some_and(|g| g.is_active(now)))
    }

    async fn list_for_subject(
        &self,
        subject_id: SubjectId,
        now: DateTime<Utc>,
    ) -> DomainResult<HashSet<FlagId>> {
        Ok(self
            .read()?
            .grants
            .values()
            .filter(|g| g.subject_id == subject_id && g.is_active(now))
            .map(|g| g.flag_id.clone())
            .collect())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use memberhub_auth::FlagCategory;
    use memberhub_core::ActorId;

    fn definition(id: &'static str) -> FlagDefinition {
        FlagDefinition {
            id: FlagId::new(id),
            name: id.to_string(),
            description: None,
            category: FlagCategory::Feature,
        }
    }

    fn grant_row(
        subject: i64,
        flag: &'static str,
        expires_at: Option<DateTime<Utc>>,
        note: &str,
    ) -> FlagGrant {
        FlagGrant {
            subject_id: SubjectId::new(subject),
            flag_id: FlagId::new(flag),
            granted_at: Utc::now(),
            granted_by: ActorId::new("admin-1"),
            expires_at,
            metadata: serde_json::json!({ "note": note }),
        }
    }

    #[tokio::test]
    async fn grant_requires_known_definition() {
        let store = InMemoryFlagStore::new();
        let err = store
            .grant(grant_row(1, "undefined_flag", None, "x"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DomainError::Flag {
                kind: memberhub_core::FlagErrorKind::Invalid,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn grant_revoke_grant_leaves_second_grant_active() {
        let store = InMemoryFlagStore::new();
        store.define(definition("paid_member")).await.unwrap();
        let flag = FlagId::new("paid_member");
        let subject = SubjectId::new(42);

        store
            .grant(grant_row(42, "paid_member", None, "first"))
            .await
            .unwrap();
        store.revoke(subject, &flag, Some("lapsed")).await.unwrap();
        assert!(!store.is_active(subject, &flag, Utc::now()).await.unwrap());

        store
            .grant(grant_row(42, "paid_member", None, "second"))
            .await
            .unwrap();
        assert!(store.is_active(subject, &flag, Utc::now()).await.unwrap());

        let inner = store.inner.read().unwrap();
        let rows: Vec<_> = inner
            .grants
            .values()
            .filter(|g| g.subject_id == subject)
            .collect();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].metadata["note"], "second");
    }

    #[tokio::test]
    async fn regrant_replaces_rather_than_duplicates() {
        let store = InMemoryFlagStore::new();
        store.define(definition("paid_member")).await.unwrap();

        store
            .grant(grant_row(7, "paid_member", None, "a"))
            .await
            .unwrap();
        store
            .grant(grant_row(7, "paid_member", None, "b"))
            .await
            .unwrap();

        assert_eq!(store.inner.read().unwrap().grants.len(), 1);
    }

    #[tokio::test]
    async fn expired_grants_are_inactive_and_excluded_from_listing() {
        let store = InMemoryFlagStore::new();
        store.define(definition("trial")).await.unwrap();
        store.define(definition("paid_member")).await.unwrap();

        let now = Utc::now();
        store
            .grant(grant_row(9, "trial", Some(now - Duration::hours(1)), "old"))
            .await
            .unwrap();
        store
            .grant(grant_row(9, "paid_member", Some(now + Duration::hours(1)), "new"))
            .await
            .unwrap();

        let subject = SubjectId::new(9);
        assert!(!store
            .is_active(subject, &FlagId::new("trial"), now)
            .await
            .unwrap());

        let active = store.list_for_subject(subject, now).await.unwrap();
        assert_eq!(active.len(), 1);
        assert!(active.contains(&FlagId::new("paid_member")));
    }

    #[tokio::test]
    async fn revoke_of_absent_grant_is_a_noop() {
        let store = InMemoryFlagStore::new();
        store
            .revoke(SubjectId::new(1), &FlagId::new("anything"), None)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn duplicate_definition_is_a_unique_constraint_error() {
        let store = InMemoryFlagStore::new();
        store.define(definition("paid_member")).await.unwrap();
        let err = store.define(definition("paid_member")).await.unwrap_err();
        assert!(matches!(err, DomainError::UniqueConstraint { .. }));
    }
}

//! Flag store: definitions (reference data) and time-bounded grants.
//!
//! Expiry is evaluated lazily at check time against a caller-supplied `now`;
//! there is no background sweep. Grant/revoke for the same (subject, flag)
//! pair are serialized by the backing store with last-writer-wins semantics.

use std::collections::HashSet;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use memberhub_auth::{FlagDefinition, FlagGrant, FlagId};
use memberhub_core::{DomainResult, SubjectId};

mod in_memory;
mod postgres;

pub use in_memory::InMemoryFlagStore;
pub use postgres::PostgresFlagStore;

/// Persistent mapping from (subject, flag) to grant metadata.
#[async_trait]
pub trait FlagStore: Send + Sync {
    /// Register a flag definition. Fails with a unique-constraint error if
    /// the id is already defined.
    async fn define(&self, definition: FlagDefinition) -> DomainResult<()>;

    /// All known flag definitions.
    async fn definitions(&self) -> DomainResult<Vec<FlagDefinition>>;

    /// Look up one definition by id.
    async fn definition(&self, flag_id: &FlagId) -> DomainResult<Option<FlagDefinition>>;

    /// Upsert a grant. Granting an already-granted flag replaces the existing
    /// row (there is never more than one row per (subject, flag) key).
    /// Fails with a flag validation error if the flag id is not defined.
    async fn grant(&self, grant: FlagGrant) -> DomainResult<()>;

    /// Delete a grant. Revoking an absent grant is a no-op, not an error.
    async fn revoke(
        &self,
        subject_id: SubjectId,
        flag_id: &FlagId,
        reason: Option<&str>,
    ) -> DomainResult<()>;

    /// True iff a grant exists and is unexpired at `now`
    /// (`expires_at` null, or strictly greater than `now`).
    async fn is_active(
        &self,
        subject_id: SubjectId,
        flag_id: &FlagId,
        now: DateTime<Utc>,
    ) -> DomainResult<bool>;

    /// The set of flag ids active for a subject at `now`.
    async fn list_for_subject(
        &self,
        subject_id: SubjectId,
        now: DateTime<Utc>,
    ) -> DomainResult<HashSet<FlagId>>;
}

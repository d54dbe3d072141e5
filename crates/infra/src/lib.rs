//! `memberhub-infra` — persistence adapters for the authorization-and-audit
//! subsystem.
//!
//! Each concern gets a trait, a Postgres implementation, and an in-memory
//! implementation intended for tests/dev. Store handles are always passed
//! explicitly (dependency injection), never read from process-wide state.

pub mod audit_store;
pub mod flag_store;
pub mod resources;
pub mod sqlx_error;

pub use audit_store::{
    AuditEntry, AuditFilter, AuditQueryResult, AuditStore, InMemoryAuditStore, Pagination,
    PostgresAuditStore,
};
pub use flag_store::{FlagStore, InMemoryFlagStore, PostgresFlagStore};
pub use resources::{InMemoryResourceDirectory, PostgresResourceDirectory, ResourceDirectory};

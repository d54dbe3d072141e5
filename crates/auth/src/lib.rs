//! `memberhub-auth` — pure authorization domain (no HTTP, no storage).
//!
//! This crate models sessions, access levels, capability flags and the
//! authorization decisions computed over them. IO-touching orchestration
//! (flag-store lookups, resource resolution) lives in the api crate.

pub mod access;
pub mod authorize;
pub mod flags;
pub mod session;

pub use access::AccessLevel;
pub use authorize::{Decision, DenyReason, check_access_level, check_required_flags, ensure_session};
pub use flags::{FlagCategory, FlagDefinition, FlagGrant, FlagId};
pub use session::Session;

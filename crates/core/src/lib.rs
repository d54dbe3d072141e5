//! `memberhub-core` — domain foundation building blocks.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns).

pub mod action;
pub mod bitfield;
pub mod error;
pub mod id;

pub use action::Action;
pub use error::{AuthenticationReason, DomainError, DomainResult, FlagErrorKind};
pub use id::{ActorId, EntityId, SessionId, SubjectId};

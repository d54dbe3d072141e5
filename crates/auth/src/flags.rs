//! Capability flags: definitions (immutable reference data) and time-bounded
//! grants layered on top of the legacy bitfield model.

use std::borrow::Cow;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use memberhub_core::{ActorId, SubjectId};

/// Flag identifier.
///
/// Flags are modeled as opaque stable string keys (e.g. "identity_verified").
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FlagId(Cow<'static, str>);

impl FlagId {
    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for FlagId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Category of a flag definition.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlagCategory {
    Verification,
    Subscription,
    Feature,
    Compliance,
    Admin,
    Other,
}

impl FlagCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            FlagCategory::Verification => "verification",
            FlagCategory::Subscription => "subscription",
            FlagCategory::Feature => "feature",
            FlagCategory::Compliance => "compliance",
            FlagCategory::Admin => "admin",
            FlagCategory::Other => "other",
        }
    }

    /// Parse a stored category code. Unknown codes fall back to `Other`.
    pub fn parse(s: &str) -> Self {
        match s {
            "verification" => FlagCategory::Verification,
            "subscription" => FlagCategory::Subscription,
            "feature" => FlagCategory::Feature,
            "compliance" => FlagCategory::Compliance,
            "admin" => FlagCategory::Admin,
            _ => FlagCategory::Other,
        }
    }
}

/// Immutable flag reference data, administered separately from grants.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlagDefinition {
    pub id: FlagId,
    pub name: String,
    pub description: Option<String>,
    pub category: FlagCategory,
}

/// A (subject, flag) grant. At most one row exists per key; granting again
/// replaces the existing row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlagGrant {
    pub subject_id: SubjectId,
    pub flag_id: FlagId,
    pub granted_at: DateTime<Utc>,
    pub granted_by: ActorId,
    /// None means the grant is permanent.
    pub expires_at: Option<DateTime<Utc>>,
    pub metadata: serde_json::Value,
}

impl FlagGrant {
    /// A grant is active iff it has no expiry or the expiry is strictly in
    /// the future. `expires_at == now` is inactive.
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_none_or(|expires_at| expires_at > now)
    }
}

//! Legacy access levels.
//!
//! Coarse administrative checks compare a session's level against a static
//! minimum. Levels are totally ordered; the comparison is `>=`, never bitwise.

use serde::{Deserialize, Serialize};

/// Access level carried on every session.
///
/// The derive order matters: `Ord` follows declaration order, so
/// `Member < Moderator < Admin < SuperAdmin`.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessLevel {
    Member,
    Moderator,
    Admin,
    SuperAdmin,
}

impl AccessLevel {
    /// Decode the legacy integer column. Unknown codes clamp to `Member`
    /// (least privilege) rather than erroring.
    pub fn from_legacy_code(code: i64) -> Self {
        match code {
            3 => AccessLevel::SuperAdmin,
            2 => AccessLevel::Admin,
            1 => AccessLevel::Moderator,
            _ => AccessLevel::Member,
        }
    }

    pub fn legacy_code(&self) -> i64 {
        match self {
            AccessLevel::Member => 0,
            AccessLevel::Moderator => 1,
            AccessLevel::Admin => 2,
            AccessLevel::SuperAdmin => 3,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AccessLevel::Member => "member",
            AccessLevel::Moderator => "moderator",
            AccessLevel::Admin => "admin",
            AccessLevel::SuperAdmin => "super_admin",
        }
    }
}

impl core::fmt::Display for AccessLevel {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

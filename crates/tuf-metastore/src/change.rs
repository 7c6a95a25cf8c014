//! The change journal record type (spec §3 `ChangeRecord`, §4.F `ChangeFeed`).

use chrono::{DateTime, Utc};

use crate::model::Gun;

/// Why a [`ChangeRecord`] was appended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeCategory {
    /// A role was written (`UpdateCurrent`/`UpdateMany`).
    Update,
    /// A GUN was removed (`Delete`).
    Deletion,
}

impl ChangeCategory {
    /// The string stored in the `change_category.category` column.
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeCategory::Update => "update",
            ChangeCategory::Deletion => "deletion",
        }
    }
}

impl std::str::FromStr for ChangeCategory {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "update" => Ok(ChangeCategory::Update),
            "deletion" => Ok(ChangeCategory::Deletion),
            other => Err(crate::Error::StorageFailure(format!(
                "unknown change category {:?}",
                other
            ))),
        }
    }
}

/// An append-only record of a single successful metadata mutation (spec §3, §4.F).
///
/// `id` is assigned by the store and is totally ordered and monotonically non-decreasing across
/// the whole journal; it need not be dense.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ChangeRecord {
    /// The store-assigned sequence id. Totally ordered; never decreases.
    pub id: i64,
    /// When the change was committed.
    pub created_at: DateTime<Utc>,
    /// The GUN the change applies to.
    pub gun: Gun,
    /// Whether this was a role update or a whole-GUN deletion.
    pub category: ChangeCategory,
    /// The role written, or the empty string for a deletion record (spec §4.A `Delete`).
    pub role: String,
    /// The version written, or 0 for a deletion record.
    pub version: u32,
    /// Hex-encoded sha256 of the stored bytes, or empty for a deletion record.
    pub sha256_hex: String,
}

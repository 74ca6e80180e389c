//! The persisted build record and its blob wire format.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle tag of a build record. Only `Ready` exists today; the field is
/// kept so future states don't require a blob migration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BuildStatus {
    Ready,
}

/// One observed build of the watched upstream target.
///
/// Field names on the wire match the stored blob format:
/// `{"type":"READY","hash":"...","id":"...","timestamp":<ms>}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildRecord {
    /// Stable identity key; unique across the stored history.
    pub hash: String,
    /// Upstream build number. Informational only — never used for ordering.
    #[serde(rename = "id")]
    pub sequence_id: String,
    /// When this build was first observed locally.
    #[serde(rename = "timestamp", with = "chrono::serde::ts_milliseconds")]
    pub observed_at: DateTime<Utc>,
    #[serde(rename = "type")]
    pub status: BuildStatus,
}

impl BuildRecord {
    pub fn observed_now(hash: impl Into<String>, sequence_id: impl Into<String>) -> Self {
        Self {
            hash: hash.into(),
            sequence_id: sequence_id.into(),
            observed_at: Utc::now(),
            status: BuildStatus::Ready,
        }
    }
}

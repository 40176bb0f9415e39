//! Application version metadata and the dotted-version comparator.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

/// A released application version as reported by the version endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppVersion {
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub build_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub release_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub release_notes: Option<String>,
    #[serde(default)]
    pub critical: bool,
}

impl AppVersion {
    pub fn new(version: impl Into<String>) -> Self {
        Self {
            version: version.into(),
            ..Self::default()
        }
    }
}

/// An available update, recomputed on every check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateInfo {
    pub current_version: String,
    pub available: AppVersion,
    /// Check time, epoch milliseconds.
    pub checked_at: i64,
}

impl UpdateInfo {
    pub fn available_version(&self) -> &str {
        &self.available.version
    }
}

/// One entry in the bounded install history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionHistoryEntry {
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_version: Option<String>,
    /// Install time, epoch milliseconds.
    pub installed_at: i64,
}

/// Compare dotted version strings segment by segment, left to right.
///
/// Segments are compared numerically; a missing or non-numeric segment
/// counts as zero, so "2.0" equals "2.0.0".
pub fn compare_versions(a: &str, b: &str) -> Ordering {
    let parse = |v: &str| -> Vec<u64> {
        v.trim()
            .trim_start_matches(['v', 'V'])
            .split('.')
            .map(|segment| segment.trim().parse::<u64>().unwrap_or(0))
            .collect()
    };

    let left = parse(a);
    let right = parse(b);
    let len = left.len().max(right.len());

    (0..len)
        .map(|i| {
            let l = left.get(i).copied().unwrap_or(0);
            let r = right.get(i).copied().unwrap_or(0);
            l.cmp(&r)
        })
        .find(|ord| *ord != Ordering::Equal)
        .unwrap_or(Ordering::Equal)
}

/// Whether `candidate` is strictly newer than `current`.
pub fn is_newer(candidate: &str, current: &str) -> bool {
    compare_versions(candidate, current) == Ordering::Greater
}

//! Background sync queue items and their ordering rules.
//!
//! The queue is a flat sequence kept sorted by priority (HIGH, MEDIUM, LOW)
//! with insertion order preserved inside each tier. All mutation goes
//! through [`enqueue`] and [`requeue_to_tier_tail`] so the order holds.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use zephra_core::error::ZephraError;

/// Kind of deferred operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SyncType {
    AirQualityRequest,
    UserPreference,
    LocationUpdate,
    AnalyticsEvent,
}

impl SyncType {
    pub const ALL: [SyncType; 4] = [
        SyncType::AirQualityRequest,
        SyncType::UserPreference,
        SyncType::LocationUpdate,
        SyncType::AnalyticsEvent,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SyncType::AirQualityRequest => "AIR_QUALITY_REQUEST",
            SyncType::UserPreference => "USER_PREFERENCE",
            SyncType::LocationUpdate => "LOCATION_UPDATE",
            SyncType::AnalyticsEvent => "ANALYTICS_EVENT",
        }
    }
}

impl fmt::Display for SyncType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SyncType {
    type Err = ZephraError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_uppercase().replace('-', "_");
        SyncType::ALL
            .into_iter()
            .find(|t| t.as_str() == normalized)
            .ok_or_else(|| ZephraError::Serialization(format!("unknown sync type: {s}")))
    }
}

/// Queue priority tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SyncPriority {
    High,
    Medium,
    Low,
}

impl SyncPriority {
    /// Sort rank; lower is served first.
    pub fn rank(&self) -> u8 {
        match self {
            SyncPriority::High => 0,
            SyncPriority::Medium => 1,
            SyncPriority::Low => 2,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SyncPriority::High => "HIGH",
            SyncPriority::Medium => "MEDIUM",
            SyncPriority::Low => "LOW",
        }
    }
}

impl fmt::Display for SyncPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SyncPriority {
    type Err = ZephraError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "HIGH" => Ok(SyncPriority::High),
            "MEDIUM" => Ok(SyncPriority::Medium),
            "LOW" => Ok(SyncPriority::Low),
            other => Err(ZephraError::Serialization(format!("unknown priority: {other}"))),
        }
    }
}

/// One deferred operation awaiting delivery.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncQueueItem {
    pub id: String,
    #[serde(rename = "type")]
    pub sync_type: SyncType,
    pub payload: serde_json::Value,
    /// Enqueue time, epoch milliseconds.
    pub timestamp: i64,
    #[serde(default)]
    pub retry_count: u32,
    pub max_retries: u32,
    pub priority: SyncPriority,
    /// Expiry, epoch milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<i64>,
}

impl SyncQueueItem {
    /// Build a fresh item stamped at `now_ms`.
    pub fn new(
        sync_type: SyncType,
        payload: serde_json::Value,
        priority: SyncPriority,
        max_retries: u32,
        expires_in_ms: Option<i64>,
        now_ms: i64,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            sync_type,
            payload,
            timestamp: now_ms,
            retry_count: 0,
            max_retries,
            priority,
            expires_at: expires_in_ms.map(|ms| now_ms.saturating_add(ms)),
        }
    }

    /// Whether the item's expiry lies strictly before `now_ms`.
    pub fn is_expired(&self, now_ms: i64) -> bool {
        self.expires_at.is_some_and(|at| at < now_ms)
    }

    /// Whether the retry budget is spent.
    pub fn is_exhausted(&self) -> bool {
        self.retry_count >= self.max_retries
    }
}

/// Insert `item` after the last entry of equal or higher priority.
///
/// Returns the index the item landed at.
pub fn enqueue(queue: &mut Vec<SyncQueueItem>, item: SyncQueueItem) -> usize {
    let rank = item.priority.rank();
    let index = queue.partition_point(|q| q.priority.rank() <= rank);
    queue.insert(index, item);
    index
}

/// Move the entry at `index` to the tail of its priority tier.
pub fn requeue_to_tier_tail(queue: &mut Vec<SyncQueueItem>, index: usize) {
    if index < queue.len() {
        let item = queue.remove(index);
        enqueue(queue, item);
    }
}

/// Drop expired entries, returning how many were removed.
pub fn purge_expired(queue: &mut Vec<SyncQueueItem>, now_ms: i64) -> usize {
    let before = queue.len();
    queue.retain(|item| !item.is_expired(now_ms));
    before - queue.len()
}

/// Whether the sequence respects tier order.
pub fn is_priority_sorted(queue: &[SyncQueueItem]) -> bool {
    queue
        .windows(2)
        .all(|pair| pair[0].priority.rank() <= pair[1].priority.rank())
}

//! QueueItem: one buffered request, plus the options a caller passes at enqueue.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ids::ItemId;

/// HTTP-style verb of a queued operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl Method {
    /// Verbs that carry a request body.
    pub fn allows_payload(self) -> bool {
        matches!(self, Method::Post | Method::Put | Method::Patch)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Patch => "PATCH",
            Method::Delete => "DELETE",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Optional knobs for `enqueue`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EnqueueOptions {
    pub headers: BTreeMap<String, String>,

    /// Higher drains first. Default 0.
    pub priority: i32,

    /// Overrides the configured default ceiling.
    pub max_retries: Option<u32>,

    pub metadata: serde_json::Map<String, serde_json::Value>,
}

impl EnqueueOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = Some(max_retries);
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }
}

/// One buffered operation.
///
/// Design:
/// - This is also the persisted record (flat, camelCase keys).
/// - Only `retry_count` is mutated after construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueItem {
    pub id: ItemId,
    pub created_at: DateTime<Utc>,
    pub operation_type: String,
    pub method: Method,
    pub target: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<serde_json::Value>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, String>,

    /// Failed attempts so far (not counting connectivity failures).
    #[serde(default)]
    pub retry_count: u32,

    pub max_retries: u32,

    #[serde(default)]
    pub priority: i32,

    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

impl QueueItem {
    /// Drain order: priority descending, then created_at ascending.
    ///
    /// `Ordering::Equal` means "same slot"; callers keep insertion order for ties.
    pub fn drain_order(&self, other: &Self) -> Ordering {
        other
            .priority
            .cmp(&self.priority)
            .then_with(|| self.created_at.cmp(&other.created_at))
    }

    /// Checks the fields every queued item must carry.
    pub fn validate(&self) -> Result<(), String> {
        if self.operation_type.trim().is_empty() {
            return Err("operation type must not be empty".to_string());
        }
        if self.target.trim().is_empty() {
            return Err("target must not be empty".to_string());
        }
        if self.payload.is_some() && !self.method.allows_payload() {
            return Err(format!("{} requests cannot carry a payload", self.method));
        }
        if self.retry_count > self.max_retries {
            return Err(format!(
                "retry count {} exceeds max retries {}",
                self.retry_count, self.max_retries
            ));
        }
        Ok(())
    }

    /// Has this item used up its retries?
    pub fn retries_exhausted(&self) -> bool {
        self.retry_count >= self.max_retries
    }
}

/// Inserts `item` after every entry that drains before or alongside it.
///
/// Returns the index it landed at.
pub fn insert_ordered(items: &mut Vec<QueueItem>, item: QueueItem) -> usize {
    let index = items.partition_point(|existing| existing.drain_order(&item) != Ordering::Greater);
    items.insert(index, item);
    index
}

/// Restores drain order in place (stable, so ties keep their current order).
pub fn sort_for_drain(items: &mut [QueueItem]) {
    items.sort_by(QueueItem::drain_order);
}

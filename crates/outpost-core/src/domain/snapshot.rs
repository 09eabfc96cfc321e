//! Persisted record format.
//!
//! ```json
//! { "version": 1, "items": [ { "id": "...", "createdAt": "...", ... } ] }
//! ```
//!
//! Version policy:
//! - a bare JSON array is the unversioned legacy layout; it is read as version 0
//!   and rewritten in the current envelope on the next save
//! - a version newer than [`CURRENT_VERSION`] is refused (the caller discards it)
//! - anything else that fails to parse is [`StoreError::Corrupt`]

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use super::errors::StoreError;
use super::item::{QueueItem, sort_for_drain};

/// Version written by [`encode`].
pub const CURRENT_VERSION: u32 = 1;

/// Version reported for the legacy bare-array layout.
pub const LEGACY_VERSION: u32 = 0;

#[derive(Serialize)]
struct EnvelopeRef<'a> {
    version: u32,
    items: &'a [QueueItem],
}

#[derive(Deserialize)]
struct Envelope {
    version: u32,
    items: Vec<QueueItem>,
}

/// Result of decoding a stored slot.
#[derive(Debug, Clone, PartialEq)]
pub struct Decoded {
    pub version: u32,
    pub items: Vec<QueueItem>,
}

pub fn encode(items: &[QueueItem]) -> Result<String, StoreError> {
    let envelope = EnvelopeRef {
        version: CURRENT_VERSION,
        items,
    };
    Ok(serde_json::to_string(&envelope)?)
}

pub fn decode(raw: &str) -> Result<Decoded, StoreError> {
    let value: serde_json::Value =
        serde_json::from_str(raw).map_err(|e| StoreError::Corrupt(e.to_string()))?;

    if value.is_array() {
        let items: Vec<QueueItem> =
            serde_json::from_value(value).map_err(|e| StoreError::Corrupt(e.to_string()))?;
        return Ok(Decoded {
            version: LEGACY_VERSION,
            items,
        });
    }

    let Some(map) = value.as_object() else {
        return Err(StoreError::Corrupt(format!(
            "expected an object or array, found {}",
            json_type_name(&value)
        )));
    };

    let version = map
        .get("version")
        .and_then(serde_json::Value::as_u64)
        .ok_or_else(|| StoreError::Corrupt("missing version tag".to_string()))?;
    let version = u32::try_from(version).unwrap_or(u32::MAX);
    if version > CURRENT_VERSION || version == LEGACY_VERSION {
        return Err(StoreError::UnsupportedVersion {
            found: version,
            supported: CURRENT_VERSION,
        });
    }

    let envelope: Envelope =
        serde_json::from_value(value).map_err(|e| StoreError::Corrupt(e.to_string()))?;
    Ok(Decoded {
        version: envelope.version,
        items: envelope.items,
    })
}

/// Drops records that break the item invariants and restores drain order.
///
/// Returns the surviving items and the dropped ones with the reason.
pub fn sanitize(items: Vec<QueueItem>) -> (Vec<QueueItem>, Vec<(QueueItem, String)>) {
    let mut seen = HashSet::with_capacity(items.len());
    let mut kept = Vec::with_capacity(items.len());
    let mut dropped = Vec::new();

    for item in items {
        if let Err(reason) = item.validate() {
            dropped.push((item, reason));
            continue;
        }
        if !seen.insert(item.id) {
            dropped.push((item, "duplicate id".to_string()));
            continue;
        }
        kept.push(item);
    }

    sort_for_drain(&mut kept);
    (kept, dropped)
}

fn json_type_name(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "boolean",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}

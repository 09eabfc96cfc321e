use serde::{Deserialize, Serialize};

use crate::domain::ItemId;

/// Point-in-time view of an `OfflineQueue`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueStatus {
    /// Items held, including those backing off.
    pub pending: usize,
    pub backing_off: usize,
    pub in_flight: Option<ItemId>,
    pub online: bool,
    pub draining: bool,
    pub listeners: usize,
}

impl QueueStatus {
    /// Items a drain could pick up right now.
    pub fn ready(&self) -> usize {
        self.pending.saturating_sub(self.backing_off)
    }
}

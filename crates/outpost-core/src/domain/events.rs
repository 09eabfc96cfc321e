//! Events - キューのライフサイクルイベント
//!
//! Event Channel が購読者へ配る値です。
//! 各イベントは対象アイテム（あれば）と、イベント後のキューサイズを持ちます。

use std::time::Duration;

use super::errors::ExecutorError;
use super::item::QueueItem;
use super::state::ItemState;

/// イベント種別（ログやフィルタ用の軽量な識別子）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueueEventKind {
    Queued,
    Processing,
    Success,
    Error,
    Retry,
    Cleared,
}

impl QueueEventKind {
    pub fn as_str(self) -> &'static str {
        match self {
            QueueEventKind::Queued => "queued",
            QueueEventKind::Processing => "processing",
            QueueEventKind::Success => "success",
            QueueEventKind::Error => "error",
            QueueEventKind::Retry => "retry",
            QueueEventKind::Cleared => "cleared",
        }
    }
}

/// QueueEvent はキューで発生したイベント
///
/// `queue_size` は常にイベント適用「後」のサイズ。
#[derive(Debug, Clone, PartialEq)]
pub enum QueueEvent {
    Queued {
        item: QueueItem,
        queue_size: usize,
    },
    Processing {
        item: QueueItem,
        queue_size: usize,
    },
    Success {
        item: QueueItem,
        queue_size: usize,
    },
    /// Terminal failure; the item has been removed.
    Error {
        item: QueueItem,
        error: ExecutorError,
        queue_size: usize,
    },
    /// `item.retry_count` is already incremented.
    Retry {
        item: QueueItem,
        error: ExecutorError,
        delay: Duration,
        queue_size: usize,
    },
    Cleared {
        queue_size: usize,
    },
}

impl QueueEvent {
    pub fn kind(&self) -> QueueEventKind {
        match self {
            QueueEvent::Queued { .. } => QueueEventKind::Queued,
            QueueEvent::Processing { .. } => QueueEventKind::Processing,
            QueueEvent::Success { .. } => QueueEventKind::Success,
            QueueEvent::Error { .. } => QueueEventKind::Error,
            QueueEvent::Retry { .. } => QueueEventKind::Retry,
            QueueEvent::Cleared { .. } => QueueEventKind::Cleared,
        }
    }

    pub fn item(&self) -> Option<&QueueItem> {
        match self {
            QueueEvent::Queued { item, .. }
            | QueueEvent::Processing { item, .. }
            | QueueEvent::Success { item, .. }
            | QueueEvent::Error { item, .. }
            | QueueEvent::Retry { item, .. } => Some(item),
            QueueEvent::Cleared { .. } => None,
        }
    }

    pub fn error(&self) -> Option<&ExecutorError> {
        match self {
            QueueEvent::Error { error, .. } | QueueEvent::Retry { error, .. } => Some(error),
            _ => None,
        }
    }

    pub fn queue_size(&self) -> usize {
        match self {
            QueueEvent::Queued { queue_size, .. }
            | QueueEvent::Processing { queue_size, .. }
            | QueueEvent::Success { queue_size, .. }
            | QueueEvent::Error { queue_size, .. }
            | QueueEvent::Retry { queue_size, .. }
            | QueueEvent::Cleared { queue_size } => *queue_size,
        }
    }

    /// The state the affected item entered with this event.
    pub fn item_state(&self) -> Option<ItemState> {
        match self.kind() {
            QueueEventKind::Queued => Some(ItemState::Queued),
            QueueEventKind::Processing => Some(ItemState::Processing),
            QueueEventKind::Success => Some(ItemState::Succeeded),
            QueueEventKind::Retry => Some(ItemState::RetryScheduled),
            QueueEventKind::Error => Some(ItemState::Failed),
            QueueEventKind::Cleared => None,
        }
    }
}

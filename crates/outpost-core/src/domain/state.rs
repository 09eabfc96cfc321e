//! Per-item state machine.

use serde::{Deserialize, Serialize};

/// Item state.
///
/// State transitions:
/// - Queued -> Processing -> Succeeded (removed)
/// - Queued -> Processing -> RetryScheduled -> Queued (until the ceiling)
/// - Queued -> Processing -> Failed (removed)
///
/// Only `Queued` and `RetryScheduled` items are held in the list; the terminal
/// states exist so events and logs can name what happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemState {
    /// Waiting to be drained.
    Queued,

    /// Handed to the executor.
    Processing,

    /// Delivered; removed from the queue.
    Succeeded,

    /// Waiting out a backoff delay.
    RetryScheduled,

    /// Gave up; removed from the queue.
    Failed,
}

impl ItemState {
    /// Is this a terminal state (no further transitions)?
    pub fn is_terminal(self) -> bool {
        matches!(self, ItemState::Succeeded | ItemState::Failed)
    }

    /// Can a drain pick this item up?
    pub fn is_runnable(self) -> bool {
        matches!(self, ItemState::Queued)
    }

    /// Is `next` a legal successor of `self`?
    pub fn can_transition_to(self, next: ItemState) -> bool {
        use ItemState::*;
        matches!(
            (self, next),
            (Queued, Processing)
                | (Processing, Succeeded)
                | (Processing, RetryScheduled)
                | (Processing, Failed)
                // connectivity loss mid-attempt puts the item back untouched
                | (Processing, Queued)
                | (RetryScheduled, Queued)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(ItemState::Queued, ItemState::Processing, true)]
    #[case(ItemState::Processing, ItemState::Succeeded, true)]
    #[case(ItemState::Processing, ItemState::RetryScheduled, true)]
    #[case(ItemState::RetryScheduled, ItemState::Queued, true)]
    #[case(ItemState::Processing, ItemState::Failed, true)]
    #[case(ItemState::Queued, ItemState::Succeeded, false)]
    #[case(ItemState::Succeeded, ItemState::Queued, false)]
    #[case(ItemState::Failed, ItemState::RetryScheduled, false)]
    fn transitions(#[case] from: ItemState, #[case] to: ItemState, #[case] ok: bool) {
        assert_eq!(from.can_transition_to(to), ok);
    }

    #[test]
    fn terminal_states() {
        assert!(ItemState::Succeeded.is_terminal());
        assert!(ItemState::Failed.is_terminal());
        assert!(!ItemState::RetryScheduled.is_terminal());
        assert!(ItemState::Queued.is_runnable());
        assert!(!ItemState::RetryScheduled.is_runnable());
    }
}

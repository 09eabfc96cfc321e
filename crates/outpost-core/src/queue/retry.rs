//! Retry policy: decides backoff delays and retry vs give-up.

use std::time::Duration;

use crate::domain::{ErrorKind, ExecutorError, QueueItem};

/// Retry policy for failed deliveries.
///
/// Exponential backoff with a ceiling:
/// `delay = min(base_delay * 2^(retry_count - 1), max_delay)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Delay before the first retry.
    pub base_delay: Duration,

    /// Upper bound for any single delay.
    pub max_delay: Duration,
}

/// What to do with an item after a failed attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryDecision {
    /// `retry_count` has been incremented; try again after `delay`.
    Retry { delay: Duration },

    /// Remove the item and report it as failed.
    GiveUp { reason: GiveUpReason },

    /// Offline at attempt time; leave the item untouched.
    Defer,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GiveUpReason {
    /// `retry_count` already reached `max_retries`.
    RetriesExhausted,

    /// The executor reported a failure retries cannot fix.
    NonRetryable,
}

impl RetryPolicy {
    pub fn new(base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            base_delay,
            max_delay,
        }
    }

    /// Delay before retry number `retry_count` (1-indexed).
    ///
    /// Example with base_delay=1s, max_delay=10s:
    /// - retry 1: 1s
    /// - retry 2: 2s
    /// - retry 3: 4s
    /// - retry 4: 8s
    /// - retry 5: 10s (capped)
    pub fn next_delay(&self, retry_count: u32) -> Duration {
        let exponent = retry_count.saturating_sub(1);
        let factor = 2u32.checked_pow(exponent).unwrap_or(u32::MAX);
        self.base_delay
            .checked_mul(factor)
            .unwrap_or(Duration::MAX)
            .min(self.max_delay)
    }

    /// Applies a failed attempt to `item`.
    ///
    /// Only the `Retry` outcome mutates the item (`retry_count += 1`).
    pub fn on_failure(&self, item: &mut QueueItem, error: &ExecutorError) -> RetryDecision {
        match error.kind() {
            ErrorKind::Connectivity => RetryDecision::Defer,
            ErrorKind::Permanent => RetryDecision::GiveUp {
                reason: GiveUpReason::NonRetryable,
            },
            ErrorKind::Transient => {
                if item.retries_exhausted() {
                    return RetryDecision::GiveUp {
                        reason: GiveUpReason::RetriesExhausted,
                    };
                }
                item.retry_count += 1;
                RetryDecision::Retry {
                    delay: self.next_delay(item.retry_count),
                }
            }
        }
    }
}

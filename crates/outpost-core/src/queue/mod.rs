//! Queue module: the offline queue and its parts.
//!
//! - **config**: `QueueConfig` (defaults + `OUTPOST_*` env overrides)
//! - **retry**: backoff and retry-vs-give-up decisions
//! - **channel**: event fan-out to subscribers
//! - **monitor**: believed connectivity state + reconciliation poll
//! - **slot**: load/save against a `DurableStore`
//! - **manager**: `OfflineQueue`, which ties the above together

mod channel;
mod config;
mod manager;
mod monitor;
mod retry;
mod slot;

pub use channel::{EventChannel, Listener, Subscription, SubscriptionId};
pub use config::{ConfigError, ENV_PREFIX, QueueConfig};
pub use manager::OfflineQueue;
pub(crate) use manager::QueueParts;
pub use monitor::{ConnectivityMonitor, TransitionHook};
pub use retry::{GiveUpReason, RetryDecision, RetryPolicy};
pub use slot::{LOAD_ATTEMPTS, QueueSlot, Recovery, Restored};

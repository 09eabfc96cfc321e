//! In-crate tests for the offline queue.
//!
//! - `harness.rs`      - Harness, scripted executor and event recorder
//! - `ordering.rs`     - priority then enqueue order, clock skew
//! - `persistence.rs`  - restart, corrupt / legacy / unreadable slots, save failures
//! - `retries.rs`      - backoff, retry ceiling, error classification
//! - `connectivity.rs` - offline halt, reconciliation poll, single drain
//! - `lifecycle.rs`    - removal, clear, destroy, validation, listeners
//! - `concurrency.rs`  - multi-threaded runtime: startup listeners, event order

mod concurrency;
mod lifecycle;
mod retries;

#[allow(unused_imports)]
pub use harness::{Harness, Recorder, ScriptedExecutor};

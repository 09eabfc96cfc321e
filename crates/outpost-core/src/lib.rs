//! outpost-core
//!
//! Durable, priority-ordered offline request queue.
//!
//! 書き込み系のリクエストをオフライン中に溜めておき、プロセス再起動をまたいで保持し、
//! オンライン復帰時に優先度順で送り直します。失敗は指数バックオフ付きでリトライします。
//!
//! # モジュール構成
//! - **domain**: ドメインモデル（ids, item, state, events, errors, snapshot）
//! - **ports**: 抽象化レイヤー（Clock, IdGenerator, ConnectivityProvider, DurableStore, RequestExecutor, Scheduler）
//! - **impls**: ports の実装（MemoryStore, FileStore, ManualConnectivity, TokioScheduler, ManualScheduler）
//! - **queue**: OfflineQueue 本体（config, retry, channel, monitor, slot, manager）
//! - **app**: 構築とワイヤリング（QueueBuilder）
//! - **observability**: ステータスビュー（QueueStatus）

pub mod app;
pub mod domain;
pub mod impls;
pub mod observability;
pub mod ports;
pub mod queue;

#[cfg(test)]
mod tests;

pub use app::{BuildError, QueueBuilder};
pub use domain::{
    EnqueueOptions, ErrorKind, ExecutorError, ItemId, ItemState, Method, QueueError, QueueEvent,
    QueueEventKind, QueueItem, StoreError,
};
pub use observability::QueueStatus;
pub use queue::{OfflineQueue, QueueConfig, Subscription};

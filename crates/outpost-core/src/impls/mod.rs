//! Impls - ports の実装
//!
//! # 含まれる実装
//! - **MemoryStore** / **FileStore**: DurableStore
//! - **ManualConnectivity**: ConnectivityProvider（ホスト駆動）
//! - **TokioScheduler** / **ManualScheduler**: Scheduler（実時間 / 仮想時計）

pub mod file_store;
pub mod manual_connectivity;
pub mod manual_scheduler;
pub mod memory_store;
pub mod tokio_scheduler;

// 主要な型を再エクスポート
pub use self::file_store::FileStore;
pub use self::manual_connectivity::ManualConnectivity;
pub use self::manual_scheduler::ManualScheduler;
pub use self::memory_store::MemoryStore;
pub use self::tokio_scheduler::TokioScheduler;

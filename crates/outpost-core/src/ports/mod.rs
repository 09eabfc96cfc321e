//! Ports - 抽象化レイヤー
//!
//! このモジュールは Hexagonal Architecture の「ポート」を定義します。
//! 環境依存のもの（時計、ネットワーク状態、永続化、タイマー、送信）は
//! すべて trait 越しに使い、テストではインメモリ実装に差し替えます。

pub mod clock;
pub mod connectivity;
pub mod durable_store;
pub mod executor;
pub mod id_generator;
pub mod scheduler;

// 主要な trait を再エクスポート
pub use self::clock::{Clock, FixedClock, SystemClock};
pub use self::connectivity::ConnectivityProvider;
pub use self::durable_store::DurableStore;
pub use self::executor::RequestExecutor;
pub use self::id_generator::{IdGenerator, UlidGenerator};
pub use self::scheduler::{CancelToken, Scheduler, TimerCallback};

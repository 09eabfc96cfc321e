//! Scheduler port - 遅延実行（リトライのバックオフ用）
//!
//! # 実装
//! - **TokioScheduler**: tokio の timer（本番用）
//! - **ManualScheduler**: 仮想時計（`advance` で進める、テスト用）

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::task::AbortHandle;

/// 発火時に呼ばれるコールバック
pub type TimerCallback = Box<dyn FnOnce() + Send + 'static>;

/// Scheduler は `delay` 後に `callback` を 1 回呼ぶ
pub trait Scheduler: Send + Sync {
    fn after(&self, delay: Duration, callback: TimerCallback) -> CancelToken;
}

/// 予約のキャンセル用ハンドル
///
/// キャンセル済みの予約は発火しない。発火後の `cancel` は何もしない。
#[derive(Debug, Clone)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
    abort: Option<AbortHandle>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self {
            cancelled: Arc::new(AtomicBool::new(false)),
            abort: None,
        }
    }

    /// 発火待ちの tokio タスクも止める
    pub fn with_abort(mut self, abort: AbortHandle) -> Self {
        self.abort = Some(abort);
        self
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
        if let Some(abort) = &self.abort {
            abort.abort();
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

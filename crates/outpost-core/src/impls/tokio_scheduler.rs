//! TokioScheduler - tokio の timer で遅延実行する Scheduler

use std::time::Duration;

use tokio::runtime::Handle;

use crate::ports::{CancelToken, Scheduler, TimerCallback};

/// 予約ごとに 1 タスクを spawn する
///
/// `Handle` を保持するので、ランタイム外のスレッドから `after` を呼んでもよい。
#[derive(Debug, Clone)]
pub struct TokioScheduler {
    handle: Handle,
}

impl TokioScheduler {
    pub fn new(handle: Handle) -> Self {
        Self { handle }
    }
}

impl Scheduler for TokioScheduler {
    fn after(&self, delay: Duration, callback: TimerCallback) -> CancelToken {
        let token = CancelToken::new();
        let guard = token.clone();
        let task = self.handle.spawn(async move {
            tokio::time::sleep(delay).await;
            if !guard.is_cancelled() {
                callback();
            }
        });
        token.with_abort(task.abort_handle())
    }
}

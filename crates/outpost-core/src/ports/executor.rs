//! RequestExecutor port - 実際のネットワーク呼び出し
//!
//! キューは「何を」「いつ」送るかだけを決め、送り方は知りません。
//! タイムアウトも executor 側の責務です。

use async_trait::async_trait;

use crate::domain::{ExecutorError, QueueItem};

/// RequestExecutor は 1 アイテムを 1 回送信する
///
/// # 失敗の分類
/// - `ErrorKind::Connectivity`: オフラインだった（retry_count に数えない）
/// - `ErrorKind::Transient`: 一時的失敗（バックオフ付きリトライ）
/// - `ErrorKind::Permanent`: サーバーが恒久的に拒否（即終了）
#[async_trait]
pub trait RequestExecutor: Send + Sync {
    async fn execute(&self, item: &QueueItem) -> Result<(), ExecutorError>;
}

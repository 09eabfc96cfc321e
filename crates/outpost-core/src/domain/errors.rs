//! Errors - エラー型と分類
//!
//! # 分類
//! - Executor が返す失敗は [`ErrorKind`] で分類し、キューが retry / 終了を判断する
//! - 永続化の失敗は [`StoreError`]（ロード時は空キュー + 診断、保存時はログのみ）
//! - 呼び出し側に返すのは [`QueueError`]（入力検証と destroy 後の操作だけ）

use thiserror::Error;

/// ErrorKind は実行エラーの分類
///
/// - Connectivity: 実行時点でオフライン（retry_count に数えない）
/// - Transient: 一時的なエラー（バックオフ付きでリトライ）
/// - Permanent: 恒久的なエラー（リトライ無意味、即終了）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Connectivity,
    Transient,
    Permanent,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::Connectivity => "connectivity",
            ErrorKind::Transient => "transient",
            ErrorKind::Permanent => "permanent",
        }
    }
}

/// ExecutorError は RequestExecutor が返す失敗
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{} error: {message}", kind.as_str())]
pub struct ExecutorError {
    kind: ErrorKind,
    message: String,
}

impl ExecutorError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn connectivity(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Connectivity, message)
    }

    pub fn transient(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Transient, message)
    }

    pub fn permanent(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Permanent, message)
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

/// StoreError は DurableStore の失敗
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("stored queue is corrupt: {0}")]
    Corrupt(String),

    #[error("stored queue has unsupported version {found} (supported up to {supported})")]
    UnsupportedVersion { found: u32, supported: u32 },

    #[error("storage unavailable: {0}")]
    Unavailable(String),

    #[error("serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("storage I/O failed: {0}")]
    Io(#[from] std::io::Error),
}

impl StoreError {
    /// 読み直せば成功しうる失敗か（I/O・ストア側の一時障害）
    ///
    /// false のもの（破損・未対応バージョン）は保存データ自体が使えない。
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Io(_) | StoreError::Unavailable(_))
    }
}

/// QueueError は OfflineQueue の公開 API が返すエラー
#[derive(Debug, Error)]
pub enum QueueError {
    #[error("invalid item: {0}")]
    InvalidItem(String),

    #[error("queue has been destroyed")]
    Destroyed,
}

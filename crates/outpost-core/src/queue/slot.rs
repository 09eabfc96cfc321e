//! QueueSlot - キューと DurableStore の間の境界
//!
//! # 設計原則
//! - ロードは失敗しない：読めないデータは空キュー + 診断メッセージ
//! - 一時的な読み込み失敗（I/O）ではスロットを消さない。内容が読めるまで書き込みを保留する
//! - 保存失敗は呼び出し元に返さない（ログのみ、メモリ上のキューは有効なまま）
//! - 旧形式・不正レコードを含むデータは読み込み直後に現行形式で書き戻す

use std::sync::Arc;

use tracing::{debug, error, info, warn};

use crate::domain::snapshot::{self, CURRENT_VERSION};
use crate::domain::{QueueItem, StoreError};
use crate::ports::DurableStore;

/// 一時的な読み込み失敗に対して load を試みる回数
pub const LOAD_ATTEMPTS: u32 = 3;

/// 起動時に復元した内容
#[derive(Debug, Clone, Default)]
pub struct Restored {
    pub items: Vec<QueueItem>,

    /// 保存データを捨てた／一部を捨てた／読めなかった理由
    pub diagnostic: Option<String>,

    /// 保存済みの内容がメモリ上の内容と一致しない（書き戻しが必要）
    pub needs_rewrite: bool,

    /// スロットを読めなかった。中身は不明なので上書きしてはならない
    pub unreadable: bool,
}

/// 読めなかったスロットをもう一度読んだ結果
#[derive(Debug)]
pub enum Recovery {
    /// 読めた（不正レコードは除去済み）
    Restored(Vec<QueueItem>),
    /// 読めたが使えないデータだった。上書きしてよい
    Discarded(StoreError),
    /// まだ読めない
    Unreadable(StoreError),
}

pub struct QueueSlot {
    store: Arc<dyn DurableStore>,
    key: String,
}

impl QueueSlot {
    pub fn new(store: Arc<dyn DurableStore>, key: impl Into<String>) -> Self {
        Self {
            store,
            key: key.into(),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn load(&self) -> Restored {
        let decoded = match self.read() {
            Ok(decoded) => decoded,
            Err(err) if err.is_transient() => {
                error!(
                    key = %self.key,
                    error = %err,
                    "queue slot unreadable; starting empty and leaving stored data untouched"
                );
                return Restored {
                    items: Vec::new(),
                    diagnostic: Some(err.to_string()),
                    needs_rewrite: false,
                    unreadable: true,
                };
            }
            Err(err) => {
                error!(key = %self.key, error = %err, "discarding unusable queue");
                return Restored {
                    items: Vec::new(),
                    diagnostic: Some(err.to_string()),
                    needs_rewrite: true,
                    unreadable: false,
                };
            }
        };

        let migrated = decoded.version != CURRENT_VERSION;
        if migrated {
            info!(
                key = %self.key,
                from = decoded.version,
                to = CURRENT_VERSION,
                "migrating stored queue"
            );
        }

        let (items, dropped) = self.sanitize(decoded.items);
        let diagnostic = (dropped > 0)
            .then(|| format!("dropped {dropped} invalid stored item(s)"));

        debug!(key = %self.key, restored = items.len(), "queue restored");
        Restored {
            items,
            diagnostic,
            needs_rewrite: migrated || dropped > 0,
            unreadable: false,
        }
    }

    /// 起動時に読めなかったスロットを読み直す
    pub fn recover(&self) -> Recovery {
        match self.read() {
            Ok(decoded) => {
                let (items, dropped) = self.sanitize(decoded.items);
                info!(key = %self.key, recovered = items.len(), dropped, "queue slot readable again");
                Recovery::Restored(items)
            }
            Err(err) if err.is_transient() => Recovery::Unreadable(err),
            Err(err) => Recovery::Discarded(err),
        }
    }

    fn read(&self) -> Result<snapshot::Decoded, StoreError> {
        let mut attempt = 1;
        loop {
            match self.store.load(&self.key) {
                Err(err) if err.is_transient() && attempt < LOAD_ATTEMPTS => {
                    warn!(key = %self.key, attempt, error = %err, "queue slot read failed; retrying");
                    attempt += 1;
                }
                result => return result,
            }
        }
    }

    fn sanitize(&self, items: Vec<QueueItem>) -> (Vec<QueueItem>, usize) {
        let (items, dropped) = snapshot::sanitize(items);
        for (item, reason) in &dropped {
            warn!(key = %self.key, item_id = %item.id, reason = %reason, "dropping invalid stored item");
        }
        (items, dropped.len())
    }

    /// Writes the whole list. Returns `false` (after logging) on failure.
    pub fn save(&self, items: &[QueueItem]) -> bool {
        match self.store.save(&self.key, items) {
            Ok(()) => true,
            Err(err) => {
                error!(
                    key = %self.key,
                    items = items.len(),
                    error = %err,
                    "failed to persist queue; continuing in memory"
                );
                false
            }
        }
    }
}

//! DurableStore port - キュー全体の永続化スロット
//!
//! # 設計原則
//! - 1 スロット = キュー全体（差分ではなく毎回フル書き込み）
//! - フォーマットは `domain::snapshot`（バージョン付き）
//! - 失敗は呼び出し側（OfflineQueue）が解決する：
//!   ロード失敗は空キュー + 診断、保存失敗はログのみ
//!
//! # 実装
//! - **MemoryStore**: プロセス内（テスト・一時利用）
//! - **FileStore**: ディレクトリ内の `<key>.json`（原子的書き込み）

use crate::domain::{QueueItem, StoreError};
use crate::domain::snapshot::Decoded;

/// DurableStore は `key` で指定されたスロットを読み書きする
pub trait DurableStore: Send + Sync {
    /// スロットを読む。空スロットは version = current, items = [] を返す
    fn load(&self, key: &str) -> Result<Decoded, StoreError>;

    /// キュー全体を書き込む
    fn save(&self, key: &str, items: &[QueueItem]) -> Result<(), StoreError>;
}

//! ConnectivityProvider port - 環境のオンライン状態
//!
//! ホスト環境（OS のネットワーク通知、ブラウザの online/offline など）を
//! 小さな trait に閉じ込めます。
//!
//! # 設計原則
//! - `is_online()` が権威ある現在値（reconciliation poll はこれを読む）
//! - `subscribe()` は変化通知。取りこぼしがあり得る前提で使う

use tokio::sync::watch;

/// ConnectivityProvider は環境のオンライン状態を報告
///
/// # 実装
/// - **ManualConnectivity**: ホストが明示的に状態を流し込む（テスト・組み込み用）
pub trait ConnectivityProvider: Send + Sync {
    /// 現在の状態（権威あり）
    fn is_online(&self) -> bool;

    /// 変化通知の受信側。送信側が閉じたら通知は止まる（poll だけで動き続ける）
    fn subscribe(&self) -> watch::Receiver<bool>;
}

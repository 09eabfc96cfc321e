//! App - アプリケーション層
//!
//! ports と queue を組み合わせて OfflineQueue を組み立てます。
//!
//! # 主要コンポーネント
//! - **QueueBuilder**: port の注入、設定の検証、起動時ロード

pub mod builder;

// 主要な型を再エクスポート
pub use self::builder::{BuildError, QueueBuilder};

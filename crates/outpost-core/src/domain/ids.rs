//! Domain identifiers.
//!
//! # ULID ベースの ID
//! キューに積まれるリクエストは ULID で識別します。
//!
//! - **時刻でソート可能**: timestamp が先頭にあるため、生成順序でソートできる
//! - **調整不要**: プロセス再起動をまたいでも衝突しない
//! - **文字列表現**: 永続化レコードではプレフィックスなしの 26 文字で保存

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use ulid::Ulid;

/// Display で使うプレフィックス
const PREFIX: &str = "req-";

/// Identifier of one queued request.
///
/// Display は `req-<ulid>`、serde は ULID の文字列そのもの。
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(Ulid);

impl ItemId {
    /// ULID から ItemId を作成
    pub fn from_ulid(ulid: Ulid) -> Self {
        Self(ulid)
    }

    /// 内部の ULID を取得
    pub fn as_ulid(&self) -> Ulid {
        self.0
    }
}

impl From<Ulid> for ItemId {
    fn from(ulid: Ulid) -> Self {
        Self::from_ulid(ulid)
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", PREFIX, self.0)
    }
}

/// `req-<ulid>` と素の `<ulid>` の両方を受け付ける。
impl FromStr for ItemId {
    type Err = ulid::DecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let raw = s.strip_prefix(PREFIX).unwrap_or(s);
        Ulid::from_string(raw).map(Self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_has_prefix() {
        let ulid = Ulid::new();
        let id = ItemId::from_ulid(ulid);

        assert_eq!(id.as_ulid(), ulid);
        assert_eq!(id.to_string(), format!("req-{ulid}"));
    }

    #[test]
    fn parses_with_and_without_prefix() {
        let id = ItemId::from(Ulid::new());

        let with_prefix: ItemId = id.to_string().parse().unwrap();
        let bare: ItemId = id.as_ulid().to_string().parse().unwrap();

        assert_eq!(with_prefix, id);
        assert_eq!(bare, id);
        assert!("req-not-a-ulid".parse::<ItemId>().is_err());
    }

    #[test]
    fn serializes_as_bare_ulid_string() {
        let id = ItemId::from(Ulid::new());

        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"{}\"", id.as_ulid()));

        let back: ItemId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn ids_generated_later_sort_later() {
        let id1 = ItemId::from(Ulid::new());
        std::thread::sleep(std::time::Duration::from_millis(2));
        let id2 = ItemId::from(Ulid::new());

        assert!(id1 < id2);
    }
}

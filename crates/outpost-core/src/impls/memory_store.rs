//! MemoryStore - プロセス内の DurableStore
//!
//! 生の JSON 文字列をスロットごとに保持します。
//! FileStore と同じ codec を通すので、「再起動」のシミュレーションに使えます。
//!
//! # 使用例
//! ```ignore
//! let store = Arc::new(MemoryStore::new());
//! let q1 = QueueBuilder::new().store(store.clone())/* ... */.build()?;
//! // q1 を destroy して、同じ store で q2 を作る = プロセス再起動
//! ```

use std::collections::HashMap;
use std::io;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use parking_lot::Mutex;

use crate::domain::snapshot::{self, CURRENT_VERSION, Decoded};
use crate::domain::{QueueItem, StoreError};
use crate::ports::DurableStore;

#[derive(Debug, Default)]
pub struct MemoryStore {
    slots: Mutex<HashMap<String, String>>,
    fail_writes: AtomicBool,
    fail_reads: AtomicBool,
    loads: AtomicUsize,
    saves: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// スロットに生データを直接置く（破損データの注入など）
    pub fn put_raw(&self, key: &str, raw: impl Into<String>) {
        self.slots.lock().insert(key.to_string(), raw.into());
    }

    pub fn raw(&self, key: &str) -> Option<String> {
        self.slots.lock().get(key).cloned()
    }

    /// true の間、save は `StoreError::Unavailable` を返す（容量超過などの再現）
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// true の間、load は `StoreError::Io` を返す（一時的な読み込み障害の再現）
    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// load が呼ばれた回数（失敗も含む）
    pub fn load_count(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }

    /// 成功した save の回数
    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }
}

impl DurableStore for MemoryStore {
    fn load(&self, key: &str) -> Result<Decoded, StoreError> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(StoreError::Io(io::Error::new(
                io::ErrorKind::Interrupted,
                "read interrupted",
            )));
        }
        match self.slots.lock().get(key) {
            Some(raw) => snapshot::decode(raw),
            None => Ok(Decoded {
                version: CURRENT_VERSION,
                items: Vec::new(),
            }),
        }
    }

    fn save(&self, key: &str, items: &[QueueItem]) -> Result<(), StoreError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("quota exceeded".to_string()));
        }
        let raw = snapshot::encode(items)?;
        self.slots.lock().insert(key.to_string(), raw);
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

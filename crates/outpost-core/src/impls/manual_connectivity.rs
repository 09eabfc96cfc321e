//! ManualConnectivity - ホストが状態を流し込む ConnectivityProvider
//!
//! OS やランタイムのネットワーク通知を受け取ったホストが `set_online` を呼びます。
//! `set_online_silently` は通知を取りこぼした状況（サスペンド中の変化など）を再現します。

use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::watch;

use crate::ports::ConnectivityProvider;

#[derive(Debug)]
pub struct ManualConnectivity {
    online: AtomicBool,
    tx: watch::Sender<bool>,
}

impl ManualConnectivity {
    pub fn new(online: bool) -> Self {
        let (tx, _rx) = watch::channel(online);
        Self {
            online: AtomicBool::new(online),
            tx,
        }
    }

    /// 状態を変えて購読者に通知
    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
        self.tx.send_replace(online);
    }

    /// 状態だけ変える（通知なし）
    pub fn set_online_silently(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
    }
}

impl ConnectivityProvider for ManualConnectivity {
    fn is_online(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }

    fn subscribe(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }
}

//! ReadinessGate - 初期化完了を一度だけ通知するシグナル
//!
//! バックグラウンド job は最初にタスク一覧を読む前にこれを待つ。
//! コールドスタート時に foreground の初期化と競合しないため。

use std::sync::Arc;

use tokio::sync::watch;

#[derive(Clone)]
pub struct ReadinessGate {
    tx: Arc<watch::Sender<bool>>,
}

impl ReadinessGate {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    /// ゲートを開く。開けた呼び出しだけが `true`
    pub fn open(&self) -> bool {
        self.tx.send_if_modified(|ready| {
            if *ready {
                false
            } else {
                *ready = true;
                true
            }
        })
    }

    pub fn is_open(&self) -> bool {
        *self.tx.borrow()
    }

    /// ゲートが開くまで待つ（開いていれば即座に返る）
    pub async fn wait(&self) {
        let mut rx = self.tx.subscribe();
        // sender は `self` が持っているので、閉じたチャネルは観測しない
        let _ = rx.wait_for(|ready| *ready).await;
    }
}

impl Default for ReadinessGate {
    fn default() -> Self {
        Self::new()
    }
}

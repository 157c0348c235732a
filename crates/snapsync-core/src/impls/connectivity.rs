//! ConnectivityFlag - ホストが更新するネットワーク状態フラグ

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;

use crate::ports::Connectivity;

/// ホストがネットワークイベントで切り替えるフラグ
#[derive(Debug)]
pub struct ConnectivityFlag {
    connected: AtomicBool,
}

impl ConnectivityFlag {
    pub fn new(connected: bool) -> Self {
        Self {
            connected: AtomicBool::new(connected),
        }
    }

    pub fn set(&self, connected: bool) {
        self.connected.store(connected, Ordering::SeqCst);
    }
}

impl Default for ConnectivityFlag {
    fn default() -> Self {
        Self::new(true)
    }
}

#[async_trait]
impl Connectivity for ConnectivityFlag {
    async fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }
}

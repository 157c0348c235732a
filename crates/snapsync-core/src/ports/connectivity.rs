//! Connectivity port - ネットワーク状態

use async_trait::async_trait;

/// ホストが報告する現在のネットワーク到達性
#[async_trait]
pub trait Connectivity: Send + Sync {
    async fn is_connected(&self) -> bool;
}

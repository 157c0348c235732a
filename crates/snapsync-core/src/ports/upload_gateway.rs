//! UploadGateway port - 1 タスク 1 回のアップロード

use async_trait::async_trait;

use crate::domain::UploadTask;

/// タスク 1 件につきちょうど 1 回アップロードを試みる
///
/// 成功なら `true`。通信エラーや 2xx 以外は `false`。リトライはエンジンの
/// 責務で、ここでは決してしない
#[async_trait]
pub trait UploadGateway: Send + Sync {
    async fn upload(&self, task: &UploadTask) -> bool;
}

use serde::{Deserialize, Serialize};

use super::errors::TransitionError;
use super::{TaskId, TaskStatus};

/// アプリ領域にコピー済みで、キューに積める状態のローカルリソース
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportedResource {
    pub name: String,
    pub uri: String,
}

impl ImportedResource {
    pub fn new(name: impl Into<String>, uri: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            uri: uri.into(),
        }
    }
}

/// バックアップ待ち（または済み）の写真 1 枚
///
/// 永続化される形は `{id, name, status, retries, uri}`。
/// `id` `name` `uri` は作成後に変わらず、`status` と `retries` は下の遷移
/// メソッドでしか動かない。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadTask {
    id: TaskId,
    name: String,
    status: TaskStatus,
    retries: u32,
    uri: String,
}

impl UploadTask {
    /// `pending` の新しいタスク
    pub fn new(id: TaskId, resource: ImportedResource) -> Self {
        Self {
            id,
            name: resource.name,
            status: TaskStatus::Pending,
            retries: 0,
            uri: resource.uri,
        }
    }

    /// 任意の状態でタスクを組み立て直す（テスト・移行用）
    pub fn with_status(mut self, status: TaskStatus, retries: u32) -> Self {
        self.status = status;
        self.retries = retries;
        self
    }

    pub fn id(&self) -> &TaskId {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }

    pub fn status(&self) -> TaskStatus {
        self.status
    }

    pub fn retries(&self) -> u32 {
        self.retries
    }

    /// pending/failed -> processing
    pub fn begin_upload(&mut self) -> Result<(), TransitionError> {
        self.transition(TaskStatus::Processing)
    }

    /// processing -> completed
    pub fn mark_completed(&mut self) -> Result<(), TransitionError> {
        self.transition(TaskStatus::Completed)
    }

    /// processing -> failed（試行回数を数える）
    pub fn mark_failed(&mut self) -> Result<(), TransitionError> {
        self.transition(TaskStatus::Failed)?;
        self.retries = self.retries.saturating_add(1);
        Ok(())
    }

    fn transition(&mut self, next: TaskStatus) -> Result<(), TransitionError> {
        if !self.status.can_transition_to(next) {
            return Err(TransitionError {
                task_id: self.id.clone(),
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        Ok(())
    }
}

use serde::{Deserialize, Serialize};

use super::{TaskStatus, UploadTask};

/// タスク一覧から導く件数
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskCounts {
    pub total: usize,
    pub pending: usize,
    pub processing: usize,
    pub completed: usize,
    pub failed: usize,
}

impl TaskCounts {
    pub fn from_tasks<'a>(tasks: impl IntoIterator<Item = &'a UploadTask>) -> Self {
        let mut counts = TaskCounts::default();
        for task in tasks {
            counts.total += 1;
            match task.status() {
                TaskStatus::Pending => counts.pending += 1,
                TaskStatus::Processing => counts.processing += 1,
                TaskStatus::Completed => counts.completed += 1,
                TaskStatus::Failed => counts.failed += 1,
            }
        }
        counts
    }

    /// まだアップロードが必要な件数
    pub fn outstanding(&self) -> usize {
        self.total - self.completed
    }

    pub fn all_backed_up(&self) -> bool {
        self.outstanding() == 0
    }
}

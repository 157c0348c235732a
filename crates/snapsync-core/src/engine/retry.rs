//! RetryPolicy - どの failed タスクを次のサイクルで拾い直すか

use crate::domain::UploadTask;

/// 失敗したアップロードのリトライ方針
///
/// バックオフは無く、毎サイクル対象タスクをすべて再試行する。デフォルトでは
/// 上限も無いので、失敗し続けるタスクも毎回試され、`retries` は観測用でしかない。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RetryPolicy {
    /// この回数失敗したタスクはもう試さない
    pub max_retries: Option<u32>,
}

impl RetryPolicy {
    pub fn unbounded() -> Self {
        Self { max_retries: None }
    }

    pub fn with_max_retries(max_retries: u32) -> Self {
        Self {
            max_retries: Some(max_retries),
        }
    }

    /// `task` は次の working set に入るか
    pub fn is_eligible(&self, task: &UploadTask) -> bool {
        task.status().is_eligible() && self.max_retries.is_none_or(|max| task.retries() < max)
    }

    /// 上限に達して今後のサイクルから外れる failed タスクか
    pub fn is_exhausted(&self, task: &UploadTask) -> bool {
        task.status().is_eligible() && !self.is_eligible(task)
    }
}

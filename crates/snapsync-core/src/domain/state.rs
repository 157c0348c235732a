//! TaskStatus - アップロードタスクの状態機械

use serde::{Deserialize, Serialize};
use std::fmt;

/// タスクの状態
///
/// 状態遷移:
/// - Pending -> Processing -> Completed
/// - Pending -> Processing -> Failed -> Processing -> ... （デフォルトでは上限なし）
///
/// `Completed` は終端
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    /// 積まれただけで未試行
    Pending,

    /// 実行中のサイクルに含まれている
    Processing,

    /// アップロード済み
    Completed,

    /// 直近の試行が失敗。次のサイクルで再び対象
    Failed,
}

impl TaskStatus {
    /// 終端状態か（これ以上遷移しない）
    pub fn is_terminal(self) -> bool {
        matches!(self, TaskStatus::Completed)
    }

    /// この状態のタスクは次のサイクルで拾われるか
    pub fn is_eligible(self) -> bool {
        !self.is_terminal()
    }

    pub fn can_transition_to(self, next: TaskStatus) -> bool {
        use TaskStatus::*;
        matches!(
            (self, next),
            (Pending, Processing)
                | (Failed, Processing)
                | (Processing, Completed)
                | (Processing, Failed)
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Processing => "processing",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// foreground controller から見たホストアプリのライフサイクル
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AppLifecycle {
    Active,
    Inactive,
    Background,
}

impl AppLifecycle {
    pub fn is_active(self) -> bool {
        matches!(self, AppLifecycle::Active)
    }
}

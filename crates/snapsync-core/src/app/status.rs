//! Status - ダッシュボード向けの状態ビュー
//!
//! 一覧の集計・処理中かどうか・接続状態・ライフサイクルをまとめて返す。

use serde::{Deserialize, Serialize};

use crate::domain::{AppLifecycle, TaskCounts};

/// ダッシュボードに一目で出す内容
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusView {
    pub counts: TaskCounts,
    /// リトライ上限に達して二度と試されない failed の件数
    pub exhausted: usize,
    pub processing: bool,
    pub connected: bool,
    pub lifecycle: AppLifecycle,
}

impl StatusView {
    pub fn headline(&self) -> String {
        if self.processing {
            return "Backing up photos...".to_string();
        }
        match self.counts.outstanding() {
            0 => "All photos are backed up".to_string(),
            1 => "1 photo pending".to_string(),
            n => format!("{n} photos pending"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn view(counts: TaskCounts, processing: bool) -> StatusView {
        StatusView {
            counts,
            exhausted: 0,
            processing,
            connected: true,
            lifecycle: AppLifecycle::Active,
        }
    }

    #[test]
    fn headline_reflects_progress() {
        let done = TaskCounts { total: 2, completed: 2, ..TaskCounts::default() };
        assert_eq!(view(done, false).headline(), "All photos are backed up");

        let waiting = TaskCounts { total: 3, pending: 1, failed: 1, completed: 1, ..TaskCounts::default() };
        assert_eq!(view(waiting, false).headline(), "2 photos pending");
        assert_eq!(view(waiting, true).headline(), "Backing up photos...");

        let one = TaskCounts { total: 1, pending: 1, ..TaskCounts::default() };
        assert_eq!(view(one, false).headline(), "1 photo pending");
    }
}

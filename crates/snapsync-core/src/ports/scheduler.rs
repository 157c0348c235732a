//! BackgroundScheduler port - ホスト側の定期実行スケジューラ
//!
//! モバイル OS のバックグラウンド実行と同じ形: job 本体を名前で一度 define し、
//! その名前をオプション付きで register する。実行タイミングはホスト次第で
//! 正確さは保証されない。

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::domain::SchedulerError;

/// バックグラウンド job がホストに返す結果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobResult {
    Success,
    Failed,
}

/// 定期登録のオプション
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduleOptions {
    /// 2 回の実行の最小間隔
    pub minimum_interval: Duration,
}

impl ScheduleOptions {
    pub fn every_minutes(minutes: u64) -> Self {
        Self {
            minimum_interval: Duration::from_secs(minutes.saturating_mul(60)),
        }
    }
}

/// ホストが呼び出す job 本体
#[async_trait]
pub trait BackgroundJob: Send + Sync {
    async fn run(&self) -> JobResult;
}

#[async_trait]
pub trait BackgroundScheduler: Send + Sync {
    /// `name` に job 本体を結び付ける。再 define は置き換え
    fn define(&self, name: &str, job: Arc<dyn BackgroundJob>);

    async fn is_registered(&self, name: &str) -> bool;

    async fn register(&self, name: &str, options: ScheduleOptions) -> Result<(), SchedulerError>;

    async fn unregister(&self, name: &str) -> Result<(), SchedulerError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minutes_are_converted() {
        let opts = ScheduleOptions::every_minutes(16);
        assert_eq!(opts.minimum_interval, Duration::from_secs(960));
    }

    #[test]
    fn huge_minute_counts_saturate() {
        let opts = ScheduleOptions::every_minutes(u64::MAX / 2);
        assert_eq!(opts.minimum_interval, Duration::from_secs(u64::MAX));
    }
}

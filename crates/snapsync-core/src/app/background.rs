//! Background Trigger - 定期ジョブの登録・解除・再登録
//!
//! ホストには登録済みジョブを同期実行する手段がないので、「今すぐ実行」は
//! unregister + register で表す。どの操作もベストエフォートで、
//! スケジューラのエラーはログに出すだけで返さない。

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, error, info, warn};

use super::ReadinessGate;
use crate::domain::CycleError;
use crate::engine::TaskQueue;
use crate::ports::{BackgroundJob, BackgroundScheduler, Connectivity, JobResult, ScheduleOptions};

pub struct BackgroundTrigger {
    scheduler: Arc<dyn BackgroundScheduler>,
    name: String,
    options: ScheduleOptions,
}

impl BackgroundTrigger {
    pub fn new(
        scheduler: Arc<dyn BackgroundScheduler>,
        name: impl Into<String>,
        options: ScheduleOptions,
    ) -> Self {
        Self {
            scheduler,
            name: name.into(),
            options,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn options(&self) -> ScheduleOptions {
        self.options
    }

    /// このトリガーの名前に job 本体を結び付ける
    pub fn define(&self, job: Arc<dyn BackgroundJob>) {
        self.scheduler.define(&self.name, job);
    }

    pub async fn is_registered(&self) -> bool {
        self.scheduler.is_registered(&self.name).await
    }

    /// 登録済みなら何もしない
    pub async fn register(&self) {
        if self.is_registered().await {
            debug!(job = %self.name, "background job already registered");
            return;
        }
        match self.scheduler.register(&self.name, self.options).await {
            Ok(()) => info!(job = %self.name, "background job registered"),
            Err(e) => error!(job = %self.name, error = %e, "error registering background job"),
        }
    }

    /// 未登録でも呼んでよい
    pub async fn unregister(&self) {
        match self.scheduler.unregister(&self.name).await {
            Ok(()) => info!(job = %self.name, "background job unregistered"),
            Err(e) => warn!(job = %self.name, error = %e, "error unregistering background job"),
        }
    }

    /// ホストに「近いうちに実行して」と頼む
    pub async fn trigger(&self) {
        self.unregister().await;
        self.register().await;
        debug!(job = %self.name, "background job triggered");
    }
}

/// ホストのスケジューラが実行する job 本体
pub struct BackupJob {
    queue: Arc<TaskQueue>,
    connectivity: Arc<dyn Connectivity>,
    gate: ReadinessGate,
}

impl BackupJob {
    pub fn new(
        queue: Arc<TaskQueue>,
        connectivity: Arc<dyn Connectivity>,
        gate: ReadinessGate,
    ) -> Self {
        Self {
            queue,
            connectivity,
            gate,
        }
    }
}

#[async_trait]
impl BackgroundJob for BackupJob {
    async fn run(&self) -> JobResult {
        // foreground の初期化完了を待つ
        self.gate.wait().await;

        if !self.connectivity.is_connected().await {
            debug!("background run skipped: offline");
            return JobResult::Failed;
        }

        match self.queue.process_tasks().await {
            Ok(report) => {
                info!(
                    completed = report.completed,
                    failed = report.failed,
                    "background cycle finished"
                );
                JobResult::Success
            }
            Err(CycleError::NothingToDo) | Err(CycleError::AlreadyRunning) => JobResult::Success,
            Err(CycleError::Offline) => JobResult::Failed,
        }
    }
}

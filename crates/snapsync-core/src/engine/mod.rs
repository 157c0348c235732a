//! TaskQueue - タスク一覧を持ち、アップロードサイクルを回すエンジン
//!
//! # 排他
//! - `tasks`: メモリ上の一覧。ストアへの書き込みは必ずこのロック中に行うので
//!   書き手は常に 1 つ
//! - `cycle`: プロセス内のサイクル直列化。`try_lock` しかしない
//!   （2 本目は待たずに `CycleError::AlreadyRunning`）
//! - cycle lease: 同じストアを共有する別プロセスとの直列化（`TaskStore` 参照）。
//!   lease を持っているときだけ `processing` の取り残しを回収する
//!
//! どのロックもアップロードを跨いで保持しない。

mod retry;

pub use retry::RetryPolicy;

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use ulid::Ulid;

use crate::domain::{CycleError, ImportedResource, TaskCounts, TaskStatus, UploadTask};
use crate::ports::{Clock, Connectivity, IdGenerator, SystemClock, UploadGateway};
use crate::store::TaskStore;

/// lease の heartbeat がこれより古ければ持ち主は死んでいるとみなす
pub const DEFAULT_CYCLE_LEASE_TTL: Duration = Duration::from_secs(300);

/// 「全部消しますか？」への明示的な答え
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Confirmation {
    Confirmed,
    Cancelled,
}

/// 1 サイクルの結果
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CycleReport {
    /// working set の件数
    pub attempted: usize,
    pub completed: usize,
    pub failed: usize,
    /// `processing` のまま残っていて `failed` に戻した件数
    pub recovered: usize,
}

pub struct TaskQueue {
    store: TaskStore,
    gateway: Arc<dyn UploadGateway>,
    connectivity: Arc<dyn Connectivity>,
    ids: Arc<dyn IdGenerator>,
    retry_policy: RetryPolicy,
    clock: Arc<dyn Clock>,
    lease_ttl: Duration,
    owner: String,
    tasks: Mutex<Vec<UploadTask>>,
    cycle: Mutex<()>,
}

impl TaskQueue {
    /// メモリ上の一覧は空で始まる。永続化済みの一覧は [`TaskQueue::reload`] で読む
    pub fn new(
        store: TaskStore,
        gateway: Arc<dyn UploadGateway>,
        connectivity: Arc<dyn Connectivity>,
        ids: Arc<dyn IdGenerator>,
        retry_policy: RetryPolicy,
    ) -> Self {
        Self {
            store,
            gateway,
            connectivity,
            ids,
            retry_policy,
            clock: Arc::new(SystemClock),
            lease_ttl: DEFAULT_CYCLE_LEASE_TTL,
            owner: format!("queue-{}", Ulid::new()),
            tasks: Mutex::new(Vec::new()),
            cycle: Mutex::new(()),
        }
    }

    /// lease の heartbeat に使う時計
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// アップロード 1 件の最長時間より長くすること
    pub fn with_lease_ttl(mut self, ttl: Duration) -> Self {
        self.lease_ttl = ttl;
        self
    }

    /// メモリ上の一覧を永続化済みのもので置き換える
    pub async fn reload(&self) -> usize {
        let mut tasks = self.tasks.lock().await;
        *tasks = self.store.load().await;
        debug!(count = tasks.len(), "task list reloaded");
        tasks.len()
    }

    /// 現在の一覧のスナップショット（追加順）
    pub async fn tasks(&self) -> Vec<UploadTask> {
        self.tasks.lock().await.clone()
    }

    pub async fn counts(&self) -> TaskCounts {
        TaskCounts::from_tasks(self.tasks.lock().await.iter())
    }

    /// リトライ上限のためにもう処理されない failed タスク
    pub async fn exhausted(&self) -> usize {
        self.tasks
            .lock()
            .await
            .iter()
            .filter(|t| self.retry_policy.is_exhausted(t))
            .count()
    }

    /// このプロセスでサイクルが走っているか
    pub fn is_processing(&self) -> bool {
        self.cycle.try_lock().is_err()
    }

    /// リソースごとに `pending` タスクを 1 件追加して保存する
    ///
    /// その後サイクルを回すかは呼び出し側が決める
    pub async fn add_tasks(&self, resources: Vec<ImportedResource>) -> Vec<UploadTask> {
        if resources.is_empty() {
            return Vec::new();
        }

        let mut tasks = self.tasks.lock().await;
        // 別プロセスの書き込みを取り込む。ストレージが読めなければメモリのまま
        match self.store.try_load().await {
            Ok(persisted) => *tasks = persisted,
            Err(e) => warn!(error = %e, "could not refresh task list before append"),
        }

        let mut created = Vec::with_capacity(resources.len());
        for resource in resources {
            let id = self.ids.generate_task_id();
            if tasks.iter().any(|t| t.id() == &id) {
                warn!(task_id = %id, "generated id already in use; resource skipped");
                continue;
            }
            let task = UploadTask::new(id, resource);
            tasks.push(task.clone());
            created.push(task);
        }

        self.store.save(&tasks).await;
        info!(added = created.len(), total = tasks.len(), "tasks added");
        created
    }

    /// ストアとメモリの両方を空にする。`Cancelled` なら何もしない
    pub async fn clear_all(&self, confirmation: Confirmation) -> bool {
        if confirmation != Confirmation::Confirmed {
            debug!("clear all cancelled");
            return false;
        }
        let mut tasks = self.tasks.lock().await;
        self.store.clear().await;
        let removed = tasks.len();
        tasks.clear();
        info!(removed, "all tasks cleared");
        true
    }

    /// クラッシュしたサイクルが `processing` のまま残したタスクを `failed` に戻す
    ///
    /// このプロセスか、ストアを共有する別プロセスでサイクルが走っている間は
    /// 何もしない（その `processing` は正当）
    pub async fn recover_interrupted(&self) -> usize {
        let Ok(_cycle) = self.cycle.try_lock() else {
            debug!("cycle in flight; skipping recovery");
            return 0;
        };
        if !self.acquire_lease().await {
            debug!("cycle in flight elsewhere; skipping recovery");
            return 0;
        }

        let recovered = {
            let mut tasks = self.tasks.lock().await;
            let recovered = recover_orphans(&mut tasks);
            if recovered > 0 {
                self.store.save(&tasks).await;
            }
            recovered
        };
        self.store.release_lease(&self.owner).await;
        recovered
    }

    /// 対象タスクを 1 件ずつ順番に 1 回だけアップロードする
    pub async fn process_tasks(&self) -> Result<CycleReport, CycleError> {
        let Ok(_cycle) = self.cycle.try_lock() else {
            debug!("cycle already in flight");
            return Err(CycleError::AlreadyRunning);
        };
        if !self.acquire_lease().await {
            info!("cycle already in flight in another process");
            return Err(CycleError::AlreadyRunning);
        }

        let result = self.run_cycle().await;
        self.store.release_lease(&self.owner).await;
        result
    }

    /// lease が取れなければ `false`。ストレージ障害時はプロセス内ロックだけで進める
    async fn acquire_lease(&self) -> bool {
        match self
            .store
            .try_acquire_lease(&self.owner, self.clock.now(), self.lease_ttl)
            .await
        {
            Ok(acquired) => acquired,
            Err(e) => {
                warn!(error = %e, "cycle lease unavailable; relying on in-process lock");
                true
            }
        }
    }

    /// 別プロセスの書き込みを取り込む。ストレージが読めなければメモリのまま
    async fn refresh(&self, tasks: &mut Vec<UploadTask>) {
        match self.store.try_load().await {
            Ok(persisted) => *tasks = persisted,
            Err(e) => debug!(error = %e, "could not refresh task list; using memory"),
        }
    }

    async fn run_cycle(&self) -> Result<CycleReport, CycleError> {
        let (working_set, recovered) = {
            let mut tasks = self.tasks.lock().await;
            // サスペンド後のメモリは古いかもしれない。正はストレージ
            *tasks = self.store.load().await;

            if !self.connectivity.is_connected().await {
                info!("offline; cycle not started");
                return Err(CycleError::Offline);
            }

            let recovered = recover_orphans(&mut tasks);
            if recovered > 0 {
                self.store.save(&tasks).await;
            }

            let mut working_set = Vec::new();
            for task in tasks.iter_mut() {
                if !self.retry_policy.is_eligible(task) {
                    continue;
                }
                match task.begin_upload() {
                    Ok(()) => working_set.push(task.clone()),
                    Err(e) => warn!(error = %e, "task left out of cycle"),
                }
            }

            if working_set.is_empty() {
                debug!(recovered, "no pending tasks");
                return Err(CycleError::NothingToDo);
            }

            // 最初の通信より前に `processing` を保存する
            self.store.save(&tasks).await;
            (working_set, recovered)
        };

        info!(count = working_set.len(), "cycle started");
        let mut report = CycleReport {
            attempted: working_set.len(),
            recovered,
            ..CycleReport::default()
        };

        for task in &working_set {
            {
                let mut tasks = self.tasks.lock().await;
                self.refresh(&mut tasks).await;
                let still_queued = tasks
                    .iter()
                    .any(|t| t.id() == task.id() && t.status() == TaskStatus::Processing);
                if !still_queued {
                    warn!(task_id = %task.id(), "task removed during cycle; not uploaded");
                    continue;
                }
            }

            let success = self.gateway.upload(task).await;

            let mut tasks = self.tasks.lock().await;
            self.refresh(&mut tasks).await;
            let Some(live) = tasks.iter_mut().find(|t| t.id() == task.id()) else {
                warn!(task_id = %task.id(), "task removed during upload; outcome dropped");
                continue;
            };
            let applied = if success {
                live.mark_completed()
            } else {
                live.mark_failed()
            };
            if let Err(e) = applied {
                warn!(error = %e, "outcome not applied");
                continue;
            }

            if success {
                report.completed += 1;
                debug!(task_id = %task.id(), "task completed");
            } else {
                report.failed += 1;
                warn!(task_id = %task.id(), retries = live.retries(), "task failed");
            }
            self.store.save(&tasks).await;
            self.store.renew_lease(&self.owner, self.clock.now()).await;
        }

        info!(
            completed = report.completed,
            failed = report.failed,
            "cycle finished"
        );
        Ok(report)
    }
}

fn recover_orphans(tasks: &mut [UploadTask]) -> usize {
    let mut recovered = 0;
    for task in tasks
        .iter_mut()
        .filter(|t| t.status() == TaskStatus::Processing)
    {
        if task.mark_failed().is_ok() {
            warn!(task_id = %task.id(), "interrupted upload marked failed");
            recovered += 1;
        }
    }
    recovered
}

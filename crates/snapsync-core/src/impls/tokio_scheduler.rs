//! TokioScheduler - tokio のタスクで動く BackgroundScheduler
//!
//! デスクトッププロセスとして動かすときの OS スケジューラの代役。
//!
//! # 実装詳細
//! - 登録ごとに 1 本のループを spawn し、`minimum_interval` ごとに job を実行
//! - 解除は `watch` で停止を通知するだけ。実行中の `run()` は中断しない
//!   （ループは run の合間にだけ止まる）
//! - 再登録は既存ループを止めてから新しいループを作る

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::domain::SchedulerError;
use crate::ports::{BackgroundJob, BackgroundScheduler, ScheduleOptions};

/// 1 件の登録: 停止シグナルとループの JoinHandle
struct Registration {
    stop_tx: watch::Sender<bool>,
    join: JoinHandle<()>,
}

impl Registration {
    /// 停止を通知する。実行中の run は最後まで走る
    fn request_stop(&self) {
        // ループが既に終わっていれば send は失敗するが無視してよい
        let _ = self.stop_tx.send(true);
    }
}

pub struct TokioScheduler {
    jobs: Mutex<HashMap<String, Arc<dyn BackgroundJob>>>,
    running: Mutex<HashMap<String, Registration>>,
    run_on_register: bool,
}

impl TokioScheduler {
    /// 登録直後に 1 回目を実行する（再登録 = 「今すぐ実行」）
    pub fn new() -> Self {
        Self {
            jobs: Mutex::new(HashMap::new()),
            running: Mutex::new(HashMap::new()),
            run_on_register: true,
        }
    }

    /// 1 回目の実行まで 1 interval 待つ
    pub fn deferred() -> Self {
        Self {
            jobs: Mutex::new(HashMap::new()),
            running: Mutex::new(HashMap::new()),
            run_on_register: false,
        }
    }

    /// 全登録に停止を通知する（待たない）
    pub fn shutdown(&self) {
        if let Ok(mut running) = self.running.lock() {
            for (name, registration) in running.drain() {
                debug!(job = %name, "stopping background job");
                registration.request_stop();
            }
        }
    }

    /// 停止を通知し、実行中の run が終わるのを `grace` まで待つ。
    /// 間に合わなかったループは abort する
    pub async fn shutdown_and_join(&self, grace: Duration) {
        let registrations: Vec<Registration> = match self.running.lock() {
            Ok(mut running) => running.drain().map(|(_, r)| r).collect(),
            Err(_) => return,
        };
        for registration in &registrations {
            registration.request_stop();
        }

        let aborts: Vec<_> = registrations.iter().map(|r| r.join.abort_handle()).collect();
        let joined = tokio::time::timeout(grace, async move {
            for registration in registrations {
                let _ = registration.join.await;
            }
        })
        .await;
        if joined.is_err() {
            warn!(grace_secs = grace.as_secs(), "background job did not stop in time; aborting");
            for abort in aborts {
                abort.abort();
            }
        }
    }

    fn lock<'a, T>(m: &'a Mutex<T>) -> Result<MutexGuard<'a, T>, SchedulerError> {
        m.lock()
            .map_err(|e| SchedulerError::Other(format!("scheduler lock poisoned: {e}")))
    }

    fn spawn_loop(
        name: String,
        job: Arc<dyn BackgroundJob>,
        interval: Duration,
        run_now: bool,
    ) -> Registration {
        let (stop_tx, mut stop_rx) = watch::channel(false);
        let join = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            if !run_now {
                // interval の最初の tick は即時なので捨てる
                ticker.tick().await;
            }
            loop {
                // 待機中だけ停止と競合させる
                tokio::select! {
                    biased;
                    _ = stop_rx.changed() => break,
                    _ = ticker.tick() => {}
                }
                let result = job.run().await;
                debug!(job = %name, ?result, "background job finished");

                if *stop_rx.borrow() {
                    break;
                }
            }
            debug!(job = %name, "background loop stopped");
        });
        Registration { stop_tx, join }
    }
}

impl Default for TokioScheduler {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BackgroundScheduler for TokioScheduler {
    fn define(&self, name: &str, job: Arc<dyn BackgroundJob>) {
        if let Ok(mut jobs) = self.jobs.lock() {
            jobs.insert(name.to_string(), job);
        }
    }

    async fn is_registered(&self, name: &str) -> bool {
        match self.running.lock() {
            Ok(running) => running.get(name).is_some_and(|r| !r.join.is_finished()),
            Err(_) => false,
        }
    }

    async fn register(&self, name: &str, options: ScheduleOptions) -> Result<(), SchedulerError> {
        if options.minimum_interval.is_zero() {
            return Err(SchedulerError::Other(
                "minimum interval must be non-zero".to_string(),
            ));
        }
        let job = Self::lock(&self.jobs)?
            .get(name)
            .cloned()
            .ok_or_else(|| SchedulerError::UnknownJob(name.to_string()))?;

        let registration = Self::spawn_loop(
            name.to_string(),
            job,
            options.minimum_interval,
            self.run_on_register,
        );
        // 既存の登録は置き換える
        if let Some(previous) = Self::lock(&self.running)?.insert(name.to_string(), registration) {
            previous.request_stop();
        }
        info!(job = %name, interval_secs = options.minimum_interval.as_secs(), "background job registered");
        Ok(())
    }

    async fn unregister(&self, name: &str) -> Result<(), SchedulerError> {
        let registration = Self::lock(&self.running)?
            .remove(name)
            .ok_or_else(|| SchedulerError::NotRegistered(name.to_string()))?;
        registration.request_stop();
        info!(job = %name, "background job unregistered");
        Ok(())
    }
}

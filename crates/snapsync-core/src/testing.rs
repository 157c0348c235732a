//! テスト用ダブル（ユニットテスト共通）

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::Notify;

use crate::domain::{SchedulerError, TaskId, UploadTask};
use crate::ports::{BackgroundJob, BackgroundScheduler, ScheduleOptions, UploadGateway};

/// タスク名ごとに答えを決めておける gateway
pub struct ScriptedGateway {
    default: AtomicBool,
    by_name: Mutex<HashMap<String, bool>>,
    calls: Mutex<Vec<TaskId>>,
    hold: Option<Hold>,
}

/// テストが release するまでアップロードを止めておく
pub struct Hold {
    pub started: Notify,
    pub release: Notify,
}

impl ScriptedGateway {
    pub fn succeeding() -> Self {
        Self::answering(true)
    }

    pub fn failing() -> Self {
        Self::answering(false)
    }

    pub fn answering(default: bool) -> Self {
        Self {
            default: AtomicBool::new(default),
            by_name: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
            hold: None,
        }
    }

    /// 各アップロードは `hold().started` を通知したあと `hold().release` を待つ
    pub fn held(default: bool) -> Self {
        Self {
            hold: Some(Hold {
                started: Notify::new(),
                release: Notify::new(),
            }),
            ..Self::answering(default)
        }
    }

    pub fn hold(&self) -> &Hold {
        self.hold.as_ref().expect("gateway was not built with held()")
    }

    pub fn set_default(&self, ok: bool) {
        self.default.store(ok, Ordering::SeqCst);
    }

    pub fn answer_for(&self, name: &str, ok: bool) {
        self.by_name.lock().unwrap().insert(name.to_string(), ok);
    }

    pub fn calls(&self) -> Vec<TaskId> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl UploadGateway for ScriptedGateway {
    async fn upload(&self, task: &UploadTask) -> bool {
        self.calls.lock().unwrap().push(task.id().clone());
        if let Some(hold) = &self.hold {
            hold.started.notify_one();
            hold.release.notified().await;
        }
        let scripted = self.by_name.lock().unwrap().get(task.name()).copied();
        scripted.unwrap_or_else(|| self.default.load(Ordering::SeqCst))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchedulerCall {
    Register(String, ScheduleOptions),
    Unregister(String),
}

/// 呼び出しを記録するだけのスケジューラ。job はテストが呼んだときだけ走る
#[derive(Default)]
pub struct RecordingScheduler {
    jobs: Mutex<HashMap<String, Arc<dyn BackgroundJob>>>,
    registered: Mutex<HashMap<String, ScheduleOptions>>,
    calls: Mutex<Vec<SchedulerCall>>,
    failing: AtomicBool,
}

impl RecordingScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<SchedulerCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn job(&self, name: &str) -> Option<Arc<dyn BackgroundJob>> {
        self.jobs.lock().unwrap().get(name).cloned()
    }

    pub fn options(&self, name: &str) -> Option<ScheduleOptions> {
        self.registered.lock().unwrap().get(name).copied()
    }
}

#[async_trait]
impl BackgroundScheduler for RecordingScheduler {
    fn define(&self, name: &str, job: Arc<dyn BackgroundJob>) {
        self.jobs.lock().unwrap().insert(name.to_string(), job);
    }

    async fn is_registered(&self, name: &str) -> bool {
        self.registered.lock().unwrap().contains_key(name)
    }

    async fn register(&self, name: &str, options: ScheduleOptions) -> Result<(), SchedulerError> {
        self.calls
            .lock()
            .unwrap()
            .push(SchedulerCall::Register(name.to_string(), options));
        if self.failing.load(Ordering::SeqCst) {
            return Err(SchedulerError::Other("host refused registration".to_string()));
        }
        self.registered
            .lock()
            .unwrap()
            .insert(name.to_string(), options);
        Ok(())
    }

    async fn unregister(&self, name: &str) -> Result<(), SchedulerError> {
        self.calls
            .lock()
            .unwrap()
            .push(SchedulerCall::Unregister(name.to_string()));
        match self.registered.lock().unwrap().remove(name) {
            Some(_) => Ok(()),
            None => Err(SchedulerError::NotRegistered(name.to_string())),
        }
    }
}

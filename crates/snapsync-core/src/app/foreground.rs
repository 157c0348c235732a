//! Foreground Controller - ライフサイクルと接続状態に反応する
//!
//! ライフサイクル・接続状態が変わるたびに、エンジンをその場で回すか
//! （active）、バックグラウンドトリガーに任せるか（それ以外）を決める。

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use tracing::{info, warn};

use super::{BackgroundTrigger, ReadinessGate, StatusView};
use crate::domain::{AppLifecycle, CycleError, ImportError, TaskCounts, UploadTask};
use crate::engine::{Confirmation, CycleReport, TaskQueue};
use crate::ports::{Connectivity, ResourceImporter};

/// 実行可能になった作業をどう扱ったか
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dispatch {
    /// このイベントではやることがない
    Ignored,
    /// foreground でサイクルを回した
    Processed(Result<CycleReport, CycleError>),
    /// バックグラウンド job に任せた
    HandedOff,
}

/// コピーできなかった選択リソース
#[derive(Debug)]
pub struct SkippedResource {
    pub source: PathBuf,
    pub error: ImportError,
}

#[derive(Debug)]
pub struct AddPhotosReport {
    pub added: Vec<UploadTask>,
    pub skipped: Vec<SkippedResource>,
    pub dispatch: Dispatch,
}

pub struct ForegroundController {
    queue: Arc<TaskQueue>,
    background: Arc<BackgroundTrigger>,
    connectivity: Arc<dyn Connectivity>,
    importer: Arc<dyn ResourceImporter>,
    gate: ReadinessGate,
    lifecycle: Mutex<AppLifecycle>,
}

impl ForegroundController {
    pub fn new(
        queue: Arc<TaskQueue>,
        background: Arc<BackgroundTrigger>,
        connectivity: Arc<dyn Connectivity>,
        importer: Arc<dyn ResourceImporter>,
        gate: ReadinessGate,
    ) -> Self {
        Self {
            queue,
            background,
            connectivity,
            importer,
            gate,
            lifecycle: Mutex::new(AppLifecycle::Active),
        }
    }

    pub fn lifecycle(&self) -> AppLifecycle {
        *self.lifecycle.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn swap_lifecycle(&self, next: AppLifecycle) -> AppLifecycle {
        let mut current = self.lifecycle.lock().unwrap_or_else(|e| e.into_inner());
        std::mem::replace(&mut *current, next)
    }

    /// 永続化された一覧を読み、中断されたアップロードを回収し、
    /// バックグラウンド job を解放して登録を確実にする
    pub async fn initialize(&self) -> TaskCounts {
        self.queue.reload().await;
        let recovered = self.queue.recover_interrupted().await;
        if self.gate.open() {
            info!(recovered, "foreground initialized");
        }
        self.background.register().await;
        self.queue.counts().await
    }

    /// foreground / background の切り替えに反応する
    ///
    /// foreground に戻ったときはサイクルの結果を返す
    pub async fn on_lifecycle_change(
        &self,
        next: AppLifecycle,
    ) -> Option<Result<CycleReport, CycleError>> {
        let previous = self.swap_lifecycle(next);

        if !previous.is_active() && next.is_active() {
            info!("app has come to the foreground");
            // サスペンド中にバックグラウンド job が書いたものを取り込む
            self.queue.reload().await;
            return Some(self.queue.process_tasks().await);
        }
        if previous.is_active() && next == AppLifecycle::Background {
            info!("app has gone to the background");
        }
        None
    }

    pub async fn on_connectivity_change(&self, connected: bool) -> Dispatch {
        if !connected {
            info!("connectivity lost");
            return Dispatch::Ignored;
        }
        if self.lifecycle().is_active() {
            Dispatch::Processed(self.queue.process_tasks().await)
        } else {
            self.background.trigger().await;
            Dispatch::HandedOff
        }
    }

    /// 各ソースをアプリ領域へコピーし、コピーできたものを積んでから
    /// アップロードを始める（またはバックグラウンド job に任せる）
    pub async fn add_photos(&self, sources: &[PathBuf]) -> AddPhotosReport {
        let mut resources = Vec::with_capacity(sources.len());
        let mut skipped = Vec::new();
        for source in sources {
            match self.importer.import(source).await {
                Ok(resource) => resources.push(resource),
                Err(error) => {
                    warn!(source = %source.display(), error = %error, "error saving image");
                    skipped.push(SkippedResource {
                        source: source.clone(),
                        error,
                    });
                }
            }
        }

        let added = self.queue.add_tasks(resources).await;
        let dispatch = if added.is_empty() {
            Dispatch::Ignored
        } else {
            self.dispatch_new_work().await
        };

        AddPhotosReport {
            added,
            skipped,
            dispatch,
        }
    }

    /// 手動バックアップ
    pub async fn backup_now(&self) -> Result<CycleReport, CycleError> {
        self.queue.process_tasks().await
    }

    pub async fn clear_all(&self, confirmation: Confirmation) -> bool {
        self.queue.clear_all(confirmation).await
    }

    pub async fn tasks(&self) -> Vec<UploadTask> {
        self.queue.tasks().await
    }

    pub async fn counts(&self) -> TaskCounts {
        self.queue.counts().await
    }

    pub async fn status(&self) -> StatusView {
        StatusView {
            counts: self.queue.counts().await,
            exhausted: self.queue.exhausted().await,
            processing: self.queue.is_processing(),
            connected: self.connectivity.is_connected().await,
            lifecycle: self.lifecycle(),
        }
    }

    async fn dispatch_new_work(&self) -> Dispatch {
        if !self.connectivity.is_connected().await {
            // 後のバックグラウンド実行が拾う
            self.background.register().await;
            return Dispatch::HandedOff;
        }
        if self.lifecycle().is_active() {
            Dispatch::Processed(self.queue.process_tasks().await)
        } else {
            self.background.trigger().await;
            Dispatch::HandedOff
        }
    }
}

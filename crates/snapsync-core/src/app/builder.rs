//! AppBuilder - アプリケーションの構築とワイヤリング
//!
//! # Fail-fast 設計
//! - 必要な port がすべて揃っていなければ build() が BuildError を返す
//! - `with_default_ports()` で file/HTTP/tokio ベースの実装を一括で差し込める

use std::sync::Arc;

use super::{BackgroundTrigger, BackupJob, ForegroundController, ReadinessGate, SyncConfig};
use crate::engine::TaskQueue;
use crate::impls::{FileImporter, FileKvStore, HttpUploadGateway, TokioScheduler};
use crate::ports::{
    BackgroundScheduler, Connectivity, IdGenerator, KvStore, ResourceImporter, SystemClock,
    UlidGenerator, UploadGateway,
};
use crate::store::TaskStore;

/// AppBuilder はアプリケーションを構築
///
/// # 使用例
/// ```ignore
/// let app = AppBuilder::new(config)
///     .connectivity(Arc::new(ConnectivityFlag::new(true)))
///     .with_default_ports()
///     .await?
///     .build()?;
/// app.foreground().initialize().await;
/// ```
pub struct AppBuilder {
    config: SyncConfig,
    kv_store: Option<Arc<dyn KvStore>>,
    gateway: Option<Arc<dyn UploadGateway>>,
    connectivity: Option<Arc<dyn Connectivity>>,
    scheduler: Option<Arc<dyn BackgroundScheduler>>,
    importer: Option<Arc<dyn ResourceImporter>>,
    ids: Option<Arc<dyn IdGenerator>>,
}

/// BuildError はアプリケーション構築時のエラー
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("Missing ports: {0:?}. These must be provided before build().")]
    MissingPorts(Vec<&'static str>),

    #[error("failed to set up default port: {0}")]
    Init(String),
}

impl AppBuilder {
    pub fn new(config: SyncConfig) -> Self {
        Self {
            config,
            kv_store: None,
            gateway: None,
            connectivity: None,
            scheduler: None,
            importer: None,
            ids: None,
        }
    }

    pub fn kv_store(mut self, kv_store: Arc<dyn KvStore>) -> Self {
        self.kv_store = Some(kv_store);
        self
    }

    pub fn upload_gateway(mut self, gateway: Arc<dyn UploadGateway>) -> Self {
        self.gateway = Some(gateway);
        self
    }

    pub fn connectivity(mut self, connectivity: Arc<dyn Connectivity>) -> Self {
        self.connectivity = Some(connectivity);
        self
    }

    pub fn scheduler(mut self, scheduler: Arc<dyn BackgroundScheduler>) -> Self {
        self.scheduler = Some(scheduler);
        self
    }

    pub fn importer(mut self, importer: Arc<dyn ResourceImporter>) -> Self {
        self.importer = Some(importer);
        self
    }

    /// 未指定ならシステム時計の ULID 生成器
    pub fn id_generator(mut self, ids: Arc<dyn IdGenerator>) -> Self {
        self.ids = Some(ids);
        self
    }

    /// 未設定の port を file / HTTP / tokio の実装で埋める
    ///
    /// connectivity はホストしか知らないので埋めない
    pub async fn with_default_ports(mut self) -> Result<Self, BuildError> {
        if self.kv_store.is_none() {
            let kv = FileKvStore::open(&self.config.data_dir)
                .await
                .map_err(|e| BuildError::Init(e.to_string()))?;
            self.kv_store = Some(Arc::new(kv));
        }
        if self.gateway.is_none() {
            let gateway = HttpUploadGateway::new(
                self.config.upload_endpoint.clone(),
                self.config.upload_timeout(),
            )
            .map_err(|e| BuildError::Init(e.to_string()))?;
            self.gateway = Some(Arc::new(gateway));
        }
        if self.importer.is_none() {
            self.importer = Some(Arc::new(FileImporter::new(self.config.import_dir())));
        }
        if self.scheduler.is_none() {
            self.scheduler = Some(Arc::new(TokioScheduler::new()));
        }
        Ok(self)
    }

    /// 全部を結線し、バックグラウンド job 本体を define する
    pub fn build(self) -> Result<App, BuildError> {
        let mut missing = Vec::new();
        if self.kv_store.is_none() {
            missing.push("kv_store");
        }
        if self.gateway.is_none() {
            missing.push("upload_gateway");
        }
        if self.connectivity.is_none() {
            missing.push("connectivity");
        }
        if self.scheduler.is_none() {
            missing.push("scheduler");
        }
        if self.importer.is_none() {
            missing.push("importer");
        }
        let (Some(kv_store), Some(gateway), Some(connectivity), Some(scheduler), Some(importer)) = (
            self.kv_store,
            self.gateway,
            self.connectivity,
            self.scheduler,
            self.importer,
        ) else {
            return Err(BuildError::MissingPorts(missing));
        };
        let ids = self
            .ids
            .unwrap_or_else(|| Arc::new(UlidGenerator::new(SystemClock)));

        let store = TaskStore::with_key(kv_store, self.config.storage_key.clone());
        let queue = Arc::new(
            TaskQueue::new(
                store,
                gateway,
                connectivity.clone(),
                ids,
                self.config.retry_policy(),
            )
            .with_lease_ttl(self.config.cycle_lease_ttl()),
        );

        let gate = ReadinessGate::new();
        let background = Arc::new(BackgroundTrigger::new(
            scheduler,
            self.config.job_name.clone(),
            self.config.schedule_options(),
        ));
        background.define(Arc::new(BackupJob::new(
            queue.clone(),
            connectivity.clone(),
            gate.clone(),
        )));

        let foreground = ForegroundController::new(
            queue.clone(),
            background.clone(),
            connectivity,
            importer,
            gate,
        );

        Ok(App {
            config: self.config,
            queue,
            background,
            foreground,
        })
    }
}

/// 結線済みのアプリケーション
pub struct App {
    config: SyncConfig,
    queue: Arc<TaskQueue>,
    background: Arc<BackgroundTrigger>,
    foreground: ForegroundController,
}

impl App {
    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub fn queue(&self) -> &Arc<TaskQueue> {
        &self.queue
    }

    pub fn background(&self) -> &Arc<BackgroundTrigger> {
        &self.background
    }

    pub fn foreground(&self) -> &ForegroundController {
        &self.foreground
    }
}

//! SyncConfig - 設定
//!
//! JSON、キーは camelCase、全フィールド省略可:
//!
//! ```json
//! { "uploadEndpoint": "https://example.com/upload", "minimumInterval": 16 }
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::engine::{DEFAULT_CYCLE_LEASE_TTL, RetryPolicy};
use crate::ports::ScheduleOptions;
use crate::store::TASKS_STORAGE_KEY;

pub const BACKGROUND_TASK_NAME: &str = "backup-images";
pub const DEFAULT_MINIMUM_INTERVAL_MINUTES: u64 = 16;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SyncConfig {
    /// タスク一覧の保存キー
    pub storage_key: String,

    /// 定期バックグラウンド job の名前
    pub job_name: String,

    /// バックグラウンド実行の最小間隔（分）
    pub minimum_interval: u64,

    pub upload_endpoint: String,

    pub upload_timeout_secs: u64,

    /// タスク一覧の置き場所
    pub data_dir: PathBuf,

    /// 選択した写真のコピー先。省略時は `<dataDir>/images`
    pub import_dir: Option<PathBuf>,

    /// リトライ上限。省略時は無制限
    pub max_retries: Option<u32>,

    /// 別プロセスのサイクルを死んだとみなすまでの heartbeat 無しの秒数
    ///
    /// `uploadTimeoutSecs` より長くなければならない
    pub cycle_lease_secs: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            storage_key: TASKS_STORAGE_KEY.to_string(),
            job_name: BACKGROUND_TASK_NAME.to_string(),
            minimum_interval: DEFAULT_MINIMUM_INTERVAL_MINUTES,
            upload_endpoint: "http://127.0.0.1:8080/upload".to_string(),
            upload_timeout_secs: 30,
            data_dir: PathBuf::from("snapsync-data"),
            import_dir: None,
            max_retries: None,
            cycle_lease_secs: DEFAULT_CYCLE_LEASE_TTL.as_secs(),
        }
    }
}

impl SyncConfig {
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::from_json_str(&raw)
    }

    pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
        let config: SyncConfig = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.minimum_interval == 0 {
            return Err(ConfigError::Invalid("minimumInterval must be at least 1".into()));
        }
        if self.storage_key.is_empty() {
            return Err(ConfigError::Invalid("storageKey must not be empty".into()));
        }
        if self.job_name.is_empty() {
            return Err(ConfigError::Invalid("jobName must not be empty".into()));
        }
        if self.cycle_lease_secs <= self.upload_timeout_secs {
            return Err(ConfigError::Invalid(
                "cycleLeaseSecs must be greater than uploadTimeoutSecs".into(),
            ));
        }
        Ok(())
    }

    pub fn import_dir(&self) -> PathBuf {
        self.import_dir
            .clone()
            .unwrap_or_else(|| self.data_dir.join("images"))
    }

    pub fn schedule_options(&self) -> ScheduleOptions {
        ScheduleOptions::every_minutes(self.minimum_interval)
    }

    pub fn upload_timeout(&self) -> Duration {
        Duration::from_secs(self.upload_timeout_secs)
    }

    pub fn cycle_lease_ttl(&self) -> Duration {
        Duration::from_secs(self.cycle_lease_secs)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.max_retries,
        }
    }
}

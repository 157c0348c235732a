//! TaskStore - タスク一覧の永続化
//!
//! 一覧全体を 1 キーの JSON 配列として保存し、書き込みは丸ごと置き換え
//! （last write wins）。ストレージ障害・パース失敗はログに出して飲み込む:
//! 読めなければ空一覧、書けなければ何もしない。
//!
//! # サイクル lease
//! 同じストアを共有するプロセス間で処理サイクルを 1 本に絞るためのマーカー。
//! `<key>_cycle` に所有者と heartbeat を置き、`insert_new` で取得する。
//! heartbeat が ttl より古い lease は持ち主がクラッシュしたものとみなして奪う。

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::domain::{StoreError, UploadTask};
use crate::ports::KvStore;

/// タスク一覧のデフォルトキー
pub const TASKS_STORAGE_KEY: &str = "backup_tasks";

const CYCLE_LEASE_SUFFIX: &str = "_cycle";

/// 処理サイクル実行中の印
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CycleLease {
    pub owner: String,
    pub heartbeat: DateTime<Utc>,
}

impl CycleLease {
    /// heartbeat が `ttl` より古いか（未来の heartbeat は新しいとみなす）
    pub fn is_stale(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        (now - self.heartbeat).to_std().is_ok_and(|age| age > ttl)
    }
}

#[derive(Clone)]
pub struct TaskStore {
    kv: Arc<dyn KvStore>,
    key: String,
}

impl TaskStore {
    pub fn new(kv: Arc<dyn KvStore>) -> Self {
        Self::with_key(kv, TASKS_STORAGE_KEY)
    }

    pub fn with_key(kv: Arc<dyn KvStore>, key: impl Into<String>) -> Self {
        Self {
            kv,
            key: key.into(),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// 保存済みの一覧。無い・読めない・壊れているときは空
    pub async fn load(&self) -> Vec<UploadTask> {
        match self.try_load().await {
            Ok(tasks) => tasks,
            Err(StoreError::Serialization(e)) => {
                warn!(key = %self.key, error = %e, "stored task list is corrupt; treating as empty");
                Vec::new()
            }
            Err(e) => {
                error!(key = %self.key, error = %e, "error loading tasks");
                Vec::new()
            }
        }
    }

    /// 保存済みの一覧を上書きする。失敗はログのみ
    pub async fn save(&self, tasks: &[UploadTask]) {
        if let Err(e) = self.try_save(tasks).await {
            error!(key = %self.key, error = %e, count = tasks.len(), "error saving tasks");
        }
    }

    /// 保存済みの一覧を消す。失敗はログのみ
    pub async fn clear(&self) {
        if let Err(e) = self.try_clear().await {
            error!(key = %self.key, error = %e, "error clearing tasks");
        }
    }

    pub async fn try_load(&self) -> Result<Vec<UploadTask>, StoreError> {
        let Some(bytes) = self.kv.get(&self.key).await? else {
            return Ok(Vec::new());
        };
        let tasks: Vec<UploadTask> = serde_json::from_slice(&bytes)?;
        debug!(key = %self.key, count = tasks.len(), "tasks loaded");
        Ok(tasks)
    }

    pub async fn try_save(&self, tasks: &[UploadTask]) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec(tasks)?;
        self.kv.set(&self.key, &bytes).await
    }

    pub async fn try_clear(&self) -> Result<(), StoreError> {
        self.kv.delete(&self.key).await
    }

    pub fn lease_key(&self) -> String {
        format!("{}{CYCLE_LEASE_SUFFIX}", self.key)
    }

    pub async fn current_lease(&self) -> Result<Option<CycleLease>, StoreError> {
        match self.kv.get(&self.lease_key()).await? {
            Some(raw) => Ok(Some(serde_json::from_slice(&raw)?)),
            None => Ok(None),
        }
    }

    /// lease を取る。他の持ち主が生きていれば `false`
    pub async fn try_acquire_lease(
        &self,
        owner: &str,
        now: DateTime<Utc>,
        ttl: Duration,
    ) -> Result<bool, StoreError> {
        let key = self.lease_key();
        let mine = serde_json::to_vec(&CycleLease {
            owner: owner.to_string(),
            heartbeat: now,
        })?;

        // 2 周目は古い lease を消した後の再挑戦
        for _ in 0..2 {
            if self.kv.insert_new(&key, &mine).await? {
                debug!(key = %key, owner, "cycle lease acquired");
                return Ok(true);
            }
            let Some(raw) = self.kv.get(&key).await? else {
                continue;
            };
            match serde_json::from_slice::<CycleLease>(&raw) {
                Ok(held) if held.owner == owner => {
                    self.kv.set(&key, &mine).await?;
                    return Ok(true);
                }
                Ok(held) if !held.is_stale(now, ttl) => {
                    debug!(key = %key, holder = %held.owner, "cycle lease held elsewhere");
                    return Ok(false);
                }
                Ok(held) => {
                    info!(key = %key, holder = %held.owner, heartbeat = %held.heartbeat, "taking over stale cycle lease");
                }
                Err(e) => warn!(key = %key, error = %e, "unreadable cycle lease; taking over"),
            }
            self.kv.delete(&key).await?;
        }
        Ok(false)
    }

    /// heartbeat を進める。失敗はログのみ
    pub async fn renew_lease(&self, owner: &str, now: DateTime<Utc>) {
        let lease = CycleLease {
            owner: owner.to_string(),
            heartbeat: now,
        };
        let result = match serde_json::to_vec(&lease) {
            Ok(bytes) => self.kv.set(&self.lease_key(), &bytes).await,
            Err(e) => Err(e.into()),
        };
        if let Err(e) = result {
            warn!(owner, error = %e, "error renewing cycle lease");
        }
    }

    /// 自分の lease だけを消す。失敗はログのみ
    pub async fn release_lease(&self, owner: &str) {
        match self.current_lease().await {
            Ok(Some(held)) if held.owner == owner => {
                if let Err(e) = self.kv.delete(&self.lease_key()).await {
                    error!(owner, error = %e, "error releasing cycle lease");
                }
            }
            Ok(Some(held)) => {
                warn!(owner, holder = %held.owner, "cycle lease was taken over; not releasing")
            }
            Ok(None) => debug!(owner, "no cycle lease to release"),
            Err(e) => error!(owner, error = %e, "error reading cycle lease"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ImportedResource, TaskId, TaskStatus};
    use crate::impls::{FileKvStore, InMemoryKvStore};

    fn sample() -> Vec<UploadTask> {
        vec![
            UploadTask::new(
                TaskId::from_raw("task-1"),
                ImportedResource::new("a.jpg", "/img/a.jpg"),
            ),
            UploadTask::new(
                TaskId::from_raw("task-2"),
                ImportedResource::new("b.jpg", "/img/b.jpg"),
            )
            .with_status(TaskStatus::Failed, 2),
            UploadTask::new(
                TaskId::from_raw("task-3"),
                ImportedResource::new("c.jpg", "/img/c.jpg"),
            )
            .with_status(TaskStatus::Completed, 0),
        ]
    }

    #[tokio::test]
    async fn save_then_load_round_trips_in_order() {
        let store = TaskStore::new(Arc::new(InMemoryKvStore::new()));
        let tasks = sample();

        store.save(&tasks).await;
        assert_eq!(store.load().await, tasks);
    }

    #[tokio::test]
    async fn missing_record_loads_empty() {
        let store = TaskStore::new(Arc::new(InMemoryKvStore::new()));
        assert!(store.load().await.is_empty());
    }

    #[tokio::test]
    async fn corrupt_payload_loads_empty() {
        let kv = Arc::new(InMemoryKvStore::new());
        kv.seed(TASKS_STORAGE_KEY, "{not json");
        let store = TaskStore::new(kv);

        assert!(matches!(store.try_load().await, Err(StoreError::Serialization(_))));
        assert!(store.load().await.is_empty());
    }

    #[tokio::test]
    async fn clear_removes_record() {
        let store = TaskStore::new(Arc::new(InMemoryKvStore::new()));
        store.save(&sample()).await;

        store.clear().await;
        assert!(store.load().await.is_empty());
    }

    #[tokio::test]
    async fn storage_faults_are_swallowed() {
        let kv = Arc::new(InMemoryKvStore::new());
        let store = TaskStore::new(kv.clone());
        store.save(&sample()).await;

        kv.set_failing(true);
        store.save(&[]).await;
        store.clear().await;
        assert!(store.load().await.is_empty());

        // nothing was overwritten while the medium was down
        kv.set_failing(false);
        assert_eq!(store.load().await, sample());
    }

    #[tokio::test]
    async fn reads_lists_written_by_older_builds() {
        let kv = Arc::new(InMemoryKvStore::new());
        kv.seed(
            TASKS_STORAGE_KEY,
            r#"[{"id":"task_1700000000000_0.42","name":"IMG.jpg","status":"pending","retries":0,"uri":"file:///doc/IMG.jpg"}]"#,
        );
        let tasks = TaskStore::new(kv).load().await;

        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].id().as_str(), "task_1700000000000_0.42");
        assert_eq!(tasks[0].status(), TaskStatus::Pending);
    }

    #[tokio::test]
    async fn file_backed_store_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let kv = Arc::new(FileKvStore::open(dir.path()).await.unwrap());
        let store = TaskStore::with_key(kv, "tasks");

        store.save(&sample()).await;
        assert_eq!(store.load().await, sample());
        assert_eq!(store.key(), "tasks");
    }

    fn at(secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(secs, 0).unwrap()
    }

    const TTL: Duration = Duration::from_secs(60);

    #[tokio::test]
    async fn lease_excludes_other_owners_until_released() {
        let store = TaskStore::new(Arc::new(InMemoryKvStore::new()));

        assert!(store.try_acquire_lease("a", at(1_000), TTL).await.unwrap());
        assert!(!store.try_acquire_lease("b", at(1_010), TTL).await.unwrap());
        // re-acquiring our own lease just refreshes it
        assert!(store.try_acquire_lease("a", at(1_020), TTL).await.unwrap());

        // only the holder can release
        store.release_lease("b").await;
        assert_eq!(store.current_lease().await.unwrap().unwrap().owner, "a");

        store.release_lease("a").await;
        assert_eq!(store.current_lease().await.unwrap(), None);
        assert!(store.try_acquire_lease("b", at(1_030), TTL).await.unwrap());
    }

    #[tokio::test]
    async fn stale_lease_is_taken_over() {
        let store = TaskStore::new(Arc::new(InMemoryKvStore::new()));
        assert!(store.try_acquire_lease("crashed", at(1_000), TTL).await.unwrap());

        assert!(!store.try_acquire_lease("b", at(1_060), TTL).await.unwrap());
        assert!(store.try_acquire_lease("b", at(1_061), TTL).await.unwrap());
        assert_eq!(store.current_lease().await.unwrap().unwrap().owner, "b");
    }

    #[tokio::test]
    async fn renewing_keeps_a_long_cycle_alive() {
        let store = TaskStore::new(Arc::new(InMemoryKvStore::new()));
        assert!(store.try_acquire_lease("a", at(1_000), TTL).await.unwrap());

        store.renew_lease("a", at(1_050)).await;
        assert!(!store.try_acquire_lease("b", at(1_100), TTL).await.unwrap());
    }

    #[tokio::test]
    async fn corrupt_lease_is_replaced() {
        let kv = Arc::new(InMemoryKvStore::new());
        let store = TaskStore::new(kv.clone());
        kv.seed(&store.lease_key(), "garbage");

        assert!(store.try_acquire_lease("a", at(1_000), TTL).await.unwrap());
        assert_eq!(store.current_lease().await.unwrap().unwrap().owner, "a");
    }

    #[tokio::test]
    async fn lease_lives_next_to_the_task_file() {
        let dir = tempfile::tempdir().unwrap();
        let kv = Arc::new(FileKvStore::open(dir.path()).await.unwrap());
        let store = TaskStore::new(kv);

        assert!(store.try_acquire_lease("a", at(1_000), TTL).await.unwrap());
        assert!(dir.path().join("backup_tasks_cycle.json").exists());
        store.release_lease("a").await;
        assert!(!dir.path().join("backup_tasks_cycle.json").exists());
    }
}

//! FileKvStore - ファイルベースの KvStore
//!
//! # 実装詳細
//! - キーごとに `<dir>/<key>.json`
//! - 書き込みは同じディレクトリの一時ファイルに書いてから rename
//!   （途中でクラッシュしても旧内容か新内容のどちらかが残る）
//! - `insert_new` は一時ファイルを hard link で置く。既存なら link が失敗するので
//!   別プロセスとの競合でも片方だけが勝つ

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use ulid::Ulid;

use crate::domain::StoreError;
use crate::ports::KvStore;

pub struct FileKvStore {
    dir: PathBuf,
}

impl FileKvStore {
    /// `dir` を根とするストアを開く（無ければ作る）
    pub async fn open(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let dir = dir.into();
        fs::create_dir_all(&dir)
            .await
            .map_err(|e| StoreError::Storage(format!("create {}: {e}", dir.display())))?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, StoreError> {
        if key.is_empty() || key.contains(['/', '\\']) || key.starts_with('.') {
            return Err(StoreError::Storage(format!("invalid key: {key:?}")));
        }
        Ok(self.dir.join(format!("{key}.json")))
    }

    /// 書き手ごとに一意な一時ファイル
    fn temp_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!(".{key}.json.{}.tmp", Ulid::new()))
    }

    async fn write_temp(&self, key: &str, value: &[u8]) -> Result<PathBuf, StoreError> {
        let tmp = self.temp_for(key);
        fs::write(&tmp, value)
            .await
            .map_err(|e| StoreError::Storage(format!("write {}: {e}", tmp.display())))?;
        Ok(tmp)
    }
}

#[async_trait]
impl KvStore for FileKvStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let path = self.path_for(key)?;
        match fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StoreError::Storage(format!("read {}: {e}", path.display()))),
        }
    }

    async fn set(&self, key: &str, value: &[u8]) -> Result<(), StoreError> {
        let path = self.path_for(key)?;
        let tmp = self.write_temp(key, value).await?;
        fs::rename(&tmp, &path)
            .await
            .map_err(|e| StoreError::Storage(format!("rename to {}: {e}", path.display())))?;
        Ok(())
    }

    async fn insert_new(&self, key: &str, value: &[u8]) -> Result<bool, StoreError> {
        let path = self.path_for(key)?;
        let tmp = self.write_temp(key, value).await?;
        let linked = fs::hard_link(&tmp, &path).await;
        // 一時ファイル名は自分専用。残っても害はない
        let _ = fs::remove_file(&tmp).await;
        match linked {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => Ok(false),
            Err(e) => Err(StoreError::Storage(format!("link {}: {e}", path.display()))),
        }
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        let path = self.path_for(key)?;
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StoreError::Storage(format!("remove {}: {e}", path.display()))),
        }
    }
}

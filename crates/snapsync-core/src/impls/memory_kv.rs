//! InMemoryKvStore - 開発・テスト用の KvStore
//!
//! # 実装詳細
//! - `Mutex<HashMap<String, Vec<u8>>>` で保持（await を跨いでロックしない）
//! - set/insert_new/delete の回数をキーごとに数える（「書き込みゼロ」の検証用）
//! - `set_failing(true)` で全操作が StoreError を返す

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;

use crate::domain::StoreError;
use crate::ports::KvStore;

#[derive(Default)]
pub struct InMemoryKvStore {
    entries: Mutex<HashMap<String, Vec<u8>>>,
    writes: Mutex<HashMap<String, usize>>,
    failing: AtomicBool,
}

impl InMemoryKvStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 成功した書き込み（set + insert_new + delete）の総数
    pub fn writes(&self) -> usize {
        self.writes.lock().map(|w| w.values().sum()).unwrap_or(0)
    }

    /// `key` への成功した書き込みの数
    pub fn writes_to(&self, key: &str) -> usize {
        self.writes
            .lock()
            .map(|w| w.get(key).copied().unwrap_or(0))
            .unwrap_or(0)
    }

    /// 壊れたストレージを模擬する
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// 書き込みとして数えずに値を置く（fixture 用）
    pub fn seed(&self, key: &str, value: impl Into<Vec<u8>>) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.insert(key.to_string(), value.into());
        }
    }

    fn check(&self) -> Result<(), StoreError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(StoreError::Storage("storage unavailable".to_string()));
        }
        Ok(())
    }

    fn entries(&self) -> Result<MutexGuard<'_, HashMap<String, Vec<u8>>>, StoreError> {
        self.entries
            .lock()
            .map_err(|e| StoreError::Storage(format!("lock poisoned: {e}")))
    }

    fn count_write(&self, key: &str) {
        if let Ok(mut writes) = self.writes.lock() {
            *writes.entry(key.to_string()).or_default() += 1;
        }
    }
}

#[async_trait]
impl KvStore for InMemoryKvStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        self.check()?;
        Ok(self.entries()?.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &[u8]) -> Result<(), StoreError> {
        self.check()?;
        self.entries()?.insert(key.to_string(), value.to_vec());
        self.count_write(key);
        Ok(())
    }

    async fn insert_new(&self, key: &str, value: &[u8]) -> Result<bool, StoreError> {
        self.check()?;
        let inserted = {
            let mut entries = self.entries()?;
            if entries.contains_key(key) {
                false
            } else {
                entries.insert(key.to_string(), value.to_vec());
                true
            }
        };
        if inserted {
            self.count_write(key);
        }
        Ok(inserted)
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.check()?;
        self.entries()?.remove(key);
        self.count_write(key);
        Ok(())
    }
}

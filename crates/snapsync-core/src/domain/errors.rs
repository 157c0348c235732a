//! Errors - エラー型と分類
//!
//! アップロードの失敗はエラーではなく、タスクの `failed` として記録する。
//! ここの型はアップロードの周辺で起きるものを扱う。

use std::path::PathBuf;

use thiserror::Error;

use super::{TaskId, TaskStatus};

/// 永続化されたタスク一覧に対する失敗
///
/// `TaskStore` の中で飲み込まれ、load/save/clear の呼び出し側には出てこない
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("storage error: {0}")]
    Storage(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// 処理サイクルが走らなかった理由
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum CycleError {
    #[error("offline: connect to the internet first")]
    Offline,

    #[error("no pending tasks: all images are already backed up")]
    NothingToDo,

    #[error("a processing cycle is already running")]
    AlreadyRunning,
}

/// 不正な状態遷移
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("illegal transition for {task_id}: {from} -> {to}")]
pub struct TransitionError {
    pub task_id: TaskId,
    pub from: TaskStatus,
    pub to: TaskStatus,
}

/// 選択リソース 1 件をアプリ領域へコピーできなかった
#[derive(Debug, Error)]
pub enum ImportError {
    #[error("source has no file name: {0}")]
    NoFileName(PathBuf),

    #[error("failed to copy {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// ホストのバックグラウンドスケジューラが返した失敗
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchedulerError {
    #[error("no job defined with name={0}")]
    UnknownJob(String),

    #[error("job is not registered: {0}")]
    NotRegistered(String),

    #[error("{0}")]
    Other(String),
}

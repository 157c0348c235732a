//! ドメインの識別子
//!
//! # ULID ベースの TaskId
//! 新しい ID は ULID（48bit のミリ秒 timestamp + 80bit の乱数）から作るので、
//! 調整なしでセッション内一意になり、作成順に並ぶ。
//!
//! 保存済みの一覧には古いビルドが書いた任意の文字列 ID が混ざりうるので、
//! `TaskId` はパース済みの `Ulid` ではなく文字列を保持する。

use serde::{Deserialize, Serialize};
use std::fmt;
use ulid::Ulid;

const TASK_PREFIX: &str = "task-";

/// アップロードタスクの ID
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(String);

impl TaskId {
    /// ULID から ID を作る（`task-<ULID>`）
    pub fn from_ulid(ulid: Ulid) -> Self {
        Self(format!("{TASK_PREFIX}{ulid}"))
    }

    /// 外で作られた ID（ストレージから読んだものなど）を包む
    pub fn from_raw(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// [`TaskId::from_ulid`] で作った ID なら埋め込まれた ULID
    pub fn as_ulid(&self) -> Option<Ulid> {
        self.0
            .strip_prefix(TASK_PREFIX)
            .and_then(|s| Ulid::from_string(s).ok())
    }
}

impl From<Ulid> for TaskId {
    fn from(ulid: Ulid) -> Self {
        Self::from_ulid(ulid)
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ulid_ids_render_with_prefix() {
        let ulid = Ulid::new();
        let id = TaskId::from_ulid(ulid);

        assert!(id.to_string().starts_with("task-"));
        assert_eq!(id.as_ulid(), Some(ulid));
    }

    #[test]
    fn raw_ids_are_accepted_as_is() {
        // older builds wrote `task_<millis>_<random>`
        let id = TaskId::from_raw("task_1700000000000_0.123");
        assert_eq!(id.as_str(), "task_1700000000000_0.123");
        assert_eq!(id.as_ulid(), None);
    }

    #[test]
    fn ids_serialize_as_plain_strings() {
        let id = TaskId::from_raw("task-abc");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"task-abc\"");

        let back: TaskId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn ulid_ids_are_sortable() {
        let id1 = TaskId::from_ulid(Ulid::new());
        std::thread::sleep(std::time::Duration::from_millis(2));
        let id2 = TaskId::from_ulid(Ulid::new());

        assert!(id1 < id2);
    }
}

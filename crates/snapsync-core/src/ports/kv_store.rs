//! KvStore port - 永続化されたキー・バリューストア
//!
//! タスク一覧は 1 つのキーに置かれる。JSON 化と「失敗しても致命的にしない」
//! 方針は `TaskStore` がこの port の上に載せる。
//!
//! # 実装
//! - `FileKvStore`: キーごとに 1 ファイル（本番用）
//! - `InMemoryKvStore`: テスト・一時利用

use async_trait::async_trait;

use crate::domain::StoreError;

/// 永続キー・バリューストア
///
/// 呼び出し側は必ず await してから次へ進む（fire-and-forget の書き込みはない）
#[async_trait]
pub trait KvStore: Send + Sync {
    /// `key` の値。未書き込み・削除済みなら `None`
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError>;

    /// `key` の値を丸ごと置き換える
    async fn set(&self, key: &str, value: &[u8]) -> Result<(), StoreError>;

    /// `key` が無いときだけ書き込む。書けたら `true`
    ///
    /// 同じストアを共有する他の書き手（別プロセス含む）に対してアトミック
    async fn insert_new(&self, key: &str, value: &[u8]) -> Result<bool, StoreError>;

    /// `key` を削除する。無いキーの削除はエラーではない
    async fn delete(&self, key: &str) -> Result<(), StoreError>;
}

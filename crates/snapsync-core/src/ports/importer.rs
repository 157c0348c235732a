//! ResourceImporter port - 選択された画像をアプリ専用領域へコピー

use std::path::Path;

use async_trait::async_trait;

use crate::domain::{ImportError, ImportedResource};

/// ユーザーが選んだソースを消えないローカルコピーにする
///
/// 返す `uri` は `source` の寿命と無関係に、タスクがアップロード
/// されるかクリアされるまで有効でなければならない
#[async_trait]
pub trait ResourceImporter: Send + Sync {
    async fn import(&self, source: &Path) -> Result<ImportedResource, ImportError>;
}

//! FileImporter - 選択された画像をアプリ専用ディレクトリへコピー
//!
//! コピー先のファイル名は元のまま。同じファイルを 2 回選ぶと前のコピーを上書きする。

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use tracing::debug;

use crate::domain::{ImportError, ImportedResource};
use crate::ports::ResourceImporter;

pub struct FileImporter {
    dest_dir: PathBuf,
}

impl FileImporter {
    pub fn new(dest_dir: impl Into<PathBuf>) -> Self {
        Self {
            dest_dir: dest_dir.into(),
        }
    }
}

#[async_trait]
impl ResourceImporter for FileImporter {
    async fn import(&self, source: &Path) -> Result<ImportedResource, ImportError> {
        let name = source
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .filter(|n| !n.is_empty())
            .ok_or_else(|| ImportError::NoFileName(source.to_path_buf()))?;

        fs::create_dir_all(&self.dest_dir)
            .await
            .map_err(|e| ImportError::Io {
                path: self.dest_dir.clone(),
                source: e,
            })?;

        let dest = self.dest_dir.join(&name);
        fs::copy(source, &dest).await.map_err(|e| ImportError::Io {
            path: source.to_path_buf(),
            source: e,
        })?;

        debug!(source = %source.display(), dest = %dest.display(), "imported resource");
        Ok(ImportedResource::new(name, dest.to_string_lossy().into_owned()))
    }
}

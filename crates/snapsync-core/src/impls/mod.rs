//! Impls - ports の実装
//!
//! # 含まれる実装
//! - **FileKvStore** / **InMemoryKvStore**: task list の保存先
//! - **HttpUploadGateway**: reqwest による multipart アップロード
//! - **FileImporter**: アプリ専用ディレクトリへのコピー
//! - **ConnectivityFlag**: ホストが更新するネットワーク状態
//! - **TokioScheduler**: OS スケジューラの代わりに tokio で定期実行

pub mod connectivity;
pub mod file_importer;
pub mod file_kv;
pub mod http_gateway;
pub mod memory_kv;
pub mod tokio_scheduler;

pub use self::connectivity::ConnectivityFlag;
pub use self::file_importer::FileImporter;
pub use self::file_kv::FileKvStore;
pub use self::http_gateway::HttpUploadGateway;
pub use self::memory_kv::InMemoryKvStore;
pub use self::tokio_scheduler::TokioScheduler;

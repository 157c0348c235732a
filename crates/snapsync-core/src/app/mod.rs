//! App - アプリケーション層
//!
//! このモジュールは、ports と engine を組み合わせてホスト側の振る舞いを実装します。
//!
//! # 主要コンポーネント
//! - **AppBuilder**: アプリケーションの構築とワイヤリング
//! - **ForegroundController**: ライフサイクル・接続状態の変化に反応
//! - **BackgroundTrigger / BackupJob**: 定期ジョブの登録と本体
//! - **ReadinessGate**: 初期化完了の通知
//! - **StatusView**: ダッシュボード向けの集計

pub mod background;
pub mod builder;
pub mod config;
pub mod foreground;
pub mod readiness;
pub mod status;

// 主要な型を再エクスポート
pub use self::background::{BackgroundTrigger, BackupJob};
pub use self::builder::{App, AppBuilder, BuildError};
pub use self::config::{ConfigError, SyncConfig};
pub use self::foreground::{AddPhotosReport, Dispatch, ForegroundController, SkippedResource};
pub use self::readiness::ReadinessGate;
pub use self::status::StatusView;

//! snapsync-core
//!
//! オフラインファーストの写真バックアップ。選択した画像はアップロードタスクになり、
//! 永続化され、同時に 1 本しか走らないエンジンが foreground または定期
//! バックグラウンド job から順に処理する。
//!
//! # モジュール構成
//! - **domain**: ドメインモデル（ids, state, task, counts, errors）
//! - **ports**: 抽象化レイヤー（KvStore, UploadGateway, Connectivity, BackgroundScheduler, など）
//! - **store**: タスク一覧の永続化
//! - **engine**: TaskQueue（追加・処理サイクル・クリア・復旧）
//! - **app**: ホスト連携（builder, foreground, background, readiness, status, config）
//! - **impls**: 実装（ファイル KV, HTTP アップロード, tokio スケジューラ, など）

pub mod app;
pub mod domain;
pub mod engine;
pub mod impls;
pub mod ports;
pub mod store;

#[cfg(test)]
mod testing;

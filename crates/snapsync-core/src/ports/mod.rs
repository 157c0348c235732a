//! Ports - 抽象化レイヤー
//!
//! ここの trait はどれも、エンジンの外にあるもの（ストレージ、ネットワーク、
//! OS のスケジューラ、ファイルピッカー）との境界。

pub mod clock;
pub mod connectivity;
pub mod id_generator;
pub mod importer;
pub mod kv_store;
pub mod scheduler;
pub mod upload_gateway;

pub use self::clock::{Clock, FixedClock, SystemClock};
pub use self::connectivity::Connectivity;
pub use self::id_generator::{IdGenerator, UlidGenerator};
pub use self::importer::ResourceImporter;
pub use self::kv_store::KvStore;
pub use self::scheduler::{BackgroundJob, BackgroundScheduler, JobResult, ScheduleOptions};
pub use self::upload_gateway::UploadGateway;

//! Domain - ドメインモデル（ID、アップロードタスク、状態機械、エラー）

pub mod counts;
pub mod errors;
pub mod ids;
pub mod state;
pub mod task;

pub use counts::TaskCounts;
pub use errors::{CycleError, ImportError, SchedulerError, StoreError, TransitionError};
pub use ids::TaskId;
pub use state::{AppLifecycle, TaskStatus};
pub use task::{ImportedResource, UploadTask};

pub mod config;
pub mod extractor;
pub mod models;
pub mod monitor;
pub mod plugins;
pub mod reconciler;
pub mod scheduler;
pub mod scraper;
pub mod sources;
pub mod store;
pub mod telemetry;
pub mod utils;

// Re-export commonly used types
pub use config::AppConfig;
pub use monitor::{AssetMonitor, CheckReport};
pub use scheduler::{AssetScheduler, SchedulerHandle, TriggerOutcome};
pub use utils::error::{AppError, Result};

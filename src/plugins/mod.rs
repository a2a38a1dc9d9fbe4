pub mod manager;
pub mod notifiers;
pub mod traits;

pub use manager::{DispatchSummary, PluginManager};
pub use traits::{NotificationEvent, NotificationResult, NotifierPlugin};

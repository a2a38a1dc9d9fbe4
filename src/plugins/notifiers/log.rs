use async_trait::async_trait;

use crate::plugins::traits::{NotificationEvent, NotificationResult, NotifierPlugin};
use crate::utils::error::Result;

/// Writes notifications to the log under the configured application id.
pub struct LogNotifier {
    app_id: String,
}

impl LogNotifier {
    pub fn new(app_id: &str) -> Self {
        Self {
            app_id: app_id.to_string(),
        }
    }
}

#[async_trait]
impl NotifierPlugin for LogNotifier {
    fn name(&self) -> &str {
        "Log Notifier"
    }

    fn plugin_type(&self) -> &str {
        "log"
    }

    fn description(&self) -> &str {
        "Emits notifications as structured log events"
    }

    async fn notify(&self, event: &NotificationEvent) -> Result<NotificationResult> {
        tracing::info!(
            app_id = %self.app_id,
            category = %event.category,
            count = event.assets.len(),
            "{}: {}",
            event.title,
            event.body.replace('\n', ", ")
        );
        Ok(NotificationResult::delivered(None))
    }
}

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::models::{Asset, Category};
use crate::utils::error::Result;

/// One notification per non-empty category per check.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationEvent {
    pub category: Category,
    pub title: String,
    pub body: String,
    pub assets: Vec<Asset>,
}

impl NotificationEvent {
    /// Builds the title and body for a group of newly found assets.
    pub fn for_assets(category: Category, assets: &[Asset]) -> Self {
        let title = match category {
            Category::Free => "🎁 New FREE Assets!",
            Category::Latest => "New Assets Found!",
        }
        .to_string();

        let body = match assets.len() {
            1..=3 => assets
                .iter()
                .map(|a| a.title.as_str())
                .collect::<Vec<_>>()
                .join("\n"),
            n => format!("{} new assets", n),
        };

        Self {
            category,
            title,
            body,
            assets: assets.to_vec(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationResult {
    pub success: bool,
    pub message_id: Option<String>,
    pub error: Option<String>,
}

impl NotificationResult {
    pub fn delivered(message_id: Option<String>) -> Self {
        Self {
            success: true,
            message_id,
            error: None,
        }
    }
}

/// Trait for implementing notification channels (log, Discord, etc.)
#[async_trait]
pub trait NotifierPlugin: Send + Sync {
    /// Plugin metadata
    fn name(&self) -> &str;
    fn plugin_type(&self) -> &str;
    fn description(&self) -> &str;

    async fn notify(&self, event: &NotificationEvent) -> Result<NotificationResult>;

    async fn shutdown(&self) -> Result<()> {
        Ok(())
    }
}

use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use std::time::Duration;

use crate::config::DiscordConfig;
use crate::models::Category;
use crate::plugins::traits::{NotificationEvent, NotificationResult, NotifierPlugin};
use crate::utils::error::{AppError, Result};

/// Assets linked in one embed; the rest are summarized.
const MAX_LINKED_ASSETS: usize = 10;

pub struct DiscordNotifier {
    client: Client,
    webhook_url: String,
    username: String,
    avatar_url: Option<String>,
}

impl DiscordNotifier {
    pub fn from_config(config: &DiscordConfig) -> Result<Self> {
        let webhook_url = config
            .webhook_url
            .clone()
            .ok_or_else(|| AppError::Validation("Missing Discord webhook_url".to_string()))?;

        let client = Client::builder().timeout(Duration::from_secs(15)).build()?;

        Ok(Self {
            client,
            webhook_url,
            username: config.username.clone(),
            avatar_url: config.avatar_url.clone(),
        })
    }

    fn get_embed_color(&self, category: Category) -> u32 {
        match category {
            Category::Free => 0x2ecc71,   // Green for giveaways
            Category::Latest => 0x0099ff, // Blue for news
        }
    }

    fn create_embed(&self, event: &NotificationEvent) -> serde_json::Value {
        let mut lines: Vec<String> = event
            .assets
            .iter()
            .take(MAX_LINKED_ASSETS)
            .map(|asset| {
                let mut line = format!("[{}]({})", asset.display_title(), asset.url);
                if let Some(expires) = &asset.expires_at {
                    line.push_str(&format!(" ({})", expires));
                }
                line
            })
            .collect();

        if event.assets.len() > MAX_LINKED_ASSETS {
            lines.push(format!("...and {} more", event.assets.len() - MAX_LINKED_ASSETS));
        }

        json!({
            "title": event.title,
            "description": lines.join("\n"),
            "color": self.get_embed_color(event.category),
            "timestamp": chrono::Utc::now().to_rfc3339(),
            "footer": { "text": "Asset Monitor" }
        })
    }

    fn create_webhook_payload(&self, event: &NotificationEvent) -> serde_json::Value {
        let mut payload = json!({
            "username": self.username,
            "content": event.body,
            "embeds": [self.create_embed(event)]
        });

        if let Some(avatar_url) = &self.avatar_url {
            payload["avatar_url"] = json!(avatar_url);
        }

        payload
    }
}

#[async_trait]
impl NotifierPlugin for DiscordNotifier {
    fn name(&self) -> &str {
        "Discord Notifier"
    }

    fn plugin_type(&self) -> &str {
        "discord"
    }

    fn description(&self) -> &str {
        "Posts new assets to a Discord channel through a webhook"
    }

    async fn notify(&self, event: &NotificationEvent) -> Result<NotificationResult> {
        let payload = self.create_webhook_payload(event);

        let response = self
            .client
            .post(&self.webhook_url)
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::Notifier {
                notifier: "discord".to_string(),
                message: format!("webhook returned {}", status.as_u16()),
            });
        }

        Ok(NotificationResult::delivered(Some(format!(
            "discord-{}",
            chrono::Utc::now().timestamp()
        ))))
    }
}

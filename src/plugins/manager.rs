use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use super::notifiers::{DiscordNotifier, LogNotifier};
use super::traits::{NotificationEvent, NotifierPlugin};
use crate::config::NotificationsConfig;
use crate::utils::error::Result;

pub type NotifierPluginBox = Box<dyn NotifierPlugin>;

/// Outcome of fanning one event out to every registered notifier.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchSummary {
    pub sent: usize,
    pub failed: usize,
}

impl DispatchSummary {
    pub fn delivered(&self) -> bool {
        self.sent > 0
    }
}

#[derive(Clone, Default)]
pub struct PluginManager {
    notifiers: Arc<RwLock<HashMap<String, NotifierPluginBox>>>,
}

impl PluginManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a notifier plugin, replacing any plugin of the same type
    pub async fn register_notifier(&self, plugin: NotifierPluginBox) {
        let plugin_type = plugin.plugin_type().to_string();
        tracing::debug!(notifier = %plugin_type, "Registered notifier: {}", plugin.name());

        let mut notifiers = self.notifiers.write().await;
        notifiers.insert(plugin_type, plugin);
    }

    pub async fn has_notifier(&self, plugin_type: &str) -> bool {
        let notifiers = self.notifiers.read().await;
        notifiers.contains_key(plugin_type)
    }

    pub async fn list_notifier_types(&self) -> Vec<String> {
        let notifiers = self.notifiers.read().await;
        let mut types: Vec<String> = notifiers.keys().cloned().collect();
        types.sort();
        types
    }

    /// Register the notifiers enabled in configuration
    pub async fn initialize_from_config(&self, config: &NotificationsConfig) -> Result<()> {
        if config.log.enabled {
            self.register_notifier(Box::new(LogNotifier::new(&config.log.app_id)))
                .await;
        }

        if config.discord.webhook_url.is_some() {
            self.register_notifier(Box::new(DiscordNotifier::from_config(&config.discord)?))
                .await;
        }

        Ok(())
    }

    /// Send an event through every notifier. A failing notifier is logged and
    /// does not stop the rest.
    pub async fn dispatch(&self, event: &NotificationEvent) -> DispatchSummary {
        let notifiers = self.notifiers.read().await;
        let mut summary = DispatchSummary::default();

        for (plugin_type, notifier) in notifiers.iter() {
            match notifier.notify(event).await {
                Ok(result) if result.success => {
                    summary.sent += 1;
                }
                Ok(result) => {
                    summary.failed += 1;
                    tracing::warn!(
                        notifier = %plugin_type,
                        "Notifier reported failure: {}",
                        result.error.unwrap_or_default()
                    );
                }
                Err(e) => {
                    summary.failed += 1;
                    tracing::warn!(notifier = %plugin_type, "Notifier failed: {}", e);
                }
            }
        }

        summary
    }

    /// Shutdown all plugins
    pub async fn shutdown(&self) {
        let mut notifiers = self.notifiers.write().await;
        for (_, plugin) in notifiers.drain() {
            if let Err(e) = plugin.shutdown().await {
                tracing::warn!("Error shutting down notifier plugin: {}", e);
            }
        }
    }
}

// Integration tests for Asset Monitor
// These tests drive the public API the way the binary does

pub mod check_cycle_tests;
pub mod fetcher_tests;
pub mod notifier_tests;

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};

use asset_monitor::{
    AppConfig, AppError, AssetMonitor, Result,
    config::SchedulerConfig,
    extractor::{ExtractionRule, TitleFallback},
    models::Category,
    plugins::{NotificationEvent, NotificationResult, NotifierPlugin, PluginManager},
    scraper::PageFetcher,
    sources::{Source, SourceDefinition, SourceKind},
    store::StateStore,
};

pub const FAB_FREE_URL: &str = "https://www.fab.com/limited-time-free";

/// Serves canned pages; unknown URLs answer 404.
#[derive(Clone, Default)]
pub struct FakeSite {
    pages: Arc<Mutex<HashMap<String, String>>>,
    requests: Arc<Mutex<Vec<String>>>,
}

impl FakeSite {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn serve(&self, url: &str, body: &str) {
        self.pages
            .lock()
            .unwrap()
            .insert(url.to_string(), body.to_string());
    }

    pub fn take_down(&self, url: &str) {
        self.pages.lock().unwrap().remove(url);
    }

    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl PageFetcher for FakeSite {
    async fn fetch(&self, url: &str) -> Result<String> {
        self.requests.lock().unwrap().push(url.to_string());
        self.pages
            .lock()
            .unwrap()
            .get(url)
            .cloned()
            .ok_or_else(|| AppError::Status {
                url: url.to_string(),
                status: 404,
            })
    }
}

/// Keeps every event it is handed.
#[derive(Clone, Default)]
pub struct RecordingNotifier {
    events: Arc<Mutex<Vec<NotificationEvent>>>,
}

impl RecordingNotifier {
    pub fn events(&self) -> Vec<NotificationEvent> {
        self.events.lock().unwrap().clone()
    }
}

#[async_trait]
impl NotifierPlugin for RecordingNotifier {
    fn name(&self) -> &str {
        "Recording Notifier"
    }

    fn plugin_type(&self) -> &str {
        "recording"
    }

    fn description(&self) -> &str {
        "Records events for assertions"
    }

    async fn notify(&self, event: &NotificationEvent) -> Result<NotificationResult> {
        self.events.lock().unwrap().push(event.clone());
        Ok(NotificationResult::delivered(None))
    }
}

/// A single-page source listing Fab giveaways.
pub fn fab_listing() -> SourceDefinition {
    SourceDefinition {
        name: "fab-free".to_string(),
        url: FAB_FREE_URL.to_string(),
        origin: "https://www.fab.com".to_string(),
        enabled: true,
        kind: SourceKind::Listing {
            rule: ExtractionRule {
                link_pattern: "/listings/".to_string(),
                exclude_pattern: None,
                category: Category::Free,
                price_label: "FREE".to_string(),
                min_title_len: 3,
                max_title_len: 70,
                fallbacks: vec![TitleFallback::ImageAlt],
                extract_expiry: true,
            },
        },
    }
}

pub fn fab_page(listings: &[(&str, &str)]) -> String {
    let links: String = listings
        .iter()
        .map(|(slug, title)| format!(r#"<li><a href="/listings/{}">{}</a></li>"#, slug, title))
        .collect();
    format!(
        "<html><body><p>Claim before March 3, 2026</p><ul>{}</ul></body></html>",
        links
    )
}

/// Defaults pointed at a temporary state directory.
pub fn test_config(data_dir: &Path) -> AppConfig {
    let mut config = AppConfig::default();
    config.storage.data_dir = Some(data_dir.to_path_buf());
    config.fetcher.user_agent = "AssetMonitor-Test/1.0".to_string();
    config.fetcher.request_timeout = 5;
    config.notifications.log.enabled = false;
    config.scheduler = SchedulerConfig {
        interval_secs: 3600,
        warmup: false,
        warmup_delay_secs: 0,
    };
    config
}

pub async fn build_monitor(
    site: &FakeSite,
    definitions: &[SourceDefinition],
    store: Arc<dyn StateStore>,
    notifier: &RecordingNotifier,
) -> AssetMonitor {
    let notifiers = PluginManager::new();
    notifiers.register_notifier(Box::new(notifier.clone())).await;

    let sources = Source::from_definitions(definitions).unwrap();
    AssetMonitor::new(Arc::new(site.clone()), sources, store, notifiers).await
}

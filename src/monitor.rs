use futures::future::join_all;
use metrics::{counter, gauge, histogram};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::Instrument;
use uuid::Uuid;

use crate::config::AppConfig;
use crate::models::{AppData, Asset, AssetQuery, Category};
use crate::plugins::{NotificationEvent, PluginManager};
use crate::reconciler::{NewAssets, Reconciler};
use crate::scraper::{HttpFetcher, PageFetcher};
use crate::sources::Source;
use crate::store::{JsonFileStore, StateStore};
use crate::utils::error::Result;

/// Summary of one check cycle.
#[derive(Debug, Clone, Serialize)]
pub struct CheckReport {
    pub check_id: Uuid,
    pub sources_checked: usize,
    pub sources_failed: usize,
    pub new_free: usize,
    pub new_latest: usize,
    pub notifications: usize,
    pub total_assets: usize,
    pub duration_ms: u64,
    #[serde(skip)]
    pub new_assets: NewAssets,
}

impl CheckReport {
    pub fn new_total(&self) -> usize {
        self.new_free + self.new_latest
    }
}

/// Application state shared by the command surface and the scheduler.
pub struct AssetMonitor {
    fetcher: Arc<dyn PageFetcher>,
    sources: Vec<Source>,
    reconciler: Reconciler,
    notifiers: PluginManager,
    data: Mutex<AppData>,
}

impl AssetMonitor {
    /// Loads persisted history from `store`.
    pub async fn new(
        fetcher: Arc<dyn PageFetcher>,
        sources: Vec<Source>,
        store: Arc<dyn StateStore>,
        notifiers: PluginManager,
    ) -> Self {
        let data = store.load().await;
        gauge!("asset_monitor_tracked_assets").set(data.len() as f64);

        Self {
            fetcher,
            sources,
            reconciler: Reconciler::new(store),
            notifiers,
            data: Mutex::new(data),
        }
    }

    pub async fn from_config(config: &AppConfig) -> Result<Self> {
        let store = Arc::new(JsonFileStore::new(config.storage.state_file()));
        Self::with_store(config, store).await
    }

    /// Same wiring as [`AssetMonitor::from_config`] with a caller-chosen store.
    pub async fn with_store(config: &AppConfig, store: Arc<dyn StateStore>) -> Result<Self> {
        let fetcher = Arc::new(HttpFetcher::new(&config.fetcher)?);
        let sources = Source::from_definitions(&config.sources)?;

        let notifiers = PluginManager::new();
        notifiers.initialize_from_config(&config.notifications).await?;

        Ok(Self::new(fetcher, sources, store, notifiers).await)
    }

    pub fn sources(&self) -> &[Source] {
        &self.sources
    }

    pub fn notifiers(&self) -> &PluginManager {
        &self.notifiers
    }

    /// Run one full cycle: scrape, reconcile, persist, notify.
    pub async fn run_check(&self) -> CheckReport {
        let check_id = Uuid::new_v4();
        let span = tracing::info_span!("check", %check_id);
        self.check_cycle(check_id).instrument(span).await
    }

    async fn check_cycle(&self, check_id: Uuid) -> CheckReport {
        let start_time = Instant::now();
        tracing::info!(sources = self.sources.len(), "Checking for new assets");

        let results = join_all(self.sources.iter().map(|source| async move {
            (source.name(), source.collect(self.fetcher.as_ref()).await)
        }))
        .await;

        let mut candidates = Vec::new();
        let mut sources_failed = 0;
        for (name, result) in results {
            match result {
                Ok(found) => candidates.extend(found),
                Err(e) => {
                    sources_failed += 1;
                    counter!("asset_monitor_source_failures_total").increment(1);
                    tracing::warn!(source = name, "Source check failed: {}", e);
                }
            }
        }

        let (new_assets, total_assets) = {
            let mut data = self.data.lock().await;
            let new_assets = self.reconciler.reconcile(&mut data, candidates).await;
            (new_assets, data.len())
        };

        let mut notifications = 0;
        for (category, assets) in new_assets.groups() {
            counter!("asset_monitor_new_assets_total", "category" => category.as_str())
                .increment(assets.len() as u64);

            let event = NotificationEvent::for_assets(category, assets);
            let summary = self.notifiers.dispatch(&event).await;
            notifications += 1;
            tracing::debug!(
                %category,
                sent = summary.sent,
                failed = summary.failed,
                "Dispatched notification"
            );
        }

        let elapsed = start_time.elapsed();
        counter!("asset_monitor_checks_total").increment(1);
        histogram!("asset_monitor_check_duration_ms").record(elapsed.as_millis() as f64);
        gauge!("asset_monitor_tracked_assets").set(total_assets as f64);

        let report = CheckReport {
            check_id,
            sources_checked: self.sources.len(),
            sources_failed,
            new_free: new_assets.count(Category::Free),
            new_latest: new_assets.count(Category::Latest),
            notifications,
            total_assets,
            duration_ms: elapsed.as_millis() as u64,
            new_assets,
        };

        tracing::info!(
            new_free = report.new_free,
            new_latest = report.new_latest,
            failed = report.sources_failed,
            total = report.total_assets,
            duration_ms = report.duration_ms,
            "Check complete"
        );
        report
    }

    /// Forget every seen asset. No notification is raised.
    pub async fn clear_history(&self) -> Result<()> {
        let mut data = self.data.lock().await;
        data.clear();
        self.reconciler.store().save(&data).await?;
        gauge!("asset_monitor_tracked_assets").set(0.0);
        tracing::info!("Cleared asset history");
        Ok(())
    }

    /// Flush current state; used on shutdown.
    pub async fn persist(&self) -> bool {
        let data = self.data.lock().await;
        self.reconciler.persist(&data).await
    }

    pub async fn snapshot(&self) -> AppData {
        self.data.lock().await.clone()
    }

    /// Assets of one category, most recently found first.
    pub async fn sorted_assets(&self, category: Category) -> Vec<Asset> {
        self.data.lock().await.sorted(category)
    }

    pub async fn query(&self, query: &AssetQuery) -> Vec<Asset> {
        self.data.lock().await.query(query)
    }

    pub async fn status_summary(&self) -> String {
        self.data.lock().await.status_summary()
    }
}

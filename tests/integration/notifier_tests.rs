use super::*;
use asset_monitor::config::{DiscordConfig, NotificationsConfig};
use asset_monitor::store::MemoryStore;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn discord_config(server: &MockServer) -> NotificationsConfig {
    let mut config = NotificationsConfig::default();
    config.discord = DiscordConfig {
        webhook_url: Some(format!("{}/api/webhooks/1/token", server.uri())),
        ..DiscordConfig::default()
    };
    config
}

#[tokio::test]
async fn test_discord_webhook_receives_new_assets() -> anyhow::Result<()> {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/webhooks/1/token"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let notifiers = PluginManager::new();
    notifiers.initialize_from_config(&discord_config(&server)).await?;
    assert_eq!(notifiers.list_notifier_types().await, vec!["discord", "log"]);

    let site = FakeSite::new();
    site.serve(FAB_FREE_URL, &fab_page(&[("aaa", "Medieval Village Kit")]));
    let sources = Source::from_definitions(&[fab_listing()])?;
    let monitor = AssetMonitor::new(
        Arc::new(site),
        sources,
        Arc::new(MemoryStore::new()),
        notifiers,
    )
    .await;

    let report = monitor.run_check().await;
    assert_eq!(report.notifications, 1);

    let requests = server.received_requests().await.unwrap_or_default();
    assert_eq!(requests.len(), 1);
    let payload: serde_json::Value = serde_json::from_slice(&requests[0].body)?;
    assert_eq!(payload["username"], "Asset Monitor");
    assert_eq!(payload["content"], "Medieval Village Kit");
    assert_eq!(payload["embeds"][0]["title"], "🎁 New FREE Assets!");
    assert!(payload["embeds"][0]["description"]
        .as_str()
        .unwrap_or_default()
        .contains("https://www.fab.com/listings/aaa"));
    Ok(())
}

#[tokio::test]
async fn test_rejected_webhook_does_not_fail_the_check() -> anyhow::Result<()> {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let notifiers = PluginManager::new();
    notifiers.initialize_from_config(&discord_config(&server)).await?;
    let recorder = RecordingNotifier::default();
    notifiers.register_notifier(Box::new(recorder.clone())).await;

    let event = NotificationEvent::for_assets(Category::Latest, &[]);
    let summary = notifiers.dispatch(&event).await;
    assert_eq!(summary.failed, 1);
    // log and recording notifiers
    assert_eq!(summary.sent, 2);
    assert_eq!(recorder.events().len(), 1);
    Ok(())
}

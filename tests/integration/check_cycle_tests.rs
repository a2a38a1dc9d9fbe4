use super::*;
use asset_monitor::models::{AppData, AssetQuery};
use asset_monitor::store::{JsonFileStore, MemoryStore};

#[tokio::test]
async fn test_single_asset_scenario() -> anyhow::Result<()> {
    let site = FakeSite::new();
    site.serve(FAB_FREE_URL, &fab_page(&[("aaa", "Medieval Village Kit")]));
    let notifier = RecordingNotifier::default();
    let monitor = build_monitor(&site, &[fab_listing()], Arc::new(MemoryStore::new()), &notifier).await;

    let first = monitor.run_check().await;
    assert_eq!(first.new_free, 1);
    assert_eq!(first.notifications, 1);

    let events = notifier.events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].title, "🎁 New FREE Assets!");
    assert_eq!(events[0].body, "Medieval Village Kit");
    assert_eq!(
        events[0].assets[0].expires_at.as_deref(),
        Some("Free until March 3, 2026")
    );

    let second = monitor.run_check().await;
    assert_eq!(second.new_total(), 0);
    assert_eq!(second.notifications, 0);
    assert_eq!(notifier.events().len(), 1);
    Ok(())
}

#[tokio::test]
async fn test_notification_body_counts_large_batches() -> anyhow::Result<()> {
    let site = FakeSite::new();
    let listings: Vec<(String, String)> = (1..=5)
        .map(|i| (format!("pack-{}", i), format!("Pack Number {}", i)))
        .collect();
    let borrowed: Vec<(&str, &str)> = listings
        .iter()
        .map(|(slug, title)| (slug.as_str(), title.as_str()))
        .collect();
    site.serve(FAB_FREE_URL, &fab_page(&borrowed));

    let notifier = RecordingNotifier::default();
    let monitor = build_monitor(&site, &[fab_listing()], Arc::new(MemoryStore::new()), &notifier).await;
    monitor.run_check().await;

    let events = notifier.events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].body, "5 new assets");
    Ok(())
}

#[tokio::test]
async fn test_first_seen_survives_later_cycles() -> anyhow::Result<()> {
    let site = FakeSite::new();
    site.serve(FAB_FREE_URL, &fab_page(&[("aaa", "Medieval Village Kit")]));
    let notifier = RecordingNotifier::default();
    let monitor = build_monitor(&site, &[fab_listing()], Arc::new(MemoryStore::new()), &notifier).await;

    monitor.run_check().await;
    let original = monitor.snapshot().await.seen_assets["https://www.fab.com/listings/aaa"].clone();

    // Same URL, new title: the first record is kept.
    site.serve(
        FAB_FREE_URL,
        &fab_page(&[("aaa", "Medieval Village Kit v2"), ("bbb", "Castle Walls")]),
    );
    let report = monitor.run_check().await;
    assert_eq!(report.new_free, 1);

    let data = monitor.snapshot().await;
    assert_eq!(data.seen_assets["https://www.fab.com/listings/aaa"], original);

    let newest = monitor.sorted_assets(Category::Free).await;
    assert_eq!(newest[0].title, "Castle Walls");
    assert_eq!(newest[1].title, "Medieval Village Kit");
    Ok(())
}

#[tokio::test]
async fn test_unreachable_source_still_updates_last_check() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("seen_assets.json");
    let site = FakeSite::new();
    let notifier = RecordingNotifier::default();
    let monitor = build_monitor(
        &site,
        &[fab_listing()],
        Arc::new(JsonFileStore::new(&path)),
        &notifier,
    )
    .await;

    let report = monitor.run_check().await;
    assert_eq!(report.sources_failed, 1);
    assert!(notifier.events().is_empty());

    let on_disk: AppData = serde_json::from_slice(&std::fs::read(&path)?)?;
    assert!(on_disk.seen_assets.is_empty());
    assert!(on_disk.last_check.is_some());
    Ok(())
}

#[tokio::test]
async fn test_one_failing_source_does_not_hide_another() -> anyhow::Result<()> {
    let site = FakeSite::new();
    site.serve(FAB_FREE_URL, &fab_page(&[("aaa", "Medieval Village Kit")]));
    let notifier = RecordingNotifier::default();

    let mut broken = fab_listing();
    broken.name = "broken".to_string();
    broken.url = "https://offline.example.com/free".to_string();

    let monitor = build_monitor(
        &site,
        &[broken, fab_listing()],
        Arc::new(MemoryStore::new()),
        &notifier,
    )
    .await;

    let report = monitor.run_check().await;
    assert_eq!(report.sources_checked, 2);
    assert_eq!(report.sources_failed, 1);
    assert_eq!(report.new_free, 1);
    Ok(())
}

#[tokio::test]
async fn test_dispatch_hub_flow() -> anyhow::Result<()> {
    let site = FakeSite::new();
    site.serve(
        "https://unrealsource.com/dispatch/",
        r#"<html><body>
            <article><a href="/d/free-fab-assets-march-2026/">Free Fab assets for March</a></article>
            <article><a href="/d/unreal-5-7-preview/">2 days ago</a></article>
            <article><a href="/d/megascans-update/"><img alt="Megascans update" src="m.png"></a></article>
        </body></html>"#,
    );
    site.serve(
        "https://unrealsource.com/d/free-fab-assets-march-2026/",
        r#"<html><body>
            <p>These are free until March 31, 2026.</p>
            <a href="https://www.fab.com/listings/111"><img alt="Sci-Fi Corridor" src="a.png"></a>
            <a href="https://www.fab.com/listings/222">Desert Props</a>
        </body></html>"#,
    );

    let notifier = RecordingNotifier::default();
    let monitor = build_monitor(
        &site,
        &SourceDefinition::defaults(),
        Arc::new(MemoryStore::new()),
        &notifier,
    )
    .await;

    let report = monitor.run_check().await;
    assert_eq!(report.new_free, 2);
    assert_eq!(report.new_latest, 2);

    let latest = monitor
        .query(&AssetQuery {
            category: Some(Category::Latest),
            search: None,
        })
        .await;
    let mut titles: Vec<_> = latest.iter().map(|a| a.title.as_str()).collect();
    titles.sort();
    assert_eq!(titles, vec!["Megascans update", "Unreal 5 7 Preview"]);

    let events = notifier.events();
    assert_eq!(events.len(), 2);
    assert_eq!(events[0].category, Category::Free);
    assert_eq!(events[1].category, Category::Latest);
    assert_eq!(
        site.requests(),
        vec![
            "https://unrealsource.com/dispatch/".to_string(),
            "https://unrealsource.com/d/free-fab-assets-march-2026/".to_string(),
        ]
    );
    Ok(())
}

#[tokio::test]
async fn test_clear_then_recheck_notifies_again() -> anyhow::Result<()> {
    let site = FakeSite::new();
    site.serve(FAB_FREE_URL, &fab_page(&[("aaa", "Medieval Village Kit")]));
    let notifier = RecordingNotifier::default();
    let monitor = build_monitor(&site, &[fab_listing()], Arc::new(MemoryStore::new()), &notifier).await;

    monitor.run_check().await;
    monitor.clear_history().await?;
    assert_eq!(notifier.events().len(), 1);

    let report = monitor.run_check().await;
    assert_eq!(report.new_free, 1);
    assert_eq!(notifier.events().len(), 2);
    Ok(())
}

#[tokio::test]
async fn test_full_stack_from_config() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let mut config = test_config(dir.path());
    config.sources = vec![];

    let monitor = AssetMonitor::from_config(&config).await?;
    let report = monitor.run_check().await;
    assert_eq!(report.sources_checked, 0);

    let state_file = config.storage.state_file();
    assert!(state_file.exists());
    assert!(monitor.status_summary().await.starts_with("0 free • 0 latest • Last check: "));
    assert!(!monitor.status_summary().await.ends_with("Never"));
    Ok(())
}

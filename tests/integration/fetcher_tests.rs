use super::*;
use asset_monitor::config::FetcherConfig;
use asset_monitor::scraper::HttpFetcher;
use asset_monitor::sources::SourceKind;
use std::time::{Duration, Instant};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn fetcher_config() -> FetcherConfig {
    FetcherConfig {
        user_agent: "AssetMonitor-Test/1.0".to_string(),
        request_timeout: 5,
        connect_timeout: 2,
    }
}

#[tokio::test]
async fn test_fetch_returns_body() -> anyhow::Result<()> {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/dispatch/"))
        .and(header("user-agent", "AssetMonitor-Test/1.0"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>ok</html>"))
        .expect(1)
        .mount(&server)
        .await;

    let fetcher = HttpFetcher::new(&fetcher_config())?;
    let body = fetcher.fetch(&format!("{}/dispatch/", server.uri())).await?;
    assert_eq!(body, "<html>ok</html>");
    Ok(())
}

#[tokio::test]
async fn test_non_ok_status_is_transport_error() -> anyhow::Result<()> {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let fetcher = HttpFetcher::new(&fetcher_config())?;
    let err = fetcher
        .fetch(&format!("{}/dispatch/", server.uri()))
        .await
        .unwrap_err();

    assert!(err.is_transport());
    assert!(matches!(err, AppError::Status { status: 500, .. }));
    Ok(())
}

#[tokio::test]
async fn test_no_content_is_rejected() -> anyhow::Result<()> {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&server)
        .await;

    let fetcher = HttpFetcher::new(&fetcher_config())?;
    let result = fetcher.fetch(&server.uri()).await;
    assert!(matches!(result, Err(AppError::Status { status: 204, .. })));
    Ok(())
}

#[tokio::test]
async fn test_slow_response_hits_request_timeout() -> anyhow::Result<()> {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("<html>late</html>")
                .set_delay(Duration::from_secs(3)),
        )
        .mount(&server)
        .await;

    let fetcher = HttpFetcher::new(&FetcherConfig {
        request_timeout: 1,
        ..fetcher_config()
    })?;

    let started = Instant::now();
    let err = fetcher.fetch(&server.uri()).await.unwrap_err();
    assert!(err.is_transport());
    assert!(started.elapsed() < Duration::from_millis(2500));
    Ok(())
}

#[tokio::test]
async fn test_end_to_end_against_http_server() -> anyhow::Result<()> {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/dispatch/"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"<a href="/d/free-fab-assets-april/">Free this month</a>
               <a href="/d/lumen-deep-dive/">Lumen deep dive</a>"#,
        ))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/d/free-fab-assets-april/"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"<p>Free until April 30, 2026</p>
               <a href="https://www.fab.com/listings/xyz">Forest Pack</a>"#,
        ))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir()?;
    let mut config = test_config(dir.path());
    let mut source = SourceDefinition::defaults().remove(0);
    source.url = format!("{}/dispatch/", server.uri());
    source.origin = server.uri();
    assert!(matches!(source.kind, SourceKind::Hub { .. }));
    config.sources = vec![source];
    config.validate()?;

    let monitor = AssetMonitor::from_config(&config).await?;
    let report = monitor.run_check().await;
    assert_eq!(report.sources_failed, 0);
    assert_eq!(report.new_free, 1);
    assert_eq!(report.new_latest, 1);

    let saved: asset_monitor::models::AppData =
        serde_json::from_slice(&std::fs::read(config.storage.state_file())?)?;
    let forest = &saved.seen_assets["https://www.fab.com/listings/xyz"];
    assert_eq!(forest.expires_at.as_deref(), Some("Free until April 30, 2026"));
    assert!(saved
        .seen_assets
        .contains_key(&format!("{}/d/lumen-deep-dive/", server.uri())));
    Ok(())
}

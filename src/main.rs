use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::info;

use asset_monitor::models::{AssetQuery, Category};
use asset_monitor::store::{JsonFileStore, MemoryStore, StateStore};
use asset_monitor::{AppConfig, AssetMonitor, AssetScheduler, CheckReport, TriggerOutcome, telemetry};

#[derive(Parser)]
#[command(name = "asset-monitor", version, about = "Watches marketplace news for free and newly released assets")]
struct Cli {
    /// Configuration file to load instead of the config/ directory
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Check on a schedule until Ctrl-C. Reads check, status, clear and quit from stdin.
    Run,
    /// Run a single check cycle
    Check {
        /// Do not write the state file
        #[arg(long)]
        dry_run: bool,
    },
    /// List seen assets, most recent first
    List {
        #[arg(long)]
        category: Option<Category>,
        #[arg(long)]
        search: Option<String>,
        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },
    /// Print the status line
    Status,
    /// Forget every seen asset
    Clear,
    /// Print the effective configuration as TOML
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => AppConfig::from_file(path),
        None => AppConfig::from_env(),
    }
    .context("Failed to load configuration")?;

    let _guard = telemetry::init_tracing(&config.logging)?;

    match cli.command.unwrap_or(Command::Run) {
        Command::Run => run(config).await,
        Command::Check { dry_run } => check(config, dry_run).await,
        Command::List {
            category,
            search,
            json,
        } => list(config, AssetQuery { category, search }, json).await,
        Command::Status => {
            let monitor = AssetMonitor::from_config(&config).await?;
            println!("{}", monitor.status_summary().await);
            Ok(())
        }
        Command::Clear => {
            let monitor = AssetMonitor::from_config(&config).await?;
            monitor.clear_history().await?;
            println!("History cleared");
            Ok(())
        }
        Command::Config => {
            print!("{}", toml::to_string_pretty(&config)?);
            Ok(())
        }
    }
}

async fn run(config: AppConfig) -> Result<()> {
    telemetry::install_metrics(&config.metrics)?;

    info!(
        state_file = %config.storage.state_file().display(),
        interval_secs = config.scheduler.interval_secs,
        "Starting asset monitor"
    );

    let monitor = Arc::new(AssetMonitor::from_config(&config).await?);
    info!("{}", monitor.status_summary().await);
    let scheduler = AssetScheduler::start(Arc::clone(&monitor), config.scheduler.clone());

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            line = lines.next_line(), if stdin_open => match line {
                Ok(Some(line)) => match line.trim() {
                    "check" => match scheduler.check_now() {
                        TriggerOutcome::Queued => println!("Check queued"),
                        TriggerOutcome::Coalesced => println!("Check already pending"),
                        TriggerOutcome::Stopped => break,
                    },
                    "status" => println!("{}", monitor.status_summary().await),
                    "clear" => match monitor.clear_history().await {
                        Ok(()) => println!("History cleared"),
                        Err(e) => println!("Failed to clear history: {}", e),
                    },
                    "quit" => break,
                    "" => {}
                    other => println!("Unknown command: {}", other),
                },
                _ => stdin_open = false,
            },
        }
    }

    info!("Shutting down...");
    scheduler.shutdown().await?;
    Ok(())
}

async fn check(config: AppConfig, dry_run: bool) -> Result<()> {
    let monitor = if dry_run {
        let saved = JsonFileStore::new(config.storage.state_file()).load().await;
        AssetMonitor::with_store(&config, Arc::new(MemoryStore::with_data(saved))).await?
    } else {
        AssetMonitor::from_config(&config).await?
    };

    let report = monitor.run_check().await;
    print_report(&report);
    monitor.notifiers().shutdown().await;
    Ok(())
}

fn print_report(report: &CheckReport) {
    println!(
        "Checked {} source(s), {} failed: {} new free, {} new latest ({} ms)",
        report.sources_checked, report.sources_failed, report.new_free, report.new_latest, report.duration_ms
    );
    for (category, assets) in report.new_assets.groups() {
        for asset in assets {
            println!("  [{}] {} <{}>", category, asset.display_title(), asset.url);
        }
    }
}

async fn list(config: AppConfig, query: AssetQuery, json: bool) -> Result<()> {
    let monitor = AssetMonitor::from_config(&config).await?;
    let assets = monitor.query(&query).await;

    if json {
        println!("{}", serde_json::to_string_pretty(&assets)?);
        return Ok(());
    }

    for category in Category::all() {
        if query.category.is_some_and(|c| c != category) {
            continue;
        }
        let group: Vec<_> = assets.iter().filter(|a| a.category == category).collect();
        println!("{} ({})", category.as_str().to_uppercase(), group.len());
        for asset in group {
            println!("  {}", asset.display_title());
            println!("    {}", asset.info_line());
            println!("    {}", asset.url);
        }
    }
    println!("{}", monitor.status_summary().await);
    Ok(())
}

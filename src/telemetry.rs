use metrics::{describe_counter, describe_gauge, describe_histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, fmt};

use crate::config::{LoggingConfig, MetricsConfig};
use crate::utils::error::{AppError, Result};

const LOG_FILE_PREFIX: &str = "asset-monitor.log";

/// Parse filter directives such as `asset_monitor=debug,reqwest=warn`.
pub fn filter_from(directives: &str) -> Result<EnvFilter> {
    EnvFilter::try_new(directives)
        .map_err(|e| AppError::Validation(format!("Invalid log filter '{}': {}", directives, e)))
}

/// Install the global subscriber. `RUST_LOG` wins over the configured filter.
/// Keep the returned guard alive so buffered file output is flushed.
pub fn init_tracing(config: &LoggingConfig) -> Result<Option<WorkerGuard>> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => filter_from(&config.filter)?,
    };

    let (file_layer, guard) = match &config.directory {
        Some(directory) => {
            let appender = tracing_appender::rolling::daily(directory, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer().with_writer(writer).with_ansi(false);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .with(file_layer)
        .try_init()
        .map_err(|e| AppError::Internal(format!("Failed to install tracing subscriber: {}", e)))?;

    Ok(guard)
}

/// Start the Prometheus exporter when enabled. Returns whether it is running.
pub fn install_metrics(config: &MetricsConfig) -> Result<bool> {
    if !config.enabled {
        return Ok(false);
    }

    let address: SocketAddr = config.listen_address.parse().map_err(|_| {
        AppError::Validation(format!("Invalid metrics address: {}", config.listen_address))
    })?;

    PrometheusBuilder::new()
        .with_http_listener(address)
        .install()
        .map_err(|e| AppError::Internal(format!("Failed to start metrics exporter: {}", e)))?;

    describe_counter!("asset_monitor_checks_total", "Completed check cycles.");
    describe_counter!("asset_monitor_source_failures_total", "Sources that failed to fetch.");
    describe_counter!("asset_monitor_new_assets_total", "Newly found assets by category.");
    describe_gauge!("asset_monitor_tracked_assets", "Assets in the seen history.");
    describe_histogram!("asset_monitor_check_duration_ms", "Check cycle duration in milliseconds.");

    tracing::info!(%address, "Metrics exporter listening");
    Ok(true)
}

use anyhow::Result;
use chrono::Utc;
use std::path::Path;
use std::sync::Arc;
use tokio::signal;
use tracing_subscriber::EnvFilter;
use webscore_common::slug::url_slug;
use webscore_storage::bootstrap::connect_with_retry;
use webscore_storage::engine::SqliteTimeSeriesStore;
use webscore_storage::subscribers::SubscriberRegistry;

use webscore_server::config::ServerConfig;
use webscore_server::runner::{build_channels, Runner};
use webscore_server::scheduler::RunScheduler;

const DEFAULT_CONFIG: &str = "config/webscore.toml";

#[allow(clippy::print_stderr)]
fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  webscore-server run [config.toml]                                Run once and exit");
    eprintln!("  webscore-server schedule [config.toml]                           Run on the configured interval");
    eprintln!("  webscore-server subscribe <config.toml> <url> <email> <active>  Add or update a subscription (active: 1/0)");
}

#[tokio::main]
async fn main() -> Result<()> {
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|e| anyhow::anyhow!("Failed to install default CryptoProvider: {e:?}"))?;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("webscore=info".parse()?))
        .init();

    let args: Vec<String> = std::env::args().collect();

    match args.get(1).map(|s| s.as_str()) {
        Some("run") => run_once(config_path(&args)).await,
        Some("schedule") => run_scheduled(config_path(&args)).await,
        Some("subscribe") => {
            let [config_path, url, email, active] = [2, 3, 4, 5].map(|i| args.get(i));
            let (Some(config_path), Some(url), Some(email), Some(active)) =
                (config_path, url, email, active)
            else {
                print_usage();
                anyhow::bail!("subscribe requires <config.toml> <url> <email> <active>");
            };
            let active = parse_active(active).ok_or_else(|| {
                print_usage();
                anyhow::anyhow!("active must be one of 1, 0, true, false")
            })?;
            run_subscribe(config_path, url, email, active).await
        }
        Some("--help" | "-h") => {
            print_usage();
            Ok(())
        }
        _ => {
            print_usage();
            anyhow::bail!("unknown command")
        }
    }
}

fn config_path(args: &[String]) -> &str {
    args.get(2).map(|s| s.as_str()).unwrap_or(DEFAULT_CONFIG)
}

fn parse_active(value: &str) -> Option<bool> {
    match value {
        "1" | "true" => Some(true),
        "0" | "false" => Some(false),
        _ => None,
    }
}

/// Opens the store and makes sure the leaderboard database exists.
async fn connect(config: &ServerConfig) -> Result<Arc<SqliteTimeSeriesStore>> {
    let store = Arc::new(SqliteTimeSeriesStore::new(Path::new(&config.data_dir))?);
    connect_with_retry(
        store.as_ref(),
        &config.leaderboard_database,
        config.retry_policy(),
    )
    .await?;
    Ok(store)
}

async fn build_runner(config: &ServerConfig) -> Result<Runner> {
    let store = connect(config).await?;
    let channels = build_channels(&config.email)?;
    Ok(Runner::new(config, store, channels))
}

async fn run_once(config_path: &str) -> Result<()> {
    let config = ServerConfig::load(config_path)
        .map_err(|e| anyhow::anyhow!("Failed to load config '{}': {}", config_path, e))?;
    tracing::info!(config = config_path, metrics = config.metrics.len(), "Starting leaderboard run");

    let runner = build_runner(&config).await?;
    let report = runner.run().await?;
    tracing::info!(?report, "Run complete");
    Ok(())
}

async fn run_scheduled(config_path: &str) -> Result<()> {
    let config = ServerConfig::load(config_path)
        .map_err(|e| anyhow::anyhow!("Failed to load config '{}': {}", config_path, e))?;
    let runner = Arc::new(build_runner(&config).await?);
    let scheduler = RunScheduler::new(runner, config.schedule.interval_secs);

    tokio::select! {
        _ = scheduler.run() => {}
        _ = signal::ctrl_c() => {
            tracing::info!("Shutting down gracefully");
        }
    }
    Ok(())
}

async fn run_subscribe(config_path: &str, url: &str, email: &str, active: bool) -> Result<()> {
    let config = ServerConfig::load(config_path)
        .map_err(|e| anyhow::anyhow!("Failed to load config '{}': {}", config_path, e))?;
    let store = connect(&config).await?;
    let registry = SubscriberRegistry::new(store, config.leaderboard_database.clone())
        .with_timeout(config.query_timeout());
    registry
        .update_subscription(&url_slug(url), email, active, Utc::now())
        .await?;
    Ok(())
}

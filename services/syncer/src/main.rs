//! Gauge sync service.
//!
//! Keeps the metadata store in step with upstream monitoring APIs:
//! - Observation sync: new readings per station, with stale record cleanup
//! - Sensor sync: registers upstream sites the store does not know yet
//! - Per-source polling schedules from config/sources/*.yaml

mod config;
mod runner;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tokio::sync::broadcast;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use gauge_sync::source::upstream_client;
use gauge_sync::{HttpStore, HttpStoreConfig};

use runner::{Mode, Runner, SourceJob};

#[derive(Parser, Debug)]
#[command(name = "syncer")]
#[command(about = "Incremental gauge observation and sensor sync")]
struct Args {
    /// Run once and exit (vs continuous polling)
    #[arg(long)]
    once: bool,

    /// Specific source to sync (default: all configured)
    #[arg(short, long)]
    source: Option<String>,

    /// What to synchronize
    #[arg(long, value_enum, default_value = "observations")]
    mode: Mode,

    /// Configuration directory (contains sources/*.yaml)
    #[arg(long, env = "CONFIG_DIR", default_value = "config")]
    config_dir: PathBuf,

    /// Metadata store API base URL
    #[arg(long, env = "STORE_URL")]
    store_url: String,

    /// Metadata store API key
    #[arg(long, env = "STORE_API_KEY")]
    store_api_key: Option<String>,

    /// Timeout for store and upstream requests, in seconds
    #[arg(long, default_value = "30")]
    request_timeout_secs: u64,

    /// Log level
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Port for the Prometheus metrics endpoint (disabled when unset)
    #[arg(long, env = "METRICS_PORT")]
    metrics_port: Option<u16>,

    /// With --once, exit non-zero if any entity failed
    #[arg(long)]
    fail_on_entity_error: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment from .env file if present
    dotenvy::dotenv().ok();

    let args = Args::parse();

    // Initialize tracing
    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .with_thread_ids(true)
        .json()
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    info!(mode = ?args.mode, "Starting gauge syncer");

    if let Some(port) = args.metrics_port {
        metrics_exporter_prometheus::PrometheusBuilder::new()
            .with_http_listener(([0, 0, 0, 0], port))
            .install()
            .context("Failed to install Prometheus exporter")?;
        info!(port, "Prometheus metrics exporter listening");
    }

    let mut configs = config::load_source_configs(&args.config_dir)?;
    if let Some(source) = &args.source {
        configs.retain(|c| &c.source.id == source);
        if configs.is_empty() {
            bail!("Source '{}' is not configured or is disabled", source);
        }
    }
    if configs.is_empty() {
        bail!("No enabled sources found in {}", args.config_dir.display());
    }

    let timeout = Duration::from_secs(args.request_timeout_secs);
    let store = Arc::new(
        HttpStore::new(HttpStoreConfig {
            base_url: args.store_url.clone(),
            api_key: args.store_api_key.clone(),
            request_timeout: timeout,
        })
        .context("Failed to create store client")?,
    );
    let client = upstream_client(timeout).context("Failed to create upstream client")?;

    let jobs = configs
        .iter()
        .map(|config| {
            SourceJob::from_config(config, store.clone(), client.clone())
                .with_context(|| format!("Failed to set up source {}", config.source.id))
        })
        .collect::<Result<Vec<_>>>()?;
    let runner = Runner::new(jobs, args.mode);

    if args.once {
        // Single run mode
        info!("Running single sync cycle");
        let totals = runner.run_once().await;

        info!(
            sources = totals.reports.len(),
            systemic_failures = totals.systemic_failures,
            entity_failures = totals.entity_failures(),
            "Sync session complete"
        );

        if totals.systemic_failures > 0 {
            bail!("{} source run(s) failed", totals.systemic_failures);
        }
        if args.fail_on_entity_error && totals.entity_failures() > 0 {
            bail!("{} entity sync(s) failed", totals.entity_failures());
        }
    } else {
        // Continuous polling mode
        info!("Starting continuous polling");

        let (shutdown_tx, _) = broadcast::channel::<()>(1);

        // Handle Ctrl+C
        let shutdown_tx_clone = shutdown_tx.clone();
        tokio::spawn(async move {
            tokio::signal::ctrl_c().await.ok();
            info!("Received shutdown signal");
            shutdown_tx_clone.send(()).ok();
        });

        runner.run_forever(shutdown_tx.subscribe()).await;
    }

    Ok(())
}

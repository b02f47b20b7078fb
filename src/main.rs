// =============================================================================
// COT Radar — Main Entry Point
// =============================================================================
//
//   cot-radar [serve]                       load datasets, serve the API
//   cot-radar fetch                         download the CFTC yearly archives
//   cot-radar analyze <asset> <start> <end> print one analysis as JSON
//   cot-radar backtest <asset> [from]       print the signal report as JSON
//
// `--offline` skips every download (CFTC archives and Binance closes).
// =============================================================================

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use cot_radar::api;
use cot_radar::app_state::AppState;
use cot_radar::backtest::run_backtest;
use cot_radar::market_data::{align_weekly, DateRange};
use cot_radar::runtime_config::RuntimeConfig;
use cot_radar::types::Asset;

const DEFAULT_CONFIG_PATH: &str = "cot_radar_config.json";

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Config file path (overrides COT_RADAR_CONFIG)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Only use files already in the data directory
    #[arg(long)]
    offline: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Load configured datasets and serve the HTTP API
    Serve,
    /// Download missing years and refresh the current one, then exit
    Fetch,
    /// Analyze one asset over [start, end] and print the result
    Analyze {
        asset: Asset,
        start: NaiveDate,
        end: NaiveDate,
    },
    /// Replay the weekly signal rules and print the accuracy report
    Backtest {
        asset: Asset,
        from: Option<NaiveDate>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ── 1. Environment & config ──────────────────────────────────────────
    let _ = dotenv::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let config_path = cli
        .config
        .or_else(|| std::env::var("COT_RADAR_CONFIG").ok().map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH));

    let mut config = RuntimeConfig::load(&config_path).unwrap_or_else(|e| {
        warn!(error = %e, "Failed to load config, using defaults");
        RuntimeConfig::default()
    });
    apply_env_overrides(&mut config);
    if cli.offline {
        config.fetch_cftc_reports = false;
        config.fetch_missing_prices = false;
    }

    // ── 2. Build shared state ────────────────────────────────────────────
    let state = Arc::new(AppState::new(config, Some(config_path)));

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(state).await,
        Command::Fetch => {
            let synced = state.fetch_reports().await?;
            println!("{}", serde_json::to_string_pretty(&synced)?);
            Ok(())
        }
        Command::Analyze { asset, start, end } => {
            let dataset = state.load_dataset(asset).await?;
            let result = state
                .analyzer()
                .analyze(&dataset.samples, DateRange::new(start, end));
            println!("{}", serde_json::to_string_pretty(&result)?);
            Ok(())
        }
        Command::Backtest { asset, from } => {
            let dataset = state.load_dataset(asset).await?;
            let (weekday, params) = {
                let config = state.runtime_config.read();
                (config.report_weekday, config.backtest.clone())
            };
            let weeks = align_weekly(&dataset.samples, weekday);
            let report = run_backtest(&weeks, from, &params);
            println!("{}", serde_json::to_string_pretty(&report)?);
            Ok(())
        }
    }
}

/// `COT_RADAR_BIND_ADDR`, `COT_RADAR_DATA_DIR`, `COT_RADAR_ASSETS`.
fn apply_env_overrides(config: &mut RuntimeConfig) {
    if let Ok(addr) = std::env::var("COT_RADAR_BIND_ADDR") {
        config.bind_addr = addr;
    }
    if let Ok(dir) = std::env::var("COT_RADAR_DATA_DIR") {
        config.data_dir = PathBuf::from(dir);
    }
    if let Ok(list) = std::env::var("COT_RADAR_ASSETS") {
        let assets: Vec<Asset> = list
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .filter_map(|s| match s.parse() {
                Ok(asset) => Some(asset),
                Err(e) => {
                    warn!(error = %e, "Ignoring asset from COT_RADAR_ASSETS");
                    None
                }
            })
            .collect();
        if !assets.is_empty() {
            config.assets = assets;
        }
    }
}

async fn serve(state: Arc<AppState>) -> anyhow::Result<()> {
    info!("╔══════════════════════════════════════════════════════════╗");
    info!("║        COT Radar — Starting Up                           ║");
    info!("╚══════════════════════════════════════════════════════════╝");

    let (bind_addr, assets) = {
        let config = state.runtime_config.read();
        (config.bind_addr.clone(), config.assets.clone())
    };
    info!(assets = ?assets, "Configured assets");

    // ── 3. Load datasets ─────────────────────────────────────────────────
    let loaded = state.load_configured_datasets().await;
    if loaded == 0 {
        warn!("No dataset loaded; analysis endpoints will return 404 until a reload succeeds");
    } else {
        info!(loaded, "Datasets ready");
    }

    // ── 4. Start the API server ──────────────────────────────────────────
    let app = api::router(state.clone());
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind API server on {bind_addr}"))?;
    info!(addr = %bind_addr, "API server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!(error = %e, "Failed to listen for Ctrl+C");
            }
            warn!("Shutdown signal received — stopping gracefully");
        })
        .await
        .context("API server failed")?;

    info!("COT Radar shut down complete.");
    Ok(())
}

// =============================================================================
// Central Application State — COT Radar
// =============================================================================
//
// Holds the loaded per-asset datasets and the runtime configuration.  Datasets
// are immutable once loaded: a reload builds a fresh `Dataset` and swaps the
// `Arc`, so in-flight analyses keep reading the snapshot they started with.
//
// Thread safety:
//   - Atomic counter for lock-free version tracking.
//   - parking_lot::RwLock around the dataset map, the config and the error
//     log; no lock is held across an `.await`.
// =============================================================================

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Datelike, NaiveDate, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use tracing::{info, warn};

use crate::analysis::MarketAnalyzer;
use crate::binance::BinanceClient;
use crate::market_data::prices::load_price_csv;
use crate::market_data::{
    join_nearest, load_cftc_history, ArchiveStatus, CftcArchiveClient, JoinedSample, PricePoint,
    YearSync,
};
use crate::runtime_config::{AnalysisThresholds, RuntimeConfig};
use crate::types::Asset;

// =============================================================================
// Error Record
// =============================================================================

/// A recorded error event for the status endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorRecord {
    pub message: String,
    /// Asset whose load failed, when there is one.
    pub asset: Option<Asset>,
    /// ISO 8601 timestamp.
    pub at: String,
}

/// Maximum number of recent errors to retain.
const MAX_RECENT_ERRORS: usize = 50;

// =============================================================================
// Dataset
// =============================================================================

/// Where a dataset's closes came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "detail")]
pub enum PriceSource {
    Csv(String),
    Binance(String),
    /// Supplied directly (tests, POSTed samples).
    Inline,
}

/// One asset's joined report series.  Read-only once built.
#[derive(Debug, Clone, Serialize)]
pub struct Dataset {
    pub asset: Asset,
    pub samples: Vec<JoinedSample>,
    pub price_source: PriceSource,
    pub loaded_at: DateTime<Utc>,
}

impl Dataset {
    pub fn new(asset: Asset, samples: Vec<JoinedSample>, price_source: PriceSource) -> Self {
        Self {
            asset,
            samples,
            price_source,
            loaded_at: Utc::now(),
        }
    }

    pub fn first_date(&self) -> Option<NaiveDate> {
        self.samples.first().map(|s| s.date)
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.samples.last().map(|s| s.date)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DatasetSummary {
    pub asset: Asset,
    pub rows: usize,
    pub first_date: Option<NaiveDate>,
    pub last_date: Option<NaiveDate>,
    pub price_source: PriceSource,
    pub loaded_at: String,
}

impl From<&Dataset> for DatasetSummary {
    fn from(d: &Dataset) -> Self {
        Self {
            asset: d.asset,
            rows: d.samples.len(),
            first_date: d.first_date(),
            last_date: d.last_date(),
            price_source: d.price_source.clone(),
            loaded_at: d.loaded_at.to_rfc3339(),
        }
    }
}

// =============================================================================
// AppState
// =============================================================================

/// Shared state handed to every handler via `Arc<AppState>`.
pub struct AppState {
    /// Bumped on every dataset swap or config change.
    pub state_version: AtomicU64,

    pub runtime_config: Arc<RwLock<RuntimeConfig>>,

    /// Where threshold updates are persisted; `None` keeps them in memory.
    pub config_path: Option<PathBuf>,

    pub datasets: RwLock<HashMap<Asset, Arc<Dataset>>>,

    pub recent_errors: RwLock<Vec<ErrorRecord>>,

    pub start_time: std::time::Instant,
}

impl AppState {
    pub fn new(config: RuntimeConfig, config_path: Option<PathBuf>) -> Self {
        Self {
            state_version: AtomicU64::new(1),
            runtime_config: Arc::new(RwLock::new(config)),
            config_path,
            datasets: RwLock::new(HashMap::new()),
            recent_errors: RwLock::new(Vec::new()),
            start_time: std::time::Instant::now(),
        }
    }

    // ── Version Management ──────────────────────────────────────────────

    pub fn increment_version(&self) -> u64 {
        self.state_version.fetch_add(1, Ordering::SeqCst)
    }

    pub fn current_state_version(&self) -> u64 {
        self.state_version.load(Ordering::SeqCst)
    }

    // ── Error Logging ───────────────────────────────────────────────────

    /// Record an error.  Oldest entries are evicted past
    /// [`MAX_RECENT_ERRORS`].
    pub fn push_error(&self, message: String, asset: Option<Asset>) {
        let mut errors = self.recent_errors.write();
        errors.push(ErrorRecord {
            message,
            asset,
            at: Utc::now().to_rfc3339(),
        });
        while errors.len() > MAX_RECENT_ERRORS {
            errors.remove(0);
        }
    }

    // ── Config snapshots ────────────────────────────────────────────────

    /// Fresh engine over the current thresholds.
    pub fn analyzer(&self) -> MarketAnalyzer {
        MarketAnalyzer::from_config(&self.runtime_config.read())
    }

    pub fn thresholds(&self) -> AnalysisThresholds {
        self.runtime_config.read().thresholds.clone()
    }

    /// Replace the thresholds and persist the config when a path is set.
    pub fn set_thresholds(&self, thresholds: AnalysisThresholds) -> Result<()> {
        let snapshot = {
            let mut config = self.runtime_config.write();
            config.thresholds = thresholds;
            config.clone()
        };
        self.increment_version();

        if let Some(path) = &self.config_path {
            snapshot.save(path)?;
        }
        Ok(())
    }

    // ── Datasets ────────────────────────────────────────────────────────

    pub fn dataset(&self, asset: Asset) -> Option<Arc<Dataset>> {
        self.datasets.read().get(&asset).cloned()
    }

    pub fn dataset_summaries(&self) -> Vec<DatasetSummary> {
        let datasets = self.datasets.read();
        let mut out: Vec<DatasetSummary> = Asset::ALL
            .iter()
            .filter_map(|a| datasets.get(a))
            .map(|d| DatasetSummary::from(d.as_ref()))
            .collect();
        out.sort_by_key(|s| s.asset.ticker());
        out
    }

    pub fn insert_dataset(&self, dataset: Dataset) -> Arc<Dataset> {
        let dataset = Arc::new(dataset);
        self.datasets.write().insert(dataset.asset, Arc::clone(&dataset));
        self.increment_version();
        dataset
    }

    // ── CFTC archives ───────────────────────────────────────────────────

    /// Download missing (and the current) years of the configured range into
    /// the data directory.
    pub async fn fetch_reports(&self) -> Result<Vec<YearSync>> {
        let config = self.runtime_config.read().clone();
        sync_report_archives(&config).await
    }

    /// Sync the archives when enabled.  A failure is recorded and loading
    /// carries on with whatever is cached.
    async fn refresh_reports(&self, asset: Option<Asset>) {
        if !self.runtime_config.read().fetch_cftc_reports {
            return;
        }
        if let Err(e) = self.fetch_reports().await {
            warn!(error = %format!("{e:#}"), "CFTC archive sync failed");
            self.push_error(format!("{e:#}"), asset);
        }
    }

    /// Refresh the CFTC archives (when enabled), load `asset` from the data
    /// directory (and Binance when configured), then swap it in.
    pub async fn load_dataset(&self, asset: Asset) -> Result<Arc<Dataset>> {
        self.refresh_reports(Some(asset)).await;
        self.load_cached_dataset(asset).await
    }

    async fn load_cached_dataset(&self, asset: Asset) -> Result<Arc<Dataset>> {
        let config = self.runtime_config.read().clone();
        match build_dataset(&config, asset).await {
            Ok(dataset) => {
                info!(
                    asset = %asset,
                    rows = dataset.samples.len(),
                    source = ?dataset.price_source,
                    "dataset loaded"
                );
                Ok(self.insert_dataset(dataset))
            }
            Err(e) => {
                warn!(asset = %asset, error = %format!("{e:#}"), "dataset load failed");
                self.push_error(format!("{e:#}"), Some(asset));
                Err(e)
            }
        }
    }

    /// Sync the archives once, then load every configured asset; failures
    /// are logged and skipped.
    pub async fn load_configured_datasets(&self) -> usize {
        self.refresh_reports(None).await;
        let assets = self.runtime_config.read().assets.clone();
        let mut loaded = 0;
        for asset in assets {
            if self.load_cached_dataset(asset).await.is_ok() {
                loaded += 1;
            }
        }
        loaded
    }

    // ── Status ──────────────────────────────────────────────────────────

    pub fn build_status(&self) -> StatusSnapshot {
        let config = self.runtime_config.read();
        StatusSnapshot {
            status: "ok",
            state_version: self.current_state_version(),
            uptime_secs: self.start_time.elapsed().as_secs(),
            server_time: Utc::now().timestamp_millis(),
            start_year: config.start_year,
            end_year: config.end_year,
            datasets: self.dataset_summaries(),
            recent_errors: self.recent_errors.read().clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct StatusSnapshot {
    pub status: &'static str,
    pub state_version: u64,
    pub uptime_secs: u64,
    pub server_time: i64,
    pub start_year: i32,
    pub end_year: i32,
    pub datasets: Vec<DatasetSummary>,
    pub recent_errors: Vec<ErrorRecord>,
}

// =============================================================================
// Dataset construction
// =============================================================================

async fn sync_report_archives(config: &RuntimeConfig) -> Result<Vec<YearSync>> {
    let client = CftcArchiveClient::with_base_url(config.cftc_history_url.clone())?;
    let synced = client
        .sync_years(
            &config.data_dir,
            config.start_year,
            config.end_year,
            Utc::now().year(),
        )
        .await;

    let unavailable: Vec<i32> = synced
        .iter()
        .filter(|s| s.status == ArchiveStatus::Unavailable)
        .map(|s| s.year)
        .collect();
    info!(
        years = synced.len(),
        unavailable = ?unavailable,
        "CFTC archives synced"
    );
    Ok(synced)
}

async fn build_dataset(config: &RuntimeConfig, asset: Asset) -> Result<Dataset> {
    let data_dir = config.data_dir.clone();
    let (start_year, end_year) = (config.start_year, config.end_year);

    let reports = tokio::task::spawn_blocking(move || {
        load_cftc_history(&data_dir, asset, start_year, end_year)
    })
    .await
    .context("CFTC loader task panicked")??;

    if reports.is_empty() {
        anyhow::bail!(
            "no {} reports found in {} for {}-{}",
            asset,
            config.data_dir.display(),
            start_year,
            end_year
        );
    }

    let (prices, price_source) = load_prices(config, asset).await?;
    let samples = join_nearest(&reports, &prices);
    Ok(Dataset::new(asset, samples, price_source))
}

/// Local `<data_dir>/<ticker>.csv` first, then Binance daily klines.
async fn load_prices(
    config: &RuntimeConfig,
    asset: Asset,
) -> Result<(Vec<PricePoint>, PriceSource)> {
    let csv_path = config.data_dir.join(format!("{}.csv", asset.ticker()));
    if csv_path.exists() {
        let path = csv_path.clone();
        let prices = tokio::task::spawn_blocking(move || load_price_csv(&path))
            .await
            .context("price CSV loader task panicked")??;
        return Ok((prices, PriceSource::Csv(csv_path.display().to_string())));
    }

    if !config.fetch_missing_prices {
        anyhow::bail!(
            "no price CSV at {} and Binance fallback is disabled",
            csv_path.display()
        );
    }

    let start = NaiveDate::from_ymd_opt(config.start_year, 1, 1)
        .with_context(|| format!("invalid start year {}", config.start_year))?;
    let year_end = NaiveDate::from_ymd_opt(config.end_year, 12, 31)
        .with_context(|| format!("invalid end year {}", config.end_year))?;
    let end = year_end.min(Utc::now().date_naive());

    let client = BinanceClient::new()?;
    let prices = client
        .get_daily_closes(asset.spot_symbol(), start, end)
        .await
        .with_context(|| format!("failed to fetch {} closes from Binance", asset.spot_symbol()))?;
    if prices.is_empty() {
        anyhow::bail!("Binance returned no closes for {}", asset.spot_symbol());
    }
    Ok((prices, PriceSource::Binance(asset.spot_symbol().to_string())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Cursor, Write};
    use std::path::Path;

    const REPORT: &str = "\
Market_and_Exchange_Names,Report_Date_as_YYYY-MM-DD,Asset_Mgr_Positions_Short_All,Lev_Money_Positions_Short_All
\"BITCOIN - CHICAGO MERCANTILE EXCHANGE\",2024-01-02,100,1000
\"BITCOIN - CHICAGO MERCANTILE EXCHANGE\",2024-01-09,110,1100
";

    fn offline_config(data_dir: PathBuf) -> RuntimeConfig {
        RuntimeConfig {
            data_dir,
            start_year: 2024,
            end_year: 2024,
            fetch_cftc_reports: false,
            fetch_missing_prices: false,
            ..RuntimeConfig::default()
        }
    }

    fn write_prices(dir: &Path) {
        std::fs::write(
            dir.join("BTC-USD.csv"),
            "Date,Close\n2024-01-02,45000\n2024-01-09,46000\n",
        )
        .unwrap();
    }

    #[tokio::test]
    async fn loads_dataset_from_cache_dir() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("fin_fut_txt_2024.txt"), REPORT).unwrap();
        write_prices(dir.path());

        let state = AppState::new(offline_config(dir.path().to_path_buf()), None);
        let dataset = state.load_dataset(Asset::Btc).await.unwrap();
        assert_eq!(dataset.samples.len(), 2);
        assert_eq!(dataset.samples[1].close_price, Some(46_000.0));
        assert!(matches!(dataset.price_source, PriceSource::Csv(_)));
        assert!(state.dataset(Asset::Btc).is_some());
        assert!(state.current_state_version() > 1);
    }

    #[tokio::test]
    async fn downloads_reports_before_loading() {
        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        let options = zip::write::SimpleFileOptions::default()
            .compression_method(zip::CompressionMethod::Stored);
        writer.start_file("FinFutYY.txt", options).unwrap();
        writer.write_all(REPORT.as_bytes()).unwrap();
        let archive = writer.finish().unwrap().into_inner();

        let app = axum::Router::new().route(
            "/fut_fin_txt_2024.zip",
            axum::routing::get(move || {
                let archive = archive.clone();
                async move { archive }
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.ok();
        });

        let dir = tempfile::tempdir().unwrap();
        write_prices(dir.path());
        let config = RuntimeConfig {
            fetch_cftc_reports: true,
            cftc_history_url: format!("http://{addr}"),
            ..offline_config(dir.path().to_path_buf())
        };

        let state = AppState::new(config, None);
        assert_eq!(state.load_configured_datasets().await, 1);
        assert!(dir.path().join("fin_fut_txt_2024.txt").exists());
        let dataset = state.dataset(Asset::Btc).unwrap();
        assert_eq!(dataset.samples.len(), 2);
        // ETH has no rows in the report.
        assert!(state.dataset(Asset::Eth).is_none());
    }

    #[tokio::test]
    async fn missing_reports_record_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let state = AppState::new(offline_config(dir.path().to_path_buf()), None);
        assert!(state.load_dataset(Asset::Eth).await.is_err());
        assert!(state.dataset(Asset::Eth).is_none());
        let errors = state.recent_errors.read();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].asset, Some(Asset::Eth));
    }

    #[test]
    fn threshold_updates_bump_version_and_persist() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cot_radar_config.json");
        let state = AppState::new(RuntimeConfig::default(), Some(path.clone()));
        let before = state.current_state_version();

        let t = AnalysisThresholds {
            dominant_oi_move_pct: 25.0,
            ..AnalysisThresholds::default()
        };
        state.set_thresholds(t).unwrap();
        assert!(state.current_state_version() > before);
        let live = state.analyzer().thresholds().dominant_oi_move_pct;
        assert!((live - 25.0).abs() < f64::EPSILON);

        let reloaded = RuntimeConfig::load(&path).unwrap();
        assert!((reloaded.thresholds.dominant_oi_move_pct - 25.0).abs() < f64::EPSILON);
    }

    #[test]
    fn error_log_is_capped() {
        let state = AppState::new(RuntimeConfig::default(), None);
        for i in 0..(MAX_RECENT_ERRORS + 5) {
            state.push_error(format!("err {i}"), None);
        }
        let errors = state.recent_errors.read();
        assert_eq!(errors.len(), MAX_RECENT_ERRORS);
        assert_eq!(errors[0].message, "err 5");
    }
}

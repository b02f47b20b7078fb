// =============================================================================
// Runtime Configuration — Engine thresholds and data sources with atomic save
// =============================================================================
//
// Every numeric constant the classifiers use lives in `AnalysisThresholds` so
// the decision structure can be re-tuned (or swept in tests) without touching
// classification code.
//
// Persistence uses an atomic tmp + rename pattern to prevent corruption on
// crash.  All fields carry `#[serde(default)]` so that adding new fields
// never breaks loading an older config file.
//
// =============================================================================

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Weekday;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::market_data::archive::CFTC_HISTORY_URL;
use crate::types::Asset;

// =============================================================================
// Default-value helpers (required by serde `default = "..."` attribute)
// =============================================================================

fn default_true() -> bool {
    true
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("data_cache")
}

fn default_cftc_history_url() -> String {
    CFTC_HISTORY_URL.to_string()
}

fn default_bind_addr() -> String {
    "0.0.0.0:3001".to_string()
}

fn default_assets() -> Vec<Asset> {
    vec![Asset::Btc, Asset::Eth]
}

fn default_start_year() -> i32 {
    2023
}

fn default_end_year() -> i32 {
    chrono::Datelike::year(&chrono::Utc::now().date_naive())
}

fn default_report_weekday() -> Weekday {
    Weekday::Fri
}

fn default_min_weeks() -> usize {
    2
}

fn default_one_month_lookback_weeks() -> usize {
    4
}

fn default_min_correlation_points() -> usize {
    3
}

fn default_dominant_oi_move_pct() -> f64 {
    30.0
}

fn default_range_price_move_pct() -> f64 {
    10.0
}

fn default_correlation_threshold() -> f64 {
    0.5
}

fn default_bias_oi_pct() -> f64 {
    10.0
}

fn default_activation_oi_pct() -> f64 {
    2.0
}

fn default_five_pct() -> f64 {
    5.0
}

fn default_three_pct() -> f64 {
    3.0
}

fn default_one_pct() -> f64 {
    1.0
}

fn default_book_closing_month() -> u32 {
    12
}

fn default_rollover_months() -> Vec<u32> {
    vec![3, 6, 9]
}

fn default_horizon_weeks() -> usize {
    4
}

fn default_dip_buy_oi_pct() -> f64 {
    1.0
}

fn default_smoothing_window() -> usize {
    4
}

fn default_highlight_threshold_pct() -> f64 {
    10.0
}

// =============================================================================
// AnalysisThresholds
// =============================================================================

/// Tunable constants of the trend classifier, the weekly state machine and
/// the verdict synthesizer.  All percentages are plain percent (5.0 = 5 %).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisThresholds {
    // --- Window requirements -----------------------------------------------

    /// Minimum aligned weeks for a valid analysis.
    #[serde(default = "default_min_weeks")]
    pub min_weeks: usize,

    /// Weeks between the "1-month" reference row and the latest row.
    /// 4 means the 5th-from-last row.
    #[serde(default = "default_one_month_lookback_weeks")]
    pub one_month_lookback_weeks: usize,

    /// Minimum points for a correlation; fewer yields 0.
    #[serde(default = "default_min_correlation_points")]
    pub min_correlation_points: usize,

    // --- Trend classifier (range level) ------------------------------------

    /// |range OI delta| above this is a dominant whale move.
    #[serde(default = "default_dominant_oi_move_pct")]
    pub dominant_oi_move_pct: f64,

    /// |range price delta| above this counts as a real price move.
    #[serde(default = "default_range_price_move_pct")]
    pub range_price_move_pct: f64,

    /// |correlation| above this confirms co-movement.
    #[serde(default = "default_correlation_threshold")]
    pub correlation_threshold: f64,

    /// |range OI delta| above this tilts a weakly correlated range.
    #[serde(default = "default_bias_oi_pct")]
    pub bias_oi_pct: f64,

    // --- Weekly state machine ----------------------------------------------

    /// |weekly OI delta| above this is an active week.
    #[serde(default = "default_activation_oi_pct")]
    pub activation_oi_pct: f64,

    /// Weekly OI surge that, with a price drop, marks a bear raid.
    #[serde(default = "default_five_pct")]
    pub raid_oi_surge_pct: f64,

    /// Weekly price drop that, with an OI surge, marks a bear raid.
    #[serde(default = "default_three_pct")]
    pub raid_price_drop_pct: f64,

    /// |weekly price delta| above this counts as a price reaction.
    #[serde(default = "default_one_pct")]
    pub weekly_price_move_pct: f64,

    /// Calendar month whose OI drops are year-end book closing.
    #[serde(default = "default_book_closing_month")]
    pub book_closing_month: u32,

    /// Calendar months whose OI drops are quarterly contract rollover.
    #[serde(default = "default_rollover_months")]
    pub rollover_months: Vec<u32>,

    // --- Verdict overrides -------------------------------------------------

    /// Last-week OI drop that, with a price rise, is a short squeeze.
    #[serde(default = "default_five_pct")]
    pub squeeze_oi_drop_pct: f64,

    /// Last-week price rise that, with an OI drop, is a short squeeze.
    #[serde(default = "default_one_pct")]
    pub squeeze_price_rise_pct: f64,

    /// Last-week OI drop that breaks an accumulation trend.
    #[serde(default = "default_five_pct")]
    pub reversal_oi_drop_pct: f64,

    /// Last-week OI surge that marks a bottom inside a distribution trend.
    #[serde(default = "default_five_pct")]
    pub bottom_oi_surge_pct: f64,
}

impl Default for AnalysisThresholds {
    fn default() -> Self {
        Self {
            min_weeks: default_min_weeks(),
            one_month_lookback_weeks: default_one_month_lookback_weeks(),
            min_correlation_points: default_min_correlation_points(),
            dominant_oi_move_pct: default_dominant_oi_move_pct(),
            range_price_move_pct: default_range_price_move_pct(),
            correlation_threshold: default_correlation_threshold(),
            bias_oi_pct: default_bias_oi_pct(),
            activation_oi_pct: default_activation_oi_pct(),
            raid_oi_surge_pct: default_five_pct(),
            raid_price_drop_pct: default_three_pct(),
            weekly_price_move_pct: default_one_pct(),
            book_closing_month: default_book_closing_month(),
            rollover_months: default_rollover_months(),
            squeeze_oi_drop_pct: default_five_pct(),
            squeeze_price_rise_pct: default_one_pct(),
            reversal_oi_drop_pct: default_five_pct(),
            bottom_oi_surge_pct: default_five_pct(),
        }
    }
}

impl AnalysisThresholds {
    /// True when a week with this price/OI change is a bear raid.
    /// Shared by the weekly state machine and the verdict override.
    pub fn is_bear_raid(&self, oi_delta_pct: f64, price_delta_pct: f64) -> bool {
        price_delta_pct < -self.raid_price_drop_pct && oi_delta_pct > self.raid_oi_surge_pct
    }

    /// True when a week with this price/OI change is a short squeeze.
    pub fn is_squeeze(&self, oi_delta_pct: f64, price_delta_pct: f64) -> bool {
        oi_delta_pct < -self.squeeze_oi_drop_pct && price_delta_pct > self.squeeze_price_rise_pct
    }
}

// =============================================================================
// BacktestParams
// =============================================================================

/// Signal rules and horizon for the historical validation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestParams {
    /// Weeks ahead used to score each signal.
    #[serde(default = "default_horizon_weeks")]
    pub horizon_weeks: usize,

    /// Bear raid: weekly price below -this ...
    #[serde(default = "default_three_pct")]
    pub raid_price_drop_pct: f64,

    /// ... and weekly OI above this.
    #[serde(default = "default_five_pct")]
    pub raid_oi_surge_pct: f64,

    /// Dip buy: weekly price below -this ...
    #[serde(default = "default_one_pct")]
    pub dip_price_drop_pct: f64,

    /// ... and weekly OI above this.
    #[serde(default = "default_dip_buy_oi_pct")]
    pub dip_oi_rise_pct: f64,

    /// Strong buy: weekly price above this ...
    #[serde(default = "default_one_pct")]
    pub strong_price_rise_pct: f64,

    /// ... and weekly OI above this.
    #[serde(default = "default_five_pct")]
    pub strong_oi_surge_pct: f64,

    /// Squeeze: weekly OI below -this with price above `squeeze_price_rise_pct`.
    #[serde(default = "default_five_pct")]
    pub squeeze_oi_drop_pct: f64,

    #[serde(default = "default_one_pct")]
    pub squeeze_price_rise_pct: f64,
}

impl Default for BacktestParams {
    fn default() -> Self {
        Self {
            horizon_weeks: default_horizon_weeks(),
            raid_price_drop_pct: default_three_pct(),
            raid_oi_surge_pct: default_five_pct(),
            dip_price_drop_pct: default_one_pct(),
            dip_oi_rise_pct: default_dip_buy_oi_pct(),
            strong_price_rise_pct: default_one_pct(),
            strong_oi_surge_pct: default_five_pct(),
            squeeze_oi_drop_pct: default_five_pct(),
            squeeze_price_rise_pct: default_one_pct(),
        }
    }
}

// =============================================================================
// ChartOptions
// =============================================================================

/// Display toggles passed through to the overlay preparation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartOptions {
    /// Convert contract counts to USD notional (contracts x price x multiplier).
    #[serde(default)]
    pub show_dollar_value: bool,

    /// Rolling-mean window in reports; 0 disables smoothing.
    #[serde(default = "default_smoothing_window")]
    pub smoothing_window: usize,

    /// Tag reports whose week-over-week change exceeds the threshold.
    #[serde(default = "default_true")]
    pub highlight_changes: bool,

    #[serde(default = "default_highlight_threshold_pct")]
    pub highlight_threshold_pct: f64,
}

impl Default for ChartOptions {
    fn default() -> Self {
        Self {
            show_dollar_value: false,
            smoothing_window: default_smoothing_window(),
            highlight_changes: true,
            highlight_threshold_pct: default_highlight_threshold_pct(),
        }
    }
}

// =============================================================================
// RuntimeConfig
// =============================================================================

/// Top-level configuration for the COT radar service.
///
/// Every field has a serde default so that older JSON files missing new fields
/// will still deserialise correctly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeConfig {
    // --- Data sources -------------------------------------------------------

    /// Directory holding `fin_fut_txt_<year>.txt` and optional price CSVs.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Assets loaded at startup.
    #[serde(default = "default_assets")]
    pub assets: Vec<Asset>,

    /// First report year loaded.
    #[serde(default = "default_start_year")]
    pub start_year: i32,

    /// Last report year loaded (inclusive).
    #[serde(default = "default_end_year")]
    pub end_year: i32,

    /// Download the yearly CFTC archives into `data_dir` before loading.
    #[serde(default = "default_true")]
    pub fetch_cftc_reports: bool,

    /// Directory the `fut_fin_txt_<year>.zip` archives are fetched from.
    #[serde(default = "default_cftc_history_url")]
    pub cftc_history_url: String,

    /// Fall back to Binance daily klines when no local price CSV exists.
    #[serde(default = "default_true")]
    pub fetch_missing_prices: bool,

    // --- Server -------------------------------------------------------------

    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    // --- Engine -------------------------------------------------------------

    /// Weekday the weekly buckets end on (the report's anchor day).
    #[serde(default = "default_report_weekday")]
    pub report_weekday: Weekday,

    #[serde(default)]
    pub thresholds: AnalysisThresholds,

    #[serde(default)]
    pub backtest: BacktestParams,

    #[serde(default)]
    pub chart: ChartOptions,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            assets: default_assets(),
            start_year: default_start_year(),
            end_year: default_end_year(),
            fetch_cftc_reports: true,
            cftc_history_url: default_cftc_history_url(),
            fetch_missing_prices: true,
            bind_addr: default_bind_addr(),
            report_weekday: default_report_weekday(),
            thresholds: AnalysisThresholds::default(),
            backtest: BacktestParams::default(),
            chart: ChartOptions::default(),
        }
    }
}

impl RuntimeConfig {
    /// Load configuration from a JSON file at `path`.
    ///
    /// If the file does not exist, returns an error so the caller can fall
    /// back to defaults with a warning.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read runtime config from {}", path.display()))?;

        let config: Self = serde_json::from_str(&content)
            .with_context(|| format!("failed to parse runtime config from {}", path.display()))?;

        info!(
            path = %path.display(),
            assets = ?config.assets,
            start_year = config.start_year,
            end_year = config.end_year,
            report_weekday = %config.report_weekday,
            "runtime config loaded"
        );

        Ok(config)
    }

    /// Persist the current configuration to `path` using an atomic write
    /// (write to `.tmp`, then rename).
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();

        let content = serde_json::to_string_pretty(self)
            .context("failed to serialise runtime config to JSON")?;

        let tmp_path = path.with_extension("json.tmp");

        std::fs::write(&tmp_path, &content)
            .with_context(|| format!("failed to write tmp config to {}", tmp_path.display()))?;

        std::fs::rename(&tmp_path, path)
            .with_context(|| format!("failed to rename tmp config to {}", path.display()))?;

        info!(path = %path.display(), "runtime config saved (atomic)");
        Ok(())
    }
}

// =============================================================================
// REST API Endpoints — Axum 0.7
// =============================================================================
//
// All endpoints live under `/api/v1/`.  Every analysis request builds its own
// `MarketAnalyzer` from a threshold snapshot and runs it over the shared,
// read-only dataset, so concurrent requests never contend on engine state.
//
// Errors are returned as `{ "error": "..." }` with:
//   400 — unknown asset / malformed query or body
//   404 — dataset for the asset is not loaded
//   500 — reload or config persistence failure
//
// CORS is permissive; the API is read-mostly and unauthenticated.
// =============================================================================

use std::sync::Arc;

use axum::{
    extract::{Json, Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};

use crate::app_state::{AppState, Dataset};
use crate::backtest::run_backtest;
use crate::chart::prepare_chart;
use crate::market_data::{align_weekly, DateRange, JoinedSample};
use crate::runtime_config::AnalysisThresholds;
use crate::types::Asset;

type ApiError = (StatusCode, Json<serde_json::Value>);

fn api_error(status: StatusCode, message: impl Into<String>) -> ApiError {
    (status, Json(serde_json::json!({ "error": message.into() })))
}

// =============================================================================
// Router construction
// =============================================================================

/// Build the full REST API router with CORS middleware and shared state.
pub fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/v1/health", get(health))
        .route("/api/v1/assets", get(assets))
        .route("/api/v1/analysis", post(analyze_inline))
        .route("/api/v1/analysis/:asset", get(analyze_asset))
        .route("/api/v1/chart/:asset", get(chart))
        .route("/api/v1/backtest/:asset", get(backtest))
        .route("/api/v1/datasets/:asset/reload", post(reload_dataset))
        .route("/api/v1/config/thresholds", get(get_thresholds))
        .route("/api/v1/config/thresholds", post(set_thresholds))
        .layer(cors)
        .with_state(state)
}

// =============================================================================
// Helpers
// =============================================================================

fn parse_asset(raw: &str) -> Result<Asset, ApiError> {
    raw.parse::<Asset>()
        .map_err(|e| api_error(StatusCode::BAD_REQUEST, e.to_string()))
}

fn loaded_dataset(state: &AppState, asset: Asset) -> Result<Arc<Dataset>, ApiError> {
    state.dataset(asset).ok_or_else(|| {
        api_error(
            StatusCode::NOT_FOUND,
            format!("dataset for {asset} is not loaded"),
        )
    })
}

#[derive(Debug, Default, Deserialize)]
struct RangeQuery {
    #[serde(default)]
    start: Option<NaiveDate>,
    #[serde(default)]
    end: Option<NaiveDate>,
}

impl RangeQuery {
    /// Missing bounds default to the dataset's first / last date.
    fn resolve(&self, dataset: &Dataset) -> Result<DateRange, ApiError> {
        let start = self.start.or_else(|| dataset.first_date());
        let end = self.end.or_else(|| dataset.last_date());
        match (start, end) {
            (Some(start), Some(end)) => Ok(DateRange::new(start, end)),
            _ => Err(api_error(
                StatusCode::NOT_FOUND,
                format!("dataset for {} is empty", dataset.asset),
            )),
        }
    }

    fn explicit(&self) -> Option<DateRange> {
        Some(DateRange::new(self.start?, self.end?))
    }
}

// =============================================================================
// Health / assets
// =============================================================================

async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.build_status())
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AssetInfo {
    asset: Asset,
    ticker: &'static str,
    cftc_name: &'static str,
    spot_symbol: &'static str,
    contract_multiplier: f64,
    color: &'static str,
    loaded: bool,
}

async fn assets(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let infos: Vec<AssetInfo> = Asset::ALL
        .iter()
        .map(|&asset| AssetInfo {
            asset,
            ticker: asset.ticker(),
            cftc_name: asset.cftc_name(),
            spot_symbol: asset.spot_symbol(),
            contract_multiplier: asset.contract_multiplier(),
            color: asset.color(),
            loaded: state.dataset(asset).is_some(),
        })
        .collect();
    Json(infos)
}

// =============================================================================
// Analysis
// =============================================================================

async fn analyze_asset(
    State(state): State<Arc<AppState>>,
    Path(asset): Path<String>,
    Query(query): Query<RangeQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let asset = parse_asset(&asset)?;
    let dataset = loaded_dataset(&state, asset)?;
    let range = query.resolve(&dataset)?;

    let result = state.analyzer().analyze(&dataset.samples, range);
    Ok(Json(result))
}

#[derive(Debug, Deserialize)]
struct InlineAnalysisRequest {
    samples: Vec<JoinedSample>,
    start: NaiveDate,
    end: NaiveDate,
}

async fn analyze_inline(
    State(state): State<Arc<AppState>>,
    Json(req): Json<InlineAnalysisRequest>,
) -> impl IntoResponse {
    let range = DateRange::new(req.start, req.end);
    Json(state.analyzer().analyze(&req.samples, range))
}

// =============================================================================
// Chart / backtest
// =============================================================================

#[derive(Debug, Default, Deserialize)]
struct ChartQuery {
    #[serde(default)]
    start: Option<NaiveDate>,
    #[serde(default)]
    end: Option<NaiveDate>,
    #[serde(default)]
    dollar: Option<bool>,
    #[serde(default)]
    smoothing: Option<usize>,
    #[serde(default)]
    highlight: Option<bool>,
    #[serde(default)]
    threshold: Option<f64>,
}

async fn chart(
    State(state): State<Arc<AppState>>,
    Path(asset): Path<String>,
    Query(query): Query<ChartQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let asset = parse_asset(&asset)?;
    let dataset = loaded_dataset(&state, asset)?;

    let mut options = state.runtime_config.read().chart.clone();
    if let Some(v) = query.dollar {
        options.show_dollar_value = v;
    }
    if let Some(v) = query.smoothing {
        options.smoothing_window = v;
    }
    if let Some(v) = query.highlight {
        options.highlight_changes = v;
    }
    if let Some(v) = query.threshold {
        options.highlight_threshold_pct = v;
    }

    let range = RangeQuery {
        start: query.start,
        end: query.end,
    }
    .explicit();
    Ok(Json(prepare_chart(&dataset.samples, asset, &options, range)))
}

#[derive(Debug, Default, Deserialize)]
struct BacktestQuery {
    #[serde(default)]
    from: Option<NaiveDate>,
}

async fn backtest(
    State(state): State<Arc<AppState>>,
    Path(asset): Path<String>,
    Query(query): Query<BacktestQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let asset = parse_asset(&asset)?;
    let dataset = loaded_dataset(&state, asset)?;
    let (weekday, params) = {
        let config = state.runtime_config.read();
        (config.report_weekday, config.backtest.clone())
    };

    let weeks = align_weekly(&dataset.samples, weekday);
    Ok(Json(run_backtest(&weeks, query.from, &params)))
}

// =============================================================================
// Datasets / config
// =============================================================================

async fn reload_dataset(
    State(state): State<Arc<AppState>>,
    Path(asset): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let asset = parse_asset(&asset)?;
    match state.load_dataset(asset).await {
        Ok(dataset) => {
            info!(asset = %asset, rows = dataset.samples.len(), "Dataset reloaded via API");
            Ok(Json(crate::app_state::DatasetSummary::from(dataset.as_ref())))
        }
        Err(e) => Err(api_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("{e:#}"),
        )),
    }
}

async fn get_thresholds(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.thresholds())
}

async fn set_thresholds(
    State(state): State<Arc<AppState>>,
    Json(thresholds): Json<AnalysisThresholds>,
) -> Result<impl IntoResponse, ApiError> {
    if let Err(e) = state.set_thresholds(thresholds) {
        warn!(error = %e, "Failed to persist thresholds");
        return Err(api_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("{e:#}"),
        ));
    }
    info!("Analysis thresholds updated via API");
    Ok(Json(state.thresholds()))
}

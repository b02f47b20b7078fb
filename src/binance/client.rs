// =============================================================================
// Binance Spot Price Client — public daily klines
// =============================================================================
//
// Only the public, unsigned market-data endpoint is used: daily closes for
// the spot symbol of each tracked asset.  `/api/v3/klines` returns at most
// 1000 rows per call, so longer histories are paged forward by `startTime`.
// =============================================================================

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, NaiveTime};
use tracing::{debug, instrument, warn};

use crate::market_data::PricePoint;

/// Maximum rows Binance returns per klines request.
const KLINES_PAGE_LIMIT: usize = 1000;

/// One day in milliseconds.
const DAY_MS: i64 = 86_400_000;

/// Public Binance REST client for spot price history.
#[derive(Clone)]
pub struct BinanceClient {
    base_url: String,
    client: reqwest::Client,
}

impl BinanceClient {
    /// Create a client against the production endpoint.
    pub fn new() -> Result<Self> {
        Self::with_base_url("https://api.binance.com")
    }

    /// Create a client against `base_url` (tests, mirrors).
    pub fn with_base_url(base_url: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .context("failed to build reqwest client")?;

        let base_url = base_url.into();
        debug!(base_url = %base_url, "BinanceClient initialised");

        Ok(Self { base_url, client })
    }

    /// GET /api/v3/klines?interval=1d for `[start, end]`, following pages
    /// until the range is covered.
    #[instrument(skip(self), name = "binance::get_daily_closes")]
    pub async fn get_daily_closes(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<PricePoint>> {
        let mut start_ms = day_start_ms(start);
        let end_ms = day_start_ms(end) + DAY_MS - 1;
        let mut points = Vec::new();

        while start_ms <= end_ms {
            let url = format!(
                "{}/api/v3/klines?symbol={}&interval=1d&startTime={}&endTime={}&limit={}",
                self.base_url, symbol, start_ms, end_ms, KLINES_PAGE_LIMIT
            );

            let resp = self
                .client
                .get(&url)
                .send()
                .await
                .context("GET /api/v3/klines request failed")?;

            let status = resp.status();
            let body: serde_json::Value = resp
                .json()
                .await
                .context("failed to parse klines response")?;

            if !status.is_success() {
                anyhow::bail!("Binance GET /api/v3/klines returned {}: {}", status, body);
            }

            let page = parse_daily_klines(&body)?;
            let page_len = page.len();
            let Some(last) = page.last() else {
                break;
            };
            start_ms = day_start_ms(last.date) + DAY_MS;
            points.extend(page);

            if page_len < KLINES_PAGE_LIMIT {
                break;
            }
        }

        debug!(symbol, count = points.len(), "daily closes fetched");
        Ok(points)
    }
}

fn day_start_ms(date: NaiveDate) -> i64 {
    date.and_time(NaiveTime::MIN).and_utc().timestamp_millis()
}

/// Parse Binance's array-of-arrays klines payload into daily closes.
///
/// Array indices used: [0] openTime (ms), [4] close (string).
pub fn parse_daily_klines(body: &serde_json::Value) -> Result<Vec<PricePoint>> {
    let raw = body.as_array().context("klines response is not an array")?;

    let mut points = Vec::with_capacity(raw.len());
    for entry in raw {
        let arr = entry.as_array().context("kline entry is not an array")?;
        if arr.len() < 5 {
            warn!("skipping malformed kline entry with {} elements", arr.len());
            continue;
        }

        let open_time = arr[0].as_i64().context("kline open time is not an integer")?;
        let date = DateTime::from_timestamp_millis(open_time)
            .with_context(|| format!("kline open time {open_time} out of range"))?
            .date_naive();
        let close = parse_str_f64(&arr[4])?;

        points.push(PricePoint { date, close });
    }
    Ok(points)
}

/// Parse a JSON value that may be either a string or a number into `f64`.
fn parse_str_f64(val: &serde_json::Value) -> Result<f64> {
    if let Some(s) = val.as_str() {
        s.parse::<f64>()
            .with_context(|| format!("failed to parse '{s}' as f64"))
    } else if let Some(n) = val.as_f64() {
        Ok(n)
    } else {
        anyhow::bail!("expected string or number, got: {val}")
    }
}

impl std::fmt::Debug for BinanceClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BinanceClient")
            .field("base_url", &self.base_url)
            .finish()
    }
}

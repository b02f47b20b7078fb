// =============================================================================
// Spot prices — daily close CSVs and the as-of report join
// =============================================================================

use std::fs::File;
use std::io::Read;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::cftc::{csv_reader, parse_report_date, CftcRecord};
use super::JoinedSample;

/// One daily close.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    pub date: NaiveDate,
    pub close: f64,
}

/// Parse a daily price CSV with `Date` and `Close` columns (any order,
/// case-insensitive; extra columns ignored).  Returns points sorted by date.
pub fn parse_price_csv<R: Read>(reader: R) -> Result<Vec<PricePoint>> {
    let mut rdr = csv_reader(reader);
    let header = rdr.headers().context("failed to read price CSV header")?;
    if header.is_empty() {
        anyhow::bail!("price CSV is empty");
    }
    let lower: Vec<String> = header.iter().map(|h| h.to_ascii_lowercase()).collect();

    let date_col = lower
        .iter()
        .position(|h| h == "date")
        .or_else(|| lower.iter().position(|h| h.contains("date")))
        .context("price CSV has no date column")?;
    let close_col = lower
        .iter()
        .position(|h| h == "close")
        .or_else(|| lower.iter().position(|h| h.contains("close")))
        .context("price CSV has no close column")?;

    let mut points = Vec::new();
    let mut skipped = 0usize;
    for row in rdr.records() {
        let Ok(fields) = row else {
            skipped += 1;
            continue;
        };
        let date = fields.get(date_col).and_then(parse_report_date);
        let close = fields
            .get(close_col)
            .and_then(|s| s.parse::<f64>().ok())
            .filter(|c| c.is_finite());
        match (date, close) {
            (Some(date), Some(close)) => points.push(PricePoint { date, close }),
            _ => skipped += 1,
        }
    }

    if skipped > 0 {
        warn!(skipped, "skipped malformed price rows");
    }
    points.sort_by_key(|p| p.date);
    Ok(points)
}

/// Read and parse a price CSV from disk.
pub fn load_price_csv(path: impl AsRef<Path>) -> Result<Vec<PricePoint>> {
    let path = path.as_ref();
    let file = File::open(path)
        .with_context(|| format!("failed to open price CSV {}", path.display()))?;
    let points = parse_price_csv(file)
        .with_context(|| format!("failed to parse price CSV {}", path.display()))?;
    info!(path = %path.display(), rows = points.len(), "price history loaded");
    Ok(points)
}

/// Attach to every report the close of the nearest price date.
///
/// `prices` must be sorted by date.  Equidistant candidates resolve to the
/// earlier date.  Reports get `close_price = None` when `prices` is empty.
pub fn join_nearest(reports: &[CftcRecord], prices: &[PricePoint]) -> Vec<JoinedSample> {
    reports
        .iter()
        .map(|r| JoinedSample {
            date: r.date,
            close_price: nearest_close(prices, r.date),
            short_open_interest: Some(r.lev_money_short),
            asset_manager_short_open_interest: r.asset_mgr_short,
        })
        .collect()
}

fn nearest_close(prices: &[PricePoint], date: NaiveDate) -> Option<f64> {
    let idx = prices.partition_point(|p| p.date < date);
    let after = prices.get(idx);
    let before = idx.checked_sub(1).and_then(|i| prices.get(i));

    match (before, after) {
        (Some(b), Some(a)) => {
            let gap_before = (date - b.date).num_days();
            let gap_after = (a.date - date).num_days();
            Some(if gap_after < gap_before { a.close } else { b.close })
        }
        (Some(b), None) => Some(b.close),
        (None, Some(a)) => Some(a.close),
        (None, None) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn rec(date: NaiveDate, oi: f64) -> CftcRecord {
        CftcRecord {
            date,
            market: "BITCOIN - CHICAGO MERCANTILE EXCHANGE".into(),
            lev_money_short: oi,
            asset_mgr_short: None,
        }
    }

    #[test]
    fn parses_yahoo_style_csv() {
        let csv = "\
Date,Open,High,Low,Close,Volume
2024-01-03 00:00:00+00:00,1,1,1,42800.5,10
2024-01-02 00:00:00+00:00,1,1,1,45000.0,10
2024-01-04,1,1,1,nan,10
";
        let pts = parse_price_csv(csv.as_bytes()).unwrap();
        assert_eq!(pts.len(), 2);
        assert_eq!(pts[0].date, d(2024, 1, 2));
        assert!((pts[1].close - 42_800.5).abs() < 1e-9);
    }

    #[test]
    fn prefers_exact_close_column_over_adjusted() {
        let csv = "date,adj close,close\n2024-01-02,1.0,2.0\n";
        let pts = parse_price_csv(csv.as_bytes()).unwrap();
        assert!((pts[0].close - 2.0).abs() < f64::EPSILON);
    }

    #[test]
    fn reads_price_file_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("BTC-USD.csv");
        std::fs::write(&path, "\"Date\",\"Close\"\n\"2024-01-02\",\"45,000.5\"\n2024-01-03,46000\n")
            .unwrap();
        let pts = load_price_csv(&path).unwrap();
        // A thousands separator is not a number; the row is skipped.
        assert_eq!(pts.len(), 1);
        assert!((pts[0].close - 46_000.0).abs() < f64::EPSILON);
        assert!(load_price_csv(dir.path().join("missing.csv")).is_err());
    }

    #[test]
    fn missing_columns_are_errors() {
        assert!(parse_price_csv("Date,Open\n2024-01-02,1\n".as_bytes()).is_err());
        assert!(parse_price_csv("".as_bytes()).is_err());
    }

    #[test]
    fn join_picks_nearest_date() {
        let prices = vec![
            PricePoint { date: d(2024, 1, 1), close: 10.0 },
            PricePoint { date: d(2024, 1, 5), close: 50.0 },
        ];
        let joined = join_nearest(
            &[
                rec(d(2024, 1, 2), 1.0),
                rec(d(2024, 1, 4), 2.0),
                rec(d(2024, 1, 3), 3.0),
                rec(d(2024, 2, 1), 4.0),
            ],
            &prices,
        );
        assert_eq!(joined[0].close_price, Some(10.0));
        assert_eq!(joined[1].close_price, Some(50.0));
        // Equidistant resolves to the earlier date.
        assert_eq!(joined[2].close_price, Some(10.0));
        assert_eq!(joined[3].close_price, Some(50.0));
        assert_eq!(joined[3].short_open_interest, Some(4.0));
    }

    #[test]
    fn join_without_prices_leaves_close_empty() {
        let joined = join_nearest(&[rec(d(2024, 1, 2), 1.0)], &[]);
        assert_eq!(joined[0].close_price, None);
    }
}

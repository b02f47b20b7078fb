// =============================================================================
// CFTC Traders-in-Financial-Futures loader
// =============================================================================
//
// Reads the annual TFF "futures only" text files (comma separated, one header
// row, quoted market names) as cached under `<data_dir>/fin_fut_txt_<year>.txt`
// by `archive::CftcArchiveClient`.
//
// Column layout has drifted between years, so columns are located by name:
//   market  — first header containing both "Market" and "Exchange"
//   date    — first header containing "Report_Date"
//   shorts  — Lev_Money_Positions_Short_All (required)
//   AM      — Asset_Mgr_Positions_Short_All (optional)

use std::fs::File;
use std::io::Read;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use csv::{ReaderBuilder, StringRecord, Trim};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::archive::cache_path;
use crate::types::Asset;

const LEV_MONEY_SHORT: &str = "Lev_Money_Positions_Short_All";
const ASSET_MGR_SHORT: &str = "Asset_Mgr_Positions_Short_All";

/// One weekly report row for a single market.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CftcRecord {
    pub date: NaiveDate,
    pub market: String,
    /// Leveraged-fund short contracts.
    pub lev_money_short: f64,
    pub asset_mgr_short: Option<f64>,
}

/// Parse the report date formats seen across TFF vintages.
pub(crate) fn parse_report_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    let head = raw.get(..10).unwrap_or(raw);
    NaiveDate::parse_from_str(head, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(raw, "%m/%d/%Y"))
        .or_else(|_| NaiveDate::parse_from_str(raw, "%y%m%d"))
        .ok()
}

struct Columns {
    market: usize,
    date: usize,
    lev_short: usize,
    am_short: Option<usize>,
}

impl Columns {
    fn locate(header: &StringRecord) -> Result<Self> {
        let market = header
            .iter()
            .position(|h| h.contains("Market") && h.contains("Exchange"))
            .context("TFF header has no market/exchange column")?;
        let date = header
            .iter()
            .position(|h| h.contains("Report_Date"))
            .context("TFF header has no report date column")?;
        let lev_short = header
            .iter()
            .position(|h| h == LEV_MONEY_SHORT)
            .with_context(|| format!("TFF header has no {LEV_MONEY_SHORT} column"))?;
        let am_short = header.iter().position(|h| h == ASSET_MGR_SHORT);
        Ok(Self {
            market,
            date,
            lev_short,
            am_short,
        })
    }
}

/// Build the CSV reader shared by the report and price parsers: ragged rows
/// allowed, every header and field trimmed.
pub(crate) fn csv_reader<R: Read>(reader: R) -> csv::Reader<R> {
    ReaderBuilder::new()
        .flexible(true)
        .trim(Trim::All)
        .from_reader(reader)
}

/// Parse a whole TFF text file, keeping rows whose market name contains
/// `market_filter`.  Malformed rows are skipped with a warning.
pub fn parse_tff_report<R: Read>(reader: R, market_filter: &str) -> Result<Vec<CftcRecord>> {
    let mut rdr = csv_reader(reader);
    let header = rdr.headers().context("failed to read TFF header")?.clone();
    if header.is_empty() {
        anyhow::bail!("TFF report is empty");
    }
    let cols = Columns::locate(&header)?;

    let mut records = Vec::new();
    let mut skipped = 0usize;

    for row in rdr.records() {
        let fields = match row {
            Ok(fields) => fields,
            Err(e) => {
                debug!(error = %e, "unreadable TFF row");
                skipped += 1;
                continue;
            }
        };
        let Some(market) = fields.get(cols.market) else {
            skipped += 1;
            continue;
        };
        if !market.contains(market_filter) {
            continue;
        }

        let date = fields.get(cols.date).and_then(parse_report_date);
        let lev_short = fields
            .get(cols.lev_short)
            .and_then(|s| s.parse::<f64>().ok());

        match (date, lev_short) {
            (Some(date), Some(lev_money_short)) => {
                let asset_mgr_short = cols
                    .am_short
                    .and_then(|i| fields.get(i))
                    .and_then(|s| s.parse::<f64>().ok());
                records.push(CftcRecord {
                    date,
                    market: market.to_string(),
                    lev_money_short,
                    asset_mgr_short,
                });
            }
            _ => skipped += 1,
        }
    }

    if skipped > 0 {
        warn!(skipped, market_filter, "skipped malformed TFF rows");
    }
    debug!(records = records.len(), market_filter, "TFF report parsed");
    Ok(records)
}

/// Sort by date and keep the last record for each report date.
pub fn dedup_by_date(mut records: Vec<CftcRecord>) -> Vec<CftcRecord> {
    records.sort_by_key(|r| r.date);
    let mut out: Vec<CftcRecord> = Vec::with_capacity(records.len());
    for rec in records {
        match out.last_mut() {
            Some(last) if last.date == rec.date => *last = rec,
            _ => out.push(rec),
        }
    }
    out
}

/// Load `asset`'s report history for `start_year..=end_year` from the cache
/// directory.  Missing years are skipped with a warning.
pub fn load_cftc_history(
    data_dir: impl AsRef<Path>,
    asset: Asset,
    start_year: i32,
    end_year: i32,
) -> Result<Vec<CftcRecord>> {
    let data_dir = data_dir.as_ref();
    let mut all = Vec::new();

    for year in start_year..=end_year {
        let path = cache_path(data_dir, year);
        if !path.exists() {
            warn!(path = %path.display(), year, "TFF cache file missing, skipping year");
            continue;
        }
        let file = File::open(&path)
            .with_context(|| format!("failed to open TFF report {}", path.display()))?;
        let records = parse_tff_report(file, asset.cftc_name())
            .with_context(|| format!("failed to parse TFF report {}", path.display()))?;
        info!(
            path = %path.display(),
            asset = %asset,
            rows = records.len(),
            "TFF year loaded"
        );
        all.extend(records);
    }

    Ok(dedup_by_date(all))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
Market_and_Exchange_Names,As_of_Date_In_Form_YYMMDD,Report_Date_as_YYYY-MM-DD,Open_Interest_All,Asset_Mgr_Positions_Short_All,Lev_Money_Positions_Short_All
\"BITCOIN - CHICAGO MERCANTILE EXCHANGE\",240102,2024-01-02,25000,1200,18000
\"MICRO BITCOIN - CHICAGO MERCANTILE EXCHANGE\",240102,2024-01-02,90000,300,40000
\"ETHER CASH SETTLED - CHICAGO MERCANTILE EXCHANGE\",240102,2024-01-02,9000,100,7000
\"BITCOIN - CHICAGO MERCANTILE EXCHANGE\",240109,2024-01-09,26000,1300,19000
\"BITCOIN - CHICAGO MERCANTILE EXCHANGE\",240116,not-a-date,26000,1300,19000
";

    #[test]
    fn quoted_fields_keep_commas_newlines_and_escapes() {
        let content = "\
Market_and_Exchange_Names,Report_Date_as_YYYY-MM-DD,Lev_Money_Positions_Short_All
\"BITCOIN - CHICAGO
MERCANTILE EXCHANGE\",2024-01-02,18000
\"BITCOIN, \"\"CME\"\"\", 2024-01-09 , 19000
";
        let recs = parse_tff_report(content.as_bytes(), "BITCOIN").unwrap();
        assert_eq!(recs.len(), 2);
        assert_eq!(recs[0].market, "BITCOIN - CHICAGO\nMERCANTILE EXCHANGE");
        assert_eq!(recs[0].date, NaiveDate::from_ymd_opt(2024, 1, 2).unwrap());
        assert!((recs[0].lev_money_short - 18_000.0).abs() < f64::EPSILON);
        assert_eq!(recs[1].market, "BITCOIN, \"CME\"");
        assert!((recs[1].lev_money_short - 19_000.0).abs() < f64::EPSILON);
    }

    #[test]
    fn short_rows_are_skipped_not_fatal() {
        let content = "\
Market_and_Exchange_Names,Report_Date_as_YYYY-MM-DD,Lev_Money_Positions_Short_All
\"BITCOIN - CME\",2024-01-02

\"BITCOIN - CME\",2024-01-09,19000
";
        let recs = parse_tff_report(content.as_bytes(), "BITCOIN").unwrap();
        assert_eq!(recs.len(), 1);
        assert_eq!(recs[0].date, NaiveDate::from_ymd_opt(2024, 1, 9).unwrap());
    }

    #[test]
    fn report_date_formats() {
        let want = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
        assert_eq!(parse_report_date("2024-01-02"), Some(want));
        assert_eq!(parse_report_date("2024-01-02 00:00:00"), Some(want));
        assert_eq!(parse_report_date("01/02/2024"), Some(want));
        assert_eq!(parse_report_date("240102"), Some(want));
        assert_eq!(parse_report_date("garbage"), None);
    }

    #[test]
    fn parse_filters_by_market_substring() {
        let recs = parse_tff_report(SAMPLE.as_bytes(), "BITCOIN").unwrap();
        // Includes MICRO BITCOIN (substring match), skips the bad date row.
        assert_eq!(recs.len(), 3);
        assert!((recs[0].lev_money_short - 18_000.0).abs() < f64::EPSILON);
        assert_eq!(recs[0].asset_mgr_short, Some(1_200.0));

        let eth = parse_tff_report(SAMPLE.as_bytes(), "ETHER").unwrap();
        assert_eq!(eth.len(), 1);
        assert!((eth[0].lev_money_short - 7_000.0).abs() < f64::EPSILON);
    }

    #[test]
    fn missing_required_column_is_an_error() {
        let content = "Market_and_Exchange_Names,Report_Date_as_YYYY-MM-DD\n\"X\",2024-01-02\n";
        assert!(parse_tff_report(content.as_bytes(), "X").is_err());
        assert!(parse_tff_report("".as_bytes(), "X").is_err());
    }

    #[test]
    fn dedup_keeps_last_record_per_date() {
        let recs = parse_tff_report(SAMPLE.as_bytes(), "BITCOIN").unwrap();
        let deduped = dedup_by_date(recs);
        assert_eq!(deduped.len(), 2);
        assert!(deduped[0].market.starts_with("MICRO"));
        assert!((deduped[1].lev_money_short - 19_000.0).abs() < f64::EPSILON);
    }

    #[test]
    fn history_loader_skips_missing_years() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("fin_fut_txt_2024.txt"), SAMPLE).unwrap();

        let recs = load_cftc_history(dir.path(), Asset::Eth, 2023, 2024).unwrap();
        assert_eq!(recs.len(), 1);
    }
}

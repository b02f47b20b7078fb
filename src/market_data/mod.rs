// =============================================================================
// Market Data Module
// =============================================================================
//
// Input series for the analysis engine:
//   - JoinedSample      — one CFTC report row (or daily price row) with the
//                         spot close joined on; any column may be missing
//   - WeeklyObservation — one row of the report-day aligned weekly series
//
// Sources: CFTC TFF yearly archives (`archive`) unpacked into annual text
// files (`cftc`), daily close CSVs or the Binance klines endpoint (`prices`,
// `crate::binance`).

pub mod archive;
pub mod cftc;
pub mod prices;
pub mod weekly;

pub use archive::{ArchiveStatus, CftcArchiveClient, YearSync};
pub use cftc::{load_cftc_history, parse_tff_report, CftcRecord};
pub use prices::{join_nearest, parse_price_csv, PricePoint};
pub use weekly::{align_weekly, select_window};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One row of the mixed-frequency joined series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinedSample {
    pub date: NaiveDate,
    #[serde(default)]
    pub close_price: Option<f64>,
    /// Leveraged-fund short contracts.
    #[serde(default)]
    pub short_open_interest: Option<f64>,
    /// Asset-manager short contracts (chart context only).
    #[serde(default)]
    pub asset_manager_short_open_interest: Option<f64>,
}

/// One row of the weekly aligned series.  Dates are strictly increasing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeeklyObservation {
    /// The week's anchor day (report weekday).
    pub date: NaiveDate,
    pub short_open_interest: f64,
    pub close_price: f64,
    #[serde(default)]
    pub asset_manager_short_open_interest: Option<f64>,
}

/// Inclusive calendar range selected by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start && date <= self.end
    }
}

// =============================================================================
// COT Radar — CME crypto futures positioning analysis
// =============================================================================
//
// Reads the CFTC Traders-in-Financial-Futures report, joins it with spot
// closes and classifies what leveraged funds are doing with their shorts:
// a range-level trend, a week-by-week behavior log and a final verdict.
// =============================================================================

pub mod analysis;
pub mod api;
pub mod app_state;
pub mod backtest;
pub mod binance;
pub mod chart;
pub mod market_data;
pub mod runtime_config;
pub mod types;

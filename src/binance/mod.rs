// =============================================================================
// Binance Module
// =============================================================================
//
// Public spot-price history used when no local price CSV is cached.

pub mod client;

pub use client::{parse_daily_klines, BinanceClient};

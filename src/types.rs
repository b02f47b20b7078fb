// =============================================================================
// Shared types used across the COT radar engine
// =============================================================================

use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Crypto futures market tracked against the CFTC TFF report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Asset {
    #[serde(rename = "BTC", alias = "btc")]
    Btc,
    #[serde(rename = "ETH", alias = "eth")]
    Eth,
}

impl Asset {
    pub const ALL: [Asset; 2] = [Asset::Btc, Asset::Eth];

    /// Spot price ticker as used by the price feeds (`BTC-USD`).
    pub fn ticker(self) -> &'static str {
        match self {
            Self::Btc => "BTC-USD",
            Self::Eth => "ETH-USD",
        }
    }

    /// Substring matched against `Market_and_Exchange_Names` in the report.
    pub fn cftc_name(self) -> &'static str {
        match self {
            Self::Btc => "BITCOIN",
            Self::Eth => "ETHER",
        }
    }

    /// CME contract size in coins.
    pub fn contract_multiplier(self) -> f64 {
        match self {
            Self::Btc => 5.0,
            Self::Eth => 50.0,
        }
    }

    /// Binance spot symbol used for daily closes.
    pub fn spot_symbol(self) -> &'static str {
        match self {
            Self::Btc => "BTCUSDT",
            Self::Eth => "ETHUSDT",
        }
    }

    /// Display color for the price line.
    pub fn color(self) -> &'static str {
        match self {
            Self::Btc => "orange",
            Self::Eth => "purple",
        }
    }
}

impl std::fmt::Display for Asset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Btc => write!(f, "BTC"),
            Self::Eth => write!(f, "ETH"),
        }
    }
}

impl FromStr for Asset {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "btc" | "bitcoin" | "btc-usd" | "btcusdt" => Ok(Self::Btc),
            "eth" | "ether" | "ethereum" | "eth-usd" | "ethusdt" => Ok(Self::Eth),
            other => anyhow::bail!("unknown asset '{other}' (expected BTC or ETH)"),
        }
    }
}

/// Qualitative severity / direction marker attached to trends and verdicts.
///
/// green = bullish-healthy, red = bearish, orange = caution, blue =
/// accumulation opportunity, gray = neutral.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorTag {
    Green,
    Red,
    Orange,
    Blue,
    Gray,
}

impl Default for ColorTag {
    fn default() -> Self {
        Self::Gray
    }
}

impl std::fmt::Display for ColorTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Green => write!(f, "green"),
            Self::Red => write!(f, "red"),
            Self::Orange => write!(f, "orange"),
            Self::Blue => write!(f, "blue"),
            Self::Gray => write!(f, "gray"),
        }
    }
}

/// The strategy the tracked traders were last seen running.
///
/// Lives only for the duration of one state-machine run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MarketMode {
    /// No active strategy.
    Neutral,
    /// Cash-and-carry: long spot, short futures.
    Farmer,
    /// Bear raid: spot dumping while piling into shorts.
    Hunter,
}

impl Default for MarketMode {
    fn default() -> Self {
        Self::Neutral
    }
}

impl std::fmt::Display for MarketMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Neutral => write!(f, "NEUTRAL"),
            Self::Farmer => write!(f, "FARMER"),
            Self::Hunter => write!(f, "HUNTER"),
        }
    }
}

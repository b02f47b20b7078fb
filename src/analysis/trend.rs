// =============================================================================
// Trend Classifier — Range-level smart-money trend
// =============================================================================
//
// Labels the whole selected range from the range metrics.  Ordered decision
// list, first match wins:
//
//   1. DOMINANT MOVE — |range OI| > dominant_oi_move_pct
//        OI up:   price up → Strong Accumulation, price down → Dip
//                 Accumulation, else → Absorbing
//        OI down: price down → Mass Exodus, price up → Squeeze Rally,
//                 else → Profit Taking
//   2. CO-MOVEMENT — |correlation| > correlation_threshold
//        positive: OI up → Bullish Sync, else → Bearish Sync
//        negative: price up → Weak Rally, else → Bear Raid
//   3. WEAK SIGNAL — OI > bias → Accumulation Bias, OI < -bias →
//        Distribution Bias, else → Neutral

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::analysis::metrics::Metrics;
use crate::analysis::narrative;
use crate::runtime_config::AnalysisThresholds;
use crate::types::ColorTag;

// =============================================================================
// Types
// =============================================================================

/// Closed set of range-level trend labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TrendCategory {
    StrongAccumulation,
    DipAccumulation,
    Absorbing,
    MassExodus,
    SqueezeRally,
    ProfitTaking,
    BullishSync,
    BearishSync,
    WeakRally,
    BearRaid,
    AccumulationBias,
    DistributionBias,
    Neutral,
}

/// Machine-readable grouping the verdict synthesizer branches on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TrendFamily {
    /// Shorts built up: Strong/Dip Accumulation, Absorbing, Accumulation Bias.
    Accumulation,
    /// Shorts unwound: Mass Exodus, Distribution Bias.
    Distribution,
    /// Predatory shorting.
    BearRaid,
    Other,
}

impl TrendCategory {
    pub fn family(self) -> TrendFamily {
        match self {
            Self::StrongAccumulation
            | Self::DipAccumulation
            | Self::Absorbing
            | Self::AccumulationBias => TrendFamily::Accumulation,
            Self::MassExodus | Self::DistributionBias => TrendFamily::Distribution,
            Self::BearRaid => TrendFamily::BearRaid,
            Self::SqueezeRally
            | Self::ProfitTaking
            | Self::BullishSync
            | Self::BearishSync
            | Self::WeakRally
            | Self::Neutral => TrendFamily::Other,
        }
    }

    pub fn color(self) -> ColorTag {
        match self {
            Self::StrongAccumulation | Self::BullishSync | Self::AccumulationBias => {
                ColorTag::Green
            }
            Self::DipAccumulation | Self::Absorbing => ColorTag::Blue,
            Self::MassExodus | Self::BearishSync | Self::BearRaid | Self::DistributionBias => {
                ColorTag::Red
            }
            Self::SqueezeRally | Self::ProfitTaking | Self::WeakRally => ColorTag::Orange,
            Self::Neutral => ColorTag::Gray,
        }
    }

    /// Display label.
    pub fn label(self) -> &'static str {
        narrative::trend_template(self).status
    }
}

impl std::fmt::Display for TrendCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Trend label plus its rendered description.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrendAssessment {
    pub category: TrendCategory,
    pub family: TrendFamily,
    pub status: String,
    pub description: String,
    pub color_tag: ColorTag,
}

impl TrendAssessment {
    /// Classify `metrics` and render the matching description.
    pub fn assess(metrics: &Metrics, thresholds: &AnalysisThresholds) -> Self {
        let category = classify_trend(metrics, thresholds);
        Self::for_category(category, metrics)
    }

    pub fn for_category(category: TrendCategory, metrics: &Metrics) -> Self {
        let template = narrative::trend_template(category);
        let description = narrative::render(
            template.description,
            metrics.range_oi_delta_pct,
            metrics.range_price_delta_pct,
        );
        Self {
            category,
            family: category.family(),
            status: template.status.to_string(),
            description,
            color_tag: category.color(),
        }
    }
}

// =============================================================================
// Classification logic
// =============================================================================

/// Evaluate the ordered decision list over the range-level metrics.
pub fn classify_trend(metrics: &Metrics, t: &AnalysisThresholds) -> TrendCategory {
    let oi = metrics.range_oi_delta_pct;
    let price = metrics.range_price_delta_pct;
    let corr = metrics.correlation;

    // 1. Dominant whale move.
    if oi > t.dominant_oi_move_pct {
        return if price > t.range_price_move_pct {
            TrendCategory::StrongAccumulation
        } else if price < -t.range_price_move_pct {
            TrendCategory::DipAccumulation
        } else {
            TrendCategory::Absorbing
        };
    }
    if oi < -t.dominant_oi_move_pct {
        return if price < -t.range_price_move_pct {
            TrendCategory::MassExodus
        } else if price > t.range_price_move_pct {
            TrendCategory::SqueezeRally
        } else {
            TrendCategory::ProfitTaking
        };
    }

    // 2. Confirmed co-movement.
    if corr.abs() > t.correlation_threshold {
        return match (corr > 0.0, oi > 0.0, price > 0.0) {
            (true, true, _) => TrendCategory::BullishSync,
            (true, false, _) => TrendCategory::BearishSync,
            (false, _, true) => TrendCategory::WeakRally,
            (false, _, false) => TrendCategory::BearRaid,
        };
    }

    // 3. Weak / no correlation.
    trace!(
        oi = format!("{:.2}", oi),
        corr = format!("{:.3}", corr),
        "Trend: weak-signal fallback"
    );
    if oi > t.bias_oi_pct {
        TrendCategory::AccumulationBias
    } else if oi < -t.bias_oi_pct {
        TrendCategory::DistributionBias
    } else {
        TrendCategory::Neutral
    }
}

// =============================================================================
// Verdict Synthesizer — One headline from trend + last week
// =============================================================================
//
// Ordered override list, first match wins.  The two hard overrides look only
// at the latest week and dominate anything derived from the range trend:
//
//   1. Bear raid last week (price < -3 %, OI > +5 %)  → Dead Cat Bounce  red
//   2. Squeeze last week   (OI < -5 %, price > +1 %)  → Fake Pump        orange
//   3. Accumulation family AND 1w OI < -5 %           → Trend Reversal   orange
//   4. Bear Raid family                               → Bear Raid        red
//   5. Distribution family AND 1w OI > +5 %           → Potential Bottom blue
//   6. Accumulation family AND 1w OI > 0              → Strong Buy       green
//   7. Distribution family AND 1w OI < 0              → Strong Sell      red
//   8. otherwise the trend label holds with its own color.

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::analysis::metrics::Metrics;
use crate::analysis::narrative::{self, VerdictTemplate};
use crate::analysis::trend::{TrendAssessment, TrendCategory, TrendFamily};
use crate::runtime_config::AnalysisThresholds;
use crate::types::ColorTag;

/// Closed set of verdicts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE", tag = "kind", content = "trend")]
pub enum VerdictKind {
    DeadCatBounce,
    FakePump,
    TrendReversal,
    BearRaid,
    PotentialBottom,
    StrongBuy,
    StrongSell,
    /// The range trend passes through unchanged.
    Holds(TrendCategory),
    /// Invalid window; no analysis ran.
    InsufficientData,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Verdict {
    pub kind: VerdictKind,
    pub headline: String,
    pub color_tag: ColorTag,
    pub forecast_text: String,
}

impl Verdict {
    fn from_template(kind: VerdictKind, template: VerdictTemplate, color_tag: ColorTag) -> Self {
        Self {
            kind,
            headline: template.headline.to_string(),
            color_tag,
            forecast_text: template.forecast.to_string(),
        }
    }

    pub fn insufficient_data() -> Self {
        Self::from_template(
            VerdictKind::InsufficientData,
            narrative::INSUFFICIENT_DATA,
            ColorTag::Gray,
        )
    }

    fn holds(trend: &TrendAssessment) -> Self {
        Self {
            kind: VerdictKind::Holds(trend.category),
            headline: narrative::holding_headline(&trend.status),
            color_tag: trend.color_tag,
            forecast_text: narrative::holding_forecast(trend.family).to_string(),
        }
    }
}

/// Combine the range trend with the latest weekly deltas.
pub fn synthesize(
    metrics: &Metrics,
    trend: &TrendAssessment,
    t: &AnalysisThresholds,
) -> Verdict {
    let oi = metrics.one_week_oi_delta_pct;
    let price = metrics.one_week_price_delta_pct;
    let family = trend.family;

    use VerdictKind as K;
    let verdict = if t.is_bear_raid(oi, price) {
        Verdict::from_template(K::DeadCatBounce, narrative::DEAD_CAT_BOUNCE, ColorTag::Red)
    } else if t.is_squeeze(oi, price) {
        Verdict::from_template(K::FakePump, narrative::FAKE_PUMP, ColorTag::Orange)
    } else if family == TrendFamily::Accumulation && oi < -t.reversal_oi_drop_pct {
        Verdict::from_template(K::TrendReversal, narrative::TREND_REVERSAL, ColorTag::Orange)
    } else if family == TrendFamily::BearRaid {
        Verdict::from_template(K::BearRaid, narrative::BEAR_RAID, ColorTag::Red)
    } else if family == TrendFamily::Distribution && oi > t.bottom_oi_surge_pct {
        Verdict::from_template(K::PotentialBottom, narrative::POTENTIAL_BOTTOM, ColorTag::Blue)
    } else if family == TrendFamily::Accumulation && oi > 0.0 {
        Verdict::from_template(K::StrongBuy, narrative::STRONG_BUY, ColorTag::Green)
    } else if family == TrendFamily::Distribution && oi < 0.0 {
        // Mass Exodus counts as distribution here, not only Distribution Bias.
        Verdict::from_template(K::StrongSell, narrative::STRONG_SELL, ColorTag::Red)
    } else {
        Verdict::holds(trend)
    };

    trace!(
        oi = format!("{:.2}", oi),
        price = format!("{:.2}", price),
        trend = %trend.category,
        verdict = ?verdict.kind,
        "verdict synthesized"
    );
    verdict
}

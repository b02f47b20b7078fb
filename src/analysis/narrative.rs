// =============================================================================
// Narrative templates — presentation text keyed by classification tag
// =============================================================================
//
// Classification code never reads these strings; it only looks up the
// template for the tag it already decided on.  Templates may embed `{oi}` and
// `{price}` placeholders, rendered as signed one-decimal percentages.

use crate::analysis::behavior::BehaviorKind;
use crate::analysis::trend::{TrendCategory, TrendFamily};

#[derive(Debug, Clone, Copy)]
pub struct TrendTemplate {
    pub status: &'static str,
    pub description: &'static str,
}

#[derive(Debug, Clone, Copy)]
pub struct BehaviorTemplate {
    pub tag: &'static str,
    pub title: &'static str,
    pub description: &'static str,
    pub prediction: &'static str,
}

#[derive(Debug, Clone, Copy)]
pub struct VerdictTemplate {
    pub headline: &'static str,
    pub forecast: &'static str,
}

/// Substitute `{oi}` / `{price}` with signed one-decimal values.
pub fn render(template: &str, oi_pct: f64, price_pct: f64) -> String {
    template
        .replace("{oi}", &format!("{:+.1}", oi_pct))
        .replace("{price}", &format!("{:+.1}", price_pct))
}

// =============================================================================
// Range trend
// =============================================================================

pub fn trend_template(category: TrendCategory) -> TrendTemplate {
    use TrendCategory::*;
    let (status, description) = match category {
        StrongAccumulation => (
            "Strong Accumulation",
            "Short interest expanded sharply ({oi}%) while price rose. Classic cash-and-carry \
            build driving an uptrend.",
        ),
        DipAccumulation => (
            "Dip Accumulation",
            "Price fell but smart money kept adding shorts ({oi}%) against bought spot. Fear \
            used as an entry.",
        ),
        Absorbing => (
            "Absorbing",
            "Price went sideways while a large position ({oi}%) was built underneath. Energy is \
            compressing.",
        ),
        MassExodus => (
            "Mass Exodus",
            "Capital left alongside the price drop ({oi}%). The downtrend is strong.",
        ),
        SqueezeRally => (
            "Squeeze Rally",
            "Price rose on short covering ({oi}%) rather than new buying. Possibly a fake rebound.",
        ),
        ProfitTaking => (
            "Profit Taking",
            "Positions are being closed quietly ({oi}%) without moving price.",
        ),
        BullishSync => (
            "Bullish Sync",
            "Price and short OI are rising together. A healthy uptrend.",
        ),
        BearishSync => (
            "Bearish Sync",
            "Price and OI are falling together. Market energy is fading.",
        ),
        WeakRally => (
            "Weak Rally",
            "Price is rising while the main short holders are leaving.",
        ),
        BearRaid => (
            "Bear Raid",
            "Spot is being dumped to push price down while leveraged shorts collect the gain. \
            Predatory shorting.",
        ),
        AccumulationBias => (
            "Accumulation Bias",
            "Correlation is weak but positions keep growing ({oi}%).",
        ),
        DistributionBias => (
            "Distribution Bias",
            "No clear direction while positions slowly shrink ({oi}%).",
        ),
        Neutral => (
            "Neutral/Sideways",
            "No clear direction; price oscillated within a range.",
        ),
    };
    TrendTemplate { status, description }
}

// =============================================================================
// Weekly behavior
// =============================================================================

pub fn behavior_template(kind: BehaviorKind) -> BehaviorTemplate {
    use BehaviorKind::*;
    let (tag, title, description, prediction) = match kind {
        BearRaid => (
            "🩸",
            "Bear Raid",
            "Spot dumping forced the price down ({price}%) while futures shorts were added \
            abruptly ({oi}%). Predatory hunting mode engaged.",
            "Deliberate suppression. Stay out until a bottom signal appears.",
        ),
        MomentumFarming => (
            "🌱",
            "Momentum Farming",
            "Started a cash-and-carry farm (long spot, short futures) riding the rally. A \
            healthy entry.",
            "Upside momentum should strengthen. Watch for short-term overheating.",
        ),
        DipBuying => (
            "🐜",
            "Dip Buying",
            "Used the price drop ({price}%) to buy spot cheaply and build the short hedge.",
            "Smart-money dip buying confirmed. A rebound is likely once positions are filled.",
        ),
        Accumulation => (
            "📦",
            "Accumulation",
            "Positions growing quietly ({oi}%) without disturbing price.",
            "Energy is compressing. A breakout move is expected soon.",
        ),
        BookClosing => (
            "💰",
            "Book Closing",
            "Year-end: the whole year's carry was realised and the books closed.",
            "Major desks are on holiday. Expect a Santa rally into thin books or sideways drift.",
        ),
        QuarterlyRollover => (
            "🔄",
            "Quarterly Rollover",
            "Positions are being rolled ahead of expiry. A contract swap, not a trend change.",
            "The prior trend should resume once the rollover completes.",
        ),
        Looting => (
            "🍖",
            "Looting",
            "After a successful raid, large profits are being realised into the decline.",
            "Once the selling pressure is spent a technical rebound should follow.",
        ),
        MissionAccomplished => (
            "😎",
            "Mission Accomplished",
            "Raid target reached; the remaining position is being unwound into strength.",
            "The operation is over. Directionless trade is likely for a while.",
        ),
        EndHunt => (
            "📉",
            "End Hunt",
            "Raid positions are being closed ({oi}%).",
            "Volatility should contract.",
        ),
        Harvesting => (
            "🌾",
            "Harvesting",
            "Farmed positions are being closed to realise normal carry profits. Not panic selling.",
            "Profit-taking supply is hitting the market. A healthy correction.",
        ),
        Squeeze => (
            "🔥",
            "Squeeze",
            "An unexpected spike ({price}%) forced the farm into stop-loss liquidation.",
            "Once forced covering is exhausted a sharp drop is possible.",
        ),
        Reduce => (
            "📉",
            "Reduce",
            "Exposure trimmed ({oi}%) for risk management.",
            "Wait-and-see sentiment should deepen.",
        ),
        Exit => (
            "🏃",
            "Exit",
            "Leaving the market on a worsening outlook ({oi}%).",
            "The downtrend may continue.",
        ),
        ShortSqueeze => (
            "💸",
            "Short Squeeze",
            "Forced covering on a sharp price rise ({price}%).",
            "Avoid chasing the move.",
        ),
        Deleveraging => (
            "📉",
            "De-leveraging",
            "Positions reduced ({oi}%) to wait on the sidelines.",
            "Sideways trade expected.",
        ),
        Wait => (
            "😐",
            "Wait",
            "No meaningful position change. Existing carry positions are being held.",
            "Sideways trade or a gentle continuation of the current trend.",
        ),
    };
    BehaviorTemplate {
        tag,
        title,
        description,
        prediction,
    }
}

// =============================================================================
// Verdict
// =============================================================================

pub const DEAD_CAT_BOUNCE: VerdictTemplate = VerdictTemplate {
    headline: "🩸 Dead Cat Bounce Warning",
    forecast: "Bull trap: a bear raid was detected. Historically a technical bounce follows \
        within a week about 67% of the time, but the price is lower four weeks later about 55% \
        of the time. Use the bounce to exit.",
};

pub const FAKE_PUMP: VerdictTemplate = VerdictTemplate {
    headline: "💥 Fake Pump Alert",
    forecast: "Price rose while shorts collapsed. This looks like covering rather than new \
        buying; historically the price fell again within a week about 64% of the time. Do not \
        chase.",
};

pub const TREND_REVERSAL: VerdictTemplate = VerdictTemplate {
    headline: "⚠️ Trend Reversal Warning",
    forecast: "The long accumulation trend broke with a large exit. Drop the bullish view and \
        manage risk.",
};

pub const BEAR_RAID: VerdictTemplate = VerdictTemplate {
    headline: "⚠️ Bear Raid",
    forecast: "Price is being pressed down deliberately. Do not join the selling; wait for a \
        bottom signal and beware a sharp rebound when the shorts take profit.",
};

pub const POTENTIAL_BOTTOM: VerdictTemplate = VerdictTemplate {
    headline: "💎 Potential Bottom",
    forecast: "Strong smart-money inflow at the tail of a downtrend. A good entry if the trend \
        reverses.",
};

pub const STRONG_BUY: VerdictTemplate = VerdictTemplate {
    headline: "🔥 Strong Buy",
    forecast: "Both the long-term trend and last week's behavior point to buying. The rally is \
        very likely to continue.",
};

pub const STRONG_SELL: VerdictTemplate = VerdictTemplate {
    headline: "🩸 Strong Sell",
    forecast: "Selling is feeding on itself. Stay out until a bottom signal appears.",
};

pub const INSUFFICIENT_DATA: VerdictTemplate = VerdictTemplate {
    headline: "Insufficient Data",
    forecast: "Not enough data to reach a verdict.",
};

/// Forecast sentence for a trend label passed through unchanged.
pub fn holding_forecast(family: TrendFamily) -> &'static str {
    match family {
        TrendFamily::Accumulation => {
            "The broad accumulation trend is intact and pausing. Hold existing positions."
        }
        TrendFamily::Distribution => "Capital keeps leaving. A conservative stance is warranted.",
        TrendFamily::BearRaid => "Aggressive short bets continue. Downside pressure remains high.",
        TrendFamily::Other => "No clear direction. Range trading or waiting is favoured.",
    }
}

/// Headline for a trend label passed through unchanged.
pub fn holding_headline(status: &str) -> String {
    format!("{status} holds")
}

// =============================================================================
// Metrics Calculator — Percentage deltas and price/OI correlation
// =============================================================================
//
// Three lookback pairs over the aligned window:
//   range    — first row vs last row
//   1 week   — second-to-last vs last
//   1 month  — (lookback+1)th-from-last vs last, falling back to the range
//              delta on short windows
//
// Nothing here can fail: a zero / non-finite denominator yields a 0 % delta
// and a degenerate correlation yields 0.

use serde::{Deserialize, Serialize};

use crate::market_data::WeeklyObservation;
use crate::runtime_config::AnalysisThresholds;

/// Derived, immutable metrics for one analysis window.  Percent units.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Metrics {
    pub range_oi_delta_pct: f64,
    pub range_price_delta_pct: f64,
    /// Pearson correlation of close price vs short OI, in [-1, 1].
    pub correlation: f64,
    pub one_week_oi_delta_pct: f64,
    pub one_week_price_delta_pct: f64,
    pub one_month_oi_delta_pct: f64,
}

impl Metrics {
    /// Compute all metrics for `window` (chronological order).
    ///
    /// Windows shorter than two rows produce all-zero metrics.
    pub fn compute(window: &[WeeklyObservation], thresholds: &AnalysisThresholds) -> Self {
        let (Some(first), Some(last)) = (window.first(), window.last()) else {
            return Self::default();
        };
        if window.len() < 2 {
            return Self::default();
        }
        let prev = &window[window.len() - 2];

        let range_oi_delta_pct = pct_delta(first.short_open_interest, last.short_open_interest);
        let range_price_delta_pct = pct_delta(first.close_price, last.close_price);

        let lookback = thresholds.one_month_lookback_weeks.max(1);
        let one_month_oi_delta_pct = match window.len().checked_sub(lookback + 1) {
            Some(idx) => pct_delta(window[idx].short_open_interest, last.short_open_interest),
            None => range_oi_delta_pct,
        };

        let correlation = if window.len() >= thresholds.min_correlation_points.max(2) {
            let prices: Vec<f64> = window.iter().map(|w| w.close_price).collect();
            let shorts: Vec<f64> = window.iter().map(|w| w.short_open_interest).collect();
            pearson_correlation(&prices, &shorts)
        } else {
            0.0
        };

        Self {
            range_oi_delta_pct,
            range_price_delta_pct,
            correlation,
            one_week_oi_delta_pct: pct_delta(prev.short_open_interest, last.short_open_interest),
            one_week_price_delta_pct: pct_delta(prev.close_price, last.close_price),
            one_month_oi_delta_pct,
        }
    }
}

/// `(end - start) / start * 100`, or 0 when the result would not be finite.
pub fn pct_delta(start: f64, end: f64) -> f64 {
    if start == 0.0 {
        return 0.0;
    }
    let delta = (end - start) / start * 100.0;
    if delta.is_finite() {
        delta
    } else {
        0.0
    }
}

/// Pearson correlation of two equal-length series.
///
/// Returns 0 for fewer than two pairs, mismatched lengths, zero variance or
/// any non-finite intermediate.  The result is clamped to [-1, 1].
pub fn pearson_correlation(xs: &[f64], ys: &[f64]) -> f64 {
    if xs.len() != ys.len() || xs.len() < 2 {
        return 0.0;
    }
    let n = xs.len() as f64;
    let mean_x = xs.iter().sum::<f64>() / n;
    let mean_y = ys.iter().sum::<f64>() / n;

    let mut cov = 0.0;
    let mut var_x = 0.0;
    let mut var_y = 0.0;
    for (&x, &y) in xs.iter().zip(ys) {
        let dx = x - mean_x;
        let dy = y - mean_y;
        cov += dx * dy;
        var_x += dx * dx;
        var_y += dy * dy;
    }

    let r = cov / (var_x * var_y).sqrt();
    if r.is_finite() {
        r.clamp(-1.0, 1.0)
    } else {
        0.0
    }
}

// =============================================================================
// Chart overlay — Price vs CME short interest series for renderers
// =============================================================================
//
// Turns the joined report series into ready-to-plot rows: the spot close on
// the left axis, leveraged-fund and asset-manager shorts on the right.
// Options:
//   - dollar value  : contracts x close x CME multiplier instead of counts
//   - smoothing     : trailing rolling mean, undefined until the window fills
//   - highlights    : week-over-week change of the leveraged series beyond
//                     +/- threshold is a surge / plunge
// Rendering itself lives outside this crate.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::analysis::metrics::pct_delta;
use crate::market_data::{DateRange, JoinedSample};
use crate::runtime_config::ChartOptions;
use crate::types::Asset;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeHighlight {
    /// Sharp short build (bearish pressure).
    Surge,
    /// Sharp short unwind.
    Plunge,
    Normal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartPoint {
    pub date: NaiveDate,
    pub price: Option<f64>,
    pub leveraged_shorts: Option<f64>,
    pub asset_manager_shorts: Option<f64>,
    pub highlight: ChangeHighlight,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartSeries {
    pub asset: Asset,
    pub title: String,
    pub price_axis_title: String,
    pub short_axis_title: String,
    pub price_color: String,
    pub points: Vec<ChartPoint>,
    /// Range to shade as the analysed window.
    pub analysis_range: Option<DateRange>,
}

/// Build the overlay series from the report rows of `samples`.
pub fn prepare_chart(
    samples: &[JoinedSample],
    asset: Asset,
    options: &ChartOptions,
    analysis_range: Option<DateRange>,
) -> ChartSeries {
    let mut reports: Vec<&JoinedSample> = samples
        .iter()
        .filter(|s| s.short_open_interest.is_some())
        .collect();
    reports.sort_by_key(|s| s.date);

    let to_display = |contracts: Option<f64>, price: Option<f64>| -> Option<f64> {
        if options.show_dollar_value {
            Some(contracts? * price? * asset.contract_multiplier())
        } else {
            contracts
        }
    };

    let mut leveraged: Vec<Option<f64>> = reports
        .iter()
        .map(|s| to_display(s.short_open_interest, s.close_price))
        .collect();
    let mut asset_mgr: Vec<Option<f64>> = reports
        .iter()
        .map(|s| to_display(s.asset_manager_short_open_interest, s.close_price))
        .collect();

    if options.smoothing_window > 0 {
        leveraged = rolling_mean(&leveraged, options.smoothing_window);
        asset_mgr = rolling_mean(&asset_mgr, options.smoothing_window);
    }

    let highlights = if options.highlight_changes {
        change_highlights(&leveraged, options.highlight_threshold_pct)
    } else {
        vec![ChangeHighlight::Normal; leveraged.len()]
    };

    let points = reports
        .iter()
        .zip(leveraged)
        .zip(asset_mgr)
        .zip(highlights)
        .map(|(((s, lev), am), highlight)| ChartPoint {
            date: s.date,
            price: s.close_price,
            leveraged_shorts: lev,
            asset_manager_shorts: am,
            highlight,
        })
        .collect();

    let short_axis_title = if options.show_dollar_value {
        "Short Interest (USD Value)"
    } else {
        "Short Interest (Contract Count)"
    };

    ChartSeries {
        asset,
        title: format!("{asset} Price vs CME Futures Short Interest"),
        price_axis_title: format!("{asset} Price (USD)"),
        short_axis_title: short_axis_title.to_string(),
        price_color: asset.color().to_string(),
        points,
        analysis_range,
    }
}

/// Trailing mean over `window` values; `None` until the window is full or
/// while any value inside it is missing.
pub fn rolling_mean(values: &[Option<f64>], window: usize) -> Vec<Option<f64>> {
    if window == 0 {
        return values.to_vec();
    }
    (0..values.len())
        .map(|i| {
            let start = (i + 1).checked_sub(window)?;
            let sum = values[start..=i]
                .iter()
                .try_fold(0.0, |acc, v| v.map(|x| acc + x))?;
            Some(sum / window as f64)
        })
        .collect()
}

/// Classify each step of `series` against +/- `threshold_pct`.
pub fn change_highlights(series: &[Option<f64>], threshold_pct: f64) -> Vec<ChangeHighlight> {
    let mut out = Vec::with_capacity(series.len());
    let mut prev: Option<f64> = None;
    for &value in series {
        let highlight = match (prev, value) {
            (Some(p), Some(v)) if p != 0.0 => {
                let change = pct_delta(p, v);
                if change > threshold_pct {
                    ChangeHighlight::Surge
                } else if change < -threshold_pct {
                    ChangeHighlight::Plunge
                } else {
                    ChangeHighlight::Normal
                }
            }
            _ => ChangeHighlight::Normal,
        };
        out.push(highlight);
        prev = value;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(day: u32, price: Option<f64>, lev: Option<f64>, am: Option<f64>) -> JoinedSample {
        JoinedSample {
            date: NaiveDate::from_ymd_opt(2024, 1, day).unwrap(),
            close_price: price,
            short_open_interest: lev,
            asset_manager_short_open_interest: am,
        }
    }

    fn raw() -> ChartOptions {
        ChartOptions {
            show_dollar_value: false,
            smoothing_window: 0,
            highlight_changes: true,
            highlight_threshold_pct: 10.0,
        }
    }

    #[test]
    fn rolling_mean_waits_for_full_window() {
        let v = [Some(1.0), Some(2.0), Some(3.0), Some(4.0)];
        assert_eq!(rolling_mean(&v, 2), vec![None, Some(1.5), Some(2.5), Some(3.5)]);
        assert_eq!(rolling_mean(&v, 5), vec![None; 4]);
        let gap = [Some(1.0), None, Some(3.0), Some(5.0)];
        assert_eq!(rolling_mean(&gap, 2), vec![None, None, None, Some(4.0)]);
    }

    #[test]
    fn highlights_follow_threshold() {
        let series = [
            None,
            Some(100.0),
            Some(115.0),
            Some(100.0),
            Some(105.0),
            Some(0.0),
            Some(10.0),
        ];
        assert_eq!(
            change_highlights(&series, 10.0),
            vec![
                ChangeHighlight::Normal,
                ChangeHighlight::Normal,
                ChangeHighlight::Surge,
                ChangeHighlight::Plunge,
                ChangeHighlight::Normal,
                ChangeHighlight::Plunge,
                ChangeHighlight::Normal,
            ]
        );
    }

    #[test]
    fn keeps_only_report_rows_in_date_order() {
        let samples = vec![
            sample(12, Some(110.0), Some(1_200.0), Some(50.0)),
            sample(3, Some(101.0), None, None),
            sample(5, Some(100.0), Some(1_000.0), Some(40.0)),
        ];
        let chart = prepare_chart(&samples, Asset::Btc, &raw(), None);
        assert_eq!(chart.points.len(), 2);
        assert_eq!(chart.points[0].leveraged_shorts, Some(1_000.0));
        assert_eq!(chart.points[1].highlight, ChangeHighlight::Surge);
        assert_eq!(chart.short_axis_title, "Short Interest (Contract Count)");
        assert_eq!(chart.price_color, "orange");
    }

    #[test]
    fn dollar_value_uses_contract_multiplier() {
        let samples = vec![sample(5, Some(2_000.0), Some(10.0), None)];
        let options = ChartOptions {
            show_dollar_value: true,
            ..raw()
        };
        let chart = prepare_chart(&samples, Asset::Eth, &options, None);
        assert_eq!(chart.points[0].leveraged_shorts, Some(10.0 * 2_000.0 * 50.0));
        assert_eq!(chart.points[0].asset_manager_shorts, None);
        assert_eq!(chart.short_axis_title, "Short Interest (USD Value)");
    }

    #[test]
    fn disabled_highlights_are_normal() {
        let samples = vec![
            sample(5, Some(1.0), Some(100.0), None),
            sample(12, Some(1.0), Some(200.0), None),
        ];
        let options = ChartOptions {
            highlight_changes: false,
            ..raw()
        };
        let chart = prepare_chart(&samples, Asset::Btc, &options, None);
        assert!(chart.points.iter().all(|p| p.highlight == ChangeHighlight::Normal));
    }

    #[test]
    fn smoothing_blanks_the_warmup() {
        let samples: Vec<JoinedSample> = (0..5)
            .map(|i| sample(1 + i * 7, Some(1.0), Some(100.0 + i as f64), None))
            .collect();
        let chart = prepare_chart(&samples, Asset::Btc, &ChartOptions::default(), None);
        assert!(chart.points[..3].iter().all(|p| p.leveraged_shorts.is_none()));
        assert_eq!(chart.points[3].leveraged_shorts, Some(101.5));
    }
}

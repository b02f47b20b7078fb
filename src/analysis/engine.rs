// =============================================================================
// Market Analyzer — End-to-end classification pipeline
// =============================================================================
//
//   joined samples ─► window ─► Weekly Aligner ─► Metrics
//                                     │              ├─► Trend Classifier ─┐
//                                     └─► Weekly State Machine             ├─► Verdict
//                                                     Metrics ─────────────┘
//
// The analyzer owns nothing but a threshold snapshot and the week anchor, so
// every call is independent and pure: the same input always yields the same
// result.  Degenerate windows come back as `is_valid = false` with zeroed
// metrics instead of an error.

use chrono::Weekday;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::analysis::behavior::{classify_weeks, WeeklyEvent};
use crate::analysis::metrics::Metrics;
use crate::analysis::trend::{TrendAssessment, TrendCategory};
use crate::analysis::verdict::{synthesize, Verdict};
use crate::market_data::{align_weekly, select_window, DateRange, JoinedSample, WeeklyObservation};
use crate::runtime_config::{AnalysisThresholds, RuntimeConfig};

/// Full output of one analysis call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    pub is_valid: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub metrics: Metrics,
    pub trend: TrendAssessment,
    /// Newest first.
    pub weekly_events: Vec<WeeklyEvent>,
    pub verdict: Verdict,
    /// The aligned weekly series the result was computed from.
    pub weeks: Vec<WeeklyObservation>,
}

impl AnalysisResult {
    fn invalid(reason: String, weeks: Vec<WeeklyObservation>) -> Self {
        let metrics = Metrics::default();
        Self {
            is_valid: false,
            error: Some(reason),
            trend: TrendAssessment::for_category(TrendCategory::Neutral, &metrics),
            metrics,
            weekly_events: Vec::new(),
            verdict: Verdict::insufficient_data(),
            weeks,
        }
    }
}

#[derive(Debug, Clone)]
pub struct MarketAnalyzer {
    thresholds: AnalysisThresholds,
    report_weekday: Weekday,
}

impl MarketAnalyzer {
    pub fn new(thresholds: AnalysisThresholds, report_weekday: Weekday) -> Self {
        Self {
            thresholds,
            report_weekday,
        }
    }

    /// Snapshot the thresholds and week anchor from `config`.
    pub fn from_config(config: &RuntimeConfig) -> Self {
        Self::new(config.thresholds.clone(), config.report_weekday)
    }

    pub fn thresholds(&self) -> &AnalysisThresholds {
        &self.thresholds
    }

    /// Select `range` from `samples`, align it weekly and classify it.
    pub fn analyze(&self, samples: &[JoinedSample], range: DateRange) -> AnalysisResult {
        if range.start > range.end {
            return AnalysisResult::invalid(
                format!("start date {} is after end date {}", range.start, range.end),
                Vec::new(),
            );
        }
        let window = select_window(samples, range);
        let weeks = align_weekly(&window, self.report_weekday);
        self.analyze_weeks(weeks)
    }

    /// Classify an already aligned weekly series (chronological).
    pub fn analyze_weeks(&self, weeks: Vec<WeeklyObservation>) -> AnalysisResult {
        let t = &self.thresholds;
        let min_weeks = t.min_weeks.max(2);
        if weeks.len() < min_weeks {
            return AnalysisResult::invalid(
                format!(
                    "not enough weekly data in the selected range ({} of {} weeks)",
                    weeks.len(),
                    min_weeks
                ),
                weeks,
            );
        }

        let metrics = Metrics::compute(&weeks, t);
        let trend = TrendAssessment::assess(&metrics, t);
        let weekly_events = classify_weeks(&weeks, t);
        let verdict = synthesize(&metrics, &trend, t);

        debug!(
            weeks = weeks.len(),
            range_oi = format!("{:.2}", metrics.range_oi_delta_pct),
            range_price = format!("{:.2}", metrics.range_price_delta_pct),
            corr = format!("{:.3}", metrics.correlation),
            trend = %trend.category,
            verdict = %verdict.headline,
            "analysis complete"
        );

        AnalysisResult {
            is_valid: true,
            error: None,
            metrics,
            trend,
            weekly_events,
            verdict,
            weeks,
        }
    }
}

impl Default for MarketAnalyzer {
    fn default() -> Self {
        Self::new(AnalysisThresholds::default(), Weekday::Fri)
    }
}

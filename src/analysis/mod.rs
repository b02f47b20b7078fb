// =============================================================================
// Analysis Module — Smart-money classification engine
// =============================================================================
//
// Pure, synchronous, infallible.  Everything here takes an aligned weekly
// series plus an `AnalysisThresholds` snapshot and returns plain values:
//
//   metrics    — range / 1-week / 1-month deltas and price-OI correlation
//   trend      — one label for the whole range
//   behavior   — per-week state machine (NEUTRAL / FARMER / HUNTER)
//   verdict    — final headline with hard overrides
//   narrative  — display text tables keyed by the tags above
//   engine     — `MarketAnalyzer`, the pipeline tying them together

pub mod behavior;
pub mod engine;
pub mod metrics;
pub mod narrative;
pub mod trend;
pub mod verdict;

pub use behavior::{classify_weeks, transition, BehaviorKind, WeekDelta, WeeklyEvent};
pub use engine::{AnalysisResult, MarketAnalyzer};
pub use metrics::{pct_delta, pearson_correlation, Metrics};
pub use trend::{classify_trend, TrendAssessment, TrendCategory, TrendFamily};
pub use verdict::{synthesize, Verdict, VerdictKind};

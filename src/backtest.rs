// =============================================================================
// Backtest — Does the weekly signal predict the next month?
// =============================================================================
//
// Replays the weekly series, fires a directional signal on each week whose
// OI / price change matches one of the rules below, and scores it against
// the close `horizon_weeks` later.
//
//   Rule (first match wins)          Side   Wins when
//   Bear Raid   price < -3, OI > +5  SELL   forward return < 0
//   Dip Buy     price < -1, OI > +1  BUY    forward return > 0
//   Strong Buy  price > +1, OI > +5  BUY    forward return > 0
//   Squeeze     OI < -5, price > +1  SELL   forward return < 0
//
// Accuracy figures are win/total in percent, 0 when nothing fired.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::analysis::metrics::pct_delta;
use crate::market_data::WeeklyObservation;
use crate::runtime_config::BacktestParams;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SignalSide {
    Buy,
    Sell,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SignalPattern {
    BearRaid,
    DipBuy,
    StrongBuy,
    Squeeze,
}

impl SignalPattern {
    pub fn side(self) -> SignalSide {
        match self {
            Self::BearRaid | Self::Squeeze => SignalSide::Sell,
            Self::DipBuy | Self::StrongBuy => SignalSide::Buy,
        }
    }
}

impl std::fmt::Display for SignalPattern {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BearRaid => write!(f, "Bear Raid 🩸"),
            Self::DipBuy => write!(f, "Dip Buy 🐜"),
            Self::StrongBuy => write!(f, "Strong Buy 🔥"),
            Self::Squeeze => write!(f, "Squeeze 💥"),
        }
    }
}

/// One fired signal and how it played out.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignalOutcome {
    pub date: NaiveDate,
    pub pattern: SignalPattern,
    pub side: SignalSide,
    pub oi_delta_pct: f64,
    pub price_delta_pct: f64,
    pub forward_return_pct: f64,
    pub win: bool,
}

/// Win/loss tally for one group of signals.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WinStats {
    pub signals: u64,
    pub wins: u64,
}

impl WinStats {
    pub fn record(&mut self, win: bool) {
        self.signals += 1;
        if win {
            self.wins += 1;
        }
    }

    pub fn losses(&self) -> u64 {
        self.signals - self.wins
    }

    /// Win rate in percent; 0 when empty.
    pub fn accuracy_pct(&self) -> f64 {
        if self.signals == 0 {
            0.0
        } else {
            self.wins as f64 / self.signals as f64 * 100.0
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BacktestReport {
    pub horizon_weeks: usize,
    pub from: Option<NaiveDate>,
    /// Non-neutral signals, chronological.
    pub signals: Vec<SignalOutcome>,
    pub overall: WinStats,
    pub bear_raid: WinStats,
    /// All BUY signals.
    pub accumulation: WinStats,
}

/// Match one week's change against the signal rules.
pub fn detect_signal(oi_pct: f64, price_pct: f64, p: &BacktestParams) -> Option<SignalPattern> {
    if price_pct < -p.raid_price_drop_pct && oi_pct > p.raid_oi_surge_pct {
        Some(SignalPattern::BearRaid)
    } else if price_pct < -p.dip_price_drop_pct && oi_pct > p.dip_oi_rise_pct {
        Some(SignalPattern::DipBuy)
    } else if price_pct > p.strong_price_rise_pct && oi_pct > p.strong_oi_surge_pct {
        Some(SignalPattern::StrongBuy)
    } else if oi_pct < -p.squeeze_oi_drop_pct && price_pct > p.squeeze_price_rise_pct {
        Some(SignalPattern::Squeeze)
    } else {
        None
    }
}

/// Replay `weeks` (chronological), scoring weeks dated on or after `from`.
pub fn run_backtest(
    weeks: &[WeeklyObservation],
    from: Option<NaiveDate>,
    p: &BacktestParams,
) -> BacktestReport {
    let horizon = p.horizon_weeks.max(1);
    let mut report = BacktestReport {
        horizon_weeks: horizon,
        from,
        signals: Vec::new(),
        overall: WinStats::default(),
        bear_raid: WinStats::default(),
        accumulation: WinStats::default(),
    };

    for i in 1..weeks.len().saturating_sub(horizon) {
        let prev = &weeks[i - 1];
        let curr = &weeks[i];
        if from.is_some_and(|f| curr.date < f) {
            continue;
        }
        if prev.short_open_interest == 0.0 || prev.close_price == 0.0 {
            continue;
        }

        let oi_delta_pct = pct_delta(prev.short_open_interest, curr.short_open_interest);
        let price_delta_pct = pct_delta(prev.close_price, curr.close_price);
        let Some(pattern) = detect_signal(oi_delta_pct, price_delta_pct, p) else {
            continue;
        };

        let forward_return_pct = pct_delta(curr.close_price, weeks[i + horizon].close_price);
        let side = pattern.side();
        let win = match side {
            SignalSide::Buy => forward_return_pct > 0.0,
            SignalSide::Sell => forward_return_pct < 0.0,
        };

        report.overall.record(win);
        match pattern {
            SignalPattern::BearRaid => report.bear_raid.record(win),
            _ if side == SignalSide::Buy => report.accumulation.record(win),
            _ => {}
        }

        debug!(
            date = %curr.date,
            pattern = %pattern,
            oi = format!("{:+.1}", oi_delta_pct),
            price = format!("{:+.1}", price_delta_pct),
            forward = format!("{:+.1}", forward_return_pct),
            win,
            "backtest signal"
        );

        report.signals.push(SignalOutcome {
            date: curr.date,
            pattern,
            side,
            oi_delta_pct,
            price_delta_pct,
            forward_return_pct,
            win,
        });
    }

    info!(
        signals = report.overall.signals,
        accuracy = format!("{:.1}", report.overall.accuracy_pct()),
        bear_raid = format!("{}/{}", report.bear_raid.wins, report.bear_raid.signals),
        accumulation = format!("{}/{}", report.accumulation.wins, report.accumulation.signals),
        "backtest complete"
    );
    report
}

// =============================================================================
// Unit Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Days;

    fn weekly(oi: &[f64], price: &[f64]) -> Vec<WeeklyObservation> {
        let start = NaiveDate::from_ymd_opt(2024, 1, 5).unwrap();
        oi.iter()
            .zip(price)
            .enumerate()
            .map(|(i, (&o, &p))| WeeklyObservation {
                date: start.checked_add_days(Days::new(7 * i as u64)).unwrap(),
                short_open_interest: o,
                close_price: p,
                asset_manager_short_open_interest: None,
            })
            .collect()
    }

    #[test]
    fn signal_rules_in_priority_order() {
        let p = BacktestParams::default();
        assert_eq!(detect_signal(6.0, -4.0, &p), Some(SignalPattern::BearRaid));
        assert_eq!(detect_signal(2.0, -4.0, &p), Some(SignalPattern::DipBuy));
        assert_eq!(detect_signal(6.0, 2.0, &p), Some(SignalPattern::StrongBuy));
        assert_eq!(detect_signal(-6.0, 2.0, &p), Some(SignalPattern::Squeeze));
        assert_eq!(detect_signal(-6.0, -2.0, &p), None);
        assert_eq!(detect_signal(3.0, 0.5, &p), None);
    }

    #[test]
    fn scores_against_the_horizon_close() {
        // Week 1 raid; the close four weeks later is lower → SELL wins.
        // Week 2 dip buy; four weeks later is higher → BUY wins.
        let w = weekly(
            &[100.0, 106.0, 108.0, 108.0, 108.0, 108.0, 108.0, 108.0],
            &[100.0, 95.0, 93.0, 93.0, 93.0, 90.0, 99.0, 99.0],
        );
        let report = run_backtest(&w, None, &BacktestParams::default());
        assert_eq!(report.signals.len(), 2);
        assert_eq!(report.signals[0].pattern, SignalPattern::BearRaid);
        assert!(report.signals[0].win);
        assert_eq!(report.signals[1].pattern, SignalPattern::DipBuy);
        assert!(report.signals[1].win);
        assert_eq!(report.overall.signals, 2);
        assert!((report.overall.accuracy_pct() - 100.0).abs() < f64::EPSILON);
        assert_eq!(report.bear_raid, WinStats { signals: 1, wins: 1 });
        assert_eq!(report.accumulation, WinStats { signals: 1, wins: 1 });
    }

    #[test]
    fn weeks_without_a_full_horizon_are_not_scored() {
        // The raid sits in the last four weeks, so there is no forward close.
        let w = weekly(&[100.0, 100.0, 106.0, 106.0], &[100.0, 100.0, 95.0, 95.0]);
        let report = run_backtest(&w, None, &BacktestParams::default());
        assert!(report.signals.is_empty());
        assert_eq!(report.overall.accuracy_pct(), 0.0);
    }

    #[test]
    fn from_date_and_zero_denominators_skip_weeks() {
        let w = weekly(
            &[0.0, 106.0, 100.0, 106.0, 106.0, 106.0, 106.0, 106.0],
            &[100.0, 95.0, 95.0, 90.0, 90.0, 90.0, 90.0, 90.0],
        );
        let p = BacktestParams::default();
        // Week 1 is skipped on the zero OI, week 3 is a raid.
        let all = run_backtest(&w, None, &p);
        assert_eq!(all.signals.len(), 1);
        assert_eq!(all.signals[0].date, w[3].date);
        let later = run_backtest(&w, w.get(4).map(|o| o.date), &p);
        assert!(later.signals.is_empty());
    }

    #[test]
    fn losing_sell_counts_as_loss() {
        let w = weekly(
            &[100.0, 94.0, 94.0, 94.0, 94.0, 94.0],
            &[100.0, 102.0, 103.0, 104.0, 105.0, 106.0],
        );
        let report = run_backtest(&w, None, &BacktestParams::default());
        assert_eq!(report.signals[0].pattern, SignalPattern::Squeeze);
        assert!(!report.signals[0].win);
        assert_eq!(report.overall.losses(), 1);
        assert_eq!(report.accumulation.signals, 0);
    }
}

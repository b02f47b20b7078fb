// =============================================================================
// Weekly Behavior State Machine
// =============================================================================
//
// Walks consecutive week pairs in chronological order, threading a single
// `MarketMode` and emitting one `WeeklyEvent` per pair.  The transition is a
// pure function `(mode, week delta) -> (next mode, behavior)` folded over the
// window.
//
// Transition table (evaluated top to bottom, first match wins):
//
//   OI > +activation
//     price < -raid_drop AND OI > +raid_surge  → HUNTER   Bear Raid
//     price > +move                           → FARMER   Momentum Farming
//     price < -move                           → FARMER   Dip Buying
//     otherwise                               → FARMER   Accumulation
//   OI < -activation
//     month == book-closing month             → NEUTRAL  Book Closing
//     month in rollover months                → (keep)   Quarterly Rollover
//     mode HUNTER:  price < -move Looting, > +move Mission Accomplished,
//                   else End Hunt                          (mode kept)
//     mode FARMER:  price < -move Harvesting, > +move Squeeze, else Reduce
//     mode NEUTRAL: price < -move Exit, > +move Short Squeeze,
//                   else De-leveraging
//   |OI| <= activation                        → NEUTRAL  Wait
//
// Exit weeks never change the mode, so a HUNTER or FARMER label survives
// rollover months and OI drops until a Wait week or a book-closing week
// resets it.  A fresh run always starts at NEUTRAL.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::analysis::metrics::pct_delta;
use crate::analysis::narrative;
use crate::market_data::WeeklyObservation;
use crate::runtime_config::AnalysisThresholds;
use crate::types::MarketMode;

// =============================================================================
// Types
// =============================================================================

/// Week-over-week change between two consecutive observations.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WeekDelta {
    /// Date of the later week.
    pub date: NaiveDate,
    pub oi_delta_pct: f64,
    pub price_delta_pct: f64,
    /// Calendar month of the later week (1-12).
    pub month: u32,
}

impl WeekDelta {
    pub fn between(prev: &WeeklyObservation, curr: &WeeklyObservation) -> Self {
        Self {
            date: curr.date,
            oi_delta_pct: pct_delta(prev.short_open_interest, curr.short_open_interest),
            price_delta_pct: pct_delta(prev.close_price, curr.close_price),
            month: curr.date.month(),
        }
    }
}

/// Closed set of weekly behaviors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BehaviorKind {
    // OI building
    BearRaid,
    MomentumFarming,
    DipBuying,
    Accumulation,
    // Calendar overrides
    BookClosing,
    QuarterlyRollover,
    // Hunter exits
    Looting,
    MissionAccomplished,
    EndHunt,
    // Farmer exits
    Harvesting,
    Squeeze,
    Reduce,
    // Neutral exits
    Exit,
    ShortSqueeze,
    Deleveraging,
    // Quiet
    Wait,
}

/// One classified week.  Read-only once emitted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeeklyEvent {
    pub date: NaiveDate,
    pub oi_delta_pct: f64,
    pub price_delta_pct: f64,
    pub kind: BehaviorKind,
    /// Mode in force after this week.
    pub mode: MarketMode,
    /// Intent marker (emoji).
    pub tag: String,
    pub title: String,
    pub description: String,
    pub prediction: String,
}

impl WeeklyEvent {
    fn new(delta: &WeekDelta, kind: BehaviorKind, mode: MarketMode) -> Self {
        let template = narrative::behavior_template(kind);
        let (oi, price) = (delta.oi_delta_pct, delta.price_delta_pct);
        Self {
            date: delta.date,
            oi_delta_pct: delta.oi_delta_pct,
            price_delta_pct: delta.price_delta_pct,
            kind,
            mode,
            tag: template.tag.to_string(),
            title: template.title.to_string(),
            description: narrative::render(template.description, oi, price),
            prediction: narrative::render(template.prediction, oi, price),
        }
    }
}

// =============================================================================
// Transition function
// =============================================================================

/// One step of the state machine.
pub fn transition(
    mode: MarketMode,
    delta: &WeekDelta,
    t: &AnalysisThresholds,
) -> (MarketMode, BehaviorKind) {
    let oi = delta.oi_delta_pct;
    let price = delta.price_delta_pct;
    let up = price > t.weekly_price_move_pct;
    let down = price < -t.weekly_price_move_pct;

    if oi > t.activation_oi_pct {
        if t.is_bear_raid(oi, price) {
            return (MarketMode::Hunter, BehaviorKind::BearRaid);
        }
        let kind = if up {
            BehaviorKind::MomentumFarming
        } else if down {
            BehaviorKind::DipBuying
        } else {
            BehaviorKind::Accumulation
        };
        return (MarketMode::Farmer, kind);
    }

    if oi < -t.activation_oi_pct {
        if delta.month == t.book_closing_month {
            return (MarketMode::Neutral, BehaviorKind::BookClosing);
        }
        if t.rollover_months.contains(&delta.month) {
            return (mode, BehaviorKind::QuarterlyRollover);
        }
        let kind = match (mode, down, up) {
            (MarketMode::Hunter, true, _) => BehaviorKind::Looting,
            (MarketMode::Hunter, _, true) => BehaviorKind::MissionAccomplished,
            (MarketMode::Hunter, _, _) => BehaviorKind::EndHunt,
            (MarketMode::Farmer, true, _) => BehaviorKind::Harvesting,
            (MarketMode::Farmer, _, true) => BehaviorKind::Squeeze,
            (MarketMode::Farmer, _, _) => BehaviorKind::Reduce,
            (MarketMode::Neutral, true, _) => BehaviorKind::Exit,
            (MarketMode::Neutral, _, true) => BehaviorKind::ShortSqueeze,
            (MarketMode::Neutral, _, _) => BehaviorKind::Deleveraging,
        };
        return (mode, kind);
    }

    (MarketMode::Neutral, BehaviorKind::Wait)
}

/// Run the state machine over `window` (chronological) starting at NEUTRAL.
///
/// Returns one event per consecutive pair, newest first.
pub fn classify_weeks(window: &[WeeklyObservation], t: &AnalysisThresholds) -> Vec<WeeklyEvent> {
    let (_, mut events) = window
        .windows(2)
        .map(|pair| WeekDelta::between(&pair[0], &pair[1]))
        .fold(
            (MarketMode::Neutral, Vec::with_capacity(window.len().saturating_sub(1))),
            |(mode, mut events), delta| {
                let (next, kind) = transition(mode, &delta, t);
                trace!(
                    date = %delta.date,
                    oi = format!("{:.2}", delta.oi_delta_pct),
                    price = format!("{:.2}", delta.price_delta_pct),
                    from = %mode,
                    to = %next,
                    behavior = ?kind,
                    "weekly transition"
                );
                events.push(WeeklyEvent::new(&delta, kind, next));
                (next, events)
            },
        );

    events.reverse();
    events
}

// =============================================================================
// Unit Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Days;

    fn delta(oi: f64, price: f64, month: u32) -> WeekDelta {
        WeekDelta {
            date: NaiveDate::from_ymd_opt(2024, month, 5).unwrap(),
            oi_delta_pct: oi,
            price_delta_pct: price,
            month,
        }
    }

    fn step(mode: MarketMode, oi: f64, price: f64, month: u32) -> (MarketMode, BehaviorKind) {
        transition(mode, &delta(oi, price, month), &AnalysisThresholds::default())
    }

    fn weekly(start: NaiveDate, oi: &[f64], price: &[f64]) -> Vec<WeeklyObservation> {
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
    fn oi_build_branches() {
        use BehaviorKind::*;
        use MarketMode::*;
        assert_eq!(step(Neutral, 6.0, -4.0, 1), (Hunter, BearRaid));
        // Price drop without the OI surge is dip buying, not a raid.
        assert_eq!(step(Neutral, 4.0, -4.0, 1), (Farmer, DipBuying));
        assert_eq!(step(Hunter, 3.0, 1.5, 1), (Farmer, MomentumFarming));
        assert_eq!(step(Neutral, 3.0, 0.5, 1), (Farmer, Accumulation));
    }

    #[test]
    fn calendar_overrides() {
        use BehaviorKind::*;
        use MarketMode::*;
        assert_eq!(step(Hunter, -5.0, -5.0, 12), (Neutral, BookClosing));
        assert_eq!(step(Farmer, -5.0, 3.0, 12), (Neutral, BookClosing));
        for month in [3, 6, 9] {
            assert_eq!(step(Hunter, -5.0, -5.0, month), (Hunter, QuarterlyRollover));
            assert_eq!(step(Farmer, -5.0, 0.0, month), (Farmer, QuarterlyRollover));
        }
    }

    #[test]
    fn exit_branches_keep_mode() {
        use BehaviorKind::*;
        use MarketMode::*;
        assert_eq!(step(Hunter, -5.0, -2.0, 1), (Hunter, Looting));
        assert_eq!(step(Hunter, -5.0, 2.0, 1), (Hunter, MissionAccomplished));
        assert_eq!(step(Hunter, -5.0, 0.0, 1), (Hunter, EndHunt));
        assert_eq!(step(Farmer, -5.0, -2.0, 1), (Farmer, Harvesting));
        assert_eq!(step(Farmer, -5.0, 2.0, 1), (Farmer, Squeeze));
        assert_eq!(step(Farmer, -5.0, 0.0, 1), (Farmer, Reduce));
        assert_eq!(step(Neutral, -5.0, -2.0, 1), (Neutral, Exit));
        assert_eq!(step(Neutral, -5.0, 2.0, 1), (Neutral, ShortSqueeze));
        assert_eq!(step(Neutral, -5.0, 0.0, 1), (Neutral, Deleveraging));
    }

    #[test]
    fn quiet_week_resets_to_neutral() {
        for mode in [MarketMode::Hunter, MarketMode::Farmer, MarketMode::Neutral] {
            assert_eq!(step(mode, 2.0, -9.0, 1), (MarketMode::Neutral, BehaviorKind::Wait));
            assert_eq!(step(mode, -2.0, 9.0, 12), (MarketMode::Neutral, BehaviorKind::Wait));
        }
    }

    #[test]
    fn hunter_persists_through_rollover_until_reset() {
        // Feb raid, March rollover drop, April drop while still HUNTER.
        let w = weekly(
            NaiveDate::from_ymd_opt(2024, 2, 23).unwrap(),
            &[100.0, 106.0, 100.0, 94.0, 94.0, 94.0, 94.0, 94.0, 88.0],
            &[100.0, 95.0, 94.0, 94.0, 94.0, 94.0, 94.0, 94.0, 92.0],
        );
        let events = classify_weeks(&w, &AnalysisThresholds::default());
        let chrono_order: Vec<BehaviorKind> = events.iter().rev().map(|e| e.kind).collect();
        assert_eq!(chrono_order[0], BehaviorKind::BearRaid);
        assert_eq!(chrono_order[1], BehaviorKind::QuarterlyRollover);
        assert_eq!(events.iter().rev().nth(1).unwrap().mode, MarketMode::Hunter);
        assert_eq!(chrono_order[2], BehaviorKind::QuarterlyRollover);
        // Quiet weeks reset to NEUTRAL before the final April drop.
        assert_eq!(*chrono_order.last().unwrap(), BehaviorKind::Exit);
    }

    #[test]
    fn rollover_week_keeps_hunter_until_looting() {
        // Late-March raid, March rollover drop, April drop with price down.
        let w = weekly(
            NaiveDate::from_ymd_opt(2024, 3, 15).unwrap(),
            &[100.0, 106.0, 100.0, 94.0],
            &[100.0, 95.0, 95.0, 93.0],
        );
        let events = classify_weeks(&w, &AnalysisThresholds::default());
        let seen: Vec<(BehaviorKind, MarketMode)> =
            events.iter().map(|e| (e.kind, e.mode)).collect();
        assert_eq!(
            seen,
            vec![
                (BehaviorKind::Looting, MarketMode::Hunter),
                (BehaviorKind::QuarterlyRollover, MarketMode::Hunter),
                (BehaviorKind::BearRaid, MarketMode::Hunter),
            ]
        );
        assert_eq!(events[1].date.month(), 3);
        assert_eq!(events[0].date.month(), 4);
    }

    #[test]
    fn hunter_exit_directly_after_raid_loots() {
        let w = weekly(
            NaiveDate::from_ymd_opt(2024, 4, 5).unwrap(),
            &[100.0, 106.0, 100.0],
            &[100.0, 95.0, 93.0],
        );
        let events = classify_weeks(&w, &AnalysisThresholds::default());
        assert_eq!(events[0].kind, BehaviorKind::Looting);
        assert_eq!(events[0].mode, MarketMode::Hunter);
        assert_eq!(events[1].kind, BehaviorKind::BearRaid);
    }

    #[test]
    fn wait_week_between_raid_and_exit_branches_through_neutral() {
        // Week 1 raid (HUNTER), week 2 quiet (resets), week 3 OI drop.
        let w = weekly(
            NaiveDate::from_ymd_opt(2024, 4, 5).unwrap(),
            &[100.0, 106.0, 107.0, 100.0],
            &[100.0, 95.0, 95.0, 93.0],
        );
        let events = classify_weeks(&w, &AnalysisThresholds::default());
        assert_eq!(events.len(), 3);
        assert_eq!(events[2].kind, BehaviorKind::BearRaid);
        assert_eq!(events[1].kind, BehaviorKind::Wait);
        assert_eq!(events[1].mode, MarketMode::Neutral);
        assert_eq!(events[0].kind, BehaviorKind::Exit);
    }

    #[test]
    fn reference_sequence_newest_first() {
        let w = weekly(
            NaiveDate::from_ymd_opt(2024, 1, 5).unwrap(),
            &[100.0, 100.0, 108.0, 108.0, 95.0, 95.0],
            &[50.0, 50.0, 52.0, 48.0, 46.0, 47.0],
        );
        let events = classify_weeks(&w, &AnalysisThresholds::default());
        let kinds: Vec<BehaviorKind> = events.iter().map(|e| e.kind).collect();
        assert_eq!(
            kinds,
            vec![
                BehaviorKind::Wait,
                BehaviorKind::Exit,
                BehaviorKind::Wait,
                BehaviorKind::MomentumFarming,
                BehaviorKind::Wait,
            ]
        );
        assert!(events.windows(2).all(|p| p[0].date > p[1].date));
        assert!((events[3].oi_delta_pct - 8.0).abs() < 1e-9);
        assert_eq!(events[3].mode, MarketMode::Farmer);
        assert!((events[1].oi_delta_pct + 12.037_037).abs() < 1e-5);
    }

    #[test]
    fn each_run_starts_neutral() {
        let t = AnalysisThresholds::default();
        let raid = weekly(
            NaiveDate::from_ymd_opt(2024, 4, 5).unwrap(),
            &[100.0, 106.0],
            &[100.0, 95.0],
        );
        let exit = weekly(
            NaiveDate::from_ymd_opt(2024, 4, 5).unwrap(),
            &[100.0, 95.0],
            &[100.0, 97.0],
        );
        assert_eq!(classify_weeks(&raid, &t)[0].mode, MarketMode::Hunter);
        assert_eq!(classify_weeks(&exit, &t)[0].kind, BehaviorKind::Exit);
    }

    #[test]
    fn zero_denominators_classify_as_wait() {
        let w = weekly(
            NaiveDate::from_ymd_opt(2024, 1, 5).unwrap(),
            &[0.0, 50.0],
            &[0.0, 10.0],
        );
        let events = classify_weeks(&w, &AnalysisThresholds::default());
        assert_eq!(events[0].kind, BehaviorKind::Wait);
        assert_eq!(events[0].oi_delta_pct, 0.0);
    }

    #[test]
    fn short_windows_emit_nothing() {
        let t = AnalysisThresholds::default();
        assert!(classify_weeks(&[], &t).is_empty());
        let one = weekly(NaiveDate::from_ymd_opt(2024, 1, 5).unwrap(), &[1.0], &[1.0]);
        assert!(classify_weeks(&one, &t).is_empty());
    }

    #[test]
    fn events_carry_rendered_narrative() {
        let w = weekly(
            NaiveDate::from_ymd_opt(2024, 4, 5).unwrap(),
            &[100.0, 106.0],
            &[100.0, 95.0],
        );
        let e = &classify_weeks(&w, &AnalysisThresholds::default())[0];
        assert_eq!(e.title, "Bear Raid");
        assert!(e.description.contains("-5.0%"));
        assert!(e.description.contains("+6.0%"));
        assert!(!e.tag.is_empty());
        assert!(!e.prediction.is_empty());
    }
}

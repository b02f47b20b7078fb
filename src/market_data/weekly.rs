// =============================================================================
// Weekly Aligner — Resample mixed-frequency samples onto report-day weeks
// =============================================================================
//
// Prices arrive daily, positions weekly.  Each sample is assigned to the week
// ending on the report anchor weekday (a sample falling on the anchor day
// closes its own week) and every column keeps the last non-missing value
// seen inside that week.
//
//   1. Deduplicate by exact date — the last-seen sample wins (report
//      revisions never double-count).
//   2. Bucket by week-ending anchor day, last value per column.
//   3. Drop weeks without a short-OI value (no report that week) or without
//      a price.
//
// The output is strictly increasing by date, so step 1 also covers the
// post-resample deduplication.

use std::collections::BTreeMap;

use chrono::{Datelike, Days, NaiveDate, Weekday};
use tracing::debug;

use super::{DateRange, JoinedSample, WeeklyObservation};

/// Anchor day that closes the week containing `date`.
pub fn week_ending(date: NaiveDate, anchor: Weekday) -> NaiveDate {
    let ahead = (7 + anchor.num_days_from_monday() - date.weekday().num_days_from_monday()) % 7;
    date.checked_add_days(Days::new(u64::from(ahead)))
        .unwrap_or(date)
}

/// Samples whose date falls inside `range` (inclusive), in input order.
pub fn select_window(samples: &[JoinedSample], range: DateRange) -> Vec<JoinedSample> {
    samples
        .iter()
        .filter(|s| range.contains(s.date))
        .cloned()
        .collect()
}

#[derive(Default)]
struct WeekBucket {
    close_price: Option<f64>,
    short_open_interest: Option<f64>,
    asset_manager_short_open_interest: Option<f64>,
}

/// Collapse `samples` into one observation per anchored week.
pub fn align_weekly(samples: &[JoinedSample], anchor: Weekday) -> Vec<WeeklyObservation> {
    // Later samples overwrite earlier ones sharing a date.
    let mut by_date: BTreeMap<NaiveDate, &JoinedSample> = BTreeMap::new();
    for sample in samples {
        by_date.insert(sample.date, sample);
    }

    let mut weeks: BTreeMap<NaiveDate, WeekBucket> = BTreeMap::new();
    for (date, sample) in &by_date {
        let bucket = weeks.entry(week_ending(*date, anchor)).or_default();
        if let Some(p) = usable(sample.close_price) {
            bucket.close_price = Some(p);
        }
        if let Some(oi) = usable(sample.short_open_interest) {
            bucket.short_open_interest = Some(oi);
        }
        if let Some(am) = usable(sample.asset_manager_short_open_interest) {
            bucket.asset_manager_short_open_interest = Some(am);
        }
    }

    let total_weeks = weeks.len();
    let aligned: Vec<WeeklyObservation> = weeks
        .into_iter()
        .filter_map(|(date, bucket)| {
            Some(WeeklyObservation {
                date,
                short_open_interest: bucket.short_open_interest?,
                close_price: bucket.close_price?,
                asset_manager_short_open_interest: bucket.asset_manager_short_open_interest,
            })
        })
        .collect();

    debug!(
        samples = samples.len(),
        unique_dates = by_date.len(),
        weeks = total_weeks,
        kept = aligned.len(),
        anchor = %anchor,
        "weekly alignment complete"
    );

    aligned
}

fn usable(value: Option<f64>) -> Option<f64> {
    value.filter(|v| v.is_finite())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn price(date: NaiveDate, close: f64) -> JoinedSample {
        JoinedSample {
            date,
            close_price: Some(close),
            short_open_interest: None,
            asset_manager_short_open_interest: None,
        }
    }

    fn report(date: NaiveDate, close: f64, oi: f64) -> JoinedSample {
        JoinedSample {
            date,
            close_price: Some(close),
            short_open_interest: Some(oi),
            asset_manager_short_open_interest: Some(oi / 10.0),
        }
    }

    #[test]
    fn week_ending_maps_to_next_anchor_day() {
        // 2024-01-02 is a Tuesday.
        assert_eq!(week_ending(d(2024, 1, 2), Weekday::Fri), d(2024, 1, 5));
        assert_eq!(week_ending(d(2024, 1, 5), Weekday::Fri), d(2024, 1, 5));
        assert_eq!(week_ending(d(2024, 1, 6), Weekday::Fri), d(2024, 1, 12));
        assert_eq!(week_ending(d(2024, 1, 2), Weekday::Tue), d(2024, 1, 2));
    }

    #[test]
    fn daily_prices_with_tuesday_reports_resample_to_fridays() {
        let mut samples = Vec::new();
        for day in 1..=12 {
            samples.push(price(d(2024, 1, day), 100.0 + day as f64));
        }
        samples.push(report(d(2024, 1, 2), 102.0, 1_000.0));
        samples.push(report(d(2024, 1, 9), 109.0, 1_100.0));

        let weeks = align_weekly(&samples, Weekday::Fri);
        assert_eq!(weeks.len(), 2);
        assert_eq!(weeks[0].date, d(2024, 1, 5));
        assert!((weeks[0].short_open_interest - 1_000.0).abs() < f64::EPSILON);
        // Friday's close is the last price inside the week.
        assert!((weeks[0].close_price - 105.0).abs() < f64::EPSILON);
        assert_eq!(weeks[1].date, d(2024, 1, 12));
        assert!((weeks[1].close_price - 112.0).abs() < f64::EPSILON);
    }

    #[test]
    fn weeks_without_a_report_are_dropped() {
        let samples = vec![
            report(d(2024, 1, 2), 100.0, 1_000.0),
            price(d(2024, 1, 10), 101.0),
            report(d(2024, 1, 16), 102.0, 1_050.0),
        ];
        let weeks = align_weekly(&samples, Weekday::Fri);
        let dates: Vec<NaiveDate> = weeks.iter().map(|w| w.date).collect();
        assert_eq!(dates, vec![d(2024, 1, 5), d(2024, 1, 19)]);
    }

    #[test]
    fn duplicate_dates_keep_last_seen_value() {
        let samples = vec![
            report(d(2024, 1, 2), 100.0, 1_000.0),
            report(d(2024, 1, 2), 100.0, 1_200.0),
        ];
        let weeks = align_weekly(&samples, Weekday::Fri);
        assert_eq!(weeks.len(), 1);
        assert!((weeks[0].short_open_interest - 1_200.0).abs() < f64::EPSILON);
    }

    #[test]
    fn unsorted_input_is_aligned_chronologically() {
        let samples = vec![
            report(d(2024, 1, 16), 102.0, 1_050.0),
            report(d(2024, 1, 2), 100.0, 1_000.0),
        ];
        let weeks = align_weekly(&samples, Weekday::Fri);
        assert!(weeks.windows(2).all(|w| w[0].date < w[1].date));
    }

    #[test]
    fn select_window_is_inclusive() {
        let samples = vec![
            report(d(2024, 1, 2), 100.0, 1.0),
            report(d(2024, 1, 9), 100.0, 1.0),
            report(d(2024, 1, 16), 100.0, 1.0),
        ];
        let picked = select_window(&samples, DateRange::new(d(2024, 1, 2), d(2024, 1, 9)));
        assert_eq!(picked.len(), 2);
    }

    #[test]
    fn empty_input_yields_empty_series() {
        assert!(align_weekly(&[], Weekday::Fri).is_empty());
    }
}

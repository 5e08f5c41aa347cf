//! Stop/target arithmetic used at entry.
//!
//! Everything here is a pure function of prices and bar windows so the entry
//! engine can stay focused on gap bookkeeping.

use chrono::{DateTime, Duration, Utc};

use crate::domain::{round2, Bar, Direction};

use super::series::BarSeries;

/// Minutes skipped before the entry bar when searching for structure.
pub const LOOKBACK_SKIP_MINUTES: i64 = 5;

/// Stop and target after clamping.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Levels {
    pub stop: f64,
    pub target: f64,
}

/// Keep adjusted levels on the conservative side of the initial ones.
///
/// Short: adjusted stop ≥ initial stop, adjusted target ≥ initial target.
/// Long: both mirrored. Tightening may reduce reward, never promise more.
pub fn clamp_levels(direction: Direction, initial: Levels, adjusted: Levels) -> Levels {
    match direction {
        Direction::Short => Levels {
            stop: adjusted.stop.max(initial.stop),
            target: adjusted.target.max(initial.target),
        },
        Direction::Long => Levels {
            stop: adjusted.stop.min(initial.stop),
            target: adjusted.target.min(initial.target),
        },
    }
}

/// Target at the same distance from `entry` as `stop`, on the profit side.
pub fn mirror_target(direction: Direction, entry: f64, stop: f64) -> f64 {
    match direction {
        Direction::Short => round2(entry - (stop - entry)),
        Direction::Long => round2(entry + (entry - stop)),
    }
}

/// `|target − entry| / |entry − stop|`, or `None` when the stop sits on the entry.
pub fn reward_risk(entry: f64, stop: f64, target: f64) -> Option<f64> {
    let risk = (entry - stop).abs();
    if risk == 0.0 || !risk.is_finite() {
        return None;
    }
    Some((target - entry).abs() / risk)
}

/// Whether `target` lies strictly on the profit side of `entry`.
pub fn target_beyond_entry(direction: Direction, entry: f64, target: f64) -> bool {
    match direction {
        Direction::Short => target < entry,
        Direction::Long => target > entry,
    }
}

/// 1-minute bars in `[now − 5m − (lookback − 1)m, now − 5m]`.
pub fn lookback_window(m1: &BarSeries, now: DateTime<Utc>, lookback: usize) -> &[Bar] {
    let end = now - Duration::minutes(LOOKBACK_SKIP_MINUTES);
    let span = lookback.saturating_sub(1) as i64;
    m1.range(end - Duration::minutes(span), end)
}

/// Protective extreme of `window`: highest high for shorts, lowest low for longs.
pub fn structure_stop(direction: Direction, window: &[Bar]) -> Option<f64> {
    match direction {
        Direction::Short => highest(window),
        Direction::Long => lowest(window),
    }
}

/// Favorable extreme of `window`: lowest low for shorts, highest high for longs.
pub fn structure_target(direction: Direction, window: &[Bar]) -> Option<f64> {
    match direction {
        Direction::Short => lowest(window),
        Direction::Long => highest(window),
    }
}

/// Number of 1-minute bars between the bar at or before `since` and `now`.
pub fn bar_age(m1: &BarSeries, since: DateTime<Utc>, now: DateTime<Utc>) -> Option<usize> {
    let now_idx = m1.index_at_or_before(now)?;
    let since_idx = m1.index_at_or_before(since).unwrap_or(0);
    Some(now_idx.saturating_sub(since_idx))
}

fn highest(bars: &[Bar]) -> Option<f64> {
    bars.iter().map(|b| b.high).reduce(f64::max)
}

fn lowest(bars: &[Bar]) -> Option<f64> {
    bars.iter().map(|b| b.low).reduce(f64::min)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts(m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 4, 10, m, 0).unwrap()
    }

    fn series(highs_lows: &[(f64, f64)]) -> BarSeries {
        let mut s = BarSeries::new();
        for (i, &(h, l)) in highs_lows.iter().enumerate() {
            s.push(Bar::new(ts(i as u32 + 1), l, h, l, l, 1)).unwrap();
        }
        s
    }

    #[test]
    fn clamp_never_loosens_short_levels() {
        let initial = Levels { stop: 110.0, target: 100.0 };
        let adjusted = Levels { stop: 107.0, target: 96.0 };
        let out = clamp_levels(Direction::Short, initial, adjusted);
        assert_eq!(out, Levels { stop: 110.0, target: 100.0 });

        let adjusted = Levels { stop: 112.0, target: 102.0 };
        assert_eq!(clamp_levels(Direction::Short, initial, adjusted), adjusted);
    }

    #[test]
    fn clamp_never_loosens_long_levels() {
        let initial = Levels { stop: 100.0, target: 110.0 };
        let adjusted = Levels { stop: 103.0, target: 115.0 };
        let out = clamp_levels(Direction::Long, initial, adjusted);
        assert_eq!(out, Levels { stop: 100.0, target: 110.0 });
    }

    #[test]
    fn mirrored_target_keeps_unit_ratio() {
        assert_eq!(mirror_target(Direction::Short, 105.0, 108.5), 101.5);
        assert_eq!(mirror_target(Direction::Long, 105.0, 101.25), 108.75);
        let rr = reward_risk(105.0, 101.25, 108.75).unwrap();
        assert!((rr - 1.0).abs() < 1e-12);
    }

    #[test]
    fn zero_risk_has_no_ratio() {
        assert_eq!(reward_risk(100.0, 100.0, 104.0), None);
        assert_eq!(reward_risk(100.0, 98.0, 104.0), Some(2.0));
    }

    #[test]
    fn target_must_sit_on_the_profit_side() {
        assert!(target_beyond_entry(Direction::Long, 100.5, 103.0));
        assert!(!target_beyond_entry(Direction::Long, 100.5, 100.0));
        assert!(!target_beyond_entry(Direction::Long, 100.5, 100.5));
        assert!(target_beyond_entry(Direction::Short, 101.0, 99.0));
        assert!(!target_beyond_entry(Direction::Short, 101.0, 102.0));
    }

    #[test]
    fn lookback_skips_the_last_five_minutes() {
        // bars stamped 10:01..=10:12
        let m1 = series(&[
            (101.0, 99.0),
            (102.0, 98.0),
            (103.0, 97.0),
            (104.0, 96.0),
            (105.0, 95.0),
            (106.0, 94.0),
            (107.0, 93.0),
            (120.0, 80.0),
            (120.0, 80.0),
            (120.0, 80.0),
            (120.0, 80.0),
            (120.0, 80.0),
        ]);
        let window = lookback_window(&m1, ts(12), 3);
        let stamps: Vec<_> = window.iter().map(|b| b.timestamp).collect();
        assert_eq!(stamps, vec![ts(5), ts(6), ts(7)]);
        assert_eq!(structure_stop(Direction::Short, window), Some(107.0));
        assert_eq!(structure_stop(Direction::Long, window), Some(93.0));
        assert_eq!(structure_target(Direction::Short, window), Some(93.0));
        assert_eq!(structure_target(Direction::Long, window), Some(107.0));
    }

    #[test]
    fn empty_lookback_has_no_levels() {
        let m1 = series(&[(101.0, 99.0), (102.0, 98.0)]);
        let window = lookback_window(&m1, ts(2), 15);
        assert!(window.is_empty());
        assert_eq!(structure_stop(Direction::Short, window), None);
    }

    #[test]
    fn age_counts_minute_bars() {
        let m1 = series(&[(1.0, 0.5); 10]);
        assert_eq!(bar_age(&m1, ts(3), ts(10)), Some(7));
        assert_eq!(bar_age(&m1, ts(10), ts(10)), Some(0));
    }
}

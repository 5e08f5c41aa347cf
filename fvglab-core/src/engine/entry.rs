//! Entry & risk engine — runs on every 1-minute bar for armed gaps.

use tracing::{info, warn};

use crate::config::StrategyConfig;
use crate::domain::{Bar, Direction, GapId, TradeSignal};
use crate::trade_log::TradeLogRecord;

use super::context::Context;
use super::risk::{self, Levels};
use super::series::BarSeries;
use super::Anomaly;

/// A signal together with the log record describing it.
#[derive(Debug, Clone, PartialEq)]
pub struct Entry {
    pub signal: TradeSignal,
    pub record: TradeLogRecord,
}

/// Everything the engine produced for one 1-minute bar.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EntryOutcome {
    pub entries: Vec<Entry>,
    pub anomalies: Vec<Anomaly>,
}

/// Levels computed for a gap whose midpoint traded on this bar.
#[derive(Clone, Copy)]
struct Pricing {
    direction: Direction,
    entry: f64,
    initial: Levels,
    adjusted: Levels,
}

/// Process `bar` (already appended to `m1`) against every armed gap.
pub fn on_minute_bar(
    ctx: &mut Context,
    m1: &BarSeries,
    bar: &Bar,
    config: &StrategyConfig,
) -> EntryOutcome {
    let mut outcome = EntryOutcome::default();

    for id in ctx.gap_ids() {
        let Some(pricing) = price_gap(ctx, id, m1, bar, config) else {
            continue;
        };

        let reward_risk = match check_levels(id, bar, &pricing) {
            Ok(reward_risk) => reward_risk,
            Err(anomaly) => {
                if let Some(gap) = ctx.gap_mut(id) {
                    if !gap.anomaly_reported {
                        gap.anomaly_reported = true;
                        warn!(%anomaly, "entry skipped");
                        outcome.anomalies.push(anomaly);
                    }
                }
                continue;
            }
        };

        let uid = ctx.next_trade_uid();
        let Some(gap) = ctx.gap_mut(id) else { continue };
        let (Some(first_touch), Some(second_touch)) = (gap.first_touch_at, gap.second_touch_at)
        else {
            continue;
        };
        gap.position_open = true;
        gap.uid = Some(uid);

        let signal = TradeSignal {
            tag: uid,
            gap: id,
            timestamp: bar.timestamp,
            direction: gap.direction,
            size: config.lot_size,
            limit_price: pricing.entry,
            stop: pricing.adjusted.stop,
            target: pricing.adjusted.target,
        };
        let record = TradeLogRecord {
            uid,
            gap_kind: gap.kind,
            direction: gap.direction,
            gap_created: gap.created_at,
            gap_bottom: gap.bottom,
            gap_top: gap.top,
            first_touch,
            second_touch,
            entry_time: bar.timestamp,
            entry_price: pricing.entry,
            tp_initial: pricing.initial.target,
            tp_adjusted: pricing.adjusted.target,
            sl_initial: pricing.initial.stop,
            sl_adjusted: pricing.adjusted.stop,
            reward_risk,
            exit: None,
        };

        info!(
            uid = %uid,
            gap = %id,
            kind = %record.gap_kind,
            direction = %record.direction,
            created = %record.gap_created,
            bottom = record.gap_bottom,
            top = record.gap_top,
            first_touch = %record.first_touch,
            second_touch = %record.second_touch,
            entry_time = %record.entry_time,
            entry = record.entry_price,
            tp_initial = record.tp_initial,
            tp_adjusted = record.tp_adjusted,
            sl_initial = record.sl_initial,
            sl_adjusted = record.sl_adjusted,
            reward_risk,
            "trade signal"
        );
        outcome.entries.push(Entry { signal, record });
    }

    outcome
}

/// Reward:risk of usable levels, or the anomaly that blocks the entry.
fn check_levels(id: GapId, bar: &Bar, pricing: &Pricing) -> Result<f64, Anomaly> {
    let Pricing {
        direction,
        entry,
        adjusted,
        ..
    } = *pricing;
    let reward_risk =
        risk::reward_risk(entry, adjusted.stop, adjusted.target).ok_or(Anomaly::DegenerateRisk {
            gap: id,
            timestamp: bar.timestamp,
            entry,
            stop: adjusted.stop,
        })?;
    if !risk::target_beyond_entry(direction, entry, adjusted.target) {
        return Err(Anomaly::TargetBehindEntry {
            gap: id,
            timestamp: bar.timestamp,
            direction,
            entry,
            target: adjusted.target,
        });
    }
    Ok(reward_risk)
}

/// Maintain the gap's running extremes and, when the midpoint trades, derive its levels.
fn price_gap(
    ctx: &mut Context,
    id: GapId,
    m1: &BarSeries,
    bar: &Bar,
    config: &StrategyConfig,
) -> Option<Pricing> {
    let gap = ctx.gap_mut(id)?;
    if !gap.is_armed() {
        return None;
    }
    let second_touch = gap.second_touch_at?;
    let (mut hi, mut lo) = (gap.hi_since_ft?, gap.lo_since_ft?);
    let now = bar.timestamp;

    if bar.high > hi {
        hi = bar.high;
        match gap.direction {
            Direction::Short => gap.sl_updated_at = Some(now),
            Direction::Long => gap.tp_updated_at = Some(now),
        }
    }
    if bar.low < lo {
        lo = bar.low;
        match gap.direction {
            Direction::Short => gap.tp_updated_at = Some(now),
            Direction::Long => gap.sl_updated_at = Some(now),
        }
    }
    gap.set_extremes(hi, lo);

    let entry = gap.entry_mid?;
    if !bar.trades_through(entry) {
        return None;
    }

    let direction = gap.direction;
    let initial = match direction {
        Direction::Short => Levels { stop: hi, target: lo },
        Direction::Long => Levels { stop: lo, target: hi },
    };
    gap.sl_initial = Some(initial.stop);
    gap.tp_initial = Some(initial.target);
    let sl_updated_at = *gap.sl_updated_at.get_or_insert(second_touch);
    let tp_updated_at = *gap.tp_updated_at.get_or_insert(second_touch);

    let is_fresh = |since| {
        risk::bar_age(m1, since, now).is_some_and(|age| age <= config.sl_max_candles)
    };
    let window = risk::lookback_window(m1, now, config.structure_search_bars);

    let adjusted = if is_fresh(sl_updated_at) {
        let stop = risk::structure_stop(direction, window).unwrap_or(initial.stop);
        Levels {
            stop,
            target: risk::mirror_target(direction, entry, stop),
        }
    } else {
        let target = if is_fresh(tp_updated_at) {
            risk::structure_target(direction, window).unwrap_or(initial.target)
        } else {
            initial.target
        };
        Levels {
            stop: initial.stop,
            target,
        }
    };
    let adjusted = risk::clamp_levels(direction, initial, adjusted);
    gap.sl_adjusted = Some(adjusted.stop);
    gap.tp_adjusted = Some(adjusted.target);

    Some(Pricing {
        direction,
        entry,
        initial,
        adjusted,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{GapKind, TradeUid};
    use chrono::{DateTime, Duration, TimeZone, Utc};

    fn base() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 4, 10, 0, 0).unwrap()
    }

    fn at(m: i64) -> DateTime<Utc> {
        base() + Duration::minutes(m)
    }

    fn config() -> StrategyConfig {
        StrategyConfig {
            sl_max_candles: 4,
            structure_search_bars: 5,
            ..StrategyConfig::default()
        }
    }

    /// Minute series with a flat 100/96 range.
    fn minutes(upto: i64) -> BarSeries {
        minutes_with_high(upto, |_| 100.0)
    }

    fn minutes_with_high(upto: i64, high: impl Fn(i64) -> f64) -> BarSeries {
        let mut m1 = BarSeries::new();
        for m in 1..=upto {
            m1.push(Bar::new(at(m), 98.0, high(m), 96.0, 98.0, 1)).unwrap();
        }
        m1
    }

    /// Long gap armed at minute 20 with extremes 104/96 (midpoint 100).
    fn armed_long(ctx: &mut Context) -> GapId {
        let id = ctx.insert_gap(GapKind::Bearish, 110.0, 105.0, at(0));
        let gap = ctx.gap_mut(id).unwrap();
        gap.first_touch_at = Some(at(10));
        gap.second_touch_at = Some(at(20));
        gap.set_extremes(104.0, 96.0);
        id
    }

    fn push(m1: &mut BarSeries, bar: Bar) -> Bar {
        m1.push(bar).unwrap();
        bar
    }

    #[test]
    fn waits_until_midpoint_trades() {
        let mut ctx = Context::new();
        let id = armed_long(&mut ctx);
        let mut m1 = minutes(20);
        let bar = push(&mut m1, Bar::new(at(21), 101.0, 103.0, 100.5, 102.0, 1));

        let out = on_minute_bar(&mut ctx, &m1, &bar, &config());
        assert!(out.entries.is_empty());
        assert!(!ctx.gap(id).unwrap().position_open);
    }

    #[test]
    fn stale_extremes_keep_initial_levels() {
        let mut ctx = Context::new();
        let id = armed_long(&mut ctx);
        let mut m1 = minutes(30);
        let bar = push(&mut m1, Bar::new(at(31), 101.0, 101.0, 99.0, 100.0, 1));

        let out = on_minute_bar(&mut ctx, &m1, &bar, &config());
        assert_eq!(out.entries.len(), 1);
        let entry = &out.entries[0];
        assert_eq!(entry.signal.tag, TradeUid(1));
        assert_eq!(entry.signal.direction, Direction::Long);
        assert_eq!(entry.signal.limit_price, 100.0);
        assert_eq!(entry.signal.stop, 96.0);
        assert_eq!(entry.signal.target, 104.0);
        assert_eq!(entry.record.reward_risk, 1.0);

        let gap = ctx.gap(id).unwrap();
        assert!(gap.position_open);
        assert_eq!(gap.uid, Some(TradeUid(1)));
        assert_eq!(gap.sl_updated_at, Some(at(20)));
    }

    #[test]
    fn fresh_stop_is_replaced_by_lookback_and_target_mirrored() {
        let mut ctx = Context::new();
        let id = armed_long(&mut ctx);
        let mut m1 = minutes(20);
        // new low right after the second touch makes the stop side fresh
        push(&mut m1, Bar::new(at(21), 97.0, 97.0, 94.0, 95.0, 1));
        push(&mut m1, Bar::new(at(22), 95.0, 96.0, 95.0, 95.5, 1));
        let bar = push(&mut m1, Bar::new(at(23), 96.0, 99.5, 95.5, 99.0, 1));

        let first = m1.bars()[20];
        let out = on_minute_bar(&mut ctx, &m1, &first, &config());
        assert!(out.entries.is_empty());
        let gap = ctx.gap(id).unwrap();
        assert_eq!(gap.lo_since_ft, Some(94.0));
        assert_eq!(gap.sl_updated_at, Some(at(21)));
        assert_eq!(gap.entry_mid, Some(99.0));

        let out = on_minute_bar(&mut ctx, &m1, &bar, &config());
        assert_eq!(out.entries.len(), 1);
        let record = &out.entries[0].record;
        assert_eq!(record.entry_price, 99.0);
        assert_eq!(record.sl_initial, 94.0);
        // lookback [10:14, 10:18] finds 96, the clamp restores the initial stop
        assert_eq!(record.sl_adjusted, 94.0);
        assert_eq!(record.tp_initial, 104.0);
        // target mirrored around the entry from the 96 structure stop
        assert_eq!(record.tp_adjusted, 102.0);
        assert!((record.reward_risk - 0.6).abs() < 1e-12);
    }

    #[test]
    fn clamped_short_keeps_initial_stop() {
        let mut ctx = Context::new();
        let id = ctx.insert_gap(GapKind::Bullish, 95.0, 90.0, at(0));
        {
            let gap = ctx.gap_mut(id).unwrap();
            gap.first_touch_at = Some(at(10));
            gap.second_touch_at = Some(at(20));
            gap.set_extremes(106.0, 96.0);
        }
        let mut m1 = minutes_with_high(20, |m| if (12..=16).contains(&m) { 103.0 } else { 100.0 });
        let bar = push(&mut m1, Bar::new(at(21), 101.0, 101.5, 100.5, 101.0, 1));

        let out = on_minute_bar(&mut ctx, &m1, &bar, &config());
        assert!(out.anomalies.is_empty());
        let record = &out.entries[0].record;
        assert_eq!(record.direction, Direction::Short);
        assert_eq!(record.entry_price, 101.0);
        // second touch is one bar old: lookback stop 103 is clamped back to 106
        assert_eq!(record.sl_initial, 106.0);
        assert_eq!(record.sl_adjusted, 106.0);
        // target mirrored from 103 survives the clamp against 96
        assert_eq!(record.tp_adjusted, 99.0);
        assert!((record.reward_risk - 0.4).abs() < 1e-12);
    }

    #[test]
    fn mirrored_short_target_above_entry_is_reported() {
        let mut ctx = Context::new();
        let id = ctx.insert_gap(GapKind::Bullish, 95.0, 90.0, at(0));
        {
            let gap = ctx.gap_mut(id).unwrap();
            gap.first_touch_at = Some(at(10));
            gap.second_touch_at = Some(at(20));
            gap.set_extremes(106.0, 96.0);
        }
        let mut m1 = minutes(20);
        let bar = push(&mut m1, Bar::new(at(21), 101.0, 101.5, 100.5, 101.0, 1));

        // lookback stop 100 sits below the entry, mirrored target lands at 102
        let out = on_minute_bar(&mut ctx, &m1, &bar, &config());
        assert!(out.entries.is_empty());
        assert!(matches!(
            out.anomalies.as_slice(),
            [Anomaly::TargetBehindEntry { direction: Direction::Short, entry, target, .. }]
                if *entry == 101.0 && *target == 102.0
        ));
        assert!(ctx.gap(id).unwrap().is_armed());
    }

    #[test]
    fn fresh_target_with_stale_stop_uses_lookback_high() {
        let mut ctx = Context::new();
        let id = armed_long(&mut ctx);
        let mut m1 = minutes_with_high(30, |m| if (22..=26).contains(&m) { 103.0 } else { 100.0 });
        // new high makes only the target side fresh; the stop dates from the second touch
        let bar = push(&mut m1, Bar::new(at(31), 101.0, 105.0, 100.0, 104.0, 1));

        let out = on_minute_bar(&mut ctx, &m1, &bar, &config());
        assert!(out.anomalies.is_empty());
        let record = &out.entries[0].record;
        assert_eq!(record.entry_price, 100.5);
        assert_eq!(record.sl_initial, 96.0);
        assert_eq!(record.sl_adjusted, 96.0);
        assert_eq!(record.tp_initial, 105.0);
        // lookback [10:22, 10:26] tops out at 103
        assert_eq!(record.tp_adjusted, 103.0);
        assert!((record.reward_risk - 2.5 / 4.5).abs() < 1e-12);

        let gap = ctx.gap(id).unwrap();
        assert_eq!(gap.tp_updated_at, Some(at(31)));
        assert_eq!(gap.sl_updated_at, Some(at(20)));
    }

    #[test]
    fn fresh_target_with_empty_lookback_keeps_initial() {
        let mut ctx = Context::new();
        armed_long(&mut ctx);
        // no minutes between 10:21 and 10:26, so the lookback window is empty
        let mut m1 = minutes(20);
        for m in 27..=30 {
            push(&mut m1, Bar::new(at(m), 98.0, 100.0, 96.0, 98.0, 1));
        }
        let bar = push(&mut m1, Bar::new(at(31), 101.0, 105.0, 100.0, 104.0, 1));

        let out = on_minute_bar(&mut ctx, &m1, &bar, &config());
        let record = &out.entries[0].record;
        assert_eq!(record.sl_adjusted, 96.0);
        assert_eq!(record.tp_adjusted, 105.0);
        assert_eq!(record.reward_risk, 1.0);
    }

    #[test]
    fn fresh_target_behind_entry_is_reported_once() {
        let mut ctx = Context::new();
        let id = armed_long(&mut ctx);
        let mut m1 = minutes(30);
        // lookback high 100 is below the new 100.50 midpoint
        let bar = push(&mut m1, Bar::new(at(31), 101.0, 105.0, 100.0, 104.0, 1));

        let out = on_minute_bar(&mut ctx, &m1, &bar, &config());
        assert!(out.entries.is_empty());
        assert!(matches!(
            out.anomalies.as_slice(),
            [Anomaly::TargetBehindEntry { gap, direction: Direction::Long, entry, target, .. }]
                if *gap == id && *entry == 100.5 && *target == 100.0
        ));
        assert!(ctx.gap(id).unwrap().is_armed());

        let again = push(&mut m1, Bar::new(at(32), 101.0, 101.0, 100.0, 100.5, 1));
        let out = on_minute_bar(&mut ctx, &m1, &again, &config());
        assert!(out.entries.is_empty());
        assert!(out.anomalies.is_empty());
        assert!(ctx.gap(id).unwrap().anomaly_reported);
    }

    #[test]
    fn zero_risk_is_reported_and_gap_stays_armed() {
        let mut ctx = Context::new();
        let id = armed_long(&mut ctx);
        ctx.gap_mut(id).unwrap().set_extremes(100.0, 100.0);
        let mut m1 = minutes(30);
        let bar = push(&mut m1, Bar::new(at(31), 100.0, 100.0, 100.0, 100.0, 1));

        let out = on_minute_bar(&mut ctx, &m1, &bar, &config());
        assert!(out.entries.is_empty());
        assert!(matches!(
            out.anomalies.as_slice(),
            [Anomaly::DegenerateRisk { gap, .. }] if *gap == id
        ));
        assert!(ctx.gap(id).unwrap().is_armed());

        let again = push(&mut m1, Bar::new(at(32), 100.0, 100.0, 100.0, 100.0, 1));
        let out = on_minute_bar(&mut ctx, &m1, &again, &config());
        assert!(out.anomalies.is_empty(), "reported once per gap");
    }

    #[test]
    fn uids_increase_across_gaps() {
        let mut ctx = Context::new();
        armed_long(&mut ctx);
        armed_long(&mut ctx);
        let mut m1 = minutes(30);
        let bar = push(&mut m1, Bar::new(at(31), 100.0, 101.0, 99.0, 100.0, 1));

        let out = on_minute_bar(&mut ctx, &m1, &bar, &config());
        let tags: Vec<_> = out.entries.iter().map(|e| e.signal.tag).collect();
        assert_eq!(tags, vec![TradeUid(1), TradeUid(2)]);

        let again = on_minute_bar(&mut ctx, &m1, &bar, &config());
        assert!(again.entries.is_empty());
    }
}

//! Touch tracker — first and second re-entry of active gaps on 5-minute closes.

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::config::StrategyConfig;
use crate::domain::{Bar, GapId};

use super::context::Context;
use super::series::BarSeries;
use super::structure::{self, Verdict};
use super::GapEvent;

/// Evaluate every active gap against the 5-minute bar closed at `now`.
///
/// Per gap, in order: invalidation by a bar engulfing the gap, then the first
/// touch (structure-validated), then the second touch. A gap cannot take both
/// touches on the same bar.
pub fn on_five_minute_bar(
    ctx: &mut Context,
    m5: &BarSeries,
    m1: &BarSeries,
    now: DateTime<Utc>,
    config: &StrategyConfig,
) -> Vec<GapEvent> {
    let mut events = Vec::new();
    let Some(current) = m5.last().copied() else {
        return events;
    };
    let previous = m5.previous().copied();

    for id in ctx.gap_ids() {
        let Some(gap) = ctx.gap(id) else { continue };
        if gap.position_open {
            continue;
        }

        if gap.is_spanned_by(&current) {
            ctx.remove_gap(id);
            debug!(gap = %id, at = %now, "gap invalidated by engulfing bar");
            events.push(GapEvent::Invalidated(id));
            continue;
        }

        let Some(previous) = previous else { continue };
        if !gap.is_reentry(&current, &previous) {
            continue;
        }

        match (gap.first_touch_at, gap.second_touch_at) {
            (None, _) => {
                if let Some(event) = first_touch(ctx, id, m5, now, config) {
                    events.push(event);
                }
            }
            (Some(first), None) if first != now => {
                if let Some(event) = second_touch(ctx, id, m1, first, now) {
                    events.push(event);
                }
            }
            _ => {}
        }
    }

    events
}

fn first_touch(
    ctx: &mut Context,
    id: GapId,
    m5: &BarSeries,
    now: DateTime<Utc>,
    config: &StrategyConfig,
) -> Option<GapEvent> {
    let gap = ctx.gap(id)?;
    let window = m5.range(gap.created_at, now);
    let verdict = structure::validate(
        window,
        gap.direction,
        config.min_bars_to_first_touch,
        config.min_retracement_score,
    );

    match verdict {
        Verdict::Accepted { score } => {
            let gap = ctx.gap_mut(id)?;
            gap.first_touch_at = Some(now);
            debug!(gap = %id, at = %now, score, "first touch");
            Some(GapEvent::FirstTouch { gap: id, score })
        }
        Verdict::Rejected(reason) => {
            ctx.remove_gap(id);
            debug!(gap = %id, at = %now, ?reason, "first touch rejected by structure");
            Some(GapEvent::Rejected { gap: id, reason })
        }
    }
}

fn second_touch(
    ctx: &mut Context,
    id: GapId,
    m1: &BarSeries,
    first: DateTime<Utc>,
    now: DateTime<Utc>,
) -> Option<GapEvent> {
    let (hi, lo) = extremes(m1.range(first, now))?;
    let gap = ctx.gap_mut(id)?;
    gap.second_touch_at = Some(now);
    gap.set_extremes(hi, lo);
    let entry_mid = gap.entry_mid?;
    debug!(gap = %id, at = %now, hi, lo, entry_mid, "second touch armed");
    Some(GapEvent::SecondTouch { gap: id, entry_mid })
}

/// Highest high and lowest low of `bars`.
fn extremes(bars: &[Bar]) -> Option<(f64, f64)> {
    if bars.is_empty() {
        return None;
    }
    let hi = bars.iter().map(|b| b.high).fold(f64::NEG_INFINITY, f64::max);
    let lo = bars.iter().map(|b| b.low).fold(f64::INFINITY, f64::min);
    Some((hi, lo))
}

//! Gap detector — three same-colour 15-minute candles leaving a price void.

use chrono::{DateTime, Duration, Utc};
use tracing::debug;

use crate::domain::{Bar, GapId, GapKind};

use super::context::Context;
use super::series::BarSeries;

/// Pattern found on a 15-minute triple, before deduplication.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GapPattern {
    pub kind: GapKind,
    pub top: f64,
    pub bottom: f64,
}

/// Inspect `first`, `second`, `third` (oldest first) for a fair value gap.
pub fn find_pattern(first: &Bar, second: &Bar, third: &Bar, min_gap_points: f64) -> Option<GapPattern> {
    let all_up = first.is_bullish() && second.is_bullish() && third.is_bullish();
    let all_down = first.is_bearish() && second.is_bearish() && third.is_bearish();

    if all_up && third.low > first.high && third.low - first.high >= min_gap_points {
        return Some(GapPattern {
            kind: GapKind::Bullish,
            top: third.low,
            bottom: first.high,
        });
    }
    if all_down && third.high < first.low && first.low - third.high >= min_gap_points {
        return Some(GapPattern {
            kind: GapKind::Bearish,
            top: first.low,
            bottom: third.high,
        });
    }
    None
}

/// Run detection for the 15-minute bar closed at `now`.
///
/// Needs the three 15-minute bars stamped within the last 30 minutes; fewer is
/// a no-op. A gap whose `created_at` already exists is not created again.
pub fn on_fifteen_minute_bar(
    ctx: &mut Context,
    m15: &BarSeries,
    now: DateTime<Utc>,
    min_gap_points: f64,
) -> Option<GapId> {
    let window = m15.range(now - Duration::minutes(30), now);
    let [first, second, third] = window else {
        return None;
    };

    let pattern = find_pattern(first, second, third, min_gap_points)?;
    if ctx.has_gap_created_at(third.timestamp) {
        return None;
    }

    let id = ctx.insert_gap(pattern.kind, pattern.top, pattern.bottom, third.timestamp);
    debug!(
        gap = %id,
        kind = %pattern.kind,
        top = pattern.top,
        bottom = pattern.bottom,
        created_at = %third.timestamp,
        "gap created"
    );
    Some(id)
}

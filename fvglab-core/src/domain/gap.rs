//! Gap — one detected three-candle price void and its lifecycle state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::bar::Bar;
use super::ids::{GapId, TradeUid};

/// Which candle colour completed the pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GapKind {
    Bullish,
    Bearish,
}

impl GapKind {
    /// Gaps are faded: a bullish gap is traded short, a bearish gap long.
    pub fn trade_direction(self) -> Direction {
        match self {
            GapKind::Bullish => Direction::Short,
            GapKind::Bearish => Direction::Long,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            GapKind::Bullish => "bullish",
            GapKind::Bearish => "bearish",
        }
    }
}

impl fmt::Display for GapKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Trade direction implied by a gap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Long,
    Short,
}

impl Direction {
    pub fn as_str(self) -> &'static str {
        match self {
            Direction::Long => "long",
            Direction::Short => "short",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Round a price to 2 decimal places.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// A detected fair value gap.
///
/// Lifecycle: created → first touch (structure validated) → second touch
/// (entry midpoint armed) → position open. Once `position_open` is set the
/// gap is inert until the session resets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Gap {
    pub id: GapId,
    pub kind: GapKind,
    pub direction: Direction,
    pub top: f64,
    pub bottom: f64,
    pub created_at: DateTime<Utc>,

    pub first_touch_at: Option<DateTime<Utc>>,
    pub second_touch_at: Option<DateTime<Utc>>,

    /// Running 1-minute extremes from the first touch onward.
    pub hi_since_ft: Option<f64>,
    pub lo_since_ft: Option<f64>,
    /// Midpoint of the running extremes, rounded to cents.
    pub entry_mid: Option<f64>,

    pub position_open: bool,

    pub sl_initial: Option<f64>,
    pub sl_adjusted: Option<f64>,
    pub sl_updated_at: Option<DateTime<Utc>>,
    pub tp_initial: Option<f64>,
    pub tp_adjusted: Option<f64>,
    pub tp_updated_at: Option<DateTime<Utc>>,

    pub uid: Option<TradeUid>,
    /// An entry attempt already produced an anomaly; later attempts stay quiet.
    #[serde(default)]
    pub anomaly_reported: bool,
}

impl Gap {
    pub fn new(
        id: GapId,
        kind: GapKind,
        top: f64,
        bottom: f64,
        created_at: DateTime<Utc>,
    ) -> Self {
        debug_assert!(top > bottom, "gap top {top} must exceed bottom {bottom}");
        Self {
            id,
            kind,
            direction: kind.trade_direction(),
            top,
            bottom,
            created_at,
            first_touch_at: None,
            second_touch_at: None,
            hi_since_ft: None,
            lo_since_ft: None,
            entry_mid: None,
            position_open: false,
            sl_initial: None,
            sl_adjusted: None,
            sl_updated_at: None,
            tp_initial: None,
            tp_adjusted: None,
            tp_updated_at: None,
            uid: None,
            anomaly_reported: false,
        }
    }

    /// Inclusive containment in `[bottom, top]`.
    pub fn contains(&self, price: f64) -> bool {
        self.bottom <= price && price <= self.top
    }

    /// A single bar engulfing the whole gap.
    pub fn is_spanned_by(&self, bar: &Bar) -> bool {
        bar.high > self.top && bar.low < self.bottom
    }

    /// Re-entry into the gap from the approach side.
    ///
    /// Short: `current` dips in (low or close inside) after `previous` stayed
    /// entirely above the top. Long: mirrored against the bottom.
    pub fn is_reentry(&self, current: &Bar, previous: &Bar) -> bool {
        match self.direction {
            Direction::Short => {
                (self.contains(current.low) || self.contains(current.close))
                    && previous.low > self.top
            }
            Direction::Long => {
                (self.contains(current.high) || self.contains(current.close))
                    && previous.high < self.bottom
            }
        }
    }

    /// Second touch stamped and no position yet.
    pub fn is_armed(&self) -> bool {
        self.second_touch_at.is_some() && !self.position_open
    }

    /// Overwrite both running extremes and refresh the cached midpoint.
    pub fn set_extremes(&mut self, hi: f64, lo: f64) {
        self.hi_since_ft = Some(hi);
        self.lo_since_ft = Some(lo);
        self.entry_mid = Some(round2((hi + lo) / 2.0));
    }
}

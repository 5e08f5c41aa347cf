//! Multi-timeframe FVG engine.
//!
//! Every closed 1-minute bar triggers one synchronous pass:
//!
//! 1. Session gate: outside the window, flatten and reset, nothing else runs
//! 2. Aggregation: append the 1m bar, close 5m/15m bars on their boundaries
//! 3. Touch tracking on a closed 5m bar (invalidation, first and second touch)
//! 4. Gap detection on a closed 15m bar
//! 5. Entry & risk on the 1m bar for every armed gap
//!
//! The pass owns all mutable state ([`Context`] and the bar series); nothing
//! here blocks or spawns.

pub mod context;
pub mod detector;
pub mod entry;
pub mod risk;
pub mod series;
pub mod strategy;
pub mod structure;
pub mod touch;

pub use context::Context;
pub use entry::{Entry, EntryOutcome};
pub use risk::Levels;
pub use series::{BarAggregator, BarSeries, ClosedFrames};
pub use strategy::{FvgStrategy, PassReport};
pub use structure::{Rejection, Verdict};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::domain::{BarError, Direction, GapId};

/// Errors that abort a pass.
#[derive(Debug, Error, PartialEq)]
pub enum EngineError {
    #[error("bar at {got} is not after the previous bar at {previous}")]
    OutOfOrder {
        previous: DateTime<Utc>,
        got: DateTime<Utc>,
    },
    #[error(transparent)]
    Bar(#[from] BarError),
}

/// Gap lifecycle transitions observed during a pass.
#[derive(Debug, Clone, PartialEq)]
pub enum GapEvent {
    Created(GapId),
    Invalidated(GapId),
    Rejected { gap: GapId, reason: Rejection },
    FirstTouch { gap: GapId, score: f64 },
    SecondTouch { gap: GapId, entry_mid: f64 },
}

/// Conditions reported instead of aborting the pass.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Anomaly {
    /// Entry and stop coincide, so reward:risk is undefined.
    DegenerateRisk {
        gap: GapId,
        timestamp: DateTime<Utc>,
        entry: f64,
        stop: f64,
    },
    /// The adjusted target is not on the profit side of the entry.
    TargetBehindEntry {
        gap: GapId,
        timestamp: DateTime<Utc>,
        direction: Direction,
        entry: f64,
        target: f64,
    },
}

impl fmt::Display for Anomaly {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Anomaly::DegenerateRisk {
                gap,
                timestamp,
                entry,
                stop,
            } => write!(
                f,
                "{gap} at {timestamp}: stop {stop:.2} equals entry {entry:.2}"
            ),
            Anomaly::TargetBehindEntry {
                gap,
                timestamp,
                direction,
                entry,
                target,
            } => write!(
                f,
                "{gap} at {timestamp}: {direction} target {target:.2} is not beyond entry {entry:.2}"
            ),
        }
    }
}

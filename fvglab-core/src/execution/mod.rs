//! Execution collaborator: the seam between the strategy and whatever fills its orders.
//!
//! The strategy only needs three things from execution: a place to submit
//! limit entries with attached stop and target, a query for exposure, and a
//! way to flatten everything when the session closes. [`PaperExecution`] is
//! the in-process implementation used by the backtest runner.

pub mod paper;

pub use paper::{OrderState, PaperExecution, PaperOrder};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{round2, Bar, Direction, TradeSignal, TradeUid};
use crate::trade_log::ExitResult;

/// Execution surface the strategy drives.
pub trait Execution {
    /// Accept a limit entry with attached stop and target.
    fn submit(&mut self, signal: &TradeSignal);

    /// Any entry that is still pending or filled and not yet exited.
    fn has_open_position(&self) -> bool;

    /// Flatten open positions at `price` and cancel pending entries.
    fn close_all(&mut self, timestamp: DateTime<Utc>, price: f64) -> Vec<ClosedPosition>;

    /// Advance fills and exits by one 1-minute bar.
    fn on_bar(&mut self, bar: &Bar) -> Vec<ClosedPosition>;
}

/// A position that has left the market.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClosedPosition {
    pub tag: TradeUid,
    pub direction: Direction,
    pub entry_time: DateTime<Utc>,
    pub entry_price: f64,
    pub exit_time: DateTime<Utc>,
    pub exit_price: f64,
    pub result: ExitResult,
    pub profit: f64,
}

/// Stop or target hit by `bar`, stop checked first.
pub fn bracket_exit(direction: Direction, stop: f64, target: f64, bar: &Bar) -> Option<(f64, ExitResult)> {
    match direction {
        Direction::Long if bar.low <= stop => Some((stop, ExitResult::Loss)),
        Direction::Long if bar.high >= target => Some((target, ExitResult::Win)),
        Direction::Short if bar.high >= stop => Some((stop, ExitResult::Loss)),
        Direction::Short if bar.low <= target => Some((target, ExitResult::Win)),
        _ => None,
    }
}

/// Per-contract profit in price points, rounded to cents.
pub fn profit_points(direction: Direction, entry: f64, exit: f64) -> f64 {
    match direction {
        Direction::Long => round2(exit - entry),
        Direction::Short => round2(entry - exit),
    }
}

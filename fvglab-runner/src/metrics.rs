//! Run metrics — pure functions over evaluated trades.
//!
//! Profits are per contract in price points; the curve is the running sum of
//! trade profits in exit order.

use serde::{Deserialize, Serialize};

use fvglab_core::trade_log::{ExitResult, TradeLogRecord};

/// Aggregate statistics for one backtest run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunMetrics {
    pub trade_count: usize,
    pub wins: usize,
    pub losses: usize,
    pub session_closes: usize,
    pub win_rate: f64,
    pub total_profit: f64,
    pub avg_profit: f64,
    pub best_trade: f64,
    pub worst_trade: f64,
    pub profit_factor: f64,
    /// Largest peak-to-trough fall of the cumulative profit curve (points, ≤ 0).
    pub max_drawdown: f64,
    pub avg_reward_risk: f64,
}

impl RunMetrics {
    /// Compute all metrics. Records without an exit block are ignored.
    pub fn compute(records: &[TradeLogRecord]) -> Self {
        let profits = profits(records);
        let count_result = |wanted: ExitResult| {
            records
                .iter()
                .filter(|r| r.exit.is_some_and(|e| e.result == wanted))
                .count()
        };
        let reward_risks: Vec<f64> = records
            .iter()
            .filter(|r| r.exit.is_some())
            .map(|r| r.reward_risk)
            .collect();

        Self {
            trade_count: profits.len(),
            wins: count_result(ExitResult::Win),
            losses: count_result(ExitResult::Loss),
            session_closes: count_result(ExitResult::SessionClose),
            win_rate: win_rate(&profits),
            total_profit: profits.iter().sum(),
            avg_profit: mean_f64(&profits),
            best_trade: profits.iter().copied().reduce(f64::max).unwrap_or(0.0),
            worst_trade: profits.iter().copied().reduce(f64::min).unwrap_or(0.0),
            profit_factor: profit_factor(&profits),
            max_drawdown: max_drawdown(&cumulative(&profits)),
            avg_reward_risk: mean_f64(&reward_risks),
        }
    }
}

// ─── Individual metric functions ────────────────────────────────────

/// Realized profits of evaluated trades, ordered by exit time.
pub fn profits(records: &[TradeLogRecord]) -> Vec<f64> {
    let mut exits: Vec<_> = records.iter().filter_map(|r| r.exit).collect();
    exits.sort_by_key(|e| e.time);
    exits.into_iter().map(|e| e.profit).collect()
}

/// Fraction of trades with a strictly positive profit.
pub fn win_rate(profits: &[f64]) -> f64 {
    if profits.is_empty() {
        return 0.0;
    }
    profits.iter().filter(|&&p| p > 0.0).count() as f64 / profits.len() as f64
}

/// Gross profit / gross loss.
///
/// Capped at 100.0 for edge cases (all winners, zero losses).
pub fn profit_factor(profits: &[f64]) -> f64 {
    if profits.is_empty() {
        return 0.0;
    }
    let gross_profit: f64 = profits.iter().filter(|&&p| p > 0.0).sum();
    let gross_loss: f64 = profits.iter().filter(|&&p| p < 0.0).map(|p| p.abs()).sum();

    if gross_loss < 1e-10 {
        return if gross_profit > 0.0 { 100.0 } else { 0.0 };
    }
    (gross_profit / gross_loss).min(100.0)
}

/// Running sum starting from zero.
pub fn cumulative(profits: &[f64]) -> Vec<f64> {
    std::iter::once(0.0)
        .chain(profits.iter().scan(0.0, |acc, p| {
            *acc += p;
            Some(*acc)
        }))
        .collect()
}

/// Maximum drawdown of an additive curve, in the curve's units (≤ 0).
pub fn max_drawdown(curve: &[f64]) -> f64 {
    let mut peak = f64::NEG_INFINITY;
    let mut max_dd = 0.0_f64;
    for &value in curve {
        peak = peak.max(value);
        max_dd = max_dd.min(value - peak);
    }
    max_dd
}

pub(crate) fn mean_f64(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

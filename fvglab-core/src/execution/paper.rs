//! In-process paper execution: limit entries with a stop/target bracket.

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::domain::{Bar, TradeSignal};
use crate::trade_log::ExitResult;

use super::{bracket_exit, profit_points, ClosedPosition, Execution};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OrderState {
    /// Limit entry waiting for a bar to trade through it.
    Pending,
    Open { filled_at: DateTime<Utc> },
    Closed(ClosedPosition),
    Cancelled { at: DateTime<Utc> },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PaperOrder {
    pub signal: TradeSignal,
    pub state: OrderState,
}

impl PaperOrder {
    fn is_live(&self) -> bool {
        matches!(self.state, OrderState::Pending | OrderState::Open { .. })
    }

    fn close(&mut self, at: DateTime<Utc>, price: f64, result: ExitResult) -> Option<ClosedPosition> {
        let OrderState::Open { filled_at } = self.state else {
            return None;
        };
        let closed = ClosedPosition {
            tag: self.signal.tag,
            direction: self.signal.direction,
            entry_time: filled_at,
            entry_price: self.signal.limit_price,
            exit_time: at,
            exit_price: price,
            result,
            profit: profit_points(self.signal.direction, self.signal.limit_price, price),
        };
        self.state = OrderState::Closed(closed);
        Some(closed)
    }
}

/// Fills limits at their limit price and exits at the bracket level touched.
///
/// No slippage, commissions or partial fills.
#[derive(Debug, Clone, Default)]
pub struct PaperExecution {
    orders: Vec<PaperOrder>,
}

impl PaperExecution {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn orders(&self) -> &[PaperOrder] {
        &self.orders
    }

    pub fn closed(&self) -> impl Iterator<Item = &ClosedPosition> {
        self.orders.iter().filter_map(|o| match &o.state {
            OrderState::Closed(closed) => Some(closed),
            _ => None,
        })
    }
}

impl Execution for PaperExecution {
    fn submit(&mut self, signal: &TradeSignal) {
        debug!(tag = %signal.tag, limit = signal.limit_price, "paper order accepted");
        self.orders.push(PaperOrder {
            signal: *signal,
            state: OrderState::Pending,
        });
    }

    fn has_open_position(&self) -> bool {
        self.orders.iter().any(PaperOrder::is_live)
    }

    fn close_all(&mut self, timestamp: DateTime<Utc>, price: f64) -> Vec<ClosedPosition> {
        let mut closed = Vec::new();
        for order in &mut self.orders {
            match order.state {
                OrderState::Pending => order.state = OrderState::Cancelled { at: timestamp },
                OrderState::Open { .. } => {
                    closed.extend(order.close(timestamp, price, ExitResult::SessionClose));
                }
                _ => {}
            }
        }
        closed
    }

    fn on_bar(&mut self, bar: &Bar) -> Vec<ClosedPosition> {
        let mut closed = Vec::new();
        for order in &mut self.orders {
            let signal = order.signal;
            if order.state == OrderState::Pending
                && bar.timestamp > signal.timestamp
                && bar.trades_through(signal.limit_price)
            {
                order.state = OrderState::Open {
                    filled_at: bar.timestamp,
                };
                debug!(tag = %signal.tag, at = %bar.timestamp, "paper entry filled");
            }
            if let OrderState::Open { .. } = order.state {
                if let Some((price, result)) =
                    bracket_exit(signal.direction, signal.stop, signal.target, bar)
                {
                    closed.extend(order.close(bar.timestamp, price, result));
                }
            }
        }
        closed
    }
}

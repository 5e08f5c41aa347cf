//! Trade signal handed to the execution collaborator.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::gap::Direction;
use super::ids::{GapId, TradeUid};

/// Limit entry with attached protective stop and profit target.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TradeSignal {
    pub tag: TradeUid,
    pub gap: GapId,
    pub timestamp: DateTime<Utc>,
    pub direction: Direction,
    pub size: f64,
    pub limit_price: f64,
    pub stop: f64,
    pub target: f64,
}

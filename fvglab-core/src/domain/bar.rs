//! Bar — the fundamental market data unit.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised when a bar fails its OHLC sanity checks.
#[derive(Debug, Error, PartialEq)]
pub enum BarError {
    #[error("bar at {0} has a non-finite price")]
    NonFinite(DateTime<Utc>),
    #[error("bar at {timestamp} is inconsistent: open={open} high={high} low={low} close={close}")]
    Inconsistent {
        timestamp: DateTime<Utc>,
        open: f64,
        high: f64,
        low: f64,
        close: f64,
    },
}

/// OHLCV bar for one interval of one instrument.
///
/// `timestamp` is the exclusive right edge of the interval: the 1-minute bar
/// stamped 10:05 covers 10:04–10:05, and the 5-minute bar stamped 10:05
/// covers 10:00–10:05.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: u64,
}

impl Bar {
    pub fn new(
        timestamp: DateTime<Utc>,
        open: f64,
        high: f64,
        low: f64,
        close: f64,
        volume: u64,
    ) -> Self {
        Self {
            timestamp,
            open,
            high,
            low,
            close,
            volume,
        }
    }

    /// Close strictly above open.
    pub fn is_bullish(&self) -> bool {
        self.close > self.open
    }

    /// Close strictly below open.
    pub fn is_bearish(&self) -> bool {
        self.close < self.open
    }

    /// True if `price` lies within `[low, high]`.
    pub fn trades_through(&self, price: f64) -> bool {
        self.low <= price && price <= self.high
    }

    /// Basic OHLC sanity check: finite prices, high >= low, open/close inside the range.
    pub fn validate(&self) -> Result<(), BarError> {
        let prices = [self.open, self.high, self.low, self.close];
        if prices.iter().any(|p| !p.is_finite()) {
            return Err(BarError::NonFinite(self.timestamp));
        }
        let sane = self.high >= self.low
            && self.high >= self.open
            && self.high >= self.close
            && self.low <= self.open
            && self.low <= self.close;
        if !sane {
            return Err(BarError::Inconsistent {
                timestamp: self.timestamp,
                open: self.open,
                high: self.high,
                low: self.low,
                close: self.close,
            });
        }
        Ok(())
    }
}

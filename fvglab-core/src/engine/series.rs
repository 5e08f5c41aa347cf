//! Per-timeframe bar series and the 1m → 5m/15m aggregator.

use chrono::{DateTime, Duration, Utc};

use crate::domain::Bar;

use super::EngineError;

/// Append-only, strictly time-ordered bar series.
#[derive(Debug, Clone, Default)]
pub struct BarSeries {
    bars: Vec<Bar>,
}

impl BarSeries {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, bar: Bar) -> Result<(), EngineError> {
        if let Some(last) = self.bars.last() {
            if bar.timestamp <= last.timestamp {
                return Err(EngineError::OutOfOrder {
                    previous: last.timestamp,
                    got: bar.timestamp,
                });
            }
        }
        self.bars.push(bar);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn bars(&self) -> &[Bar] {
        &self.bars
    }

    pub fn last(&self) -> Option<&Bar> {
        self.bars.last()
    }

    /// The bar before the most recent one.
    pub fn previous(&self) -> Option<&Bar> {
        self.bars.len().checked_sub(2).map(|i| &self.bars[i])
    }

    /// Position of the last bar stamped at or before `ts`.
    pub fn index_at_or_before(&self, ts: DateTime<Utc>) -> Option<usize> {
        self.bars
            .partition_point(|b| b.timestamp <= ts)
            .checked_sub(1)
    }

    /// Bars with `start <= timestamp <= end`.
    pub fn range(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> &[Bar] {
        let lo = self.bars.partition_point(|b| b.timestamp < start);
        let hi = self.bars.partition_point(|b| b.timestamp <= end);
        if lo >= hi {
            return &[];
        }
        &self.bars[lo..hi]
    }
}

/// Collapse consecutive bars into one: first open, max high, min low, last close, summed volume.
pub fn merge_bars(bars: &[Bar], timestamp: DateTime<Utc>) -> Option<Bar> {
    let first = bars.first()?;
    let last = bars.last()?;
    let high = bars.iter().map(|b| b.high).fold(f64::NEG_INFINITY, f64::max);
    let low = bars.iter().map(|b| b.low).fold(f64::INFINITY, f64::min);
    let volume = bars.iter().map(|b| b.volume).sum();
    Some(Bar::new(timestamp, first.open, high, low, last.close, volume))
}

/// Which higher timeframes closed on the latest 1-minute bar.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClosedFrames {
    pub five: bool,
    pub fifteen: bool,
}

/// Holds the 1m, 5m and 15m series for one run.
///
/// Higher timeframes are derived only: every 1-minute bar stamped on a
/// 5-minute (15-minute) boundary closes a 5-minute (15-minute) bar built from
/// the 1-minute bars in `(ts - N min, ts]`.
#[derive(Debug, Clone, Default)]
pub struct BarAggregator {
    m1: BarSeries,
    m5: BarSeries,
    m15: BarSeries,
}

impl BarAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn m1(&self) -> &BarSeries {
        &self.m1
    }

    pub fn m5(&self) -> &BarSeries {
        &self.m5
    }

    pub fn m15(&self) -> &BarSeries {
        &self.m15
    }

    pub fn push_minute(&mut self, bar: Bar) -> Result<ClosedFrames, EngineError> {
        self.m1.push(bar)?;
        let ts = bar.timestamp;
        let mut closed = ClosedFrames::default();

        if on_boundary(ts, 5) {
            if let Some(five) = self.synthesize(ts, 5) {
                self.m5.push(five)?;
                closed.five = true;
            }
        }
        if on_boundary(ts, 15) {
            if let Some(fifteen) = self.synthesize(ts, 15) {
                self.m15.push(fifteen)?;
                closed.fifteen = true;
            }
        }
        Ok(closed)
    }

    fn synthesize(&self, ts: DateTime<Utc>, minutes: i64) -> Option<Bar> {
        let start = ts - Duration::minutes(minutes - 1);
        merge_bars(self.m1.range(start, ts), ts)
    }
}

fn on_boundary(ts: DateTime<Utc>, minutes: i64) -> bool {
    ts.timestamp().rem_euclid(minutes * 60) == 0
}

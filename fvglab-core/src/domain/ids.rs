use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable handle of a gap inside a run's active set.
///
/// Components pass `GapId`s across their boundaries rather than references;
/// the handle stays valid until the gap is discarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct GapId(pub u64);

impl fmt::Display for GapId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "gap#{}", self.0)
    }
}

/// Trade identifier assigned at the moment of entry. Unique and increasing per run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TradeUid(pub u64);

impl fmt::Display for TradeUid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Monotonic id source owned by a single run context.
#[derive(Debug, Clone, Default)]
pub struct IdGen {
    next_gap: u64,
    next_uid: u64,
}

impl IdGen {
    pub fn next_gap_id(&mut self) -> GapId {
        self.next_gap += 1;
        GapId(self.next_gap)
    }

    /// First uid handed out is 1.
    pub fn next_trade_uid(&mut self) -> TradeUid {
        self.next_uid += 1;
        TradeUid(self.next_uid)
    }
}

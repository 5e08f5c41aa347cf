//! Per-run context: the active gap set and session aggregates.

use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

use crate::domain::{Bar, Gap, GapId, GapKind, IdGen, TradeUid};

/// Mutable state shared by the detector, tracker and entry engine.
///
/// Gaps live in an ordered map keyed by their stable [`GapId`]; iteration
/// follows creation order. One context is built per run and never shared
/// between runs.
#[derive(Debug, Clone, Default)]
pub struct Context {
    gaps: BTreeMap<GapId, Gap>,
    ids: IdGen,
    session_high: Option<f64>,
    session_low: Option<f64>,
    gaps_created: usize,
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_gap(
        &mut self,
        kind: GapKind,
        top: f64,
        bottom: f64,
        created_at: DateTime<Utc>,
    ) -> GapId {
        let id = self.ids.next_gap_id();
        self.gaps.insert(id, Gap::new(id, kind, top, bottom, created_at));
        self.gaps_created += 1;
        id
    }

    pub fn has_gap_created_at(&self, created_at: DateTime<Utc>) -> bool {
        self.gaps.values().any(|g| g.created_at == created_at)
    }

    pub fn gap(&self, id: GapId) -> Option<&Gap> {
        self.gaps.get(&id)
    }

    pub fn gap_mut(&mut self, id: GapId) -> Option<&mut Gap> {
        self.gaps.get_mut(&id)
    }

    pub fn remove_gap(&mut self, id: GapId) -> Option<Gap> {
        self.gaps.remove(&id)
    }

    /// Snapshot of active ids, safe to iterate while mutating the set.
    pub fn gap_ids(&self) -> Vec<GapId> {
        self.gaps.keys().copied().collect()
    }

    pub fn gaps(&self) -> impl Iterator<Item = &Gap> {
        self.gaps.values()
    }

    pub fn active_len(&self) -> usize {
        self.gaps.len()
    }

    /// Total gaps created over the lifetime of the run, across session resets.
    pub fn gaps_created(&self) -> usize {
        self.gaps_created
    }

    pub fn next_trade_uid(&mut self) -> TradeUid {
        self.ids.next_trade_uid()
    }

    pub fn observe_bar(&mut self, bar: &Bar) {
        self.session_high = Some(self.session_high.map_or(bar.high, |h| h.max(bar.high)));
        self.session_low = Some(self.session_low.map_or(bar.low, |l| l.min(bar.low)));
    }

    pub fn session_high(&self) -> Option<f64> {
        self.session_high
    }

    pub fn session_low(&self) -> Option<f64> {
        self.session_low
    }

    /// Discard every active gap and the session aggregates.
    ///
    /// Id counters survive so trade uids stay unique for the whole run.
    pub fn reset_session(&mut self) {
        self.gaps.clear();
        self.session_high = None;
        self.session_low = None;
    }
}

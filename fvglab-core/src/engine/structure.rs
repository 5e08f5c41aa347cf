//! Structure validator — scores the retracement from gap creation to first touch.
//!
//! A retracement counts as structure when, after the extreme on the far side
//! of the move, enough consecutive 5-minute bars step back toward the gap as
//! a ladder (lower highs and lower lows for a short, higher highs and higher
//! lows for a long).

use crate::domain::{Bar, Direction};

/// Why a first touch was refused.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Rejection {
    /// Creation and re-entry are too close in time.
    TooFewBars { have: usize, need: usize },
    /// Fewer than two bars between the extreme and the re-entry bar.
    ShortRetracement { bars: usize },
    /// Ladder score under the configured threshold.
    LowScore { score: f64 },
}

/// Outcome of a structure check.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Verdict {
    Accepted { score: f64 },
    Rejected(Rejection),
}

/// Fraction of adjacent pairs in `bars` that form a ladder step in `direction`.
///
/// Returns `None` for fewer than two bars.
pub fn ladder_score(bars: &[Bar], direction: Direction) -> Option<f64> {
    if bars.len() < 2 {
        return None;
    }
    let steps = bars
        .windows(2)
        .filter(|pair| is_ladder_step(&pair[0], &pair[1], direction))
        .count();
    Some(steps as f64 / (bars.len() - 1) as f64)
}

fn is_ladder_step(current: &Bar, next: &Bar, direction: Direction) -> bool {
    match direction {
        Direction::Short => next.high < current.high && next.low < current.low,
        Direction::Long => next.high > current.high && next.low > current.low,
    }
}

/// Index of the first bar holding the extreme opposite the trade: highest
/// high for shorts, lowest low for longs.
fn extreme_index(bars: &[Bar], direction: Direction) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (i, bar) in bars.iter().enumerate() {
        let value = match direction {
            Direction::Short => bar.high,
            Direction::Long => bar.low,
        };
        let better = match (best, direction) {
            (None, _) => true,
            (Some((_, b)), Direction::Short) => value > b,
            (Some((_, b)), Direction::Long) => value < b,
        };
        if better {
            best = Some((i, value));
        }
    }
    best.map(|(i, _)| i)
}

/// Validate the 5-minute `window` running from gap creation through the
/// candidate re-entry bar (both inclusive).
pub fn validate(
    window: &[Bar],
    direction: Direction,
    min_bars: usize,
    min_score: f64,
) -> Verdict {
    if window.len() < min_bars || window.is_empty() {
        return Verdict::Rejected(Rejection::TooFewBars {
            have: window.len(),
            need: min_bars,
        });
    }

    let reentry = window.len() - 1;
    let start = extreme_index(window, direction).map_or(reentry, |i| i + 1);
    let retracement: &[Bar] = if start < reentry {
        &window[start..reentry]
    } else {
        &[]
    };

    let Some(score) = ladder_score(retracement, direction) else {
        return Verdict::Rejected(Rejection::ShortRetracement {
            bars: retracement.len(),
        });
    };

    if score >= min_score {
        Verdict::Accepted { score }
    } else {
        Verdict::Rejected(Rejection::LowScore { score })
    }
}

//! Parameter sweep over the gap detector and risk knobs.
//!
//! Every combination runs against the same pre-loaded bars with its own
//! strategy instance, so runs share nothing but the input slice.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::info;

use fvglab_core::domain::Bar;

use crate::config::{BacktestConfig, RunId};
use crate::metrics::RunMetrics;
use crate::runner::{run_backtest_from_bars, RunError};

/// Parameter grid specification.
///
/// Defines the values to try for each swept parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParamGrid {
    pub min_gap_points: Vec<f64>,
    pub min_retracement_scores: Vec<f64>,
    pub sl_max_candles: Vec<usize>,
}

impl Default for ParamGrid {
    fn default() -> Self {
        Self {
            min_gap_points: vec![7.5, 10.0, 12.5, 15.0],
            min_retracement_scores: vec![0.0, 0.2, 0.4],
            sl_max_candles: vec![2, 4, 6],
        }
    }
}

impl ParamGrid {
    /// Returns the total number of configurations in this grid.
    pub fn size(&self) -> usize {
        self.min_gap_points.len() * self.min_retracement_scores.len() * self.sl_max_candles.len()
    }

    /// Generates all configurations in the grid, in row-major order.
    pub fn generate_configs(&self, base_config: &BacktestConfig) -> Vec<BacktestConfig> {
        let mut configs = Vec::with_capacity(self.size());

        for &gap in &self.min_gap_points {
            for &score in &self.min_retracement_scores {
                for &candles in &self.sl_max_candles {
                    let mut config = base_config.clone();
                    config.strategy.min_gap_points = gap;
                    config.strategy.min_retracement_score = score;
                    config.strategy.sl_max_candles = candles;
                    configs.push(config);
                }
            }
        }

        configs
    }
}

/// One grid point and how it performed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweepResult {
    pub run_id: RunId,
    pub min_gap_points: f64,
    pub min_retracement_score: f64,
    pub sl_max_candles: usize,
    pub signals: usize,
    pub metrics: RunMetrics,
}

/// Runs every grid configuration in parallel.
///
/// Results are sorted by total profit, best first; ties keep grid order.
/// The first failing configuration aborts the sweep.
pub fn run_sweep(
    grid: &ParamGrid,
    base_config: &BacktestConfig,
    bars: &[Bar],
    dataset_hash: &str,
) -> Result<Vec<SweepResult>, RunError> {
    let configs = grid.generate_configs(base_config);
    info!(combinations = configs.len(), bars = bars.len(), "starting sweep");

    let mut results = configs
        .par_iter()
        .map(|config| {
            let result = run_backtest_from_bars(config, bars, dataset_hash)?;
            Ok(SweepResult {
                run_id: result.run_id,
                min_gap_points: config.strategy.min_gap_points,
                min_retracement_score: config.strategy.min_retracement_score,
                sl_max_candles: config.strategy.sl_max_candles,
                signals: result.signals.len(),
                metrics: result.metrics,
            })
        })
        .collect::<Result<Vec<_>, RunError>>()?;

    results.sort_by(|a, b| b.metrics.total_profit.total_cmp(&a.metrics.total_profit));
    Ok(results)
}

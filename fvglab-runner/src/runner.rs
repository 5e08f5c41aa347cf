//! Backtest runner — wires data, strategy, paper execution, evaluation and metrics.
//!
//! Two entry points:
//! - `run_single_backtest()`: loads bars per the config, then runs. Used by CLI.
//! - `run_backtest_from_bars()`: takes pre-loaded bars. Used by sweeps and tests.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use fvglab_core::config::ConfigError as StrategyConfigError;
use fvglab_core::domain::{Bar, TradeSignal};
use fvglab_core::engine::{Anomaly, EngineError, FvgStrategy};
use fvglab_core::execution::{ClosedPosition, Execution, PaperExecution};
use fvglab_core::session::SessionGate;
use fvglab_core::trade_log::TradeLogRecord;

use crate::config::{BacktestConfig, ConfigError, RunId};
use crate::data_loader::{load_bars, LoadError};
use crate::evaluation::{evaluate_trade_log, ExitError};
use crate::metrics::RunMetrics;

/// Errors from the runner.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("strategy config error: {0}")]
    Strategy(#[from] StrategyConfigError),
    #[error("data error: {0}")]
    Data(#[from] LoadError),
    #[error("engine error: {0}")]
    Engine(#[from] EngineError),
    #[error("exit evaluation error: {0}")]
    Exit(#[from] ExitError),
}

/// Current schema version for persisted artifacts.
pub const SCHEMA_VERSION: u32 = 1;

/// Complete result of a single backtest run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktestResult {
    /// Schema version for forward-compatible deserialization.
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    pub run_id: RunId,
    pub dataset_hash: String,
    pub synthetic: bool,
    pub bar_count: usize,
    pub bars_in_session: usize,
    pub gaps_detected: usize,
    pub signals: Vec<TradeSignal>,
    /// Trade log records with their exit blocks.
    pub trades: Vec<TradeLogRecord>,
    pub anomalies: Vec<Anomaly>,
    /// Positions the paper broker closed during the pass, bracket hits and session flattens.
    /// Trade exits in `trades` come from replaying the bars, not from this list.
    #[serde(default)]
    pub paper_closed: Vec<ClosedPosition>,
    pub metrics: RunMetrics,
}

/// Default schema version for serde deserialization of older JSON without the field.
fn default_schema_version() -> u32 {
    SCHEMA_VERSION
}

/// Load the configured bars and run.
pub fn run_single_backtest(config: &BacktestConfig) -> Result<BacktestResult, RunError> {
    config.validate()?;
    let loaded = load_bars(&config.data)?;
    let mut result = run_backtest_from_bars(config, &loaded.bars, &loaded.dataset_hash)?;
    result.synthetic = loaded.synthetic;
    Ok(result)
}

/// Run a backtest over pre-loaded, time-ordered 1-minute bars, without I/O.
pub fn run_backtest_from_bars(
    config: &BacktestConfig,
    bars: &[Bar],
    dataset_hash: &str,
) -> Result<BacktestResult, RunError> {
    let mut strategy = FvgStrategy::new(config.strategy.clone())?;
    let mut exec = PaperExecution::new();
    let mut log: Vec<TradeLogRecord> = Vec::new();
    let mut signals = Vec::new();
    let mut anomalies = Vec::new();
    let mut paper_closed = Vec::new();
    let mut bars_in_session = 0;

    for bar in bars {
        paper_closed.extend(exec.on_bar(bar));
        let report = strategy.on_bar(*bar, &mut exec, &mut log)?;
        if report.in_session {
            bars_in_session += 1;
        }
        signals.extend(report.signals);
        anomalies.extend(report.anomalies);
        paper_closed.extend(report.closed_positions);
    }

    if !anomalies.is_empty() {
        warn!(count = anomalies.len(), "run finished with anomalies");
    }

    let gate = SessionGate::new(&config.strategy.session)?;
    let trades = evaluate_trade_log(&log, bars, &gate)?;
    let metrics = RunMetrics::compute(&trades);

    let result = BacktestResult {
        schema_version: SCHEMA_VERSION,
        run_id: config.run_id(),
        dataset_hash: dataset_hash.to_string(),
        synthetic: false,
        bar_count: bars.len(),
        bars_in_session,
        gaps_detected: strategy.context().gaps_created(),
        signals,
        trades,
        anomalies,
        paper_closed,
        metrics,
    };
    info!(
        run_id = %result.run_id,
        bars = result.bar_count,
        in_session = result.bars_in_session,
        gaps = result.gaps_detected,
        trades = result.metrics.trade_count,
        paper_closed = result.paper_closed.len(),
        total_profit = result.metrics.total_profit,
        "backtest finished"
    );
    Ok(result)
}

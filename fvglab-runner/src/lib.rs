//! FVG Lab Runner — backtest orchestration on top of `fvglab-core`.
//!
//! This crate provides:
//! - TOML backtest configuration with content-addressed run ids
//! - 1-minute CSV loading plus a deterministic synthetic series
//! - Single-run driver wiring the strategy to paper execution
//! - Post-hoc exit evaluation of the trade log
//! - Run metrics, artifact export, and parallel parameter sweeps

pub mod config;
pub mod data_loader;
pub mod evaluation;
pub mod export;
pub mod metrics;
pub mod runner;
pub mod sweep;

pub use config::{BacktestConfig, ConfigError, DataConfig, OutputConfig, RunId};
pub use data_loader::{
    compute_dataset_hash, generate_synthetic_bars, load_bars, load_csv, LoadError, LoadOptions,
    LoadedData,
};
pub use evaluation::{evaluate_exit, evaluate_trade_log, ExitError};
pub use export::{
    export_json, export_trade_log_jsonl, export_trade_log_text, export_trades_csv,
    generate_report, import_json, load_artifacts, save_artifacts,
};
pub use metrics::RunMetrics;
pub use runner::{
    run_backtest_from_bars, run_single_backtest, BacktestResult, RunError, SCHEMA_VERSION,
};
pub use sweep::{run_sweep, ParamGrid, SweepResult};

//! FVG Lab Core — multi-timeframe fair value gap engine.
//!
//! This crate contains the strategy itself, free of any I/O:
//! - Domain types (bars, gaps, ids, trade signals)
//! - Session gate over a local trading window
//! - 1m → 5m/15m aggregation, gap detection, touch tracking, structure validation
//! - Entry & risk engine with structure-based stop/target adjustment
//! - Execution trait with an in-process paper implementation
//! - Typed trade log with JSON Lines and text renderings

pub mod config;
pub mod domain;
pub mod engine;
pub mod execution;
pub mod session;
pub mod trade_log;

pub use config::{ConfigError, SessionConfig, StrategyConfig};
pub use engine::{Anomaly, EngineError, FvgStrategy, GapEvent, PassReport};
pub use execution::{Execution, PaperExecution};
pub use session::SessionGate;
pub use trade_log::{TradeLogRecord, TradeLogSink};

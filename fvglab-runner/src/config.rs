//! Serializable backtest configuration.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

use fvglab_core::config::{ConfigError as StrategyConfigError, StrategyConfig};

/// Unique identifier for a backtest run (content-addressable hash).
pub type RunId = String;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config TOML: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("invalid strategy parameters: {0}")]
    Strategy(#[from] StrategyConfigError),
    #[error("unknown data timezone '{0}'")]
    DataTimezone(String),
    #[error("start date {start} is after end date {end}")]
    DateRange { start: NaiveDate, end: NaiveDate },
    #[error("no data source: set [data] csv or synthetic = true")]
    NoDataSource,
}

/// Everything needed to reproduce one backtest.
///
/// ```toml
/// [data]
/// csv = "data/NQ.txt"
/// timezone = "America/New_York"
/// start = "2024-03-01"
///
/// [strategy]
/// min_gap_points = 12.5
///
/// [strategy.session]
/// open = "10:00"
/// close = "18:45"
///
/// [output]
/// dir = "runs"
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct BacktestConfig {
    pub data: DataConfig,
    pub strategy: StrategyConfig,
    pub output: OutputConfig,
}

/// Where 1-minute bars come from.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DataConfig {
    /// Headerless `date,time,open,high,low,close,volume` file.
    pub csv: Option<PathBuf>,
    /// Zone the CSV wall-clock times are recorded in.
    pub timezone: String,
    /// First calendar day (inclusive, data timezone).
    pub start: Option<NaiveDate>,
    /// Last calendar day (inclusive, data timezone).
    pub end: Option<NaiveDate>,
    /// Use the deterministic synthetic series instead of a file.
    pub synthetic: bool,
    /// Trading days generated in synthetic mode.
    pub synthetic_days: usize,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            csv: None,
            timezone: "America/New_York".into(),
            start: None,
            end: None,
            synthetic: false,
            synthetic_days: 5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct OutputConfig {
    pub dir: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self { dir: PathBuf::from("runs") }
    }
}

impl BacktestConfig {
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a TOML file. Relative CSV paths resolve against the file's directory.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config = Self::from_toml_str(&text)?;
        if let (Some(csv), Some(parent)) = (config.data.csv.as_mut(), path.parent()) {
            if csv.is_relative() {
                *csv = parent.join(&*csv);
            }
        }
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.strategy.validate()?;
        self.data
            .timezone
            .parse::<chrono_tz::Tz>()
            .map_err(|_| ConfigError::DataTimezone(self.data.timezone.clone()))?;
        if let (Some(start), Some(end)) = (self.data.start, self.data.end) {
            if start > end {
                return Err(ConfigError::DateRange { start, end });
            }
        }
        if self.data.csv.is_none() && !self.data.synthetic {
            return Err(ConfigError::NoDataSource);
        }
        Ok(())
    }

    /// Deterministic hash of the strategy-relevant configuration.
    ///
    /// The output directory is excluded so the same run written to two places
    /// keeps one id.
    pub fn run_id(&self) -> RunId {
        let canonical = serde_json::to_string(&(&self.data, &self.strategy)).unwrap_or_default();
        let hash = blake3::hash(canonical.as_bytes());
        hash.to_hex().to_string()
    }
}

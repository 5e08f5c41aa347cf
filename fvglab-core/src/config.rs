//! Strategy configuration — every tunable of the gap state machine.

use chrono::NaiveTime;
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Configuration validation errors.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("invalid parameter '{name}': {reason}")]
    InvalidParameter { name: &'static str, reason: String },
    #[error("session open {open} must be before close {close}")]
    EmptySession { open: NaiveTime, close: NaiveTime },
    #[error("unknown timezone '{0}'")]
    UnknownTimezone(String),
}

/// Parameters of the gap detector, touch tracker, structure validator and
/// entry engine.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StrategyConfig {
    /// Minimum gap size in price points.
    pub min_gap_points: f64,
    /// Max age in 1-minute bars of an extreme before it is replaced by a structure lookback.
    pub sl_max_candles: usize,
    /// Length of the structure lookback window in 1-minute bars.
    pub structure_search_bars: usize,
    /// Minimum fraction of ladder steps for a retracement to count as structure.
    pub min_retracement_score: f64,
    /// Minimum number of 5-minute bars from gap creation to first touch (inclusive).
    pub min_bars_to_first_touch: usize,
    /// Contracts per entry.
    pub lot_size: f64,
    pub session: SessionConfig,
}

impl Default for StrategyConfig {
    fn default() -> Self {
        Self {
            min_gap_points: 12.5,
            sl_max_candles: 4,
            structure_search_bars: 15,
            min_retracement_score: 0.2,
            min_bars_to_first_touch: 3,
            lot_size: 1.0,
            session: SessionConfig::default(),
        }
    }
}

impl StrategyConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.min_gap_points.is_finite() || self.min_gap_points < 0.0 {
            return Err(ConfigError::InvalidParameter {
                name: "min_gap_points",
                reason: format!("must be a non-negative number, got {}", self.min_gap_points),
            });
        }
        if self.structure_search_bars == 0 {
            return Err(ConfigError::InvalidParameter {
                name: "structure_search_bars",
                reason: "must be at least 1".into(),
            });
        }
        if !(0.0..=1.0).contains(&self.min_retracement_score) {
            return Err(ConfigError::InvalidParameter {
                name: "min_retracement_score",
                reason: format!("must be within [0, 1], got {}", self.min_retracement_score),
            });
        }
        if !self.lot_size.is_finite() || self.lot_size <= 0.0 {
            return Err(ConfigError::InvalidParameter {
                name: "lot_size",
                reason: format!("must be positive, got {}", self.lot_size),
            });
        }
        self.session.validate()
    }
}

/// Local trading window. Both bounds are inclusive.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SessionConfig {
    #[serde(with = "hhmm")]
    pub open: NaiveTime,
    #[serde(with = "hhmm")]
    pub close: NaiveTime,
    /// IANA timezone the window is expressed in.
    pub timezone: String,
    /// Disable the session check entirely.
    pub ignore: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            open: NaiveTime::from_hms_opt(10, 0, 0).unwrap_or_default(),
            close: NaiveTime::from_hms_opt(18, 45, 0).unwrap_or_default(),
            timezone: "Europe/Madrid".into(),
            ignore: false,
        }
    }
}

impl SessionConfig {
    pub fn tz(&self) -> Result<Tz, ConfigError> {
        self.timezone
            .parse::<Tz>()
            .map_err(|_| ConfigError::UnknownTimezone(self.timezone.clone()))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.open >= self.close {
            return Err(ConfigError::EmptySession {
                open: self.open,
                close: self.close,
            });
        }
        self.tz().map(|_| ())
    }
}

/// `HH:MM` (or `HH:MM:SS`) serde representation of session bounds.
mod hhmm {
    use chrono::NaiveTime;
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(time: &NaiveTime, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&time.format("%H:%M").to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<NaiveTime, D::Error> {
        let raw = String::deserialize(d)?;
        NaiveTime::parse_from_str(&raw, "%H:%M")
            .or_else(|_| NaiveTime::parse_from_str(&raw, "%H:%M:%S"))
            .map_err(|e| de::Error::custom(format!("invalid session time '{raw}': {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = StrategyConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.min_gap_points, 12.5);
        assert_eq!(config.session.timezone, "Europe/Madrid");
    }

    #[test]
    fn rejects_score_out_of_range() {
        let config = StrategyConfig {
            min_retracement_score: 1.5,
            ..StrategyConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidParameter { name: "min_retracement_score", .. })
        ));
    }

    #[test]
    fn rejects_unknown_timezone() {
        let mut config = StrategyConfig::default();
        config.session.timezone = "Mars/Olympus".into();
        assert_eq!(
            config.validate(),
            Err(ConfigError::UnknownTimezone("Mars/Olympus".into()))
        );
    }

    #[test]
    fn rejects_inverted_session() {
        let mut config = StrategyConfig::default();
        config.session.open = NaiveTime::from_hms_opt(19, 0, 0).unwrap();
        assert!(matches!(config.validate(), Err(ConfigError::EmptySession { .. })));
    }

    #[test]
    fn session_times_serialize_as_hhmm() {
        let json = serde_json::to_string(&SessionConfig::default()).unwrap();
        assert!(json.contains("\"open\":\"10:00\""));
        assert!(json.contains("\"close\":\"18:45\""));
        let back: SessionConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back, SessionConfig::default());
    }
}

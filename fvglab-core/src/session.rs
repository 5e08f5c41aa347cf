//! Session gate — admits bars inside the configured local trading window.

use chrono::{DateTime, NaiveTime, Utc};
use chrono_tz::Tz;

use crate::config::{ConfigError, SessionConfig};

/// Resolved trading window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SessionGate {
    open: NaiveTime,
    close: NaiveTime,
    tz: Tz,
    ignore: bool,
}

impl SessionGate {
    pub fn new(config: &SessionConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            open: config.open,
            close: config.close,
            tz: config.tz()?,
            ignore: config.ignore,
        })
    }

    /// A gate that admits every bar.
    pub fn always_open() -> Self {
        Self {
            open: NaiveTime::MIN,
            close: NaiveTime::MIN,
            tz: Tz::UTC,
            ignore: true,
        }
    }

    /// True if `ts` falls inside `[open, close]` local time, or the gate is bypassed.
    pub fn contains(&self, ts: DateTime<Utc>) -> bool {
        if self.ignore {
            return true;
        }
        let local = ts.with_timezone(&self.tz).time();
        self.open <= local && local <= self.close
    }
}

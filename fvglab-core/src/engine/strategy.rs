//! The per-bar pass wiring gate, aggregation, tracking, detection and entry together.

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::config::{ConfigError, StrategyConfig};
use crate::domain::{Bar, TradeSignal};
use crate::execution::{ClosedPosition, Execution};
use crate::session::SessionGate;
use crate::trade_log::TradeLogSink;

use super::context::Context;
use super::series::{BarAggregator, ClosedFrames};
use super::{detector, entry, touch, Anomaly, EngineError, GapEvent};

/// What one pass did.
#[derive(Debug, Clone, PartialEq)]
pub struct PassReport {
    pub timestamp: DateTime<Utc>,
    pub in_session: bool,
    pub closed: ClosedFrames,
    pub gap_events: Vec<GapEvent>,
    pub signals: Vec<TradeSignal>,
    pub anomalies: Vec<Anomaly>,
    /// Positions flattened by the session gate.
    pub closed_positions: Vec<ClosedPosition>,
}

impl PassReport {
    fn new(timestamp: DateTime<Utc>, in_session: bool) -> Self {
        Self {
            timestamp,
            in_session,
            closed: ClosedFrames::default(),
            gap_events: Vec::new(),
            signals: Vec::new(),
            anomalies: Vec::new(),
            closed_positions: Vec::new(),
        }
    }
}

/// Fair value gap strategy over a single 1-minute feed.
///
/// One instance per run; it owns the bar series and the gap context so
/// concurrent runs never share state.
#[derive(Debug, Clone)]
pub struct FvgStrategy {
    config: StrategyConfig,
    gate: SessionGate,
    aggregator: BarAggregator,
    ctx: Context,
}

impl FvgStrategy {
    pub fn new(config: StrategyConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let gate = SessionGate::new(&config.session)?;
        Ok(Self {
            config,
            gate,
            aggregator: BarAggregator::new(),
            ctx: Context::new(),
        })
    }

    pub fn config(&self) -> &StrategyConfig {
        &self.config
    }

    pub fn context(&self) -> &Context {
        &self.ctx
    }

    pub fn series(&self) -> &BarAggregator {
        &self.aggregator
    }

    /// Run one pass for a closed 1-minute bar.
    pub fn on_bar(
        &mut self,
        bar: Bar,
        exec: &mut dyn Execution,
        log: &mut dyn TradeLogSink,
    ) -> Result<PassReport, EngineError> {
        bar.validate()?;
        let now = bar.timestamp;

        if !self.gate.contains(now) {
            let mut report = PassReport::new(now, false);
            if exec.has_open_position() {
                report.closed_positions = exec.close_all(now, bar.close);
                warn!(at = %now, closed = report.closed_positions.len(), "session closed with exposure, flattening");
            }
            if self.ctx.active_len() > 0 {
                debug!(at = %now, discarded = self.ctx.active_len(), "session reset");
            }
            self.ctx.reset_session();
            return Ok(report);
        }

        let mut report = PassReport::new(now, true);
        report.closed = self.aggregator.push_minute(bar)?;
        self.ctx.observe_bar(&bar);

        if report.closed.five {
            report.gap_events.extend(touch::on_five_minute_bar(
                &mut self.ctx,
                self.aggregator.m5(),
                self.aggregator.m1(),
                now,
                &self.config,
            ));
        }
        if report.closed.fifteen {
            if let Some(id) = detector::on_fifteen_minute_bar(
                &mut self.ctx,
                self.aggregator.m15(),
                now,
                self.config.min_gap_points,
            ) {
                report.gap_events.push(GapEvent::Created(id));
            }
        }

        let outcome = entry::on_minute_bar(&mut self.ctx, self.aggregator.m1(), &bar, &self.config);
        for item in outcome.entries {
            exec.submit(&item.signal);
            report.signals.push(item.signal);
            log.record(item.record);
        }
        report.anomalies = outcome.anomalies;
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SessionConfig;
    use crate::execution::PaperExecution;
    use crate::trade_log::TradeLogRecord;
    use chrono::{Duration, NaiveTime, TimeZone};

    fn config() -> StrategyConfig {
        StrategyConfig {
            session: SessionConfig {
                open: NaiveTime::from_hms_opt(10, 0, 0).unwrap(),
                close: NaiveTime::from_hms_opt(18, 45, 0).unwrap(),
                timezone: "UTC".into(),
                ignore: false,
            },
            ..StrategyConfig::default()
        }
    }

    fn minute(h: u32, m: u32) -> Bar {
        let ts = Utc.with_ymd_and_hms(2024, 3, 4, h, m, 0).unwrap();
        Bar::new(ts, 100.0, 101.0, 99.0, 100.5, 5)
    }

    #[test]
    fn out_of_session_bars_are_not_aggregated() {
        let mut strategy = FvgStrategy::new(config()).unwrap();
        let mut exec = PaperExecution::new();
        let mut log: Vec<TradeLogRecord> = Vec::new();

        let report = strategy.on_bar(minute(9, 59), &mut exec, &mut log).unwrap();
        assert!(!report.in_session);
        assert!(strategy.series().m1().is_empty());

        let report = strategy.on_bar(minute(10, 0), &mut exec, &mut log).unwrap();
        assert!(report.in_session);
        assert!(report.closed.five && report.closed.fifteen);
        assert_eq!(strategy.series().m1().len(), 1);
    }

    #[test]
    fn invalid_and_out_of_order_bars_are_errors() {
        let mut strategy = FvgStrategy::new(config()).unwrap();
        let mut exec = PaperExecution::new();
        let mut log: Vec<TradeLogRecord> = Vec::new();

        let mut bad = minute(10, 1);
        bad.high = 98.0;
        assert!(matches!(
            strategy.on_bar(bad, &mut exec, &mut log),
            Err(EngineError::Bar(_))
        ));

        strategy.on_bar(minute(10, 2), &mut exec, &mut log).unwrap();
        let err = strategy.on_bar(minute(10, 1), &mut exec, &mut log).unwrap_err();
        assert!(matches!(err, EngineError::OutOfOrder { .. }));
    }

    #[test]
    fn rejects_invalid_config() {
        let mut cfg = config();
        cfg.min_retracement_score = 2.0;
        assert!(FvgStrategy::new(cfg).is_err());
    }

    #[test]
    fn one_pass_per_bar_keeps_series_aligned() {
        let mut strategy = FvgStrategy::new(config()).unwrap();
        let mut exec = PaperExecution::new();
        let mut log: Vec<TradeLogRecord> = Vec::new();
        let start = minute(10, 1);
        for i in 0..30 {
            let mut bar = start;
            bar.timestamp = start.timestamp + Duration::minutes(i);
            strategy.on_bar(bar, &mut exec, &mut log).unwrap();
        }
        assert_eq!(strategy.series().m1().len(), 30);
        assert_eq!(strategy.series().m5().len(), 6);
        assert_eq!(strategy.series().m15().len(), 2);
    }
}

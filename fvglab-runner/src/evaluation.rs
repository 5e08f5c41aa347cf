//! Post-hoc exit evaluation: replay 1-minute bars forward from each entry.
//!
//! Per bar, starting with the entry bar:
//! 1. Outside the session window → session close at that bar's close
//! 2. Stop touched → loss at the stop (checked before the target)
//! 3. Target touched → win at the target
//!
//! Running out of data closes the trade at the last close.

use chrono::{DateTime, Utc};
use thiserror::Error;

use fvglab_core::domain::{Bar, TradeUid};
use fvglab_core::execution::{bracket_exit, profit_points};
use fvglab_core::session::SessionGate;
use fvglab_core::trade_log::{ExitResult, TradeExit, TradeLogRecord};

#[derive(Debug, Error, PartialEq)]
pub enum ExitError {
    #[error("trade {uid}: no price data at or after entry {entry_time}")]
    NoForwardData {
        uid: TradeUid,
        entry_time: DateTime<Utc>,
    },
}

/// Walk `bars` (time-ordered) from the record's entry until it exits.
pub fn evaluate_exit(
    record: &TradeLogRecord,
    bars: &[Bar],
    gate: &SessionGate,
) -> Result<TradeExit, ExitError> {
    let start = bars.partition_point(|b| b.timestamp < record.entry_time);
    let forward = &bars[start..];
    let Some(last) = forward.last() else {
        return Err(ExitError::NoForwardData {
            uid: record.uid,
            entry_time: record.entry_time,
        });
    };

    let exit = |time, price, result| TradeExit {
        time,
        price,
        result,
        profit: profit_points(record.direction, record.entry_price, price),
    };

    for bar in forward {
        if !gate.contains(bar.timestamp) {
            return Ok(exit(bar.timestamp, bar.close, ExitResult::SessionClose));
        }
        if let Some((price, result)) =
            bracket_exit(record.direction, record.sl_adjusted, record.tp_adjusted, bar)
        {
            return Ok(exit(bar.timestamp, price, result));
        }
    }
    Ok(exit(last.timestamp, last.close, ExitResult::SessionClose))
}

/// Copy of `records` with every exit block filled in.
pub fn evaluate_trade_log(
    records: &[TradeLogRecord],
    bars: &[Bar],
    gate: &SessionGate,
) -> Result<Vec<TradeLogRecord>, ExitError> {
    records
        .iter()
        .map(|record| {
            let exit = evaluate_exit(record, bars, gate)?;
            Ok(TradeLogRecord {
                exit: Some(exit),
                ..record.clone()
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveTime, TimeZone};
    use fvglab_core::config::SessionConfig;
    use fvglab_core::domain::{Direction, GapKind};

    fn at(m: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 4, 10, 0, 0).unwrap() + Duration::minutes(m)
    }

    fn record(direction: Direction) -> TradeLogRecord {
        let (stop, target) = match direction {
            Direction::Long => (96.0, 104.0),
            Direction::Short => (104.0, 96.0),
        };
        TradeLogRecord {
            uid: TradeUid(7),
            gap_kind: GapKind::Bearish,
            direction,
            gap_created: at(-60),
            gap_bottom: 105.0,
            gap_top: 110.0,
            first_touch: at(-30),
            second_touch: at(-10),
            entry_time: at(0),
            entry_price: 100.0,
            tp_initial: target,
            tp_adjusted: target,
            sl_initial: stop,
            sl_adjusted: stop,
            reward_risk: 1.0,
            exit: None,
        }
    }

    fn bar(m: i64, high: f64, low: f64, close: f64) -> Bar {
        Bar::new(at(m), close, high, low, close, 1)
    }

    fn utc_gate(close: (u32, u32)) -> SessionGate {
        SessionGate::new(&SessionConfig {
            open: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
            close: NaiveTime::from_hms_opt(close.0, close.1, 0).unwrap(),
            timezone: "UTC".into(),
            ignore: false,
        })
        .unwrap()
    }

    #[test]
    fn long_hits_target() {
        let bars = [bar(-1, 101.0, 99.0, 100.0), bar(0, 101.0, 99.0, 100.0), bar(1, 104.5, 100.0, 104.0)];
        let exit = evaluate_exit(&record(Direction::Long), &bars, &SessionGate::always_open()).unwrap();
        assert_eq!(exit.result, ExitResult::Win);
        assert_eq!(exit.price, 104.0);
        assert_eq!(exit.time, at(1));
        assert_eq!(exit.profit, 4.0);
    }

    #[test]
    fn short_stop_is_checked_before_target() {
        let bars = [bar(0, 100.5, 99.5, 100.0), bar(1, 105.0, 95.0, 100.0)];
        let exit = evaluate_exit(&record(Direction::Short), &bars, &SessionGate::always_open()).unwrap();
        assert_eq!(exit.result, ExitResult::Loss);
        assert_eq!(exit.price, 104.0);
        assert_eq!(exit.profit, -4.0);
    }

    #[test]
    fn leaving_session_closes_at_that_bar() {
        // 10:00 UTC entry, session ends 10:01
        let bars = [bar(0, 100.5, 99.5, 100.0), bar(1, 101.0, 99.0, 101.0), bar(2, 102.0, 100.0, 101.5)];
        let exit = evaluate_exit(&record(Direction::Long), &bars, &utc_gate((10, 1))).unwrap();
        assert_eq!(exit.result, ExitResult::SessionClose);
        assert_eq!(exit.time, at(2));
        assert_eq!(exit.price, 101.5);
        assert_eq!(exit.profit, 1.5);
    }

    #[test]
    fn exhausted_data_closes_at_last_bar() {
        let bars = [bar(0, 100.5, 99.5, 100.0), bar(1, 101.0, 99.0, 99.25)];
        let exit = evaluate_exit(&record(Direction::Short), &bars, &SessionGate::always_open()).unwrap();
        assert_eq!(exit.result, ExitResult::SessionClose);
        assert_eq!(exit.price, 99.25);
        assert_eq!(exit.profit, 0.75);
    }

    #[test]
    fn no_forward_data_is_an_error() {
        let bars = [bar(-2, 101.0, 99.0, 100.0)];
        assert_eq!(
            evaluate_exit(&record(Direction::Long), &bars, &SessionGate::always_open()),
            Err(ExitError::NoForwardData {
                uid: TradeUid(7),
                entry_time: at(0)
            })
        );
    }

    #[test]
    fn trade_log_gets_exit_blocks() {
        let bars = [bar(0, 100.5, 99.5, 100.0), bar(1, 104.5, 100.0, 104.0)];
        let records = vec![record(Direction::Long), record(Direction::Short)];
        let evaluated = evaluate_trade_log(&records, &bars, &SessionGate::always_open()).unwrap();
        assert_eq!(evaluated[0].exit.map(|e| e.result), Some(ExitResult::Win));
        assert_eq!(evaluated[1].exit.map(|e| e.result), Some(ExitResult::Loss));
        assert!(records[0].exit.is_none());
    }
}

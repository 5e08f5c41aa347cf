//! Trade log — one typed record per emitted signal.
//!
//! Records are stored as JSON Lines. For reporting tools they also render to
//! (and parse back from) a `Label= value` text block, one field per line,
//! closed by a dashed separator. The exit block is absent until the
//! evaluation pass fills it in.

use chrono::{DateTime, FixedOffset, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use thiserror::Error;

use crate::domain::{Direction, GapKind, TradeUid};

pub const SEPARATOR: &str = "─------------------------------------------";

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S%:z";

/// Malformed trade log input.
#[derive(Debug, Error, PartialEq)]
pub enum TradeLogError {
    #[error("line {line}: expected 'Label= value', got '{text}'")]
    MalformedLine { line: usize, text: String },
    #[error("line {line}: unknown label '{label}'")]
    UnknownLabel { line: usize, label: String },
    #[error("line {line}: invalid value '{value}' for '{label}'")]
    InvalidValue {
        line: usize,
        label: &'static str,
        value: String,
    },
    #[error("record ending at line {line} is missing '{label}'")]
    MissingField { line: usize, label: &'static str },
    #[error("record ending at line {line} has an incomplete exit block")]
    PartialExit { line: usize },
    #[error("expected exactly one record, found {found}")]
    NotSingle { found: usize },
    #[error("invalid JSON record on line {line}: {reason}")]
    Json { line: usize, reason: String },
}

/// How a trade ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExitResult {
    Win,
    Loss,
    SessionClose,
}

impl ExitResult {
    pub fn as_str(self) -> &'static str {
        match self {
            ExitResult::Win => "win",
            ExitResult::Loss => "loss",
            ExitResult::SessionClose => "session-close",
        }
    }
}

impl FromStr for ExitResult {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "win" => Ok(ExitResult::Win),
            "loss" => Ok(ExitResult::Loss),
            "session-close" => Ok(ExitResult::SessionClose),
            _ => Err(()),
        }
    }
}

/// Realized exit appended by the evaluation pass.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TradeExit {
    pub time: DateTime<Utc>,
    pub price: f64,
    pub result: ExitResult,
    /// Per-contract profit in price points.
    pub profit: f64,
}

/// Every field computed at entry, plus the optional exit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeLogRecord {
    pub uid: TradeUid,
    pub gap_kind: GapKind,
    pub direction: Direction,
    pub gap_created: DateTime<Utc>,
    pub gap_bottom: f64,
    pub gap_top: f64,
    pub first_touch: DateTime<Utc>,
    pub second_touch: DateTime<Utc>,
    pub entry_time: DateTime<Utc>,
    pub entry_price: f64,
    pub tp_initial: f64,
    pub tp_adjusted: f64,
    pub sl_initial: f64,
    pub sl_adjusted: f64,
    pub reward_risk: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exit: Option<TradeExit>,
}

impl TradeLogRecord {
    pub fn to_json_line(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn render_text(&self) -> String {
        let mut out = String::new();
        out.push_str(&format!("FVG Type= {}\n", self.gap_kind));
        out.push_str(&format!("Trade Type= {}\n", self.direction));
        out.push_str(&format!("Gap created= {}\n", fmt_time(self.gap_created)));
        out.push_str(&format!(
            "FVG Bounds= {:.2}-{:.2}\n",
            self.gap_bottom, self.gap_top
        ));
        out.push_str(&format!("First Touch= {}\n", fmt_time(self.first_touch)));
        out.push_str(&format!("Second Touch= {}\n", fmt_time(self.second_touch)));
        out.push_str(&format!("Trade Entry Time= {}\n", fmt_time(self.entry_time)));
        out.push_str(&format!("Trade Entry Price= {:.2}\n", self.entry_price));
        out.push_str(&format!("Take Profit (init)= {:.2}\n", self.tp_initial));
        out.push_str(&format!("Take Profit (adj)= {:.2}\n", self.tp_adjusted));
        out.push_str(&format!("Stop Loss (init)= {:.2}\n", self.sl_initial));
        out.push_str(&format!("Stop Loss (adj)= {:.2}\n", self.sl_adjusted));
        out.push_str(&format!("Risk to Reward Ratio= {}\n", self.reward_risk));
        out.push_str(&format!("Trade UID= {}\n", self.uid));
        if let Some(exit) = &self.exit {
            out.push_str(&format!("Exit Time= {}\n", fmt_time(exit.time)));
            out.push_str(&format!("Exit Price= {:.2}\n", exit.price));
            out.push_str(&format!("Result= {}\n", exit.result.as_str()));
            out.push_str(&format!("Profit= {:.2}\n", exit.profit));
        }
        out.push_str(SEPARATOR);
        out.push('\n');
        out
    }
}

fn fmt_time(ts: DateTime<Utc>) -> String {
    ts.format(TIME_FORMAT).to_string()
}

/// Destination for emitted trade records.
pub trait TradeLogSink {
    fn record(&mut self, record: TradeLogRecord);
}

impl TradeLogSink for Vec<TradeLogRecord> {
    fn record(&mut self, record: TradeLogRecord) {
        self.push(record);
    }
}

/// Parse a JSON Lines trade log. Blank lines are skipped.
pub fn parse_json_lines(text: &str) -> Result<Vec<TradeLogRecord>, TradeLogError> {
    text.lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(i, line)| {
            serde_json::from_str(line).map_err(|e| TradeLogError::Json {
                line: i + 1,
                reason: e.to_string(),
            })
        })
        .collect()
}

/// Parse a text log holding any number of separator-terminated blocks.
pub fn parse_text_log(text: &str) -> Result<Vec<TradeLogRecord>, TradeLogError> {
    let mut records = Vec::new();
    let mut block = TextBlock::default();
    let mut last_line = 0;

    for (i, raw) in text.lines().enumerate() {
        let line_no = i + 1;
        last_line = line_no;
        let line = raw.trim();
        if line.is_empty() {
            continue;
        }
        if is_separator(line) {
            if !block.is_empty() {
                records.push(std::mem::take(&mut block).finish(line_no)?);
            }
            continue;
        }
        block.absorb(line_no, line)?;
    }

    if !block.is_empty() {
        records.push(block.finish(last_line)?);
    }
    Ok(records)
}

/// Parse exactly one text block.
pub fn parse_text(text: &str) -> Result<TradeLogRecord, TradeLogError> {
    let mut records = parse_text_log(text)?;
    match records.len() {
        1 => Ok(records.remove(0)),
        found => Err(TradeLogError::NotSingle { found }),
    }
}

fn is_separator(line: &str) -> bool {
    line.chars().all(|c| matches!(c, '-' | '─' | '—' | '–'))
}

#[derive(Debug, Default)]
struct TextBlock {
    gap_kind: Option<GapKind>,
    direction: Option<Direction>,
    gap_created: Option<DateTime<Utc>>,
    bounds: Option<(f64, f64)>,
    first_touch: Option<DateTime<Utc>>,
    second_touch: Option<DateTime<Utc>>,
    entry_time: Option<DateTime<Utc>>,
    entry_price: Option<f64>,
    tp_initial: Option<f64>,
    tp_adjusted: Option<f64>,
    sl_initial: Option<f64>,
    sl_adjusted: Option<f64>,
    reward_risk: Option<f64>,
    uid: Option<TradeUid>,
    exit_time: Option<DateTime<Utc>>,
    exit_price: Option<f64>,
    result: Option<ExitResult>,
    profit: Option<f64>,
    seen: bool,
}

impl TextBlock {
    fn is_empty(&self) -> bool {
        !self.seen
    }

    fn absorb(&mut self, line: usize, text: &str) -> Result<(), TradeLogError> {
        let (label, value) = text
            .split_once('=')
            .ok_or_else(|| TradeLogError::MalformedLine {
                line,
                text: text.to_string(),
            })?;
        let label = label.split_whitespace().collect::<Vec<_>>().join(" ");
        let value = value.trim();
        self.seen = true;

        match label.to_ascii_lowercase().as_str() {
            "fvg type" => self.gap_kind = Some(parse_kind(line, value)?),
            "trade type" => self.direction = Some(parse_direction(line, value)?),
            "gap created" => self.gap_created = Some(parse_time(line, "Gap created", value)?),
            "fvg bounds" => self.bounds = Some(parse_bounds(line, value)?),
            "first touch" => self.first_touch = Some(parse_time(line, "First Touch", value)?),
            "second touch" => self.second_touch = Some(parse_time(line, "Second Touch", value)?),
            "trade entry time" => {
                self.entry_time = Some(parse_time(line, "Trade Entry Time", value)?)
            }
            "trade entry price" => {
                self.entry_price = Some(parse_f64(line, "Trade Entry Price", value)?)
            }
            "take profit (init)" => {
                self.tp_initial = Some(parse_f64(line, "Take Profit (init)", value)?)
            }
            "take profit (adj)" => {
                self.tp_adjusted = Some(parse_f64(line, "Take Profit (adj)", value)?)
            }
            "stop loss (init)" => self.sl_initial = Some(parse_f64(line, "Stop Loss (init)", value)?),
            "stop loss (adj)" => self.sl_adjusted = Some(parse_f64(line, "Stop Loss (adj)", value)?),
            "risk to reward ratio" => {
                self.reward_risk = Some(parse_f64(line, "Risk to Reward Ratio", value)?)
            }
            "trade uid" => {
                let uid = value.parse::<u64>().map_err(|_| invalid(line, "Trade UID", value))?;
                self.uid = Some(TradeUid(uid));
            }
            "exit time" => self.exit_time = Some(parse_time(line, "Exit Time", value)?),
            "exit price" => self.exit_price = Some(parse_f64(line, "Exit Price", value)?),
            "result" => {
                let result = value
                    .parse::<ExitResult>()
                    .map_err(|_| invalid(line, "Result", value))?;
                self.result = Some(result);
            }
            "profit" => self.profit = Some(parse_f64(line, "Profit", value)?),
            _ => return Err(TradeLogError::UnknownLabel { line, label }),
        }
        Ok(())
    }

    fn finish(self, line: usize) -> Result<TradeLogRecord, TradeLogError> {
        let missing = |label| TradeLogError::MissingField { line, label };
        let (gap_bottom, gap_top) = self.bounds.ok_or_else(|| missing("FVG Bounds"))?;

        let exit = match (self.exit_time, self.exit_price, self.result, self.profit) {
            (None, None, None, None) => None,
            (Some(time), Some(price), Some(result), Some(profit)) => Some(TradeExit {
                time,
                price,
                result,
                profit,
            }),
            _ => return Err(TradeLogError::PartialExit { line }),
        };

        Ok(TradeLogRecord {
            uid: self.uid.ok_or_else(|| missing("Trade UID"))?,
            gap_kind: self.gap_kind.ok_or_else(|| missing("FVG Type"))?,
            direction: self.direction.ok_or_else(|| missing("Trade Type"))?,
            gap_created: self.gap_created.ok_or_else(|| missing("Gap created"))?,
            gap_bottom,
            gap_top,
            first_touch: self.first_touch.ok_or_else(|| missing("First Touch"))?,
            second_touch: self.second_touch.ok_or_else(|| missing("Second Touch"))?,
            entry_time: self.entry_time.ok_or_else(|| missing("Trade Entry Time"))?,
            entry_price: self.entry_price.ok_or_else(|| missing("Trade Entry Price"))?,
            tp_initial: self.tp_initial.ok_or_else(|| missing("Take Profit (init)"))?,
            tp_adjusted: self.tp_adjusted.ok_or_else(|| missing("Take Profit (adj)"))?,
            sl_initial: self.sl_initial.ok_or_else(|| missing("Stop Loss (init)"))?,
            sl_adjusted: self.sl_adjusted.ok_or_else(|| missing("Stop Loss (adj)"))?,
            reward_risk: self.reward_risk.ok_or_else(|| missing("Risk to Reward Ratio"))?,
            exit,
        })
    }
}

fn invalid(line: usize, label: &'static str, value: &str) -> TradeLogError {
    TradeLogError::InvalidValue {
        line,
        label,
        value: value.to_string(),
    }
}

fn parse_kind(line: usize, value: &str) -> Result<GapKind, TradeLogError> {
    match value.to_ascii_lowercase().as_str() {
        "bullish" => Ok(GapKind::Bullish),
        "bearish" => Ok(GapKind::Bearish),
        _ => Err(invalid(line, "FVG Type", value)),
    }
}

fn parse_direction(line: usize, value: &str) -> Result<Direction, TradeLogError> {
    match value.to_ascii_lowercase().as_str() {
        "long" => Ok(Direction::Long),
        "short" => Ok(Direction::Short),
        _ => Err(invalid(line, "Trade Type", value)),
    }
}

fn parse_f64(line: usize, label: &'static str, value: &str) -> Result<f64, TradeLogError> {
    value
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| invalid(line, label, value))
}

fn parse_time(line: usize, label: &'static str, value: &str) -> Result<DateTime<Utc>, TradeLogError> {
    DateTime::<FixedOffset>::parse_from_str(value, TIME_FORMAT)
        .or_else(|_| DateTime::parse_from_rfc3339(value))
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|_| invalid(line, label, value))
}

/// `bottom-top`, where either side may carry a leading minus sign.
fn parse_bounds(line: usize, value: &str) -> Result<(f64, f64), TradeLogError> {
    let split = value
        .char_indices()
        .skip(1)
        .find(|&(_, c)| c == '-')
        .map(|(i, _)| i)
        .ok_or_else(|| invalid(line, "FVG Bounds", value))?;
    let bottom = parse_f64(line, "FVG Bounds", value[..split].trim())?;
    let top = parse_f64(line, "FVG Bounds", value[split + 1..].trim())?;
    Ok((bottom, top))
}

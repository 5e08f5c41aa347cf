//! Reporting and export — JSON, trade log, CSV, and Markdown artifacts.
//!
//! Provides four export formats for backtest results:
//! - **JSON**: full round-trip serialization with schema versioning
//! - **Trade log**: one JSON object per line, plus the labelled text blocks
//! - **CSV**: flat trade tape for spreadsheets
//! - **Markdown**: human-readable single-run report
//!
//! All persisted artifacts include a `schema_version` field. Unknown versions
//! are rejected on load.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use fvglab_core::trade_log::TradeLogRecord;

use crate::runner::{BacktestResult, SCHEMA_VERSION};

// ─── JSON export ────────────────────────────────────────────────────

/// Serialize a `BacktestResult` to pretty JSON.
pub fn export_json(result: &BacktestResult) -> Result<String> {
    serde_json::to_string_pretty(result).context("failed to serialize BacktestResult to JSON")
}

/// Deserialize a `BacktestResult` from JSON, rejecting unknown schema versions.
pub fn import_json(json: &str) -> Result<BacktestResult> {
    let result: BacktestResult =
        serde_json::from_str(json).context("failed to deserialize BacktestResult from JSON")?;
    if result.schema_version > SCHEMA_VERSION {
        bail!(
            "unsupported schema version {} (max supported: {})",
            result.schema_version,
            SCHEMA_VERSION
        );
    }
    Ok(result)
}

// ─── Trade log export ───────────────────────────────────────────────

/// One record per line, newline-terminated.
pub fn export_trade_log_jsonl(records: &[TradeLogRecord]) -> Result<String> {
    let mut out = String::new();
    for record in records {
        let line = record
            .to_json_line()
            .with_context(|| format!("failed to serialize trade {}", record.uid))?;
        out.push_str(&line);
        out.push('\n');
    }
    Ok(out)
}

/// Separator-terminated text blocks, in uid order.
pub fn export_trade_log_text(records: &[TradeLogRecord]) -> String {
    records.iter().map(TradeLogRecord::render_text).collect()
}

// ─── CSV export ─────────────────────────────────────────────────────

/// Export the trade log as CSV.
///
/// Columns: uid, gap_kind, direction, gap_created, gap_bottom, gap_top,
/// first_touch, second_touch, entry_time, entry_price, tp_initial,
/// tp_adjusted, sl_initial, sl_adjusted, reward_risk, exit_time,
/// exit_price, result, profit. Exit columns are empty for open trades.
pub fn export_trades_csv(records: &[TradeLogRecord]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);

    wtr.write_record([
        "uid",
        "gap_kind",
        "direction",
        "gap_created",
        "gap_bottom",
        "gap_top",
        "first_touch",
        "second_touch",
        "entry_time",
        "entry_price",
        "tp_initial",
        "tp_adjusted",
        "sl_initial",
        "sl_adjusted",
        "reward_risk",
        "exit_time",
        "exit_price",
        "result",
        "profit",
    ])?;

    for r in records {
        let (exit_time, exit_price, result, profit) = match &r.exit {
            Some(exit) => (
                exit.time.to_rfc3339(),
                format!("{:.2}", exit.price),
                exit.result.as_str().to_string(),
                format!("{:.2}", exit.profit),
            ),
            None => Default::default(),
        };
        wtr.write_record(&[
            r.uid.to_string(),
            r.gap_kind.as_str().to_string(),
            r.direction.as_str().to_string(),
            r.gap_created.to_rfc3339(),
            format!("{:.2}", r.gap_bottom),
            format!("{:.2}", r.gap_top),
            r.first_touch.to_rfc3339(),
            r.second_touch.to_rfc3339(),
            r.entry_time.to_rfc3339(),
            format!("{:.2}", r.entry_price),
            format!("{:.2}", r.tp_initial),
            format!("{:.2}", r.tp_adjusted),
            format!("{:.2}", r.sl_initial),
            format!("{:.2}", r.sl_adjusted),
            format!("{:.3}", r.reward_risk),
            exit_time,
            exit_price,
            result,
            profit,
        ])?;
    }

    let bytes = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(bytes).context("CSV output is not valid UTF-8")
}

// ─── Artifact bundle ────────────────────────────────────────────────

/// Save a complete artifact bundle to `output_dir/<run_id prefix>/`.
///
/// Creates:
/// - `result.json`: full BacktestResult (schema-versioned)
/// - `trades.jsonl`: trade log, one record per line
/// - `trades.txt`: trade log as labelled text blocks
/// - `trades.csv`: flat trade tape
/// - `report.md`: Markdown summary
///
/// Returns the path to the created directory. Re-running the same
/// configuration overwrites the same directory.
pub fn save_artifacts(result: &BacktestResult, output_dir: &Path) -> Result<PathBuf> {
    let prefix_len = result.run_id.len().min(16);
    let run_dir = output_dir.join(&result.run_id[..prefix_len]);
    std::fs::create_dir_all(&run_dir)
        .with_context(|| format!("failed to create artifact dir: {}", run_dir.display()))?;

    write(&run_dir.join("result.json"), &export_json(result)?)?;
    write(
        &run_dir.join("trades.jsonl"),
        &export_trade_log_jsonl(&result.trades)?,
    )?;
    write(
        &run_dir.join("trades.txt"),
        &export_trade_log_text(&result.trades),
    )?;
    write(
        &run_dir.join("trades.csv"),
        &export_trades_csv(&result.trades)?,
    )?;
    write(&run_dir.join("report.md"), &generate_report(result))?;

    Ok(run_dir)
}

/// Load a `BacktestResult` from an artifact directory's result.json.
///
/// Rejects unknown schema versions.
pub fn load_artifacts(dir: &Path) -> Result<BacktestResult> {
    let path = dir.join("result.json");
    let json = std::fs::read_to_string(&path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    import_json(&json)
}

fn write(path: &Path, contents: &str) -> Result<()> {
    std::fs::write(path, contents).with_context(|| format!("failed to write {}", path.display()))
}

// ─── Markdown reports ───────────────────────────────────────────────

/// Generate a Markdown report for a single backtest run.
pub fn generate_report(result: &BacktestResult) -> String {
    let mut md = String::with_capacity(2048);

    md.push_str("# FVG Backtest Report\n\n");

    md.push_str("## Metadata\n\n");
    md.push_str("| Field | Value |\n");
    md.push_str("| --- | --- |\n");
    md.push_str(&format!("| Run ID | {} |\n", result.run_id));
    md.push_str(&format!("| Dataset Hash | {} |\n", result.dataset_hash));
    md.push_str(&format!(
        "| Bars | {} ({} in session) |\n",
        result.bar_count, result.bars_in_session
    ));
    md.push_str(&format!("| Gaps Detected | {} |\n", result.gaps_detected));
    md.push_str(&format!("| Signals | {} |\n", result.signals.len()));
    md.push_str(&format!("| Paper Closes | {} |\n", result.paper_closed.len()));
    if !result.anomalies.is_empty() {
        md.push_str(&format!("| Anomalies | {} |\n", result.anomalies.len()));
    }
    if result.synthetic {
        md.push_str("| Data | **SYNTHETIC** |\n");
    }
    md.push('\n');

    let m = &result.metrics;
    md.push_str("## Performance Summary\n\n");
    md.push_str("| Metric | Value |\n");
    md.push_str("| --- | --- |\n");
    md.push_str(&format!("| Trades | {} |\n", m.trade_count));
    md.push_str(&format!(
        "| Wins / Losses / Session Closes | {} / {} / {} |\n",
        m.wins, m.losses, m.session_closes
    ));
    md.push_str(&format!("| Win Rate | {:.1}% |\n", m.win_rate * 100.0));
    md.push_str(&format!("| Total Profit (pts) | {:.2} |\n", m.total_profit));
    md.push_str(&format!("| Avg Profit (pts) | {:.2} |\n", m.avg_profit));
    md.push_str(&format!("| Best / Worst | {:.2} / {:.2} |\n", m.best_trade, m.worst_trade));
    md.push_str(&format!("| Profit Factor | {:.2} |\n", m.profit_factor));
    md.push_str(&format!("| Max Drawdown (pts) | {:.2} |\n", m.max_drawdown));
    md.push_str(&format!("| Avg Reward/Risk | {:.3} |\n", m.avg_reward_risk));
    md.push('\n');

    if !result.trades.is_empty() {
        md.push_str("## Trades\n\n");
        md.push_str("| UID | Gap | Side | Entry | Entry Px | SL | TP | Exit | Result | Profit |\n");
        md.push_str("| --- | --- | --- | --- | --- | --- | --- | --- | --- | --- |\n");
        for r in &result.trades {
            let (exit_time, outcome, profit) = match &r.exit {
                Some(exit) => (
                    exit.time.format("%Y-%m-%d %H:%M").to_string(),
                    exit.result.as_str(),
                    format!("{:.2}", exit.profit),
                ),
                None => ("-".to_string(), "open", "-".to_string()),
            };
            md.push_str(&format!(
                "| {} | {} | {} | {} | {:.2} | {:.2} | {:.2} | {} | {} | {} |\n",
                r.uid,
                r.gap_kind.as_str(),
                r.direction.as_str(),
                r.entry_time.format("%Y-%m-%d %H:%M"),
                r.entry_price,
                r.sl_adjusted,
                r.tp_adjusted,
                exit_time,
                outcome,
                profit,
            ));
        }
    }

    md
}

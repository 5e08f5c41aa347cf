//! FVG Lab CLI — run, sweep, and evaluate commands.
//!
//! Commands:
//! - `run`: execute a backtest from a TOML config file and save artifacts
//! - `sweep`: run a parameter grid over the same bars in parallel
//! - `evaluate`: replay 1-minute bars to attach exits to an existing trade log

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use fvglab_core::session::SessionGate;
use fvglab_core::trade_log::{parse_json_lines, parse_text_log, TradeLogRecord};
use fvglab_runner::{
    evaluate_trade_log, export_trade_log_jsonl, export_trade_log_text, load_bars, load_csv,
    run_single_backtest, run_sweep, save_artifacts, BacktestConfig, BacktestResult, LoadOptions,
    ParamGrid, RunMetrics,
};

#[derive(Parser)]
#[command(
    name = "fvglab",
    about = "FVG Lab CLI: fair value gap multi-timeframe backtester"
)]
struct Cli {
    /// Log at DEBUG instead of INFO (gap lifecycle transitions).
    #[arg(long, short, global = true, default_value_t = false)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Execute a backtest from a TOML config file.
    Run {
        /// Path to a TOML config file.
        #[arg(long)]
        config: PathBuf,

        /// Ignore the configured CSV and use the synthetic series.
        #[arg(long, default_value_t = false)]
        synthetic: bool,

        /// Output directory for artifacts. Overrides `[output] dir`.
        #[arg(long)]
        output_dir: Option<PathBuf>,
    },
    /// Run every combination of a parameter grid over the configured bars.
    Sweep {
        /// Path to a TOML config file providing data and base parameters.
        #[arg(long)]
        config: PathBuf,

        /// Minimum gap sizes to try (comma separated).
        #[arg(long, value_delimiter = ',')]
        min_gap: Vec<f64>,

        /// Minimum retracement scores to try (comma separated).
        #[arg(long, value_delimiter = ',')]
        score: Vec<f64>,

        /// Stop-loss freshness thresholds to try (comma separated).
        #[arg(long, value_delimiter = ',')]
        sl_candles: Vec<usize>,

        /// Rows to print.
        #[arg(long, default_value_t = 10)]
        top: usize,

        /// Write every result as JSON to this file.
        #[arg(long)]
        json: Option<PathBuf>,
    },
    /// Attach exits to a trade log by replaying 1-minute bars.
    Evaluate {
        /// Trade log, either text blocks or JSON Lines (`.jsonl`).
        #[arg(long)]
        log: PathBuf,

        /// 1-minute CSV covering the trades.
        #[arg(long)]
        csv: PathBuf,

        /// Config supplying the data timezone and session window. Defaults apply otherwise.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Write the evaluated log here instead of stdout.
        #[arg(long)]
        out: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("failed to install tracing subscriber")?;

    match cli.command {
        Commands::Run {
            config,
            synthetic,
            output_dir,
        } => run_backtest_cmd(&config, synthetic, output_dir),
        Commands::Sweep {
            config,
            min_gap,
            score,
            sl_candles,
            top,
            json,
        } => run_sweep_cmd(&config, min_gap, score, sl_candles, top, json),
        Commands::Evaluate {
            log,
            csv,
            config,
            out,
        } => run_evaluate_cmd(&log, &csv, config.as_deref(), out),
    }
}

fn load_config(path: &Path, synthetic: bool) -> Result<BacktestConfig> {
    let mut config = BacktestConfig::from_file(path)
        .with_context(|| format!("failed to load config {}", path.display()))?;
    if synthetic {
        config.data.synthetic = true;
    }
    Ok(config)
}

fn run_backtest_cmd(config_path: &Path, synthetic: bool, output_dir: Option<PathBuf>) -> Result<()> {
    let config = load_config(config_path, synthetic)?;
    let result = run_single_backtest(&config).context("backtest failed")?;

    print_summary(&result);

    let output_dir = output_dir.unwrap_or_else(|| config.output.dir.clone());
    let run_dir = save_artifacts(&result, &output_dir)?;
    println!("Artifacts saved to: {}", run_dir.display());

    Ok(())
}

fn run_sweep_cmd(
    config_path: &Path,
    min_gap: Vec<f64>,
    score: Vec<f64>,
    sl_candles: Vec<usize>,
    top: usize,
    json: Option<PathBuf>,
) -> Result<()> {
    let config = load_config(config_path, false)?;
    let defaults = ParamGrid::default();
    let grid = ParamGrid {
        min_gap_points: or_default(min_gap, defaults.min_gap_points),
        min_retracement_scores: or_default(score, defaults.min_retracement_scores),
        sl_max_candles: or_default(sl_candles, defaults.sl_max_candles),
    };

    let data = load_bars(&config.data).context("failed to load bars")?;
    info!(combinations = grid.size(), "sweeping");
    let results = run_sweep(&grid, &config, &data.bars, &data.dataset_hash)?;

    println!();
    println!(
        "{:>8} {:>6} {:>4} {:>7} {:>7} {:>10} {:>8} {:>10}",
        "Gap", "Score", "SL", "Trades", "Win%", "Profit", "PF", "MaxDD"
    );
    println!("{}", "-".repeat(68));
    for r in results.iter().take(top) {
        let m = &r.metrics;
        println!(
            "{:>8.2} {:>6.2} {:>4} {:>7} {:>6.1}% {:>10.2} {:>8.2} {:>10.2}",
            r.min_gap_points,
            r.min_retracement_score,
            r.sl_max_candles,
            m.trade_count,
            m.win_rate * 100.0,
            m.total_profit,
            m.profit_factor,
            m.max_drawdown,
        );
    }
    if data.synthetic {
        println!();
        println!("WARNING: Results based on SYNTHETIC data");
    }

    if let Some(path) = json {
        let body = serde_json::to_string_pretty(&results).context("failed to serialize sweep")?;
        std::fs::write(&path, body)
            .with_context(|| format!("failed to write {}", path.display()))?;
        println!("Sweep results saved to: {}", path.display());
    }

    Ok(())
}

fn or_default<T>(given: Vec<T>, default: Vec<T>) -> Vec<T> {
    if given.is_empty() {
        default
    } else {
        given
    }
}

fn run_evaluate_cmd(
    log_path: &Path,
    csv_path: &Path,
    config_path: Option<&Path>,
    out: Option<PathBuf>,
) -> Result<()> {
    let config = match config_path {
        Some(path) => load_config(path, false)?,
        None => BacktestConfig::default(),
    };

    let text = std::fs::read_to_string(log_path)
        .with_context(|| format!("failed to read {}", log_path.display()))?;
    let jsonl = log_path.extension().is_some_and(|ext| ext == "jsonl");
    let records: Vec<TradeLogRecord> = if jsonl {
        parse_json_lines(&text)
    } else {
        parse_text_log(&text)
    }
    .with_context(|| format!("malformed trade log {}", log_path.display()))?;
    if records.is_empty() {
        bail!("trade log {} holds no records", log_path.display());
    }

    let opts = LoadOptions::from_config(&config.data)?;
    let data = load_csv(csv_path, &opts)
        .with_context(|| format!("failed to load {}", csv_path.display()))?;
    let gate = SessionGate::new(&config.strategy.session)?;
    let evaluated = evaluate_trade_log(&records, &data.bars, &gate)?;

    let rendered = if jsonl {
        export_trade_log_jsonl(&evaluated)?
    } else {
        export_trade_log_text(&evaluated)
    };
    match out {
        Some(path) => {
            std::fs::write(&path, rendered)
                .with_context(|| format!("failed to write {}", path.display()))?;
            println!("Evaluated log saved to: {}", path.display());
        }
        None => print!("{rendered}"),
    }

    print_metrics(&RunMetrics::compute(&evaluated));
    Ok(())
}

fn print_summary(result: &BacktestResult) {
    println!();
    println!("=== Backtest Result ===");
    println!("Run ID:         {}", result.run_id);
    println!(
        "Bars:           {} ({} in session)",
        result.bar_count, result.bars_in_session
    );
    println!("Gaps:           {}", result.gaps_detected);
    println!("Signals:        {}", result.signals.len());
    println!("Paper closes:   {}", result.paper_closed.len());
    if !result.anomalies.is_empty() {
        println!("Anomalies:      {}", result.anomalies.len());
    }
    print_metrics(&result.metrics);
    if result.synthetic {
        println!("WARNING: Results based on SYNTHETIC data");
    }
    println!();
}

fn print_metrics(m: &RunMetrics) {
    println!();
    println!("--- Performance ---");
    println!("Trades:         {}", m.trade_count);
    println!(
        "W / L / SC:     {} / {} / {}",
        m.wins, m.losses, m.session_closes
    );
    println!("Win Rate:       {:.1}%", m.win_rate * 100.0);
    println!("Total Profit:   {:.2} pts", m.total_profit);
    println!("Avg Profit:     {:.2} pts", m.avg_profit);
    println!("Best / Worst:   {:.2} / {:.2}", m.best_trade, m.worst_trade);
    println!("Profit Factor:  {:.2}", m.profit_factor);
    println!("Max Drawdown:   {:.2} pts", m.max_drawdown);
    println!("Avg R:R:        {:.3}", m.avg_reward_risk);
}

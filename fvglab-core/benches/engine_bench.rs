//! Criterion benchmarks for FVG Lab hot paths.
//!
//! Benchmarks:
//! 1. Per-bar pass (aggregation, tracking, detection, entry) over a trading day
//! 2. Structure validation on growing 5-minute windows
//! 3. Trade log text rendering and parsing

use chrono::{Duration, TimeZone, Utc};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use fvglab_core::config::StrategyConfig;
use fvglab_core::domain::{Bar, Direction, GapKind, TradeUid};
use fvglab_core::engine::structure::validate;
use fvglab_core::engine::FvgStrategy;
use fvglab_core::execution::{Execution, PaperExecution};
use fvglab_core::trade_log::{parse_text_log, TradeLogRecord};

// ── Helpers ──────────────────────────────────────────────────────────

fn make_minutes(n: usize) -> Vec<Bar> {
    let start = Utc.with_ymd_and_hms(2024, 3, 4, 9, 0, 0).unwrap();
    (0..n)
        .map(|i| {
            let x = i as f64;
            let close = 17_000.0 + (x * 0.05).sin() * 40.0 + (x * 0.31).cos() * 6.0;
            let open = close - (x * 0.7).sin() * 2.0;
            Bar::new(
                start + Duration::minutes(i as i64),
                open,
                open.max(close) + 1.5,
                open.min(close) - 1.5,
                close,
                100 + (i as u64 % 50),
            )
        })
        .collect()
}

fn sample_record(uid: u64) -> TradeLogRecord {
    let ts = Utc.with_ymd_and_hms(2024, 3, 4, 10, 0, 0).unwrap();
    TradeLogRecord {
        uid: TradeUid(uid),
        gap_kind: GapKind::Bullish,
        direction: Direction::Short,
        gap_created: ts,
        gap_bottom: 17_010.25,
        gap_top: 17_025.5,
        first_touch: ts + Duration::minutes(20),
        second_touch: ts + Duration::minutes(35),
        entry_time: ts + Duration::minutes(41),
        entry_price: 17_018.0,
        tp_initial: 17_004.75,
        tp_adjusted: 17_006.0,
        sl_initial: 17_031.25,
        sl_adjusted: 17_031.25,
        reward_risk: 0.9056,
        exit: None,
    }
}

// ── 1. Per-bar pass ──────────────────────────────────────────────────

fn bench_pass(c: &mut Criterion) {
    let mut group = c.benchmark_group("per_bar_pass");
    let mut config = StrategyConfig::default();
    config.session.ignore = true;
    config.min_gap_points = 5.0;

    for &bar_count in &[525, 2_100, 10_500] {
        let bars = make_minutes(bar_count);
        group.bench_with_input(BenchmarkId::new("minutes", bar_count), &bar_count, |b, _| {
            b.iter(|| {
                let mut strategy = FvgStrategy::new(config.clone()).unwrap();
                let mut exec = PaperExecution::new();
                let mut log: Vec<TradeLogRecord> = Vec::new();
                for bar in &bars {
                    exec.on_bar(bar);
                    strategy.on_bar(black_box(*bar), &mut exec, &mut log).unwrap();
                }
                log.len()
            });
        });
    }
    group.finish();
}

// ── 2. Structure validation ──────────────────────────────────────────

fn bench_structure(c: &mut Criterion) {
    let mut group = c.benchmark_group("structure_validate");
    for &len in &[6, 24, 96] {
        let window = make_minutes(len);
        group.bench_with_input(BenchmarkId::new("window", len), &len, |b, _| {
            b.iter(|| validate(black_box(&window), Direction::Long, 3, 0.2));
        });
    }
    group.finish();
}

// ── 3. Trade log ─────────────────────────────────────────────────────

fn bench_trade_log(c: &mut Criterion) {
    let mut group = c.benchmark_group("trade_log");
    let records: Vec<_> = (1..=200).map(sample_record).collect();
    let text: String = records.iter().map(TradeLogRecord::render_text).collect();

    group.bench_function("render_200", |b| {
        b.iter(|| {
            records
                .iter()
                .map(|r| black_box(r).render_text().len())
                .sum::<usize>()
        });
    });
    group.bench_function("parse_200", |b| {
        b.iter(|| parse_text_log(black_box(&text)).unwrap().len());
    });
    group.finish();
}

criterion_group!(benches, bench_pass, bench_structure, bench_trade_log);
criterion_main!(benches);

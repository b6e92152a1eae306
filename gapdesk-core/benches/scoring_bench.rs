//! Criterion benchmarks for the scoring pipeline.
//!
//! Benchmarks:
//! 1. Indicator math over a full session of one-minute bars
//! 2. Trend scoring (EMA stats + momentum-shift detection)
//! 3. Aggregation and gating of five analyzer results
//! 4. A full offline analysis cycle (proxy tier only)

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use gapdesk_core::analyzers::gap::score_gap;
use gapdesk_core::analyzers::trend::score_trend;
use gapdesk_core::config::MomentumThresholds;
use gapdesk_core::domain::{AnalyzerResult, Bar, DataSource};
use gapdesk_core::indicators::{ewm_of_closes, vwap_close};
use gapdesk_core::signals::{final_decision, AnalyzerScores};
use gapdesk_core::window::market_time_from_local;
use gapdesk_core::{build_resolver, check_trading_window, run_full_analysis, EngineConfig, FeedMode};

// ── Helpers ──────────────────────────────────────────────────────────

fn make_session(n: usize) -> Vec<Bar> {
    let start = chrono::NaiveDate::from_ymd_opt(2024, 6, 3)
        .unwrap()
        .and_hms_opt(9, 30, 0)
        .unwrap();
    (0..n)
        .map(|i| {
            let close = 530.0 + (i as f64 * 0.05).sin() * 1.5;
            Bar {
                timestamp: start + chrono::Duration::minutes(i as i64),
                open: close - 0.05,
                high: close + 0.1,
                low: close - 0.1,
                close,
                volume: 10_000 + (i as u64 % 700) * 10,
            }
        })
        .collect()
}

// ── 1. Indicators ────────────────────────────────────────────────────

fn bench_indicators(c: &mut Criterion) {
    let mut group = c.benchmark_group("indicators");
    for n in [60usize, 390] {
        let bars = make_session(n);
        group.bench_with_input(BenchmarkId::new("ema9_ema20", n), &bars, |b, bars| {
            b.iter(|| {
                let fast = ewm_of_closes(black_box(bars), 9);
                let slow = ewm_of_closes(black_box(bars), 20);
                (fast, slow)
            });
        });
        group.bench_with_input(BenchmarkId::new("vwap", n), &bars, |b, bars| {
            b.iter(|| vwap_close(black_box(bars)));
        });
    }
    group.finish();
}

// ── 2. Trend scoring ─────────────────────────────────────────────────

fn bench_trend(c: &mut Criterion) {
    let bars = make_session(390);
    let thresholds = MomentumThresholds::default();
    c.bench_function("score_trend_390", |b| {
        b.iter(|| score_trend(black_box(&bars), 0.2, &thresholds, DataSource::Primary));
    });
}

// ── 3. Aggregation ───────────────────────────────────────────────────

fn bench_aggregation(c: &mut Criterion) {
    let config = EngineConfig::default();
    let gap = score_gap(1.8, 0.35, 2.2, DataSource::Primary);
    let others: Vec<AnalyzerResult> = [2.0, 0.8, -0.5, 1.5]
        .iter()
        .map(|&p| AnalyzerResult::new(DataSource::Primary).with_component("x", p, ""))
        .collect();
    let now = market_time_from_local(
        chrono::NaiveDate::from_ymd_opt(2024, 6, 3)
            .unwrap()
            .and_hms_opt(10, 45, 0)
            .unwrap(),
    )
    .unwrap();

    c.bench_function("final_decision", |b| {
        b.iter(|| {
            let scores = AnalyzerScores {
                gap: &gap,
                internals: &others[0],
                sectors: &others[1],
                technicals: &others[2],
                trend: &others[3],
            };
            final_decision(black_box(&scores), config.decision, check_trading_window(&now))
        });
    });
}

// ── 4. Full offline cycle ────────────────────────────────────────────

fn bench_offline_cycle(c: &mut Criterion) {
    let config = EngineConfig::default();
    let resolver = build_resolver(&config, FeedMode::Offline).unwrap();
    let now = market_time_from_local(
        chrono::NaiveDate::from_ymd_opt(2024, 6, 3)
            .unwrap()
            .and_hms_opt(10, 15, 0)
            .unwrap(),
    )
    .unwrap();

    c.bench_function("run_full_analysis_offline", |b| {
        b.iter(|| run_full_analysis(black_box(&resolver), &config, now));
    });
}

criterion_group!(
    benches,
    bench_indicators,
    bench_trend,
    bench_aggregation,
    bench_offline_cycle,
);
criterion_main!(benches);

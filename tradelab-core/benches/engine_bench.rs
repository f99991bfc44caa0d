//! Criterion benchmarks for engine hot paths.
//!
//! 1. Full simulator loop over a synthetic feed (SMA crossover)
//! 2. Broker matching with a deep pending queue

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use chrono::{TimeZone, Utc};
use serde_json::json;
use tradelab_core::domain::{Bar, Order, OrderId, Side};
use tradelab_core::engine::{
    Broker, HistoricalClock, SimulatedBroker, Simulator, StandardExecution,
};
use tradelab_core::strategy::SmaCross;

fn make_bars(n: usize) -> Vec<Bar> {
    let start = Utc.with_ymd_and_hms(2020, 1, 2, 0, 0, 0).unwrap();
    (0..n)
        .map(|i| {
            let close = 100.0 + (i as f64 * 0.1).sin() * 10.0;
            Bar::new(
                start + chrono::Duration::hours(i as i64),
                "BTCUSDT",
                close - 0.3,
                close + 1.5,
                close - 1.5,
                close,
                1_000_000.0,
            )
            .unwrap()
        })
        .collect()
}

fn bench_full_backtest(c: &mut Criterion) {
    let mut group = c.benchmark_group("full_backtest");
    for n in [1_000usize, 10_000] {
        group.bench_with_input(BenchmarkId::from_parameter(n), &n, |b, &n| {
            let bars = make_bars(n);
            b.iter(|| {
                let mut sim = Simulator::new(
                    Box::new(SmaCross::new(10, 20, 1.0).unwrap()),
                    Box::new(SimulatedBroker::new(Box::new(
                        StandardExecution::frictionless(),
                    ))),
                    Box::new(HistoricalClock::new(bars.clone())),
                    100_000.0,
                )
                .unwrap();
                let outcome = sim
                    .run(vec!["BTCUSDT".into()], json!({}), "bench")
                    .unwrap();
                black_box(outcome.portfolio.final_equity)
            });
        });
    }
    group.finish();
}

fn bench_broker_matching(c: &mut Criterion) {
    let ts = Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap();
    let bar = Bar::new(ts, "BTCUSDT", 100.0, 101.0, 99.0, 100.0, 1_000_000.0).unwrap();

    c.bench_function("broker_match_500_pending", |b| {
        b.iter(|| {
            let mut broker =
                SimulatedBroker::new(Box::new(StandardExecution::frictionless()));
            for i in 0..500u64 {
                let order =
                    Order::market(OrderId(i + 1), ts, "BTCUSDT", Side::Buy, 1.0).unwrap();
                broker.submit(order);
            }
            black_box(broker.process_bar(&bar).len())
        });
    });
}

criterion_group!(benches, bench_full_backtest, bench_broker_matching);
criterion_main!(benches);

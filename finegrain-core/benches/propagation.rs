//! Benchmarks for write propagation.
//!
//! Run with: cargo bench -p finegrain-core

use std::hint::black_box;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use finegrain_core::engines::EngineKind;
use finegrain_core::harness::{self, Strategy};
use finegrain_core::reactive::{Effect, Signal};

// ============================================================================
// Fan-out: one signal, many effects
// ============================================================================

fn bench_fan_out(c: &mut Criterion) {
    let mut group = c.benchmark_group("signal/fan_out");

    for subscribers in [1, 16, 256] {
        let signal = Signal::new(0_u64);
        let effects: Vec<Effect> = (0..subscribers)
            .map(|_| {
                let signal = signal.clone();
                Effect::new(move || {
                    black_box(signal.get());
                })
            })
            .collect();

        group.bench_with_input(BenchmarkId::from_parameter(subscribers), &(), |b, _| {
            b.iter(|| signal.update(|n| n + 1))
        });

        drop(effects);
    }

    group.finish();
}

// ============================================================================
// Counter engines
// ============================================================================

fn bench_engines(c: &mut Criterion) {
    let mut group = c.benchmark_group("engine/increment");

    for kind in EngineKind::ALL {
        let engine = kind.build();
        group.bench_function(kind.as_str(), |b| b.iter(|| engine.increment()));
    }

    group.finish();
}

// ============================================================================
// Harness strategies
// ============================================================================

fn bench_strategies(c: &mut Criterion) {
    let mut group = c.benchmark_group("harness/1000");

    for strategy in Strategy::ALL {
        group.bench_function(strategy.as_str(), |b| {
            b.iter(|| black_box(harness::run(strategy, 1000)))
        });
    }

    group.finish();
}

criterion_group!(benches, bench_fan_out, bench_engines, bench_strategies);
criterion_main!(benches);

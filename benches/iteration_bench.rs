//! Benchmarks for the scheduler engine's hot paths.
//!
//! Benchmarks cover:
//! - Ready-queue dispatch throughput per pass
//! - Timer heap insertion and cancellation
//! - Eager task creation (first step inline)
//! - Zero-timeout polling through the never-blocking poller

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::hint::black_box;
use std::sync::Arc;
use std::time::Duration;

use interloop::config::PollerConfig;
use interloop::core::SchedulerCore;
use interloop::infra::ManualMultiplexer;
use interloop::runtime::CoreLoop;

fn engine() -> Arc<CoreLoop> {
    CoreLoop::new(Arc::new(ManualMultiplexer::new()), &PollerConfig::default()).unwrap()
}

fn bench_pass_dispatch(c: &mut Criterion) {
    let mut group = c.benchmark_group("pass_dispatch");
    for batch in [16usize, 256, 4096] {
        group.throughput(Throughput::Elements(batch as u64));
        group.bench_with_input(BenchmarkId::from_parameter(batch), &batch, |b, &batch| {
            let engine = engine();
            b.iter(|| {
                for i in 0..batch {
                    engine.call_soon(Box::new(move || {
                        black_box(i);
                    }));
                }
                engine.run_once(false).unwrap();
            });
        });
    }
    group.finish();
}

fn bench_timer_scheduling(c: &mut Criterion) {
    c.bench_function("timer_schedule_cancel", |b| {
        let engine = engine();
        b.iter(|| {
            let handle = engine.call_later(Duration::from_secs(3600), Box::new(|| {}));
            handle.cancel();
            black_box(handle);
        });
    });
}

fn bench_eager_task(c: &mut Criterion) {
    c.bench_function("spawn_eager_trivial", |b| {
        let engine = engine();
        b.iter(|| {
            let handle = engine.spawn_eager(Box::pin(async {
                black_box(1u64);
            }));
            black_box(handle);
        });
    });
}

fn bench_zero_timeout_pass(c: &mut Criterion) {
    c.bench_function("empty_pass_zero_timeout", |b| {
        let engine = engine();
        b.iter(|| {
            engine.call_soon(Box::new(|| {}));
            engine.run_once(false).unwrap();
        });
    });
}

criterion_group!(
    benches,
    bench_pass_dispatch,
    bench_timer_scheduling,
    bench_eager_task,
    bench_zero_timeout_pass
);
criterion_main!(benches);

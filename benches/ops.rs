//! Micro-operation benchmarks for the adaptive cache.
//!
//! Run with: `cargo bench --bench ops`
//!
//! Measures per-operation latency (nanoseconds) for hit lookups, churn
//! inserts, and full adaptation rounds, with sampling dialed to the
//! production mask and to the worst case (every key mirrored).

use std::hint::black_box;
use std::time::Instant;

use adacache::adaptive::AdaptiveCache;
use criterion::{criterion_group, criterion_main, Criterion, Throughput};

const CAPACITY: usize = 6144;
const QUANTUM: usize = 256;
const OPS: u64 = 100_000;

fn warmed(sample_mask: u64) -> AdaptiveCache {
    let mut cache = AdaptiveCache::try_with_layout(CAPACITY, QUANTUM, sample_mask).unwrap();
    for key in 0..CAPACITY as u64 {
        cache.set(key, (1.0 + (key % 17) as f64, key % 1024));
    }
    cache
}

// ============================================================================
// Get Hit Latency (ns/op)
// ============================================================================

fn bench_get_hit(c: &mut Criterion) {
    let mut group = c.benchmark_group("get_hit_ns");
    group.throughput(Throughput::Elements(OPS));

    group.bench_function("sampled_1_in_16", |b| {
        b.iter_custom(|iters| {
            let mut cache = warmed(15);
            let start = Instant::now();
            for _ in 0..iters {
                for i in 0..OPS {
                    let key = i % (CAPACITY as u64);
                    black_box(cache.get(key));
                }
            }
            start.elapsed()
        })
    });

    group.bench_function("sampled_all", |b| {
        b.iter_custom(|iters| {
            let mut cache = warmed(0);
            let start = Instant::now();
            for _ in 0..iters {
                for i in 0..OPS {
                    let key = i % (CAPACITY as u64);
                    black_box(cache.get(key));
                }
            }
            start.elapsed()
        })
    });

    group.finish();
}

// ============================================================================
// Churn Insert Latency (ns/op)
// ============================================================================

fn bench_set_churn(c: &mut Criterion) {
    let mut group = c.benchmark_group("set_churn_ns");
    group.throughput(Throughput::Elements(OPS));

    group.bench_function("sampled_1_in_16", |b| {
        b.iter_custom(|iters| {
            let mut cache = warmed(15);
            let mut key = CAPACITY as u64;
            let start = Instant::now();
            for _ in 0..iters {
                for _ in 0..OPS {
                    key += 1;
                    cache.set(key, (1.0 + (key % 17) as f64, key % 1024));
                }
            }
            start.elapsed()
        })
    });

    group.finish();
}

// ============================================================================
// Adaptation Round (windowed churn + adapt)
// ============================================================================

fn bench_adapt(c: &mut Criterion) {
    let mut group = c.benchmark_group("adapt_round");

    group.bench_function("churn_window_then_adapt", |b| {
        b.iter_custom(|iters| {
            let mut cache = warmed(15);
            let mut key = CAPACITY as u64;
            let start = Instant::now();
            for _ in 0..iters {
                for _ in 0..1024 {
                    key += 1;
                    cache.set(key, (1.0 + (key % 17) as f64, key % 1024));
                }
                cache.adapt();
            }
            start.elapsed()
        })
    });

    group.finish();
}

criterion_group!(benches, bench_get_hit, bench_set_churn, bench_adapt);
criterion_main!(benches);

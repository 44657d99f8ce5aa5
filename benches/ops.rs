//! Micro-operation benchmarks for every strategy.
//!
//! Run with: `cargo bench --bench ops`
//!
//! Each strategy is built through `CacheBuilder` so all of them pay the same
//! enum dispatch; TTL runs with its sweeper disabled.

use std::hint::black_box;
use std::time::{Duration, Instant};

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use stratacache::builder::{CacheBuilder, CachePolicy, PolicyCache};
use stratacache::traits::Cache;

const CAPACITY: usize = 4_096;
const OPS: u64 = 50_000;
const SEED: u64 = 0x5eed;

const POLICIES: [(&str, CachePolicy); 5] = [
    ("fifo", CachePolicy::Fifo),
    ("lru", CachePolicy::Lru),
    ("lfu", CachePolicy::Lfu),
    ("arc", CachePolicy::Arc),
    (
        "ttl",
        CachePolicy::Ttl {
            ttl: Duration::from_secs(3_600),
        },
    ),
];

fn filled(policy: CachePolicy) -> PolicyCache<u64, u64> {
    let mut cache = CacheBuilder::new(CAPACITY)
        .sweep_interval(None)
        .build(policy);
    for i in 0..CAPACITY as u64 {
        cache.set(i, i).unwrap();
    }
    cache
}

// ============================================================================
// Get Hit Latency
// ============================================================================

fn bench_get_hit(c: &mut Criterion) {
    let mut group = c.benchmark_group("get_hit");
    group.throughput(Throughput::Elements(OPS));

    for (name, policy) in POLICIES {
        group.bench_function(BenchmarkId::from_parameter(name), |b| {
            b.iter_custom(|iters| {
                let mut cache = filled(policy);
                let start = Instant::now();
                for _ in 0..iters {
                    for i in 0..OPS {
                        let key = i % CAPACITY as u64;
                        let _ = black_box(cache.get(&key));
                    }
                }
                start.elapsed()
            })
        });
    }

    group.finish();
}

// ============================================================================
// Insert With Eviction
// ============================================================================

fn bench_insert_evict(c: &mut Criterion) {
    let mut group = c.benchmark_group("insert_evict");
    group.throughput(Throughput::Elements(OPS));

    for (name, policy) in POLICIES {
        group.bench_function(BenchmarkId::from_parameter(name), |b| {
            b.iter_custom(|iters| {
                let mut cache = filled(policy);
                let mut next = CAPACITY as u64;
                let start = Instant::now();
                for _ in 0..iters {
                    for _ in 0..OPS {
                        cache.set(next, next).unwrap();
                        next += 1;
                    }
                }
                start.elapsed()
            })
        });
    }

    group.finish();
}

// ============================================================================
// Mixed Hot/Cold Workload
// ============================================================================

/// 80% of requests go to 20% of a key universe twice the capacity; misses
/// are filled, as a read-through caller would.
fn bench_mixed(c: &mut Criterion) {
    let mut group = c.benchmark_group("mixed_hotset");
    group.throughput(Throughput::Elements(OPS));
    let universe = CAPACITY as u64 * 2;
    let hot = universe / 5;

    for (name, policy) in POLICIES {
        group.bench_function(BenchmarkId::from_parameter(name), |b| {
            b.iter_custom(|iters| {
                let mut cache = filled(policy);
                let mut rng = StdRng::seed_from_u64(SEED);
                let start = Instant::now();
                for _ in 0..iters {
                    for _ in 0..OPS {
                        let key = if rng.gen_bool(0.8) {
                            rng.gen_range(0..hot)
                        } else {
                            rng.gen_range(hot..universe)
                        };
                        if cache.get(&key).is_err() {
                            cache.set(key, key).unwrap();
                        }
                    }
                }
                start.elapsed()
            })
        });
    }

    group.finish();
}

criterion_group!(benches, bench_get_hit, bench_insert_evict, bench_mixed);
criterion_main!(benches);

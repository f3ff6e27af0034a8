//! Throughput benchmarks for the core ring operations.

use std::time::Duration;

use criterion::{Criterion, Throughput, black_box, criterion_group, criterion_main};
use rand::prelude::*;

use ringdex::schema::{FieldSpec, Schema};
use ringdex::{FieldMap, MemoryStore, RingCache, RingConfig};

/// Create a benchmark cache with the given capacity.
fn create_cache(size: u64) -> RingCache<MemoryStore> {
    let schema = Schema::compile(&[
        FieldSpec::new("status").lock_key(),
        FieldSpec::new("owner").immutable(),
        FieldSpec::new("note").mutable(),
    ])
    .unwrap();
    RingCache::new(
        RingConfig::new().with_initial_size(size),
        schema,
        MemoryStore::new(),
    )
    .unwrap()
}

fn payload(i: u64) -> FieldMap {
    FieldMap::from([
        ("status".to_string(), "open".to_string()),
        ("owner".to_string(), format!("owner-{}", i % 16)),
        ("note".to_string(), format!("note-{i}")),
    ])
}

/// Benchmark pure insert performance (no wrap)
fn bench_insert(c: &mut Criterion) {
    let mut group = c.benchmark_group("insert");
    group.throughput(Throughput::Elements(1));
    group.measurement_time(Duration::from_secs(5));

    let cache = create_cache(10_000_000);
    let mut i = 0u64;

    group.bench_function("sequential", |b| {
        b.iter(|| {
            let outcome = cache.set(black_box(&format!("id-{i}")), black_box(&payload(i)));
            i += 1;
            outcome
        })
    });

    group.finish();
}

/// Benchmark merge-update performance (after population)
fn bench_update(c: &mut Criterion) {
    let mut group = c.benchmark_group("update");
    group.throughput(Throughput::Elements(1));
    group.measurement_time(Duration::from_secs(5));

    let cache = create_cache(100_000);
    let num_keys = 10_000u64;
    for i in 0..num_keys {
        cache.set(&format!("id-{i}"), &payload(i));
    }

    let mut rng = thread_rng();
    group.bench_function("random", |b| {
        b.iter(|| {
            let i = rng.gen_range(0..num_keys);
            cache.set(black_box(&format!("id-{i}")), black_box(&payload(i)))
        })
    });

    group.finish();
}

/// Benchmark read performance (after population)
fn bench_get(c: &mut Criterion) {
    let mut group = c.benchmark_group("get");
    group.throughput(Throughput::Elements(1));
    group.measurement_time(Duration::from_secs(5));

    let cache = create_cache(100_000);
    let num_keys = 10_000u64;
    for i in 0..num_keys {
        cache.set(&format!("id-{i}"), &payload(i));
    }

    let mut rng = thread_rng();
    group.bench_function("random_hit", |b| {
        b.iter(|| {
            let i = rng.gen_range(0..num_keys);
            cache.get(black_box(&format!("id-{i}")))
        })
    });
    group.bench_function("miss", |b| {
        b.iter(|| cache.get(black_box("no-such-id")))
    });

    group.finish();
}

/// Benchmark steady-state churn: every insert overwrites an occupant
fn bench_churn(c: &mut Criterion) {
    let mut group = c.benchmark_group("churn");
    group.throughput(Throughput::Elements(1));
    group.measurement_time(Duration::from_secs(5));

    let capacity = 1_000u64;
    let cache = create_cache(capacity);
    for i in 0..capacity {
        cache.set(&format!("warm-{i}"), &payload(i));
    }

    let mut i = capacity;
    group.bench_function("overwrite", |b| {
        b.iter(|| {
            let outcome = cache.set(black_box(&format!("churn-{i}")), black_box(&payload(i)));
            i += 1;
            outcome
        })
    });

    group.finish();
}

criterion_group!(benches, bench_insert, bench_update, bench_get, bench_churn);
criterion_main!(benches);

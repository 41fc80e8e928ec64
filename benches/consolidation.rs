//! Benchmarks for the SLEEP passes.
//!
//! Both passes are quadratic in the window size; these benchmarks track how
//! centrality and pattern detection scale over realistic recent windows.

// Criterion macros generate items without docs - this is expected for benchmarks
// Benchmarks use expect/unwrap for simplicity - panics are acceptable in benchmarks
#![allow(missing_docs)]
#![allow(clippy::expect_used, clippy::unwrap_used, clippy::cast_precision_loss)]

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use katra::services::{ConnectionGraph, PatternDetector};
use katra::{MemoryRecord, MemoryType};
use std::hint::black_box;
use std::time::Duration;

const TOPICS: &[&str] = &[
    "debugging flaky integration test",
    "reviewing pull request feedback",
    "tuning database connection pool",
    "planning sprint retrospective agenda",
    "profiling allocator contention",
    "writing release notes draft",
];

/// Builds a window where roughly one record in six shares a topic.
fn window(size: usize) -> Vec<MemoryRecord> {
    (0..size)
        .map(|i| {
            let topic = TOPICS[i % TOPICS.len()];
            MemoryRecord::new(
                "bench",
                MemoryType::Experience,
                format!("{topic} iteration{i} detail{}", i * 7),
                (i % 10) as f32 / 10.0,
            )
            .with_timestamp(1_700_000_000 + i as u64)
        })
        .collect()
}

fn bench_centrality(c: &mut Criterion) {
    let mut group = c.benchmark_group("centrality");
    group.measurement_time(Duration::from_secs(5));
    let graph = ConnectionGraph::new();

    for size in [10usize, 100, 500] {
        let records = window(size);
        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &records, |b, records| {
            b.iter_batched(
                || records.clone(),
                |mut batch| black_box(graph.calculate_centrality(&mut batch)),
                criterion::BatchSize::SmallInput,
            );
        });
    }
    group.finish();
}

fn bench_patterns(c: &mut Criterion) {
    let mut group = c.benchmark_group("pattern_detection");
    group.measurement_time(Duration::from_secs(5));
    let detector = PatternDetector::new();

    for size in [10usize, 100, 500] {
        let records = window(size);
        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &records, |b, records| {
            b.iter_batched(
                || records.clone(),
                |mut batch| black_box(detector.detect_patterns(&mut batch)),
                criterion::BatchSize::SmallInput,
            );
        });
    }
    group.finish();
}

criterion_group!(benches, bench_centrality, bench_patterns);
criterion_main!(benches);

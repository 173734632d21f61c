//! Counter context benchmarks
//!
//! Measures the replica hot paths: local updates against hot and cold
//! writer positions, cross-replica diff and merge, and Bloom bucket
//! derivation.

use std::net::{IpAddr, Ipv4Addr};

use bytes::Bytes;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use galena::context::codec;
use galena::util::bloom::hash_buckets;
use galena::{CounterContext, NodeId};

fn node(last: u8) -> IpAddr {
    IpAddr::V4(Ipv4Addr::new(10, 0, 0, last))
}

/// A context with `n` tuples for nodes 10.0.0.1 .. 10.0.0.n.
fn context_with_tuples(engine: &CounterContext, n: u8) -> Bytes {
    let mut ctx = engine.create();
    for last in 1..=n {
        ctx = engine.update(&ctx, node(last), last as i64).unwrap();
    }
    ctx
}

fn bench_update(c: &mut Criterion) {
    let engine = CounterContext::new(NodeId::from(node(1)));
    let mut group = c.benchmark_group("counter_update");

    for &tuples in &[1u8, 8, 32] {
        let ctx = context_with_tuples(&engine, tuples);

        // the most recent writer sits at offset 0
        group.bench_with_input(BenchmarkId::new("hot_writer", tuples), &ctx, |b, ctx| {
            b.iter(|| engine.update(black_box(ctx), node(tuples), 1).unwrap());
        });

        // the oldest writer forces a full scan and rotation
        group.bench_with_input(BenchmarkId::new("cold_writer", tuples), &ctx, |b, ctx| {
            b.iter(|| engine.update(black_box(ctx), node(1), 1).unwrap());
        });
    }
    group.finish();
}

fn bench_diff_merge(c: &mut Criterion) {
    let engine = CounterContext::new(NodeId::from(node(1)));
    let mut group = c.benchmark_group("counter_reconcile");

    for &tuples in &[8u8, 32] {
        let left = context_with_tuples(&engine, tuples);
        // clone the tuples but advance half the clocks on the right side
        let mut right = left.clone();
        for last in 1..=tuples / 2 {
            right = engine.update(&right, node(last), 1).unwrap();
        }

        group.bench_with_input(
            BenchmarkId::new("diff", tuples),
            &(left.clone(), right.clone()),
            |b, (left, right)| {
                b.iter(|| engine.diff(black_box(left), black_box(right)).unwrap());
            },
        );

        group.bench_with_input(
            BenchmarkId::new("merge", tuples),
            &(left, right),
            |b, (left, right)| {
                b.iter(|| engine.merge(black_box(left), black_box(right)).unwrap());
            },
        );
    }
    group.finish();
}

fn bench_total(c: &mut Criterion) {
    let engine = CounterContext::new(NodeId::from(node(1)));
    let ctx = context_with_tuples(&engine, 32);
    assert_eq!(codec::tuple_count(&ctx, engine.id_length()), 32);

    c.bench_function("counter_total_32", |b| {
        b.iter(|| engine.total(black_box(&ctx)).unwrap());
    });
}

fn bench_hash_buckets(c: &mut Criterion) {
    let key = b"keyspace:row:42";
    c.bench_function("bloom_hash_buckets_k8", |b| {
        b.iter(|| hash_buckets(black_box(key), 8, 1 << 20));
    });
}

criterion_group!(
    benches,
    bench_update,
    bench_diff_merge,
    bench_total,
    bench_hash_buckets
);
criterion_main!(benches);

//! Benchmarks for the identifier space
//!
//! Measures performance of:
//! - Parsing hex identifiers
//! - Shared prefix computation
//! - Circular distance
//! - Hash derivation

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use pastry_id::{IdSpace, NodeId};

fn bench_parse(c: &mut Criterion) {
    let mut group = c.benchmark_group("parse");

    for &length in &[4usize, 16, 32] {
        let space = IdSpace::new(16, length).unwrap();
        let text = "a5".repeat(length)[..length].to_string();
        group.throughput(Throughput::Elements(1));
        group.bench_with_input(BenchmarkId::from_parameter(length), &text, |b, t| {
            b.iter(|| NodeId::parse(black_box(t), space))
        });
    }
    group.finish();
}

fn bench_shared_prefix(c: &mut Criterion) {
    let mut group = c.benchmark_group("shared_prefix_length");

    let me = NodeId::hash(b"self", IdSpace::CANONICAL);
    // Peers sharing 0, 8, 16 and 31 leading digits with self.
    for &shared in &[0u32, 8, 16, 31] {
        let flip = 1u128 << (127 - shared * 4);
        let peer = NodeId::from_value(me.value() ^ flip, IdSpace::CANONICAL);
        group.bench_with_input(BenchmarkId::from_parameter(shared), &peer, |b, p| {
            b.iter(|| black_box(me).shared_prefix_length(black_box(p)))
        });
    }
    group.finish();
}

fn bench_circular_distance(c: &mut Criterion) {
    let mut group = c.benchmark_group("circular_distance");

    let spaces = [
        ("small", IdSpace::new(16, 4).unwrap()),
        ("canonical", IdSpace::CANONICAL),
    ];
    for (name, space) in spaces {
        let a = NodeId::hash(b"a", space);
        let b = NodeId::hash(b"b", space);
        group.bench_function(name, |bench| {
            bench.iter(|| black_box(a).circular_distance(black_box(&b)))
        });
    }
    group.finish();
}

fn bench_hash(c: &mut Criterion) {
    c.bench_function("hash_public_key", |b| {
        let key = [7u8; 32];
        b.iter(|| NodeId::hash(black_box(&key), IdSpace::CANONICAL))
    });
}

criterion_group!(
    benches,
    bench_parse,
    bench_shared_prefix,
    bench_circular_distance,
    bench_hash,
);

criterion_main!(benches);

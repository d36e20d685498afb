//! Benchmarks for striped Reed-Solomon slab coding
//!
//! Run with: cargo bench --package renter-core

use bytes::Bytes;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use renter_core::erasure::ErasureCoder;
use renter_core::EncryptionKey;

fn generate_data(size: usize) -> Vec<u8> {
    (0..size).map(|i| (i % 251) as u8).collect()
}

fn bench_encode(c: &mut Criterion) {
    let coder = ErasureCoder::new(10, 30).unwrap();
    let mut group = c.benchmark_group("slab_encode");

    for size in [1024 * 1024, 4 * 1024 * 1024, 16 * 1024 * 1024] {
        let data = generate_data(size);
        let label = format!("{}MB", size / (1024 * 1024));

        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(BenchmarkId::new("sequential", &label), &data, |b, data| {
            b.iter(|| coder.encode(black_box(data)))
        });
        group.bench_with_input(BenchmarkId::new("parallel", &label), &data, |b, data| {
            b.iter(|| coder.encode_parallel(black_box(data)))
        });
    }

    group.finish();
}

/// Decode a 4 MB slab with an increasing number of lost data shards
fn bench_decode(c: &mut Criterion) {
    let coder = ErasureCoder::new(10, 30).unwrap();
    let data = generate_data(4 * 1024 * 1024);
    let shards = coder.encode(&data).unwrap();
    let shard_len = shards[0].size();

    let mut group = c.benchmark_group("slab_decode");
    group.throughput(Throughput::Bytes(data.len() as u64));

    for missing in [0usize, 5, 10, 20] {
        let opts: Vec<Option<Bytes>> = shards
            .iter()
            .enumerate()
            .map(|(i, s)| (i >= missing).then(|| s.data.clone()))
            .collect();

        group.bench_with_input(
            BenchmarkId::new("missing", missing),
            &opts,
            |b, opts| b.iter(|| coder.decode(black_box(opts), shard_len)),
        );
    }

    group.finish();
}

fn bench_keystream(c: &mut Criterion) {
    let key = EncryptionKey::generate();
    let mut data = generate_data(4 * 1024 * 1024);

    let mut group = c.benchmark_group("keystream");
    group.throughput(Throughput::Bytes(data.len() as u64));
    group.bench_function("4MB", |b| {
        b.iter(|| key.apply_keystream(black_box(&mut data), 0).unwrap())
    });
    group.finish();
}

criterion_group!(benches, bench_encode, bench_decode, bench_keystream);
criterion_main!(benches);

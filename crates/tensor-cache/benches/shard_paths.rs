//! Criterion benchmark: shard path derivation and in-memory set/get.
//! Run with: cargo bench -p tensor-cache --bench shard_paths

use std::hint::black_box;
use std::sync::Arc;
use std::time::Duration;

use criterion::{criterion_group, criterion_main, Bencher, Criterion};
use object_store::memory::InMemory;
use object_store::path::Path;
use tensor_cache::blocking::TensorCache;
use tensor_cache::{CacheConfig, Compression, LeafName, ShardLayout, ShardMapper, Tensor};

fn keys(n: usize) -> Vec<String> {
    (0..n).map(|i| format!("sample_{}", i)).collect()
}

fn bench_entry_paths(c: &mut Criterion) {
    let mut group = c.benchmark_group("shard_paths");
    if std::env::var("QUICK").is_ok() {
        group
            .sample_size(10)
            .measurement_time(Duration::from_secs(2));
    }

    let keys = keys(1_000);
    for (name, leaf) in [("key_leaf", LeafName::Key), ("digest_leaf", LeafName::Digest)] {
        let mapper =
            ShardMapper::new(Path::from("cache"), "s3://bucket", ShardLayout::default(), leaf)
                .unwrap();
        group.bench_function(name, |b: &mut Bencher<'_>| {
            b.iter(|| {
                for key in &keys {
                    black_box(mapper.entry_path(key).unwrap());
                }
            });
        });
    }
    group.finish();
}

fn bench_memory_roundtrip(c: &mut Criterion) {
    let mut group = c.benchmark_group("memory_roundtrip");
    group.sample_size(20);

    let tensor = Tensor::from_vec(
        [256, 256],
        (0..256 * 256).map(|i| i as f32 * 0.5).collect::<Vec<_>>(),
    )
    .unwrap();

    for (name, compression) in [
        ("gzip_5", Compression::default()),
        ("uncompressed", Compression::None),
    ] {
        let cache = TensorCache::from_store(
            Arc::new(InMemory::new()),
            Path::default(),
            CacheConfig::default()
                .with_compression(compression)
                .with_chunk_target_bytes(64 * 1024),
        )
        .unwrap();

        group.bench_function(format!("set_get_256x256_f32_{}", name), |b| {
            b.iter(|| {
                cache.set("bench", &tensor).unwrap();
                black_box(cache.get("bench").unwrap());
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_entry_paths, bench_memory_roundtrip);
criterion_main!(benches);

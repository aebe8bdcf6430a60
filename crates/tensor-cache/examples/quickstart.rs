//! Store, inspect, and remove a few tensors with the blocking cache.
//!
//! Run with:
//!   cargo run -p tensor-cache --example quickstart -- [ROOT]
//!
//! ROOT defaults to a temporary directory. Any object store URL works too,
//! e.g. `memory://` or `s3://bucket/prefix` with credentials in the
//! environment.

use anyhow::{Context, Result};
use tensor_cache::blocking::TensorCache;
use tensor_cache::{DType, Tensor};

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let temp = tempfile::tempdir()?;
    let root = match std::env::args().nth(1) {
        Some(root) => root,
        None => temp
            .path()
            .to_str()
            .context("temporary directory is not valid UTF-8")?
            .to_string(),
    };
    let cache = TensorCache::new(&root).with_context(|| format!("opening cache at {}", root))?;
    println!("cache root: {}", cache.root());

    let samples = [
        ("sample_1", Tensor::zeros(DType::Float64, [4, 4])?),
        (
            "sample_2",
            Tensor::from_vec([2, 3], vec![1i32, 2, 3, 4, 5, 6])?,
        ),
        ("sample/3", Tensor::scalar(0.5f32)),
    ];

    for (key, tensor) in &samples {
        let (path, stats) = cache.set_with_stats(key, tensor)?;
        println!("set {:<10} -> {}", key, path);
        println!("  {}", serde_json::to_string(&stats)?);
    }

    for (key, expected) in &samples {
        let (tensor, stats) = cache.get_with_stats(key)?;
        let tensor = tensor.with_context(|| format!("{} missing right after set", key))?;
        anyhow::ensure!(&tensor == expected, "{} did not round-trip", key);
        println!("get {:<10} hit={} {:?}", key, stats.cache_hit, tensor);
    }

    let (_, miss) = cache.get_with_stats("never_stored")?;
    println!("miss: {}", serde_json::to_string(&miss)?);

    for (key, _) in &samples {
        let removed = cache.delete(key)?;
        println!("delete {:<10} removed={} exists={}", key, removed, cache.exists(key)?);
    }
    Ok(())
}

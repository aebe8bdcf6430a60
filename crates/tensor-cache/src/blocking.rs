//! Synchronous facade over [`crate::TensorCache`].
//!
//! Each instance owns a current-thread tokio runtime; nothing is shared
//! between instances. Do not call these methods from inside an async context,
//! use the async cache there instead.

use std::sync::Arc;

use object_store::path::Path;
use object_store::ObjectStore;
use tokio::runtime::{Builder, Runtime};

use crate::config::CacheConfig;
use crate::error::{CacheError, CacheResult};
use crate::shard::EntryPath;
use crate::stats::{GetStats, SetStats};
use crate::tensor::Tensor;

/// Blocking tensor cache. See [`crate::TensorCache`] for semantics.
#[derive(Debug)]
pub struct TensorCache {
    inner: crate::TensorCache,
    runtime: Runtime,
}

impl TensorCache {
    pub fn new(root: &str) -> CacheResult<Self> {
        Self::with_config(root, CacheConfig::default())
    }

    pub fn with_options<I, K, V>(root: &str, options: I) -> CacheResult<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self::with_config(root, CacheConfig::default().with_storage_options(options))
    }

    pub fn with_config(root: &str, config: CacheConfig) -> CacheResult<Self> {
        let runtime = runtime()?;
        let inner = {
            let _guard = runtime.enter();
            crate::TensorCache::with_config(root, config)?
        };
        Ok(Self { inner, runtime })
    }

    pub fn from_store(
        store: Arc<dyn ObjectStore>,
        prefix: Path,
        config: CacheConfig,
    ) -> CacheResult<Self> {
        Ok(Self {
            inner: crate::TensorCache::from_store(store, prefix, config)?,
            runtime: runtime()?,
        })
    }

    /// The async cache this facade drives.
    pub fn as_async(&self) -> &crate::TensorCache {
        &self.inner
    }

    pub fn root(&self) -> &str {
        self.inner.root()
    }

    pub fn shard_path(&self, key: &str) -> CacheResult<EntryPath> {
        self.inner.shard_path(key)
    }

    pub fn set(&self, key: &str, tensor: &Tensor) -> CacheResult<EntryPath> {
        self.runtime.block_on(self.inner.set(key, tensor))
    }

    pub fn set_with_stats(&self, key: &str, tensor: &Tensor) -> CacheResult<(EntryPath, SetStats)> {
        self.runtime.block_on(self.inner.set_with_stats(key, tensor))
    }

    pub fn get(&self, key: &str) -> CacheResult<Tensor> {
        self.runtime.block_on(self.inner.get(key))
    }

    pub fn get_opt(&self, key: &str) -> CacheResult<Option<Tensor>> {
        self.runtime.block_on(self.inner.get_opt(key))
    }

    pub fn get_with_stats(&self, key: &str) -> CacheResult<(Option<Tensor>, GetStats)> {
        self.runtime.block_on(self.inner.get_with_stats(key))
    }

    pub fn exists(&self, key: &str) -> CacheResult<bool> {
        self.runtime.block_on(self.inner.exists(key))
    }

    pub fn delete(&self, key: &str) -> CacheResult<bool> {
        self.runtime.block_on(self.inner.delete(key))
    }
}

fn runtime() -> CacheResult<Runtime> {
    Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| CacheError::Io {
            message: format!("failed to start cache runtime: {}", e),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tensor::DType;

    #[test]
    fn test_blocking_lifecycle() {
        let temp = tempfile::tempdir().unwrap();
        let cache = TensorCache::new(temp.path().to_str().unwrap()).unwrap();

        assert!(!cache.exists("sample_1").unwrap());
        cache
            .set("sample_1", &Tensor::zeros(DType::Float64, [4, 4]).unwrap())
            .unwrap();
        assert!(cache.exists("sample_1").unwrap());

        let restored = cache.get("sample_1").unwrap();
        assert_eq!(restored.shape(), &[4, 4]);
        assert_eq!(restored.to_vec::<f64>().unwrap(), vec![0.0; 16]);

        assert!(cache.delete("sample_1").unwrap());
        assert!(!cache.exists("sample_1").unwrap());
        assert!(!cache.delete("sample_1").unwrap());
    }

    #[test]
    fn test_instances_are_independent() {
        let a = TensorCache::new("memory://").unwrap();
        let b = TensorCache::new("memory://").unwrap();
        a.set("k", &Tensor::scalar(1i32)).unwrap();
        assert!(a.exists("k").unwrap());
        assert!(!b.exists("k").unwrap());
    }
}

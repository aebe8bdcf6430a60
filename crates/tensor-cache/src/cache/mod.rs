//! Sharded tensor cache.
//!
//! # Cache Structure
//!
//! ```text
//! {root}/{ab}/{cd}/{key}.zarr/
//!   zarr.json      # array metadata
//!   c/0/0 ...      # chunks
//! ```
//!
//! Every operation is a short, stateless sequence of backend requests. There
//! is no lock, no index and no background work: two instances pointed at the
//! same root see each other's writes with whatever consistency the backend
//! gives a single object.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use object_store::path::Path;
use object_store::ObjectStore;

use crate::config::CacheConfig;
use crate::error::{CacheError, CacheResult};
use crate::shard::{EntryPath, ShardMapper};
use crate::stats::{GetStats, SetStats};
use crate::store::StoreSpec;
use crate::tensor::Tensor;

mod evict;
mod put;
mod read;

/// Key-addressed store of numeric arrays on top of an object store.
///
/// Cloning is cheap and clones share the backend handle.
///
/// # Example
///
/// ```no_run
/// use tensor_cache::{DType, Tensor, TensorCache};
///
/// # async fn example() -> tensor_cache::CacheResult<()> {
/// let cache = TensorCache::new("/tmp/my_tensor_cache")?;
/// cache.set("sample_1", &Tensor::zeros(DType::Float64, [4, 4])?).await?;
/// let restored = cache.get("sample_1").await?;
/// assert_eq!(restored.shape(), &[4, 4]);
/// assert!(cache.exists("sample_1").await?);
/// cache.delete("sample_1").await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct TensorCache {
    store: Arc<dyn ObjectStore>,
    mapper: ShardMapper,
    config: CacheConfig,
    root: String,
    /// Set for local roots so deletes can also drop emptied directories.
    local_dir: Option<PathBuf>,
}

impl TensorCache {
    /// Open a cache with default configuration.
    ///
    /// `root` is a local path or a URL (`s3://bucket/prefix`, `gs://...`,
    /// `az://...`, `file:///...`, `memory://`).
    pub fn new(root: &str) -> CacheResult<Self> {
        Self::with_config(root, CacheConfig::default())
    }

    /// Open a cache, passing `options` verbatim to the storage backend.
    pub fn with_options<I, K, V>(root: &str, options: I) -> CacheResult<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self::with_config(root, CacheConfig::default().with_storage_options(options))
    }

    pub fn with_config(root: &str, config: CacheConfig) -> CacheResult<Self> {
        config.validate()?;
        let spec = StoreSpec::parse(root)?;
        let (store, prefix) = spec.open(&config.storage_options)?;

        let (display_root, local_dir) = match &spec {
            StoreSpec::Local(dir) => (dir.display().to_string(), Some(dir.clone())),
            StoreSpec::Memory => ("memory://".to_string(), None),
            StoreSpec::Remote(url) => (
                format!("{}://{}", url.scheme(), url.host_str().unwrap_or_default()),
                None,
            ),
        };

        let mapper = ShardMapper::new(prefix, display_root, config.shard, config.leaf)?;
        Ok(Self {
            store,
            mapper,
            config,
            root: spec.to_string(),
            local_dir,
        })
    }

    /// Wrap an already constructed backend. Entries live under `prefix`.
    pub fn from_store(
        store: Arc<dyn ObjectStore>,
        prefix: Path,
        config: CacheConfig,
    ) -> CacheResult<Self> {
        config.validate()?;
        let mapper = ShardMapper::new(prefix.clone(), "", config.shard, config.leaf)?;
        Ok(Self {
            store,
            mapper,
            config,
            root: prefix.to_string(),
            local_dir: None,
        })
    }

    /// The cache root this instance was opened with.
    pub fn root(&self) -> &str {
        &self.root
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Where `key` is (or would be) stored.
    pub fn shard_path(&self, key: &str) -> CacheResult<EntryPath> {
        self.mapper.entry_path(key)
    }

    /// Store `tensor` under `key`, replacing any previous entry.
    pub async fn set(&self, key: &str, tensor: &Tensor) -> CacheResult<EntryPath> {
        put::put_impl(self, key, tensor)
            .await
            .map(|(entry, _)| entry)
    }

    /// Like [`set`](Self::set), also reporting timing and size.
    pub async fn set_with_stats(
        &self,
        key: &str,
        tensor: &Tensor,
    ) -> CacheResult<(EntryPath, SetStats)> {
        let started = Instant::now();
        let (entry, objects) = put::put_impl(self, key, tensor).await?;
        Ok((entry, SetStats::new(started, tensor, objects)))
    }

    /// Load the tensor stored under `key`.
    ///
    /// Returns [`CacheError::NotFound`] if there is no entry.
    pub async fn get(&self, key: &str) -> CacheResult<Tensor> {
        read::get_impl(self, key)
            .await?
            .ok_or_else(|| CacheError::NotFound {
                key: key.to_string(),
            })
    }

    /// Load the tensor stored under `key`, or `None` if there is no entry.
    pub async fn get_opt(&self, key: &str) -> CacheResult<Option<Tensor>> {
        read::get_impl(self, key).await
    }

    /// Like [`get_opt`](Self::get_opt), also reporting timing and whether the
    /// lookup hit.
    pub async fn get_with_stats(&self, key: &str) -> CacheResult<(Option<Tensor>, GetStats)> {
        let started = Instant::now();
        let result = read::get_impl(self, key).await?;
        let stats = GetStats::new(started, result.as_ref());
        Ok((result, stats))
    }

    /// Whether a complete entry exists for `key`. Reads metadata only.
    pub async fn exists(&self, key: &str) -> CacheResult<bool> {
        read::exists_impl(self, key).await
    }

    /// Remove the entry for `key`.
    ///
    /// Returns `true` if something was removed and `false` if the key was not
    /// stored. Deleting a missing key is not an error.
    pub async fn delete(&self, key: &str) -> CacheResult<bool> {
        evict::delete_impl(self, key).await
    }
}

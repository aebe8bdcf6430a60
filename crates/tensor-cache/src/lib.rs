//! Key-addressed cache for numeric arrays on local disk or object storage.
//!
//! This crate maps string keys to arrays stored as Zarr v3 entries, spreading
//! entries over hash-derived shard directories so no directory grows without
//! bound. All persistence goes through `object_store`, so the same cache works
//! on:
//!
//! - local filesystem paths
//! - S3 and S3-compatible stores
//! - Google Cloud Storage
//! - Azure Blob Storage
//! - an in-memory store (tests)
//!
//! # Quick Start
//!
//! ```no_run
//! use tensor_cache::{Tensor, TensorCache};
//!
//! # async fn example() -> tensor_cache::CacheResult<()> {
//! let cache = TensorCache::new("/tmp/my_tensor_cache")?;
//!
//! let tensor = Tensor::from_vec([2, 3], vec![1.0f32, 2.0, 3.0, 4.0, 5.0, 6.0])?;
//! let (_, stats) = cache.set_with_stats("sample_1", &tensor).await?;
//! println!("stored in {:.6}s", stats.duration_seconds);
//!
//! let restored = cache.get("sample_1").await?;
//! assert_eq!(restored, tensor);
//! # Ok(())
//! # }
//! ```
//!
//! # Remote Roots
//!
//! Backend options (credentials, region, endpoint, anonymous access) are
//! passed through untouched:
//!
//! ```no_run
//! use tensor_cache::TensorCache;
//!
//! # fn example() -> tensor_cache::CacheResult<()> {
//! let _cache = TensorCache::with_options(
//!     "s3://my-bucket/cache",
//!     [("aws_region", "eu-west-1"), ("skip_signature", "true")],
//! )?;
//! # Ok(())
//! # }
//! ```
//!
//! A synchronous API with the same operations lives in [`blocking`].

pub mod blocking;
pub mod cache;
pub mod config;
pub mod error;
pub mod shard;
pub mod stats;
pub mod store;
pub mod tensor;
pub mod zarr;

pub use cache::TensorCache;
pub use config::{CacheConfig, Compression, LeafName, ShardLayout};
pub use error::{CacheError, CacheResult};
pub use shard::{key_digest, EntryPath, ShardMapper};
pub use stats::{GetStats, SetStats};
pub use store::StoreSpec;
pub use tensor::{DType, Element, Tensor};

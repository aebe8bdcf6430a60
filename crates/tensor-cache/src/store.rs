//! Cache root parsing and storage backend construction.
//!
//! Supports every backend `object_store` knows about:
//! - local filesystem (plain paths and `file://`)
//! - S3 and S3-compatible stores (`s3://`, `s3a://`)
//! - Google Cloud Storage (`gs://`)
//! - Azure Blob Storage (`az://`, `azure://`, `abfs://`, `abfss://`)
//! - HTTP/WebDAV (`http://`, `https://`)
//! - in-memory (`memory://`, for testing)

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use object_store::local::LocalFileSystem;
use object_store::memory::InMemory;
use object_store::path::Path;
use object_store::ObjectStore;
use tracing::debug;
use url::Url;

use crate::error::{CacheError, CacheResult};

/// Where a cache lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreSpec {
    /// A directory on the local filesystem.
    Local(PathBuf),
    /// A process-local in-memory store.
    Memory,
    /// Any URL `object_store::parse_url_opts` understands.
    Remote(Url),
}

impl StoreSpec {
    /// Parse a cache root. Anything without `://` is a local path; trailing
    /// slashes are ignored.
    pub fn parse(root: &str) -> CacheResult<Self> {
        if root.is_empty() {
            return Err(CacheError::InvalidSpec {
                spec: root.to_string(),
                reason: "cache root must not be empty".to_string(),
            });
        }

        if !root.contains("://") {
            let trimmed = root.trim_end_matches('/');
            let path = if trimmed.is_empty() { "/" } else { trimmed };
            return Ok(Self::Local(PathBuf::from(path)));
        }

        let mut url = Url::parse(root).map_err(|e| CacheError::InvalidSpec {
            spec: root.to_string(),
            reason: e.to_string(),
        })?;
        let path = url.path().trim_end_matches('/').to_string();
        url.set_path(&path);

        match url.scheme() {
            "file" => {
                let path = url.to_file_path().map_err(|_| CacheError::InvalidSpec {
                    spec: root.to_string(),
                    reason: "file URL must hold an absolute local path".to_string(),
                })?;
                Ok(Self::Local(path))
            }
            "memory" => Ok(Self::Memory),
            _ if url.host_str().map_or(true, str::is_empty) => Err(CacheError::InvalidSpec {
                spec: root.to_string(),
                reason: "remote URL must include a bucket or container".to_string(),
            }),
            _ => Ok(Self::Remote(url)),
        }
    }

    /// True for roots that live outside this machine.
    pub fn is_remote(&self) -> bool {
        matches!(self, Self::Remote(_))
    }

    /// Build the backend for this root. Returns the store and the prefix under
    /// which all entries live.
    ///
    /// `options` go verbatim to `object_store` for remote roots and are
    /// ignored otherwise.
    pub fn open(
        &self,
        options: &BTreeMap<String, String>,
    ) -> CacheResult<(Arc<dyn ObjectStore>, Path)> {
        match self {
            Self::Local(dir) => {
                if !options.is_empty() {
                    debug!(
                        root = %dir.display(),
                        "storage options are ignored for local cache roots"
                    );
                }
                std::fs::create_dir_all(dir).map_err(|e| CacheError::Io {
                    message: format!("failed to create cache directory {}: {}", dir.display(), e),
                })?;
                let store = LocalFileSystem::new_with_prefix(dir).map_err(|e| CacheError::Io {
                    message: format!("failed to open local store at {}: {}", dir.display(), e),
                })?;
                Ok((Arc::new(store), Path::default()))
            }
            Self::Memory => Ok((Arc::new(InMemory::new()), Path::default())),
            Self::Remote(url) => {
                let (store, prefix) =
                    object_store::parse_url_opts(url, options.iter()).map_err(|e| {
                        CacheError::InvalidSpec {
                            spec: url.to_string(),
                            reason: e.to_string(),
                        }
                    })?;
                Ok((Arc::from(store), prefix))
            }
        }
    }
}

impl std::fmt::Display for StoreSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Local(path) => write!(f, "{}", path.display()),
            Self::Memory => f.write_str("memory://"),
            Self::Remote(url) => write!(f, "{}", url),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_plain_path() {
        let spec = StoreSpec::parse("/tmp/my_tensor_cache/").unwrap();
        assert_eq!(spec, StoreSpec::Local(PathBuf::from("/tmp/my_tensor_cache")));
        assert!(!spec.is_remote());

        let rel = StoreSpec::parse("cache/dir").unwrap();
        assert_eq!(rel, StoreSpec::Local(PathBuf::from("cache/dir")));
    }

    #[test]
    fn test_parse_file_url() {
        let spec = StoreSpec::parse("file:///tmp/tensor-store").unwrap();
        assert_eq!(spec, StoreSpec::Local(PathBuf::from("/tmp/tensor-store")));
    }

    #[test]
    fn test_parse_remote() {
        let spec = StoreSpec::parse("s3://my-bucket/cache/").unwrap();
        assert!(spec.is_remote());
        assert_eq!(spec.to_string(), "s3://my-bucket/cache");

        assert!(StoreSpec::parse("gs://bucket/prefix").unwrap().is_remote());
        assert!(StoreSpec::parse("az://container/prefix").unwrap().is_remote());
    }

    #[test]
    fn test_parse_memory_and_empty() {
        assert_eq!(StoreSpec::parse("memory://").unwrap(), StoreSpec::Memory);
        assert!(StoreSpec::parse("").is_err());
        assert!(StoreSpec::parse("s3://").is_err());
    }

    #[test]
    fn test_open_remote_passes_prefix() {
        let spec = StoreSpec::parse("s3://my-bucket/cache/tensors").unwrap();
        let options = BTreeMap::from([
            ("aws_region".to_string(), "us-east-1".to_string()),
            ("skip_signature".to_string(), "true".to_string()),
        ]);
        let (_, prefix) = spec.open(&options).unwrap();
        assert_eq!(prefix.as_ref(), "cache/tensors");
    }

    #[test]
    fn test_open_unknown_scheme() {
        let spec = StoreSpec::parse("ftp://host/cache").unwrap();
        assert!(matches!(
            spec.open(&BTreeMap::new()),
            Err(CacheError::InvalidSpec { .. })
        ));
    }

    #[test]
    fn test_open_local_creates_directory() {
        let temp = tempfile::tempdir().unwrap();
        let root = temp.path().join("nested").join("cache");
        let spec = StoreSpec::Local(root.clone());
        spec.open(&BTreeMap::new()).unwrap();
        assert!(root.is_dir());
    }
}

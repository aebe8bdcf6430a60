//! Cache configuration.
//!
//! Everything here is fixed for the lifetime of a cache instance: changing the
//! shard layout or leaf naming of an existing root makes previously stored
//! entries unreachable.
//!
//! | Environment Variable | Description |
//! |---------------------|-------------|
//! | `TENSOR_CACHE_SHARD_LEVELS` | Number of shard directory levels (default: 2) |
//! | `TENSOR_CACHE_SHARD_WIDTH` | Hex characters per shard level (default: 2) |
//! | `TENSOR_CACHE_LEAF` | Leaf naming, `key` or `digest` (default: `key`) |
//! | `TENSOR_CACHE_COMPRESSION` | `gzip` or `none` (default: `gzip`) |
//! | `TENSOR_CACHE_GZIP_LEVEL` | Gzip level 0-9 (default: 5) |
//! | `TENSOR_CACHE_CHUNK_TARGET_BYTES` | Upper bound for one chunk (default: 1 MiB) |

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use tracing::warn;

use crate::error::{CacheError, CacheResult};

/// Largest supported number of shard levels.
pub const MAX_SHARD_LEVELS: u8 = 4;

/// Largest supported number of hex characters per shard level.
pub const MAX_SHARD_WIDTH: u8 = 4;

const DEFAULT_CHUNK_TARGET_BYTES: usize = 1024 * 1024;

const DEFAULT_GZIP_LEVEL: u32 = 5;

const ENV_PREFIX: &str = "TENSOR_CACHE";

/// Directory fan-out derived from the key digest.
///
/// `levels = 2, width = 2` gives `ab/cd/` style paths, i.e. 256 buckets per
/// level.
#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct ShardLayout {
    pub levels: u8,
    pub width: u8,
}

impl Default for ShardLayout {
    fn default() -> Self {
        Self {
            levels: 2,
            width: 2,
        }
    }
}

impl ShardLayout {
    pub fn new(levels: u8, width: u8) -> Self {
        Self { levels, width }
    }

    /// Buckets per shard level (`16^width`).
    pub fn fan_out(&self) -> u64 {
        16u64.pow(u32::from(self.width))
    }

    pub fn validate(&self) -> CacheResult<()> {
        if self.levels == 0 || self.levels > MAX_SHARD_LEVELS {
            return Err(CacheError::InvalidSpec {
                spec: format!("shard levels = {}", self.levels),
                reason: format!("must be between 1 and {}", MAX_SHARD_LEVELS),
            });
        }
        if self.width == 0 || self.width > MAX_SHARD_WIDTH {
            return Err(CacheError::InvalidSpec {
                spec: format!("shard width = {}", self.width),
                reason: format!("must be between 1 and {}", MAX_SHARD_WIDTH),
            });
        }
        Ok(())
    }
}

/// How the last path segment of an entry is named.
#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum LeafName {
    /// The key itself, percent-encoded into a single segment.
    #[default]
    Key,
    /// The full SHA-256 hex digest of the key. Use for very long keys.
    Digest,
}

/// Chunk compression applied after the `bytes` codec.
#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case", tag = "codec")]
pub enum Compression {
    None,
    Gzip { level: u32 },
}

impl Default for Compression {
    fn default() -> Self {
        Self::Gzip { level: DEFAULT_GZIP_LEVEL }
    }
}

/// Configuration for a [`crate::TensorCache`].
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct CacheConfig {
    pub shard: ShardLayout,

    pub leaf: LeafName,

    pub compression: Compression,

    /// Upper bound for the uncompressed size of one chunk.
    pub chunk_target_bytes: usize,

    /// Backend options passed verbatim to `object_store` for remote roots
    /// (credentials, region, endpoint overrides, `skip_signature`, ...).
    #[serde(default)]
    pub storage_options: BTreeMap<String, String>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            shard: ShardLayout::default(),
            leaf: LeafName::default(),
            compression: Compression::default(),
            chunk_target_bytes: DEFAULT_CHUNK_TARGET_BYTES,
            storage_options: BTreeMap::new(),
        }
    }
}

impl CacheConfig {
    /// Load overrides from `TENSOR_CACHE_*` environment variables on top of
    /// the defaults. Unparseable values fall back to the default with a
    /// warning.
    pub fn from_env() -> Self {
        Self::from_env_prefixed(ENV_PREFIX)
    }

    /// Same as [`CacheConfig::from_env`] with `{prefix}_SHARD_LEVELS` etc.
    pub fn from_env_prefixed(prefix: &str) -> Self {
        let defaults = Self::default();
        let var = |suffix: &str| format!("{}_{}", prefix, suffix);

        let shard = ShardLayout {
            levels: env_parse(&var("SHARD_LEVELS"), defaults.shard.levels),
            width: env_parse(&var("SHARD_WIDTH"), defaults.shard.width),
        };

        let leaf_var = var("LEAF");
        let leaf = match env_value(&leaf_var).as_deref() {
            None => defaults.leaf,
            Some(v) if v.eq_ignore_ascii_case("key") => LeafName::Key,
            Some(v) if v.eq_ignore_ascii_case("digest") => LeafName::Digest,
            Some(v) => {
                warn!(var = %leaf_var, value = v, "unknown leaf naming, using key");
                defaults.leaf
            }
        };

        let level = env_parse(&var("GZIP_LEVEL"), DEFAULT_GZIP_LEVEL);
        let compression_var = var("COMPRESSION");
        let compression = match env_value(&compression_var).as_deref() {
            Some(v) if v.eq_ignore_ascii_case("none") => Compression::None,
            None => Compression::Gzip { level },
            Some(v) if v.eq_ignore_ascii_case("gzip") => Compression::Gzip { level },
            Some(v) => {
                warn!(var = %compression_var, value = v, "unknown compression, using gzip");
                Compression::Gzip { level }
            }
        };

        Self {
            shard,
            leaf,
            compression,
            chunk_target_bytes: env_parse(
                &var("CHUNK_TARGET_BYTES"),
                defaults.chunk_target_bytes,
            ),
            storage_options: BTreeMap::new(),
        }
    }

    /// Parse a YAML document. Missing fields take their defaults.
    pub fn from_yaml_str(yaml: &str) -> CacheResult<Self> {
        let config: Self = serde_yaml::from_str(yaml).map_err(|e| CacheError::InvalidSpec {
            spec: "yaml config".to_string(),
            reason: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse a YAML config file.
    pub fn from_yaml_file(path: &Path) -> CacheResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| CacheError::Io {
            message: format!("failed to read config {}: {}", path.display(), e),
        })?;
        Self::from_yaml_str(&content)
    }

    pub fn validate(&self) -> CacheResult<()> {
        self.shard.validate()?;
        if let Compression::Gzip { level } = self.compression {
            if level > 9 {
                return Err(CacheError::InvalidSpec {
                    spec: format!("gzip level = {}", level),
                    reason: "must be between 0 and 9".to_string(),
                });
            }
        }
        if self.chunk_target_bytes == 0 {
            return Err(CacheError::InvalidSpec {
                spec: "chunk_target_bytes = 0".to_string(),
                reason: "must be positive".to_string(),
            });
        }
        Ok(())
    }

    pub fn with_shard(mut self, levels: u8, width: u8) -> Self {
        self.shard = ShardLayout::new(levels, width);
        self
    }

    pub fn with_leaf(mut self, leaf: LeafName) -> Self {
        self.leaf = leaf;
        self
    }

    pub fn with_compression(mut self, compression: Compression) -> Self {
        self.compression = compression;
        self
    }

    pub fn with_chunk_target_bytes(mut self, bytes: usize) -> Self {
        self.chunk_target_bytes = bytes;
        self
    }

    /// Add one backend option (e.g. `aws_region`, `skip_signature`).
    pub fn with_storage_option(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.storage_options.insert(key.into(), value.into());
        self
    }

    pub fn with_storage_options<I, K, V>(mut self, options: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.storage_options
            .extend(options.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }
}

fn env_value(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

fn env_parse<T>(name: &str, default: T) -> T
where
    T: FromStr + fmt::Display,
{
    match env_value(name) {
        None => default,
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!(var = name, value = %raw, default = %default, "unparseable value, using default");
            default
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_two_level_layout() {
        let config = CacheConfig::default();
        assert_eq!(config.shard, ShardLayout::new(2, 2));
        assert_eq!(config.shard.fan_out(), 256);
        assert_eq!(config.leaf, LeafName::Key);
        assert_eq!(config.compression, Compression::Gzip { level: 5 });
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_layout_bounds() {
        assert!(ShardLayout::new(0, 2).validate().is_err());
        assert!(ShardLayout::new(5, 2).validate().is_err());
        assert!(ShardLayout::new(2, 0).validate().is_err());
        assert!(ShardLayout::new(1, 4).validate().is_ok());
    }

    #[test]
    fn test_yaml_partial() {
        let yaml = r#"
shard:
  levels: 3
leaf: digest
compression:
  codec: none
storage_options:
  aws_region: eu-west-1
"#;
        let config = CacheConfig::from_yaml_str(yaml).unwrap();
        assert_eq!(config.shard, ShardLayout::new(3, 2));
        assert_eq!(config.leaf, LeafName::Digest);
        assert_eq!(config.compression, Compression::None);
        assert_eq!(config.chunk_target_bytes, DEFAULT_CHUNK_TARGET_BYTES);
        assert_eq!(
            config.storage_options.get("aws_region").map(String::as_str),
            Some("eu-west-1")
        );
    }

    #[test]
    fn test_yaml_rejects_bad_gzip_level() {
        let yaml = "compression:\n  codec: gzip\n  level: 12\n";
        assert!(CacheConfig::from_yaml_str(yaml).is_err());
    }

    #[test]
    fn test_builder() {
        let config = CacheConfig::default()
            .with_shard(1, 4)
            .with_leaf(LeafName::Digest)
            .with_storage_options([("skip_signature", "true")]);
        assert_eq!(config.shard.fan_out(), 65536);
        assert_eq!(config.storage_options.len(), 1);
    }

    fn clear_env(prefix: &str) {
        for suffix in [
            "SHARD_LEVELS",
            "SHARD_WIDTH",
            "LEAF",
            "COMPRESSION",
            "GZIP_LEVEL",
            "CHUNK_TARGET_BYTES",
        ] {
            std::env::remove_var(format!("{}_{}", prefix, suffix));
        }
    }

    #[test]
    fn test_from_env_defaults() {
        let prefix = "TC_TEST_ENV_DEFAULTS";
        clear_env(prefix);

        let config = CacheConfig::from_env_prefixed(prefix);
        assert_eq!(config, CacheConfig::default());
    }

    #[test]
    fn test_from_env_overrides() {
        let prefix = "TC_TEST_ENV_OVERRIDES";
        clear_env(prefix);
        std::env::set_var("TC_TEST_ENV_OVERRIDES_SHARD_LEVELS", "3");
        std::env::set_var("TC_TEST_ENV_OVERRIDES_SHARD_WIDTH", "1");
        std::env::set_var("TC_TEST_ENV_OVERRIDES_LEAF", "Digest");
        std::env::set_var("TC_TEST_ENV_OVERRIDES_GZIP_LEVEL", "9");
        std::env::set_var("TC_TEST_ENV_OVERRIDES_CHUNK_TARGET_BYTES", "4096");

        let config = CacheConfig::from_env_prefixed(prefix);
        clear_env(prefix);

        assert_eq!(config.shard, ShardLayout::new(3, 1));
        assert_eq!(config.leaf, LeafName::Digest);
        assert_eq!(config.compression, Compression::Gzip { level: 9 });
        assert_eq!(config.chunk_target_bytes, 4096);
        assert!(config.storage_options.is_empty());
    }

    #[test]
    fn test_from_env_compression_none() {
        let prefix = "TC_TEST_ENV_NONE";
        clear_env(prefix);
        std::env::set_var("TC_TEST_ENV_NONE_COMPRESSION", "none");
        std::env::set_var("TC_TEST_ENV_NONE_GZIP_LEVEL", "1");

        let config = CacheConfig::from_env_prefixed(prefix);
        clear_env(prefix);

        assert_eq!(config.compression, Compression::None);
    }

    #[test]
    fn test_from_env_unparseable_values_fall_back() {
        let prefix = "TC_TEST_ENV_INVALID";
        clear_env(prefix);
        std::env::set_var("TC_TEST_ENV_INVALID_SHARD_LEVELS", "two");
        std::env::set_var("TC_TEST_ENV_INVALID_SHARD_WIDTH", "-1");
        std::env::set_var("TC_TEST_ENV_INVALID_LEAF", "digset");
        std::env::set_var("TC_TEST_ENV_INVALID_COMPRESSION", "zstd");
        std::env::set_var("TC_TEST_ENV_INVALID_GZIP_LEVEL", "high");
        std::env::set_var("TC_TEST_ENV_INVALID_CHUNK_TARGET_BYTES", "1MiB");

        let config = CacheConfig::from_env_prefixed(prefix);
        clear_env(prefix);

        // A typo in the leaf naming must not silently switch to digest leaves.
        assert_eq!(config.leaf, LeafName::Key);
        assert_eq!(config, CacheConfig::default());
    }

    #[test]
    fn test_from_yaml_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        std::io::Write::write_all(
            &mut file,
            b"shard:\n  levels: 1\n  width: 3\nleaf: digest\nchunk_target_bytes: 2048\n",
        )
        .unwrap();

        let config = CacheConfig::from_yaml_file(file.path()).unwrap();
        assert_eq!(config.shard, ShardLayout::new(1, 3));
        assert_eq!(config.leaf, LeafName::Digest);
        assert_eq!(config.chunk_target_bytes, 2048);
        assert_eq!(config.compression, Compression::default());
    }

    #[test]
    fn test_from_yaml_file_errors() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.yaml");
        assert!(matches!(
            CacheConfig::from_yaml_file(&missing),
            Err(CacheError::Io { .. })
        ));

        let invalid = dir.path().join("invalid.yaml");
        std::fs::write(&invalid, "chunk_target_bytes: 0\n").unwrap();
        assert!(matches!(
            CacheConfig::from_yaml_file(&invalid),
            Err(CacheError::InvalidSpec { .. })
        ));
    }
}

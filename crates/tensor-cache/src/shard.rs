//! Key naming conventions for cached tensors.
//!
//! # Key Schema
//!
//! ```text
//! {prefix}/{h[0..2]}/{h[2..4]}/{key}.zarr/zarr.json     # default layout
//! {prefix}/{h[0..2]}/{h[2..4]}/{key}.zarr/c/0/0
//! ```
//!
//! `h` is the lowercase hex SHA-256 of the key. Directory segments come from
//! the digest so entries spread evenly whatever the keys look like; the leaf
//! carries the key itself (percent-encoded into one segment) so two keys never
//! share an entry even when they share a shard directory.

use std::fmt;

use object_store::path::{Path, PathPart};
use sha2::{Digest, Sha256};

use crate::config::{LeafName, ShardLayout};
use crate::error::{CacheError, CacheResult};
use crate::zarr::METADATA_KEY;

/// Suffix appended to every entry directory.
pub const ENTRY_SUFFIX: &str = ".zarr";

/// Longest leaf segment accepted; most local filesystems cap names at 255 bytes.
pub const MAX_LEAF_BYTES: usize = 255;

/// Lowercase hex SHA-256 of a key.
pub fn key_digest(key: &str) -> String {
    hex::encode(Sha256::digest(key.as_bytes()))
}

/// Location of one entry in the backend.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EntryPath {
    location: Path,
    display_root: String,
}

impl EntryPath {
    /// Entry directory, relative to the backend root.
    pub fn location(&self) -> &Path {
        &self.location
    }

    /// The `zarr.json` object of this entry.
    pub fn metadata(&self) -> Path {
        self.location.clone().join(METADATA_KEY)
    }

    /// A chunk object of this entry; `chunk_key` may contain `/`.
    pub fn chunk(&self, chunk_key: &str) -> Path {
        chunk_key
            .split('/')
            .fold(self.location.clone(), |path, part| path.join(part))
    }

    /// Shard directory segments, outermost first.
    pub fn shard_dirs(&self) -> Vec<String> {
        let parts: Vec<String> = self
            .location
            .parts()
            .map(|p| p.as_ref().to_string())
            .collect();
        parts
            .len()
            .checked_sub(1)
            .map(|leaf| parts[..leaf].to_vec())
            .unwrap_or_default()
    }
}

impl fmt::Display for EntryPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.display_root.is_empty() {
            write!(f, "{}", self.location)
        } else if self.display_root.ends_with('/') {
            write!(f, "{}{}", self.display_root, self.location)
        } else {
            write!(f, "{}/{}", self.display_root, self.location)
        }
    }
}

/// Maps keys to entry paths. Pure: the same key always yields the same path.
#[derive(Debug, Clone)]
pub struct ShardMapper {
    prefix: Path,
    display_root: String,
    layout: ShardLayout,
    leaf: LeafName,
}

impl ShardMapper {
    /// `prefix` is where entries live inside the backend; `display_root` is
    /// only used to render paths for humans.
    pub fn new(
        prefix: Path,
        display_root: impl Into<String>,
        layout: ShardLayout,
        leaf: LeafName,
    ) -> CacheResult<Self> {
        layout.validate()?;
        Ok(Self {
            prefix,
            display_root: display_root.into(),
            layout,
            leaf,
        })
    }

    pub fn layout(&self) -> ShardLayout {
        self.layout
    }

    /// Reject keys that cannot name an entry. No I/O happens before this.
    pub fn validate_key(&self, key: &str) -> CacheResult<()> {
        if key.is_empty() {
            return Err(CacheError::invalid_key(key, "key must not be empty"));
        }
        if key.chars().any(char::is_control) {
            return Err(CacheError::invalid_key(
                key,
                "key must not contain control characters",
            ));
        }
        if self.leaf == LeafName::Key {
            let leaf = Self::key_leaf(key);
            if leaf.as_ref().len() > MAX_LEAF_BYTES {
                return Err(CacheError::invalid_key(
                    key,
                    format!(
                        "encoded key is {} bytes, limit is {}; use digest leaf naming for long keys",
                        leaf.as_ref().len(),
                        MAX_LEAF_BYTES
                    ),
                ));
            }
        }
        Ok(())
    }

    /// Entry path for a key.
    pub fn entry_path(&self, key: &str) -> CacheResult<EntryPath> {
        self.validate_key(key)?;
        let digest = key_digest(key);
        let width = usize::from(self.layout.width);

        let mut location = self.prefix.clone();
        for level in 0..usize::from(self.layout.levels) {
            location = location.join(&digest[level * width..(level + 1) * width]);
        }

        let leaf = match self.leaf {
            LeafName::Key => Self::key_leaf(key),
            LeafName::Digest => PathPart::from(format!("{}{}", digest, ENTRY_SUFFIX)),
        };

        Ok(EntryPath {
            location: location.join(leaf),
            display_root: self.display_root.clone(),
        })
    }

    fn key_leaf(key: &str) -> PathPart<'static> {
        PathPart::from(format!("{}{}", key, ENTRY_SUFFIX))
    }
}

//! Error types for tensor cache operations.

use thiserror::Error;

/// Result type for cache operations.
pub type CacheResult<T> = Result<T, CacheError>;

/// Errors that can occur while storing or loading cached tensors.
#[derive(Debug, Error)]
pub enum CacheError {
    /// Key rejected before any I/O (empty, control characters, too long).
    #[error("invalid key {key:?}: {reason}")]
    InvalidKey { key: String, reason: String },

    /// Cache root or layout configuration could not be understood.
    #[error("invalid cache root '{spec}': {reason}")]
    InvalidSpec { spec: String, reason: String },

    /// No entry stored under the key.
    #[error("entry not found: {key}")]
    NotFound { key: String },

    /// Stored metadata or chunk data could not be decoded.
    #[error("corrupt entry at {path}: {message}")]
    Corrupt { path: String, message: String },

    /// Entry uses a codec or data type this crate cannot decode.
    #[error("unsupported: {what}")]
    Unsupported { what: String },

    /// Requested element type does not match the tensor's dtype.
    #[error("type mismatch: expected {expected}, got {actual}")]
    TypeMismatch { expected: String, actual: String },

    /// Shape and element count disagree.
    #[error("shape {shape:?} needs {expected} elements, got {actual}")]
    Shape {
        shape: Vec<usize>,
        expected: usize,
        actual: usize,
    },

    /// Shape whose byte size does not fit in memory.
    #[error("shape {shape:?} of {item_size}-byte elements is too large to allocate")]
    TooLarge { shape: Vec<usize>, item_size: usize },

    /// Local filesystem or runtime setup failure.
    #[error("I/O error: {message}")]
    Io { message: String },

    /// Error from the underlying object store, passed through unchanged.
    #[error("storage backend error: {0}")]
    Backend(#[from] object_store::Error),
}

impl CacheError {
    /// Returns true if this error means the entry does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Returns true if the key was rejected before reaching the backend.
    pub fn is_invalid_key(&self) -> bool {
        matches!(self, Self::InvalidKey { .. })
    }

    pub(crate) fn invalid_key(key: &str, reason: impl Into<String>) -> Self {
        Self::InvalidKey {
            key: key.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn corrupt(path: impl std::fmt::Display, message: impl Into<String>) -> Self {
        Self::Corrupt {
            path: path.to_string(),
            message: message.into(),
        }
    }
}

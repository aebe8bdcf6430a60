//! Per-call timing and size statistics.
//!
//! Stats are returned to the caller only; nothing is persisted. Both records
//! serialize to a flat JSON mapping whose only guaranteed field is
//! `duration_seconds`.

use std::time::{Duration, Instant};

use serde::Serialize;

use crate::tensor::{DType, Tensor};

/// Statistics for one `set` call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SetStats {
    /// Wall-clock time of the whole call, including path computation.
    pub duration_seconds: f64,
    pub array_shape: Vec<usize>,
    pub array_dtype: DType,
    pub array_size_bytes: u64,
    /// Objects written (chunks plus metadata).
    pub objects_written: usize,
}

impl SetStats {
    pub(crate) fn new(started: Instant, tensor: &Tensor, objects_written: usize) -> Self {
        Self {
            duration_seconds: elapsed_seconds(started),
            array_shape: tensor.shape().to_vec(),
            array_dtype: tensor.dtype(),
            array_size_bytes: tensor.nbytes() as u64,
            objects_written,
        }
    }

    pub fn duration(&self) -> Duration {
        Duration::from_secs_f64(self.duration_seconds)
    }
}

/// Statistics for one `get` call. Array fields are present only on a hit.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GetStats {
    pub duration_seconds: f64,
    pub cache_hit: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub array_shape: Option<Vec<usize>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub array_dtype: Option<DType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub array_size_bytes: Option<u64>,
}

impl GetStats {
    pub(crate) fn new(started: Instant, result: Option<&Tensor>) -> Self {
        Self {
            duration_seconds: elapsed_seconds(started),
            cache_hit: result.is_some(),
            array_shape: result.map(|t| t.shape().to_vec()),
            array_dtype: result.map(Tensor::dtype),
            array_size_bytes: result.map(|t| t.nbytes() as u64),
        }
    }

    pub fn duration(&self) -> Duration {
        Duration::from_secs_f64(self.duration_seconds)
    }
}

fn elapsed_seconds(started: Instant) -> f64 {
    started.elapsed().as_secs_f64()
}

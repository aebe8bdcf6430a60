//! Zarr v3 layout for one cached array.
//!
//! # Object Layout
//!
//! ```text
//! {entry}/zarr.json      # array metadata, written last
//! {entry}/c/0/0          # regular-grid chunks, bytes codec (+ gzip)
//! {entry}/c/0/1
//! ```
//!
//! Entries written here are plain Zarr v3 arrays, so other Zarr readers can
//! open them directly. Reading accepts the subset of Zarr v3 this module can
//! decode: regular grids, `default`/`v2` key encodings, `bytes` and `gzip`.

pub mod codec;
pub mod grid;
pub mod metadata;

use serde_json::{json, Map};

use crate::config::CacheConfig;
use crate::error::{CacheError, CacheResult};
use crate::tensor::{checked_byte_len, element_count, DType, Tensor};

pub use codec::CodecChain;
pub use grid::{ChunkGrid, KeyEncoding};
pub use metadata::{ArrayMetadata, METADATA_KEY};

/// Everything needed to encode or decode the chunks of one array.
#[derive(Clone, Debug)]
pub struct ArrayLayout {
    dtype: DType,
    grid: ChunkGrid,
    keys: KeyEncoding,
    codecs: CodecChain,
    fill: Vec<u8>,
}

impl ArrayLayout {
    /// Layout for writing `tensor` with the cache's chunking and compression.
    pub fn for_tensor(tensor: &Tensor, config: &CacheConfig) -> Self {
        let dtype = tensor.dtype();
        let chunk_shape =
            grid::guess_chunk_shape(tensor.shape(), dtype.item_size(), config.chunk_target_bytes);
        Self {
            dtype,
            grid: ChunkGrid::new(tensor.shape().to_vec(), chunk_shape),
            keys: KeyEncoding::default(),
            codecs: CodecChain::for_compression(config.compression),
            fill: vec![0u8; dtype.item_size()],
        }
    }

    /// Layout described by a stored `zarr.json`.
    pub fn from_metadata(meta: &ArrayMetadata, path: &str) -> CacheResult<Self> {
        let dtype = DType::parse(&meta.data_type)?;
        let chunk_shape = meta.regular_chunk_shape(path)?;
        for (what, shape) in [("shape", &meta.shape), ("chunk_shape", &chunk_shape)] {
            if checked_byte_len(shape, dtype.item_size()).is_none() {
                return Err(CacheError::corrupt(
                    path,
                    format!("{} {:?} of {} is too large to allocate", what, shape, dtype),
                ));
            }
        }
        let keys = KeyEncoding::parse(
            &meta.chunk_key_encoding.name,
            meta.chunk_key_encoding
                .get("separator")
                .and_then(|v| v.as_str()),
        )?;
        let codecs = CodecChain::from_metadata(&meta.codecs)?;
        let fill = metadata::fill_value_bytes(dtype, &meta.fill_value, path)?;

        Ok(Self {
            dtype,
            grid: ChunkGrid::new(meta.shape.clone(), chunk_shape),
            keys,
            codecs,
            fill,
        })
    }

    pub fn to_metadata(&self) -> ArrayMetadata {
        ArrayMetadata {
            zarr_format: 3,
            node_type: "array".to_string(),
            shape: self.grid.shape().to_vec(),
            data_type: self.dtype.as_str().to_string(),
            chunk_grid: metadata::NamedConfig::new(
                "regular",
                json!({ "chunk_shape": self.grid.chunk_shape() }),
            ),
            chunk_key_encoding: metadata::NamedConfig::new(
                self.keys.name(),
                json!({ "separator": self.keys.separator().to_string() }),
            ),
            fill_value: metadata::zero_fill_value(self.dtype),
            codecs: self.codecs.to_metadata(),
            attributes: Map::new(),
            dimension_names: None,
        }
    }

    pub fn dtype(&self) -> DType {
        self.dtype
    }

    pub fn shape(&self) -> &[usize] {
        self.grid.shape()
    }

    pub fn chunk_shape(&self) -> &[usize] {
        self.grid.chunk_shape()
    }

    pub fn chunk_coords(&self) -> Vec<Vec<usize>> {
        self.grid.chunk_coords()
    }

    /// Object key of a chunk, relative to the entry.
    pub fn chunk_key(&self, coords: &[usize]) -> String {
        self.keys.chunk_key(coords)
    }

    /// Encode the chunk at `coords` of `tensor`.
    pub fn encode_chunk(&self, tensor: &Tensor, coords: &[usize]) -> CacheResult<Vec<u8>> {
        let raw = self.grid.extract(tensor.as_le_bytes(), coords, &self.fill);
        self.codecs.encode(raw, self.dtype.item_size())
    }

    /// Output buffer pre-filled with the fill value, for chunks that were
    /// never written.
    pub fn filled_buffer(&self) -> CacheResult<Vec<u8>> {
        let count = element_count(self.grid.shape());
        let too_large = || CacheError::TooLarge {
            shape: self.grid.shape().to_vec(),
            item_size: self.fill.len(),
        };
        let len = count.checked_mul(self.fill.len()).ok_or_else(too_large)?;
        let mut out = Vec::new();
        out.try_reserve_exact(len).map_err(|_| too_large())?;
        for _ in 0..count {
            out.extend_from_slice(&self.fill);
        }
        Ok(out)
    }

    /// Decode a stored chunk into `out`.
    pub fn decode_chunk_into(
        &self,
        out: &mut [u8],
        coords: &[usize],
        stored: &[u8],
        path: &str,
    ) -> CacheResult<()> {
        let item = self.dtype.item_size();
        let raw = self
            .codecs
            .decode(stored, item, self.grid.chunk_len() * item, path)?;
        self.grid.insert(out, coords, &raw, item);
        Ok(())
    }

    /// Wrap a fully assembled buffer as a tensor.
    pub fn into_tensor(self, data: Vec<u8>, path: &str) -> CacheResult<Tensor> {
        Tensor::from_le_bytes(self.dtype, self.grid.shape().to_vec(), data).map_err(|e| {
            CacheError::corrupt(path, format!("assembled array does not match its layout: {}", e))
        })
    }
}

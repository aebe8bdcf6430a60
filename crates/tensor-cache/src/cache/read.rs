//! Read path: metadata lookup, chunk fetch and reassembly.

use bytes::Bytes;
use object_store::path::Path;
use object_store::GetOptions;
use tracing::debug;

use crate::error::CacheResult;
use crate::tensor::Tensor;
use crate::zarr::{ArrayLayout, ArrayMetadata};

use super::TensorCache;

pub(super) async fn get_impl(cache: &TensorCache, key: &str) -> CacheResult<Option<Tensor>> {
    let entry = cache.mapper.entry_path(key)?;
    let meta_path = entry.metadata();

    let Some(meta_bytes) = read_object(cache, &meta_path).await? else {
        debug!(key, path = %entry, "cache miss");
        return Ok(None);
    };

    let metadata = ArrayMetadata::parse(&meta_bytes, meta_path.as_ref())?;
    let layout = ArrayLayout::from_metadata(&metadata, entry.location().as_ref())?;

    let mut data = layout.filled_buffer()?;
    let mut missing = 0usize;
    for coords in layout.chunk_coords() {
        let location = entry.chunk(&layout.chunk_key(&coords));
        match read_object(cache, &location).await? {
            Some(stored) => layout.decode_chunk_into(&mut data, &coords, &stored, location.as_ref())?,
            // Never-written chunks hold the fill value.
            None => missing += 1,
        }
    }

    let tensor = layout.into_tensor(data, entry.location().as_ref())?;
    debug!(
        key,
        path = %entry,
        shape = ?tensor.shape(),
        dtype = %tensor.dtype(),
        missing_chunks = missing,
        "cache hit"
    );
    Ok(Some(tensor))
}

pub(super) async fn exists_impl(cache: &TensorCache, key: &str) -> CacheResult<bool> {
    let entry = cache.mapper.entry_path(key)?;
    let options = GetOptions {
        head: true,
        ..Default::default()
    };
    match cache.store.get_opts(&entry.metadata(), options).await {
        Ok(_) => Ok(true),
        Err(object_store::Error::NotFound { .. }) => Ok(false),
        Err(e) => Err(e.into()),
    }
}

/// Fetch one object; `None` if it does not exist.
async fn read_object(cache: &TensorCache, location: &Path) -> CacheResult<Option<Bytes>> {
    match cache.store.get_opts(location, GetOptions::default()).await {
        Ok(result) => Ok(Some(result.bytes().await?)),
        Err(object_store::Error::NotFound { .. }) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

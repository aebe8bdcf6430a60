//! Write path: encode chunks, then publish metadata.

use object_store::path::Path;
use object_store::{PutOptions, PutPayload};
use tracing::debug;

use crate::error::CacheResult;
use crate::shard::EntryPath;
use crate::tensor::Tensor;
use crate::zarr::ArrayLayout;

use super::{evict, TensorCache};

/// Returns the entry path and the number of objects written.
pub(super) async fn put_impl(
    cache: &TensorCache,
    key: &str,
    tensor: &Tensor,
) -> CacheResult<(EntryPath, usize)> {
    let entry = cache.mapper.entry_path(key)?;

    // Stale chunks of a previous, differently shaped array would otherwise
    // survive the overwrite.
    let replaced = evict::remove_entry(cache, &entry).await?;

    let layout = ArrayLayout::for_tensor(tensor, &cache.config);
    let mut written = 0;
    for coords in layout.chunk_coords() {
        let location = entry.chunk(&layout.chunk_key(&coords));
        let encoded = layout.encode_chunk(tensor, &coords)?;
        put_object(cache, &location, encoded).await?;
        written += 1;
    }

    // Metadata goes last so a partially written entry never looks present.
    let metadata = layout.to_metadata().to_bytes()?;
    put_object(cache, &entry.metadata(), metadata).await?;
    written += 1;

    debug!(
        key,
        path = %entry,
        shape = ?tensor.shape(),
        dtype = %tensor.dtype(),
        chunks = written - 1,
        replaced,
        "stored tensor"
    );
    Ok((entry, written))
}

async fn put_object(cache: &TensorCache, location: &Path, bytes: Vec<u8>) -> CacheResult<()> {
    cache
        .store
        .put_opts(location, PutPayload::from(bytes), PutOptions::default())
        .await?;
    Ok(())
}

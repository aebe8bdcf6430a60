//! Delete path.

use futures::stream::{self, StreamExt, TryStreamExt};
use object_store::path::Path;
use tracing::{debug, warn};

use crate::error::CacheResult;
use crate::shard::EntryPath;

use super::TensorCache;

pub(super) async fn delete_impl(cache: &TensorCache, key: &str) -> CacheResult<bool> {
    let entry = cache.mapper.entry_path(key)?;
    let removed = remove_entry(cache, &entry).await?;
    if removed {
        debug!(key, path = %entry, "deleted tensor");
    } else {
        debug!(key, path = %entry, "delete of absent key");
    }
    Ok(removed)
}

/// Remove every object under the entry. Returns whether anything was there.
pub(super) async fn remove_entry(cache: &TensorCache, entry: &EntryPath) -> CacheResult<bool> {
    let listed: Vec<Path> = match cache
        .store
        .list(Some(entry.location()))
        .map_ok(|meta| meta.location)
        .try_collect()
        .await
    {
        Ok(locations) => locations,
        Err(object_store::Error::NotFound { .. }) => Vec::new(),
        Err(e) => return Err(e.into()),
    };

    if listed.is_empty() {
        return Ok(false);
    }

    let mut deleted = cache
        .store
        .delete_stream(stream::iter(listed.into_iter().map(Ok)).boxed());
    while let Some(result) = deleted.next().await {
        match result {
            Ok(_) | Err(object_store::Error::NotFound { .. }) => {}
            Err(e) => return Err(e.into()),
        }
    }

    if let Some(root) = &cache.local_dir {
        prune_local_dir(root, entry).await;
    }
    Ok(true)
}

/// Local backends leave empty directories behind once the objects are gone.
async fn prune_local_dir(root: &std::path::Path, entry: &EntryPath) {
    let dir = entry
        .location()
        .parts()
        .fold(root.to_path_buf(), |dir, part| dir.join(part.as_ref()));
    match tokio::fs::remove_dir_all(&dir).await {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!(dir = %dir.display(), error = %e, "failed to prune entry directory"),
    }
}

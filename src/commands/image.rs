//! Entry points for compressing images.

use tracing::debug;

use crate::core::{AppState, CompressionSettings, ImageItem};
use crate::processing::BatchProcessor;
use crate::utils::{CompressorError, CompressorResult};

/// Compresses a single item with the given settings.
///
/// Convenience wrapper around [`compress_batch`], used to retry one failed
/// item or re-compress it with new settings. The item keeps its id.
pub async fn compress_single<F>(
    state: &AppState,
    item: ImageItem,
    settings: &CompressionSettings,
    on_item_update: F,
) -> CompressorResult<ImageItem>
where
    F: Fn(&ImageItem) + Send + Sync,
{
    compress_batch(state, vec![item], settings, on_item_update)
        .await?
        .into_iter()
        .next()
        .ok_or_else(|| CompressorError::compression("No item returned"))
}

/// Compresses a batch of items.
///
/// `settings` is copied once up front; later changes by the caller do not
/// affect this run. Every item is settled independently and reported through
/// `on_item_update` on each status change. Items come back in input order.
///
/// # Errors
/// Only when the context pool cannot be started. Per-item failures are
/// recorded on the items.
pub async fn compress_batch<F>(
    state: &AppState,
    items: Vec<ImageItem>,
    settings: &CompressionSettings,
    on_item_update: F,
) -> CompressorResult<Vec<ImageItem>>
where
    F: Fn(&ImageItem) + Send + Sync,
{
    let settings = settings.normalized();
    let parallelism = state.governor().resolve(settings.parallelism);
    debug!("Received compress_batch for {} items, parallelism {}", items.len(), parallelism);

    if items.is_empty() {
        return Ok(items);
    }

    let pool = state.pool_for(parallelism).await?;
    let processor = BatchProcessor::new(&pool, state.converter(), parallelism, state.item_timeout());
    Ok(processor.process_batch(items, settings, &on_item_update).await)
}

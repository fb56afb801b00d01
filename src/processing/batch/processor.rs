use std::time::{Duration, Instant};

use futures::future::join_all;
use tracing::{debug, error, info, warn};

use crate::core::{BatchSummary, CompressionSettings, ImageItem, ItemStatus};
use crate::processing::pipeline::{ItemPipeline, ItemUpdate};
use crate::processing::preprocess::FormatConverter;
use crate::worker::ContextPool;
use super::limiter::PreparationLimiter;

/// Runs a batch of items through the pipeline with bounded concurrency.
pub struct BatchProcessor<'a> {
    pipeline: ItemPipeline<'a>,
    limiter: PreparationLimiter,
}

impl<'a> BatchProcessor<'a> {
    /// `parallelism` bounds how many items hold a raw or decoded buffer at once.
    pub fn new(
        pool: &'a ContextPool,
        converter: &'a dyn FormatConverter,
        parallelism: usize,
        item_timeout: Duration,
    ) -> Self {
        debug!("Creating BatchProcessor with parallelism {}", parallelism);
        Self {
            pipeline: ItemPipeline::new(pool, converter, item_timeout),
            limiter: PreparationLimiter::new(parallelism),
        }
    }

    pub fn limiter(&self) -> &PreparationLimiter {
        &self.limiter
    }

    /// Processes every item and returns them in input order.
    ///
    /// Items are settled independently: a failed item gets an `error` status
    /// and the rest of the batch carries on.
    pub async fn process_batch(
        &self,
        mut items: Vec<ImageItem>,
        settings: CompressionSettings,
        on_update: ItemUpdate<'_>,
    ) -> Vec<ImageItem> {
        let start = Instant::now();
        info!(
            "Processing batch of {} items (quality {}, {}, parallelism {})",
            items.len(),
            settings.quality,
            settings.output_format,
            self.limiter.max_concurrent()
        );

        for item in items.iter_mut() {
            restart(item);
        }

        join_all(items.iter_mut().map(|item| self.process_item(item, &settings, on_update))).await;

        let summary = BatchSummary::from_items(&items, start.elapsed());
        info!("Batch complete: {}", summary);
        debug!("Peak concurrent items: {}", self.limiter.peak_in_flight());
        items
    }

    async fn process_item(&self, item: &mut ImageItem, settings: &CompressionSettings, on_update: ItemUpdate<'_>) {
        // Held until the result is materialized, so at most `parallelism`
        // items have buffers alive at any time.
        let _permit = match self.limiter.acquire().await {
            Ok(permit) => permit,
            Err(e) => {
                error!("Could not schedule {}: {}", item.name, e);
                return;
            }
        };
        self.pipeline.run(item, settings, on_update).await;
    }
}

/// Brings an item back to `pending` before a run.
///
/// An item can arrive as `processing` when the caller resubmits a snapshot
/// taken from a progress update. Nothing is working on that copy any more, so
/// it is failed first and then reset like any other finished item.
fn restart(item: &mut ImageItem) {
    if matches!(item.status(), ItemStatus::Processing) {
        warn!("{} was submitted while marked processing, restarting it", item.name);
        if let Err(e) = item.mark_failed("Interrupted before completion") {
            error!("Cannot interrupt {}: {}", item.name, e);
        }
    }
    if let Err(e) = item.reset() {
        error!("Cannot restart {}: {}", item.name, e);
    }
}

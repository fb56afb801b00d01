//! One item's journey from source bytes to compressed output.

use std::time::{Duration, Instant};

use tracing::{debug, error, warn};

use crate::core::{CompressedOutput, CompressionSettings, ImageItem, Task, TaskPayload, TaskStatus};
use crate::processing::preprocess::{FormatConverter, PreparedInput, prepare_input};
use crate::utils::{CompressorError, CompressorResult, output_file_name};
use crate::worker::ContextPool;

/// Callback receiving every status change of an item.
pub type ItemUpdate<'a> = &'a (dyn Fn(&ImageItem) + Sync);

/// Drives a single item through preprocessing, the pool and back.
///
/// Every failure ends up as the item's `error` status; `run` itself never
/// fails, so one bad image cannot take a batch down.
pub struct ItemPipeline<'a> {
    pool: &'a ContextPool,
    converter: &'a dyn FormatConverter,
    timeout: Duration,
}

impl<'a> ItemPipeline<'a> {
    pub fn new(pool: &'a ContextPool, converter: &'a dyn FormatConverter, timeout: Duration) -> Self {
        Self { pool, converter, timeout }
    }

    pub async fn run(&self, item: &mut ImageItem, settings: &CompressionSettings, on_update: ItemUpdate<'_>) {
        if let Err(e) = item.mark_processing() {
            warn!("Skipping {}: {}", item.name, e);
            return;
        }
        on_update(item);

        let start = Instant::now();
        let transition = match self.compress(item, settings).await {
            Ok(output) => {
                debug!(
                    "Compressed {} -> {} ({} bytes, {}% saved) in {:?}",
                    item.name,
                    output.file_name,
                    output.compressed_size,
                    output.percent_saved,
                    start.elapsed()
                );
                item.mark_done(output)
            }
            Err(e) => {
                warn!("Failed to compress {}: {}", item.name, e);
                item.mark_failed(e.to_string())
            }
        };
        if let Err(e) = transition {
            error!("Item {} left in unexpected state: {}", item.id, e);
        }
        on_update(item);
    }

    async fn compress(&self, item: &ImageItem, settings: &CompressionSettings) -> CompressorResult<CompressedOutput> {
        let bytes = item
            .source
            .read()
            .await
            .map_err(|e| CompressorError::io(format!("Failed to read {}: {}", item.name, e)))?;

        let PreparedInput { bytes, format } = prepare_input(bytes, &item.name, self.converter).await?;

        let task = Task::new(
            item.id,
            TaskPayload {
                bytes,
                file_name: item.name.clone(),
                format,
                settings: *settings,
            },
        );
        let pending = self.pool.submit(task);
        let ticket = pending.ticket();

        let result = match tokio::time::timeout(self.timeout, pending).await {
            Ok(result) => result?,
            Err(_) => {
                self.pool.abandon(ticket);
                return Err(CompressorError::Timeout(self.timeout));
            }
        };

        if result.id != item.id {
            return Err(CompressorError::compression(format!(
                "Result for {} was delivered to {}",
                result.id, item.id
            )));
        }

        match result.status {
            TaskStatus::Success { compressed } => Ok(CompressedOutput::new(
                output_file_name(&item.name, settings.output_format),
                compressed,
                item.original_size,
            )),
            TaskStatus::Error { message } => Err(CompressorError::compression(message)),
        }
    }
}

//! Composition root for the compressor.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::concurrency::{CapabilityProbe, ConcurrencyGovernor, SystemProbe};
use crate::core::CompressorConfig;
use crate::processing::{CodecFactory, FormatConverter, ImageCodecFactory, UnavailableConverter};
use crate::utils::CompressorResult;
use crate::worker::{ContextPool, PoolOptions, PoolStats};

/// Owns the shared pieces every compression call needs.
///
/// The context pool is created on first use and kept for later batches. A
/// request for a different parallelism tears the current pool down and
/// starts a new one of the requested size.
pub struct AppState {
    config: CompressorConfig,
    governor: ConcurrencyGovernor,
    codecs: Arc<dyn CodecFactory>,
    converter: Arc<dyn FormatConverter>,
    item_timeout: Duration,
    pool: Mutex<Option<Arc<ContextPool>>>,
}

impl AppState {
    /// Creates a state backed by the built-in codec and the host's capabilities.
    pub fn new(config: CompressorConfig) -> Self {
        let governor = ConcurrencyGovernor::new(&SystemProbe);
        let item_timeout = config.item_timeout();
        Self {
            config,
            governor,
            codecs: Arc::new(ImageCodecFactory),
            converter: Arc::new(UnavailableConverter),
            item_timeout,
            pool: Mutex::new(None),
        }
    }

    pub fn with_codecs(mut self, codecs: Arc<dyn CodecFactory>) -> Self {
        self.codecs = codecs;
        self
    }

    pub fn with_converter(mut self, converter: Arc<dyn FormatConverter>) -> Self {
        self.converter = converter;
        self
    }

    pub fn with_probe(mut self, probe: &dyn CapabilityProbe) -> Self {
        self.governor = ConcurrencyGovernor::new(probe);
        self
    }

    /// Overrides the configured per-item timeout.
    pub fn with_item_timeout(mut self, timeout: Duration) -> Self {
        self.item_timeout = timeout;
        self
    }

    pub fn config(&self) -> &CompressorConfig {
        &self.config
    }

    pub fn governor(&self) -> &ConcurrencyGovernor {
        &self.governor
    }

    pub fn converter(&self) -> &dyn FormatConverter {
        self.converter.as_ref()
    }

    pub fn item_timeout(&self) -> Duration {
        self.item_timeout
    }

    /// Returns an initialized pool of `size` contexts, creating or resizing as needed.
    pub async fn pool_for(&self, size: usize) -> CompressorResult<Arc<ContextPool>> {
        let mut slot = self.pool.lock().await;

        if let Some(current) = slot.as_ref() {
            if current.size() == size && !current.is_terminated() {
                debug!("Reusing context pool of size {}", size);
                current.initialize().await?;
                return Ok(Arc::clone(current));
            }
            if current.is_terminated() {
                info!("Context pool has shut down, starting a new one with {} contexts", size);
            } else {
                info!("Parallelism changed from {} to {}, replacing context pool", current.size(), size);
                current.terminate();
            }
        }

        let pool = Arc::new(ContextPool::new(
            size,
            Arc::clone(&self.codecs),
            PoolOptions {
                base_url: self.config.codec_base_url.clone(),
                init_timeout: self.config.init_timeout(),
            },
        ));
        *slot = Some(Arc::clone(&pool));
        pool.initialize().await?;
        Ok(pool)
    }

    pub async fn pool_stats(&self) -> Option<PoolStats> {
        self.pool.lock().await.as_ref().map(|pool| pool.stats())
    }

    /// Terminates the active pool, if any.
    pub async fn shutdown(&self) {
        if let Some(pool) = self.pool.lock().await.take() {
            pool.terminate();
        }
    }
}

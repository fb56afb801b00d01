//! Runtime configuration for the compressor.

use std::path::Path;
use std::time::Duration;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::core::CompressionSettings;
use crate::utils::{CompressorResult, OutputFormat, validate_config};

/// Fixed per-item deadline, covering queueing and execution.
pub const DEFAULT_ITEM_TIMEOUT_SECS: u64 = 30;
/// How long every execution context gets to answer its init handshake.
pub const DEFAULT_INIT_TIMEOUT_SECS: u64 = 10;

/// Compressor configuration, loadable from a camelCase JSON file.
///
/// Missing fields fall back to their defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CompressorConfig {
    /// Per-item timeout in seconds
    pub item_timeout_secs: u64,
    /// Execution context handshake timeout in seconds
    pub init_timeout_secs: u64,
    /// Location codecs load their resources from, sent in the init handshake
    pub codec_base_url: String,
    /// Quality used when the caller does not specify one
    pub default_quality: u8,
    /// Format used when the caller does not specify one
    pub default_format: OutputFormat,
    /// Parallelism override; `None` uses the device default
    pub parallelism: Option<usize>,
}

impl Default for CompressorConfig {
    fn default() -> Self {
        Self {
            item_timeout_secs: DEFAULT_ITEM_TIMEOUT_SECS,
            init_timeout_secs: DEFAULT_INIT_TIMEOUT_SECS,
            codec_base_url: String::new(),
            default_quality: 80,
            default_format: OutputFormat::Jpeg,
            parallelism: None,
        }
    }
}

impl CompressorConfig {
    /// Loads and validates a config file.
    pub async fn load(path: impl AsRef<Path>) -> CompressorResult<Self> {
        let path = path.as_ref();
        let raw = tokio::fs::read_to_string(path).await?;
        let config = Self::from_json(&raw)?;
        debug!("Loaded config from {}: {:?}", path.display(), config);
        Ok(config)
    }

    pub fn from_json(raw: &str) -> CompressorResult<Self> {
        let config: Self = serde_json::from_str(raw)?;
        validate_config(&config)?;
        Ok(config)
    }

    pub fn item_timeout(&self) -> Duration {
        Duration::from_secs(self.item_timeout_secs)
    }

    pub fn init_timeout(&self) -> Duration {
        Duration::from_secs(self.init_timeout_secs)
    }

    /// Settings seeded from the configured defaults.
    pub fn default_settings(&self) -> CompressionSettings {
        CompressionSettings {
            quality: self.default_quality,
            output_format: self.default_format,
            parallelism: self.parallelism,
        }
    }
}

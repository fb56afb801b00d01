//! Core types for compression settings and the per-item lifecycle.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use serde::{Deserialize, Serialize};
use tracing::warn;
use uuid::Uuid;

use crate::utils::{CompressorError, CompressorResult, OutputFormat, extract_filename};

pub const MIN_QUALITY: u8 = 1;
pub const MAX_QUALITY: u8 = 100;

/// Settings for one compression run.
///
/// `Copy` on purpose: a batch takes its own snapshot, so the caller can keep
/// editing its live settings without touching an in-flight run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompressionSettings {
    /// Encoder quality (1-100)
    pub quality: u8,
    /// Target format for every item in the run
    pub output_format: OutputFormat,
    /// Requested parallelism; `None` lets the governor pick the device default
    #[serde(default)]
    pub parallelism: Option<usize>,
}

impl Default for CompressionSettings {
    fn default() -> Self {
        Self {
            quality: 80,
            output_format: OutputFormat::Jpeg,
            parallelism: None,
        }
    }
}

impl CompressionSettings {
    pub fn new(quality: u8, output_format: OutputFormat) -> Self {
        Self {
            quality,
            output_format,
            parallelism: None,
        }
    }

    pub fn with_parallelism(mut self, parallelism: usize) -> Self {
        self.parallelism = Some(parallelism);
        self
    }

    /// Returns a copy with quality clamped into range.
    ///
    /// Out-of-range values are clamped with a warning log rather than
    /// rejected, so a bad slider value never fails a whole batch.
    pub fn normalized(self) -> Self {
        let quality = self.quality.clamp(MIN_QUALITY, MAX_QUALITY);
        if quality != self.quality {
            warn!("Quality {} out of range, using {} instead", self.quality, quality);
        }
        Self { quality, ..self }
    }
}

/// Opaque, stable identifier of an item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(Uuid);

impl ItemId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ItemId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// Handle to the original input of an item.
///
/// Reading produces a fresh buffer each time, so the buffer handed to the pool
/// can be moved away while the original stays available for a retry.
#[derive(Clone)]
pub enum SourceHandle {
    Path(PathBuf),
    Memory(Arc<[u8]>),
}

impl SourceHandle {
    pub async fn read(&self) -> std::io::Result<Vec<u8>> {
        match self {
            Self::Path(path) => tokio::fs::read(path).await,
            Self::Memory(bytes) => Ok(bytes.to_vec()),
        }
    }
}

impl fmt::Debug for SourceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Path(path) => f.debug_tuple("Path").field(path).finish(),
            Self::Memory(bytes) => write!(f, "Memory({} bytes)", bytes.len()),
        }
    }
}

/// The encoded result of a successful compression.
#[derive(Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompressedOutput {
    /// Output file name with the target format's extension
    pub file_name: String,
    pub compressed_size: u64,
    /// Rounded savings relative to the original; negative if the file grew
    pub percent_saved: i64,
    #[serde(skip)]
    pub bytes: Vec<u8>,
}

impl CompressedOutput {
    pub fn new(file_name: String, bytes: Vec<u8>, original_size: u64) -> Self {
        let compressed_size = bytes.len() as u64;
        Self {
            file_name,
            compressed_size,
            percent_saved: percent_saved(original_size, compressed_size),
            bytes,
        }
    }
}

impl fmt::Debug for CompressedOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompressedOutput")
            .field("file_name", &self.file_name)
            .field("compressed_size", &self.compressed_size)
            .field("percent_saved", &self.percent_saved)
            .finish()
    }
}

/// `round((original - compressed) / original * 100)`, or 0 for an empty original.
pub fn percent_saved(original_size: u64, compressed_size: u64) -> i64 {
    if original_size == 0 {
        return 0;
    }
    let saved = original_size as f64 - compressed_size as f64;
    (saved / original_size as f64 * 100.0).round() as i64
}

/// Human label for a savings percentage; growth is never shown as a saving.
pub fn format_savings(percent_saved: i64) -> String {
    if percent_saved > 0 {
        format!("-{}%", percent_saved)
    } else {
        "Same".to_string()
    }
}

/// Where an item is in its lifecycle.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum ItemStatus {
    Pending,
    Processing,
    Done(CompressedOutput),
    Error { message: String },
}

impl ItemStatus {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Done(_) => "done",
            Self::Error { .. } => "error",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done(_) | Self::Error { .. })
    }
}

/// One user-submitted image.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageItem {
    pub id: ItemId,
    #[serde(skip)]
    pub source: SourceHandle,
    pub name: String,
    pub original_size: u64,
    #[serde(flatten)]
    status: ItemStatus,
}

impl ImageItem {
    pub fn new(name: impl Into<String>, source: SourceHandle, original_size: u64) -> Self {
        Self {
            id: ItemId::new(),
            source,
            name: name.into(),
            original_size,
            status: ItemStatus::Pending,
        }
    }

    /// Creates an item backed by an in-memory buffer.
    pub fn from_bytes(name: impl Into<String>, bytes: impl Into<Arc<[u8]>>) -> Self {
        let bytes: Arc<[u8]> = bytes.into();
        let size = bytes.len() as u64;
        Self::new(name, SourceHandle::Memory(bytes), size)
    }

    /// Creates an item backed by a file on disk.
    pub async fn from_path(path: impl AsRef<Path>) -> CompressorResult<Self> {
        let path = path.as_ref();
        let metadata = tokio::fs::metadata(path).await.map_err(|e| {
            CompressorError::io(format!("Failed to read {}: {}", path.display(), e))
        })?;
        if !metadata.is_file() {
            return Err(CompressorError::io(format!("Not a file: {}", path.display())));
        }
        let name = extract_filename(&path.to_string_lossy()).to_string();
        Ok(Self::new(name, SourceHandle::Path(path.to_path_buf()), metadata.len()))
    }

    pub fn status(&self) -> &ItemStatus {
        &self.status
    }

    pub fn output(&self) -> Option<&CompressedOutput> {
        match &self.status {
            ItemStatus::Done(output) => Some(output),
            _ => None,
        }
    }

    pub fn error_message(&self) -> Option<&str> {
        match &self.status {
            ItemStatus::Error { message } => Some(message),
            _ => None,
        }
    }

    pub fn compressed_size(&self) -> Option<u64> {
        self.output().map(|o| o.compressed_size)
    }

    pub fn percent_saved(&self) -> Option<i64> {
        self.output().map(|o| o.percent_saved)
    }

    /// `pending -> processing`
    pub fn mark_processing(&mut self) -> CompressorResult<()> {
        match self.status {
            ItemStatus::Pending => {
                self.status = ItemStatus::Processing;
                Ok(())
            }
            _ => Err(self.bad_transition("processing")),
        }
    }

    /// `processing -> done`
    pub fn mark_done(&mut self, output: CompressedOutput) -> CompressorResult<()> {
        match self.status {
            ItemStatus::Processing => {
                self.status = ItemStatus::Done(output);
                Ok(())
            }
            _ => Err(self.bad_transition("done")),
        }
    }

    /// `processing -> error`
    pub fn mark_failed(&mut self, message: impl Into<String>) -> CompressorResult<()> {
        match self.status {
            ItemStatus::Processing => {
                self.status = ItemStatus::Error { message: message.into() };
                Ok(())
            }
            _ => Err(self.bad_transition("error")),
        }
    }

    /// `error -> pending`, the explicit retry transition.
    pub fn retry(&mut self) -> CompressorResult<()> {
        match self.status {
            ItemStatus::Error { .. } => {
                self.status = ItemStatus::Pending;
                Ok(())
            }
            _ => Err(self.bad_transition("pending")),
        }
    }

    /// Puts a terminal item back to `pending` for re-compression, dropping any
    /// previous output. Pending items are left alone.
    pub fn reset(&mut self) -> CompressorResult<()> {
        match self.status {
            ItemStatus::Pending => Ok(()),
            ItemStatus::Done(_) | ItemStatus::Error { .. } => {
                self.status = ItemStatus::Pending;
                Ok(())
            }
            ItemStatus::Processing => Err(self.bad_transition("pending")),
        }
    }

    fn bad_transition(&self, to: &str) -> CompressorError {
        CompressorError::invalid_transition(format!(
            "{} cannot go from {} to {}",
            self.name,
            self.status.name(),
            to
        ))
    }
}

//! Pool work units and their results.

use std::fmt;
use crate::core::{CompressionSettings, ItemId};
use crate::utils::SourceFormat;

/// One unit of compression work.
///
/// Submitting a task moves it, byte buffer included, into the pool; the
/// caller keeps nothing it could read afterwards.
#[derive(Debug)]
pub struct Task {
    /// Id of the item this task compresses
    pub id: ItemId,
    pub payload: TaskPayload,
}

/// Everything an execution context needs to compress one image.
pub struct TaskPayload {
    /// Raw input in a pool-supported format
    pub bytes: Vec<u8>,
    pub file_name: String,
    pub format: SourceFormat,
    pub settings: CompressionSettings,
}

impl Task {
    pub fn new(id: ItemId, payload: TaskPayload) -> Self {
        Self { id, payload }
    }
}

impl fmt::Debug for TaskPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskPayload")
            .field("bytes", &self.bytes.len())
            .field("file_name", &self.file_name)
            .field("format", &self.format)
            .field("settings", &self.settings)
            .finish()
    }
}

/// Outcome of one task, produced inside an execution context.
#[derive(Debug)]
pub struct TaskResult {
    pub id: ItemId,
    /// Size of the input the context received
    pub original_size: u64,
    pub status: TaskStatus,
}

pub enum TaskStatus {
    /// Encoded bytes, moved back to the caller
    Success { compressed: Vec<u8> },
    Error { message: String },
}

impl TaskResult {
    pub fn success(id: ItemId, original_size: u64, compressed: Vec<u8>) -> Self {
        Self { id, original_size, status: TaskStatus::Success { compressed } }
    }

    pub fn error(id: ItemId, original_size: u64, message: impl Into<String>) -> Self {
        Self { id, original_size, status: TaskStatus::Error { message: message.into() } }
    }

    pub fn is_success(&self) -> bool {
        matches!(self.status, TaskStatus::Success { .. })
    }

    pub fn compressed_size(&self) -> Option<u64> {
        match &self.status {
            TaskStatus::Success { compressed } => Some(compressed.len() as u64),
            TaskStatus::Error { .. } => None,
        }
    }
}

impl fmt::Debug for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success { compressed } => write!(f, "Success({} bytes)", compressed.len()),
            Self::Error { message } => write!(f, "Error({})", message),
        }
    }
}

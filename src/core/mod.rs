//! Core types and state management.
//!
//! This module contains the fundamental types used throughout the crate:
//! - [`AppState`]: Composition root owning the execution-context pool
//! - [`ImageItem`]: One image and its lifecycle status
//! - [`CompressionSettings`]: Snapshot of the settings for a run
//! - [`Task`] / [`TaskResult`]: Pool work units
//! - [`BatchSummary`]: Aggregate outcome of a batch
//! - [`CompressorConfig`]: Timeouts and defaults

mod config;
mod progress;
mod state;
mod task;
mod types;

pub use config::{CompressorConfig, DEFAULT_INIT_TIMEOUT_SECS, DEFAULT_ITEM_TIMEOUT_SECS};
pub use progress::BatchSummary;
pub use state::AppState;
pub use task::{Task, TaskPayload, TaskResult, TaskStatus};
pub use types::{
    CompressedOutput,
    CompressionSettings,
    ImageItem,
    ItemId,
    ItemStatus,
    SourceHandle,
    MAX_QUALITY,
    MIN_QUALITY,
    format_savings,
    percent_saved,
};

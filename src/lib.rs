// Module declarations in dependency order
pub mod utils;
pub mod core;
pub mod worker;
pub mod processing;
pub mod concurrency;
pub mod commands;

// Public exports for external consumers
pub use crate::core::{
    AppState,
    BatchSummary,
    CompressedOutput,
    CompressionSettings,
    CompressorConfig,
    ImageItem,
    ItemId,
    ItemStatus,
    SourceHandle,
    format_savings,
};
pub use concurrency::{CapabilityProbe, ConcurrencyGovernor, DeviceTier, SignalProbe, SystemProbe};
pub use processing::{Codec, CodecFactory, FormatConverter, ImageCodecFactory};
pub use utils::{CompressorError, CompressorResult, OutputFormat, SourceFormat, validate_settings};
pub use worker::{ContextPool, PoolError, PoolStats};
pub use commands::*;

// The binary entry point lives in main.rs.

//! Image processing: codecs, input preparation and the per-item and batch flows.

pub mod batch;
mod codec;
mod pipeline;
mod preprocess;

pub use batch::{BatchProcessor, PreparationLimiter};
pub use codec::{Bitmap, Codec, CodecError, CodecFactory, ImageCodec, ImageCodecFactory};
pub use pipeline::{ItemPipeline, ItemUpdate};
pub use preprocess::{FormatConverter, PreparedInput, UnavailableConverter, prepare_input};

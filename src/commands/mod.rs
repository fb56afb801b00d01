//! Public compression entry points.
//!
//! - [`compress_batch`]: Compress many items with bounded concurrency
//! - [`compress_single`]: Compress or retry one item

mod image;

pub use image::*;

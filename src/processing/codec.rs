//! Codec capability hosted by each execution context.
//!
//! The pool only needs "bytes + format in, bitmap out" and "bitmap + target
//! format + quality in, bytes out". [`ImageCodec`] implements that on top of
//! the `image` crate; tests and embedders can plug their own [`CodecFactory`].

use image::codecs::jpeg::JpegEncoder;
use image::codecs::webp::WebPEncoder;
use image::{ExtendedColorType, ImageEncoder};
use thiserror::Error;

use crate::utils::{OutputFormat, SourceFormat};

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("codec unavailable: {0}")]
    Unavailable(String),
    #[error("failed to decode {format}: {message}")]
    Decode { format: SourceFormat, message: String },
    #[error("failed to encode {format}: {message}")]
    Encode { format: OutputFormat, message: String },
}

/// A decoded image, 8-bit RGBA, `width * height * 4` bytes.
pub struct Bitmap {
    pub width: u32,
    pub height: u32,
    pub rgba: Vec<u8>,
}

impl Bitmap {
    pub fn byte_len(&self) -> usize {
        self.rgba.len()
    }
}

pub trait Codec {
    fn decode(&mut self, bytes: &[u8], format: SourceFormat) -> Result<Bitmap, CodecError>;

    fn encode(&mut self, bitmap: &Bitmap, format: OutputFormat, quality: u8) -> Result<Vec<u8>, CodecError>;
}

/// Creates one codec per execution context during its init handshake.
pub trait CodecFactory: Send + Sync {
    fn create(&self, base_url: &str) -> Result<Box<dyn Codec>, CodecError>;
}

/// Codec backed by the `image` crate.
///
/// JPEG honours the quality setting; WebP is written losslessly because the
/// pure-Rust encoder has no lossy mode.
#[derive(Debug, Default)]
pub struct ImageCodec {
    /// Size of the last output, used to pre-size the next buffer
    last_output_len: usize,
}

impl Codec for ImageCodec {
    fn decode(&mut self, bytes: &[u8], format: SourceFormat) -> Result<Bitmap, CodecError> {
        let image_format = match format {
            SourceFormat::Jpeg => image::ImageFormat::Jpeg,
            SourceFormat::Png => image::ImageFormat::Png,
            SourceFormat::WebP => image::ImageFormat::WebP,
            SourceFormat::Heic => {
                return Err(CodecError::Decode {
                    format,
                    message: "HEIC must be converted before decoding".to_string(),
                });
            }
        };

        let decoded = image::load_from_memory_with_format(bytes, image_format)
            .map_err(|e| CodecError::Decode { format, message: e.to_string() })?;
        let rgba = decoded.to_rgba8();
        let (width, height) = rgba.dimensions();

        Ok(Bitmap { width, height, rgba: rgba.into_raw() })
    }

    fn encode(&mut self, bitmap: &Bitmap, format: OutputFormat, quality: u8) -> Result<Vec<u8>, CodecError> {
        let mut out = Vec::with_capacity(self.last_output_len.max(bitmap.byte_len() / 8));
        let encode_err = |e: image::ImageError| CodecError::Encode { format, message: e.to_string() };

        match format {
            OutputFormat::Jpeg => {
                // JPEG has no alpha channel
                let rgb: Vec<u8> = bitmap
                    .rgba
                    .chunks_exact(4)
                    .flat_map(|px| [px[0], px[1], px[2]])
                    .collect();
                JpegEncoder::new_with_quality(&mut out, quality)
                    .write_image(&rgb, bitmap.width, bitmap.height, ExtendedColorType::Rgb8)
                    .map_err(encode_err)?;
            }
            OutputFormat::WebP => {
                WebPEncoder::new_lossless(&mut out)
                    .write_image(&bitmap.rgba, bitmap.width, bitmap.height, ExtendedColorType::Rgba8)
                    .map_err(encode_err)?;
            }
        }

        self.last_output_len = out.len();
        Ok(out)
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct ImageCodecFactory;

impl CodecFactory for ImageCodecFactory {
    fn create(&self, _base_url: &str) -> Result<Box<dyn Codec>, CodecError> {
        // Everything is compiled in; there are no resources to fetch.
        Ok(Box::new(ImageCodec::default()))
    }
}

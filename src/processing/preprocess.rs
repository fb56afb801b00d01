//! Coordinator-side input preparation.
//!
//! Runs before a task is built: sniff the format, and hand formats the
//! contexts cannot decode (HEIC/HEIF) to a [`FormatConverter`].

use async_trait::async_trait;
use tracing::debug;

use crate::utils::{CompressorError, CompressorResult, SourceFormat, detect_format};

/// Converts inputs the execution contexts cannot decode into a format they can.
#[async_trait]
pub trait FormatConverter: Send + Sync {
    async fn convert(&self, bytes: Vec<u8>, from: SourceFormat) -> CompressorResult<(Vec<u8>, SourceFormat)>;
}

/// Converter used when no conversion backend is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnavailableConverter;

#[async_trait]
impl FormatConverter for UnavailableConverter {
    async fn convert(&self, _bytes: Vec<u8>, from: SourceFormat) -> CompressorResult<(Vec<u8>, SourceFormat)> {
        Err(CompressorError::preprocessing(format!(
            "No converter available for {}",
            from.mime_type()
        )))
    }
}

/// Input ready for submission.
#[derive(Debug)]
pub struct PreparedInput {
    pub bytes: Vec<u8>,
    pub format: SourceFormat,
}

/// Detects the format of `bytes` and converts it if the pool cannot decode it.
///
/// Unknown formats and converter failures are preprocessing errors.
pub async fn prepare_input(
    bytes: Vec<u8>,
    file_name: &str,
    converter: &dyn FormatConverter,
) -> CompressorResult<PreparedInput> {
    let format = detect_format(&bytes, file_name)
        .map_err(|e| CompressorError::preprocessing(e.to_string()))?;

    if format.is_pool_supported() {
        return Ok(PreparedInput { bytes, format });
    }

    debug!("Converting {} from {}", file_name, format.mime_type());
    let (bytes, format) = match converter.convert(bytes, format).await {
        Ok(converted) => converted,
        Err(CompressorError::Preprocessing(msg)) => return Err(CompressorError::Preprocessing(msg)),
        Err(e) => return Err(CompressorError::preprocessing(e.to_string())),
    };

    if !format.is_pool_supported() {
        return Err(CompressorError::preprocessing(format!(
            "Converter produced unsupported format {}",
            format.mime_type()
        )));
    }
    Ok(PreparedInput { bytes, format })
}

#[cfg(test)]
mod tests {
    use super::*;

    struct ToJpeg;

    #[async_trait]
    impl FormatConverter for ToJpeg {
        async fn convert(&self, _bytes: Vec<u8>, _from: SourceFormat) -> CompressorResult<(Vec<u8>, SourceFormat)> {
            Ok((vec![0xFF, 0xD8, 0xFF, 0xE0], SourceFormat::Jpeg))
        }
    }

    fn heic_bytes() -> Vec<u8> {
        let mut bytes = vec![0, 0, 0, 24];
        bytes.extend_from_slice(b"ftypheic");
        bytes.extend_from_slice(&[0; 12]);
        bytes
    }

    #[tokio::test]
    async fn supported_formats_pass_through() {
        let png = vec![0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0];
        let prepared = prepare_input(png.clone(), "a.png", &UnavailableConverter).await.unwrap();
        assert_eq!(prepared.format, SourceFormat::Png);
        assert_eq!(prepared.bytes, png);
    }

    #[tokio::test]
    async fn heic_goes_through_converter() {
        let prepared = prepare_input(heic_bytes(), "photo.heic", &ToJpeg).await.unwrap();
        assert_eq!(prepared.format, SourceFormat::Jpeg);
    }

    #[tokio::test]
    async fn heic_without_converter_is_preprocessing_error() {
        let err = prepare_input(heic_bytes(), "photo.heic", &UnavailableConverter).await.unwrap_err();
        assert!(matches!(err, CompressorError::Preprocessing(_)));
    }

    #[tokio::test]
    async fn unknown_format_is_preprocessing_error() {
        let err = prepare_input(b"hello".to_vec(), "notes.txt", &UnavailableConverter).await.unwrap_err();
        assert!(matches!(err, CompressorError::Preprocessing(_)));
    }
}

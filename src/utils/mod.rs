pub mod error;
pub mod validation;
pub mod formats;
pub mod fs;

pub use error::{CompressorError, CompressorResult, ValidationError};
pub use validation::{validate_config, validate_settings};
pub use formats::{
    OutputFormat,
    SourceFormat,
    detect_format,
    extract_filename,
    output_file_name,
};

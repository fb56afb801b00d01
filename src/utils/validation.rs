use crate::core::{CompressionSettings, CompressorConfig, MAX_QUALITY, MIN_QUALITY};
use crate::utils::{CompressorError, CompressorResult};

/// Validates user-supplied compression settings
pub fn validate_settings(settings: &CompressionSettings, max_parallelism: usize) -> CompressorResult<()> {
    validate_quality(settings.quality)?;

    if let Some(parallelism) = settings.parallelism {
        if parallelism == 0 {
            return Err(CompressorError::validation("Parallelism cannot be 0"));
        }
        if parallelism > max_parallelism {
            return Err(CompressorError::validation(format!(
                "Parallelism {} exceeds the device maximum of {}",
                parallelism, max_parallelism
            )));
        }
    }

    Ok(())
}

fn validate_quality(quality: u8) -> CompressorResult<()> {
    if !(MIN_QUALITY..=MAX_QUALITY).contains(&quality) {
        return Err(CompressorError::validation(format!(
            "Invalid quality value: {}. Must be between {} and {}",
            quality, MIN_QUALITY, MAX_QUALITY
        )));
    }
    Ok(())
}

/// Validates a loaded configuration
pub fn validate_config(config: &CompressorConfig) -> CompressorResult<()> {
    if config.item_timeout_secs == 0 {
        return Err(CompressorError::config("itemTimeoutSecs must be greater than 0"));
    }
    if config.init_timeout_secs == 0 {
        return Err(CompressorError::config("initTimeoutSecs must be greater than 0"));
    }
    validate_quality(config.default_quality)
        .map_err(|_| CompressorError::config(format!(
            "defaultQuality {} is outside {}-{}",
            config.default_quality, MIN_QUALITY, MAX_QUALITY
        )))?;
    if config.parallelism == Some(0) {
        return Err(CompressorError::config("parallelism cannot be 0"));
    }
    Ok(())
}

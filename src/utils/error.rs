//! Error types for the image compressor.
//!
//! Provides a hierarchy of error types using `thiserror` for ergonomic error handling.

use std::io;
use std::time::Duration;
use thiserror::Error;
use serde::Serialize;

use crate::worker::PoolError;

/// Validation errors for settings and configuration values.
#[derive(Error, Debug, Serialize)]
pub enum ValidationError {
    /// Invalid compression settings
    #[error("Settings error: {0}")]
    Settings(String),
    /// Invalid configuration value
    #[error("Config error: {0}")]
    Config(String),
}

/// Main error type for the compressor.
///
/// Everything that can go wrong for a single item is converted into this type
/// and rendered into the item's error message by the pipeline.
#[derive(Error, Debug, Serialize)]
pub enum CompressorError {
    /// Settings or configuration validation failed
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// An execution context failed its startup handshake
    #[error("Worker initialization failed: {0}")]
    Init(String),

    /// Decode or encode failed inside an execution context
    #[error("Compression failed: {0}")]
    Compression(String),

    /// The item did not finish within the per-item deadline
    #[error("Compression timed out after {}s", .0.as_secs_f32())]
    Timeout(Duration),

    /// Format conversion on the coordinator failed before submission
    #[error("Preprocessing failed: {0}")]
    Preprocessing(String),

    /// Unsupported or unrecognized image format
    #[error("Format error: {0}")]
    Format(String),

    /// File IO error
    #[error("IO error: {0}")]
    IO(String),

    /// An item was asked to move between incompatible states
    #[error("Invalid state transition: {0}")]
    InvalidTransition(String),
}

/// Convenience result type for compressor operations.
pub type CompressorResult<T> = Result<T, CompressorError>;

// Helper methods for error creation
impl CompressorError {
    pub fn init<T: Into<String>>(msg: T) -> Self {
        Self::Init(msg.into())
    }

    pub fn compression<T: Into<String>>(msg: T) -> Self {
        Self::Compression(msg.into())
    }

    pub fn preprocessing<T: Into<String>>(msg: T) -> Self {
        Self::Preprocessing(msg.into())
    }

    pub fn format<T: Into<String>>(msg: T) -> Self {
        Self::Format(msg.into())
    }

    pub fn io<T: Into<String>>(msg: T) -> Self {
        Self::IO(msg.into())
    }

    pub fn validation<T: Into<String>>(msg: T) -> Self {
        Self::Validation(ValidationError::Settings(msg.into()))
    }

    pub fn config<T: Into<String>>(msg: T) -> Self {
        Self::Validation(ValidationError::Config(msg.into()))
    }

    pub fn invalid_transition<T: Into<String>>(msg: T) -> Self {
        Self::InvalidTransition(msg.into())
    }
}

// Convert std::io::Error to CompressorError
impl From<io::Error> for CompressorError {
    fn from(err: io::Error) -> Self {
        Self::IO(err.to_string())
    }
}

impl From<serde_json::Error> for CompressorError {
    fn from(err: serde_json::Error) -> Self {
        Self::config(format!("Invalid JSON: {}", err))
    }
}

// Pool failures surface as init errors when no context could start, and as
// per-item compression errors otherwise.
impl From<PoolError> for CompressorError {
    fn from(err: PoolError) -> Self {
        match err {
            PoolError::Init(msg) => Self::Init(msg),
            other => Self::Compression(other.to_string()),
        }
    }
}

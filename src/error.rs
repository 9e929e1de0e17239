//! # Error Types
//!
//! Custom error types for IMU Bridge using `thiserror`.

use thiserror::Error;

/// Main error type for IMU Bridge
#[derive(Debug, Error)]
pub enum ImuBridgeError {
    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    /// Storage (filesystem) errors
    #[error("Storage error: {0}")]
    Storage(#[from] std::io::Error),

    /// Sample acquisition failures (no sample this cycle)
    #[error("Sample acquisition failed: {0}")]
    Acquisition(String),

    /// Malformed or missing request fields
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// A recording with the given name does not exist
    #[error("Recording not found: {0}")]
    NotFound(String),

    /// JSON encoding errors
    #[error("JSON encoding error: {0}")]
    Encoding(#[from] serde_json::Error),

    /// A recording file whose length is not a whole number of records
    #[error("Corrupt recording: {0}")]
    CorruptRecording(String),
}

/// Result type alias for IMU Bridge
pub type Result<T> = std::result::Result<T, ImuBridgeError>;

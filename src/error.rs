//! # Error Types
//!
//! Custom error types for VBatt Link using `thiserror`.

use std::path::PathBuf;

use thiserror::Error;

/// Main error type for VBatt Link
#[derive(Debug, Error)]
pub enum VbattLinkError {
    /// Wire framing/parsing errors (bad line, wrong field count, overflow)
    #[error("wire format error: {0}")]
    Frame(String),

    /// Raw sensor read failures on the device
    #[error("sensor read error: {0}")]
    Sensor(String),

    /// Durable-storage failures on the host log file
    #[error("log sink error at {path}: {source}")]
    Sink {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for VBatt Link
pub type Result<T> = std::result::Result<T, VbattLinkError>;

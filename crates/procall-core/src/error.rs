//! Error types for driver-level operations

use thiserror::Error;

/// Core error type raised by connections, statements and cursors
#[derive(Error, Debug)]
pub enum ProcallError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Statement error: {0}")]
    Statement(String),

    #[error("Driver error: {0}")]
    Driver(String),

    #[error("Large object error: {0}")]
    LargeObject(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Not supported: {0}")]
    NotSupported(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("{0}")]
    Other(String),
}

/// Result type alias for driver-level operations
pub type Result<T> = std::result::Result<T, ProcallError>;

//! Common error types for wavdeck

use thiserror::Error;

/// Common result type for wavdeck operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types shared by the container codec and configuration layer
#[derive(Error, Debug)]
pub enum Error {
    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Container structure could not be parsed
    #[error("Malformed container: {0}")]
    Malformed(String),

    /// Well-formed container or request using a format we do not handle
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),
}

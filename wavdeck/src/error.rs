//! Error types for wavdeck
//!
//! One variant per failure class an operation can report. Every failure is
//! terminal for the operation it occurs in and is never retried.

use std::path::{Path, PathBuf};
use thiserror::Error;

/// Main error type for wavdeck operations
#[derive(Error, Debug)]
pub enum Error {
    /// Input file (or the directory an output file goes in) does not exist
    #[error("File not found: {}", .0.display())]
    FileNotFound(PathBuf),

    /// WAV header could not be parsed or describes an unsupported encoding
    #[error("Malformed container: {0}")]
    MalformedContainer(String),

    /// Compressed-audio probe, codec or packet failure
    #[error("Decode/playback error: {0}")]
    DecodeOrPlayback(String),

    /// No device accepts the exact requested format
    #[error("Audio device open error: {0}")]
    DeviceOpen(String),

    /// Output stream rejected a chunk (underrun, disconnect, timeout)
    #[error("Audio write error: {0}")]
    Write(String),

    /// Input stream failed mid-capture
    #[error("Audio read error: {0}")]
    Read(String),

    /// Recording could not be written to disk
    #[error("Failed to write {}: {source}", path.display())]
    FileWrite {
        path: PathBuf,
        #[source]
        source: wavdeck_common::Error,
    },

    /// Caller passed a value no operation can run with
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Map a failure to open or parse the WAV file at `path`.
    pub fn from_container(path: &Path, err: wavdeck_common::Error) -> Self {
        match err {
            wavdeck_common::Error::Io(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Error::FileNotFound(path.to_path_buf())
            }
            other => Error::MalformedContainer(format!("{}: {}", path.display(), other)),
        }
    }

    /// Map a failure to create or write the WAV file at `path`.
    pub fn file_write(path: &Path, source: wavdeck_common::Error) -> Self {
        Error::FileWrite {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Convenience Result type using wavdeck Error
pub type Result<T> = std::result::Result<T, Error>;

//! # wavdeck Common Library
//!
//! Shared code for the wavdeck audio utility:
//! - Audio format description and PCM chunk types
//! - Capture length arithmetic (duration to read iterations)
//! - RIFF/WAVE container reader and writer
//! - Configuration loading

pub mod chunk;
pub mod config;
pub mod error;
pub mod format;
pub mod wav;

pub use chunk::{capture_iterations, PcmChunk, RoundingPolicy, DEFAULT_CHUNK_FRAMES};
pub use error::{Error, Result};
pub use format::{AudioFormat, SampleWidth};

//! PCM chunks and capture length arithmetic

use crate::{AudioFormat, Error, Result};
use serde::Deserialize;
use std::time::Duration;

/// Frames moved per read or write call unless configured otherwise.
pub const DEFAULT_CHUNK_FRAMES: usize = 1024;

const NANOS_PER_SECOND: u128 = 1_000_000_000;

/// An immutable run of whole PCM frames.
///
/// Produced by exactly one read, consumed by exactly one write. The final
/// chunk of a file may be shorter than the configured chunk size.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PcmChunk {
    format: AudioFormat,
    bytes: Vec<u8>,
}

impl PcmChunk {
    /// Wrap raw bytes captured or read in `format`.
    ///
    /// # Errors
    /// `Malformed` if `bytes` does not hold a whole number of frames.
    pub fn new(format: AudioFormat, bytes: Vec<u8>) -> Result<Self> {
        if bytes.len() % format.frame_size() != 0 {
            return Err(Error::Malformed(format!(
                "{} bytes is not a whole number of {}-byte frames",
                bytes.len(),
                format.frame_size()
            )));
        }
        Ok(Self { format, bytes })
    }

    pub fn format(&self) -> &AudioFormat {
        &self.format
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn frames(&self) -> usize {
        self.format.frames_in(self.bytes.len())
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// How a capture length that is not a whole number of chunks is rounded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoundingPolicy {
    /// Capture at least the requested duration (one extra partial chunk).
    #[default]
    Ceil,
    /// Capture at most the requested duration (drop the partial chunk).
    Floor,
}

/// Number of chunk reads needed to capture `duration` at `sample_rate`.
///
/// The requested frame count is computed exactly from the duration's
/// nanoseconds (rounded up to a whole frame), then divided by
/// `chunk_frames` under `policy`. At 48 kHz for 5 s with 1024-frame chunks
/// this is 235 reads under `Ceil` and 234 under `Floor`.
pub fn capture_iterations(
    sample_rate: u32,
    duration: Duration,
    chunk_frames: usize,
    policy: RoundingPolicy,
) -> u64 {
    if chunk_frames == 0 {
        return 0;
    }
    let total_frames = (duration.as_nanos() * sample_rate as u128).div_ceil(NANOS_PER_SECOND);
    let chunk = chunk_frames as u128;
    let iterations = match policy {
        RoundingPolicy::Ceil => total_frames.div_ceil(chunk),
        RoundingPolicy::Floor => total_frames / chunk,
    };
    u64::try_from(iterations).unwrap_or(u64::MAX)
}

//! Audio format description
//!
//! An [`AudioFormat`] is the triple every stream and container agrees on:
//! sample width, channel count and sample rate. Capture devices, output
//! devices and WAV headers are all opened with one of these and never
//! negotiate a different one.

use crate::{Error, Result};
use serde::Deserialize;
use std::fmt;

/// Bits per sample for integer PCM.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(try_from = "u16")]
pub enum SampleWidth {
    Bits16,
    Bits24,
    Bits32,
}

impl SampleWidth {
    /// Width in bits.
    pub fn bits(self) -> u16 {
        match self {
            SampleWidth::Bits16 => 16,
            SampleWidth::Bits24 => 24,
            SampleWidth::Bits32 => 32,
        }
    }

    /// Width in bytes of one sample.
    pub fn bytes(self) -> usize {
        self.bits() as usize / 8
    }
}

impl TryFrom<u16> for SampleWidth {
    type Error = Error;

    fn try_from(bits: u16) -> Result<Self> {
        match bits {
            16 => Ok(SampleWidth::Bits16),
            24 => Ok(SampleWidth::Bits24),
            32 => Ok(SampleWidth::Bits32),
            other => Err(Error::UnsupportedFormat(format!(
                "{} bits per sample (supported: 16, 24, 32)",
                other
            ))),
        }
    }
}

impl fmt::Display for SampleWidth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-bit", self.bits())
    }
}

/// Sample layout shared by a capture, its WAV header and any playback of it.
///
/// Samples are signed little-endian integers, interleaved by channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(default)]
pub struct AudioFormat {
    /// Bits per sample
    pub sample_width: SampleWidth,

    /// Interleaved channel count (1 = mono, 2 = stereo)
    pub channels: u16,

    /// Frames per second
    pub sample_rate: u32,
}

impl Default for AudioFormat {
    /// Stereo, 48 kHz, 24-bit.
    fn default() -> Self {
        Self {
            sample_width: SampleWidth::Bits24,
            channels: 2,
            sample_rate: 48_000,
        }
    }
}

impl AudioFormat {
    pub fn new(sample_width: SampleWidth, channels: u16, sample_rate: u32) -> Self {
        Self {
            sample_width,
            channels,
            sample_rate,
        }
    }

    /// Reject formats no device or container can carry.
    pub fn validate(&self) -> Result<()> {
        if self.channels == 0 {
            return Err(Error::UnsupportedFormat("channel count must be positive".to_string()));
        }
        if self.sample_rate == 0 {
            return Err(Error::UnsupportedFormat("sample rate must be positive".to_string()));
        }
        if self.checked_header_sizes().is_none() {
            return Err(Error::UnsupportedFormat(format!(
                "{} channels at {} Hz ({}) exceeds the WAV header size fields",
                self.channels, self.sample_rate, self.sample_width
            )));
        }
        Ok(())
    }

    /// `(block_align, byte_rate)`, or `None` if either overflows its
    /// 16 / 32-bit header field.
    fn checked_header_sizes(&self) -> Option<(u16, u32)> {
        let block_align = self.channels.checked_mul(self.sample_width.bits() / 8)?;
        let byte_rate = self.sample_rate.checked_mul(block_align as u32)?;
        Some((block_align, byte_rate))
    }

    /// Bytes in one frame (one sample for every channel).
    pub fn frame_size(&self) -> usize {
        self.channels as usize * self.sample_width.bytes()
    }

    /// WAV `nBlockAlign`; identical to the frame size for integer PCM.
    ///
    /// Saturates at `u16::MAX` for formats [`AudioFormat::validate`] rejects.
    pub fn block_align(&self) -> u16 {
        self.checked_header_sizes()
            .map_or(u16::MAX, |(block_align, _)| block_align)
    }

    /// WAV `nAvgBytesPerSec`.
    ///
    /// Saturates at `u32::MAX` for formats [`AudioFormat::validate`] rejects.
    pub fn byte_rate(&self) -> u32 {
        self.checked_header_sizes()
            .map_or(u32::MAX, |(_, byte_rate)| byte_rate)
    }

    /// Number of bytes needed for `frames` frames.
    pub fn bytes_for_frames(&self, frames: usize) -> usize {
        frames * self.frame_size()
    }

    /// Number of whole frames in `bytes` bytes.
    pub fn frames_in(&self, bytes: usize) -> usize {
        bytes / self.frame_size()
    }
}

impl fmt::Display for AudioFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} Hz, {} ch, {}",
            self.sample_rate, self.channels, self.sample_width
        )
    }
}

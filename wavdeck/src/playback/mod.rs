//! Playback operations
//!
//! - [`compressed`]: decode a compressed file and play it to completion
//! - [`pcm`]: stream a WAV file to the output device chunk by chunk

pub mod compressed;
pub mod pcm;

pub use compressed::play_compressed;
pub use pcm::play_pcm_file;

use wavdeck_common::AudioFormat;

/// What a finished playback sent to the device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaybackSummary {
    /// Format the output stream was opened with
    pub format: AudioFormat,
    /// Frames written
    pub frames: u64,
    /// Number of device writes
    pub writes: u64,
}

impl PlaybackSummary {
    fn new(format: AudioFormat) -> Self {
        Self {
            format,
            frames: 0,
            writes: 0,
        }
    }

    fn record_write(&mut self, bytes: usize) {
        self.frames += self.format.frames_in(bytes) as u64;
        self.writes += 1;
    }
}

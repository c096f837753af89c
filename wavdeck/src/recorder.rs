//! PCM recorder
//!
//! Captures a fixed duration from the input device in whole chunks and
//! writes the result as a WAV file. The capture length is rounded to a
//! whole number of chunks (see [`capture_iterations`]), so a recording is
//! usually slightly longer than requested.

use crate::audio::{AudioDevice, StreamGuard};
use crate::error::{Error, Result};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, error, info, warn};
use wavdeck_common::config::CaptureConfig;
use wavdeck_common::wav::write_wav;
use wavdeck_common::{capture_iterations, AudioFormat, PcmChunk, RoundingPolicy, DEFAULT_CHUNK_FRAMES};

/// Recorder lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RecorderState {
    #[default]
    Idle,
    /// Validating arguments and opening the input stream
    Opening,
    /// Reading chunks; `remaining` reads left
    Capturing { remaining: u64 },
    /// Input closed, writing the WAV file
    Finalizing,
    Done,
    Failed,
}

impl fmt::Display for RecorderState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecorderState::Idle => write!(f, "idle"),
            RecorderState::Opening => write!(f, "opening"),
            RecorderState::Capturing { remaining } => write!(f, "capturing ({} left)", remaining),
            RecorderState::Finalizing => write!(f, "finalizing"),
            RecorderState::Done => write!(f, "done"),
            RecorderState::Failed => write!(f, "failed"),
        }
    }
}

/// Capture tuning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordingOptions {
    /// Frames per device read
    pub chunk_frames: usize,
    pub rounding: RoundingPolicy,
    /// Write what was captured when the device fails mid-capture
    pub flush_partial: bool,
}

impl Default for RecordingOptions {
    fn default() -> Self {
        Self {
            chunk_frames: DEFAULT_CHUNK_FRAMES,
            rounding: RoundingPolicy::Ceil,
            flush_partial: true,
        }
    }
}

impl From<&CaptureConfig> for RecordingOptions {
    fn from(config: &CaptureConfig) -> Self {
        Self {
            chunk_frames: config.chunk_frames,
            rounding: config.rounding,
            flush_partial: config.flush_partial,
        }
    }
}

/// Result of a finished (or partially flushed) recording.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordingSummary {
    pub path: PathBuf,
    pub format: AudioFormat,
    /// Frames written to the file
    pub frames: u64,
    /// Chunks read from the device
    pub chunks: u64,
    /// False when the capture stopped early and the file holds a partial take
    pub complete: bool,
}

/// Records from one input device.
pub struct Recorder<'d> {
    device: &'d dyn AudioDevice,
    options: RecordingOptions,
    state: RecorderState,
}

impl<'d> Recorder<'d> {
    pub fn new(device: &'d dyn AudioDevice, options: RecordingOptions) -> Self {
        Self {
            device,
            options,
            state: RecorderState::Idle,
        }
    }

    pub fn state(&self) -> RecorderState {
        self.state
    }

    /// Record `duration` of `format` audio into the WAV file at `path`.
    ///
    /// # Errors
    /// - `InvalidArgument` for a zero duration, zero chunk size or invalid
    ///   format
    /// - `FileNotFound` if the directory `path` goes in does not exist
    ///   (checked before the device is opened)
    /// - `DeviceOpen` if the input device rejects the exact format
    /// - `Read` if the device fails mid-capture; the frames captured so far
    ///   are written first when partial flushing is enabled
    /// - `FileWrite` if the WAV file cannot be written
    pub fn record(
        &mut self,
        path: &Path,
        duration: Duration,
        format: AudioFormat,
    ) -> Result<RecordingSummary> {
        self.state = RecorderState::Opening;
        let result = self.run(path, duration, format);
        self.state = match result {
            Ok(_) => RecorderState::Done,
            Err(_) => RecorderState::Failed,
        };
        result
    }

    fn run(
        &mut self,
        path: &Path,
        duration: Duration,
        format: AudioFormat,
    ) -> Result<RecordingSummary> {
        self.validate(path, duration, &format)?;

        let chunk_frames = self.options.chunk_frames;
        let iterations =
            capture_iterations(format.sample_rate, duration, chunk_frames, self.options.rounding);
        info!(
            "Recording {:?} to {} ({})",
            duration,
            path.display(),
            format
        );
        debug!(
            "Capturing {} chunks of {} frames ({} frames)",
            iterations,
            chunk_frames,
            iterations.saturating_mul(chunk_frames as u64)
        );

        let mut input = StreamGuard::new(self.device.open_input(&format, chunk_frames)?);
        let mut chunks: Vec<PcmChunk> = Vec::new();

        for done in 0..iterations {
            self.state = RecorderState::Capturing {
                remaining: iterations - done,
            };
            match input.read(chunk_frames) {
                Ok(chunk) => chunks.push(chunk),
                Err(e) => {
                    error!(
                        "Capture failed after {} of {} chunks: {}",
                        done, iterations, e
                    );
                    drop(input);
                    if self.options.flush_partial && !chunks.is_empty() {
                        self.state = RecorderState::Finalizing;
                        match self.write_file(path, format, &chunks, false) {
                            Ok(summary) => warn!(
                                "Wrote partial recording to {} ({} frames)",
                                path.display(),
                                summary.frames
                            ),
                            Err(write_err) => {
                                error!("Failed to write partial recording: {}", write_err)
                            }
                        }
                    }
                    return Err(e);
                }
            }
        }

        input.close()?;

        self.state = RecorderState::Finalizing;
        let summary = self.write_file(path, format, &chunks, true)?;
        info!(
            "Recording saved to {} ({} frames)",
            path.display(),
            summary.frames
        );
        Ok(summary)
    }

    fn validate(&self, path: &Path, duration: Duration, format: &AudioFormat) -> Result<()> {
        if duration.is_zero() {
            return Err(Error::InvalidArgument(
                "recording duration must be greater than zero".to_string(),
            ));
        }
        if self.options.chunk_frames == 0 {
            return Err(Error::InvalidArgument(
                "chunk_frames must be greater than zero".to_string(),
            ));
        }
        format
            .validate()
            .map_err(|e| Error::InvalidArgument(e.to_string()))?;

        let parent = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        if !parent.is_dir() {
            return Err(Error::FileNotFound(parent.to_path_buf()));
        }
        Ok(())
    }

    fn write_file(
        &self,
        path: &Path,
        format: AudioFormat,
        chunks: &[PcmChunk],
        complete: bool,
    ) -> Result<RecordingSummary> {
        let frames = write_wav(path, format, chunks.iter().map(PcmChunk::as_bytes))
            .map_err(|e| Error::file_write(path, e))?;
        Ok(RecordingSummary {
            path: path.to_path_buf(),
            format,
            frames,
            chunks: chunks.len() as u64,
            complete,
        })
    }
}

/// Record with default options.
pub fn record(
    device: &dyn AudioDevice,
    path: &Path,
    duration: Duration,
    format: AudioFormat,
) -> Result<RecordingSummary> {
    Recorder::new(device, RecordingOptions::default()).record(path, duration, format)
}

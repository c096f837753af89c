//! Audio device abstraction
//!
//! Operations talk to audio hardware only through these traits, so the same
//! chunked read/write loops run against `cpal` in production and against a
//! recording mock in tests.
//!
//! Streams are opened with an exact [`AudioFormat`]; implementations must
//! fail with [`Error::DeviceOpen`](crate::Error::DeviceOpen) rather than
//! negotiate a different one. Callers that can convert their audio ask
//! [`AudioDevice::output_format_for`] first.

use crate::error::Result;
use std::ops::{Deref, DerefMut};
use tracing::warn;
use wavdeck_common::{AudioFormat, PcmChunk};

/// Behavior shared by input and output streams.
pub trait AudioStream {
    /// Format the stream was opened with.
    fn format(&self) -> AudioFormat;

    /// Stop the stream and release the device.
    ///
    /// Must be safe to call more than once.
    fn close(&mut self) -> Result<()>;
}

/// An open capture stream.
pub trait InputStream: AudioStream {
    /// Block until `frames` frames are available and return them.
    fn read(&mut self, frames: usize) -> Result<PcmChunk>;
}

/// An open playback stream.
pub trait OutputStream: AudioStream {
    /// Queue whole frames of PCM in the stream's format, blocking while the
    /// device buffer is full.
    fn write(&mut self, bytes: &[u8]) -> Result<()>;

    /// Block until everything written so far has been played.
    fn drain(&mut self) -> Result<()>;
}

/// Factory for device streams.
pub trait AudioDevice {
    /// Open a capture stream delivering `frames_per_buffer` frames per read.
    fn open_input(
        &self,
        format: &AudioFormat,
        frames_per_buffer: usize,
    ) -> Result<Box<dyn InputStream>>;

    /// Open a playback stream.
    fn open_output(&self, format: &AudioFormat) -> Result<Box<dyn OutputStream>>;

    /// The playback format closest to `preferred` that `open_output` will
    /// accept. Keeps the sample width; the rate and channel count may
    /// differ.
    fn output_format_for(&self, preferred: &AudioFormat) -> Result<AudioFormat>;
}

/// Exclusive owner of an open stream.
///
/// Closing explicitly through [`StreamGuard::close`] reports the close
/// result; a guard dropped on an error path closes the stream itself and
/// logs any close failure, so no exit path leaks a device handle.
pub struct StreamGuard<S: ?Sized + AudioStream> {
    stream: Box<S>,
    closed: bool,
}

impl<S: ?Sized + AudioStream> StreamGuard<S> {
    pub fn new(stream: Box<S>) -> Self {
        Self {
            stream,
            closed: false,
        }
    }

    /// Close the stream, returning any error from the device.
    pub fn close(mut self) -> Result<()> {
        self.closed = true;
        self.stream.close()
    }
}

impl<S: ?Sized + AudioStream> Deref for StreamGuard<S> {
    type Target = S;

    fn deref(&self) -> &S {
        &self.stream
    }
}

impl<S: ?Sized + AudioStream> DerefMut for StreamGuard<S> {
    fn deref_mut(&mut self) -> &mut S {
        &mut self.stream
    }
}

impl<S: ?Sized + AudioStream> Drop for StreamGuard<S> {
    fn drop(&mut self) {
        if !self.closed {
            if let Err(e) = self.stream.close() {
                warn!("Failed to close audio stream during cleanup: {}", e);
            }
        }
    }
}

//! # wavdeck
//!
//! Minimal audio I/O: play a compressed file, stream a WAV file to the
//! output device, and record from the microphone into a WAV file.
//!
//! **Architecture:** blocking, single-threaded operations over the
//! [`audio::AudioDevice`] traits; `cpal` device streams fed through a
//! lock-free ring buffer, `symphonia` for compressed decoding, and the
//! WAV codec in `wavdeck-common`.

pub mod audio;
pub mod error;
pub mod playback;
pub mod recorder;
pub mod session;

pub use error::{Error, Result};

//! Audio device access and decoding
//!
//! - [`device`]: stream traits and the closing guard
//! - [`host`], [`input`], [`output`]: the cpal implementation
//! - [`decoder`]: compressed-file decoding via symphonia
//! - [`resample`]: rate and channel conversion for decoded audio

pub mod decoder;
pub mod device;
pub mod host;
pub mod input;
pub mod output;
pub mod resample;
pub mod samples;

pub use decoder::DecoderEngine;
pub use device::{AudioDevice, AudioStream, InputStream, OutputStream, StreamGuard};
pub use host::{CpalDevice, DeviceList};
pub use resample::FormatConverter;

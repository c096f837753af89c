//! Test helper modules for wavdeck integration tests
//!
//! - MockDevice: in-memory `AudioDevice` that records every call
//! - audio_generator: deterministic WAV fixtures written with hound

#![allow(dead_code, unused_imports)]

pub mod audio_generator;
pub mod mock_device;

pub use audio_generator::{generate_sine_wav, generate_silent_wav, wav_payload};
pub use mock_device::{MockDevice, MockLog};

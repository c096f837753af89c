//! WAV fixture generation
//!
//! Fixtures are written with hound, independently of the crate's own WAV
//! writer, so playback tests also check the reader against a second
//! implementation.

use hound::{SampleFormat, WavSpec, WavWriter};
use std::f32::consts::PI;
use std::path::Path;

/// 16-bit stereo sine wave, `frames` frames long.
pub fn generate_sine_wav<P: AsRef<Path>>(
    path: P,
    sample_rate: u32,
    frames: u32,
    frequency_hz: f32,
) -> Result<(), hound::Error> {
    let spec = WavSpec {
        channels: 2,
        sample_rate,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };
    let mut writer = WavWriter::create(path, spec)?;
    for n in 0..frames {
        let t = n as f32 / sample_rate as f32;
        let value = ((2.0 * PI * frequency_hz * t).sin() * 0.5 * i16::MAX as f32) as i16;
        writer.write_sample(value)?;
        writer.write_sample(value)?;
    }
    writer.finalize()
}

/// Silent WAV with an arbitrary spec.
pub fn generate_silent_wav<P: AsRef<Path>>(
    path: P,
    spec: WavSpec,
    frames: u32,
) -> Result<(), hound::Error> {
    let mut writer = WavWriter::create(path, spec)?;
    for _ in 0..frames * spec.channels as u32 {
        match spec.bits_per_sample {
            16 => writer.write_sample(0i16)?,
            _ => writer.write_sample(0i32)?,
        }
    }
    writer.finalize()
}

/// The `data` payload of a 16-bit file as little-endian bytes, read back
/// through hound.
pub fn wav_payload<P: AsRef<Path>>(path: P) -> Vec<u8> {
    let mut reader = hound::WavReader::open(path).unwrap();
    assert_eq!(reader.spec().bits_per_sample, 16);
    reader
        .samples::<i16>()
        .map(|s| s.unwrap())
        .flat_map(|s| s.to_le_bytes())
        .collect()
}

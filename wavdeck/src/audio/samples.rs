//! Conversion between packed PCM bytes and device sample values
//!
//! Between the caller and the real-time callback every sample travels as a
//! full-scale `i32`: 16-bit samples occupy the upper two bytes and 24-bit
//! samples the upper three. The device stream itself may run as `i16`,
//! `i32` or `f32`; the transport type is chosen per device and is not part
//! of the [`AudioFormat`](wavdeck_common::AudioFormat), so a 16-bit file
//! plays unchanged on a float-only device.

use cpal::SampleFormat;
use wavdeck_common::SampleWidth;

/// 2^31, the magnitude of `i32::MIN`.
const FULL_SCALE: f32 = 2_147_483_648.0;

/// Sample types device streams are driven with.
pub trait DeviceSample: cpal::SizedSample + Send + 'static {
    fn from_device(value: i32) -> Self;
    fn to_device(self) -> i32;
}

impl DeviceSample for i16 {
    fn from_device(value: i32) -> Self {
        (value >> 16) as i16
    }

    fn to_device(self) -> i32 {
        (self as i32) << 16
    }
}

impl DeviceSample for i32 {
    fn from_device(value: i32) -> Self {
        value
    }

    fn to_device(self) -> i32 {
        self
    }
}

impl DeviceSample for f32 {
    fn from_device(value: i32) -> Self {
        value as f32 / FULL_SCALE
    }

    fn to_device(self) -> i32 {
        // Float-to-int `as` saturates, so +1.0 maps to i32::MAX
        (self * FULL_SCALE) as i32
    }
}

/// Stream sample types usable for `width`, most preferred first.
///
/// `I16` is offered only for 16-bit audio. `F32` is exact up to 24 bits.
pub fn transport_formats(width: SampleWidth) -> &'static [SampleFormat] {
    match width {
        SampleWidth::Bits16 => &[SampleFormat::I16, SampleFormat::F32, SampleFormat::I32],
        SampleWidth::Bits24 | SampleWidth::Bits32 => &[SampleFormat::I32, SampleFormat::F32],
    }
}

/// Unpack little-endian PCM into full-scale device values, appending to
/// `out`.
///
/// Trailing bytes that do not form a whole sample are ignored; callers
/// validate frame alignment first.
pub fn unpack(width: SampleWidth, bytes: &[u8], out: &mut Vec<i32>) {
    out.reserve(bytes.len() / width.bytes());
    match width {
        SampleWidth::Bits16 => out.extend(
            bytes
                .chunks_exact(2)
                .map(|b| i32::from_le_bytes([0, 0, b[0], b[1]])),
        ),
        SampleWidth::Bits24 => out.extend(
            bytes
                .chunks_exact(3)
                .map(|b| i32::from_le_bytes([0, b[0], b[1], b[2]])),
        ),
        SampleWidth::Bits32 => out.extend(
            bytes
                .chunks_exact(4)
                .map(|b| i32::from_le_bytes([b[0], b[1], b[2], b[3]])),
        ),
    }
}

/// Pack full-scale device values into little-endian PCM, appending to `out`.
pub fn pack(width: SampleWidth, samples: &[i32], out: &mut Vec<u8>) {
    out.reserve(samples.len() * width.bytes());
    for &sample in samples {
        let b = sample.to_le_bytes();
        match width {
            SampleWidth::Bits16 => out.extend_from_slice(&[b[2], b[3]]),
            SampleWidth::Bits24 => out.extend_from_slice(&[b[1], b[2], b[3]]),
            SampleWidth::Bits32 => out.extend_from_slice(&b),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_24bit_occupies_upper_bytes() {
        let mut values = Vec::new();
        // 0x7FFFFF (max) and 0x800000 (min) and -1
        unpack(
            SampleWidth::Bits24,
            &[0xFF, 0xFF, 0x7F, 0x00, 0x00, 0x80, 0xFF, 0xFF, 0xFF],
            &mut values,
        );
        assert_eq!(values, vec![0x7FFF_FF00, i32::MIN, -256]);

        let mut bytes = Vec::new();
        pack(SampleWidth::Bits24, &values, &mut bytes);
        assert_eq!(bytes, vec![0xFF, 0xFF, 0x7F, 0x00, 0x00, 0x80, 0xFF, 0xFF, 0xFF]);
    }

    #[test]
    fn test_16bit_occupies_upper_bytes() {
        let mut values = Vec::new();
        unpack(SampleWidth::Bits16, &[0x00, 0x80, 0xFF, 0x7F, 0x01, 0x00], &mut values);
        assert_eq!(values, vec![i32::MIN, 0x7FFF_0000, 0x0001_0000]);

        let mut bytes = Vec::new();
        pack(SampleWidth::Bits16, &values, &mut bytes);
        assert_eq!(bytes, vec![0x00, 0x80, 0xFF, 0x7F, 0x01, 0x00]);
    }

    #[test]
    fn test_32bit_passes_through() {
        let input: Vec<u8> = [i32::MIN, 0, 123_456_789]
            .iter()
            .flat_map(|s| s.to_le_bytes())
            .collect();
        let mut values = Vec::new();
        unpack(SampleWidth::Bits32, &input, &mut values);
        assert_eq!(values, vec![i32::MIN, 0, 123_456_789]);

        let mut bytes = Vec::new();
        pack(SampleWidth::Bits32, &values, &mut bytes);
        assert_eq!(bytes, input);
    }

    #[test]
    fn test_i16_transport_is_lossless_for_16bit() {
        for sample in [i16::MIN, -1, 0, 1, i16::MAX] {
            assert_eq!(i16::from_device(sample.to_device()), sample);
        }
    }

    #[test]
    fn test_f32_transport() {
        assert_eq!(f32::from_device(i32::MIN), -1.0);
        assert_eq!(f32::from_device(0), 0.0);
        assert_eq!(1.0f32.to_device(), i32::MAX);
        assert_eq!((-1.0f32).to_device(), i32::MIN);

        // 24-bit values survive the float round trip exactly
        for sample in [0x7FFF_FF00, -256, 0x0012_3400, i32::MIN] {
            assert_eq!(f32::from_device(sample).to_device(), sample);
        }
    }

    #[test]
    fn test_transport_preference() {
        assert_eq!(transport_formats(SampleWidth::Bits16)[0], SampleFormat::I16);
        assert_eq!(transport_formats(SampleWidth::Bits24)[0], SampleFormat::I32);
        for width in [SampleWidth::Bits16, SampleWidth::Bits24, SampleWidth::Bits32] {
            assert!(transport_formats(width).contains(&SampleFormat::F32));
        }
        assert!(!transport_formats(SampleWidth::Bits24).contains(&SampleFormat::I16));
    }
}

//! Sample rate and channel conversion using rubato
//!
//! Used by the decoder-backed player when the output device cannot run at
//! the decoded file's rate or channel count. Blocks are remixed to the
//! output channel count first, then resampled in fixed input chunks.

use crate::audio::samples::{pack, unpack, DeviceSample};
use crate::error::{Error, Result};
use rubato::{FastFixedIn, PolynomialDegree, Resampler};
use tracing::debug;
use wavdeck_common::AudioFormat;

/// Input frames per resampler call
const RESAMPLE_CHUNK_FRAMES: usize = 1024;

/// Streaming converter from one PCM format to another.
pub struct FormatConverter {
    input: AudioFormat,
    output: AudioFormat,
    resampler: Option<FastFixedIn<f32>>,
    /// Remixed planar samples waiting for a full resampler chunk
    pending: Vec<Vec<f32>>,
    /// Output frames still to discard for the resampler's delay
    delay: usize,
    frames_in: u64,
    frames_out: u64,
}

impl FormatConverter {
    pub fn new(input: AudioFormat, output: AudioFormat) -> Result<Self> {
        let resampler = if input.sample_rate == output.sample_rate {
            None
        } else {
            debug!(
                "Resampling from {}Hz to {}Hz ({} channels)",
                input.sample_rate, output.sample_rate, output.channels
            );
            let resampler = FastFixedIn::<f32>::new(
                output.sample_rate as f64 / input.sample_rate as f64,
                1.0,
                PolynomialDegree::Septic,
                RESAMPLE_CHUNK_FRAMES,
                output.channels as usize,
            )
            .map_err(|e| Error::DecodeOrPlayback(format!("Failed to create resampler: {}", e)))?;
            Some(resampler)
        };
        let delay = resampler.as_ref().map_or(0, |r| r.output_delay());

        Ok(Self {
            input,
            output,
            resampler,
            pending: vec![Vec::new(); output.channels as usize],
            delay,
            frames_in: 0,
            frames_out: 0,
        })
    }

    /// True when blocks pass through unchanged.
    pub fn is_passthrough(&self) -> bool {
        self.input == self.output
    }

    /// Convert a block of whole input frames, returning whatever output is
    /// ready. Some output is held back until [`finish`](Self::finish).
    pub fn convert(&mut self, bytes: &[u8]) -> Result<Vec<u8>> {
        if self.is_passthrough() {
            return Ok(bytes.to_vec());
        }

        let mut samples = Vec::new();
        unpack(self.input.sample_width, bytes, &mut samples);
        let in_channels = self.input.channels as usize;
        let frames: Vec<f32> = samples.into_iter().map(f32::from_device).collect();
        for frame in frames.chunks_exact(in_channels) {
            remix_frame(frame, &mut self.pending);
        }
        self.frames_in += (frames.len() / in_channels) as u64;

        if self.resampler.is_none() {
            let planar = std::mem::replace(
                &mut self.pending,
                vec![Vec::new(); self.output.channels as usize],
            );
            return Ok(self.emit(planar, None));
        }
        let Some(resampler) = self.resampler.as_mut() else {
            return Ok(Vec::new());
        };

        let mut planar_out: Vec<Vec<f32>> = vec![Vec::new(); self.output.channels as usize];
        while self.pending[0].len() >= resampler.input_frames_next() {
            let needed = resampler.input_frames_next();
            let chunk: Vec<Vec<f32>> = self
                .pending
                .iter_mut()
                .map(|channel| channel.drain(..needed).collect())
                .collect();
            let processed = resampler
                .process(&chunk, None)
                .map_err(|e| Error::DecodeOrPlayback(format!("Resampling failed: {}", e)))?;
            for (out, channel) in planar_out.iter_mut().zip(processed) {
                out.extend(channel);
            }
        }
        Ok(self.emit(planar_out, None))
    }

    /// Flush the resampler. The total output is the input length scaled by
    /// the rate ratio, rounded to the nearest frame.
    pub fn finish(&mut self) -> Result<Vec<u8>> {
        if self.is_passthrough() {
            return Ok(Vec::new());
        }
        let Some(resampler) = self.resampler.as_mut() else {
            return Ok(Vec::new());
        };

        let expected = (self.frames_in as f64 * self.output.sample_rate as f64
            / self.input.sample_rate as f64)
            .round() as u64;
        let channels = self.output.channels as usize;
        let mut planar_out: Vec<Vec<f32>> = vec![Vec::new(); channels];

        let remainder = std::mem::replace(&mut self.pending, vec![Vec::new(); channels]);
        if !remainder[0].is_empty() {
            let processed = resampler
                .process_partial(Some(remainder.as_slice()), None)
                .map_err(|e| Error::DecodeOrPlayback(format!("Resampling failed: {}", e)))?;
            for (out, channel) in planar_out.iter_mut().zip(processed) {
                out.extend(channel);
            }
        }

        let mut available = planar_out[0].len().saturating_sub(self.delay) as u64;
        while self.frames_out + available < expected {
            let processed = resampler
                .process_partial(None::<&[Vec<f32>]>, None)
                .map_err(|e| Error::DecodeOrPlayback(format!("Resampling failed: {}", e)))?;
            if processed.first().map_or(true, Vec::is_empty) {
                break;
            }
            for (out, channel) in planar_out.iter_mut().zip(processed) {
                out.extend(channel);
            }
            available = planar_out[0].len().saturating_sub(self.delay) as u64;
        }

        debug!(
            "Converted {} input frames to {} output frames",
            self.frames_in, expected
        );
        Ok(self.emit(planar_out, Some(expected)))
    }

    /// Drop the resampler delay, interleave and pack to the output width,
    /// stopping once `limit` total output frames have been produced.
    fn emit(&mut self, planar: Vec<Vec<f32>>, limit: Option<u64>) -> Vec<u8> {
        let available = planar.first().map_or(0, Vec::len);
        let skip = self.delay.min(available);
        self.delay -= skip;

        let mut frames = available - skip;
        if let Some(limit) = limit {
            frames = frames.min(limit.saturating_sub(self.frames_out) as usize);
        }
        self.frames_out += frames as u64;

        let mut samples = Vec::with_capacity(frames * planar.len());
        for frame in skip..skip + frames {
            samples.extend(planar.iter().map(|channel| channel[frame].to_device()));
        }
        let mut bytes = Vec::new();
        pack(self.output.sample_width, &samples, &mut bytes);
        bytes
    }
}

/// Map one interleaved input frame onto the output channels.
///
/// Mono is copied to every output channel and downmixing to mono averages
/// the input channels; otherwise output channel `c` takes input channel
/// `c % inputs`.
fn remix_frame(frame: &[f32], planar: &mut [Vec<f32>]) {
    let inputs = frame.len();
    let outputs = planar.len();
    if outputs == 1 && inputs > 1 {
        planar[0].push(frame.iter().sum::<f32>() / inputs as f32);
        return;
    }
    for (c, channel) in planar.iter_mut().enumerate() {
        channel.push(frame[c % inputs]);
    }
}

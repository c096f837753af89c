//! Audio output using cpal
//!
//! Writes from the caller go into a ring buffer; the real-time callback
//! drains it and plays silence when it runs dry. Stream errors reported by
//! cpal set a flag that fails the next write.

use crate::audio::device::{AudioStream, OutputStream};
use crate::audio::samples::{unpack, DeviceSample};
use crate::error::{Error, Result};
use cpal::traits::{DeviceTrait, StreamTrait};
use cpal::{Device, SampleFormat, Stream, StreamConfig};
use ringbuf::traits::{Consumer, Observer, Producer, Split};
use ringbuf::{HeapCons, HeapProd, HeapRb};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, error, info};
use wavdeck_common::AudioFormat;

/// Time allowed for the device's own buffer to play out after the ring
/// buffer empties.
const DRAIN_TAIL: Duration = Duration::from_millis(50);

/// Playback stream on a cpal output device.
pub struct CpalOutput {
    stream: Option<Stream>,
    producer: HeapProd<i32>,
    format: AudioFormat,
    /// Set by the stream error callback
    error_flag: Arc<AtomicBool>,
    timeout: Duration,
    poll_interval: Duration,
}

impl CpalOutput {
    /// Build and start an output stream driven with `sample_format`
    /// samples.
    ///
    /// The ring buffer holds roughly 250 ms of audio, and never less than
    /// 1024 frames.
    pub fn open(
        device: &Device,
        config: &StreamConfig,
        sample_format: SampleFormat,
        format: AudioFormat,
        timeout: Duration,
        poll_interval: Duration,
    ) -> Result<Self> {
        let channels = format.channels as usize;
        let capacity = (format.sample_rate as usize * channels / 4).max(1024 * channels);
        let (producer, consumer) = HeapRb::<i32>::new(capacity).split();
        let error_flag = Arc::new(AtomicBool::new(false));

        let stream = match sample_format {
            SampleFormat::I16 => {
                build_stream::<i16>(device, config, consumer, Arc::clone(&error_flag))?
            }
            SampleFormat::I32 => {
                build_stream::<i32>(device, config, consumer, Arc::clone(&error_flag))?
            }
            SampleFormat::F32 => {
                build_stream::<f32>(device, config, consumer, Arc::clone(&error_flag))?
            }
            sample_format => {
                return Err(Error::DeviceOpen(format!(
                    "Unsupported sample format: {:?}",
                    sample_format
                )));
            }
        };

        stream
            .play()
            .map_err(|e| Error::DeviceOpen(format!("Failed to start stream: {}", e)))?;

        info!("Output stream started: {} ({:?} samples)", format, sample_format);
        Ok(Self {
            stream: Some(stream),
            producer,
            format,
            error_flag,
            timeout,
            poll_interval,
        })
    }

    fn check_error(&self) -> Result<()> {
        if self.error_flag.load(Ordering::SeqCst) {
            return Err(Error::Write("output stream reported an error".to_string()));
        }
        Ok(())
    }
}

fn build_stream<T: DeviceSample>(
    device: &Device,
    config: &StreamConfig,
    mut consumer: HeapCons<i32>,
    error_flag: Arc<AtomicBool>,
) -> Result<Stream> {
    device
        .build_output_stream(
            config,
            move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                for sample in data.iter_mut() {
                    *sample = consumer
                        .try_pop()
                        .map(T::from_device)
                        .unwrap_or(T::EQUILIBRIUM);
                }
            },
            move |err| {
                error!("Audio output stream error: {}", err);
                error_flag.store(true, Ordering::SeqCst);
            },
            None,
        )
        .map_err(|e| Error::DeviceOpen(format!("Failed to build output stream: {}", e)))
}

impl AudioStream for CpalOutput {
    fn format(&self) -> AudioFormat {
        self.format
    }

    fn close(&mut self) -> Result<()> {
        if let Some(stream) = self.stream.take() {
            debug!("Stopping output stream");
            stream
                .pause()
                .map_err(|e| Error::Write(format!("Failed to pause stream: {}", e)))?;
        }
        Ok(())
    }
}

impl OutputStream for CpalOutput {
    fn write(&mut self, bytes: &[u8]) -> Result<()> {
        if self.stream.is_none() {
            return Err(Error::Write("output stream is closed".to_string()));
        }
        if bytes.len() % self.format.frame_size() != 0 {
            return Err(Error::Write(format!(
                "{} bytes is not a whole number of {}-byte frames",
                bytes.len(),
                self.format.frame_size()
            )));
        }

        let mut samples = Vec::new();
        unpack(self.format.sample_width, bytes, &mut samples);

        let mut pending = samples.as_slice();
        let mut last_progress = Instant::now();
        while !pending.is_empty() {
            self.check_error()?;
            let pushed = self.producer.push_slice(pending);
            if pushed > 0 {
                pending = &pending[pushed..];
                last_progress = Instant::now();
            } else if last_progress.elapsed() >= self.timeout {
                return Err(Error::Write(format!(
                    "device stopped consuming samples for {:?}",
                    self.timeout
                )));
            } else {
                thread::sleep(self.poll_interval);
            }
        }
        Ok(())
    }

    fn drain(&mut self) -> Result<()> {
        if self.stream.is_none() {
            return Ok(());
        }

        let buffered_frames = self.producer.occupied_len() / self.format.channels as usize;
        let expected =
            Duration::from_secs_f64(buffered_frames as f64 / self.format.sample_rate as f64);
        let deadline = Instant::now() + expected + self.timeout;
        debug!("Draining {} buffered frames", buffered_frames);

        while !self.producer.is_empty() {
            self.check_error()?;
            if Instant::now() >= deadline {
                return Err(Error::Write(
                    "timed out waiting for playback to finish".to_string(),
                ));
            }
            thread::sleep(self.poll_interval);
        }
        thread::sleep(DRAIN_TAIL);
        self.check_error()
    }
}

impl Drop for CpalOutput {
    fn drop(&mut self) {
        // Ensure stream is stopped on drop
        let _ = self.close();
    }
}

//! Audio capture using cpal
//!
//! The real-time callback pushes device samples into a ring buffer; `read`
//! blocks until a whole chunk is available. Samples that arrive while the
//! ring is full are dropped and reported as an overrun.

use crate::audio::device::{AudioStream, InputStream};
use crate::audio::samples::{pack, DeviceSample};
use crate::error::{Error, Result};
use cpal::traits::{DeviceTrait, StreamTrait};
use cpal::{Device, SampleFormat, Stream, StreamConfig};
use ringbuf::traits::{Consumer, Observer, Producer, Split};
use ringbuf::{HeapCons, HeapProd, HeapRb};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};
use wavdeck_common::{AudioFormat, PcmChunk};

/// Capture stream on a cpal input device.
pub struct CpalInput {
    stream: Option<Stream>,
    consumer: HeapCons<i32>,
    format: AudioFormat,
    error_flag: Arc<AtomicBool>,
    /// Samples dropped by the callback because the ring was full
    overruns: Arc<AtomicU64>,
    reported_overruns: u64,
    timeout: Duration,
    poll_interval: Duration,
}

impl CpalInput {
    /// Build and start a capture stream driven with `sample_format`
    /// samples.
    ///
    /// The ring buffer holds one second of audio, and at least four reads
    /// of `frames_per_buffer` frames.
    pub fn open(
        device: &Device,
        config: &StreamConfig,
        sample_format: SampleFormat,
        format: AudioFormat,
        frames_per_buffer: usize,
        timeout: Duration,
        poll_interval: Duration,
    ) -> Result<Self> {
        let channels = format.channels as usize;
        let capacity = (format.sample_rate as usize * channels).max(4 * frames_per_buffer * channels);
        let (producer, consumer) = HeapRb::<i32>::new(capacity).split();
        let error_flag = Arc::new(AtomicBool::new(false));
        let overruns = Arc::new(AtomicU64::new(0));

        let stream = match sample_format {
            SampleFormat::I16 => build_stream::<i16>(
                device,
                config,
                producer,
                Arc::clone(&error_flag),
                Arc::clone(&overruns),
            )?,
            SampleFormat::I32 => build_stream::<i32>(
                device,
                config,
                producer,
                Arc::clone(&error_flag),
                Arc::clone(&overruns),
            )?,
            SampleFormat::F32 => build_stream::<f32>(
                device,
                config,
                producer,
                Arc::clone(&error_flag),
                Arc::clone(&overruns),
            )?,
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

        info!("Input stream started: {} ({:?} samples)", format, sample_format);
        Ok(Self {
            stream: Some(stream),
            consumer,
            format,
            error_flag,
            overruns,
            reported_overruns: 0,
            timeout,
            poll_interval,
        })
    }

    fn report_overruns(&mut self) {
        let total = self.overruns.load(Ordering::Relaxed);
        if total > self.reported_overruns {
            warn!(
                "Input overrun: {} samples dropped",
                total - self.reported_overruns
            );
            self.reported_overruns = total;
        }
    }
}

fn build_stream<T: DeviceSample>(
    device: &Device,
    config: &StreamConfig,
    mut producer: HeapProd<i32>,
    error_flag: Arc<AtomicBool>,
    overruns: Arc<AtomicU64>,
) -> Result<Stream> {
    device
        .build_input_stream(
            config,
            move |data: &[T], _: &cpal::InputCallbackInfo| {
                let mut dropped = 0u64;
                for &sample in data {
                    if producer.try_push(sample.to_device()).is_err() {
                        dropped += 1;
                    }
                }
                if dropped > 0 {
                    overruns.fetch_add(dropped, Ordering::Relaxed);
                }
            },
            move |err| {
                error!("Audio input stream error: {}", err);
                error_flag.store(true, Ordering::SeqCst);
            },
            None,
        )
        .map_err(|e| Error::DeviceOpen(format!("Failed to build input stream: {}", e)))
}

impl AudioStream for CpalInput {
    fn format(&self) -> AudioFormat {
        self.format
    }

    fn close(&mut self) -> Result<()> {
        if let Some(stream) = self.stream.take() {
            debug!("Stopping input stream");
            stream
                .pause()
                .map_err(|e| Error::Read(format!("Failed to pause stream: {}", e)))?;
        }
        Ok(())
    }
}

impl InputStream for CpalInput {
    fn read(&mut self, frames: usize) -> Result<PcmChunk> {
        if self.stream.is_none() {
            return Err(Error::Read("input stream is closed".to_string()));
        }
        let needed = frames * self.format.channels as usize;
        if needed > self.consumer.capacity().get() {
            return Err(Error::Read(format!(
                "read of {} frames exceeds the capture buffer",
                frames
            )));
        }

        let expected = Duration::from_secs_f64(frames as f64 / self.format.sample_rate as f64);
        let deadline = Instant::now() + expected + self.timeout;
        while self.consumer.occupied_len() < needed {
            if self.error_flag.load(Ordering::SeqCst) {
                return Err(Error::Read("input stream reported an error".to_string()));
            }
            if Instant::now() >= deadline {
                return Err(Error::Read(format!(
                    "input device delivered no audio within {:?}",
                    expected + self.timeout
                )));
            }
            thread::sleep(self.poll_interval);
        }

        let mut samples = vec![0i32; needed];
        let popped = self.consumer.pop_slice(&mut samples);
        samples.truncate(popped);
        self.report_overruns();

        let mut bytes = Vec::new();
        pack(self.format.sample_width, &samples, &mut bytes);
        PcmChunk::new(self.format, bytes).map_err(|e| Error::Read(e.to_string()))
    }
}

impl Drop for CpalInput {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

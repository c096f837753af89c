//! cpal-backed [`AudioDevice`]
//!
//! Selects a host and devices by name (falling back to the defaults), finds
//! a supported configuration that matches the requested format exactly,
//! and hands the opened stream to [`CpalInput`] or [`CpalOutput`].

use crate::audio::device::{AudioDevice, InputStream, OutputStream};
use crate::audio::input::CpalInput;
use crate::audio::output::CpalOutput;
use crate::audio::samples::transport_formats;
use crate::error::{Error, Result};
use cpal::traits::{DeviceTrait, HostTrait};
use cpal::{
    Device, Host, SampleFormat, SampleRate, StreamConfig, SupportedBufferSize,
    SupportedStreamConfigRange,
};
use std::time::Duration;
use tracing::{debug, info, warn};
use wavdeck_common::config::DeviceConfig;
use wavdeck_common::AudioFormat;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Input,
    Output,
}

impl Direction {
    fn label(self) -> &'static str {
        match self {
            Direction::Input => "input",
            Direction::Output => "output",
        }
    }
}

/// Names of the devices the selected host exposes.
#[derive(Debug, Clone, Default)]
pub struct DeviceList {
    pub host: String,
    pub inputs: Vec<String>,
    pub outputs: Vec<String>,
}

/// Audio hardware reached through cpal.
pub struct CpalDevice {
    host: Host,
    input_device: Option<String>,
    output_device: Option<String>,
    timeout: Duration,
    poll_interval: Duration,
}

impl CpalDevice {
    /// Select the audio host named in `config`, or the platform default.
    ///
    /// # Errors
    /// `DeviceOpen` if a host is named but not available.
    pub fn new(config: &DeviceConfig) -> Result<Self> {
        let host = match config.host.as_deref() {
            Some(name) => {
                let id = cpal::available_hosts()
                    .into_iter()
                    .find(|id| id.name().eq_ignore_ascii_case(name))
                    .ok_or_else(|| {
                        Error::DeviceOpen(format!("Audio host '{}' is not available", name))
                    })?;
                cpal::host_from_id(id).map_err(|e| {
                    Error::DeviceOpen(format!("Failed to initialize host '{}': {}", name, e))
                })?
            }
            None => cpal::default_host(),
        };
        debug!("Using audio host: {}", host.id().name());

        Ok(Self {
            host,
            input_device: config.input_device.clone(),
            output_device: config.output_device.clone(),
            timeout: config.timeout(),
            poll_interval: config.poll_interval(),
        })
    }

    /// List input and output device names on the selected host.
    pub fn list_devices(&self) -> Result<DeviceList> {
        let inputs = self
            .host
            .input_devices()
            .map_err(|e| Error::DeviceOpen(format!("Failed to enumerate devices: {}", e)))?
            .filter_map(|device| device.name().ok())
            .collect();
        let outputs = self
            .host
            .output_devices()
            .map_err(|e| Error::DeviceOpen(format!("Failed to enumerate devices: {}", e)))?
            .filter_map(|device| device.name().ok())
            .collect();

        Ok(DeviceList {
            host: self.host.id().name().to_string(),
            inputs,
            outputs,
        })
    }

    fn find_device(&self, direction: Direction) -> Result<Device> {
        let requested = match direction {
            Direction::Input => self.input_device.as_deref(),
            Direction::Output => self.output_device.as_deref(),
        };

        if let Some(name) = requested {
            let devices: Vec<Device> = match direction {
                Direction::Input => self.host.input_devices().map(|d| d.collect()),
                Direction::Output => self.host.output_devices().map(|d| d.collect()),
            }
            .map_err(|e| Error::DeviceOpen(format!("Failed to enumerate devices: {}", e)))?;

            if let Some(device) = devices
                .into_iter()
                .find(|d| d.name().ok().as_deref() == Some(name))
            {
                info!("Found requested {} device: {}", direction.label(), name);
                return Ok(device);
            }
            warn!(
                "Requested {} device '{}' not found, falling back to default device",
                direction.label(),
                name
            );
        }

        let device = match direction {
            Direction::Input => self.host.default_input_device(),
            Direction::Output => self.host.default_output_device(),
        }
        .ok_or_else(|| {
            Error::DeviceOpen(format!("No default {} device found", direction.label()))
        })?;

        debug!(
            "Using default {} device: {}",
            direction.label(),
            device.name().unwrap_or_else(|_| "Unknown".to_string())
        );
        Ok(device)
    }

    fn supported_ranges(
        &self,
        device: &Device,
        direction: Direction,
    ) -> Result<Vec<SupportedStreamConfigRange>> {
        match direction {
            Direction::Input => device.supported_input_configs().map(|c| c.collect()),
            Direction::Output => device.supported_output_configs().map(|c| c.collect()),
        }
        .map_err(|e| Error::DeviceOpen(format!("Failed to get device configs: {}", e)))
    }

    fn exact_config(
        &self,
        device: &Device,
        direction: Direction,
        format: &AudioFormat,
        frames_per_buffer: Option<usize>,
    ) -> Result<(StreamConfig, SampleFormat)> {
        let ranges = self.supported_ranges(device, direction)?;
        match_config(&ranges, format, frames_per_buffer).ok_or_else(|| {
            Error::DeviceOpen(format!(
                "{} device '{}' does not support {}",
                direction.label(),
                device.name().unwrap_or_else(|_| "Unknown".to_string()),
                format
            ))
        })
    }
}

/// Pick the supported range matching `format` exactly, trying stream
/// sample types in [`transport_formats`] order.
///
/// A fixed buffer size is requested only when the range reports it as
/// supported; otherwise the device default applies.
fn match_config(
    ranges: &[SupportedStreamConfigRange],
    format: &AudioFormat,
    frames_per_buffer: Option<usize>,
) -> Option<(StreamConfig, SampleFormat)> {
    let range = transport_formats(format.sample_width)
        .iter()
        .find_map(|&sample_format| {
            ranges.iter().find(|range| {
                range.channels() == format.channels
                    && range.sample_format() == sample_format
                    && supports_rate(range, format.sample_rate)
            })
        })?;

    let mut config = range
        .clone()
        .with_sample_rate(SampleRate(format.sample_rate))
        .config();

    if let Some(frames) = frames_per_buffer.and_then(|f| u32::try_from(f).ok()) {
        if let SupportedBufferSize::Range { min, max } = range.buffer_size() {
            if (*min..=*max).contains(&frames) {
                config.buffer_size = cpal::BufferSize::Fixed(frames);
            }
        }
    }
    Some((config, range.sample_format()))
}

fn supports_rate(range: &SupportedStreamConfigRange, sample_rate: u32) -> bool {
    range.min_sample_rate().0 <= sample_rate && range.max_sample_rate().0 >= sample_rate
}

/// The playback format nearest `preferred` among `ranges`.
///
/// `preferred` itself when a range supports it. Otherwise the range with
/// the closest channel count wins and the rate is clamped into it.
fn closest_output_format(
    ranges: &[SupportedStreamConfigRange],
    preferred: &AudioFormat,
) -> Option<AudioFormat> {
    let transports = transport_formats(preferred.sample_width);
    let usable: Vec<&SupportedStreamConfigRange> = ranges
        .iter()
        .filter(|range| range.channels() > 0 && transports.contains(&range.sample_format()))
        .collect();

    if usable.iter().any(|range| {
        range.channels() == preferred.channels && supports_rate(range, preferred.sample_rate)
    }) {
        return Some(*preferred);
    }

    let range = usable
        .iter()
        .min_by_key(|range| range.channels().abs_diff(preferred.channels))?;
    let sample_rate = preferred
        .sample_rate
        .max(range.min_sample_rate().0)
        .min(range.max_sample_rate().0);
    Some(AudioFormat::new(
        preferred.sample_width,
        range.channels(),
        sample_rate,
    ))
}

impl AudioDevice for CpalDevice {
    fn open_input(
        &self,
        format: &AudioFormat,
        frames_per_buffer: usize,
    ) -> Result<Box<dyn InputStream>> {
        format
            .validate()
            .map_err(|e| Error::DeviceOpen(e.to_string()))?;
        let device = self.find_device(Direction::Input)?;
        let (config, sample_format) =
            self.exact_config(&device, Direction::Input, format, Some(frames_per_buffer))?;
        debug!(
            "Input config: sample_rate={}, channels={}, buffer_size={:?}, sample_format={:?}",
            config.sample_rate.0, config.channels, config.buffer_size, sample_format
        );
        let stream = CpalInput::open(
            &device,
            &config,
            sample_format,
            *format,
            frames_per_buffer,
            self.timeout,
            self.poll_interval,
        )?;
        Ok(Box::new(stream))
    }

    fn open_output(&self, format: &AudioFormat) -> Result<Box<dyn OutputStream>> {
        format
            .validate()
            .map_err(|e| Error::DeviceOpen(e.to_string()))?;
        let device = self.find_device(Direction::Output)?;
        let (config, sample_format) = self.exact_config(&device, Direction::Output, format, None)?;
        debug!(
            "Output config: sample_rate={}, channels={}, buffer_size={:?}, sample_format={:?}",
            config.sample_rate.0, config.channels, config.buffer_size, sample_format
        );
        let stream = CpalOutput::open(
            &device,
            &config,
            sample_format,
            *format,
            self.timeout,
            self.poll_interval,
        )?;
        Ok(Box::new(stream))
    }

    fn output_format_for(&self, preferred: &AudioFormat) -> Result<AudioFormat> {
        preferred
            .validate()
            .map_err(|e| Error::DeviceOpen(e.to_string()))?;
        let device = self.find_device(Direction::Output)?;
        let ranges = self.supported_ranges(&device, Direction::Output)?;
        closest_output_format(&ranges, preferred).ok_or_else(|| {
            Error::DeviceOpen(format!(
                "output device '{}' has no configuration for {} samples",
                device.name().unwrap_or_else(|_| "Unknown".to_string()),
                preferred.sample_width
            ))
        })
    }
}

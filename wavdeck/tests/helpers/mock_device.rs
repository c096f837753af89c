//! Mock audio device
//!
//! Records opens, closes, reads, writes and drains in a shared log so tests
//! can assert on exactly what an operation did to the device. Failures are
//! injected with the builder methods.

use std::sync::{Arc, Mutex};
use wavdeck::audio::{AudioDevice, AudioStream, InputStream, OutputStream};
use wavdeck::{Error, Result};
use wavdeck_common::{AudioFormat, PcmChunk};

/// Everything the mock has seen.
#[derive(Debug, Default, Clone)]
pub struct MockLog {
    pub input_opens: Vec<(AudioFormat, usize)>,
    pub output_opens: Vec<AudioFormat>,
    pub input_closes: u32,
    pub output_closes: u32,
    /// Frame count of every read request
    pub reads: Vec<usize>,
    /// Payload of every accepted write
    pub writes: Vec<Vec<u8>>,
    pub drains: u32,
}

impl MockLog {
    /// All written bytes in order.
    pub fn written_bytes(&self) -> Vec<u8> {
        self.writes.concat()
    }

    pub fn opens(&self) -> usize {
        self.input_opens.len() + self.output_opens.len()
    }

    pub fn closes(&self) -> usize {
        (self.input_closes + self.output_closes) as usize
    }
}

/// In-memory device with optional injected failures.
#[derive(Debug, Clone, Default)]
pub struct MockDevice {
    log: Arc<Mutex<MockLog>>,
    fail_input_open: bool,
    fail_output_open: bool,
    fail_read_after: Option<usize>,
    fail_write_after: Option<usize>,
    output_rates: Option<Vec<u32>>,
}

impl MockDevice {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject every `open_input` with `DeviceOpen`.
    pub fn failing_input_open(mut self) -> Self {
        self.fail_input_open = true;
        self
    }

    /// Reject every `open_output` with `DeviceOpen`.
    pub fn failing_output_open(mut self) -> Self {
        self.fail_output_open = true;
        self
    }

    /// Fail each input stream's read after `reads` successful reads.
    pub fn failing_read_after(mut self, reads: usize) -> Self {
        self.fail_read_after = Some(reads);
        self
    }

    /// Fail each output stream's write after `writes` successful writes.
    pub fn failing_write_after(mut self, writes: usize) -> Self {
        self.fail_write_after = Some(writes);
        self
    }

    /// Accept output streams only at these sample rates.
    pub fn with_output_rates(mut self, rates: &[u32]) -> Self {
        self.output_rates = Some(rates.to_vec());
        self
    }

    fn accepts_output_rate(&self, rate: u32) -> bool {
        self.output_rates
            .as_ref()
            .map_or(true, |rates| rates.contains(&rate))
    }

    /// Snapshot of the call log.
    pub fn log(&self) -> MockLog {
        self.log.lock().unwrap().clone()
    }
}

impl AudioDevice for MockDevice {
    fn open_input(
        &self,
        format: &AudioFormat,
        frames_per_buffer: usize,
    ) -> Result<Box<dyn InputStream>> {
        if self.fail_input_open {
            return Err(Error::DeviceOpen(format!("mock input rejects {}", format)));
        }
        self.log
            .lock()
            .unwrap()
            .input_opens
            .push((*format, frames_per_buffer));
        Ok(Box::new(MockInput {
            log: Arc::clone(&self.log),
            format: *format,
            reads: 0,
            fail_after: self.fail_read_after,
        }))
    }

    fn open_output(&self, format: &AudioFormat) -> Result<Box<dyn OutputStream>> {
        if self.fail_output_open || !self.accepts_output_rate(format.sample_rate) {
            return Err(Error::DeviceOpen(format!("mock output rejects {}", format)));
        }
        self.log.lock().unwrap().output_opens.push(*format);
        Ok(Box::new(MockOutput {
            log: Arc::clone(&self.log),
            format: *format,
            writes: 0,
            fail_after: self.fail_write_after,
        }))
    }

    fn output_format_for(&self, preferred: &AudioFormat) -> Result<AudioFormat> {
        match self.output_rates.as_deref() {
            Some([first, ..]) if !self.accepts_output_rate(preferred.sample_rate) => Ok(
                AudioFormat::new(preferred.sample_width, preferred.channels, *first),
            ),
            _ => Ok(*preferred),
        }
    }
}

struct MockInput {
    log: Arc<Mutex<MockLog>>,
    format: AudioFormat,
    reads: usize,
    fail_after: Option<usize>,
}

impl AudioStream for MockInput {
    fn format(&self) -> AudioFormat {
        self.format
    }

    fn close(&mut self) -> Result<()> {
        self.log.lock().unwrap().input_closes += 1;
        Ok(())
    }
}

impl InputStream for MockInput {
    fn read(&mut self, frames: usize) -> Result<PcmChunk> {
        if self.fail_after.is_some_and(|n| self.reads >= n) {
            return Err(Error::Read("mock input unplugged".to_string()));
        }
        self.log.lock().unwrap().reads.push(frames);

        // Each chunk is filled with its own read index
        let fill = (self.reads % 256) as u8;
        self.reads += 1;
        let bytes = vec![fill; self.format.bytes_for_frames(frames)];
        PcmChunk::new(self.format, bytes).map_err(|e| Error::Read(e.to_string()))
    }
}

struct MockOutput {
    log: Arc<Mutex<MockLog>>,
    format: AudioFormat,
    writes: usize,
    fail_after: Option<usize>,
}

impl AudioStream for MockOutput {
    fn format(&self) -> AudioFormat {
        self.format
    }

    fn close(&mut self) -> Result<()> {
        self.log.lock().unwrap().output_closes += 1;
        Ok(())
    }
}

impl OutputStream for MockOutput {
    fn write(&mut self, bytes: &[u8]) -> Result<()> {
        if self.fail_after.is_some_and(|n| self.writes >= n) {
            return Err(Error::Write("mock output unplugged".to_string()));
        }
        assert_eq!(
            bytes.len() % self.format.frame_size(),
            0,
            "write of a partial frame"
        );
        self.writes += 1;
        self.log.lock().unwrap().writes.push(bytes.to_vec());
        Ok(())
    }

    fn drain(&mut self) -> Result<()> {
        self.log.lock().unwrap().drains += 1;
        Ok(())
    }
}

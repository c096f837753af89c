//! Compressed audio decoding using symphonia
//!
//! [`DecoderEngine`] is the process-wide decode engine. It is initialized
//! once, on first use, and lives for the rest of the process; it holds only
//! the codec registry, never a device, so repeated playbacks share nothing
//! but the registry.

use crate::error::{Error, Result};
use std::fs::File;
use std::path::Path;
use std::sync::OnceLock;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{CodecRegistry, Decoder, DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::{FormatOptions, FormatReader};
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use tracing::{debug, info, warn};
use wavdeck_common::{AudioFormat, SampleWidth};

static ENGINE: OnceLock<DecoderEngine> = OnceLock::new();

/// Process-wide decode engine.
pub struct DecoderEngine {
    registry: CodecRegistry,
}

impl DecoderEngine {
    /// Get the engine, initializing it on first call.
    pub fn global() -> &'static DecoderEngine {
        ENGINE.get_or_init(|| {
            info!("Initializing decoder engine");
            let mut registry = CodecRegistry::new();
            registry.register_all::<symphonia::default::codecs::MpaDecoder>();
            registry.register_all::<symphonia::default::codecs::PcmDecoder>();
            registry.register_all::<symphonia::default::codecs::AdpcmDecoder>();
            registry.register_all::<symphonia::default::codecs::VorbisDecoder>();
            registry.register_all::<symphonia::default::codecs::FlacDecoder>();
            registry.register_all::<symphonia::default::codecs::AacDecoder>();
            DecoderEngine { registry }
        })
    }

    /// Whether [`DecoderEngine::global`] has run in this process.
    pub fn is_initialized() -> bool {
        ENGINE.get().is_some()
    }

    /// Probe `path` and prepare a decoder for its first audio track.
    ///
    /// # Errors
    /// - `FileNotFound` if the file does not exist
    /// - `DecodeOrPlayback` if the container is not recognized, has no
    ///   decodable track, or lacks sample rate / channel information
    pub fn open(&self, path: &Path) -> Result<CompressedSource> {
        let file = File::open(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                Error::FileNotFound(path.to_path_buf())
            } else {
                Error::DecodeOrPlayback(format!("Failed to open {}: {}", path.display(), e))
            }
        })?;
        let mss = MediaSourceStream::new(Box::new(file), Default::default());

        let mut hint = Hint::new();
        if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
            hint.with_extension(ext);
        }

        let probed = symphonia::default::get_probe()
            .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
            .map_err(|e| Error::DecodeOrPlayback(format!("Failed to probe format: {}", e)))?;
        let format = probed.format;

        let track = format
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or_else(|| Error::DecodeOrPlayback("No audio track found".to_string()))?;

        let track_id = track.id;
        let sample_rate = track
            .codec_params
            .sample_rate
            .ok_or_else(|| Error::DecodeOrPlayback("Sample rate not found".to_string()))?;
        let channels = track
            .codec_params
            .channels
            .map(|c| c.count() as u16)
            .ok_or_else(|| Error::DecodeOrPlayback("Channel count not found".to_string()))?;

        let decoder = self
            .registry
            .make(&track.codec_params, &DecoderOptions::default())
            .map_err(|e| Error::DecodeOrPlayback(format!("Failed to create decoder: {}", e)))?;

        let output_format = AudioFormat::new(SampleWidth::Bits16, channels, sample_rate);
        debug!("Decoding {} as {}", path.display(), output_format);

        Ok(CompressedSource {
            format,
            decoder,
            track_id,
            output_format,
            sample_buf: None,
        })
    }
}

/// A probed file yielding interleaved 16-bit PCM one packet at a time.
pub struct CompressedSource {
    format: Box<dyn FormatReader>,
    decoder: Box<dyn Decoder>,
    track_id: u32,
    output_format: AudioFormat,
    sample_buf: Option<SampleBuffer<i16>>,
}

impl CompressedSource {
    /// Format of the PCM produced by [`CompressedSource::next_block`].
    pub fn format(&self) -> AudioFormat {
        self.output_format
    }

    /// Decode the next packet into little-endian 16-bit PCM bytes.
    ///
    /// Returns `None` at end of stream. Corrupt packets are logged and
    /// skipped; the decoder is reset when the format reader requires it.
    pub fn next_block(&mut self) -> Result<Option<Vec<u8>>> {
        loop {
            let packet = match self.format.next_packet() {
                Ok(packet) => packet,
                Err(SymphoniaError::IoError(ref e))
                    if e.kind() == std::io::ErrorKind::UnexpectedEof =>
                {
                    debug!("Reached end of stream");
                    return Ok(None);
                }
                Err(SymphoniaError::ResetRequired) => {
                    self.decoder.reset();
                    continue;
                }
                Err(e) => {
                    return Err(Error::DecodeOrPlayback(format!(
                        "Failed to read packet: {}",
                        e
                    )));
                }
            };

            if packet.track_id() != self.track_id {
                continue;
            }

            let decoded = match self.decoder.decode(&packet) {
                Ok(decoded) => decoded,
                Err(SymphoniaError::DecodeError(e)) => {
                    warn!("Decode error (skipping packet): {}", e);
                    continue;
                }
                Err(e) => {
                    return Err(Error::DecodeOrPlayback(format!("Decode failed: {}", e)));
                }
            };

            let spec = *decoded.spec();
            if spec.channels.count() != self.output_format.channels as usize {
                return Err(Error::DecodeOrPlayback(format!(
                    "Channel count changed mid-stream ({} -> {})",
                    self.output_format.channels,
                    spec.channels.count()
                )));
            }

            let frames = decoded.capacity();
            let needs_alloc = self
                .sample_buf
                .as_ref()
                .map_or(true, |buf| buf.capacity() < frames * spec.channels.count());
            if needs_alloc {
                self.sample_buf = Some(SampleBuffer::new(frames as u64, spec));
            }
            let Some(buf) = self.sample_buf.as_mut() else {
                continue;
            };
            buf.copy_interleaved_ref(decoded);

            let bytes = buf.samples().iter().flat_map(|s| s.to_le_bytes()).collect();
            return Ok(Some(bytes));
        }
    }
}

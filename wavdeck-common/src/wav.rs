//! RIFF/WAVE container reader and writer
//!
//! Only integer PCM is handled: format tag 1, or WAVE_FORMAT_EXTENSIBLE
//! with the PCM sub-format GUID. Payload bytes pass through untouched, so a
//! file written here and played back produces exactly the captured bytes.
//!
//! Layout written by [`WavWriter`]:
//!
//! ```text
//! offset  size  field
//!      0     4  "RIFF"
//!      4     4  36 + data size (+ pad byte)
//!      8     4  "WAVE"
//!     12     4  "fmt "
//!     16     4  16
//!     20     2  1 (PCM)
//!     22     2  channels
//!     24     4  sample rate
//!     28     4  byte rate
//!     32     2  block align
//!     34     2  bits per sample
//!     36     4  "data"
//!     40     4  data size
//!     44     -  little-endian samples
//! ```

use crate::{AudioFormat, Error, PcmChunk, Result, SampleWidth};
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::Path;
use tracing::{debug, warn};

const WAVE_FORMAT_PCM: u16 = 0x0001;
const WAVE_FORMAT_EXTENSIBLE: u16 = 0xFFFE;
const PCM_FMT_SIZE: u32 = 16;
const EXTENSIBLE_FMT_SIZE: u32 = 40;
const HEADER_SIZE: u64 = 44;
const RIFF_SIZE_OFFSET: u64 = 4;
const DATA_SIZE_OFFSET: u64 = 40;

/// Largest payload whose RIFF size still fits in 32 bits.
const MAX_DATA_LEN: u64 = u32::MAX as u64 - 36 - 1;

fn truncated(what: &str) -> impl FnOnce(io::Error) -> Error + '_ {
    move |e| {
        if e.kind() == io::ErrorKind::UnexpectedEof {
            Error::Malformed(format!("file ends inside {}", what))
        } else {
            Error::Io(e)
        }
    }
}

/// Streaming reader over the `data` payload of a WAV container.
pub struct WavReader<R> {
    reader: R,
    format: AudioFormat,
    data_len: u64,
    remaining: u64,
}

impl WavReader<BufReader<File>> {
    /// Open and parse the header of the WAV file at `path`.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path.as_ref())?;
        Self::new(BufReader::new(file))
    }
}

impl<R: Read> WavReader<R> {
    /// Parse the container header, leaving `reader` at the first payload byte.
    ///
    /// # Errors
    /// - `Malformed`: not RIFF/WAVE, truncated header, no `fmt ` before `data`,
    ///   inconsistent block align
    /// - `UnsupportedFormat`: compressed or floating-point encodings, or a
    ///   sample width other than 16, 24 or 32 bits
    pub fn new(mut reader: R) -> Result<Self> {
        let mut tag = [0u8; 4];
        reader.read_exact(&mut tag).map_err(truncated("RIFF header"))?;
        if &tag != b"RIFF" {
            return Err(Error::Malformed("missing RIFF tag".to_string()));
        }
        let _riff_len = reader
            .read_u32::<LittleEndian>()
            .map_err(truncated("RIFF header"))?;
        reader.read_exact(&mut tag).map_err(truncated("RIFF header"))?;
        if &tag != b"WAVE" {
            return Err(Error::Malformed("RIFF form type is not WAVE".to_string()));
        }

        let mut format = None;
        loop {
            let mut id = [0u8; 4];
            match reader.read_exact(&mut id) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
                    return Err(Error::Malformed("no data chunk".to_string()));
                }
                Err(e) => return Err(Error::Io(e)),
            }
            let size = reader
                .read_u32::<LittleEndian>()
                .map_err(truncated("chunk header"))?;

            match &id {
                b"fmt " => {
                    format = Some(read_fmt_chunk(&mut reader, size)?);
                }
                b"data" => {
                    let format = format.ok_or_else(|| {
                        Error::Malformed("data chunk precedes fmt chunk".to_string())
                    })?;
                    let frame_size = format.frame_size() as u64;
                    let declared = size as u64;
                    let whole = declared - declared % frame_size;
                    if whole != declared {
                        warn!(
                            "WAV data length {} is not a multiple of {}-byte frames; ignoring trailing bytes",
                            declared, frame_size
                        );
                    }
                    debug!("WAV header: {}, {} payload bytes", format, whole);
                    return Ok(Self {
                        reader,
                        format,
                        data_len: whole,
                        remaining: whole,
                    });
                }
                other => {
                    debug!(
                        "Skipping WAV chunk {:?} ({} bytes)",
                        String::from_utf8_lossy(other),
                        size
                    );
                    skip(&mut reader, padded(size as u64))?;
                }
            }
        }
    }

    /// Format declared by the `fmt ` chunk.
    pub fn format(&self) -> AudioFormat {
        self.format
    }

    /// Payload length declared by the `data` chunk, in whole frames' bytes.
    pub fn data_len(&self) -> u64 {
        self.data_len
    }

    /// Payload length in frames.
    pub fn frames(&self) -> u64 {
        self.data_len / self.format.frame_size() as u64
    }

    /// Read up to `frames` frames of raw payload bytes.
    ///
    /// Returns an empty vector once the payload is exhausted. A file that
    /// ends before its declared payload length yields what is present
    /// (rounded down to whole frames) and then ends.
    pub fn read_frames(&mut self, frames: usize) -> Result<Vec<u8>> {
        let want = (self.format.bytes_for_frames(frames) as u64).min(self.remaining);
        if want == 0 {
            return Ok(Vec::new());
        }

        let mut buf = Vec::with_capacity(want as usize);
        (&mut self.reader).take(want).read_to_end(&mut buf)?;

        if (buf.len() as u64) < want {
            warn!(
                "WAV payload truncated: expected {} more bytes, found {}",
                self.remaining,
                buf.len()
            );
            let frame_size = self.format.frame_size();
            buf.truncate(buf.len() - buf.len() % frame_size);
            self.remaining = 0;
        } else {
            self.remaining -= want;
        }
        Ok(buf)
    }

    /// Read the next chunk of up to `frames` frames, `None` at end of payload.
    pub fn read_chunk(&mut self, frames: usize) -> Result<Option<PcmChunk>> {
        let bytes = self.read_frames(frames)?;
        if bytes.is_empty() {
            return Ok(None);
        }
        PcmChunk::new(self.format, bytes).map(Some)
    }
}

fn padded(size: u64) -> u64 {
    size + (size & 1)
}

fn skip<R: Read>(reader: &mut R, len: u64) -> Result<()> {
    let skipped = io::copy(&mut reader.take(len), &mut io::sink())?;
    if skipped < len {
        return Err(Error::Malformed("file ends inside a chunk".to_string()));
    }
    Ok(())
}

fn read_fmt_chunk<R: Read>(reader: &mut R, size: u32) -> Result<AudioFormat> {
    if size < PCM_FMT_SIZE {
        return Err(Error::Malformed(format!("fmt chunk too short ({} bytes)", size)));
    }
    let eof = || truncated("fmt chunk");
    let format_tag = reader.read_u16::<LittleEndian>().map_err(eof())?;
    let channels = reader.read_u16::<LittleEndian>().map_err(eof())?;
    let sample_rate = reader.read_u32::<LittleEndian>().map_err(eof())?;
    let byte_rate = reader.read_u32::<LittleEndian>().map_err(eof())?;
    let block_align = reader.read_u16::<LittleEndian>().map_err(eof())?;
    let bits = reader.read_u16::<LittleEndian>().map_err(eof())?;
    let mut consumed = PCM_FMT_SIZE;

    match format_tag {
        WAVE_FORMAT_PCM => {}
        WAVE_FORMAT_EXTENSIBLE => {
            if size < EXTENSIBLE_FMT_SIZE {
                return Err(Error::Malformed(format!(
                    "extensible fmt chunk too short ({} bytes)",
                    size
                )));
            }
            let _cb_size = reader.read_u16::<LittleEndian>().map_err(eof())?;
            let _valid_bits = reader.read_u16::<LittleEndian>().map_err(eof())?;
            let _channel_mask = reader.read_u32::<LittleEndian>().map_err(eof())?;
            let mut guid = [0u8; 16];
            reader.read_exact(&mut guid).map_err(eof())?;
            consumed = EXTENSIBLE_FMT_SIZE;

            let sub_format = u16::from_le_bytes([guid[0], guid[1]]);
            if sub_format != WAVE_FORMAT_PCM {
                return Err(Error::UnsupportedFormat(format!(
                    "extensible sub-format 0x{:04x} is not integer PCM",
                    sub_format
                )));
            }
        }
        other => {
            return Err(Error::UnsupportedFormat(format!(
                "WAV format tag 0x{:04x} is not integer PCM",
                other
            )));
        }
    }
    skip(reader, padded(size as u64) - consumed as u64)?;

    let sample_width = SampleWidth::try_from(bits)?;
    let format = AudioFormat::new(sample_width, channels, sample_rate);
    format
        .validate()
        .map_err(|e| Error::Malformed(e.to_string()))?;

    if block_align != format.block_align() {
        return Err(Error::Malformed(format!(
            "block align {} does not match {} channels of {}",
            block_align, channels, sample_width
        )));
    }
    if byte_rate != format.byte_rate() {
        warn!(
            "WAV byte rate {} disagrees with derived {}; using derived value",
            byte_rate,
            format.byte_rate()
        );
    }
    Ok(format)
}

/// Writer producing a canonical 44-byte-header PCM WAV file.
///
/// Sizes are patched in by [`WavWriter::finalize`]. A writer dropped without
/// finalizing is finalized on a best-effort basis.
pub struct WavWriter<W: Write + Seek> {
    writer: Option<W>,
    format: AudioFormat,
    data_len: u64,
    finalized: bool,
}

impl WavWriter<BufWriter<File>> {
    /// Create (or truncate) the file at `path` and write a placeholder header.
    pub fn create<P: AsRef<Path>>(path: P, format: AudioFormat) -> Result<Self> {
        let file = File::create(path.as_ref())?;
        Self::new(BufWriter::new(file), format)
    }
}

impl<W: Write + Seek> WavWriter<W> {
    pub fn new(mut writer: W, format: AudioFormat) -> Result<Self> {
        format.validate()?;

        writer.write_all(b"RIFF")?;
        writer.write_u32::<LittleEndian>(36)?;
        writer.write_all(b"WAVE")?;

        writer.write_all(b"fmt ")?;
        writer.write_u32::<LittleEndian>(PCM_FMT_SIZE)?;
        writer.write_u16::<LittleEndian>(WAVE_FORMAT_PCM)?;
        writer.write_u16::<LittleEndian>(format.channels)?;
        writer.write_u32::<LittleEndian>(format.sample_rate)?;
        writer.write_u32::<LittleEndian>(format.byte_rate())?;
        writer.write_u16::<LittleEndian>(format.block_align())?;
        writer.write_u16::<LittleEndian>(format.sample_width.bits())?;

        writer.write_all(b"data")?;
        writer.write_u32::<LittleEndian>(0)?;

        Ok(Self {
            writer: Some(writer),
            format,
            data_len: 0,
            finalized: false,
        })
    }

    pub fn format(&self) -> AudioFormat {
        self.format
    }

    /// Payload bytes written so far.
    pub fn data_len(&self) -> u64 {
        self.data_len
    }

    /// Append whole frames of little-endian PCM.
    ///
    /// # Errors
    /// - `Malformed` if `bytes` ends in a partial frame
    /// - `UnsupportedFormat` if the payload would exceed the 32-bit RIFF limit
    pub fn write_frames(&mut self, bytes: &[u8]) -> Result<()> {
        if bytes.len() % self.format.frame_size() != 0 {
            return Err(Error::Malformed(format!(
                "{} bytes is not a whole number of {}-byte frames",
                bytes.len(),
                self.format.frame_size()
            )));
        }
        let new_len = self.data_len + bytes.len() as u64;
        if new_len > MAX_DATA_LEN {
            return Err(Error::UnsupportedFormat(
                "payload exceeds the 4 GiB WAV size limit".to_string(),
            ));
        }
        let writer = self.writer_mut()?;
        writer.write_all(bytes)?;
        self.data_len = new_len;
        Ok(())
    }

    /// Patch the header sizes, flush, and hand back the inner writer.
    pub fn finalize(mut self) -> Result<W> {
        self.finish()?;
        self.writer
            .take()
            .ok_or_else(|| Error::Io(io::Error::other("WAV writer already closed")))
    }

    fn writer_mut(&mut self) -> Result<&mut W> {
        self.writer
            .as_mut()
            .ok_or_else(|| Error::Io(io::Error::other("WAV writer already closed")))
    }

    fn finish(&mut self) -> Result<()> {
        if self.finalized {
            return Ok(());
        }
        self.finalized = true;

        let data_len = self.data_len;
        let pad = data_len & 1;
        let riff_len = (HEADER_SIZE - 8) + data_len + pad;

        let writer = self.writer_mut()?;
        if pad == 1 {
            writer.write_u8(0)?;
        }
        writer.seek(SeekFrom::Start(RIFF_SIZE_OFFSET))?;
        writer.write_u32::<LittleEndian>(riff_len as u32)?;
        writer.seek(SeekFrom::Start(DATA_SIZE_OFFSET))?;
        writer.write_u32::<LittleEndian>(data_len as u32)?;
        writer.seek(SeekFrom::End(0))?;
        writer.flush()?;
        Ok(())
    }
}

impl<W: Write + Seek> Drop for WavWriter<W> {
    fn drop(&mut self) {
        if !self.finalized && self.writer.is_some() {
            if let Err(e) = self.finish() {
                warn!("Failed to finalize WAV on drop: {}", e);
            }
        }
    }
}

/// Write `chunks` as one WAV file at `path`.
///
/// Returns the number of frames written.
pub fn write_wav<P, I>(path: P, format: AudioFormat, chunks: I) -> Result<u64>
where
    P: AsRef<Path>,
    I: IntoIterator,
    I::Item: AsRef<[u8]>,
{
    let mut writer = WavWriter::create(path, format)?;
    for chunk in chunks {
        writer.write_frames(chunk.as_ref())?;
    }
    let frames = writer.data_len() / format.frame_size() as u64;
    writer.finalize()?;
    Ok(frames)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn stereo16() -> AudioFormat {
        AudioFormat::new(SampleWidth::Bits16, 2, 44_100)
    }

    fn write_to_vec(format: AudioFormat, payload: &[u8]) -> Vec<u8> {
        let mut writer = WavWriter::new(Cursor::new(Vec::new()), format).unwrap();
        writer.write_frames(payload).unwrap();
        writer.finalize().unwrap().into_inner()
    }

    #[test]
    fn test_header_layout() {
        let payload: Vec<u8> = (0..16u8).collect();
        let bytes = write_to_vec(stereo16(), &payload);

        assert_eq!(bytes.len(), 44 + 16);
        assert_eq!(&bytes[0..4], b"RIFF");
        assert_eq!(u32::from_le_bytes(bytes[4..8].try_into().unwrap()), 36 + 16);
        assert_eq!(&bytes[8..16], b"WAVEfmt ");
        assert_eq!(u32::from_le_bytes(bytes[16..20].try_into().unwrap()), 16);
        assert_eq!(u16::from_le_bytes([bytes[20], bytes[21]]), 1);
        assert_eq!(u16::from_le_bytes([bytes[22], bytes[23]]), 2);
        assert_eq!(u32::from_le_bytes(bytes[24..28].try_into().unwrap()), 44_100);
        assert_eq!(u32::from_le_bytes(bytes[28..32].try_into().unwrap()), 176_400);
        assert_eq!(u16::from_le_bytes([bytes[32], bytes[33]]), 4);
        assert_eq!(u16::from_le_bytes([bytes[34], bytes[35]]), 16);
        assert_eq!(&bytes[36..40], b"data");
        assert_eq!(u32::from_le_bytes(bytes[40..44].try_into().unwrap()), 16);
        assert_eq!(&bytes[44..], &payload[..]);
    }

    #[test]
    fn test_odd_payload_is_padded() {
        // 24-bit mono: 3 frames = 9 bytes, padded to 10
        let format = AudioFormat::new(SampleWidth::Bits24, 1, 8_000);
        let bytes = write_to_vec(format, &[1, 2, 3, 4, 5, 6, 7, 8, 9]);
        assert_eq!(bytes.len(), 44 + 10);
        assert_eq!(u32::from_le_bytes(bytes[4..8].try_into().unwrap()), 36 + 10);
        assert_eq!(u32::from_le_bytes(bytes[40..44].try_into().unwrap()), 9);

        let mut reader = WavReader::new(Cursor::new(bytes)).unwrap();
        assert_eq!(reader.frames(), 3);
        assert_eq!(reader.read_frames(10).unwrap(), vec![1, 2, 3, 4, 5, 6, 7, 8, 9]);
    }

    #[test]
    fn test_partial_frame_write_rejected() {
        let mut writer = WavWriter::new(Cursor::new(Vec::new()), stereo16()).unwrap();
        assert!(matches!(writer.write_frames(&[0; 6]), Err(Error::Malformed(_))));
        assert_eq!(writer.data_len(), 0);
    }

    #[test]
    fn test_reader_chunks_payload() {
        let payload: Vec<u8> = (0..40u8).collect();
        let bytes = write_to_vec(stereo16(), &payload);
        let mut reader = WavReader::new(Cursor::new(bytes)).unwrap();
        assert_eq!(reader.format(), stereo16());
        assert_eq!(reader.data_len(), 40);

        // 10 frames read in chunks of 4 frames: 16 + 16 + 8 bytes
        let mut lengths = Vec::new();
        let mut collected = Vec::new();
        while let Some(chunk) = reader.read_chunk(4).unwrap() {
            lengths.push(chunk.len());
            collected.extend_from_slice(chunk.as_bytes());
        }
        assert_eq!(lengths, vec![16, 16, 8]);
        assert_eq!(collected, payload);
        assert!(reader.read_frames(4).unwrap().is_empty());
    }

    #[test]
    fn test_unknown_chunks_are_skipped() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(b"RIFF");
        bytes.extend_from_slice(&0u32.to_le_bytes());
        bytes.extend_from_slice(b"WAVE");
        // Odd-sized LIST chunk with pad byte, before fmt
        bytes.extend_from_slice(b"LIST");
        bytes.extend_from_slice(&3u32.to_le_bytes());
        bytes.extend_from_slice(&[b'a', b'b', b'c', 0]);
        bytes.extend_from_slice(b"fmt ");
        bytes.extend_from_slice(&16u32.to_le_bytes());
        bytes.extend_from_slice(&1u16.to_le_bytes());
        bytes.extend_from_slice(&1u16.to_le_bytes());
        bytes.extend_from_slice(&8_000u32.to_le_bytes());
        bytes.extend_from_slice(&16_000u32.to_le_bytes());
        bytes.extend_from_slice(&2u16.to_le_bytes());
        bytes.extend_from_slice(&16u16.to_le_bytes());
        bytes.extend_from_slice(b"fact");
        bytes.extend_from_slice(&4u32.to_le_bytes());
        bytes.extend_from_slice(&2u32.to_le_bytes());
        bytes.extend_from_slice(b"data");
        bytes.extend_from_slice(&4u32.to_le_bytes());
        bytes.extend_from_slice(&[0x01, 0x02, 0x03, 0x04]);

        let mut reader = WavReader::new(Cursor::new(bytes)).unwrap();
        assert_eq!(reader.format(), AudioFormat::new(SampleWidth::Bits16, 1, 8_000));
        assert_eq!(reader.read_frames(100).unwrap(), vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_rejects_non_riff() {
        let result = WavReader::new(Cursor::new(b"ID3\x04 not a wav file at all".to_vec()));
        assert!(matches!(result, Err(Error::Malformed(_))));
    }

    #[test]
    fn test_rejects_truncated_header() {
        let bytes = write_to_vec(stereo16(), &[0; 8]);
        let result = WavReader::new(Cursor::new(bytes[..30].to_vec()));
        assert!(matches!(result, Err(Error::Malformed(_))));
    }

    #[test]
    fn test_rejects_missing_data_chunk() {
        let bytes = write_to_vec(stereo16(), &[]);
        let result = WavReader::new(Cursor::new(bytes[..36].to_vec()));
        assert!(matches!(result, Err(Error::Malformed(_))));
    }

    #[test]
    fn test_rejects_float_encoding() {
        let mut bytes = write_to_vec(AudioFormat::new(SampleWidth::Bits32, 1, 8_000), &[0; 4]);
        bytes[20] = 3; // WAVE_FORMAT_IEEE_FLOAT
        let result = WavReader::new(Cursor::new(bytes));
        assert!(matches!(result, Err(Error::UnsupportedFormat(_))));
    }

    #[test]
    fn test_rejects_inconsistent_block_align() {
        let mut bytes = write_to_vec(stereo16(), &[0; 4]);
        bytes[32] = 3;
        let result = WavReader::new(Cursor::new(bytes));
        assert!(matches!(result, Err(Error::Malformed(_))));
    }

    #[test]
    fn test_rejects_oversized_header_fields() {
        let valid = write_to_vec(stereo16(), &[0; 4]);

        let mut many_channels = valid.clone();
        many_channels[22..24].copy_from_slice(&40_000u16.to_le_bytes());
        let result = WavReader::new(Cursor::new(many_channels));
        assert!(matches!(result, Err(Error::Malformed(_))));

        let mut fast = valid;
        fast[24..28].copy_from_slice(&u32::MAX.to_le_bytes());
        let result = WavReader::new(Cursor::new(fast));
        assert!(matches!(result, Err(Error::Malformed(_))));
    }

    #[test]
    fn test_writer_rejects_unrepresentable_format() {
        let format = AudioFormat::new(SampleWidth::Bits32, 20_000, 48_000);
        let result = WavWriter::new(Cursor::new(Vec::new()), format);
        assert!(matches!(result, Err(Error::UnsupportedFormat(_))));
    }

    #[test]
    fn test_truncated_payload_ends_early() {
        let bytes = write_to_vec(stereo16(), &[7; 40]);
        // Cut mid-frame: 44 header + 22 payload bytes
        let mut reader = WavReader::new(Cursor::new(bytes[..66].to_vec())).unwrap();
        assert_eq!(reader.data_len(), 40);
        assert_eq!(reader.read_frames(100).unwrap().len(), 20);
        assert!(reader.read_frames(100).unwrap().is_empty());
    }

    #[test]
    fn test_dropped_writer_is_finalized() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dropped.wav");
        {
            let mut writer = WavWriter::create(&path, stereo16()).unwrap();
            writer.write_frames(&[1; 8]).unwrap();
        }
        let reader = WavReader::open(&path).unwrap();
        assert_eq!(reader.data_len(), 8);
    }
}

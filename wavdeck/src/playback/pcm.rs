//! PCM file player
//!
//! Streams a WAV file to the output device in fixed-size chunks, opening
//! the device with exactly the format the file declares.

use crate::audio::{AudioDevice, StreamGuard};
use crate::error::{Error, Result};
use crate::playback::PlaybackSummary;
use std::path::Path;
use tracing::{debug, info};
use wavdeck_common::wav::WavReader;

/// Play the WAV file at `path`, `chunk_frames` frames per device write.
///
/// # Errors
/// - `InvalidArgument` if `chunk_frames` is zero
/// - `FileNotFound` if `path` does not exist (no device is opened)
/// - `MalformedContainer` if the header cannot be parsed or the payload
///   cannot be read
/// - `DeviceOpen` if no device accepts the file's exact format
/// - `Write` if a chunk is rejected; the stream is still closed
pub fn play_pcm_file(
    device: &dyn AudioDevice,
    path: &Path,
    chunk_frames: usize,
) -> Result<PlaybackSummary> {
    if chunk_frames == 0 {
        return Err(Error::InvalidArgument(
            "chunk_frames must be greater than zero".to_string(),
        ));
    }
    if !path.exists() {
        return Err(Error::FileNotFound(path.to_path_buf()));
    }

    let mut reader = WavReader::open(path).map_err(|e| Error::from_container(path, e))?;
    let format = reader.format();
    info!(
        "Playing {} ({}, {} frames)",
        path.display(),
        format,
        reader.frames()
    );

    let mut output = StreamGuard::new(device.open_output(&format)?);
    let mut summary = PlaybackSummary::new(format);

    while let Some(chunk) = reader
        .read_chunk(chunk_frames)
        .map_err(|e| Error::from_container(path, e))?
    {
        output.write(chunk.as_bytes())?;
        summary.record_write(chunk.len());
    }

    output.drain()?;
    output.close()?;

    debug!(
        "PCM playback wrote {} frames in {} writes",
        summary.frames, summary.writes
    );
    info!("Finished playing {}", path.display());
    Ok(summary)
}

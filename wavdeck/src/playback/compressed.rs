//! Decoder-backed player
//!
//! Plays a compressed file (MP3 and the other formats the decoder engine
//! registers) and returns once the device has played all of it. When the
//! output device cannot run at the file's rate or channel count the decoded
//! audio is converted to the closest format it supports.

use crate::audio::{AudioDevice, DecoderEngine, FormatConverter, StreamGuard};
use crate::error::{Error, Result};
use crate::playback::PlaybackSummary;
use std::path::Path;
use tracing::{debug, info};

/// Play `path` on `device`, blocking until playback has finished.
///
/// Each call is an independent playback with its own output stream; only
/// the decoder engine is shared between calls.
///
/// # Errors
/// - `FileNotFound` if `path` does not exist (no device is opened)
/// - `DecodeOrPlayback` if the file cannot be probed, decoded or converted
/// - `DeviceOpen` / `Write` from the output device
pub fn play_compressed(device: &dyn AudioDevice, path: &Path) -> Result<PlaybackSummary> {
    if !path.exists() {
        return Err(Error::FileNotFound(path.to_path_buf()));
    }

    let mut source = DecoderEngine::global().open(path)?;
    let source_format = source.format();
    info!("Playing {} ({})", path.display(), source_format);

    let format = device.output_format_for(&source_format)?;
    let mut converter = FormatConverter::new(source_format, format)?;
    if !converter.is_passthrough() {
        info!("Converting {} to {} for the output device", source_format, format);
    }

    let mut output = StreamGuard::new(device.open_output(&format)?);
    let mut summary = PlaybackSummary::new(format);

    while let Some(block) = source.next_block()? {
        let block = converter.convert(&block)?;
        if block.is_empty() {
            continue;
        }
        output.write(&block)?;
        summary.record_write(block.len());
    }

    let tail = converter.finish()?;
    if !tail.is_empty() {
        output.write(&tail)?;
        summary.record_write(tail.len());
    }

    output.drain()?;
    output.close()?;

    debug!(
        "Compressed playback wrote {} frames in {} writes",
        summary.frames, summary.writes
    );
    info!("Finished playing {}", path.display());
    Ok(summary)
}

//! The fixed play / record / play-back session
//!
//! Operations run one after another on the calling thread. A failed
//! operation is logged and the session moves on; the report decides the
//! exit status afterwards.

use crate::audio::AudioDevice;
use crate::error::{Error, Result};
use crate::playback::{play_compressed, play_pcm_file};
use crate::recorder::{Recorder, RecordingOptions};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{error, info};
use wavdeck_common::config::{ExitPolicy, TomlConfig};
use wavdeck_common::AudioFormat;

/// One step of the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    PlayCompressed,
    Record,
    PlayRecording,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::PlayCompressed => write!(f, "play compressed file"),
            Operation::Record => write!(f, "record"),
            Operation::PlayRecording => write!(f, "play recording"),
        }
    }
}

/// Everything a session needs, resolved from configuration.
#[derive(Debug, Clone)]
pub struct SessionPlan {
    pub compressed_path: PathBuf,
    pub recording_path: PathBuf,
    pub record_duration: Duration,
    pub capture_format: AudioFormat,
    pub recording: RecordingOptions,
    pub playback_chunk_frames: usize,
}

impl SessionPlan {
    /// Build a plan from validated configuration.
    pub fn from_config(config: &TomlConfig) -> Result<Self> {
        let record_duration = config
            .session
            .record_duration()
            .map_err(|e| match e {
                wavdeck_common::Error::Config(msg) => Error::Config(msg),
                other => Error::Config(other.to_string()),
            })?;

        Ok(Self {
            compressed_path: config.session.compressed_path.clone(),
            recording_path: config.session.recording_path.clone(),
            record_duration,
            capture_format: config.capture.format,
            recording: RecordingOptions::from(&config.capture),
            playback_chunk_frames: config.playback.chunk_frames,
        })
    }
}

/// Outcome of every operation in a session, in run order.
#[derive(Debug, Default)]
pub struct SessionReport {
    pub outcomes: Vec<(Operation, Result<()>)>,
}

impl SessionReport {
    /// Operations that failed.
    pub fn failures(&self) -> impl Iterator<Item = (Operation, &Error)> {
        self.outcomes
            .iter()
            .filter_map(|(op, result)| result.as_ref().err().map(|e| (*op, e)))
    }

    pub fn succeeded(&self) -> bool {
        self.failures().next().is_none()
    }

    /// Process exit status under `policy`.
    pub fn exit_code(&self, policy: ExitPolicy) -> u8 {
        match policy {
            ExitPolicy::Lenient => 0,
            ExitPolicy::Strict if self.succeeded() => 0,
            ExitPolicy::Strict => 1,
        }
    }

    fn push(&mut self, operation: Operation, result: Result<()>) {
        if let Err(e) = &result {
            error!("Failed to {}: {}", operation, e);
        }
        self.outcomes.push((operation, result));
    }
}

/// Run the session against `device`.
///
/// The recording is played back even if the recorder failed, so a partial
/// take written on a mid-capture failure is still heard.
pub fn run_session(device: &dyn AudioDevice, plan: &SessionPlan) -> SessionReport {
    let mut report = SessionReport::default();

    let result = play_compressed(device, &plan.compressed_path).map(drop);
    report.push(Operation::PlayCompressed, result);

    let mut recorder = Recorder::new(device, plan.recording);
    let result = recorder
        .record(&plan.recording_path, plan.record_duration, plan.capture_format)
        .map(drop);
    report.push(Operation::Record, result);

    let result = play_pcm_file(device, &plan.recording_path, plan.playback_chunk_frames).map(drop);
    report.push(Operation::PlayRecording, result);

    let failed = report.failures().count();
    if failed == 0 {
        info!("Session complete");
    } else {
        info!("Session complete, {} of 3 operations failed", failed);
    }
    report
}

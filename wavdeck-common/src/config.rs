//! Configuration loading
//!
//! Settings come from one optional TOML file. The file is located in this
//! priority order:
//! 1. Explicit path (command-line `--config`)
//! 2. `WAVDECK_CONFIG` environment variable
//! 3. `<platform config dir>/wavdeck/config.toml`
//! 4. Built-in defaults (no file)
//!
//! A missing file is not an error: defaults apply and [`ConfigSource::log`]
//! warns about it once logging is up. A file that exists but does not parse
//! is an error.

use crate::{AudioFormat, Error, Result, RoundingPolicy, DEFAULT_CHUNK_FRAMES};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

/// Environment variable naming an explicit config file
pub const CONFIG_ENV_VAR: &str = "WAVDECK_CONFIG";

/// Top-level configuration file layout
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TomlConfig {
    pub logging: LoggingConfig,
    pub session: SessionConfig,
    pub capture: CaptureConfig,
    pub playback: PlaybackConfig,
    pub device: DeviceConfig,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level or filter directive (trace, debug, info, warn, error)
    pub level: String,

    /// Log file path (logs to stderr if not specified)
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
        }
    }
}

/// How a session's failed operations map to the process exit status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExitPolicy {
    /// Exit non-zero if any operation failed
    #[default]
    Strict,
    /// Always exit zero; failures are only logged
    Lenient,
}

/// The fixed three-step session: play, record, play back
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Compressed file handed to the decoder-backed player
    pub compressed_path: PathBuf,

    /// WAV file written by the recorder and then played back
    pub recording_path: PathBuf,

    /// Recording length in seconds
    pub record_seconds: f64,

    pub exit_policy: ExitPolicy,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            compressed_path: PathBuf::from("welcomeMessage.mp3"),
            recording_path: PathBuf::from("recorded_audio.wav"),
            record_seconds: 5.0,
            exit_policy: ExitPolicy::Strict,
        }
    }
}

impl SessionConfig {
    /// Recording length as a `Duration`.
    ///
    /// # Errors
    /// `Config` if the value is not a positive, finite number of seconds.
    pub fn record_duration(&self) -> Result<Duration> {
        Duration::try_from_secs_f64(self.record_seconds)
            .ok()
            .filter(|d| !d.is_zero())
            .ok_or_else(|| {
                Error::Config(format!(
                    "record_seconds must be a positive number, got {}",
                    self.record_seconds
                ))
            })
    }
}

/// Recorder settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// Capture format, also written to the WAV header
    pub format: AudioFormat,

    /// Frames per device read
    pub chunk_frames: usize,

    /// Rounding of the requested duration to whole chunks
    pub rounding: RoundingPolicy,

    /// Write the frames captured so far when the device fails mid-capture
    pub flush_partial: bool,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            format: AudioFormat::default(),
            chunk_frames: DEFAULT_CHUNK_FRAMES,
            rounding: RoundingPolicy::Ceil,
            flush_partial: true,
        }
    }
}

/// Player settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PlaybackConfig {
    /// Frames per file read / device write
    pub chunk_frames: usize,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            chunk_frames: DEFAULT_CHUNK_FRAMES,
        }
    }
}

/// Audio device selection and timing
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    /// Audio host name (None = platform default host)
    pub host: Option<String>,

    /// Input device name (None = default input device)
    pub input_device: Option<String>,

    /// Output device name (None = default output device)
    pub output_device: Option<String>,

    /// Longest a single blocking read or write may wait for the device
    pub timeout_ms: u64,

    /// Sleep between checks while waiting for the device
    pub poll_interval_ms: u64,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            host: None,
            input_device: None,
            output_device: None,
            timeout_ms: 2_000,
            poll_interval_ms: 5,
        }
    }
}

impl DeviceConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }
}

impl TomlConfig {
    /// Parse configuration from TOML text and validate it.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: TomlConfig = toml::from_str(text)
            .map_err(|e| Error::Config(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from `path`.
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))
    }

    /// Reject values no operation can run with.
    pub fn validate(&self) -> Result<()> {
        self.capture
            .format
            .validate()
            .map_err(|e| Error::Config(format!("capture.format: {}", e)))?;
        if self.capture.chunk_frames == 0 {
            return Err(Error::Config("capture.chunk_frames must be positive".to_string()));
        }
        if self.playback.chunk_frames == 0 {
            return Err(Error::Config("playback.chunk_frames must be positive".to_string()));
        }
        if self.device.timeout_ms == 0 {
            return Err(Error::Config("device.timeout_ms must be positive".to_string()));
        }
        self.session.record_duration()?;
        Ok(())
    }
}

/// Determine which config file to read, if any.
///
/// Returns `None` when neither an explicit path nor the environment names a
/// file and the platform default does not exist.
pub fn resolve_config_path(cli_arg: Option<&Path>) -> Option<PathBuf> {
    // Priority 1: Command-line argument
    if let Some(path) = cli_arg {
        return Some(path.to_path_buf());
    }

    // Priority 2: Environment variable
    if let Some(path) = std::env::var_os(CONFIG_ENV_VAR) {
        if !path.is_empty() {
            return Some(PathBuf::from(path));
        }
    }

    // Priority 3: Platform config directory
    default_config_path().filter(|p| p.exists())
}

/// `<config_dir>/wavdeck/config.toml` for the current platform.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("wavdeck").join("config.toml"))
}

/// Where the loaded configuration came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    /// Parsed from this file
    File(PathBuf),
    /// This file was named but does not exist; defaults apply
    Missing(PathBuf),
    /// No file was named or found; defaults apply
    Defaults,
}

impl ConfigSource {
    /// Report the resolution outcome. Config is read before the subscriber
    /// exists, so callers log this after initializing tracing.
    pub fn log(&self) {
        match self {
            ConfigSource::File(path) => info!("Loaded config from {}", path.display()),
            ConfigSource::Missing(path) => warn!(
                "Config file {} not found, using built-in defaults",
                path.display()
            ),
            ConfigSource::Defaults => info!("No config file found, using built-in defaults"),
        }
    }
}

/// Configuration together with its source.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config: TomlConfig,
    pub source: ConfigSource,
}

/// Resolve and load configuration with graceful fallback to defaults.
///
/// Nothing is logged here; see [`ConfigSource::log`].
///
/// # Errors
/// `Config` if a resolved file exists but cannot be parsed or validated.
/// A resolved file that does not exist falls back to defaults.
pub fn load_config(cli_arg: Option<&Path>) -> Result<LoadedConfig> {
    let Some(path) = resolve_config_path(cli_arg) else {
        return Ok(LoadedConfig {
            config: TomlConfig::default(),
            source: ConfigSource::Defaults,
        });
    };

    if !path.exists() {
        return Ok(LoadedConfig {
            config: TomlConfig::default(),
            source: ConfigSource::Missing(path),
        });
    }

    let config = TomlConfig::from_file(&path)?;
    Ok(LoadedConfig {
        config,
        source: ConfigSource::File(path),
    })
}

//! wavdeck - play, record and play back audio
//!
//! Runs the fixed session: play the compressed file, record from the
//! default input device, then play the recording back.

use std::fs::File;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Mutex;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use wavdeck::audio::CpalDevice;
use wavdeck::session::{run_session, SessionPlan};
use wavdeck_common::config::{load_config, ExitPolicy, LoadedConfig, LoggingConfig, TomlConfig};

/// Command-line arguments for wavdeck
#[derive(Parser, Debug)]
#[command(name = "wavdeck")]
#[command(about = "Play a compressed file, record from the microphone, and play it back")]
#[command(version)]
struct Args {
    /// Configuration file (overrides WAVDECK_CONFIG)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Compressed audio file to play first
    #[arg(long)]
    compressed: Option<PathBuf>,

    /// WAV file to record into and play back
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Recording length in seconds
    #[arg(short, long)]
    seconds: Option<f64>,

    /// Exit with status 0 even if an operation failed
    #[arg(long)]
    lenient: bool,

    /// List audio devices and exit
    #[arg(long)]
    list_devices: bool,
}

impl Args {
    fn apply(&self, config: &mut TomlConfig) {
        if let Some(path) = &self.compressed {
            config.session.compressed_path = path.clone();
        }
        if let Some(path) = &self.output {
            config.session.recording_path = path.clone();
        }
        if let Some(seconds) = self.seconds {
            config.session.record_seconds = seconds;
        }
        if self.lenient {
            config.session.exit_policy = ExitPolicy::Lenient;
        }
    }
}

fn main() -> ExitCode {
    match run() {
        Ok(code) => code,
        Err(e) => {
            error!("{:#}", e);
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<ExitCode> {
    let args = Args::parse();

    let LoadedConfig { mut config, source } =
        load_config(args.config.as_deref()).context("Failed to load configuration")?;
    args.apply(&mut config);

    init_tracing(&config.logging)?;
    source.log();

    let device = CpalDevice::new(&config.device).context("Failed to initialize audio host")?;

    if args.list_devices {
        let list = device.list_devices().context("Failed to list audio devices")?;
        println!("Host: {}", list.host);
        println!("Input devices:");
        for name in &list.inputs {
            println!("  {}", name);
        }
        println!("Output devices:");
        for name in &list.outputs {
            println!("  {}", name);
        }
        return Ok(ExitCode::SUCCESS);
    }

    let plan = SessionPlan::from_config(&config).context("Invalid session settings")?;
    info!("Starting wavdeck session");
    let report = run_session(&device, &plan);

    Ok(ExitCode::from(report.exit_code(config.session.exit_policy)))
}

/// Initialize tracing: `RUST_LOG` wins, then the configured level.
fn init_tracing(logging: &LoggingConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&logging.level))
        .with_context(|| format!("Invalid log level '{}'", logging.level))?;

    match &logging.file {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("Failed to create log file {}", path.display()))?;
            tracing_subscriber::registry()
                .with(filter)
                .with(
                    tracing_subscriber::fmt::layer()
                        .with_ansi(false)
                        .with_writer(Mutex::new(file)),
                )
                .init();
        }
        None => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
                .init();
        }
    }
    Ok(())
}

//! Config file resolution and graceful degradation
//!
//! Tests that touch `WAVDECK_CONFIG` are marked `#[serial]` so they do not
//! race on the process environment.

use serial_test::serial;
use std::env;
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;
use wavdeck_common::config::{
    load_config, resolve_config_path, ConfigSource, ExitPolicy, TomlConfig, CONFIG_ENV_VAR,
};
use wavdeck_common::Error;

#[test]
#[serial]
fn test_cli_path_beats_environment() {
    env::set_var(CONFIG_ENV_VAR, "/tmp/wavdeck-from-env.toml");
    let cli = PathBuf::from("/tmp/wavdeck-from-cli.toml");

    let resolved = resolve_config_path(Some(&cli));
    assert_eq!(resolved, Some(cli));

    env::remove_var(CONFIG_ENV_VAR);
}

#[test]
#[serial]
fn test_environment_path_used_without_cli() {
    env::set_var(CONFIG_ENV_VAR, "/tmp/wavdeck-from-env.toml");

    let resolved = resolve_config_path(None);
    assert_eq!(resolved, Some(PathBuf::from("/tmp/wavdeck-from-env.toml")));

    env::remove_var(CONFIG_ENV_VAR);
}

#[test]
#[serial]
fn test_missing_file_falls_back_to_defaults() {
    env::remove_var(CONFIG_ENV_VAR);
    let dir = TempDir::new().unwrap();
    let missing = dir.path().join("nope.toml");

    let loaded = load_config(Some(&missing)).unwrap();
    assert_eq!(loaded.source, ConfigSource::Missing(missing));
    assert_eq!(loaded.config.session.record_seconds, 5.0);
    assert_eq!(loaded.config.session.exit_policy, ExitPolicy::Strict);
}

#[test]
#[serial]
fn test_loads_file_from_environment() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.toml");
    fs::write(
        &path,
        "[session]\nrecord_seconds = 1.5\nexit_policy = \"lenient\"\n",
    )
    .unwrap();
    env::set_var(CONFIG_ENV_VAR, &path);

    let loaded = load_config(None).unwrap();
    assert_eq!(loaded.source, ConfigSource::File(path.clone()));
    assert_eq!(loaded.config.session.record_seconds, 1.5);
    assert_eq!(loaded.config.session.exit_policy, ExitPolicy::Lenient);

    env::remove_var(CONFIG_ENV_VAR);
}

#[test]
#[serial]
fn test_unparsable_file_is_an_error() {
    env::remove_var(CONFIG_ENV_VAR);
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("broken.toml");
    fs::write(&path, "[session\nrecord_seconds = ").unwrap();

    let result = load_config(Some(&path));
    assert!(matches!(result, Err(Error::Config(_))));
}

#[test]
fn test_from_file_reports_path() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("bad_values.toml");
    fs::write(&path, "[capture]\nchunk_frames = 0\n").unwrap();

    match TomlConfig::from_file(&path) {
        Err(Error::Config(msg)) => assert!(msg.contains("bad_values.toml"), "{}", msg),
        other => panic!("expected Config error, got {:?}", other),
    }
}

#[test]
#[serial]
fn test_resolution_outcome_is_deferred_until_logging_starts() {
    use std::io::Write;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl Write for Captured {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    env::remove_var(CONFIG_ENV_VAR);
    let dir = TempDir::new().unwrap();
    let missing = dir.path().join("nope.toml");

    let loaded = load_config(Some(&missing)).unwrap();

    let captured = Captured::default();
    let writer = captured.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_ansi(false)
        .with_writer(move || writer.clone())
        .finish();
    tracing::subscriber::with_default(subscriber, || loaded.source.log());

    let output = String::from_utf8(captured.0.lock().unwrap().clone()).unwrap();
    assert!(output.contains("WARN"), "{}", output);
    assert!(output.contains("nope.toml not found"), "{}", output);
}

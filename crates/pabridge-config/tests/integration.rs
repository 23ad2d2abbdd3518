//! Integration tests for pabridge-config.
//!
//! These tests go through the file system with temporary directories.

use pabridge_config::{BridgeConfig, ConfigError, DeviceSelector, load_or_default};
use pabridge_core::SampleFormat;
use std::fs;
use tempfile::TempDir;

#[test]
fn save_creates_parent_directories_and_loads_back() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("nested").join("dir").join("config.toml");

    let mut config = BridgeConfig::default();
    config.output.device = Some(DeviceSelector::Index(2));
    config.output.sample_rate = 96000.0;
    config.output.channels = 6;
    config.output.sample_format = SampleFormat::Int24;
    config.diagnostics.enumerate = true;

    config.save(&path).unwrap();
    assert!(path.is_file());

    let loaded = BridgeConfig::load(&path).unwrap();
    assert_eq!(loaded, config);
    assert_eq!(loaded.output.stream_format().bytes_per_frame(), 18);
}

#[test]
fn load_reports_missing_file_path() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("missing.toml");

    match BridgeConfig::load(&path) {
        Err(ConfigError::Read { path: reported, .. }) => assert_eq!(reported, path),
        other => panic!("expected Read error, got {other:?}"),
    }
    // load_or_default treats the same file as absent
    assert_eq!(load_or_default(&path).unwrap(), BridgeConfig::default());
}

#[test]
fn partial_file_keeps_other_defaults() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("config.toml");
    fs::write(
        &path,
        r#"
[output]
interleaved = false

[diagnostics]
log_filter = "pabridge_io=trace"
"#,
    )
    .unwrap();

    let config = load_or_default(&path).unwrap();
    assert!(!config.output.interleaved);
    assert_eq!(config.output.channels, 2);
    assert_eq!(config.output.sample_format, SampleFormat::Float32);
    assert_eq!(
        config.diagnostics.log_filter.as_deref(),
        Some("pabridge_io=trace")
    );
    assert!(config.diagnostics.probe_sample_rates);
}

#[test]
fn invalid_format_in_file_is_rejected() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("config.toml");
    fs::write(&path, "[output]\nchannels = 0\n").unwrap();

    assert!(matches!(
        BridgeConfig::load(&path),
        Err(ConfigError::InvalidFormat(_))
    ));
}

#[test]
fn parse_error_names_the_file() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("config.toml");
    fs::write(&path, "[output]\nsample_format = \"f16\"\n").unwrap();

    let err = BridgeConfig::load(&path).unwrap_err();
    assert!(matches!(err, ConfigError::ParseFile { .. }));
    assert!(err.to_string().contains(&path.display().to_string()));
    assert!(err.to_string().contains("f16"));
}

#[test]
fn save_into_a_file_path_fails_with_write_error() {
    let temp_dir = TempDir::new().unwrap();
    let blocker = temp_dir.path().join("not-a-dir");
    fs::write(&blocker, "").unwrap();

    let path = blocker.join("config.toml");
    match BridgeConfig::default().save(&path) {
        Err(ConfigError::Write { path: reported, .. }) => assert_eq!(reported, path),
        other => panic!("expected Write error, got {other:?}"),
    }
}

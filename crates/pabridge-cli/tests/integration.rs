//! Integration tests for pabridge-cli.
//!
//! Every test runs the binary against the built-in mock backend, so no audio
//! hardware or PortAudio installation is needed.

use std::fs;
use std::process::{Command, Output};
use tempfile::TempDir;

/// Helper to get the `pabridge` binary built by cargo, pointed at the mock
/// backend and an empty configuration.
fn pabridge_bin(config_dir: &TempDir) -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_pabridge"));
    cmd.args(["--backend", "mock", "--config"])
        .arg(config_dir.path().join("config.toml"));
    cmd
}

fn run(args: &[&str]) -> Output {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("config.toml"), "").unwrap();
    pabridge_bin(&dir)
        .args(args)
        .output()
        .expect("failed to run pabridge")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

// ---------------------------------------------------------------------------
// `pabridge devices`
// ---------------------------------------------------------------------------

#[test]
fn devices_list_shows_table_in_order() {
    let output = run(&["devices", "list"]);
    assert!(output.status.success(), "devices list failed");

    let stdout = stdout(&output);
    let mic = stdout.find("[0] Built-in Microphone").unwrap();
    let speakers = stdout
        .find("[1] Built-in Speakers (Virtual) in: 0 out: 2 48000 Hz [default output]")
        .unwrap();
    let usb = stdout.find("[2] USB Audio Interface").unwrap();
    assert!(mic < speakers && speakers < usb);
    assert!(stdout.contains("Total: 3 device(s), 2 output(s)"));
}

#[test]
fn devices_without_subcommand_lists() {
    let output = run(&["devices"]);
    assert!(output.status.success());
    assert!(stdout(&output).contains("Built-in Speakers"));
}

#[test]
fn devices_list_json_is_machine_readable() {
    let output = run(&["devices", "list", "--json"]);
    assert!(output.status.success());

    let agents: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let agents = agents.as_array().unwrap();
    assert_eq!(agents.len(), 3);
    assert_eq!(agents[2]["device_index"], 2);
    assert_eq!(agents[2]["properties"]["name"], "USB Audio Interface");
    assert_eq!(agents[2]["properties"]["output"]["max_channels"], 8);
    assert_eq!(agents[1]["properties"]["output"]["is_default"], true);
}

#[test]
fn devices_list_verbose_reports_sample_rates() {
    let output = run(&["devices", "list", "--verbose"]);
    assert!(output.status.success());

    let stdout = stdout(&output);
    assert!(stdout.contains("Number of devices = 3"));
    assert!(stdout.contains("[ Default Input ]"));
    assert!(stdout.contains("[ Default Output ]"));
    assert!(stdout.contains("full-duplex 16 bit 2 channel input, 8 channel output"));
    assert!(stdout.contains("44100, 48000, 96000"));
}

#[test]
fn devices_info_defaults_to_system_output() {
    let output = run(&["devices", "info"]);
    assert!(output.status.success());

    let stdout = stdout(&output);
    assert!(stdout.contains("Device [1]: Built-in Speakers"));
    assert!(stdout.contains("half-duplex 16 bit 2 channel output"));
}

#[test]
fn devices_info_by_partial_name() {
    let output = run(&["devices", "info", "usb"]);
    assert!(output.status.success());
    assert!(stdout(&output).contains("Device [2]: USB Audio Interface"));
}

#[test]
fn devices_info_rejects_input_only_device() {
    let output = run(&["devices", "info", "0"]);
    assert!(!output.status.success());
}

// ---------------------------------------------------------------------------
// `pabridge check`
// ---------------------------------------------------------------------------

#[test]
fn check_supported_format() {
    let output = run(&["check", "--device", "USB", "--channels", "8", "--format", "i24"]);
    assert!(output.status.success());

    let stdout = stdout(&output);
    assert!(stdout.contains("Result:  supported"));
    assert!(stdout.contains("8 channel(s)"));
}

#[test]
fn check_float64_is_not_supported() {
    let output = run(&["check", "--format", "f64"]);
    assert!(!output.status.success());

    let stdout = stdout(&output);
    assert!(stdout.contains("not translatable"));
    assert!(stdout.contains("Result:  not supported"));
}

#[test]
fn check_rejects_unsupported_rate() {
    // the USB interface does not list 88.2 kHz
    let output = run(&["check", "-d", "2", "--sample-rate", "88200"]);
    assert!(!output.status.success());
}

// ---------------------------------------------------------------------------
// `pabridge tone`
// ---------------------------------------------------------------------------

#[test]
fn tone_renders_requested_duration() {
    let output = run(&["tone", "--duration", "0.1", "--block", "480"]);
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));

    let stdout = stdout(&output);
    assert!(stdout.contains("on [1] Built-in Speakers"));
    assert!(stdout.contains("Rendered 4800 frames in 10 callbacks"));
}

#[test]
fn tone_non_interleaved_int16() {
    let output = run(&[
        "tone",
        "--duration",
        "0.01",
        "--format",
        "i16",
        "--non-interleaved",
        "--level-db",
        "-6",
    ]);
    assert!(output.status.success());
    assert!(stdout(&output).contains("Rendered 512 frames in 1 callbacks"));
}

#[test]
fn tone_unsupported_format_fails_before_playing() {
    let output = run(&["tone", "--format", "f64", "--duration", "0.01"]);
    assert!(!output.status.success());
    assert!(!stdout(&output).contains("Rendered"));
}

// ---------------------------------------------------------------------------
// Configuration file
// ---------------------------------------------------------------------------

#[test]
fn config_selects_device_and_format() {
    let dir = TempDir::new().unwrap();
    fs::write(
        dir.path().join("config.toml"),
        r#"
[output]
device = "USB"
channels = 8
sample_format = "i32"
"#,
    )
    .unwrap();

    let output = pabridge_bin(&dir).arg("check").output().unwrap();
    assert!(output.status.success());

    let stdout = stdout(&output);
    assert!(stdout.contains("Device:  [2] USB Audio Interface"));
    assert!(stdout.contains("Result:  supported"));
}

#[test]
fn invalid_config_is_an_error() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("config.toml"), "[output]\nchannels = 0\n").unwrap();

    let output = pabridge_bin(&dir).args(["devices", "list"]).output().unwrap();
    assert!(!output.status.success());
}

#[cfg(not(feature = "portaudio"))]
#[test]
fn portaudio_backend_requires_feature() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("config.toml"), "").unwrap();
    let output = Command::new(env!("CARGO_BIN_EXE_pabridge"))
        .args(["--backend", "portaudio", "--config"])
        .arg(dir.path().join("config.toml"))
        .args(["devices", "list"])
        .output()
        .unwrap();

    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("--features portaudio"));
}

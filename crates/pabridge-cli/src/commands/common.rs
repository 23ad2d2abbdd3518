//! Shared CLI helpers used across multiple commands.

use clap::{Args, ValueEnum};
use pabridge_config::{BridgeConfig, OutputConfig};
use pabridge_core::{SampleFormat, StreamFormat};
use pabridge_io::mock::MockHost;
use pabridge_io::{AcquisitionAgent, DeviceManager, ManagerOptions, NativeHost, OutputStream};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Native audio backend to run against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Backend {
    /// System PortAudio library
    Portaudio,
    /// Built-in virtual device table, rendered offline
    Mock,
}

impl Default for Backend {
    fn default() -> Self {
        if cfg!(feature = "portaudio") {
            Backend::Portaudio
        } else {
            Backend::Mock
        }
    }
}

/// How a backend drives a started stream until it finishes.
pub trait Playback: NativeHost + Sized {
    /// Run `stream` until it stops producing audio or `running` clears.
    ///
    /// `block` is the buffer size used by backends that render offline.
    fn play(stream: &mut OutputStream<Self>, running: &AtomicBool, block: usize);
}

impl Playback for MockHost {
    fn play(stream: &mut OutputStream<Self>, running: &AtomicBool, block: usize) {
        while running.load(Ordering::SeqCst) {
            match stream.native_mut().pump(block) {
                Some(pabridge_core::Continuation::Continue) => {}
                _ => break,
            }
        }
    }
}

#[cfg(feature = "portaudio")]
impl Playback for pabridge_io::portaudio::PortAudioHost {
    fn play(stream: &mut OutputStream<Self>, running: &AtomicBool, _block: usize) {
        while running.load(Ordering::SeqCst) && stream.is_active() {
            std::thread::sleep(std::time::Duration::from_millis(50));
        }
    }
}

/// Stream format overrides shared by `check` and `tone`.
///
/// Anything not given on the command line comes from the `[output]` section
/// of the configuration file.
#[derive(Args, Debug, Clone, Default)]
pub struct FormatArgs {
    /// Sample rate in Hz
    #[arg(long)]
    pub sample_rate: Option<f64>,

    /// Number of output channels
    #[arg(long)]
    pub channels: Option<u16>,

    /// Sample format: i8, u8, i16, i24, i32, f32, f64
    #[arg(long)]
    pub format: Option<SampleFormat>,

    /// One buffer per channel instead of interleaved frames
    #[arg(long)]
    pub non_interleaved: bool,
}

impl FormatArgs {
    /// Apply the overrides to the configured output format.
    pub fn resolve(&self, output: &OutputConfig) -> StreamFormat {
        let base = output.stream_format();
        StreamFormat::new(
            self.sample_rate.unwrap_or(base.sample_rate),
            self.channels.unwrap_or(base.num_channels),
            self.format.unwrap_or(base.sample_format),
        )
        .with_interleaved(base.interleaved && !self.non_interleaved)
    }
}

/// Enumeration options from the configuration, with diagnostics forced on
/// when `verbose` is set.
pub fn manager_options(config: &BridgeConfig, verbose: bool) -> ManagerOptions {
    ManagerOptions {
        diagnostics: verbose || config.diagnostics.enumerate,
        probe_sample_rates: config.diagnostics.probe_sample_rates,
    }
}

/// Resolve the output device: the command-line query, else the configured
/// device, else the system default output.
pub fn select_output_device<H: NativeHost>(
    manager: &mut DeviceManager<H>,
    query: Option<&str>,
    config: &BridgeConfig,
) -> anyhow::Result<AcquisitionAgent> {
    let configured = config.output.device.as_ref().map(|d| d.query());
    match query.map(str::to_string).or(configured) {
        Some(query) => Ok(manager.find_output_device(&query)?),
        None => Ok(manager.default_output_device()?),
    }
}

/// Install a Ctrl+C handler and return the flag it clears.
pub fn ctrlc_flag() -> anyhow::Result<Arc<AtomicBool>> {
    let running = Arc::new(AtomicBool::new(true));
    let r = Arc::clone(&running);
    ctrlc::set_handler(move || {
        println!("\nStopping...");
        r.store(false, Ordering::SeqCst);
    })?;
    Ok(running)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pabridge_config::DeviceSelector;

    #[test]
    fn format_args_override_config() {
        let output = OutputConfig::default();
        let args = FormatArgs {
            sample_rate: Some(44100.0),
            format: Some(SampleFormat::Int16),
            non_interleaved: true,
            ..FormatArgs::default()
        };
        let format = args.resolve(&output);
        assert_eq!(format.sample_rate, 44100.0);
        assert_eq!(format.num_channels, 2);
        assert_eq!(format.sample_format, SampleFormat::Int16);
        assert!(!format.interleaved);

        assert_eq!(FormatArgs::default().resolve(&output), StreamFormat::default());
    }

    #[test]
    fn command_line_device_beats_config() {
        let mut config = BridgeConfig::default();
        config.output.device = Some(DeviceSelector::Name("usb".to_string()));
        let mut manager = DeviceManager::new(MockHost::virtual_devices());

        let configured = select_output_device(&mut manager, None, &config).unwrap();
        assert_eq!(configured.properties.name, "USB Audio Interface");

        let explicit = select_output_device(&mut manager, Some("1"), &config).unwrap();
        assert_eq!(explicit.device_index, 1);

        let fallback =
            select_output_device(&mut manager, None, &BridgeConfig::default()).unwrap();
        assert_eq!(fallback.properties.name, "Built-in Speakers");
    }

    #[test]
    fn verbose_flag_forces_diagnostics() {
        let config = BridgeConfig::default();
        assert!(!manager_options(&config, false).diagnostics);
        assert!(manager_options(&config, true).diagnostics);
    }
}

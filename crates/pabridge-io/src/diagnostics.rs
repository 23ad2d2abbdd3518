//! Enumeration diagnostics.
//!
//! When diagnostics are enabled, [`crate::DeviceManager::enumerate`] builds a
//! [`DeviceReport`] for every device (default roles, latencies, and the
//! standard sample rates each direction accepts) and hands it to a
//! [`DiagnosticSink`]. [`TracingSink`] renders reports as `tracing` events;
//! [`NullSink`] drops them.
//!
//! Diagnostics never influence stream creation.

use crate::native::{
    DeviceIndex, DirectionParameters, NativeDeviceInfo, NativeHost, NativeSampleFormat,
    StreamFlags, StreamParameters,
};
use std::fmt;

/// Sample rates probed for every device, in Hz.
pub const STANDARD_SAMPLE_RATES: [f64; 12] = [
    8000.0, 9600.0, 11025.0, 12000.0, 16000.0, 22050.0, 24000.0, 32000.0, 44100.0, 48000.0,
    88200.0, 96000.0,
];

/// Native library facts reported before the devices.
#[derive(Debug, Clone, PartialEq)]
pub struct SystemSummary {
    /// Backend name.
    pub backend: String,
    /// Native version number.
    pub version: i32,
    /// Native version text.
    pub version_text: String,
    /// Devices in the table.
    pub device_count: usize,
}

/// Ways a device can be a default.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DefaultRole {
    /// System-wide default input.
    SystemInput,
    /// Default input of its host API only.
    HostApiInput,
    /// System-wide default output.
    SystemOutput,
    /// Default output of its host API only.
    HostApiOutput,
}

/// Which directions a sample-rate probe opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeDirection {
    /// Input only.
    Input,
    /// Output only.
    Output,
    /// Input and output together.
    FullDuplex,
}

/// Result of probing the standard sample rates for one direction.
#[derive(Debug, Clone, PartialEq)]
pub struct RateProbe {
    /// Directions probed.
    pub direction: ProbeDirection,
    /// Input channels used (0 for output-only).
    pub input_channels: u16,
    /// Output channels used (0 for input-only).
    pub output_channels: u16,
    /// Rates the native library accepted, in probe order.
    pub supported: Vec<f64>,
}

impl fmt::Display for RateProbe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.direction {
            ProbeDirection::Input => write!(
                f,
                "half-duplex 16 bit {} channel input",
                self.input_channels
            ),
            ProbeDirection::Output => write!(
                f,
                "half-duplex 16 bit {} channel output",
                self.output_channels
            ),
            ProbeDirection::FullDuplex => write!(
                f,
                "full-duplex 16 bit {} channel input, {} channel output",
                self.input_channels, self.output_channels
            ),
        }
    }
}

/// Everything reported about one device.
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceReport {
    /// Position in the native device table.
    pub index: DeviceIndex,
    /// Native description.
    pub info: NativeDeviceInfo,
    /// Default roles the device holds.
    pub roles: Vec<DefaultRole>,
    /// Sample-rate probes, empty when probing is disabled.
    pub probes: Vec<RateProbe>,
}

impl DeviceReport {
    /// Label such as `"Default Input, Default ALSA Output"`, or `None` when the
    /// device holds no default role.
    pub fn role_label(&self) -> Option<String> {
        let labels: Vec<String> = self
            .roles
            .iter()
            .map(|role| match role {
                DefaultRole::SystemInput => "Default Input".to_string(),
                DefaultRole::HostApiInput => format!("Default {} Input", self.info.host_api_name),
                DefaultRole::SystemOutput => "Default Output".to_string(),
                DefaultRole::HostApiOutput => {
                    format!("Default {} Output", self.info.host_api_name)
                }
            })
            .collect();

        if labels.is_empty() {
            None
        } else {
            Some(labels.join(", "))
        }
    }
}

/// Receiver for enumeration diagnostics.
pub trait DiagnosticSink: Send {
    /// Called once per enumeration, before any device.
    fn begin(&mut self, summary: &SystemSummary);

    /// Called once per enumerated device, in table order.
    fn device(&mut self, report: &DeviceReport);

    /// Called once after the last device.
    fn end(&mut self) {}
}

/// Sink that emits `tracing` events at `info` level.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl DiagnosticSink for TracingSink {
    fn begin(&mut self, summary: &SystemSummary) {
        tracing::info!(
            backend = %summary.backend,
            version = summary.version,
            version_text = %summary.version_text,
            devices = summary.device_count,
            "audio system"
        );
    }

    fn device(&mut self, report: &DeviceReport) {
        let info = &report.info;
        tracing::info!(
            index = report.index,
            name = %info.name,
            host_api = %info.host_api_name,
            role = report.role_label().as_deref().unwrap_or("-"),
            max_inputs = info.max_input_channels,
            max_outputs = info.max_output_channels,
            "device"
        );
        tracing::info!(
            index = report.index,
            low_input = info.default_low_input_latency,
            low_output = info.default_low_output_latency,
            high_input = info.default_high_input_latency,
            high_output = info.default_high_output_latency,
            default_sample_rate = info.default_sample_rate,
            "device latencies"
        );

        for probe in &report.probes {
            if probe.supported.is_empty() {
                tracing::info!(index = report.index, probe = %probe, "no standard sample rates supported");
            }
            for rate in &probe.supported {
                tracing::info!(index = report.index, probe = %probe, rate, "standard sample rate supported");
            }
        }
    }

    fn end(&mut self) {
        tracing::debug!("device enumeration finished");
    }
}

/// Sink that discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl DiagnosticSink for NullSink {
    fn begin(&mut self, _summary: &SystemSummary) {}

    fn device(&mut self, _report: &DeviceReport) {}
}

/// Default roles held by a device, given the system defaults.
///
/// A system default masks the host-API default of the same direction.
pub fn default_roles(
    index: DeviceIndex,
    info: &NativeDeviceInfo,
    system_input: Option<DeviceIndex>,
    system_output: Option<DeviceIndex>,
) -> Vec<DefaultRole> {
    let mut roles = Vec::new();

    if system_input == Some(index) {
        roles.push(DefaultRole::SystemInput);
    } else if info.is_host_api_default_input {
        roles.push(DefaultRole::HostApiInput);
    }

    if system_output == Some(index) {
        roles.push(DefaultRole::SystemOutput);
    } else if info.is_host_api_default_output {
        roles.push(DefaultRole::HostApiOutput);
    }

    roles
}

/// Probe the standard sample rates for every direction the device has.
///
/// Uses 16-bit interleaved samples at the device's maximum channel count, zero
/// suggested latency, an unspecified buffer size and no stream flags.
pub fn probe_sample_rates<H: NativeHost>(
    host: &H,
    index: DeviceIndex,
    info: &NativeDeviceInfo,
) -> Vec<RateProbe> {
    let direction = |channels: u16| DirectionParameters {
        device: Some(index),
        channel_count: channels,
        sample_format: NativeSampleFormat::INT16,
        suggested_latency: 0.0,
    };
    let input = direction(info.max_input_channels);
    let output = direction(info.max_output_channels);

    let mut probes = Vec::new();

    if info.max_input_channels > 0 {
        probes.push(RateProbe {
            direction: ProbeDirection::Input,
            input_channels: info.max_input_channels,
            output_channels: 0,
            supported: supported_rates(host, Some(input), None),
        });
    }

    if info.max_output_channels > 0 {
        probes.push(RateProbe {
            direction: ProbeDirection::Output,
            input_channels: 0,
            output_channels: info.max_output_channels,
            supported: supported_rates(host, None, Some(output)),
        });
    }

    if info.max_input_channels > 0 && info.max_output_channels > 0 {
        probes.push(RateProbe {
            direction: ProbeDirection::FullDuplex,
            input_channels: info.max_input_channels,
            output_channels: info.max_output_channels,
            supported: supported_rates(host, Some(input), Some(output)),
        });
    }

    probes
}

fn supported_rates<H: NativeHost>(
    host: &H,
    input: Option<DirectionParameters>,
    output: Option<DirectionParameters>,
) -> Vec<f64> {
    STANDARD_SAMPLE_RATES
        .iter()
        .copied()
        .filter(|&sample_rate| {
            host.is_format_supported(&StreamParameters {
                input,
                output,
                sample_rate,
                frames_per_buffer: None,
                flags: StreamFlags::NONE,
            })
        })
        .collect()
}

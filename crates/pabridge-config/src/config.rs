//! Configuration file format.

use pabridge_core::{SampleFormat, StreamFormat};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

use crate::error::ConfigError;

/// Top-level configuration.
///
/// # TOML Format
///
/// ```toml
/// [output]
/// device = "USB Audio"      # name, partial name, or index
/// sample_rate = 48000
/// channels = 2
/// sample_format = "f32"     # i8, u8, i16, i24, i32, f32
/// interleaved = true
///
/// [diagnostics]
/// enumerate = false          # report every device while enumerating
/// probe_sample_rates = true  # include standard-rate probes in reports
/// log_filter = "pabridge_io=debug"
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Output stream settings.
    pub output: OutputConfig,
    /// Enumeration reporting and logging.
    pub diagnostics: DiagnosticsConfig,
}

impl BridgeConfig {
    /// Load and validate a configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content).map_err(|e| e.in_file(path))
    }

    /// Parse and validate a configuration from a TOML string.
    pub fn from_toml_str(toml_str: &str) -> Result<Self, ConfigError> {
        let config: BridgeConfig = toml::from_str(toml_str)?;
        config.validate()?;
        Ok(config)
    }

    /// Save the configuration to a TOML file, creating parent directories.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            std::fs::create_dir_all(parent).map_err(|source| ConfigError::Write {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let content = self.to_toml()?;
        std::fs::write(path, content).map_err(|source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(())
    }

    /// Convert the configuration to a TOML string.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Reject zero channels and non-positive sample rates.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.output.stream_format().validate()?;
        Ok(())
    }
}

/// How to pick the output device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DeviceSelector {
    /// Position in the native device table.
    Index(usize),
    /// Exact or partial device name.
    Name(String),
}

impl DeviceSelector {
    /// The selector as a device query string (`"3"`, `"USB"`).
    pub fn query(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for DeviceSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceSelector::Index(index) => write!(f, "{index}"),
            DeviceSelector::Name(name) => f.write_str(name),
        }
    }
}

/// Output stream settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Device to open; `None` uses the system default output.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device: Option<DeviceSelector>,
    /// Frames per second.
    pub sample_rate: f64,
    /// Channels per frame.
    pub channels: u16,
    /// Sample encoding.
    pub sample_format: SampleFormat,
    /// Whether channels share one buffer.
    pub interleaved: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        let format = StreamFormat::default();
        Self {
            device: None,
            sample_rate: format.sample_rate,
            channels: format.num_channels,
            sample_format: format.sample_format,
            interleaved: format.interleaved,
        }
    }
}

impl OutputConfig {
    /// The stream format these settings describe.
    pub fn stream_format(&self) -> StreamFormat {
        StreamFormat::new(self.sample_rate, self.channels, self.sample_format)
            .with_interleaved(self.interleaved)
    }
}

/// Enumeration reporting and logging.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiagnosticsConfig {
    /// Report every device while enumerating.
    pub enumerate: bool,
    /// Include standard sample-rate probes in device reports.
    pub probe_sample_rates: bool,
    /// Default `tracing` filter when `RUST_LOG` is unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_filter: Option<String>,
}

impl Default for DiagnosticsConfig {
    fn default() -> Self {
        Self {
            enumerate: false,
            probe_sample_rates: true,
            log_filter: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_is_default() {
        let config = BridgeConfig::from_toml_str("").unwrap();
        assert_eq!(config, BridgeConfig::default());
        assert_eq!(config.output.stream_format(), StreamFormat::default());
        assert!(!config.diagnostics.enumerate);
        assert!(config.diagnostics.probe_sample_rates);
    }

    #[test]
    fn device_selector_accepts_index_or_name() {
        let by_index = BridgeConfig::from_toml_str("[output]\ndevice = 3").unwrap();
        assert_eq!(by_index.output.device, Some(DeviceSelector::Index(3)));
        assert_eq!(by_index.output.device.unwrap().query(), "3");

        let by_name = BridgeConfig::from_toml_str("[output]\ndevice = \"Speakers\"").unwrap();
        assert_eq!(
            by_name.output.device,
            Some(DeviceSelector::Name("Speakers".to_string()))
        );
    }

    #[test]
    fn sample_format_long_and_short_names() {
        let long = BridgeConfig::from_toml_str("[output]\nsample_format = \"int24\"").unwrap();
        assert_eq!(long.output.sample_format, SampleFormat::Int24);
        let short = BridgeConfig::from_toml_str("[output]\nsample_format = \"u8\"").unwrap();
        assert_eq!(short.output.sample_format, SampleFormat::UInt8);
    }

    #[test]
    fn integer_sample_rate_is_accepted() {
        let config = BridgeConfig::from_toml_str("[output]\nsample_rate = 44100").unwrap();
        assert_eq!(config.output.sample_rate, 44100.0);
    }

    #[test]
    fn validation_rejects_bad_formats() {
        assert!(matches!(
            BridgeConfig::from_toml_str("[output]\nchannels = 0"),
            Err(ConfigError::InvalidFormat(_))
        ));
        assert!(matches!(
            BridgeConfig::from_toml_str("[output]\nsample_rate = -1.0"),
            Err(ConfigError::InvalidFormat(_))
        ));
    }

    #[test]
    fn unknown_sample_format_is_a_parse_error() {
        assert!(matches!(
            BridgeConfig::from_toml_str("[output]\nsample_format = \"f16\""),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn toml_roundtrip_keeps_settings() {
        let mut config = BridgeConfig::default();
        config.output.device = Some(DeviceSelector::Name("USB".to_string()));
        config.output.interleaved = false;
        config.diagnostics.log_filter = Some("debug".to_string());

        let text = config.to_toml().unwrap();
        assert_eq!(BridgeConfig::from_toml_str(&text).unwrap(), config);
    }
}

//! Configuration for the pabridge output adapter.
//!
//! A single TOML file describes the output stream to open and how much
//! enumeration detail to report. Every field has a default, so an empty file
//! (or no file at all) is a valid configuration.
//!
//! # Example
//!
//! ```rust
//! use pabridge_config::{BridgeConfig, DeviceSelector};
//! use pabridge_core::SampleFormat;
//!
//! let config = BridgeConfig::from_toml_str(
//!     r#"
//!     [output]
//!     device = "USB"
//!     sample_rate = 44100
//!     sample_format = "i16"
//!
//!     [diagnostics]
//!     enumerate = true
//!     "#,
//! )
//! .unwrap();
//!
//! assert_eq!(config.output.device, Some(DeviceSelector::Name("USB".into())));
//! let format = config.output.stream_format();
//! assert_eq!(format.sample_format, SampleFormat::Int16);
//! assert_eq!(format.num_channels, 2);
//! ```

mod config;
mod error;

/// Platform-specific configuration paths.
pub mod paths;

pub use config::{BridgeConfig, DeviceSelector, DiagnosticsConfig, OutputConfig};
pub use error::ConfigError;
pub use paths::{default_config_path, load_or_default, user_config_dir};

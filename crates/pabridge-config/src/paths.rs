//! Platform-specific configuration paths.
//!
//! # Directory Structure
//!
//! - **User config**: `~/.config/pabridge/` (Linux), `~/Library/Application Support/pabridge/` (macOS), `%APPDATA%\pabridge\` (Windows)
//! - **Config file**: `config.toml` inside the user config directory
//!
//! # Example
//!
//! ```rust,no_run
//! use pabridge_config::paths;
//!
//! let config = paths::load_or_default(&paths::default_config_path()).unwrap();
//! println!("output: {}", config.output.stream_format());
//! ```

use std::path::{Path, PathBuf};

use crate::config::BridgeConfig;
use crate::error::ConfigError;

/// Application name used for directory paths.
const APP_NAME: &str = "pabridge";

/// File name of the configuration file.
const CONFIG_FILE: &str = "config.toml";

/// Returns the user-specific configuration directory.
///
/// # Platform Paths
///
/// - Linux: `~/.config/pabridge/`
/// - macOS: `~/Library/Application Support/pabridge/`
/// - Windows: `%APPDATA%\pabridge\`
///
/// Returns a fallback path if the config directory cannot be determined.
pub fn user_config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_NAME)
}

/// Path of the configuration file used when none is given.
pub fn default_config_path() -> PathBuf {
    user_config_dir().join(CONFIG_FILE)
}

/// Load the configuration at `path`, or the defaults if the file does not
/// exist. A file that exists but fails to parse is an error.
pub fn load_or_default(path: &Path) -> Result<BridgeConfig, ConfigError> {
    if path.is_file() {
        BridgeConfig::load(path)
    } else {
        Ok(BridgeConfig::default())
    }
}

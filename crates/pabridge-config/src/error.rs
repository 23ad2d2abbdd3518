//! Configuration errors.

use pabridge_core::FormatError;
use std::path::PathBuf;
use thiserror::Error;

/// Why a configuration could not be loaded or saved.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("cannot read {}: {source}", .path.display())]
    Read {
        /// File that was opened.
        path: PathBuf,
        /// I/O failure.
        #[source]
        source: std::io::Error,
    },

    /// The config file, or a directory above it, could not be written.
    #[error("cannot write {}: {source}", .path.display())]
    Write {
        /// File or directory that was written.
        path: PathBuf,
        /// I/O failure.
        #[source]
        source: std::io::Error,
    },

    /// A config file is not valid TOML for this schema.
    #[error("{}: {source}", .path.display())]
    ParseFile {
        /// File that was parsed.
        path: PathBuf,
        /// Parser diagnostic, with line and column.
        #[source]
        source: toml::de::Error,
    },

    /// An in-memory document is not valid TOML for this schema.
    #[error(transparent)]
    Parse(#[from] toml::de::Error),

    /// The configuration could not be written out as TOML.
    #[error(transparent)]
    Serialize(#[from] toml::ser::Error),

    /// The `[output]` section describes an unusable stream format.
    #[error("invalid [output] format: {0}")]
    InvalidFormat(#[from] FormatError),
}

impl ConfigError {
    /// Attach the file a parse error came from.
    pub(crate) fn in_file(self, path: impl Into<PathBuf>) -> Self {
        match self {
            ConfigError::Parse(source) => ConfigError::ParseFile {
                path: path.into(),
                source,
            },
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn parse_errors_name_their_file() {
        let source = toml::from_str::<toml::Table>("channels = ").unwrap_err();
        let err = ConfigError::Parse(source).in_file("/etc/pabridge/config.toml");

        assert!(matches!(err, ConfigError::ParseFile { .. }));
        assert!(err.to_string().starts_with("/etc/pabridge/config.toml: "));
        assert!(err.source().is_some());
    }

    #[test]
    fn in_file_keeps_other_errors() {
        let err = ConfigError::from(FormatError::InvalidChannelCount(0)).in_file("config.toml");
        assert_eq!(
            err.to_string(),
            "invalid [output] format: invalid channel count: 0 (must be at least 1)"
        );
    }

    #[test]
    fn io_errors_keep_their_cause() {
        let err = ConfigError::Write {
            path: PathBuf::from("/readonly/config.toml"),
            source: std::io::Error::from(std::io::ErrorKind::PermissionDenied),
        };
        assert!(err.to_string().starts_with("cannot write /readonly/config.toml"));
        assert!(err.source().is_some());
    }
}

//! Configuration error types.
//!
//! Every configuration problem is detected while loading and compiling the
//! configuration, before any cluster is contacted.

use std::path::PathBuf;

use thiserror::Error;

/// A result type using `ConfigError`.
pub type Result<T> = std::result::Result<T, ConfigError>;

/// Errors raised while loading or compiling a driftscan configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("failed to read config file {}: {source}", path.display())]
    Read {
        /// Path that was read.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The configuration document is not valid YAML for the expected schema.
    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_yaml::Error),

    /// A regular expression in the configuration failed to compile.
    #[error("invalid {field} pattern '{pattern}': {source}")]
    InvalidPattern {
        /// Configuration field holding the pattern.
        field: &'static str,
        /// The offending pattern text.
        pattern: String,
        /// Regex compilation error.
        #[source]
        source: regex::Error,
    },

    /// A value is outside its accepted range.
    #[error("invalid configuration value: {0}")]
    InvalidValue(String),
}

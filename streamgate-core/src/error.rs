//! Error types for streamgate-core.

use std::path::PathBuf;

use thiserror::Error;

/// All errors that can arise while loading or validating configuration.
///
/// Every variant is fatal to a batch: nothing is processed until the
/// configuration is valid.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A required environment variable (or YAML key) is missing or blank.
    #[error("missing required configuration value {name}")]
    Missing { name: &'static str },

    /// A value is present but unusable.
    #[error("invalid configuration value {name}: {reason}")]
    Invalid { name: &'static str, reason: String },

    /// Underlying I/O failure reading a config file.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// YAML parse error on load — includes file path and line context from serde_yaml.
    #[error("failed to parse config at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// The config file did not exist at the given path.
    #[error("config not found at {path}")]
    NotFound { path: PathBuf },
}

//! Error types for slate-core.

use std::path::PathBuf;

use thiserror::Error;

/// All errors that can arise while loading configuration or building the
/// run context.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Underlying I/O failure while reading a config file.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// YAML parse error on load; includes file path and line context from serde_yaml.
    #[error("failed to parse config at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// The project config file did not exist at the expected path.
    #[error("project config not found at {path}")]
    NotFound { path: PathBuf },

    /// The requested environment is missing from the theme config.
    #[error("environment '{env}' not defined in {path}")]
    UnknownEnvironment { env: String, path: PathBuf },

    /// Some but not all remote store credentials were provided.
    #[error("incomplete remote store credentials in environment '{env}': missing {missing}")]
    IncompleteCredentials { env: String, missing: String },

    /// An `ignore_files` entry is not a valid glob.
    #[error("invalid ignore pattern '{pattern}': {source}")]
    Pattern {
        pattern: String,
        #[source]
        source: glob::PatternError,
    },

    /// Source and output roots must be distinct, non-nested directories.
    #[error("source root {source_root} and output root {dest_root} overlap")]
    OverlappingRoots {
        source_root: PathBuf,
        dest_root: PathBuf,
    },
}

pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> ConfigError {
    ConfigError::Io {
        path: path.into(),
        source,
    }
}

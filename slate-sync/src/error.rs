//! Error types for slate-sync.

use std::path::PathBuf;

use thiserror::Error;

use slate_core::{AssetKey, ConfigError};

/// All errors that can arise from copy and store operations.
#[derive(Debug, Error)]
pub enum SyncError {
    /// An error from configuration.
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// An I/O error, with annotated path for context.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Directory traversal failed during a bulk copy.
    #[error("walk error under {root}: {source}")]
    Walk {
        root: PathBuf,
        #[source]
        source: walkdir::Error,
    },

    /// The remote store answered with a non-success status.
    #[error("remote store rejected {key}: HTTP {status}: {body}")]
    Remote {
        key: AssetKey,
        status: u16,
        body: String,
    },

    /// The request never got an answer (DNS, TLS, connection, timeout).
    #[error("remote store unreachable for {key}: {message}")]
    Transport { key: AssetKey, message: String },

    /// JSON serialization error while encoding a store request.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Convenience constructor for [`SyncError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> SyncError {
    SyncError::Io {
        path: path.into(),
        source,
    }
}

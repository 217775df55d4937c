use std::net::SocketAddr;
use std::path::PathBuf;

use thiserror::Error;

/// Error surface for the watch session, bundler and reload endpoint.
#[derive(Debug, Error)]
pub enum WatchError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("notify error: {0}")]
    Notify(#[from] notify::Error),

    #[error("failed to start bundler '{command}': {source}")]
    BundlerSpawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("build failed: {0}")]
    BuildFailed(String),

    #[error("no bundler configured (add a `js` section to slate.yaml)")]
    NoBundler,

    #[error("cannot bind reload endpoint on {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("{0}")]
    Task(String),
}

pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> WatchError {
    WatchError::Io {
        path: path.into(),
        source,
    }
}

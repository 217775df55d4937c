//! Watch session runtime: dual tree watcher + bundler + sync coordinator +
//! reload endpoint.

pub mod bundler;
pub mod coordinator;
mod error;
pub mod paths;
pub mod reload;
mod runtime;
pub mod watcher;

pub use bundler::{Bundler, BundlerReport};
pub use coordinator::{Dispatcher, FileState, SyncCoordinator, SyncOutcome};
pub use error::WatchError;
pub use reload::{ReloadChannel, ReloadHub, ReloadServer};
pub use runtime::{
    build_blocking, init_tracing, run, watch_blocking, RunningSession, WatchSession,
};

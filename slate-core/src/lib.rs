//! Slate core library: shared types, configuration, path translation and
//! ignore matching.
//!
//! - [`types`]: file events, asset keys, build stats
//! - [`config`]: `slate.yaml` / `config.yml` loading and the run [`Context`]
//! - [`paths`]: [`PathTranslator`]
//! - [`ignore`]: [`IgnoreFilter`]
//! - [`error`]: [`ConfigError`]

pub mod config;
pub mod error;
pub mod ignore;
pub mod paths;
pub mod types;

pub use config::{
    BundlerConfig, Context, ProjectConfig, ReloadConfig, RemoteCredentials, SyncMode,
    ThemeSettings,
};
pub use error::ConfigError;
pub use ignore::IgnoreFilter;
pub use paths::PathTranslator;
pub use types::{Asset, AssetKey, AssetSize, BuildStats, FileEvent, FileEventKind};

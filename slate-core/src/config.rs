//! Project and theme configuration, and the run [`Context`].
//!
//! # Storage layout
//!
//! ```text
//! <root>/
//!   slate.yaml    (in / out / js / reload)
//!   config.yml    (per-environment theme settings: ignore_files + store credentials)
//! ```
//!
//! # API pattern
//!
//! Loaders take the project root explicitly (`*_at(root, …)`); the CLI passes
//! the current directory, tests pass a `TempDir`.

use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{io_err, ConfigError};
use crate::ignore::IgnoreFilter;
use crate::paths::PathTranslator;

pub const PROJECT_CONFIG_FILE: &str = "slate.yaml";
pub const THEME_CONFIG_FILE: &str = "config.yml";
pub const DEFAULT_ENVIRONMENT: &str = "development";
pub const DEFAULT_RELOAD_PORT: u16 = 3000;
pub const DEFAULT_API_VERSION: &str = "2024-01";

// ---------------------------------------------------------------------------
// 1. slate.yaml
// ---------------------------------------------------------------------------

/// Contents of `slate.yaml`. Paths are relative to the project root.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ProjectConfig {
    #[serde(rename = "in")]
    pub source: PathBuf,
    #[serde(rename = "out")]
    pub dest: PathBuf,
    #[serde(default)]
    pub js: Option<BundlerConfig>,
    #[serde(default)]
    pub reload: ReloadConfig,
}

/// How to invoke the external bundler.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct BundlerConfig {
    pub command: String,
    /// Arguments for a one-shot build.
    #[serde(default)]
    pub args: Vec<String>,
    /// Arguments for the bundler's own watch loop.
    #[serde(default)]
    pub watch_args: Vec<String>,
    /// Subdirectory of the output tree the bundler writes its assets to.
    #[serde(default)]
    pub output: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ReloadConfig {
    #[serde(default = "default_reload_port")]
    pub port: u16,
}

impl Default for ReloadConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_RELOAD_PORT,
        }
    }
}

fn default_reload_port() -> u16 {
    DEFAULT_RELOAD_PORT
}

/// `<root>/slate.yaml`. Pure, no I/O.
pub fn project_path_at(root: &Path) -> PathBuf {
    root.join(PROJECT_CONFIG_FILE)
}

/// Load `<root>/slate.yaml`.
pub fn load_project_at(root: &Path) -> Result<ProjectConfig, ConfigError> {
    let path = project_path_at(root);
    if !path.exists() {
        return Err(ConfigError::NotFound { path });
    }
    let contents = fs::read_to_string(&path).map_err(|e| io_err(&path, e))?;
    serde_yaml::from_str(&contents).map_err(|source| ConfigError::Parse { path, source })
}

// ---------------------------------------------------------------------------
// 2. config.yml
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ThemeIdRepr {
    Number(u64),
    Text(String),
}

impl fmt::Display for ThemeIdRepr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ThemeIdRepr::Number(n) => n.fmt(f),
            ThemeIdRepr::Text(s) => s.fmt(f),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct ThemeEnvironment {
    #[serde(default)]
    ignore_files: Vec<String>,
    store: Option<String>,
    password: Option<String>,
    theme_id: Option<ThemeIdRepr>,
    api_version: Option<String>,
}

/// Credentials for the remote theme store.
#[derive(Clone, PartialEq, Eq)]
pub struct RemoteCredentials {
    pub store: String,
    pub password: String,
    pub theme_id: String,
    pub api_version: String,
}

impl fmt::Debug for RemoteCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteCredentials")
            .field("store", &self.store)
            .field("password", &"<redacted>")
            .field("theme_id", &self.theme_id)
            .field("api_version", &self.api_version)
            .finish()
    }
}

/// Whether the watch session talks to a remote store at all.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncMode {
    /// No credentials (or `--local`): sync and unsync succeed without
    /// contacting anything.
    LocalOnly,
    Remote(RemoteCredentials),
}

impl SyncMode {
    pub fn label(&self) -> String {
        match self {
            SyncMode::LocalOnly => "local-only".to_string(),
            SyncMode::Remote(creds) => format!("remote {} (theme {})", creds.store, creds.theme_id),
        }
    }
}

/// Theme settings for the selected environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThemeSettings {
    pub environment: String,
    pub ignore_files: Vec<String>,
    pub mode: SyncMode,
}

impl ThemeSettings {
    pub fn local_only(environment: impl Into<String>) -> Self {
        Self {
            environment: environment.into(),
            ignore_files: Vec::new(),
            mode: SyncMode::LocalOnly,
        }
    }
}

/// `<root>/config.yml`. Pure, no I/O.
pub fn theme_path_at(root: &Path) -> PathBuf {
    root.join(THEME_CONFIG_FILE)
}

/// Load the `env` section of `<root>/config.yml`.
///
/// A missing file yields local-only settings with no ignore rules. A file
/// without the requested environment is an error.
pub fn load_theme_at(root: &Path, env: &str) -> Result<ThemeSettings, ConfigError> {
    let path = theme_path_at(root);
    if !path.exists() {
        return Ok(ThemeSettings::local_only(env));
    }
    let contents = fs::read_to_string(&path).map_err(|e| io_err(&path, e))?;
    let mut environments: HashMap<String, Option<ThemeEnvironment>> =
        serde_yaml::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.clone(),
            source,
        })?;

    let section = environments
        .remove(env)
        .ok_or_else(|| ConfigError::UnknownEnvironment {
            env: env.to_string(),
            path: path.clone(),
        })?
        .unwrap_or_default();

    let mode = credentials_from(env, &section)?;
    Ok(ThemeSettings {
        environment: env.to_string(),
        ignore_files: section.ignore_files,
        mode,
    })
}

fn credentials_from(env: &str, section: &ThemeEnvironment) -> Result<SyncMode, ConfigError> {
    let store = section.store.as_deref().filter(|s| !s.trim().is_empty());
    let password = section.password.as_deref().filter(|s| !s.trim().is_empty());
    let theme_id = section.theme_id.as_ref().map(ThemeIdRepr::to_string);

    if store.is_none() && password.is_none() && theme_id.is_none() {
        return Ok(SyncMode::LocalOnly);
    }

    let mut missing = Vec::new();
    if store.is_none() {
        missing.push("store");
    }
    if password.is_none() {
        missing.push("password");
    }
    if theme_id.is_none() {
        missing.push("theme_id");
    }
    let (Some(store), Some(password), Some(theme_id)) = (store, password, theme_id) else {
        return Err(ConfigError::IncompleteCredentials {
            env: env.to_string(),
            missing: missing.join(", "),
        });
    };

    Ok(SyncMode::Remote(RemoteCredentials {
        store: store.to_string(),
        password: password.to_string(),
        theme_id,
        api_version: section
            .api_version
            .clone()
            .unwrap_or_else(|| DEFAULT_API_VERSION.to_string()),
    }))
}

// ---------------------------------------------------------------------------
// 3. Run context
// ---------------------------------------------------------------------------

/// Everything a run needs, built once and shared read-only by every stage.
#[derive(Debug, Clone)]
pub struct Context {
    pub root: PathBuf,
    pub source_root: PathBuf,
    pub dest_root: PathBuf,
    pub translator: PathTranslator,
    pub ignore: IgnoreFilter,
    pub mode: SyncMode,
    pub environment: String,
    pub bundler: Option<BundlerConfig>,
    pub reload: ReloadConfig,
}

impl Context {
    /// Resolve `project` against `root` and compile the theme's ignore rules.
    /// `force_local` turns the session into local-only mode regardless of
    /// credentials.
    pub fn new(
        root: &Path,
        project: ProjectConfig,
        theme: ThemeSettings,
        force_local: bool,
    ) -> Result<Self, ConfigError> {
        let root = resolve_existing(root);
        let source_root = resolve_existing(&root.join(&project.source));
        let dest_root = resolve_existing(&root.join(&project.dest));

        if source_root.starts_with(&dest_root) || dest_root.starts_with(&source_root) {
            return Err(ConfigError::OverlappingRoots {
                source_root,
                dest_root,
            });
        }

        let ignore = IgnoreFilter::new(&theme.ignore_files)?;
        let mode = if force_local {
            SyncMode::LocalOnly
        } else {
            theme.mode
        };

        Ok(Self {
            translator: PathTranslator::new(&source_root, &dest_root),
            root,
            source_root,
            dest_root,
            ignore,
            mode,
            environment: theme.environment,
            bundler: project.js,
            reload: project.reload,
        })
    }

    /// Load `slate.yaml` and the `env` section of `config.yml` from `root`.
    pub fn load_at(root: &Path, env: &str, force_local: bool) -> Result<Self, ConfigError> {
        let project = load_project_at(root)?;
        let theme = load_theme_at(root, env)?;
        Self::new(root, project, theme, force_local)
    }

    /// Whether `key` is excluded from copy, watch and sync.
    pub fn is_ignored(&self, key: &str) -> bool {
        self.ignore.is_ignored(key)
    }
}

/// Canonicalize `path` if it (or its parent) exists so watcher paths, which
/// arrive canonical on some platforms, match the roots.
fn resolve_existing(path: &Path) -> PathBuf {
    if let Ok(canonical) = fs::canonicalize(path) {
        return canonical;
    }
    match (path.parent(), path.file_name()) {
        (Some(parent), Some(name)) => fs::canonicalize(parent)
            .map(|p| p.join(name))
            .unwrap_or_else(|_| path.to_path_buf()),
        _ => path.to_path_buf(),
    }
}

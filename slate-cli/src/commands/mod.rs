pub mod build;
pub mod copy;
pub mod watch;

use std::path::PathBuf;

use anyhow::{Context as _, Result};
use clap::Args;

use slate_core::{config::DEFAULT_ENVIRONMENT, Context};

/// Flags shared by every subcommand.
#[derive(Args, Debug)]
pub struct GlobalArgs {
    /// Project root containing slate.yaml (defaults to the current directory).
    #[arg(long, global = true)]
    pub root: Option<PathBuf>,

    /// Environment section of config.yml to use.
    #[arg(long = "env", global = true, default_value = DEFAULT_ENVIRONMENT)]
    pub environment: String,

    /// Never contact the remote store, even when credentials are configured.
    #[arg(long, global = true)]
    pub local: bool,
}

impl GlobalArgs {
    pub fn root(&self) -> Result<PathBuf> {
        match &self.root {
            Some(root) => Ok(root.clone()),
            None => std::env::current_dir().context("could not determine current directory"),
        }
    }

    /// Load the run context from the project root.
    pub fn context(&self) -> Result<Context> {
        let root = self.root()?;
        Context::load_at(&root, &self.environment, self.local)
            .with_context(|| format!("failed to load project config from {}", root.display()))
    }
}

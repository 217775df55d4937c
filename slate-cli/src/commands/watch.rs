//! `slate watch`: copy, then run the watch session until ctrl-c.

use anyhow::{Context as _, Result};
use clap::Args;
use colored::Colorize;

use slate_core::SyncMode;
use slate_sync::connect;

use super::copy::{copy_stage, print_summary};
use super::GlobalArgs;

/// Arguments for `slate watch`.
#[derive(Args, Debug)]
pub struct WatchArgs {}

impl WatchArgs {
    pub fn run(self, global: &GlobalArgs) -> Result<()> {
        let ctx = global.context()?;
        let summary = copy_stage(&ctx)?;
        print_summary(&ctx, &summary);

        if ctx.mode == SyncMode::LocalOnly {
            println!(
                "{} local-only: output is mirrored, nothing is uploaded",
                "!".yellow()
            );
        }

        let store = connect(&ctx.mode);
        slate_watch::watch_blocking(ctx, store).context("watch session failed")
    }
}

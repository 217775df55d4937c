//! `slate copy`: rebuild the output tree.

use anyhow::{Context as _, Result};
use clap::Args;
use colored::Colorize;

use slate_core::Context;
use slate_sync::{copy_tree, CopySummary};

use super::GlobalArgs;

/// Arguments for `slate copy`.
#[derive(Args, Debug)]
pub struct CopyArgs {}

impl CopyArgs {
    pub fn run(self, global: &GlobalArgs) -> Result<()> {
        let ctx = global.context()?;
        let summary = copy_stage(&ctx)?;
        print_summary(&ctx, &summary);
        Ok(())
    }
}

/// Full copy shared by every subcommand; any failure is fatal.
pub fn copy_stage(ctx: &Context) -> Result<CopySummary> {
    copy_tree(ctx).with_context(|| {
        format!(
            "copying {} into {} failed",
            ctx.source_root.display(),
            ctx.dest_root.display()
        )
    })
}

pub fn print_summary(ctx: &Context, summary: &CopySummary) {
    println!(
        "{} copied {} files into {}",
        "✓".green(),
        summary.files,
        ctx.dest_root.display()
    );
    if summary.ignored > 0 {
        println!("  {} {} ignored", "·".dimmed(), summary.ignored);
    }
}

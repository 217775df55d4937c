//! `slate build`: copy, then a one-shot bundler run.

use anyhow::{Context as _, Result};
use clap::Args;
use colored::Colorize;
use tabled::{settings::Style, Table, Tabled};

use slate_core::BuildStats;

use super::copy::{copy_stage, print_summary};
use super::GlobalArgs;

/// Arguments for `slate build`.
#[derive(Args, Debug)]
pub struct BuildArgs {}

impl BuildArgs {
    pub fn run(self, global: &GlobalArgs) -> Result<()> {
        let ctx = global.context()?;
        let summary = copy_stage(&ctx)?;
        print_summary(&ctx, &summary);

        let stats = slate_watch::build_blocking(&ctx).context("build failed")?;
        print_stats(&stats);
        Ok(())
    }
}

#[derive(Tabled)]
struct AssetRow {
    #[tabled(rename = "asset")]
    filename: String,
    #[tabled(rename = "size")]
    size: String,
}

fn print_stats(stats: &BuildStats) {
    println!(
        "{} built in {}ms",
        "✓".green(),
        stats.duration_ms.to_string().bold()
    );
    if stats.assets.is_empty() {
        return;
    }

    let rows: Vec<AssetRow> = stats
        .assets
        .iter()
        .map(|asset| AssetRow {
            filename: asset.filename.clone(),
            size: asset.size.to_string(),
        })
        .collect();
    let mut table = Table::new(rows);
    table.with(Style::rounded());
    println!("{table}");
}

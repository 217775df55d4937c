//! Slate: watch, build and sync a theme project.
//!
//! # Usage
//!
//! ```text
//! slate copy  [--root <dir>] [--env <name>]
//! slate build [--root <dir>] [--env <name>]
//! slate watch [--root <dir>] [--env <name>] [--local]
//! ```

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};

use commands::{build::BuildArgs, copy::CopyArgs, watch::WatchArgs, GlobalArgs};

#[derive(Parser, Debug)]
#[command(
    name = "slate",
    version,
    about = "Mirror a theme's source tree, run its bundler and sync the result",
    long_about = None,
)]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Rebuild the output tree from the source tree.
    Copy(CopyArgs),

    /// Copy, then run the bundler once.
    Build(BuildArgs),

    /// Copy, then watch both trees and sync every change.
    Watch(WatchArgs),
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    slate_watch::init_tracing();
    match cli.command {
        Commands::Copy(args) => args.run(&cli.global),
        Commands::Build(args) => args.run(&cli.global),
        Commands::Watch(args) => args.run(&cli.global),
    }
}

//! External bundler driver.
//!
//! The bundler writes its assets into the output tree and reports on stdout,
//! one JSON object per line: build stats, or `{"error": "..."}`. Anything
//! else is passed through to the debug log.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::time::Instant;

use serde_json::Value;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::{broadcast, mpsc};

use slate_core::{BuildStats, BundlerConfig, Context, FileEvent, FileEventKind};

use crate::error::WatchError;
use crate::watcher::output_event;

/// One parsed stdout line.
#[derive(Debug, Clone, PartialEq)]
pub enum BundlerReport {
    Built(BuildStats),
    Failed(String),
}

/// Parse a bundler stdout line. `None` for plain log output.
pub fn parse_report(line: &str) -> Option<BundlerReport> {
    let line = line.trim();
    if !line.starts_with('{') {
        return None;
    }
    let value: Value = serde_json::from_str(line).ok()?;
    if let Some(error) = value.get("error") {
        let message = match error {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        return Some(BundlerReport::Failed(message));
    }
    serde_json::from_value::<BuildStats>(value)
        .ok()
        .map(BundlerReport::Built)
}

#[derive(Debug, Clone)]
pub struct Bundler {
    config: BundlerConfig,
    cwd: PathBuf,
    output_dir: PathBuf,
}

impl Bundler {
    pub fn new(config: BundlerConfig, cwd: impl Into<PathBuf>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            config,
            cwd: cwd.into(),
            output_dir: output_dir.into(),
        }
    }

    /// `None` when the project has no `js` section.
    pub fn from_context(ctx: &Context) -> Option<Self> {
        let config = ctx.bundler.clone()?;
        let output_dir = ctx.dest_root.join(&config.output);
        Some(Self::new(config, &ctx.root, output_dir))
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    fn command(&self, args: &[String]) -> Command {
        let mut cmd = Command::new(&self.config.command);
        cmd.args(args)
            .current_dir(&self.cwd)
            .env("SLATE_OUTPUT_DIR", &self.output_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }

    fn spawn_err(&self, source: std::io::Error) -> WatchError {
        WatchError::BundlerSpawn {
            command: self.config.command.clone(),
            source,
        }
    }

    /// Run the bundler once and wait for it.
    pub async fn build(&self) -> Result<BuildStats, WatchError> {
        tracing::info!("building");
        let started = Instant::now();

        let output = self
            .command(&self.config.args)
            .output()
            .await
            .map_err(|e| self.spawn_err(e))?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        let mut stats = None;
        for line in stdout.lines() {
            match parse_report(line) {
                Some(BundlerReport::Built(built)) => stats = Some(built),
                Some(BundlerReport::Failed(message)) => {
                    tracing::error!("build failed: {message}");
                    return Err(WatchError::BuildFailed(message));
                }
                None if !line.trim().is_empty() => tracing::debug!("bundler: {line}"),
                None => {}
            }
        }

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let message = match stderr.trim() {
                "" => format!("{} exited with {}", self.config.command, output.status),
                detail => format!("{} exited with {}: {detail}", self.config.command, output.status),
            };
            tracing::error!("build failed: {message}");
            return Err(WatchError::BuildFailed(message));
        }

        // A silent bundler still built something; report what we measured.
        let stats = stats.unwrap_or_else(|| BuildStats {
            duration_ms: started.elapsed().as_millis() as u64,
            assets: Vec::new(),
        });
        tracing::info!("{}", stats.summary());
        Ok(stats)
    }

    /// Start the bundler's own watch loop. The child dies with the handle.
    pub fn spawn_watch(&self) -> Result<Child, WatchError> {
        let child = self
            .command(&self.config.watch_args)
            .spawn()
            .map_err(|e| self.spawn_err(e))?;
        tracing::info!(command = %self.config.command, "bundler watching");
        Ok(child)
    }
}

/// Output-tree events for every reported asset that exists on disk. Assets
/// pass the same filter as output watcher events, so ignored or scratch
/// files are never published.
pub fn asset_events(ctx: &Context, output_dir: &Path, stats: &BuildStats) -> Vec<FileEvent> {
    stats
        .assets
        .iter()
        .map(|asset| output_dir.join(&asset.filename))
        .filter(|path| path.is_file())
        .filter_map(|path| output_event(ctx, FileEventKind::Changed, &path))
        .collect()
}

/// Drive a running watch-mode bundler until shutdown. Build errors and an
/// exiting bundler are logged; neither ends the session.
pub(crate) async fn watch_task(
    bundler: Bundler,
    ctx: Arc<Context>,
    mut child: Child,
    bus_tx: mpsc::UnboundedSender<FileEvent>,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<(), WatchError> {
    let (Some(stdout), Some(stderr)) = (child.stdout.take(), child.stderr.take()) else {
        return Err(WatchError::Task("bundler pipes unavailable".to_string()));
    };
    let mut stdout = BufReader::new(stdout).lines();
    let mut stderr = BufReader::new(stderr).lines();
    let mut stderr_open = true;

    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => return Ok(()),
            line = stdout.next_line() => {
                let line = match line {
                    Ok(Some(line)) => line,
                    Ok(None) => break,
                    Err(err) => {
                        tracing::warn!(error = %err, "reading bundler output failed");
                        break;
                    }
                };
                match parse_report(&line) {
                    Some(BundlerReport::Built(stats)) => {
                        tracing::info!("{}", stats.summary());
                        for event in asset_events(&ctx, bundler.output_dir(), &stats) {
                            if bus_tx.send(event).is_err() {
                                tracing::debug!("output bus closed");
                                return Ok(());
                            }
                        }
                    }
                    Some(BundlerReport::Failed(message)) => {
                        tracing::error!("build failed: {message}");
                    }
                    None => tracing::debug!("bundler: {line}"),
                }
            }
            line = stderr.next_line(), if stderr_open => match line {
                Ok(Some(line)) => tracing::warn!("bundler: {line}"),
                _ => stderr_open = false,
            },
        }
    }

    tokio::select! {
        _ = shutdown_rx.recv() => return Ok(()),
        status = child.wait() => match status {
            Ok(status) => tracing::error!("bundler exited with {status}; builds stopped"),
            Err(err) => tracing::error!(error = %err, "bundler exited; builds stopped"),
        },
    }
    let _ = shutdown_rx.recv().await;
    Ok(())
}

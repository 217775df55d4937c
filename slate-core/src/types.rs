//! Domain types shared by every stage of the pipeline.
//!
//! All path fields use `PathBuf`; keys are always `/`-separated strings
//! relative to the tree root.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Deserializer, Serialize};

// ---------------------------------------------------------------------------
// Newtypes
// ---------------------------------------------------------------------------

/// Canonical relative identifier of a file, e.g. `snippets/snip.liquid`.
///
/// The same key is produced whether the file was seen in the source tree or
/// in the output tree. An empty key marks a no-op event.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AssetKey(pub String);

impl AssetKey {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AssetKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for AssetKey {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for AssetKey {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

// ---------------------------------------------------------------------------
// File events
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileEventKind {
    Added,
    Changed,
    Removed,
}

impl fmt::Display for FileEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileEventKind::Added => write!(f, "added"),
            FileEventKind::Changed => write!(f, "changed"),
            FileEventKind::Removed => write!(f, "removed"),
        }
    }
}

/// A translated filesystem event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEvent {
    pub kind: FileEventKind,
    /// The path exactly as reported by the watcher.
    pub source_path: PathBuf,
    pub key: AssetKey,
    /// Where the file lives in the output tree.
    pub dest_path: PathBuf,
}

impl FileEvent {
    /// The sentinel every consumer treats as a no-op.
    pub fn noop(kind: FileEventKind) -> Self {
        Self {
            kind,
            source_path: PathBuf::new(),
            key: AssetKey::default(),
            dest_path: PathBuf::new(),
        }
    }

    pub fn is_noop(&self) -> bool {
        self.key.is_empty()
    }

    pub fn is_removal(&self) -> bool {
        self.kind == FileEventKind::Removed
    }
}

// ---------------------------------------------------------------------------
// Build stats
// ---------------------------------------------------------------------------

/// Sizes reported by the bundler, in kilobytes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetSize {
    pub raw: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gzip: Option<f64>,
}

impl fmt::Display for AssetSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.gzip {
            Some(gzip) => write!(f, "{gzip}kb gzipped"),
            None => write!(f, "{}kb", self.raw),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Asset {
    pub filename: String,
    pub size: AssetSize,
}

/// Result of one successful bundler run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildStats {
    #[serde(rename = "duration", deserialize_with = "whole_millis")]
    pub duration_ms: u64,
    #[serde(default)]
    pub assets: Vec<Asset>,
}

/// Bundlers report `duration` as any JSON number; fractions round to the
/// nearest millisecond.
fn whole_millis<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
    let ms = f64::deserialize(deserializer)?;
    if !ms.is_finite() {
        return Err(serde::de::Error::custom("duration must be a finite number"));
    }
    Ok(ms.round().max(0.0) as u64)
}

impl BuildStats {
    /// Multi-line human summary: `built in 120ms` followed by one
    /// `  > <file> <size>` line per asset.
    pub fn summary(&self) -> String {
        let mut out = format!("built in {}ms", self.duration_ms);
        for asset in &self.assets {
            out.push_str(&format!("\n  > {} {}", asset.filename, asset.size));
        }
        out
    }
}

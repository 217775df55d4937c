//! Path translation between the source tree, the output tree and asset keys.
//!
//! ```text
//! /proj/src/snippets/snip.liquid
//!   key:  snippets/snip.liquid
//!   dest: /proj/build/snippets/snip.liquid
//! ```

use std::path::{Component, Path, PathBuf};

use crate::types::{AssetKey, FileEvent, FileEventKind};

/// Pure mapping from absolute paths to [`FileEvent`]s. No I/O.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathTranslator {
    source_root: PathBuf,
    dest_root: PathBuf,
}

impl PathTranslator {
    pub fn new(source_root: impl Into<PathBuf>, dest_root: impl Into<PathBuf>) -> Self {
        Self {
            source_root: source_root.into(),
            dest_root: dest_root.into(),
        }
    }

    pub fn source_root(&self) -> &Path {
        &self.source_root
    }

    pub fn dest_root(&self) -> &Path {
        &self.dest_root
    }

    /// Canonical key for `path`, or `None` when the path is empty, equal to a
    /// root, or outside both trees.
    pub fn key_for(&self, path: &Path) -> Option<AssetKey> {
        if path.as_os_str().is_empty() {
            return None;
        }
        let relative = path
            .strip_prefix(&self.source_root)
            .or_else(|_| path.strip_prefix(&self.dest_root))
            .ok()?;
        let key = normalize_key(relative);
        if key.is_empty() {
            None
        } else {
            Some(AssetKey(key))
        }
    }

    /// Translate a watcher path into a [`FileEvent`]. Untranslatable paths
    /// yield the no-op sentinel.
    pub fn translate(&self, kind: FileEventKind, path: &Path) -> FileEvent {
        match self.key_for(path) {
            Some(key) => FileEvent {
                kind,
                source_path: path.to_path_buf(),
                dest_path: self.dest_root.join(&key.0),
                key,
            },
            None => FileEvent::noop(kind),
        }
    }
}

/// Join the normal components of `relative` with `/`.
///
/// `.` components are skipped; `..`, root and prefix components make the key
/// empty so that nothing can escape the output tree.
pub fn normalize_key(relative: &Path) -> String {
    let mut parts = Vec::new();
    for component in relative.components() {
        match component {
            Component::Normal(part) => parts.push(part.to_string_lossy().replace('\\', "/")),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                return String::new()
            }
        }
    }
    parts.join("/")
}

//! Output-tree population.
//!
//! ## `copy_tree`: bulk copy at startup
//!
//! 1. Empty the output root (create it if missing).
//! 2. Walk the source root; prune every entry whose key is ignored.
//! 3. Recreate directories and copy files under the same key.
//!
//! Any failure aborts the whole stage: a half-populated output tree is never
//! handed to the watcher.
//!
//! ## `copy_subtree`: a directory that appears in one piece
//!
//! Same walk and pruning as `copy_tree`, rooted at that directory, leaving the
//! rest of the output tree alone.
//!
//! ## `copy_file` / `remove_file`: single watcher events
//!
//! Every copy goes through `<dest>.slate.tmp` and a rename so the output watcher
//! never observes a partially written file.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use slate_core::{paths::normalize_key, Context, FileEvent};
use walkdir::WalkDir;

use crate::error::{io_err, SyncError};

/// Suffix of the scratch file used by [`copy_file`].
pub const TMP_SUFFIX: &str = ".slate.tmp";

/// Outcome of a bulk copy.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CopySummary {
    pub files: usize,
    pub dirs: usize,
    /// Entries pruned by the ignore filter (an ignored directory counts once).
    pub ignored: usize,
}

// ---------------------------------------------------------------------------
// copy_tree
// ---------------------------------------------------------------------------

/// Rebuild the output tree from the source tree.
pub fn copy_tree(ctx: &Context) -> Result<CopySummary, SyncError> {
    empty_dir(&ctx.dest_root)?;
    let summary = mirror(ctx, &ctx.source_root)?;
    tracing::info!(
        "copied {} files into {} ({} ignored)",
        summary.files,
        ctx.dest_root.display(),
        summary.ignored
    );
    Ok(summary)
}

/// Copy one source directory (and everything below it that is not ignored)
/// into the output tree without touching the rest of it. Used when a whole
/// directory appears in the source tree at once, e.g. after a move.
pub fn copy_subtree(ctx: &Context, dir: &Path) -> Result<CopySummary, SyncError> {
    if !dir.starts_with(&ctx.source_root) {
        return Ok(CopySummary::default());
    }
    let summary = mirror(ctx, dir)?;
    tracing::debug!(
        "copied {} files from {} ({} ignored)",
        summary.files,
        dir.display(),
        summary.ignored
    );
    Ok(summary)
}

fn mirror(ctx: &Context, start: &Path) -> Result<CopySummary, SyncError> {
    let mut summary = CopySummary::default();
    let mut ignored = 0usize;
    let source_root = ctx.source_root.as_path();

    let walker = WalkDir::new(start)
        .follow_links(true)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| {
            let key = key_under(source_root, entry.path());
            if ctx.is_ignored(&key) {
                tracing::debug!("ignored: {key}");
                ignored += 1;
                false
            } else {
                true
            }
        });

    for entry in walker {
        let entry = entry.map_err(|source| SyncError::Walk {
            root: start.to_path_buf(),
            source,
        })?;
        let key = key_under(source_root, entry.path());
        if key.is_empty() {
            continue;
        }
        let dest = ctx.dest_root.join(&key);

        if entry.file_type().is_dir() {
            fs::create_dir_all(&dest).map_err(|e| io_err(&dest, e))?;
            summary.dirs += 1;
        } else {
            copy_atomic(entry.path(), &dest)?;
            summary.files += 1;
        }
    }

    summary.ignored = ignored;
    Ok(summary)
}

fn key_under(root: &Path, path: &Path) -> String {
    path.strip_prefix(root)
        .map(normalize_key)
        .unwrap_or_default()
}

/// Remove everything inside `dir`, keeping (or creating) `dir` itself.
pub fn empty_dir(dir: &Path) -> Result<(), SyncError> {
    match fs::symlink_metadata(dir) {
        Ok(meta) if meta.is_dir() => {}
        Ok(_) => {
            fs::remove_file(dir).map_err(|e| io_err(dir, e))?;
            return fs::create_dir_all(dir).map_err(|e| io_err(dir, e));
        }
        Err(err) if err.kind() == ErrorKind::NotFound => {
            return fs::create_dir_all(dir).map_err(|e| io_err(dir, e));
        }
        Err(err) => return Err(io_err(dir, err)),
    }

    for entry in fs::read_dir(dir).map_err(|e| io_err(dir, e))? {
        let entry = entry.map_err(|e| io_err(dir, e))?;
        let path = entry.path();
        let ty = entry.file_type().map_err(|e| io_err(&path, e))?;
        if ty.is_dir() {
            fs::remove_dir_all(&path).map_err(|e| io_err(&path, e))?;
        } else {
            fs::remove_file(&path).map_err(|e| io_err(&path, e))?;
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// single-file operations
// ---------------------------------------------------------------------------

/// Copy `event.source_path` to `event.dest_path`. No-op events succeed.
pub fn copy_file(event: &FileEvent) -> Result<(), SyncError> {
    if event.is_noop() {
        return Ok(());
    }
    copy_atomic(&event.source_path, &event.dest_path)?;
    tracing::debug!("copied: {}", event.key);
    Ok(())
}

fn copy_atomic(source: &Path, dest: &Path) -> Result<(), SyncError> {
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent).map_err(|e| io_err(parent, e))?;
    }
    let tmp = tmp_path(dest);
    if let Err(e) = fs::copy(source, &tmp) {
        let _ = fs::remove_file(&tmp);
        return Err(io_err(source, e));
    }
    if let Err(e) = fs::rename(&tmp, dest) {
        let _ = fs::remove_file(&tmp);
        return Err(io_err(dest, e));
    }
    Ok(())
}

/// Delete `event.dest_path` (file or directory). Already-missing targets and
/// no-op events succeed.
pub fn remove_file(event: &FileEvent) -> Result<(), SyncError> {
    if event.is_noop() {
        return Ok(());
    }
    let dest = event.dest_path.as_path();
    let result = match fs::symlink_metadata(dest) {
        Ok(meta) if meta.is_dir() => fs::remove_dir_all(dest),
        Ok(_) => fs::remove_file(dest),
        Err(err) => Err(err),
    };
    match result {
        Ok(()) => {
            tracing::debug!("deleted: {}", event.key);
            Ok(())
        }
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
        Err(err) => Err(io_err(dest, err)),
    }
}

/// `<dest>.slate.tmp`
pub fn tmp_path(dest: &Path) -> PathBuf {
    let mut name = dest.as_os_str().to_os_string();
    name.push(TMP_SUFFIX);
    PathBuf::from(name)
}

/// Files that appear in the output tree but are never content: our own copy
/// scratch files and Finder metadata.
pub fn is_scratch_file(path: &Path) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .map(|name| name.ends_with(TMP_SUFFIX) || name == ".DS_Store")
        .unwrap_or(false)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

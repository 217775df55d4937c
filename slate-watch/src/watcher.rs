//! Dual tree watcher.
//!
//! The source stream mirrors edits into the output tree; the output stream
//! turns whatever lands in the output tree (copies and bundler writes alike)
//! into sync events on the output bus.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use notify::event::{ModifyKind, RemoveKind, RenameMode};
use notify::{recommended_watcher, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::{broadcast, mpsc};

use slate_core::{Context, FileEvent, FileEventKind};
use slate_sync::copy::is_scratch_file;

use crate::error::WatchError;

pub type RawEvents = mpsc::UnboundedReceiver<notify::Result<Event>>;

/// Start a recursive watcher on `root`. Dropping the watcher stops it.
pub fn watch_tree(root: &Path) -> Result<(RecommendedWatcher, RawEvents), WatchError> {
    let (event_tx, event_rx) = mpsc::unbounded_channel::<notify::Result<Event>>();
    let mut watcher = recommended_watcher(move |event| {
        let _ = event_tx.send(event);
    })?;
    watcher.watch(root, RecursiveMode::Recursive)?;
    tracing::debug!(path = %root.display(), "watching tree");
    Ok((watcher, event_rx))
}

/// Map one raw notify event onto add/change/remove per path.
pub fn classify(event: &Event) -> Vec<(FileEventKind, PathBuf)> {
    let all = |kind: FileEventKind| -> Vec<(FileEventKind, PathBuf)> {
        event.paths.iter().map(|p| (kind, p.clone())).collect()
    };

    match &event.kind {
        EventKind::Create(_) => all(FileEventKind::Added),
        EventKind::Modify(ModifyKind::Name(mode)) => match mode {
            RenameMode::From => all(FileEventKind::Removed),
            RenameMode::To => all(FileEventKind::Added),
            RenameMode::Both => {
                let mut out = Vec::with_capacity(2);
                if let Some(from) = event.paths.first() {
                    out.push((FileEventKind::Removed, from.clone()));
                }
                if let Some(to) = event.paths.get(1) {
                    out.push((FileEventKind::Added, to.clone()));
                }
                out
            }
            // Backend could not tell which side of the rename this is.
            _ => event
                .paths
                .iter()
                .map(|p| {
                    let kind = if p.exists() {
                        FileEventKind::Added
                    } else {
                        FileEventKind::Removed
                    };
                    (kind, p.clone())
                })
                .collect(),
        },
        EventKind::Modify(ModifyKind::Metadata(_)) => Vec::new(),
        EventKind::Modify(_) => all(FileEventKind::Changed),
        EventKind::Remove(RemoveKind::Folder) => Vec::new(),
        EventKind::Remove(_) => all(FileEventKind::Removed),
        EventKind::Access(_) | EventKind::Any | EventKind::Other => Vec::new(),
    }
}

// ---------------------------------------------------------------------------
// Source stream
// ---------------------------------------------------------------------------

/// What the source stream did with one path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceAction {
    /// Ignored, outside the tree, or a directory that was only touched.
    Dropped,
    Copied(FileEvent),
    /// A directory arrived whole; this many files below it were copied.
    CopiedTree(FileEvent, usize),
    Deleted(FileEvent),
    /// Logged; the watcher keeps running.
    Failed(FileEvent, String),
}

/// Mirror one source-tree change into the output tree.
pub async fn apply_source_change(ctx: &Context, kind: FileEventKind, path: &Path) -> SourceAction {
    let event = ctx.translator.translate(kind, path);
    if event.is_noop() {
        return SourceAction::Dropped;
    }
    if ctx.is_ignored(event.key.as_str()) {
        tracing::debug!(key = %event.key, "ignored");
        return SourceAction::Dropped;
    }
    if !event.is_removal() && path.is_dir() {
        if kind == FileEventKind::Added {
            return copy_dir(ctx, event, path).await;
        }
        return SourceAction::Dropped;
    }

    let job = event.clone();
    let result = tokio::task::spawn_blocking(move || {
        if job.is_removal() {
            slate_sync::remove_file(&job)
        } else {
            slate_sync::copy_file(&job)
        }
    })
    .await;

    let verb = if event.is_removal() { "deleting" } else { "copying" };
    let reason = match result {
        Ok(Ok(())) if event.is_removal() => return SourceAction::Deleted(event),
        Ok(Ok(())) => return SourceAction::Copied(event),
        Ok(Err(err)) => err.to_string(),
        Err(err) => err.to_string(),
    };
    tracing::error!(key = %event.key, error = %reason, "{verb} {} failed", event.key);
    SourceAction::Failed(event, reason)
}

// A moved-in directory yields one event for the directory and none for the
// files inside it.
async fn copy_dir(ctx: &Context, event: FileEvent, dir: &Path) -> SourceAction {
    let job_ctx = ctx.clone();
    let job_dir = dir.to_path_buf();
    let result =
        tokio::task::spawn_blocking(move || slate_sync::copy_subtree(&job_ctx, &job_dir)).await;
    let reason = match result {
        Ok(Ok(summary)) => return SourceAction::CopiedTree(event, summary.files),
        Ok(Err(err)) => err.to_string(),
        Err(err) => err.to_string(),
    };
    tracing::error!(key = %event.key, error = %reason, "copying {} failed", event.key);
    SourceAction::Failed(event, reason)
}

pub(crate) async fn source_task(
    ctx: Arc<Context>,
    _watcher: RecommendedWatcher,
    mut raw_rx: RawEvents,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<(), WatchError> {
    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => break,
            event = raw_rx.recv() => {
                let Some(event) = event else { break };
                let event = match event {
                    Ok(event) => event,
                    Err(err) => {
                        tracing::warn!(error = %err, "source watcher error");
                        continue;
                    }
                };
                for (kind, path) in classify(&event) {
                    apply_source_change(&ctx, kind, &path).await;
                }
            }
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Output stream
// ---------------------------------------------------------------------------

/// Translate one output-tree change into a bus event, or `None` when the
/// path must not be synced.
pub fn output_event(ctx: &Context, kind: FileEventKind, path: &Path) -> Option<FileEvent> {
    if is_scratch_file(path) {
        return None;
    }
    if kind != FileEventKind::Removed && path.is_dir() {
        return None;
    }
    let event = ctx.translator.translate(kind, path);
    if event.is_noop() || ctx.is_ignored(event.key.as_str()) {
        return None;
    }
    Some(event)
}

pub(crate) async fn output_task(
    ctx: Arc<Context>,
    _watcher: RecommendedWatcher,
    mut raw_rx: RawEvents,
    bus_tx: mpsc::UnboundedSender<FileEvent>,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<(), WatchError> {
    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => break,
            event = raw_rx.recv() => {
                let Some(event) = event else { break };
                let event = match event {
                    Ok(event) => event,
                    Err(err) => {
                        tracing::warn!(error = %err, "output watcher error");
                        continue;
                    }
                };
                for (kind, path) in classify(&event) {
                    let Some(file_event) = output_event(&ctx, kind, &path) else {
                        continue;
                    };
                    if bus_tx.send(file_event).is_err() {
                        tracing::debug!("output bus closed");
                        return Ok(());
                    }
                }
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{CreateKind, DataChange, MetadataKind};
    use slate_core::{ProjectConfig, ReloadConfig, SyncMode, ThemeSettings};
    use std::fs;
    use tempfile::TempDir;

    fn p(path: &str) -> PathBuf {
        PathBuf::from(path)
    }

    fn event(kind: EventKind, paths: &[&str]) -> Event {
        paths
            .iter()
            .fold(Event::new(kind), |e, p| e.add_path(PathBuf::from(p)))
    }

    fn context(ignore: &[&str]) -> (TempDir, Context) {
        let tmp = TempDir::new().unwrap();
        fs::create_dir_all(tmp.path().join("src")).unwrap();
        fs::create_dir_all(tmp.path().join("build")).unwrap();
        let project = ProjectConfig {
            source: "src".into(),
            dest: "build".into(),
            js: None,
            reload: ReloadConfig::default(),
        };
        let theme = ThemeSettings {
            environment: "development".to_string(),
            ignore_files: ignore.iter().map(|s| s.to_string()).collect(),
            mode: SyncMode::LocalOnly,
        };
        let ctx = Context::new(tmp.path(), project, theme, false).unwrap();
        (tmp, ctx)
    }

    #[test]
    fn classify_maps_create_modify_remove() {
        let created = event(EventKind::Create(CreateKind::File), &["/s/a.liquid"]);
        assert_eq!(classify(&created), vec![(FileEventKind::Added, p("/s/a.liquid"))]);

        let written = event(
            EventKind::Modify(ModifyKind::Data(DataChange::Content)),
            &["/s/a.liquid"],
        );
        assert_eq!(classify(&written), vec![(FileEventKind::Changed, p("/s/a.liquid"))]);

        let removed = event(EventKind::Remove(RemoveKind::File), &["/s/a.liquid"]);
        assert_eq!(classify(&removed), vec![(FileEventKind::Removed, p("/s/a.liquid"))]);
    }

    #[test]
    fn classify_splits_renames() {
        let both = event(
            EventKind::Modify(ModifyKind::Name(RenameMode::Both)),
            &["/s/old.liquid", "/s/new.liquid"],
        );
        assert_eq!(
            classify(&both),
            vec![
                (FileEventKind::Removed, p("/s/old.liquid")),
                (FileEventKind::Added, p("/s/new.liquid")),
            ]
        );

        let from = event(EventKind::Modify(ModifyKind::Name(RenameMode::From)), &["/s/x"]);
        assert_eq!(classify(&from), vec![(FileEventKind::Removed, p("/s/x"))]);
        let to = event(EventKind::Modify(ModifyKind::Name(RenameMode::To)), &["/s/y"]);
        assert_eq!(classify(&to), vec![(FileEventKind::Added, p("/s/y"))]);
    }

    #[test]
    fn classify_drops_folder_removal_metadata_and_access() {
        for kind in [
            EventKind::Remove(RemoveKind::Folder),
            EventKind::Modify(ModifyKind::Metadata(MetadataKind::Permissions)),
            EventKind::Access(notify::event::AccessKind::Any),
        ] {
            let label = format!("{kind:?}");
            assert!(classify(&event(kind, &["/s/dir"])).is_empty(), "{label}");
        }
    }

    #[tokio::test]
    async fn added_source_file_is_copied_under_its_key() {
        let (_tmp, ctx) = context(&["*.tmp"]);
        let src = ctx.source_root.join("a.liquid");
        fs::write(&src, "{{ a }}").unwrap();

        let action = apply_source_change(&ctx, FileEventKind::Added, &src).await;
        let SourceAction::Copied(event) = action else {
            panic!("expected copy, got {action:?}");
        };
        assert_eq!(event.key.as_str(), "a.liquid");
        assert_eq!(fs::read_to_string(ctx.dest_root.join("a.liquid")).unwrap(), "{{ a }}");
    }

    #[tokio::test]
    async fn ignored_source_file_is_never_copied() {
        let (_tmp, ctx) = context(&["*.tmp"]);
        let src = ctx.source_root.join("b.tmp");
        fs::write(&src, "scratch").unwrap();

        let action = apply_source_change(&ctx, FileEventKind::Added, &src).await;
        assert_eq!(action, SourceAction::Dropped);
        assert!(!ctx.dest_root.join("b.tmp").exists());
        assert!(output_event(&ctx, FileEventKind::Added, &ctx.dest_root.join("b.tmp")).is_none());
    }

    #[tokio::test]
    async fn removed_source_file_deletes_output_copy() {
        let (_tmp, ctx) = context(&[]);
        let dest = ctx.dest_root.join("a.liquid");
        fs::write(&dest, "old").unwrap();

        let src = ctx.source_root.join("a.liquid");
        let action = apply_source_change(&ctx, FileEventKind::Removed, &src).await;
        assert!(matches!(action, SourceAction::Deleted(_)), "got {action:?}");
        assert!(!dest.exists());

        let unsync = output_event(&ctx, FileEventKind::Removed, &dest).expect("unsync event");
        assert_eq!(unsync.key.as_str(), "a.liquid");
    }

    #[tokio::test]
    async fn directory_moved_into_source_is_copied_file_by_file() {
        let (tmp, ctx) = context(&["*.tmp"]);
        let staged = tmp.path().join("staged");
        fs::create_dir_all(staged.join("nested")).unwrap();
        fs::write(staged.join("snip.liquid"), "{{ snip }}").unwrap();
        fs::write(staged.join("nested/card.liquid"), "card").unwrap();
        fs::write(staged.join("draft.tmp"), "scratch").unwrap();

        let moved = ctx.source_root.join("snippets");
        fs::rename(&staged, &moved).unwrap();
        let renamed = event(
            EventKind::Modify(ModifyKind::Name(RenameMode::To)),
            &[moved.to_str().unwrap()],
        );
        let [(kind, path)]: [(FileEventKind, PathBuf); 1] = classify(&renamed).try_into().unwrap();

        let action = apply_source_change(&ctx, kind, &path).await;
        let SourceAction::CopiedTree(dir_event, files) = action else {
            panic!("expected tree copy, got {action:?}");
        };
        assert_eq!(dir_event.key.as_str(), "snippets");
        assert_eq!(files, 2);
        assert_eq!(
            fs::read_to_string(ctx.dest_root.join("snippets/snip.liquid")).unwrap(),
            "{{ snip }}"
        );
        assert!(ctx.dest_root.join("snippets/nested/card.liquid").is_file());
        assert!(!ctx.dest_root.join("snippets/draft.tmp").exists());

        let sync = output_event(
            &ctx,
            FileEventKind::Added,
            &ctx.dest_root.join("snippets/snip.liquid"),
        )
        .expect("sync event");
        assert_eq!(sync.key.as_str(), "snippets/snip.liquid");
    }

    #[tokio::test]
    async fn created_folder_is_mirrored_too() {
        let (_tmp, ctx) = context(&[]);
        let dir = ctx.source_root.join("sections");
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("header.liquid"), "x").unwrap();

        let created = event(EventKind::Create(CreateKind::Folder), &[dir.to_str().unwrap()]);
        let [(kind, path)]: [(FileEventKind, PathBuf); 1] = classify(&created).try_into().unwrap();
        let action = apply_source_change(&ctx, kind, &path).await;
        assert!(matches!(action, SourceAction::CopiedTree(_, 1)), "got {action:?}");
        assert!(ctx.dest_root.join("sections/header.liquid").is_file());

        let touched = apply_source_change(&ctx, FileEventKind::Changed, &dir).await;
        assert_eq!(touched, SourceAction::Dropped);
    }

    #[tokio::test]
    async fn vanished_source_file_fails_without_stopping() {
        let (_tmp, ctx) = context(&[]);
        let src = ctx.source_root.join("gone.liquid");

        let action = apply_source_change(&ctx, FileEventKind::Changed, &src).await;
        assert!(matches!(action, SourceAction::Failed(..)), "got {action:?}");
    }

    #[test]
    fn output_stream_skips_scratch_files_and_directories() {
        let (_tmp, ctx) = context(&[]);
        let tmp_copy = ctx.dest_root.join("a.liquid.slate.tmp");
        assert!(output_event(&ctx, FileEventKind::Added, &tmp_copy).is_none());
        assert!(output_event(&ctx, FileEventKind::Added, &ctx.dest_root.join(".DS_Store")).is_none());

        let dir = ctx.dest_root.join("sections");
        fs::create_dir_all(&dir).unwrap();
        assert!(output_event(&ctx, FileEventKind::Added, &dir).is_none());

        let file = dir.join("header.liquid");
        fs::write(&file, "x").unwrap();
        let event = output_event(&ctx, FileEventKind::Changed, &file).expect("sync event");
        assert_eq!(event.key.as_str(), "sections/header.liquid");
        assert_eq!(event.dest_path, file);
    }

    #[test]
    fn paths_outside_both_trees_are_dropped() {
        let (tmp, ctx) = context(&[]);
        let stray = tmp.path().join("slate.yaml");
        assert!(output_event(&ctx, FileEventKind::Changed, &stray).is_none());
    }
}

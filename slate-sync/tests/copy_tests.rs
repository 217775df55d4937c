//! Bulk copy: output tree mirrors exactly the non-ignored source files.

use std::fs;
use std::path::{Path, PathBuf};

use slate_core::{Context, FileEventKind, ProjectConfig, ReloadConfig, SyncMode, ThemeSettings};
use slate_sync::{copy_file, copy_subtree, copy_tree};
use tempfile::TempDir;

fn context(root: &Path, ignore: &[&str]) -> Context {
    fs::create_dir_all(root.join("src")).expect("mkdir src");
    Context::new(
        root,
        ProjectConfig {
            source: PathBuf::from("src"),
            dest: PathBuf::from("build"),
            js: None,
            reload: ReloadConfig::default(),
        },
        ThemeSettings {
            environment: "development".to_string(),
            ignore_files: ignore.iter().map(|s| s.to_string()).collect(),
            mode: SyncMode::LocalOnly,
        },
        false,
    )
    .expect("context")
}

fn write(root: &Path, rel: &str, content: &str) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().expect("parent")).expect("mkdir");
    fs::write(path, content).expect("write");
}

fn files_under(root: &Path) -> Vec<String> {
    let mut files = Vec::new();
    let mut stack = vec![root.to_path_buf()];
    while let Some(dir) = stack.pop() {
        for entry in fs::read_dir(&dir).expect("read_dir") {
            let path = entry.expect("entry").path();
            if path.is_dir() {
                stack.push(path);
            } else {
                let rel = path.strip_prefix(root).expect("under root");
                files.push(rel.to_string_lossy().replace('\\', "/"));
            }
        }
    }
    files.sort();
    files
}

#[test]
fn copy_mirrors_source_and_drops_ignored() {
    let _ = env_logger::builder().is_test(true).try_init();
    let tmp = TempDir::new().expect("tmp");
    let ctx = context(tmp.path(), &["*.tmp", "node_modules", "config/settings_data.json"]);

    write(&ctx.source_root, "layout/theme.liquid", "layout");
    write(&ctx.source_root, "snippets/snip.liquid", "snip");
    write(&ctx.source_root, "snippets/draft.tmp", "draft");
    write(&ctx.source_root, "node_modules/pkg/index.js", "pkg");
    write(&ctx.source_root, "config/settings_data.json", "{}");
    write(&ctx.source_root, "config/settings_schema.json", "[]");

    let summary = copy_tree(&ctx).expect("copy");

    assert_eq!(
        files_under(&ctx.dest_root),
        vec![
            "config/settings_schema.json",
            "layout/theme.liquid",
            "snippets/snip.liquid",
        ]
    );
    assert_eq!(summary.files, 3);
    assert_eq!(summary.ignored, 3, "node_modules counts once as a pruned dir");
    assert_eq!(
        fs::read_to_string(ctx.dest_root.join("layout/theme.liquid")).expect("read"),
        "layout"
    );
}

#[test]
fn copy_removes_leftovers_from_previous_run() {
    let tmp = TempDir::new().expect("tmp");
    let ctx = context(tmp.path(), &[]);

    write(&ctx.dest_root, "stale/old.liquid", "old");
    write(&ctx.dest_root, "assets/app.js", "old bundle");
    write(&ctx.source_root, "templates/index.liquid", "index");

    copy_tree(&ctx).expect("copy");

    assert_eq!(files_under(&ctx.dest_root), vec!["templates/index.liquid"]);
}

#[test]
fn copy_of_empty_source_leaves_empty_output() {
    let tmp = TempDir::new().expect("tmp");
    let ctx = context(tmp.path(), &[]);
    write(&ctx.dest_root, "leftover.liquid", "x");

    let summary = copy_tree(&ctx).expect("copy");
    assert_eq!(summary.files, 0);
    assert!(ctx.dest_root.is_dir());
    assert!(files_under(&ctx.dest_root).is_empty());
}

#[test]
fn copy_fails_when_source_is_missing() {
    let tmp = TempDir::new().expect("tmp");
    let ctx = context(tmp.path(), &[]);
    fs::remove_dir_all(&ctx.source_root).expect("rm src");

    let err = copy_tree(&ctx).expect_err("missing source must abort");
    assert!(matches!(err, slate_sync::SyncError::Walk { .. }), "got: {err}");
}

#[test]
fn subtree_copy_adds_one_directory_and_keeps_the_rest() {
    let tmp = TempDir::new().expect("tmp");
    let ctx = context(tmp.path(), &["*.tmp"]);
    write(&ctx.dest_root, "layout/theme.liquid", "layout");
    write(&ctx.source_root, "snippets/snip.liquid", "snip");
    write(&ctx.source_root, "snippets/nested/card.liquid", "card");
    write(&ctx.source_root, "snippets/draft.tmp", "draft");
    write(&ctx.source_root, "sections/header.liquid", "not part of the move");

    let summary = copy_subtree(&ctx, &ctx.source_root.join("snippets")).expect("copy");

    assert_eq!(summary.files, 2);
    assert_eq!(summary.ignored, 1);
    assert_eq!(
        files_under(&ctx.dest_root),
        vec![
            "layout/theme.liquid",
            "snippets/nested/card.liquid",
            "snippets/snip.liquid",
        ]
    );
}

#[test]
fn subtree_copy_outside_source_copies_nothing() {
    let tmp = TempDir::new().expect("tmp");
    let ctx = context(tmp.path(), &[]);
    write(tmp.path(), "elsewhere/a.liquid", "a");

    let summary = copy_subtree(&ctx, &tmp.path().join("elsewhere")).expect("copy");
    assert_eq!(summary.files, 0);
    assert!(!ctx.dest_root.join("a.liquid").exists());
}

#[test]
fn bulk_and_live_views_agree_on_ignored_paths() {
    let patterns = ["*.tmp", "node_modules", "config/settings_data.json", "assets/**/*.map"];
    let candidates = [
        "a.liquid",
        "b.tmp",
        "node_modules/x/y.js",
        "config/settings_data.json",
        "config/settings_schema.json",
        "assets/js/app.js.map",
        "assets/js/app.js",
    ];

    let tmp = TempDir::new().expect("tmp");
    let ctx = context(tmp.path(), &patterns);
    for rel in candidates {
        write(&ctx.source_root, rel, rel);
    }
    copy_tree(&ctx).expect("copy");
    let bulk = files_under(&ctx.dest_root);

    let live_tmp = TempDir::new().expect("tmp");
    let live_ctx = context(live_tmp.path(), &patterns);
    fs::create_dir_all(&live_ctx.dest_root).expect("mkdir build");
    for rel in candidates {
        write(&live_ctx.source_root, rel, rel);
        let event = live_ctx
            .translator
            .translate(FileEventKind::Added, &live_ctx.source_root.join(rel));
        if !live_ctx.is_ignored(event.key.as_str()) {
            copy_file(&event).expect("copy file");
        }
    }
    let live = files_under(&live_ctx.dest_root);

    assert_eq!(bulk, live);
    assert_eq!(
        bulk,
        vec!["a.liquid", "assets/js/app.js", "config/settings_schema.json"]
    );
}

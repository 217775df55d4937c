use std::fs;
use std::path::Path;
use std::process::Command;

use assert_cmd::prelude::*;
use predicates::str::contains;
use tempfile::TempDir;

fn slate_cmd(root: &Path) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("slate"));
    cmd.arg("--root")
        .arg(root)
        .env("RUST_LOG", "warn")
        .env("NO_COLOR", "1");
    cmd
}

fn theme_project(slate_yaml: &str) -> TempDir {
    let root = TempDir::new().unwrap();
    fs::write(root.path().join("slate.yaml"), slate_yaml).unwrap();
    let src = root.path().join("src");
    fs::create_dir_all(src.join("snippets")).unwrap();
    fs::write(src.join("layout.liquid"), "<html>{{ content }}</html>").unwrap();
    fs::write(src.join("snippets/snip.liquid"), "{{ snip }}").unwrap();
    fs::write(src.join("draft.tmp"), "scratch").unwrap();
    root
}

#[test]
fn copy_mirrors_source_tree_without_ignored_files() {
    let root = theme_project("in: src\nout: build\n");
    fs::write(
        root.path().join("config.yml"),
        "development:\n  ignore_files:\n    - \"*.tmp\"\n",
    )
    .unwrap();
    let build = root.path().join("build");
    fs::create_dir_all(&build).unwrap();
    fs::write(build.join("stale.liquid"), "old").unwrap();

    slate_cmd(root.path())
        .arg("copy")
        .assert()
        .success()
        .stdout(contains("copied 2 files"));

    assert_eq!(
        fs::read_to_string(build.join("snippets/snip.liquid")).unwrap(),
        "{{ snip }}"
    );
    assert!(build.join("layout.liquid").is_file());
    assert!(!build.join("draft.tmp").exists());
    assert!(!build.join("stale.liquid").exists());
}

#[test]
fn missing_project_config_is_reported() {
    let root = TempDir::new().unwrap();
    slate_cmd(root.path())
        .arg("copy")
        .assert()
        .failure()
        .stderr(contains("slate.yaml"));
}

#[test]
fn unknown_environment_is_reported() {
    let root = theme_project("in: src\nout: build\n");
    fs::write(root.path().join("config.yml"), "development:\n  ignore_files: []\n").unwrap();

    slate_cmd(root.path())
        .args(["--env", "production", "copy"])
        .assert()
        .failure()
        .stderr(contains("production"));
}

#[test]
fn build_without_bundler_fails_after_copy() {
    let root = theme_project("in: src\nout: build\n");

    slate_cmd(root.path())
        .arg("build")
        .assert()
        .failure()
        .stderr(contains("no bundler configured"));
    assert!(root.path().join("build/layout.liquid").is_file());
}

#[cfg(unix)]
#[test]
fn build_prints_asset_table() {
    let root = theme_project(
        "in: src\nout: build\njs:\n  command: sh\n  args:\n    - -c\n    - echo '{\"duration\":120,\"assets\":[{\"filename\":\"app.js\",\"size\":{\"raw\":40,\"gzip\":12}}]}'\n",
    );

    slate_cmd(root.path())
        .arg("build")
        .assert()
        .success()
        .stdout(contains("120ms"))
        .stdout(contains("app.js"))
        .stdout(contains("12kb gzipped"));
}

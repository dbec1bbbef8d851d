//! End-to-end tests that run the compiled `upsync` binary.

use std::path::Path;
use std::process::Command as StdCommand;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn upsync(root: &Path) -> Command {
    let mut cmd = Command::cargo_bin("upsync").unwrap();
    cmd.current_dir(root).env("RUST_LOG", "upsync=info");
    cmd
}

fn git(dir: &Path, args: &[&str]) {
    let status = StdCommand::new("git")
        .args([
            "-c",
            "user.name=Test",
            "-c",
            "user.email=test@example.com",
            "-c",
            "commit.gpgsign=false",
        ])
        .args(args)
        .current_dir(dir)
        .env_remove("GIT_DIR")
        .env_remove("GIT_WORK_TREE")
        .env_remove("GIT_INDEX_FILE")
        .status()
        .expect("git should be installed");
    assert!(status.success(), "git {:?} failed", args);
}

fn upstream_repo() -> TempDir {
    let dir = TempDir::new().unwrap();
    std::fs::create_dir_all(dir.path().join("docs")).unwrap();
    std::fs::write(dir.path().join("docs/index.md"), "# Docs\n").unwrap();
    std::fs::write(dir.path().join("README.md"), "# Upstream\n").unwrap();
    git(dir.path(), &["init", "--quiet"]);
    git(dir.path(), &["add", "."]);
    git(dir.path(), &["commit", "--quiet", "-m", "init"]);
    dir
}

fn file_url(path: &Path) -> String {
    format!("file://{}", path.display())
}

#[test]
fn missing_manifest_fails() {
    let project = TempDir::new().unwrap();
    upsync(project.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("Manifest not found"));
}

#[test]
fn syncs_git_entry_and_exits_zero() {
    let upstream = upstream_repo();
    let project = TempDir::new().unwrap();
    let manifest = serde_json::json!([
        {"name": "docs", "type": "git", "url": file_url(upstream.path()),
         "path": "vendor/docs", "sparse_checkout": ["docs"], "move_from": "docs"}
    ]);
    std::fs::write(project.path().join("resources.json"), manifest.to_string()).unwrap();

    upsync(project.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("1 succeeded, 0 failed"));

    assert_eq!(
        std::fs::read_to_string(project.path().join("vendor/docs/index.md")).unwrap(),
        "# Docs\n"
    );
    assert!(!project.path().join("vendor/docs/README.md").exists());
}

#[test]
fn failed_entry_sets_exit_code() {
    let project = TempDir::new().unwrap();
    let missing = project.path().join("no-such-repo");
    let manifest = serde_json::json!([
        {"name": "gone", "type": "git", "url": file_url(&missing), "path": "vendor/gone"}
    ]);
    std::fs::write(project.path().join("resources.json"), manifest.to_string()).unwrap();

    upsync(project.path())
        .args(["sync", "--format", "json"])
        .assert()
        .code(1)
        .stdout(predicate::str::contains("\"failed\": 1"));
}

#[test]
fn check_lists_invalid_entries() {
    let project = TempDir::new().unwrap();
    std::fs::write(
        project.path().join("resources.json"),
        r#"[
            {"name": "ok", "url": "https://example.com/a.json", "path": "a.json"},
            {"name": "escape", "url": "https://example.com/b", "path": "../b"}
        ]"#,
    )
    .unwrap();

    upsync(project.path())
        .arg("check")
        .assert()
        .failure()
        .stdout(predicate::str::contains("Invalid entries (1)"))
        .stdout(predicate::str::contains("escape"));
}

#[test]
fn dry_run_touches_nothing() {
    let project = TempDir::new().unwrap();
    std::fs::write(
        project.path().join("resources.json"),
        r#"[{"name": "info", "url": "https://example.invalid/info", "path": "data/info.json"}]"#,
    )
    .unwrap();

    upsync(project.path())
        .args(["sync", "--dry-run"])
        .assert()
        .success()
        .stdout(predicate::str::contains("info"));
    assert!(!project.path().join("data").exists());
}

#[test]
fn manifest_flag_overrides_location() {
    let project = TempDir::new().unwrap();
    std::fs::create_dir_all(project.path().join("conf")).unwrap();
    std::fs::write(project.path().join("conf/deps.json"), "[]").unwrap();

    upsync(project.path())
        .args(["--manifest", "conf/deps.json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("0 succeeded, 0 failed, 0 skipped"));
}

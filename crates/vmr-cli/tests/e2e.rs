//! End-to-end tests for the VMR CLI.
//!
//! Tests invoke the `vmr` binary as a subprocess and verify JSON output.

use std::fs;
use std::path::Path;
use std::process::{Command, Output};

use tempfile::TempDir;

fn vmr() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_vmr"));
    cmd.env_remove("VMR_VAULT").env_remove("RUST_LOG");
    cmd
}

fn vmr_in(dir: &Path) -> Command {
    let mut cmd = vmr();
    cmd.current_dir(dir);
    cmd
}

fn init_vault(files: &[(&str, &str)]) -> TempDir {
    let dir = TempDir::new().unwrap();
    for (path, contents) in files {
        let full = dir.path().join(path);
        fs::create_dir_all(full.parent().unwrap()).unwrap();
        fs::write(full, contents).unwrap();
    }
    let output = vmr_in(dir.path()).arg("init").output().unwrap();
    assert!(
        output.status.success(),
        "init failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    dir
}

fn json(output: &Output) -> serde_json::Value {
    serde_json::from_slice(&output.stdout).unwrap_or_else(|e| {
        panic!(
            "invalid JSON ({e}): {}\nstderr: {}",
            String::from_utf8_lossy(&output.stdout),
            String::from_utf8_lossy(&output.stderr)
        )
    })
}

// === Init and index ===

#[test]
fn e2e_init_creates_state_directory() {
    let dir = init_vault(&[("a.md", "#alpha\n")]);
    assert!(dir.path().join(".vmr").join("config.toml").exists());
    assert!(dir.path().join(".vmr").join("index.db").exists());

    let config = fs::read_to_string(dir.path().join(".vmr/config.toml")).unwrap();
    assert!(config.contains("trash_dir"));
}

#[test]
fn e2e_index_reports_tag_counts() {
    let dir = init_vault(&[("a.md", "#alpha #beta\n"), ("b/c.md", "#alpha\n")]);

    let output = vmr_in(dir.path()).arg("index").output().unwrap();
    assert!(output.status.success());
    let result = json(&output);
    assert_eq!(result["indexed"], 2);
    let tags = result["tags"].as_array().unwrap();
    assert!(tags.iter().any(|t| t["tag"] == "alpha" && t["files"] == 2));
}

#[test]
fn e2e_init_skips_file_that_is_not_utf8() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("good.md"), "#kept\n").unwrap();
    fs::write(dir.path().join("bad.md"), [0xff, 0xfe, 0x00]).unwrap();

    let output = vmr_in(dir.path()).arg("init").output().unwrap();

    assert!(output.status.success());
    assert_eq!(json(&output)["indexed"], 1);
}

// === File mutations ===

#[test]
fn e2e_patch_renames_file() {
    let dir = init_vault(&[("notes/old.md", "hello\n")]);

    let output = vmr_in(dir.path())
        .args([
            "patch",
            "notes/old.md",
            "-H",
            "Operation: rename",
            "-H",
            "Target-Type: file",
            "-H",
            "Target: new.md",
        ])
        .output()
        .unwrap();

    assert!(output.status.success());
    let result = json(&output);
    assert_eq!(result["status"], 200);
    assert_eq!(result["body"]["newPath"], "notes/new.md");
    assert!(dir.path().join("notes/new.md").exists());
    assert!(!dir.path().join("notes/old.md").exists());
}

#[test]
fn e2e_conflicting_move_exits_nonzero() {
    let dir = init_vault(&[("a.md", "a"), ("b.md", "b")]);

    let output = vmr_in(dir.path())
        .args(["patch", "a.md", "-H", "Operation: move"])
        .args(["-H", "Target-Type: file", "-H", "Target: b.md"])
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(1));
    let result = json(&output);
    assert_eq!(result["status"], 409);
    assert_eq!(result["body"]["errorCode"], 40900);
    assert_eq!(fs::read_to_string(dir.path().join("a.md")).unwrap(), "a");
}

#[test]
fn e2e_frontmatter_patch_reads_body_file() {
    let dir = init_vault(&[("a.md", "---\nstatus: draft\n---\nBody\n")]);
    let body = dir.path().join("status.txt");
    fs::write(&body, "done").unwrap();

    let output = vmr_in(dir.path())
        .args(["patch", "a.md", "-H", "Operation: replace"])
        .args(["-H", "Target-Type: frontmatter", "-H", "Target: status"])
        .arg("--body-file")
        .arg(&body)
        .output()
        .unwrap();

    assert!(output.status.success());
    assert_eq!(
        fs::read_to_string(dir.path().join("a.md")).unwrap(),
        "---\nstatus: done\n---\nBody\n"
    );
}

#[test]
fn e2e_delete_moves_file_to_trash() {
    let dir = init_vault(&[("a.md", "bye")]);

    let output = vmr_in(dir.path()).args(["delete", "a.md"]).output().unwrap();

    assert!(output.status.success());
    assert_eq!(json(&output)["body"]["newPath"], ".trash/a.md");
    assert!(dir.path().join(".trash/a.md").exists());
}

#[test]
fn e2e_permanent_directory_delete() {
    let dir = init_vault(&[("old/a.md", "a"), ("old/sub/b.md", "b")]);

    let output = vmr_in(dir.path())
        .args(["delete", "old", "--directory", "--permanent"])
        .output()
        .unwrap();

    assert!(output.status.success());
    assert!(!dir.path().join("old").exists());
    assert!(!dir.path().join(".trash").exists());
}

#[test]
fn e2e_mkdir_is_idempotent() {
    let dir = init_vault(&[]);

    for _ in 0..2 {
        let output = vmr_in(dir.path()).args(["mkdir", "a/b/c"]).output().unwrap();
        assert!(output.status.success());
    }
    assert!(dir.path().join("a/b/c").is_dir());
}

// === Tags ===

#[test]
fn e2e_tag_add_then_rename() {
    let dir = init_vault(&[("a.md", "body\n"), ("b.md", "#draft body\n")]);

    let output = vmr_in(dir.path())
        .args(["tag", "add", "a.md", "draft", "draft", "todo"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let result = json(&output);
    assert_eq!(result["body"]["summary"]["requested"], 2);
    assert_eq!(result["body"]["summary"]["succeeded"], 2);

    let output = vmr_in(dir.path())
        .args(["tag", "rename", "draft", "final"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let result = json(&output);
    assert_eq!(result["body"]["modifiedCount"], 2);
    assert_eq!(
        fs::read_to_string(dir.path().join("b.md")).unwrap(),
        "#final body\n"
    );
    assert!(fs::read_to_string(dir.path().join("a.md"))
        .unwrap()
        .contains("- final"));
}

#[test]
fn e2e_tag_rename_of_unknown_tag_is_not_found() {
    let dir = init_vault(&[("a.md", "#alpha\n")]);

    let output = vmr_in(dir.path())
        .args(["tag", "rename", "missing", "other"])
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(1));
    assert_eq!(json(&output)["body"]["errorCode"], 40402);
}

// === Flags and errors ===

#[test]
fn e2e_vault_flag_selects_root() {
    let dir = init_vault(&[("a.md", "x")]);
    let elsewhere = TempDir::new().unwrap();

    let output = vmr_in(elsewhere.path())
        .arg("--vault")
        .arg(dir.path())
        .args(["mkdir", "made"])
        .output()
        .unwrap();

    assert!(output.status.success());
    assert!(dir.path().join("made").is_dir());
}

#[test]
fn e2e_malformed_header_is_a_usage_error() {
    let dir = init_vault(&[("a.md", "x")]);

    let output = vmr_in(dir.path())
        .args(["patch", "a.md", "-H", "Operation rename"])
        .output()
        .unwrap();

    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("Name: value"));
}

#[test]
fn e2e_completions_print_script() {
    let output = vmr().args(["completions", "bash"]).output().unwrap();
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("vmr"));
}

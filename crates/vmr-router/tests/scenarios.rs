//! End-to-end mutation scenarios against the in-memory vault and index.

use serde_json::json;

use vmr_core::{MetadataIndex, Status, Store, VaultConfig, VaultPath};
use vmr_index::TagIndex;
use vmr_router::{FrontmatterFieldPatcher, HandlerFamily, MutationEngine, MutationResponse, RawRequest};
use vmr_vault::{FsVault, MemoryVault};

struct Fixture {
    vault: MemoryVault,
    index: TagIndex,
    config: VaultConfig,
}

impl Fixture {
    fn new<'a>(files: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        let vault = MemoryVault::with_files(files);
        let config = VaultConfig::default();
        let index = TagIndex::in_memory().unwrap();
        index.rebuild(&vault, &config).unwrap();
        Self {
            vault,
            index,
            config,
        }
    }

    fn run(&self, request: RawRequest) -> MutationResponse {
        MutationEngine::new(
            &self.vault,
            &self.vault,
            &self.index,
            &FrontmatterFieldPatcher,
            &self.config,
        )
        .execute(&request)
    }
}

fn p(s: &str) -> VaultPath {
    VaultPath::parse(s).unwrap()
}

fn file_op(path: &str, op: &str, target: &str) -> RawRequest {
    RawRequest::patch(path)
        .header("Operation", op)
        .header("Target-Type", "file")
        .header("Target", target)
}

fn tag_op(path: &str, op: &str) -> RawRequest {
    RawRequest::patch(path)
        .header("Operation", op)
        .header("Target-Type", "tag")
}

#[test]
fn rename_keeps_directory_and_reports_paths() {
    let fx = Fixture::new([("notes/old.md", "x"), ("index.md", "[[notes/old]]")]);

    let resp = fx.run(file_op("notes/old.md", "rename", "new.md"));

    assert_eq!(resp.status_code(), 200);
    assert_eq!(resp.handler, Some(HandlerFamily::Identity));
    assert_eq!(
        resp.body,
        json!({
            "message": "File successfully renamed",
            "oldPath": "notes/old.md",
            "newPath": "notes/new.md",
        })
    );
    assert_eq!(fx.vault.contents("index.md").as_deref(), Some("[[notes/new]]"));
}

#[test]
fn rename_onto_existing_file_conflicts() {
    let fx = Fixture::new([("notes/old.md", "old"), ("notes/new.md", "new")]);

    let resp = fx.run(file_op("notes/old.md", "rename", "new.md"));

    assert_eq!(resp.status, Status::Conflict);
    assert_eq!(resp.body["errorCode"], 40900);
    assert_eq!(fx.vault.contents("notes/old.md").as_deref(), Some("old"));
    assert_eq!(fx.vault.contents("notes/new.md").as_deref(), Some("new"));
}

#[test]
fn failed_directory_move_restores_every_file() {
    let fx = Fixture::new([
        ("projects/a.md", "a"),
        ("projects/b.md", "b"),
        ("projects/c.md", "c"),
    ]);
    fx.vault.fail_moves_of("projects/b.md");

    let resp = fx.run(
        RawRequest::patch("projects")
            .header("Operation", "move")
            .header("Target-Type", "directory")
            .header("Target", "archive/projects"),
    );

    assert_eq!(resp.status_code(), 500);
    assert_eq!(resp.body["errorCode"], 50010);
    assert_eq!(resp.body["details"]["failedFile"], "projects/b.md");
    assert!(resp.body["message"].as_str().unwrap().contains("projects/b.md"));
    assert_eq!(
        fx.vault.file_paths(),
        vec!["projects/a.md", "projects/b.md", "projects/c.md"]
    );
    assert!(!fx.vault.has_dir("archive/projects"));
}

#[test]
fn failed_rollback_names_unrestored_files() {
    let fx = Fixture::new([
        ("projects/a.md", "a"),
        ("projects/b.md", "b"),
        ("projects/c.md", "c"),
    ]);
    fx.vault.fail_moves_of("projects/c.md");
    fx.vault.fail_moves_to("projects/a.md");

    let resp = fx.run(
        RawRequest::patch("projects")
            .header("Operation", "move")
            .header("Target-Type", "directory")
            .header("Target", "archive/projects"),
    );

    assert_eq!(resp.status_code(), 500);
    assert_eq!(resp.body["errorCode"], 50011);
    let unrestored = resp.body["details"]["unrestored"].as_array().unwrap();
    assert_eq!(unrestored.len(), 1);
    assert_eq!(unrestored[0]["originalPath"], "projects/a.md");
    assert_eq!(unrestored[0]["currentPath"], "archive/projects/a.md");
    assert_eq!(
        fx.vault.file_paths(),
        vec!["archive/projects/a.md", "projects/b.md", "projects/c.md"]
    );
}

#[test]
fn tag_batch_dedupes_and_skips_present_tags() {
    let fx = Fixture::new([("n.md", "---\ntags: [y]\n---\nbody\n")]);

    let resp = fx.run(
        tag_op("n.md", "add")
            .header("Content-Type", "application/json")
            .body(r#"{"tags": ["x", "x", "y"]}"#),
    );

    assert_eq!(resp.status_code(), 200);
    assert_eq!(
        resp.body["summary"],
        json!({"requested": 2, "succeeded": 1, "skipped": 1, "failed": 0})
    );
    assert_eq!(resp.body["results"][0]["tag"], "x");
    assert_eq!(resp.body["results"][1]["status"], "skipped");
    assert!(resp.body.get("message").is_none());
    assert_eq!(
        fx.vault.contents("n.md").as_deref(),
        Some("---\ntags:\n- y\n- x\n---\nbody\n")
    );
    assert_eq!(fx.index.files_with_tag("x").unwrap(), vec![p("n.md")]);
}

#[test]
fn repeating_an_add_batch_only_skips() {
    let fx = Fixture::new([("n.md", "body\n")]);
    let request = tag_op("n.md", "add").body(r#"{"tags": ["a", "b"]}"#);

    let first = fx.run(request.clone());
    let after_first = fx.vault.contents("n.md");
    let second = fx.run(request);

    assert_eq!(first.body["summary"]["succeeded"], 2);
    assert_eq!(second.body["summary"]["succeeded"], 0);
    assert_eq!(second.body["summary"]["skipped"], 2);
    assert_eq!(fx.vault.contents("n.md"), after_first);
}

#[test]
fn tag_membership_follows_file_content_over_stale_index() {
    let fx = Fixture::new([("n.md", "body\n"), ("m.md", "#real\n")]);
    fx.index.refresh(&p("n.md"), "#ghost\n").unwrap();
    fx.index.refresh(&p("m.md"), "plain\n").unwrap();

    let resp = fx.run(tag_op("n.md", "remove").body(r#"{"tags": ["ghost"]}"#));
    assert_eq!(resp.status_code(), 200);
    assert_eq!(resp.body["results"][0]["status"], "skipped");
    assert_eq!(resp.body["summary"]["skipped"], 1);
    assert_eq!(fx.vault.contents("n.md").as_deref(), Some("body\n"));
    assert!(fx.index.files_with_tag("ghost").unwrap().is_empty());

    let resp = fx.run(tag_op("m.md", "add").body(r#"{"tags": ["real"]}"#));
    assert_eq!(resp.body["summary"]["skipped"], 1);
    assert_eq!(fx.vault.contents("m.md").as_deref(), Some("#real\n"));
    assert_eq!(fx.index.files_with_tag("real").unwrap(), vec![p("m.md")]);
}

#[test]
fn legacy_single_tag_request_gets_flat_message() {
    let fx = Fixture::new([("n.md", "text #old here\n")]);

    let resp = fx.run(tag_op("n.md", "remove").header("Target", "%23old"));

    assert_eq!(resp.status_code(), 200);
    assert_eq!(resp.body_str("message"), Some("Tag removed"));
    assert_eq!(fx.vault.contents("n.md").as_deref(), Some("text here\n"));
}

#[test]
fn malformed_tags_only_is_a_bad_request() {
    let fx = Fixture::new([("n.md", "body\n")]);

    let resp = fx.run(tag_op("n.md", "add").body(r#"{"tags": ["bad tag", "123"]}"#));

    assert_eq!(resp.status_code(), 400);
    assert_eq!(resp.body["summary"]["failed"], 2);
    assert_eq!(fx.vault.contents("n.md").as_deref(), Some("body\n"));
}

#[test]
fn failed_tag_write_fails_every_pending_item() {
    let fx = Fixture::new([("n.md", "body\n")]);
    fx.vault.fail_writes_to("n.md");

    let resp = fx.run(tag_op("n.md", "add").body(r#"{"tags": ["a", "b"]}"#));

    assert_eq!(resp.status_code(), 500);
    assert_eq!(resp.body["summary"]["failed"], 2);
    assert_eq!(resp.body["errorCode"], 50020);
}

#[test]
fn routing_precedes_existence_checks() {
    let fx = Fixture::new([("exists.md", "")]);

    let resp = fx.run(tag_op("missing.md", "add").header("Target", "x"));
    assert_eq!(resp.handler, Some(HandlerFamily::Tag));
    assert_eq!(resp.status_code(), 404);
    assert_eq!(resp.body["errorCode"], 40410);

    let resp = fx.run(tag_op("missing.md", "append").header("Target", "x"));
    assert_eq!(resp.handler, None);
    assert_eq!(resp.status_code(), 400);
    assert_eq!(resp.body["errorCode"], 40022);
}

#[test]
fn vault_wide_rename_reports_partial_failure() {
    let files: Vec<(String, String)> = (1..=5)
        .map(|i| (format!("notes/{i}.md"), format!("---\ntags: [project]\n---\n#project n{i}\n")))
        .collect();
    let fx = Fixture::new(files.iter().map(|(p, c)| (p.as_str(), c.as_str())));
    fx.vault.fail_writes_to("notes/3.md");

    let resp = fx.run(tag_op("project", "rename").header("Target", "work"));

    assert_eq!(resp.status, Status::MultiStatus);
    assert_eq!(resp.body["modifiedCount"], 4);
    assert_eq!(resp.body["oldTag"], "project");
    assert_eq!(resp.body["newTag"], "work");
    assert_eq!(resp.body["errors"].as_array().unwrap().len(), 1);
    assert_eq!(resp.body["errors"][0]["file"], "notes/3.md");
    assert_eq!(
        fx.vault.contents("notes/1.md").as_deref(),
        Some("---\ntags:\n- work\n---\n#work n1\n")
    );
    assert!(fx.vault.contents("notes/3.md").unwrap().contains("#project"));
    assert_eq!(fx.index.files_with_tag("project").unwrap(), vec![p("notes/3.md")]);
}

#[test]
fn vault_wide_rename_is_exact_and_needs_matches() {
    let fx = Fixture::new([("a.md", "#project/archived\n")]);

    let resp = fx.run(tag_op("project", "rename").header("Target", "work"));
    assert_eq!(resp.status_code(), 404);
    assert_eq!(resp.body["errorCode"], 40402);
    assert_eq!(fx.vault.contents("a.md").as_deref(), Some("#project/archived\n"));
}

#[test]
fn vault_wide_rename_with_every_write_failing_is_internal_error() {
    let fx = Fixture::new([("a.md", "#old\n"), ("b.md", "#old\n")]);
    fx.vault.fail_writes_to("a.md");
    fx.vault.fail_writes_to("b.md");

    let resp = fx.run(tag_op("old", "rename").header("Target", "new"));

    assert_eq!(resp.status_code(), 500);
    assert_eq!(resp.body["modifiedCount"], 0);
    assert_eq!(resp.body["errorCode"], 50020);
}

#[test]
fn frontmatter_patch_goes_through_patcher() {
    let fx = Fixture::new([("a.md", "---\nstatus: draft\n---\nBody\n")]);

    let resp = fx.run(
        RawRequest::patch("a.md")
            .header("Operation", "replace")
            .header("Target-Type", "frontmatter")
            .header("Target", "status")
            .body("done"),
    );
    assert_eq!(resp.status_code(), 200);
    assert_eq!(resp.handler, Some(HandlerFamily::ContentPatch));
    assert_eq!(
        fx.vault.contents("a.md").as_deref(),
        Some("---\nstatus: done\n---\nBody\n")
    );

    let resp = fx.run(
        RawRequest::patch("a.md")
            .header("Operation", "append")
            .header("Target-Type", "heading")
            .header("Target", "Intro")
            .body("more"),
    );
    assert_eq!(resp.status_code(), 400);
    assert_eq!(resp.body["errorCode"], 40050);
}

#[test]
fn filesystem_vault_move_rewrites_links_on_disk() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir_all(dir.path().join("notes")).unwrap();
    std::fs::write(dir.path().join("notes/old.md"), "#keep\n").unwrap();
    std::fs::write(dir.path().join("index.md"), "see [[notes/old]]\n").unwrap();

    let vault = FsVault::open(dir.path()).unwrap();
    let index = TagIndex::in_memory().unwrap();
    index.rebuild(&vault, vault.config()).unwrap();
    let engine = MutationEngine::new(
        &vault,
        &vault,
        &index,
        &FrontmatterFieldPatcher,
        vault.config(),
    );

    let resp = engine.execute(&file_op("notes/old.md", "move", "archive/old.md"));

    assert_eq!(resp.status_code(), 200);
    assert!(dir.path().join("archive/old.md").exists());
    assert!(!vault.exists(&p("notes/old.md")).unwrap());
    assert_eq!(
        std::fs::read_to_string(dir.path().join("index.md")).unwrap(),
        "see [[archive/old]]\n"
    );
    assert_eq!(index.files_with_tag("keep").unwrap(), vec![p("archive/old.md")]);
}

fn disk_vault(files: &[(&str, &str)]) -> (tempfile::TempDir, FsVault, TagIndex) {
    let dir = tempfile::tempdir().unwrap();
    for (path, contents) in files {
        let full = dir.path().join(path);
        std::fs::create_dir_all(full.parent().unwrap()).unwrap();
        std::fs::write(full, contents).unwrap();
    }
    let vault = FsVault::open(dir.path()).unwrap();
    let index = TagIndex::in_memory().unwrap();
    index.rebuild(&vault, vault.config()).unwrap();
    (dir, vault, index)
}

fn run_on_disk(vault: &FsVault, index: &TagIndex, request: RawRequest) -> MutationResponse {
    MutationEngine::new(vault, vault, index, &FrontmatterFieldPatcher, vault.config())
        .execute(&request)
}

#[test]
fn filesystem_vault_purges_directory_inside_trash() {
    let (dir, vault, index) = disk_vault(&[(".trash/old/a.md", "a"), (".trash/keep.md", "k")]);

    let resp = run_on_disk(
        &vault,
        &index,
        RawRequest::delete(".trash/old")
            .header("Target-Type", "directory")
            .header("Permanent", "true"),
    );

    assert_eq!(resp.status_code(), 200);
    assert_eq!(resp.body["summary"]["requested"], 1);
    assert_eq!(resp.body_str("message"), Some("Directory permanently deleted"));
    assert!(!dir.path().join(".trash/old").exists());
    assert!(dir.path().join(".trash/keep.md").exists());
}

#[test]
fn filesystem_vault_moves_directory_under_ignored_folder() {
    let (dir, vault, index) = disk_vault(&[
        (".obsidian/plugins/one/main.md", "1"),
        (".obsidian/plugins/two.md", "2"),
    ]);

    let resp = run_on_disk(
        &vault,
        &index,
        RawRequest::patch(".obsidian/plugins")
            .header("Operation", "move")
            .header("Target-Type", "directory")
            .header("Target", "moved"),
    );

    assert_eq!(resp.status_code(), 200);
    assert_eq!(
        std::fs::read_to_string(dir.path().join("moved/one/main.md")).unwrap(),
        "1"
    );
    assert!(dir.path().join("moved/two.md").exists());
    assert!(!dir.path().join(".obsidian/plugins/two.md").exists());
}

#[test]
fn filesystem_vault_soft_deletes_directory_into_trash() {
    let (dir, vault, index) = disk_vault(&[("p/a.md", "#t\n"), ("p/sub/b.md", "b")]);
    std::fs::create_dir_all(dir.path().join("p/empty")).unwrap();

    let resp = run_on_disk(
        &vault,
        &index,
        RawRequest::delete("p").header("Target-Type", "directory"),
    );

    assert_eq!(resp.status_code(), 200);
    assert_eq!(resp.body_str("message"), Some("Directory moved to trash"));
    assert!(!dir.path().join("p").exists());
    assert!(dir.path().join(".trash/p/a.md").exists());
    assert!(dir.path().join(".trash/p/sub/b.md").exists());
    assert!(dir.path().join(".trash/p/empty").is_dir());
    assert!(index.files_with_tag("t").unwrap().is_empty());
}

#[test]
fn normalized_instruction_runs_without_a_raw_request() {
    let fx = Fixture::new([("a.md", "body\n")]);
    let request = tag_op("a.md", "add").header("Target", "%23fresh");
    let instruction = vmr_router::normalize::normalize(&request, "::").unwrap();
    assert_eq!(instruction.target.as_deref(), Some("#fresh"));

    let engine = MutationEngine::new(
        &fx.vault,
        &fx.vault,
        &fx.index,
        &FrontmatterFieldPatcher,
        &fx.config,
    );
    let resp = engine.execute_instruction(&instruction).unwrap();

    assert_eq!(resp.status, Status::Ok);
    assert_eq!(resp.body_str("message"), Some("Tag added"));
    assert_eq!(
        fx.vault.contents("a.md").as_deref(),
        Some("---\ntags:\n- fresh\n---\nbody\n")
    );
}

//! CLI integration tests for the mscolab binary.
//!
//! Each test uses an isolated temp directory for the database, ensuring tests
//! can run in parallel safely.

#![allow(deprecated)] // Command::cargo_bin deprecation only affects custom build dirs

use assert_cmd::Command;
use assert_fs::TempDir;
use assert_fs::prelude::*;
use predicates::prelude::*;
use serde_json::Value;

struct TestContext {
    temp_dir: TempDir,
}

impl TestContext {
    fn new() -> Self {
        Self {
            temp_dir: TempDir::new().expect("failed to create temp dir"),
        }
    }

    fn data_dir_str(&self) -> String {
        self.temp_dir.path().to_string_lossy().to_string()
    }

    fn cmd(&self) -> Command {
        let mut cmd = Command::cargo_bin("mscolab").expect("failed to find binary");
        cmd.env("NO_COLOR", "1")
            .args(["--data-dir", &self.data_dir_str()]);
        cmd
    }

    fn init(&self) -> assert_cmd::assert::Assert {
        self.cmd().arg("init").assert()
    }

    fn add_user(&self, name: &str) {
        self.cmd()
            .args([
                "user",
                "add",
                "--email",
                &format!("{name}@example.com"),
                "--username",
                name,
                "--password",
                "secret",
                "--non-interactive",
            ])
            .assert()
            .success();
    }

    fn as_user(&self, name: &str) -> Command {
        let mut cmd = self.cmd();
        cmd.args(["--as", &format!("{name}@example.com")]);
        cmd
    }

    fn json(&self, name: &str, args: &[&str]) -> Value {
        let output = self
            .as_user(name)
            .arg("--json")
            .args(args)
            .output()
            .expect("failed to run command");
        assert!(
            output.status.success(),
            "command failed: {}",
            String::from_utf8_lossy(&output.stderr)
        );
        serde_json::from_slice(&output.stdout).expect("failed to parse JSON")
    }

    fn create_op(&self, owner: &str, path: &str) -> String {
        let op = self.json(owner, &["op", "create", path, "--category", "tex"]);
        op["id"].as_i64().expect("missing id").to_string()
    }
}

#[test]
fn test_init_creates_database_once() {
    let ctx = TestContext::new();

    ctx.init()
        .success()
        .stdout(predicate::str::contains("Initialized"));
    ctx.temp_dir
        .child("mscolab.db")
        .assert(predicate::path::exists());

    ctx.init()
        .failure()
        .stderr(predicate::str::contains("Already initialized"));
}

#[test]
fn test_commands_require_init() {
    let ctx = TestContext::new();

    ctx.cmd()
        .args(["user", "list"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("mscolab init"));
}

#[test]
fn test_user_add_and_list() {
    let ctx = TestContext::new();
    ctx.init().success();
    ctx.add_user("alice");

    let users = ctx.json("alice", &["user", "list"]);
    let users = users.as_array().expect("expected array");
    assert_eq!(users.len(), 1);
    assert_eq!(users[0]["email"], "alice@example.com");
    assert!(users[0].get("password_hash").is_none());

    ctx.cmd()
        .args([
            "user",
            "add",
            "--email",
            "alice@example.com",
            "--username",
            "again",
            "--password",
            "x",
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("conflict"));
}

#[test]
fn test_user_add_requires_password_when_non_interactive() {
    let ctx = TestContext::new();
    ctx.init().success();

    ctx.cmd()
        .args([
            "user",
            "add",
            "--email",
            "bob@example.com",
            "--username",
            "bob",
            "--non-interactive",
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--password is required"));
}

#[test]
fn test_op_commands_require_acting_user() {
    let ctx = TestContext::new();
    ctx.init().success();

    ctx.cmd()
        .args(["op", "list"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--as <EMAIL>"));
}

#[test]
fn test_save_history_and_cat() {
    let ctx = TestContext::new();
    ctx.init().success();
    ctx.add_user("alice");
    let op = ctx.create_op("alice", "alpha");

    let track = ctx.temp_dir.child("track.ftml");
    track.write_str("<FlightTrack/>\n").unwrap();
    let track_path = track.path().to_string_lossy().to_string();

    ctx.as_user("alice")
        .args(["op", "save", &op, &track_path, "--comment", "first"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Saved"));
    ctx.as_user("alice")
        .args(["op", "save", &op, &track_path])
        .assert()
        .success()
        .stdout(predicate::str::contains("No changes"));

    let history = ctx.json("alice", &["op", "history", &op]);
    let history = history.as_array().expect("expected array");
    assert_eq!(history.len(), 1);
    assert_eq!(history[0]["comment"], "first");
    assert_eq!(history[0]["username"], "alice");

    ctx.as_user("alice")
        .args(["op", "cat", &op])
        .assert()
        .success()
        .stdout("<FlightTrack/>\n");
}

#[test]
fn test_save_from_stdin_and_undo() {
    let ctx = TestContext::new();
    ctx.init().success();
    ctx.add_user("alice");
    let op = ctx.create_op("alice", "alpha");

    for content in ["<v1/>\n", "<v2/>\n"] {
        ctx.as_user("alice")
            .args(["op", "save", &op, "-"])
            .write_stdin(content)
            .assert()
            .success();
    }

    let history = ctx.json("alice", &["op", "history", &op]);
    let first = history[1]["id"].as_i64().unwrap().to_string();

    ctx.as_user("alice")
        .args(["op", "name-version", &op, &first, "v1"])
        .assert()
        .success();
    let named = ctx.json("alice", &["op", "history", &op, "--named"]);
    assert_eq!(named.as_array().unwrap().len(), 1);

    ctx.as_user("alice")
        .args(["op", "undo", &first])
        .assert()
        .success();
    ctx.as_user("alice")
        .args(["op", "cat", &op])
        .assert()
        .success()
        .stdout("<v1/>\n");

    let history = ctx.json("alice", &["op", "history", &op]);
    assert_eq!(history.as_array().unwrap().len(), 3);
}

#[test]
fn test_permissions_gate_access() {
    let ctx = TestContext::new();
    ctx.init().success();
    ctx.add_user("alice");
    ctx.add_user("bob");
    let op = ctx.create_op("alice", "alpha");

    ctx.as_user("bob")
        .args(["op", "cat", &op])
        .assert()
        .failure()
        .stderr(predicate::str::contains("forbidden"));

    ctx.as_user("alice")
        .args(["perm", "add", &op, "--level", "collaborator", "bob@example.com"])
        .assert()
        .success();

    let members = ctx.json("bob", &["perm", "list", &op]);
    let members = members.as_array().expect("expected array");
    assert_eq!(members.len(), 2);
    assert!(
        members
            .iter()
            .any(|m| m["username"] == "bob" && m["access_level"] == "collaborator")
    );

    ctx.as_user("bob")
        .args(["op", "cat", &op])
        .assert()
        .success();

    ctx.as_user("alice")
        .args(["perm", "remove", &op, "bob@example.com"])
        .assert()
        .success();
    ctx.as_user("bob")
        .args(["op", "cat", &op])
        .assert()
        .failure();
}

#[test]
fn test_perm_rejects_unknown_level() {
    let ctx = TestContext::new();
    ctx.init().success();
    ctx.add_user("alice");
    let op = ctx.create_op("alice", "alpha");

    ctx.as_user("alice")
        .args(["perm", "add", &op, "--level", "owner", "alice@example.com"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("owner"));
}

#[test]
fn test_perm_import_reports_already_applied() {
    let ctx = TestContext::new();
    ctx.init().success();
    ctx.add_user("alice");
    ctx.add_user("bob");
    let alpha = ctx.create_op("alice", "alpha");
    let beta = ctx.create_op("alice", "beta");

    ctx.as_user("alice")
        .args(["perm", "add", &alpha, "--level", "viewer", "bob@example.com"])
        .assert()
        .success();

    let first = ctx.json("alice", &["perm", "import", &alpha, &beta]);
    assert_eq!(first["success"], true);

    let second = ctx.json("alice", &["perm", "import", &alpha, &beta]);
    assert_eq!(second["success"], false);
    assert_eq!(second["message"], "Permissions are already given");
}

#[test]
fn test_op_delete_needs_confirmation() {
    let ctx = TestContext::new();
    ctx.init().success();
    ctx.add_user("alice");
    let op = ctx.create_op("alice", "alpha");

    ctx.as_user("alice")
        .args(["op", "delete", &op, "--non-interactive"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--yes is required"));

    ctx.as_user("alice")
        .args(["op", "delete", &op, "-y"])
        .assert()
        .success();
    ctx.temp_dir
        .child("alpha")
        .assert(predicate::path::missing());

    let listed = ctx.json("alice", &["op", "list"]);
    assert!(listed.as_array().unwrap().is_empty());
}

#[test]
fn test_op_rename_and_show() {
    let ctx = TestContext::new();
    ctx.init().success();
    ctx.add_user("alice");
    let op = ctx.create_op("alice", "alpha");

    ctx.as_user("alice")
        .args(["op", "rename", &op, "bravo"])
        .assert()
        .success();
    ctx.as_user("alice")
        .args(["op", "rename", &op, "bad/path"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid operation path"));

    let details = ctx.json("alice", &["op", "show", &op]);
    assert_eq!(details["path"], "bravo");
    assert_eq!(details["category"], "tex");
    assert_eq!(details["active"], true);
}

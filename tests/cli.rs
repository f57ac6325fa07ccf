//! Integration tests for the pdef binary.
//!
//! Every test runs with its own HOME, store and working directory so no
//! user configuration leaks in.

use std::path::Path;
use std::process::Command as StdCommand;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

struct Env {
    home: TempDir,
    work: TempDir,
}

impl Env {
    fn new() -> Self {
        Self {
            home: TempDir::new().unwrap(),
            work: TempDir::new().unwrap(),
        }
    }

    fn store(&self) -> std::path::PathBuf {
        self.work.path().join("store")
    }

    /// A pdef command isolated from the user's environment.
    fn pdef(&self) -> Command {
        let mut cmd = Command::cargo_bin("pdef").unwrap();
        cmd.env("HOME", self.home.path())
            .env_remove("PDEF_CONFIG")
            .env_remove("XDG_CONFIG_HOME")
            .env_remove("RUST_LOG")
            .arg("--cwd")
            .arg(self.work.path())
            .arg("--store")
            .arg(self.store());
        cmd
    }

    fn put(&self, scope: &str, content: &str) {
        self.pdef()
            .args(["store", "put", "Jenkinsfile", "--scope", scope, "--content", content])
            .assert()
            .success();
    }
}

fn run_git(dir: &Path, args: &[&str]) {
    let output = StdCommand::new("git")
        .args(args)
        .current_dir(dir)
        .output()
        .expect("git command failed");
    assert!(
        output.status.success(),
        "git {:?} failed: {}",
        args,
        String::from_utf8_lossy(&output.stderr)
    );
}

fn sample_repo() -> TempDir {
    let dir = TempDir::new().unwrap();
    run_git(dir.path(), &["init"]);
    run_git(dir.path(), &["symbolic-ref", "HEAD", "refs/heads/master"]);
    run_git(dir.path(), &["config", "user.email", "test@example.com"]);
    run_git(dir.path(), &["config", "user.name", "Test User"]);
    std::fs::write(dir.path().join("file"), "initial content").unwrap();
    run_git(dir.path(), &["add", "file"]);
    run_git(dir.path(), &["commit", "--message=flow"]);
    dir
}

#[test]
fn version_flag_works() {
    Command::cargo_bin("pdef")
        .unwrap()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("pdef"));
}

#[test]
fn chain_lists_folders_then_global() {
    Env::new()
        .pdef()
        .args(["chain", "org/team/p"])
        .assert()
        .success()
        .stdout("folder:org/team\nfolder:org\nglobal\n");
}

#[test]
fn chain_rejects_bad_project() {
    Env::new()
        .pdef()
        .args(["chain", "org/../p"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid project name"));
}

#[test]
fn resolve_prefers_folder() {
    let env = Env::new();
    env.put("global", "echo 'global'");
    env.put("folder:org", "echo 'org'");

    env.pdef()
        .args(["resolve", "org/team/p"])
        .assert()
        .success()
        .stdout("echo 'org'\n")
        .stderr(predicate::str::contains("resolved from folder:org"));
}

#[test]
fn resolve_absent_is_not_an_error() {
    Env::new()
        .pdef()
        .args(["resolve", "org/p"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No default Jenkinsfile for org/p"));
}

#[test]
fn resolve_explain_shows_trail() {
    let env = Env::new();
    env.put("global", "node {}");

    env.pdef()
        .args(["resolve", "org/team/p", "--explain"])
        .assert()
        .success()
        .stdout(predicate::str::contains("folder:org/team").and(predicate::str::contains("miss")))
        .stdout(predicate::str::contains("hit"));
}

#[test]
fn resolve_json() {
    let env = Env::new();
    env.put("folder:org", "node {}");

    let output = env
        .pdef()
        .args(["resolve", "org/p", "--json"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let value: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(value["found"], true);
    assert_eq!(value["scope"], "folder:org");
    assert_eq!(value["content"], "node {}");
    assert_eq!(value["probes"][0]["outcome"], "hit");
    assert_eq!(value["probes"][1]["outcome"], "not probed");
}

#[test]
fn store_round_trip() {
    let env = Env::new();
    let script = env.work.path().join("Jenkinsfile.default");
    std::fs::write(&script, "node { checkout scm }\n").unwrap();

    env.pdef()
        .args(["store", "put", "Jenkinsfile", "--scope", "folder:org", "--comment", "org default"])
        .arg("--file")
        .arg(&script)
        .assert()
        .success();

    env.pdef()
        .args(["store", "list", "--scope", "folder:org"])
        .assert()
        .success()
        .stdout("Jenkinsfile\torg default\n");

    env.pdef()
        .args(["store", "show", "Jenkinsfile", "--scope", "folder:org"])
        .assert()
        .success()
        .stdout("node { checkout scm }\n");

    env.pdef()
        .args(["store", "remove", "Jenkinsfile", "--scope", "folder:org"])
        .assert()
        .success();

    env.pdef()
        .args(["store", "remove", "Jenkinsfile", "--scope", "folder:org"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("no document Jenkinsfile"));
}

#[test]
fn store_rejects_bad_scope() {
    Env::new()
        .pdef()
        .args(["store", "list", "--scope", "team"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid scope"));
}

#[test]
fn index_runs_default_and_prints_log() {
    let env = Env::new();
    let repo = sample_repo();
    env.put("folder:folder", "node {checkout scm; echo readFile('file')}");

    env.pdef()
        .args(["index", "folder/p", "--wait", "--repo"])
        .arg(repo.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("scheduled"))
        .stdout(predicate::str::contains("initial content"))
        .stdout(predicate::str::contains("Finished: SUCCESS"));
}

#[test]
fn index_semaphore_without_rendezvous_fails_run() {
    let env = Env::new();
    let repo = sample_repo();
    env.put("global", "semaphore 'wait'; node {checkout scm}");

    env.pdef()
        .args(["index", "folder/p", "--wait", "--repo"])
        .arg(repo.path())
        .assert()
        .failure()
        .stdout(predicate::str::contains("Finished: FAILURE"))
        .stderr(predicate::str::contains("1 run(s) failed"));
}

#[test]
fn index_without_default_reports_absent() {
    let env = Env::new();
    let repo = sample_repo();

    env.pdef()
        .args(["index", "folder/p", "--repo"])
        .arg(repo.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("absent-no-default"));
}

#[test]
fn workspace_config_changes_script_path() {
    let env = Env::new();
    let config_dir = env.work.path().join(".pipeline-defaults");
    std::fs::create_dir_all(&config_dir).unwrap();
    std::fs::write(config_dir.join("config.toml"), "script_path = \"build.groovy\"\n").unwrap();

    env.pdef()
        .args(["store", "put", "build.groovy", "--content", "node {}"])
        .assert()
        .success();

    env.pdef()
        .args(["resolve", "p"])
        .assert()
        .success()
        .stderr(predicate::str::contains("build.groovy for p resolved from global"));

    env.pdef()
        .arg("config")
        .assert()
        .success()
        .stdout(predicate::str::contains("script_path = build.groovy"))
        .stdout(predicate::str::contains("mode = fallback"));
}

#[test]
fn invalid_workspace_config_fails() {
    let env = Env::new();
    let config_dir = env.work.path().join(".pipeline-defaults");
    std::fs::create_dir_all(&config_dir).unwrap();
    std::fs::write(config_dir.join("config.toml"), "unknown_key = 1\n").unwrap();

    env.pdef()
        .arg("config")
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed to load configuration"));
}

#[test]
fn completion_generates_script() {
    Command::cargo_bin("pdef")
        .unwrap()
        .args(["completion", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("pdef"));
}

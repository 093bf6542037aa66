// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 toolflow contributors

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

const PIPELINE: &str = r#"
name: demo
options:
  concurrency: 2
steps:
  - name: build
    tool: shell
    action: run
    params:
      command: echo built
  - name: test
    tool: shell
    action: run
    params:
      command: echo tested
    depends_on: [build]
"#;

fn toolflow(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("toolflow").unwrap();
    cmd.current_dir(dir.path()).env("NO_COLOR", "1");
    cmd
}

fn project(pipeline: &str) -> TempDir {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join(".toolflow.yaml"), pipeline).unwrap();
    dir
}

#[test]
fn validate_accepts_good_pipeline() {
    let dir = project(PIPELINE);

    toolflow(&dir)
        .arg("validate")
        .assert()
        .success()
        .stdout(predicate::str::contains("Pipeline is valid!"));
}

#[test]
fn validate_rejects_cycle() {
    let dir = project(
        r#"
name: cyclic
steps:
  - { name: a, tool: shell, action: run, params: { command: "true" }, depends_on: [b] }
  - { name: b, tool: shell, action: run, params: { command: "true" }, depends_on: [a] }
"#,
    );

    toolflow(&dir)
        .arg("validate")
        .assert()
        .failure()
        .stdout(predicate::str::contains("a -> b -> a"));
}

#[test]
fn missing_pipeline_is_reported() {
    let dir = TempDir::new().unwrap();

    toolflow(&dir)
        .args(["graph", "nowhere.yaml"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("nowhere.yaml"));
}

#[test]
fn graph_prints_dot() {
    let dir = project(PIPELINE);

    toolflow(&dir)
        .args(["graph", "-f", "dot"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"build\" -> \"test\";"));
}

#[test]
fn run_executes_steps_in_order() {
    let dir = project(PIPELINE);

    toolflow(&dir)
        .arg("run")
        .assert()
        .success()
        .stdout(predicate::str::contains("✓ build"))
        .stdout(predicate::str::contains("2 succeeded"));
}

#[test]
fn run_fails_and_skips_dependents() {
    let dir = project(
        r#"
name: broken
steps:
  - { name: build, tool: shell, action: run, params: { command: "exit 1" } }
  - { name: test, tool: shell, action: run, params: { command: "true" }, depends_on: [build] }
"#,
    );

    toolflow(&dir)
        .arg("run")
        .assert()
        .failure()
        .stdout(predicate::str::contains("○ test"))
        .stdout(predicate::str::contains("1 skipped"));
}

#[test]
fn run_reads_toml_pipelines() {
    let dir = TempDir::new().unwrap();
    fs::write(
        dir.path().join("ci.toml"),
        r#"
name = "toml"

[[steps]]
name = "only"
tool = "shell"
action = "run"
params = { command = "echo ok" }
"#,
    )
    .unwrap();

    toolflow(&dir)
        .args(["run", "-p", "ci.toml", "--no-cache"])
        .assert()
        .success()
        .stdout(predicate::str::contains("1 succeeded"));
}

#[test]
fn workflow_prints_pipeline_yaml() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("a.rs"), "fn main() {}").unwrap();

    toolflow(&dir)
        .args(["workflow", "pre-commit", "*.rs", "--command", "wc -l {file}"])
        .assert()
        .success()
        .stdout(predicate::str::contains("check:a.rs"))
        .stdout(predicate::str::contains("wc -l a.rs"));
}

#[test]
fn workflow_runs_with_shell_command() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("a.txt"), "one\n").unwrap();
    fs::write(dir.path().join("b.txt"), "two\n").unwrap();

    toolflow(&dir)
        .args([
            "workflow",
            "pre-merge",
            "a.txt",
            "b.txt",
            "--command",
            "cat {file}",
            "--run",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("6 succeeded"));
}

#[test]
fn unknown_workflow_fails() {
    let dir = TempDir::new().unwrap();

    toolflow(&dir)
        .args(["workflow", "nightly", "a.rs"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("nightly"));
}

// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! End-to-end tests for the `htn-plan` binary.

#![allow(missing_docs)]
#![allow(clippy::unwrap_used)]

use std::io::Write;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::NamedTempFile;

const COMMUTE: &str = r#"{
    "facts": ["at-home", "at-work"],
    "operators": [
        {"name": "walk", "cost": 2, "pre": ["at-home"], "add": ["at-work"], "del": ["at-home"]},
        {"name": "drive", "cost": 1, "pre": ["at-home"], "add": ["at-work"], "del": ["at-home"]}
    ],
    "tasks": ["commute"],
    "methods": [
        {"name": "by-foot", "task": "commute", "subtasks": ["walk"]},
        {"name": "by-car", "task": "commute", "subtasks": ["drive"]}
    ],
    "init": ["at-home"],
    "goal": ["at-work"],
    "initial_tn": ["commute"]
}"#;

const LOCKED: &str = r#"{
    "facts": ["key"],
    "operators": [{"name": "open", "cost": 1}],
    "tasks": ["enter"],
    "methods": [{"name": "m-enter", "task": "enter", "pre": ["key"], "subtasks": ["open"]}],
    "init": [],
    "goal": [],
    "initial_tn": ["enter"]
}"#;

fn temp_json(text: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(text.as_bytes()).unwrap();
    file
}

fn htn_plan() -> Command {
    let mut cmd = Command::cargo_bin("htn-plan").unwrap();
    cmd.env_remove("RUST_LOG");
    cmd
}

fn stdout_json(output: &std::process::Output) -> serde_json::Value {
    serde_json::from_slice(&output.stdout).unwrap()
}

#[test]
fn lm_cut_astar_finds_the_cheap_plan() {
    let model = temp_json(COMMUTE);
    let output = htn_plan()
        .arg(model.path())
        .args(["--heuristic", "lmcut", "--search", "astar"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let json = stdout_json(&output);
    assert_eq!(json["status"], "GOAL");
    assert_eq!(json["plan_names"], serde_json::json!(["drive"]));
    assert_eq!(json["plan_cost"], 1);
    assert_eq!(json["heuristic"], "lm-cut");
}

#[test]
fn model_can_be_piped_through_stdin() {
    htn_plan()
        .arg("-")
        .write_stdin(COMMUTE)
        .assert()
        .success()
        .stdout(predicate::str::contains(r#""status":"GOAL""#))
        .stdout(predicate::str::contains(r#""heuristic":"landmark-count""#));
}

#[test]
fn flags_override_the_config_file() {
    let model = temp_json(COMMUTE);
    let config = temp_json(r#"{"search": {"kind": "depth_first"}, "heuristic": {"kind": "tdg"}}"#);
    let output = htn_plan()
        .arg(model.path())
        .arg("--config")
        .arg(config.path())
        .args(["--heuristic", "blind"])
        .output()
        .unwrap();
    assert!(output.status.success());
    assert_eq!(stdout_json(&output)["heuristic"], "blind");
}

#[test]
fn unsolvable_model_exits_with_the_no_plan_code() {
    let model = temp_json(LOCKED);
    let output = htn_plan().arg(model.path()).output().unwrap();
    assert_eq!(output.status.code(), Some(2));
    let json = stdout_json(&output);
    assert_eq!(json["status"], "UNSOLVABLE");
    assert_eq!(json["plan"], serde_json::json!([]));
}

#[test]
fn logs_stay_off_stdout() {
    let model = temp_json(COMMUTE);
    let output = htn_plan()
        .arg(model.path())
        .args(["--log-level", "debug", "--trace-nodes", "--pretty"])
        .output()
        .unwrap();
    assert!(output.status.success());
    assert_eq!(stdout_json(&output)["status"], "GOAL");
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("search finished"), "stderr: {stderr}");
}

#[test]
fn unknown_names_in_the_model_are_reported() {
    let model = temp_json(r#"{"facts": [], "tasks": [], "initial_tn": ["nowhere"]}"#);
    htn_plan()
        .arg(model.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed to load model"))
        .stderr(predicate::str::contains("nowhere"));
}

#[test]
fn infeasible_configuration_fails_before_searching() {
    let model = temp_json(COMMUTE);
    htn_plan()
        .arg(model.path())
        .args(["--search", "astar", "--novelty"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid planner configuration"))
        .stdout(predicate::str::is_empty());
}

#[test]
fn missing_model_file_names_the_path() {
    htn_plan()
        .arg("does-not-exist.json")
        .assert()
        .failure()
        .stderr(predicate::str::contains("does-not-exist.json"));
}

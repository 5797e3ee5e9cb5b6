//! Integration tests for the runner entry point, driven through the
//! casefile-selftest binary

use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::Value;
use std::fs;
use tempfile::TempDir;

fn selftest_cmd() -> Command {
    let mut cmd = Command::cargo_bin("casefile-selftest").expect("binary not found");
    for var in [
        "CASEFILE_CAPABILITIES",
        "CASEFILE_JOBS",
        "CASEFILE_TIMEOUT_MS",
        "CASEFILE_SEED",
        "CASEFILE_CORPUS_DIR",
        "CASEFILE_BASELINE_FILE",
        "CASEFILE_LOG",
    ] {
        cmd.env_remove(var);
    }
    cmd.env("NO_COLOR", "1");
    cmd
}

fn report_json(args: &[&str]) -> (Option<i32>, Value) {
    let output = selftest_cmd()
        .args(args)
        .arg("--json")
        .output()
        .expect("run casefile-selftest");
    let report = serde_json::from_slice(&output.stdout).expect("valid JSON report");
    (output.status.code(), report)
}

fn result<'a>(report: &'a Value, suite: &str, name: &str) -> &'a Value {
    report["results"]
        .as_array()
        .unwrap()
        .iter()
        .find(|r| r["id"]["suite"] == suite && r["id"]["name"] == name)
        .unwrap_or_else(|| panic!("no result for {}/{}", suite, name))
}

#[test]
fn test_list_shows_every_case() {
    selftest_cmd()
        .arg("--list")
        .assert()
        .success()
        .stdout(predicate::str::contains("math/add"))
        .stdout(predicate::str::contains("store/insert  fixture: kv"))
        .stdout(predicate::str::contains("net/dial  requires: network  [missing: network]"))
        .stdout(predicate::str::contains("net/legacy  [skip: protocol retired]"))
        .stdout(predicate::str::contains("11 case(s)"));
}

#[test]
fn test_plain_tests_pass() {
    selftest_cmd()
        .args(["--exclude-tag", "broken", "--kind", "test"])
        .assert()
        .success()
        .stdout(predicate::str::contains("[ PASS ] math/add"))
        .stdout(predicate::str::contains("[ PASS ] store/read_back"))
        .stdout(predicate::str::contains("[ SKIP ] net/legacy"))
        .stdout(predicate::str::contains("[ N/RN ] net/dial"))
        .stdout(predicate::str::contains("missing capability: network"));
}

#[test]
fn test_failing_case_exit_code() {
    selftest_cmd()
        .args(["--run", "broken/always_fails"])
        .assert()
        .code(1)
        .stdout(predicate::str::contains("[ FAIL ] broken/always_fails"))
        .stdout(predicate::str::contains("one equals two"))
        .stdout(predicate::str::contains("Failures:"));
}

#[test]
fn test_unknown_case_is_usage_error() {
    selftest_cmd()
        .args(["--run", "nope"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("nope"));
}

#[test]
fn test_json_report() {
    let (code, report) = report_json(&["--suite", "math"]);
    assert_eq!(code, Some(0));
    assert_eq!(report["exit_status"], "success");
    assert_eq!(report["counts"]["total"], 3);
    assert_eq!(report["counts"]["passed"], 3);

    let fuzz = result(&report, "math", "parse_roundtrip");
    assert_eq!(fuzz["kind"], "fuzz");
    assert!(fuzz["fuzz"].is_object());
}

#[test]
fn test_capability_enables_case() {
    let (code, report) = report_json(&["--suite", "net", "--capability", "network"]);
    assert_eq!(code, Some(0));
    assert_eq!(result(&report, "net", "dial")["outcome"], "passed");
    assert_eq!(result(&report, "net", "legacy")["outcome"], "skipped");
}

#[test]
fn test_capability_from_environment() {
    let output = selftest_cmd()
        .env("CASEFILE_CAPABILITIES", "network")
        .args(["--run", "net/dial", "--json"])
        .output()
        .expect("run casefile-selftest");
    let report: Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(result(&report, "net", "dial")["outcome"], "passed");
}

#[test]
fn test_junit_written() {
    let temp_dir = TempDir::new().unwrap();
    let junit = temp_dir.path().join("report.xml");

    selftest_cmd()
        .args(["--suite", "broken", "--junit"])
        .arg(&junit)
        .assert()
        .code(1);

    let xml = fs::read_to_string(&junit).unwrap();
    assert!(xml.contains("<testsuite name=\"broken\""));
    assert!(xml.contains("always_fails"));
    assert!(xml.contains("<failure"));
}

#[test]
fn test_benchmark_measured() {
    let (code, report) = report_json(&[
        "--run",
        "perf/sum_loop",
        "--max-total-time",
        "0.05",
        "--min-epoch-time",
        "0.0001",
        "--epochs",
        "3",
    ]);
    assert_eq!(code, Some(0));
    let bench = result(&report, "perf", "sum_loop");
    assert_eq!(bench["outcome"], "passed");
    assert!(bench["bench"].is_object());
}

#[test]
fn test_baseline_file_written() {
    let temp_dir = TempDir::new().unwrap();
    let store = temp_dir.path().join("baselines.json");

    selftest_cmd()
        .args([
            "--run",
            "perf/sum_reference",
            "--max-total-time",
            "0.05",
            "--min-epoch-time",
            "0.0001",
            "--epochs",
            "3",
            "--baseline-file",
        ])
        .arg(&store)
        .assert()
        .success();

    let saved = fs::read_to_string(&store).unwrap();
    assert!(saved.contains("sum_reference"));
}

#[test]
fn test_repeat_and_seed_reported() {
    selftest_cmd()
        .args(["--run", "math/add", "--repeat", "2", "--shuffle", "--seed", "99"])
        .assert()
        .success()
        .stdout(predicate::str::contains("2 total: 2 passed"))
        .stdout(predicate::str::contains("shuffle seed: 99"));
}

#[test]
fn test_no_color_output() {
    selftest_cmd()
        .args(["--run", "math/add"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\u{1b}[").not());
}

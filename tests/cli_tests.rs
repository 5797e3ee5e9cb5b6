//! Integration tests for the casefile manifest tool

use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::Value;
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

fn casefile_cmd() -> Command {
    Command::cargo_bin("casefile").expect("binary not found")
}

fn manifest(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixture/manifests")
        .join(name)
}

#[test]
fn test_check_valid_manifests() {
    casefile_cmd()
        .arg("check")
        .arg(manifest("codec.json"))
        .arg(manifest("bench.json"))
        .assert()
        .success()
        .stdout(predicate::str::contains("ok: 4 case(s) in 2 unit(s)"));
}

#[test]
fn test_check_reports_every_invalid_declaration() {
    casefile_cmd()
        .arg("check")
        .arg(manifest("invalid.json"))
        .assert()
        .code(2)
        .stderr(predicate::str::contains(
            "tests/invalid.cpp:14: error[MemberFuzzTargetError]",
        ))
        .stderr(predicate::str::contains(
            "tests/invalid.cpp:22: error[RawPointerWithoutLengthError]",
        ))
        .stderr(predicate::str::contains(
            "tests/invalid.cpp:30: error[UnknownAnnotationError]",
        ))
        .stderr(predicate::str::contains("3 error(s) in 1 unit(s)"));
}

#[test]
fn test_check_detects_duplicates_across_units() {
    casefile_cmd()
        .arg("check")
        .arg(manifest("codec.json"))
        .arg(manifest("duplicate.json"))
        .assert()
        .code(2)
        .stderr(predicate::str::contains("error[DuplicateName]"))
        .stderr(predicate::str::contains("codec/encode_empty"));
}

#[test]
fn test_check_json_output() {
    let output = casefile_cmd()
        .arg("--json")
        .arg("check")
        .arg(manifest("invalid.json"))
        .output()
        .expect("run casefile");
    assert_eq!(output.status.code(), Some(2));

    let json: Value = serde_json::from_slice(&output.stdout).expect("valid JSON");
    assert_eq!(json["units"], 1);
    assert_eq!(json["cases"], 0);
    let rules: Vec<&str> = json["errors"]
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["rule"].as_str().unwrap())
        .collect();
    assert!(rules.contains(&"MemberFuzzTargetError"));
    assert!(rules.contains(&"RawPointerWithoutLengthError"));
}

#[test]
fn test_check_missing_manifest() {
    casefile_cmd()
        .arg("check")
        .arg("/nonexistent/manifest.json")
        .assert()
        .code(2)
        .stderr(predicate::str::contains("Failed to read manifest"));
}

#[test]
fn test_emit_sorted_descriptors() {
    let temp_dir = TempDir::new().unwrap();
    let out = temp_dir.path().join("records.json");

    casefile_cmd()
        .arg("emit")
        .arg(manifest("codec.json"))
        .arg(manifest("bench.json"))
        .arg("--out")
        .arg(&out)
        .assert()
        .success()
        .stderr(predicate::str::contains("wrote 4 record(s)"));

    let records: Value = serde_json::from_str(&fs::read_to_string(&out).unwrap()).unwrap();
    let identities: Vec<&str> = records
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["identity"].as_str().unwrap())
        .collect();
    assert_eq!(
        identities,
        vec!["codec/clamp", "codec/decode", "codec/encode_empty", "perf/encode_large"]
    );

    let skipped = &records[3];
    assert_eq!(skipped["kind"], "bench");
    assert_eq!(skipped["should_skip"], true);
    assert_eq!(skipped["skip_reason"], "slow on CI");

    let encode = &records[2];
    assert_eq!(encode["requirements"], serde_json::json!(["REQ-12"]));
    assert_eq!(encode["file"], "tests/codec.cpp");
    assert_eq!(encode["line"], 10);
}

#[test]
fn test_emit_refuses_invalid_units() {
    casefile_cmd()
        .arg("emit")
        .arg(manifest("invalid.json"))
        .assert()
        .code(2)
        .stdout(predicate::str::is_empty());
}

#[test]
fn test_list_filters_by_kind() {
    casefile_cmd()
        .arg("list")
        .arg(manifest("codec.json"))
        .arg(manifest("bench.json"))
        .arg("--kind")
        .arg("fuzz")
        .assert()
        .success()
        .stdout(predicate::str::contains("codec/decode"))
        .stdout(predicate::str::contains("codec/clamp").not())
        .stdout(predicate::str::contains("1 case(s)"));
}

#[test]
fn test_list_json() {
    let output = casefile_cmd()
        .args(["list", "--json", "--tag", "fast"])
        .arg(manifest("codec.json"))
        .output()
        .expect("run casefile");
    assert!(output.status.success());

    let cases: Value = serde_json::from_slice(&output.stdout).expect("valid JSON");
    let cases = cases.as_array().unwrap();
    assert_eq!(cases.len(), 1);
    assert_eq!(cases[0]["identity"], "codec/encode_empty");
    assert_eq!(cases[0]["requirements"], serde_json::json!(["REQ-12"]));
}

#[test]
fn test_list_duplicate_is_an_error() {
    casefile_cmd()
        .arg("list")
        .arg(manifest("codec.json"))
        .arg(manifest("duplicate.json"))
        .assert()
        .code(2);
}

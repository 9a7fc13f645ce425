use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::json;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

const V1: &str = "example.io/api/v1";
const V2: &str = "example.io/api/v2";

fn write_universe(dir: &Path) -> std::path::PathBuf {
    let universe = json!({
        "packages": [
            { "path": V1, "doc": ["+typeconv=example.io/api/v2"] },
            { "path": V2 }
        ],
        "types": [
            { "name": { "name": "string" }, "kind": "primitive" },
            { "name": { "name": "int" }, "kind": "primitive" },
            {
                "name": { "package": V1, "name": "Widget" },
                "kind": "struct",
                "members": [
                    { "name": "Name", "type": { "name": "string" } },
                    { "name": "Count", "type": { "name": "int" } }
                ]
            },
            {
                "name": { "package": V2, "name": "Widget" },
                "kind": "struct",
                "members": [
                    { "name": "Name", "type": { "name": "string" } },
                    { "name": "Count", "type": { "name": "int" } }
                ]
            }
        ]
    });
    let path = dir.join("universe.json");
    fs::write(&path, universe.to_string()).unwrap();
    path
}

#[test]
fn test_generate_writes_conversion_file() {
    let dir = TempDir::new().unwrap();
    let universe = write_universe(dir.path());
    let out = dir.path().join("out");

    Command::cargo_bin("typeconv")
        .unwrap()
        .arg(&universe)
        .args(["--package", V1])
        .arg("--output-base")
        .arg(&out)
        .assert()
        .success();

    let generated = out.join(V1).join("zz_generated_conversions.go");
    let source = fs::read_to_string(&generated).expect("generated file written");
    assert!(source.contains("package v1"));
    assert!(source.contains("Convert_v1_Widget_To_v2_Widget"));
    assert!(source.contains("RegisterConversions"));
}

#[test]
fn test_dry_run_prints_to_stdout() {
    let dir = TempDir::new().unwrap();
    let universe = write_universe(dir.path());

    Command::cargo_bin("typeconv")
        .unwrap()
        .arg(&universe)
        .args(["--package", V1, "--dry-run"])
        .assert()
        .success()
        .stdout(predicate::str::contains("package v1"))
        .stdout(predicate::str::contains("Convert_v1_Widget_To_v2_Widget"));
}

#[test]
fn test_missing_universe_file_fails() {
    Command::cargo_bin("typeconv")
        .unwrap()
        .arg("nonexistent.json")
        .args(["--package", V1])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to read universe"));
}

#[test]
fn test_malformed_universe_fails() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("universe.json");
    fs::write(&path, "{ not json").unwrap();

    Command::cargo_bin("typeconv")
        .unwrap()
        .arg(&path)
        .args(["--package", V1])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to parse universe"));
}

#[test]
fn test_unmarked_package_is_skipped() {
    let dir = TempDir::new().unwrap();
    let universe = write_universe(dir.path());
    let out = dir.path().join("out");

    Command::cargo_bin("typeconv")
        .unwrap()
        .arg(&universe)
        .args(["--package", V2])
        .arg("--output-base")
        .arg(&out)
        .assert()
        .success();

    assert!(!out.join(V2).join("zz_generated_conversions.go").exists());
}

#[test]
fn test_header_file_is_injected() {
    let dir = TempDir::new().unwrap();
    let universe = write_universe(dir.path());
    let header = dir.path().join("header.txt");
    fs::write(&header, "// Copyright The Example Authors.\n").unwrap();
    let out = dir.path().join("out");

    Command::cargo_bin("typeconv")
        .unwrap()
        .arg(&universe)
        .args(["--package", V1])
        .arg("--output-base")
        .arg(&out)
        .arg("--header-file")
        .arg(&header)
        .assert()
        .success();

    let source =
        fs::read_to_string(out.join(V1).join("zz_generated_conversions.go")).unwrap();
    assert!(source.starts_with("// Copyright The Example Authors."));
}

#[test]
fn test_emit_ir_writes_sidecar() {
    let dir = TempDir::new().unwrap();
    let universe = write_universe(dir.path());
    let out = dir.path().join("out");

    Command::cargo_bin("typeconv")
        .unwrap()
        .arg(&universe)
        .args(["--package", V1, "--emit-ir"])
        .arg("--output-base")
        .arg(&out)
        .assert()
        .success();

    let ir_path = out.join(V1).join("zz_generated_conversions.json");
    let ir: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&ir_path).unwrap()).unwrap();
    assert_eq!(ir["package"], V1);
    assert!(ir["functions"].as_array().unwrap().len() >= 2);
}

#[test]
fn test_skip_unsafe_changes_strategy() {
    let dir = TempDir::new().unwrap();
    let universe = write_universe(dir.path());

    // Identical structs: direct conversion either way, but the pointer-free
    // fixture never needs unsafe; assert the flag is accepted and output
    // stays deterministic.
    Command::cargo_bin("typeconv")
        .unwrap()
        .arg(&universe)
        .args(["--package", V1, "--skip-unsafe", "--dry-run"])
        .assert()
        .success()
        .stdout(predicate::str::contains("*out = v2.Widget(*in)"));
}

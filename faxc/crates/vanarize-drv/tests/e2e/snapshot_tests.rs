//! Snapshot tests for compiled-program output.
//!
//! Unlike the other two files here, these compare the *whole* stdout of a
//! run against a recorded `.snap` file rather than asserting a handful of
//! predicates - useful for fixtures with several `print` calls where the
//! full transcript is the thing worth pinning down.

use assert_cmd::Command;
use std::fs;
use std::path::PathBuf;

fn fixtures_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests").join("e2e").join("fixtures")
}

fn snapshots_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests").join("e2e").join("snapshots")
}

fn vanarize_bin() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_vanarize"))
}

/// Compares `actual` against the recorded `tests/e2e/snapshots/<name>.snap`.
/// Writes the file on first run so a fresh checkout records its own
/// baseline instead of failing with nothing to compare against; CI sets
/// `CI=1` to make a missing/mismatched snapshot a hard failure.
fn assert_snapshot(name: &str, actual: &str) {
    let path = snapshots_dir().join(format!("{name}.snap"));
    match fs::read_to_string(&path) {
        Ok(expected) => assert_eq!(actual, expected, "snapshot '{name}' does not match recorded output"),
        Err(_) if std::env::var("CI").is_ok() => {
            panic!("snapshot '{name}' is missing at {path:?}; run locally once to record it")
        }
        Err(_) => {
            fs::create_dir_all(snapshots_dir()).expect("create snapshots dir");
            fs::write(&path, actual).expect("write snapshot");
        }
    }
}

#[test]
fn loops_stdout_snapshot() {
    let output = Command::new(vanarize_bin())
        .arg(fixtures_dir().join("loops.vana"))
        .output()
        .expect("run vanarize");
    assert!(output.status.success());
    assert_snapshot("loops_stdout", &String::from_utf8_lossy(&output.stdout));
}

#[test]
fn struct_access_stdout_snapshot() {
    let output = Command::new(vanarize_bin())
        .arg(fixtures_dir().join("struct_access.vana"))
        .output()
        .expect("run vanarize");
    assert!(output.status.success());
    assert_snapshot("struct_access_stdout", &String::from_utf8_lossy(&output.stdout));
}

#[test]
fn functions_stdout_snapshot() {
    let output = Command::new(vanarize_bin())
        .arg(fixtures_dir().join("functions.vana"))
        .output()
        .expect("run vanarize");
    assert!(output.status.success());
    assert_snapshot("functions_stdout", &String::from_utf8_lossy(&output.stdout));
}

//! CLI interface end-to-end tests: argument handling and exit codes.
//!
//! `vanarize` takes exactly one positional argument and defines no flags
//! (spec.md §6) - these tests exercise the usage/IO/parse/success exit-code
//! table directly through the built binary.

use assert_cmd::Command;
use predicates::prelude::*;
use std::path::PathBuf;

fn fixtures_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests").join("e2e").join("fixtures")
}

fn vanarize_bin() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_vanarize"))
}

#[test]
fn no_arguments_is_usage_error() {
    Command::new(vanarize_bin())
        .assert()
        .code(64)
        .stderr(predicate::str::contains("usage"));
}

#[test]
fn extra_arguments_is_usage_error() {
    Command::new(vanarize_bin())
        .arg(fixtures_dir().join("hello_world.vana"))
        .arg("extra")
        .assert()
        .code(64);
}

#[test]
fn missing_file_is_io_error() {
    Command::new(vanarize_bin())
        .arg("/nonexistent/path/does_not_exist.vana")
        .assert()
        .code(74)
        .stderr(predicate::str::contains("error"));
}

#[test]
fn valid_program_exits_zero() {
    Command::new(vanarize_bin())
        .arg(fixtures_dir().join("hello_world.vana"))
        .assert()
        .code(0);
}

#[test]
fn parse_error_exits_65() {
    Command::new(vanarize_bin())
        .arg(fixtures_dir().join("invalid_syntax.vana"))
        .assert()
        .code(65)
        .stderr(predicate::str::contains("error"));
}

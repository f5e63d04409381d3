//! Compilation pipeline end-to-end tests: each fixture exercises one of
//! spec.md §8's concrete end-to-end scenarios by running the real
//! `vanarize` binary against a `.vana` file and checking stdout/exit code.

use assert_cmd::Command;
use predicates::prelude::*;
use std::path::PathBuf;

fn fixtures_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests").join("e2e").join("fixtures")
}

fn vanarize_bin() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_vanarize"))
}

fn run(fixture: &str) -> assert_cmd::assert::Assert {
    Command::new(vanarize_bin()).arg(fixtures_dir().join(fixture)).assert()
}

#[test]
fn hello_world_prints_the_string() {
    run("hello_world.vana").success().stdout(predicate::str::contains("hello, world"));
}

#[test]
fn arithmetic_prints_the_sum() {
    run("arithmetic.vana").success().stdout(predicate::eq("30\n"));
}

#[test]
fn control_flow_takes_the_true_branch() {
    run("control_flow.vana").success().stdout(predicate::eq("1\n"));
}

#[test]
fn functions_call_and_return() {
    run("functions.vana").success().stdout(predicate::eq("30\n"));
}

#[test]
fn for_loop_prints_each_iteration() {
    run("loops.vana").success().stdout(predicate::eq("0\n1\n2\n"));
}

#[test]
fn variable_declarations_accumulate() {
    run("variables.vana").success().stdout(predicate::eq("3\n"));
}

#[test]
fn struct_field_access_sums_fields() {
    run("struct_access.vana").success().stdout(predicate::eq("30\n"));
}

#[test]
fn invalid_syntax_fails_with_expect_expression() {
    run("invalid_syntax.vana").failure().code(65).stderr(predicate::str::contains("Expect expression"));
}

#[test]
fn unterminated_string_fails_with_diagnostic() {
    run("unterminated_string.vana")
        .failure()
        .code(65)
        .stderr(predicate::str::contains("Unterminated string"));
}

#[test]
fn undeclared_variable_fails_to_compile() {
    run("undeclared_variable.vana").failure().code(65);
}

#[test]
fn invalid_assignment_target_is_rejected() {
    run("invalid_assignment_target.vana")
        .failure()
        .code(65)
        .stderr(predicate::str::contains("Invalid assignment target"));
}

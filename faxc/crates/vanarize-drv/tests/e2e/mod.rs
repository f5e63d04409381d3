//! End-to-end tests for the vanarize driver.
//!
//! This module contains comprehensive E2E tests that verify the full
//! compilation pipeline from vanarize source code to a running process.

mod compilation_tests;
mod cli_tests;
mod snapshot_tests;
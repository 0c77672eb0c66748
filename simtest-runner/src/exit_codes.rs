// Copyright (c) The simtest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

/// Documented exit codes for `simtest` failures.
///
/// Comparison mismatches are reported in the summary and do not change the exit code. Tests that
/// could not be run to completion do.
///
/// Unknown/unexpected failures will always result in exit code 1.
pub enum SimtestExitCode {}

impl SimtestExitCode {
    /// No errors occurred and simtest exited normally.
    pub const OK: i32 = 0;

    /// A user issue happened while setting up a simtest invocation: for example, the config could
    /// not be parsed or the comparator is unavailable.
    pub const SETUP_ERROR: i32 = 96;

    /// The requested tests could not be resolved: an unknown test name, or `ALL` combined with
    /// other names.
    pub const INVALID_REQUEST: i32 = 94;

    /// The restart dependencies of the requested tests are invalid: a prerequisite is missing or
    /// the dependencies form a cycle.
    pub const DEPENDENCY_ERROR: i32 = 97;

    /// A test definition is malformed.
    pub const MALFORMED_TEST: i32 = 98;

    /// The batch ran to the end, but at least one test could not be run to completion.
    pub const TESTS_ERRORED: i32 = 99;

    /// A test could not be run to completion and the batch was aborted.
    pub const TEST_RUN_ABORTED: i32 = 100;

    /// Registering a job as a test failed.
    pub const REGISTER_FAILED: i32 = 103;

    /// Writing data to stdout, stderr or the batch directory produced an error.
    pub const WRITE_OUTPUT_ERROR: i32 = 110;
}

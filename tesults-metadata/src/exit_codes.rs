// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

/// Documented exit codes for `cargo tesults` failures.
///
/// Reporting is a side channel: failing to upload results never changes the exit code. Only
/// problems with the invocation itself are reported this way.
///
/// Unknown/unexpected failures will always result in exit code 1.
pub enum TesultsExitCode {}

impl TesultsExitCode {
    /// No errors occurred and cargo-tesults exited normally.
    ///
    /// This is also the exit code when reporting is disabled or an upload fails.
    pub const OK: i32 = 0;

    /// The runner facts file could not be read or parsed.
    pub const FACTS_READ_FAILED: i32 = 104;

    /// Writing data to stdout or stderr produced an error.
    pub const WRITE_OUTPUT_ERROR: i32 = 110;

    /// A user issue happened while setting up a cargo-tesults invocation, such as an invalid
    /// configuration file.
    pub const SETUP_ERROR: i32 = 96;
}

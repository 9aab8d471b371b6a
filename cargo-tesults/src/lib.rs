// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Report `cargo test` results to [Tesults](https://www.tesults.com).
//!
//! A run is reported in three phases:
//!
//! 1. `cargo tesults start` clears supplemental data left over from a previous run.
//! 2. While tests run, they attach files, descriptions, steps and custom fields, either in-process
//!    through `tesults_reporter::annotate` or by shelling out to `cargo tesults file`,
//!    `cargo tesults desc` and so on.
//! 3. `cargo tesults report --facts <FILE>` merges that data with the runner's results and
//!    uploads them.

#![warn(missing_docs)]

mod dispatch;
mod errors;
mod output;

#[doc(hidden)]
pub use dispatch::*;
#[doc(hidden)]
pub use errors::*;
#[doc(hidden)]
pub use output::OutputWriter;

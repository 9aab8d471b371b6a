// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

#![warn(missing_docs)]

//! Core functionality for [cargo tesults](https://crates.io/crates/cargo-tesults): collecting
//! supplemental data from running tests and reporting a completed run.
//!
//! Test code attaches data through [`annotate`]. The host runner drives a
//! [`RunLifecycle`](reporter::RunLifecycle), which merges that data with the runner's own facts
//! and uploads the result through a [`Transport`](transport::Transport).

pub mod annotate;
pub mod case_files;
pub mod config;
pub mod errors;
pub mod reporter;
pub mod store;
pub mod transport;

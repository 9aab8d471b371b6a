// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Build and serialize Tesults results payloads in Rust.
//!
//! A [`Payload`] is the document handed to the Tesults ingestion service. It carries the upload
//! target token, the list of reported [`Case`]s and some metadata about the integration that
//! produced it.

mod errors;
mod report;
mod serialize;

pub use errors::*;
pub use report::*;

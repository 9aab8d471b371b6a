// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

#![warn(missing_docs)]

//! Structured access to the facts a test runner reports at the end of a run.
//!
//! `cargo tesults report` consumes a JSON document in the shape of [`RunFacts`]. The runner (or a
//! small adapter script around it) is responsible for producing it once every test has finished.
//!
//! ```json
//! {
//!   "suites": [
//!     {
//!       "test-path": "tests/login.rs",
//!       "cases": [
//!         {
//!           "title": "succeeds",
//!           "full-name": "login::succeeds",
//!           "ancestor-titles": ["Login"],
//!           "status": "passed",
//!           "duration-ms": 120
//!         }
//!       ]
//!     }
//!   ]
//! }
//! ```

mod errors;
mod exit_codes;
mod facts;

pub use errors::*;
pub use exit_codes::*;
pub use facts::*;

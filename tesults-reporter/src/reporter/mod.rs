// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Turn a completed run into a results payload.
//!
//! The main type here is [`RunLifecycle`], which is driven by the host runner's start and
//! completion hooks.

mod assemble;
mod lifecycle;

pub use assemble::*;
pub use lifecycle::*;

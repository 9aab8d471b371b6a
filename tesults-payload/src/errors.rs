// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::CaseResult;
use thiserror::Error;

/// An error that occurs while serializing a [`Payload`](crate::Payload).
///
/// Returned by [`Payload::serialize`](crate::Payload::serialize) and
/// [`Payload::to_string`](crate::Payload::to_string).
#[derive(Debug, Error)]
#[error("error serializing results payload")]
pub struct SerializeError {
    #[from]
    inner: serde_json::Error,
}

/// Error returned while parsing a [`CaseResult`] from a string.
#[derive(Clone, Debug, Error)]
#[error(
    "unrecognized value for case result: {input}\n(known values: {})",
    CaseResult::variants().join(", "),
)]
pub struct CaseResultParseError {
    input: String,
}

impl CaseResultParseError {
    pub(crate) fn new(input: impl Into<String>) -> Self {
        Self {
            input: input.into(),
        }
    }

    /// Returns the input that failed to parse.
    pub fn input(&self) -> &str {
        &self.input
    }
}

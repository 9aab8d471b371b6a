// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use std::{error, fmt};

/// An error that occurs while parsing [`RunFacts`](crate::RunFacts).
#[derive(Debug)]
pub enum FactsParseError {
    /// Reading the input resulted in an error.
    Read(std::io::Error),

    /// The input was not valid JSON, or did not match the expected shape.
    Json(serde_json::Error),
}

impl fmt::Display for FactsParseError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Read(_) => {
                write!(f, "reading runner facts failed")
            }
            Self::Json(err) => {
                write!(
                    f,
                    "parsing runner facts failed at line {}, column {}",
                    err.line(),
                    err.column()
                )
            }
        }
    }
}

impl error::Error for FactsParseError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            Self::Read(err) => Some(err),
            Self::Json(err) => Some(err),
        }
    }
}

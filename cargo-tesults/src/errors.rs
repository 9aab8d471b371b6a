// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::output::{NO_HEADING_TARGET, StderrStyles};
use camino::Utf8PathBuf;
use owo_colors::OwoColorize;
use std::error::Error;
use tesults_metadata::{FactsParseError, TesultsExitCode};
use tesults_reporter::errors::ConfigParseError;
use thiserror::Error;
use tracing::error;

pub(crate) type Result<T, E = ExpectedError> = std::result::Result<T, E>;

// The #[error()] strings are placeholders: errors are printed with display_to_stderr, which
// colorizes them.

/// An error in the invocation of cargo-tesults.
///
/// Problems while reporting are logged rather than returned, so these only cover the inputs and
/// outputs of the process itself.
#[derive(Debug, Error)]
#[doc(hidden)]
pub enum ExpectedError {
    #[error("failed to read runner facts")]
    FactsReadError {
        path: Utf8PathBuf,
        #[source]
        err: FactsParseError,
    },
    #[error("config parse error")]
    ConfigParseError {
        #[from]
        err: ConfigParseError,
    },
    #[error("error writing to output")]
    WriteOutputError {
        #[source]
        err: std::io::Error,
    },
}

impl ExpectedError {
    pub(crate) fn facts_read_error(path: impl Into<Utf8PathBuf>, err: FactsParseError) -> Self {
        Self::FactsReadError {
            path: path.into(),
            err,
        }
    }

    /// Returns the exit code for the process.
    pub fn process_exit_code(&self) -> i32 {
        match self {
            Self::FactsReadError { .. } => TesultsExitCode::FACTS_READ_FAILED,
            Self::ConfigParseError { .. } => TesultsExitCode::SETUP_ERROR,
            Self::WriteOutputError { .. } => TesultsExitCode::WRITE_OUTPUT_ERROR,
        }
    }

    /// Displays this error to stderr.
    pub fn display_to_stderr(&self, styles: &StderrStyles) {
        let mut next_error = match self {
            Self::FactsReadError { path, err } => {
                error!(
                    "failed to read runner facts from `{}`",
                    path.style(styles.bold)
                );
                Some(err as &dyn Error)
            }
            Self::ConfigParseError { err } => {
                error!("{err}");
                err.source()
            }
            Self::WriteOutputError { err } => {
                error!("error writing to output");
                Some(err as &dyn Error)
            }
        };

        while let Some(err) = next_error {
            error!(target: NO_HEADING_TARGET, "\nCaused by:\n  {}", err);
            next_error = err.source();
        }
    }
}

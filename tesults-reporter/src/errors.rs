// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Errors produced by the reporter.
//!
//! None of these errors escape the reporting hooks: a reporting side channel must never fail the
//! run it is reporting on. They are surfaced by the `try_*` methods, and otherwise logged.

use camino::Utf8PathBuf;
use config::ConfigError;
use std::{error::Error, fmt};
use thiserror::Error;

/// An error that occurred while reading the supplemental data store.
#[derive(Debug, Error)]
pub enum StoreReadError {
    /// Error reading the store file.
    #[error("failed to read supplemental data at `{path}`")]
    Read {
        /// The path that failed to be read.
        path: Utf8PathBuf,
        /// The underlying IO error.
        #[source]
        error: std::io::Error,
    },

    /// Error deserializing the store file.
    #[error("failed to deserialize supplemental data at `{path}`")]
    Deserialize {
        /// The path that failed to be deserialized.
        path: Utf8PathBuf,
        /// The underlying deserialization error.
        #[source]
        error: serde_json::Error,
    },

    /// The store file was written by an incompatible version.
    #[error("supplemental data version mismatch at `{path}`: expected {expected}, got {actual}")]
    VersionMismatch {
        /// The path with the version mismatch.
        path: Utf8PathBuf,
        /// The expected version.
        expected: u32,
        /// The actual version found.
        actual: u32,
    },
}

/// An error that occurred while writing the supplemental data store.
#[derive(Debug, Error)]
pub enum StoreWriteError {
    /// Error creating the directory containing the store file.
    #[error("failed to create directory `{path}`")]
    CreateDir {
        /// The directory path that failed to be created.
        path: Utf8PathBuf,
        /// The underlying IO error.
        #[source]
        error: std::io::Error,
    },

    /// Error writing the store file.
    #[error("failed to write supplemental data to `{path}`")]
    Write {
        /// The path that failed to be written.
        path: Utf8PathBuf,
        /// The underlying error: either serialization or IO.
        #[source]
        error: atomicwrites::Error<serde_json::Error>,
    },
}

/// An error that occurred while locking the supplemental data store.
#[derive(Debug, Error)]
pub enum StoreLockError {
    /// Error opening or locking the lock file.
    #[error("failed to lock `{path}`")]
    Lock {
        /// The lock file path.
        path: Utf8PathBuf,
        /// The underlying IO error.
        #[source]
        error: std::io::Error,
    },

    /// Another process held the lock for too long.
    #[error("timed out after {timeout_secs}s waiting to lock `{path}`")]
    Timeout {
        /// The lock file path.
        path: Utf8PathBuf,
        /// The timeout that was hit.
        timeout_secs: u64,
    },
}

/// An error that occurred while listing a case's files.
///
/// A missing directory is not an error: most cases have no files.
#[derive(Debug, Error)]
#[error("failed to list case files in `{dir}`")]
pub struct CaseFilesError {
    dir: Utf8PathBuf,
    #[source]
    error: std::io::Error,
}

impl CaseFilesError {
    pub(crate) fn new(dir: impl Into<Utf8PathBuf>, error: std::io::Error) -> Self {
        Self {
            dir: dir.into(),
            error,
        }
    }
}

/// An error that occurred while loading reporter configuration.
#[derive(Debug, Error)]
#[error("failed to load tesults config{}", .config_file.as_ref().map(|f| format!(" at `{f}`")).unwrap_or_default())]
#[non_exhaustive]
pub struct ConfigParseError {
    config_file: Option<Utf8PathBuf>,
    #[source]
    err: ConfigParseErrorKind,
}

impl ConfigParseError {
    pub(crate) fn new(config_file: Option<Utf8PathBuf>, err: ConfigParseErrorKind) -> Self {
        Self { config_file, err }
    }

    /// Returns the config file, if the error is associated with one.
    pub fn config_file(&self) -> Option<&Utf8PathBuf> {
        self.config_file.as_ref()
    }

    /// Returns the kind of error.
    pub fn kind(&self) -> &ConfigParseErrorKind {
        &self.err
    }
}

/// The kind of [`ConfigParseError`].
#[derive(Debug, Error)]
pub enum ConfigParseErrorKind {
    /// An error produced while building or deserializing the layered configuration.
    #[error(transparent)]
    Build(#[from] ConfigError),

    /// An override was not of the form `key=value`.
    #[error("invalid override `{input}`: expected `key=value`")]
    InvalidOverride {
        /// The override as passed in.
        input: String,
    },
}

/// An error that occurred while uploading a payload.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The payload could not be serialized.
    #[error("failed to serialize results payload")]
    Serialize(#[from] tesults_payload::SerializeError),

    /// The HTTP request failed.
    #[error("request to `{url}` failed")]
    Request {
        /// The URL the payload was sent to.
        url: String,
        /// The underlying HTTP error.
        #[source]
        error: Box<ureq::Error>,
    },

    /// The service responded with a body that could not be understood.
    #[error("unexpected response from `{url}` (HTTP {status})")]
    InvalidResponse {
        /// The URL the payload was sent to.
        url: String,
        /// The HTTP status code.
        status: u16,
        /// The underlying error.
        #[source]
        error: Box<ureq::Error>,
    },

    /// The upload thread panicked.
    #[error("upload thread panicked")]
    Panicked,
}

/// Displays an error along with its chain of sources.
pub struct DisplayErrorChain<E> {
    error: E,
}

impl<E: Error> DisplayErrorChain<E> {
    /// Creates a new `DisplayErrorChain`.
    pub fn new(error: E) -> Self {
        Self { error }
    }
}

impl<E: Error> fmt::Display for DisplayErrorChain<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.error)?;

        let mut source = self.error.source();
        if source.is_some() {
            write!(f, "\n  caused by:")?;
        }
        while let Some(error) = source {
            write!(f, "\n  - {error}")?;
            source = error.source();
        }

        Ok(())
    }
}

// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Resolution of per-case files from a directory convention.
//!
//! When a files directory is configured, the files for a case live at
//! `<files-dir>/<suite>/<case name>/`, or `<files-dir>/<case name>/` for cases without a suite.

use crate::errors::{CaseFilesError, DisplayErrorChain};
use camino::{Utf8Component, Utf8Path, Utf8PathBuf};
use std::io;
use tracing::{debug, warn};

/// Entries created by operating systems that are never case files.
static HOUSEKEEPING_FILES: &[&str] = &[".DS_Store", "Thumbs.db", "desktop.ini"];

/// Resolves the files for a case from a base directory.
#[derive(Clone, Debug)]
pub struct CaseFileResolver {
    base_dir: Utf8PathBuf,
}

impl CaseFileResolver {
    /// Creates a new resolver rooted at `base_dir`.
    ///
    /// A relative `base_dir` is made absolute against the current directory.
    pub fn new(base_dir: impl Into<Utf8PathBuf>) -> Self {
        let base_dir = base_dir.into();
        let base_dir = std::path::absolute(&base_dir)
            .ok()
            .and_then(|path| Utf8PathBuf::from_path_buf(path).ok())
            .unwrap_or(base_dir);
        Self { base_dir }
    }

    /// Returns the base directory.
    pub fn base_dir(&self) -> &Utf8Path {
        &self.base_dir
    }

    /// Returns the directory holding the files for a case.
    ///
    /// The suite and name are always appended below the base directory, even if they start with
    /// a separator.
    pub fn case_dir(&self, suite: Option<&str>, name: &str) -> Utf8PathBuf {
        let mut dir = self.base_dir.clone();
        if let Some(suite) = suite {
            push_relative(&mut dir, suite);
        }
        push_relative(&mut dir, name);
        dir
    }

    /// Returns the files for a case, sorted by file name.
    ///
    /// A missing directory yields no files. Any other error is logged and also yields no files.
    pub fn resolve(&self, suite: Option<&str>, name: &str) -> Vec<Utf8PathBuf> {
        match self.try_resolve(suite, name) {
            Ok(files) => files,
            Err(error) => {
                warn!("{}", DisplayErrorChain::new(&error));
                Vec::new()
            }
        }
    }

    /// Returns the files for a case, sorted by file name.
    ///
    /// A missing directory yields no files.
    pub fn try_resolve(
        &self,
        suite: Option<&str>,
        name: &str,
    ) -> Result<Vec<Utf8PathBuf>, CaseFilesError> {
        let dir = self.case_dir(suite, name);
        let entries = match dir.read_dir_utf8() {
            Ok(entries) => entries,
            Err(error) if error.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(error) => return Err(CaseFilesError::new(dir, error)),
        };

        let mut files = Vec::new();
        for entry in entries {
            let entry = match entry {
                Ok(entry) => entry,
                Err(error) if error.kind() == io::ErrorKind::InvalidData => {
                    // read_dir_utf8 reports non-UTF-8 names this way.
                    debug!("skipping non-UTF-8 entry in `{dir}`");
                    continue;
                }
                Err(error) => return Err(CaseFilesError::new(dir, error)),
            };
            if HOUSEKEEPING_FILES.contains(&entry.file_name()) {
                continue;
            }
            files.push(entry.into_path());
        }

        files.sort_unstable_by(|a, b| a.file_name().cmp(&b.file_name()));
        Ok(files)
    }
}

/// Appends `title` to `dir` as relative components. Roots and prefixes are dropped.
fn push_relative(dir: &mut Utf8PathBuf, title: &str) {
    for component in Utf8Path::new(title).components() {
        match component {
            Utf8Component::Normal(_) | Utf8Component::ParentDir => dir.push(component.as_str()),
            Utf8Component::Prefix(_) | Utf8Component::RootDir | Utf8Component::CurDir => {}
        }
    }
}

/// Returns the files for a case under `base_dir`.
///
/// Shorthand for [`CaseFileResolver::resolve`].
pub fn resolve(base_dir: &Utf8Path, suite: Option<&str>, name: &str) -> Vec<Utf8PathBuf> {
    CaseFileResolver::new(base_dir).resolve(suite, name)
}

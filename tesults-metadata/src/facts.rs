// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::FactsParseError;
use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};
use std::{io, time::Duration};

/// Everything the test runner reported about a completed run.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct RunFacts {
    /// Suite results, in the order the runner traversed them.
    #[serde(default)]
    pub suites: Vec<SuiteFacts>,
}

impl RunFacts {
    /// Parses runner facts from a JSON string.
    pub fn parse_json(json: impl AsRef<str>) -> Result<Self, FactsParseError> {
        serde_json::from_str(json.as_ref()).map_err(FactsParseError::Json)
    }

    /// Parses runner facts from a reader producing JSON.
    pub fn from_reader(reader: impl io::Read) -> Result<Self, FactsParseError> {
        serde_json::from_reader(reader).map_err(|err| {
            if err.is_io() {
                FactsParseError::Read(err.into())
            } else {
                FactsParseError::Json(err)
            }
        })
    }

    /// Returns the total number of cases across all suites.
    pub fn case_count(&self) -> usize {
        self.suites.iter().map(|suite| suite.cases.len()).sum()
    }
}

/// The results for a single test file.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct SuiteFacts {
    /// The path to the test file.
    pub test_path: Utf8PathBuf,

    /// Case results, in the order the runner traversed them.
    #[serde(default)]
    pub cases: Vec<CaseFacts>,
}

/// The result of a single test.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct CaseFacts {
    /// The title of the test, without any enclosing groups.
    pub title: String,

    /// The fully qualified name of the test.
    pub full_name: String,

    /// Titles of the groups enclosing this test, outermost first.
    #[serde(default)]
    pub ancestor_titles: Vec<String>,

    /// The status of the test.
    pub status: CaseStatus,

    /// The time taken by the test, in milliseconds.
    #[serde(default)]
    pub duration_ms: Option<u64>,

    /// Failure messages, if the test failed.
    #[serde(default)]
    pub failure_messages: Vec<String>,
}

impl CaseFacts {
    /// Returns the time taken by the test.
    pub fn duration(&self) -> Option<Duration> {
        self.duration_ms.map(Duration::from_millis)
    }
}

/// The status of a test as reported by the runner.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CaseStatus {
    /// The test passed.
    Passed,

    /// The test failed.
    Failed,

    /// The test was skipped.
    Skipped,

    /// The test is pending.
    Pending,

    /// The test is a placeholder.
    Todo,

    /// The test was disabled.
    Disabled,

    /// A status this version does not know about.
    #[serde(other)]
    Other,
}

// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::{
    CaseResultParseError, SerializeError,
    serialize::{serialize_duration_ms, serialize_payload},
};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::{fmt, io, str::FromStr, time::Duration};

/// The root of a results upload.
#[derive(Clone, Debug, Serialize)]
pub struct Payload {
    /// The target token identifying where results are uploaded to.
    pub target: String,

    /// The reported cases.
    pub results: Results,

    /// Information about the integration that produced this payload.
    pub metadata: PayloadMetadata,
}

impl Payload {
    /// Creates a new, empty `Payload` for the given target.
    pub fn new(target: impl Into<String>, metadata: PayloadMetadata) -> Self {
        Self {
            target: target.into(),
            results: Results::default(),
            metadata,
        }
    }

    /// Adds a case to the end of this payload.
    pub fn add_case(&mut self, case: Case) -> &mut Self {
        self.results.cases.push(case);
        self
    }

    /// Adds several cases to the end of this payload, in order.
    pub fn add_cases(&mut self, cases: impl IntoIterator<Item = Case>) -> &mut Self {
        self.results.cases.extend(cases);
        self
    }

    /// Returns the cases in this payload.
    pub fn cases(&self) -> &[Case] {
        &self.results.cases
    }

    /// Serialize this payload to the given writer.
    pub fn serialize(&self, writer: impl io::Write) -> Result<(), SerializeError> {
        serialize_payload(self, writer)
    }

    /// Serialize this payload to a string.
    pub fn to_string(&self) -> Result<String, SerializeError> {
        let mut buf: Vec<u8> = vec![];
        self.serialize(&mut buf)?;
        // serde_json only ever produces UTF-8.
        Ok(String::from_utf8_lossy(&buf).into_owned())
    }
}

/// The `results` object of a [`Payload`].
#[derive(Clone, Debug, Default, Serialize)]
pub struct Results {
    /// Reported cases, in the order they were added.
    pub cases: Vec<Case>,
}

/// Describes the integration that produced a [`Payload`].
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct PayloadMetadata {
    /// The name of the integration, e.g. `cargo-tesults`.
    pub integration_name: String,

    /// The version of the integration.
    pub integration_version: String,

    /// The test framework whose results are being reported.
    pub test_framework: String,
}

impl PayloadMetadata {
    /// Creates a new `PayloadMetadata`.
    pub fn new(
        integration_name: impl Into<String>,
        integration_version: impl Into<String>,
        test_framework: impl Into<String>,
    ) -> Self {
        Self {
            integration_name: integration_name.into(),
            integration_version: integration_version.into(),
            test_framework: test_framework.into(),
        }
    }
}

/// A single reported test outcome.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[non_exhaustive]
pub struct Case {
    /// The name of the case.
    pub name: String,

    /// The outcome of the case.
    pub result: CaseResult,

    /// The suite this case belongs to.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suite: Option<String>,

    /// Why the case did not pass.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,

    /// The time taken by the case.
    ///
    /// This is serialized as a whole number of milliseconds.
    #[serde(
        skip_serializing_if = "Option::is_none",
        serialize_with = "serialize_duration_ms"
    )]
    pub duration: Option<Duration>,

    /// Paths to files associated with this case.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub files: Option<Vec<String>>,

    /// A free-text description of the case.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub desc: Option<String>,

    /// Steps recorded while the case ran.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub steps: Option<Vec<Step>>,

    /// Custom fields, serialized as top-level keys of the case.
    ///
    /// Keys are expected to carry the [`CUSTOM_FIELD_PREFIX`].
    #[serde(flatten)]
    pub custom: IndexMap<String, String>,
}

/// The prefix which marks a case field as user-defined.
pub const CUSTOM_FIELD_PREFIX: &str = "_";

impl Case {
    /// Creates a new case.
    pub fn new(name: impl Into<String>, result: CaseResult) -> Self {
        Self {
            name: name.into(),
            result,
            suite: None,
            reason: None,
            duration: None,
            files: None,
            desc: None,
            steps: None,
            custom: IndexMap::new(),
        }
    }

    /// Sets the suite of the case.
    pub fn set_suite(&mut self, suite: impl Into<String>) -> &mut Self {
        self.suite = Some(suite.into());
        self
    }

    /// Sets the reason for the outcome.
    pub fn set_reason(&mut self, reason: impl Into<String>) -> &mut Self {
        self.reason = Some(reason.into());
        self
    }

    /// Sets the time taken by the case.
    pub fn set_duration(&mut self, duration: Duration) -> &mut Self {
        self.duration = Some(duration);
        self
    }

    /// Sets the files associated with the case, replacing any existing ones.
    pub fn set_files(&mut self, files: impl IntoIterator<Item = impl Into<String>>) -> &mut Self {
        self.files = Some(files.into_iter().map(Into::into).collect());
        self
    }

    /// Sets the description of the case.
    pub fn set_desc(&mut self, desc: impl Into<String>) -> &mut Self {
        self.desc = Some(desc.into());
        self
    }

    /// Sets the steps of the case, replacing any existing ones.
    pub fn set_steps(&mut self, steps: impl IntoIterator<Item = Step>) -> &mut Self {
        self.steps = Some(steps.into_iter().collect());
        self
    }

    /// Sets a custom field.
    ///
    /// `name` is stored as given; use [`CUSTOM_FIELD_PREFIX`] to mark it as user-defined.
    pub fn set_custom(&mut self, name: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.custom.insert(name.into(), value.into());
        self
    }
}

/// A step within a [`Case`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Step {
    /// The name of the step.
    pub name: String,

    /// The outcome of the step.
    ///
    /// Steps carry the same results as cases: `pass`, `fail` or `unknown`. Any other result is
    /// read back as `unknown`, so two adjacent steps with the same name and different
    /// unrecognized results have the same outcome.
    #[serde(default)]
    pub result: CaseResult,

    /// A description of the step.
    ///
    /// `description` is accepted as an alias when deserializing.
    #[serde(default, alias = "description", skip_serializing_if = "Option::is_none")]
    pub desc: Option<String>,
}

impl Step {
    /// Creates a new step without a description.
    pub fn new(name: impl Into<String>, result: CaseResult) -> Self {
        Self {
            name: name.into(),
            result,
            desc: None,
        }
    }

    /// Sets the description of this step.
    pub fn set_desc(&mut self, desc: impl Into<String>) -> &mut Self {
        self.desc = Some(desc.into());
        self
    }

    /// Returns true if `other` has the same name and result as `self`.
    ///
    /// Descriptions are not compared.
    pub fn same_outcome(&self, other: &Step) -> bool {
        self.name == other.name && self.result == other.result
    }
}

/// The outcome of a [`Case`] or [`Step`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CaseResult {
    /// The case passed.
    Pass,

    /// The case failed.
    Fail,

    /// The outcome is not known, or is neither a pass nor a fail.
    #[default]
    #[serde(other)]
    Unknown,
}

impl CaseResult {
    /// Returns the string representation of this result.
    pub fn as_str(self) -> &'static str {
        match self {
            CaseResult::Pass => "pass",
            CaseResult::Fail => "fail",
            CaseResult::Unknown => "unknown",
        }
    }

    /// Returns all known string representations.
    pub fn variants() -> &'static [&'static str] {
        &["pass", "fail", "unknown"]
    }
}

impl fmt::Display for CaseResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CaseResult {
    type Err = CaseResultParseError;

    /// Parses a result, ignoring ASCII case.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("pass") {
            Ok(CaseResult::Pass)
        } else if s.eq_ignore_ascii_case("fail") {
            Ok(CaseResult::Fail)
        } else if s.eq_ignore_ascii_case("unknown") {
            Ok(CaseResult::Unknown)
        } else {
            Err(CaseResultParseError::new(s))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("pass", Some(CaseResult::Pass); "lowercase pass")]
    #[test_case("FAIL", Some(CaseResult::Fail); "uppercase fail")]
    #[test_case("Unknown", Some(CaseResult::Unknown); "mixed case unknown")]
    #[test_case("passed", None; "runner status is not a result")]
    #[test_case("", None; "empty")]
    fn case_result_from_str(input: &str, expected: Option<CaseResult>) {
        assert_eq!(input.parse::<CaseResult>().ok(), expected);
    }

    #[test]
    fn case_result_parse_error_lists_variants() {
        let err = "skipped".parse::<CaseResult>().unwrap_err();
        assert_eq!(err.input(), "skipped");
        assert_eq!(
            err.to_string(),
            "unrecognized value for case result: skipped\n(known values: pass, fail, unknown)"
        );
    }

    #[test]
    fn step_accepts_description_alias() {
        let step: Step =
            serde_json::from_str(r#"{"name": "login", "result": "fail", "description": "bad pw"}"#)
                .unwrap();
        assert_eq!(step.desc.as_deref(), Some("bad pw"));
        assert_eq!(step.result, CaseResult::Fail);

        // Results other than pass and fail deserialize as unknown.
        let step: Step = serde_json::from_str(r#"{"name": "x", "result": "skipped"}"#).unwrap();
        assert_eq!(step.result, CaseResult::Unknown);
        assert_eq!(step.desc, None);
    }

    #[test]
    fn unrecognized_step_results_normalize_to_unknown() {
        let skipped: Step = serde_json::from_str(r#"{"name": "x", "result": "skip"}"#).unwrap();
        let errored: Step = serde_json::from_str(r#"{"name": "x", "result": "error"}"#).unwrap();
        assert!(skipped.same_outcome(&errored));

        // Once normalized, the step round-trips unchanged.
        let json = serde_json::to_string(&skipped).unwrap();
        assert_eq!(json, r#"{"name":"x","result":"unknown"}"#);
        assert_eq!(serde_json::from_str::<Step>(&json).unwrap(), skipped);
    }

    #[test]
    fn step_same_outcome_ignores_desc() {
        let mut a = Step::new("a", CaseResult::Pass);
        a.set_desc("first");
        let b = Step::new("a", CaseResult::Pass);
        let c = Step::new("a", CaseResult::Fail);
        assert!(a.same_outcome(&b));
        assert!(!a.same_outcome(&c));
    }
}

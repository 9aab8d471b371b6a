// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::{
    case_files::CaseFileResolver,
    config::{BuildCaseConfig, ReporterConfig},
    store::{RecordKey, SupplementalData, SupplementalRecord},
};
use indexmap::IndexSet;
use itertools::Itertools;
use std::collections::HashMap;
use tesults_metadata::{CaseFacts, CaseStatus, RunFacts};
use tesults_payload::{Case, CaseResult, Step};

/// Separator between failure messages in a case's reason.
pub static FAILURE_MESSAGE_SEPARATOR: &str = "\r\n";

/// Separator between ancestor titles in a case's suite.
pub static SUITE_SEPARATOR: &str = " ";

/// Builds the cases for a run: one per case in `facts`, in order, followed by the build case if
/// one is configured.
pub fn assemble_cases(
    config: &ReporterConfig,
    facts: &RunFacts,
    supplemental: &SupplementalData,
) -> Vec<Case> {
    let resolver = config.files().map(CaseFileResolver::new);

    let mut cases = Vec::with_capacity(facts.case_count() + 1);
    // Each record is merged into the last case with its key.
    let mut last_case_for_key = HashMap::new();
    for suite in &facts.suites {
        for case_facts in &suite.cases {
            let key = RecordKey::new(suite.test_path.as_str(), &case_facts.full_name);
            last_case_for_key.insert(key, cases.len());
            cases.push(reported_case(case_facts, resolver.as_ref()));
        }
    }

    for (key, index) in last_case_for_key {
        if let Some(record) = supplemental.get(&key) {
            merge_supplemental(&mut cases[index], record);
        }
    }

    if let Some(build) = config.build() {
        cases.push(build_case(build, resolver.as_ref()));
    }

    cases
}

/// Converts a runner-reported case to a [`Case`], without supplemental data.
pub fn reported_case(facts: &CaseFacts, resolver: Option<&CaseFileResolver>) -> Case {
    let result = match facts.status {
        CaseStatus::Passed => CaseResult::Pass,
        CaseStatus::Failed => CaseResult::Fail,
        _ => CaseResult::Unknown,
    };

    let mut case = Case::new(&facts.title, result);
    if result == CaseResult::Fail {
        case.set_reason(facts.failure_messages.join(FAILURE_MESSAGE_SEPARATOR));
    }
    if !facts.ancestor_titles.is_empty() {
        case.set_suite(facts.ancestor_titles.join(SUITE_SEPARATOR));
    }
    if let Some(resolver) = resolver {
        let files = resolver.resolve(case.suite.as_deref(), &case.name);
        case.set_files(files);
    }
    if let Some(duration) = facts.duration() {
        case.set_duration(duration);
    }
    case
}

/// Builds the synthetic case for the overall build.
///
/// The build case never receives supplemental data.
pub fn build_case(build: &BuildCaseConfig, resolver: Option<&CaseFileResolver>) -> Case {
    let mut case = Case::new(build.name(), build.result());
    case.set_suite(BuildCaseConfig::SUITE);
    if let Some(desc) = build.desc() {
        case.set_desc(desc);
    }
    if let Some(reason) = build.reason() {
        case.set_reason(reason);
    }
    if let Some(resolver) = resolver {
        let files = resolver.resolve(Some(BuildCaseConfig::SUITE), &case.name);
        case.set_files(files);
    }
    case
}

/// Applies a supplemental record to a case.
///
/// * Files are unioned with the case's files, keeping the first occurrence of each.
/// * The description is replaced by the record's, even if the record has none.
/// * Steps replace the case's steps, with consecutive duplicates collapsed.
/// * Custom fields are copied over.
pub fn merge_supplemental(case: &mut Case, record: &SupplementalRecord) {
    if !record.files.is_empty() {
        let files: IndexSet<String> = case
            .files
            .take()
            .unwrap_or_default()
            .into_iter()
            .chain(record.files.iter().cloned())
            .collect();
        case.set_files(files);
    }

    case.desc = record.desc.clone();

    let steps = collapse_steps(&record.steps);
    if !steps.is_empty() {
        case.set_steps(steps);
    }

    for (name, value) in record.custom_fields() {
        case.set_custom(name, value);
    }
}

/// Collapses runs of adjacent steps with the same name and result into their first step.
///
/// Steps that repeat non-adjacently are all kept.
pub fn collapse_steps(steps: &[Step]) -> Vec<Step> {
    steps
        .iter()
        .dedup_by(|a, b| a.same_outcome(b))
        .cloned()
        .collect()
}

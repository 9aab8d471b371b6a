// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use super::assemble::assemble_cases;
use crate::{
    config::ReporterConfig,
    store::SupplementalStore,
    transport::{Transport, UploadHandle, spawn_upload},
};
use debug_ignore::DebugIgnore;
use std::sync::Arc;
use tesults_metadata::RunFacts;
use tesults_payload::Payload;
use tracing::{debug, info};

/// The state of a [`RunLifecycle`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum LifecycleState {
    /// No run is in progress.
    Idle,

    /// A run has started and annotations are being collected.
    Running,

    /// The run has completed and its results are being assembled.
    Finalizing,
}

/// Drives reporting for a single run: resets supplemental data when the run starts, and
/// assembles and uploads results when it completes.
///
/// None of the hooks fail. Problems are logged, and reporting carries on with whatever data is
/// available.
#[derive(Debug)]
pub struct RunLifecycle {
    config: ReporterConfig,
    store: SupplementalStore,
    transport: DebugIgnore<Arc<dyn Transport>>,
    state: LifecycleState,
}

impl RunLifecycle {
    /// Creates a new lifecycle in the [`Idle`](LifecycleState::Idle) state.
    pub fn new(
        config: ReporterConfig,
        store: SupplementalStore,
        transport: Arc<dyn Transport>,
    ) -> Self {
        Self {
            config,
            store,
            transport: DebugIgnore(transport),
            state: LifecycleState::Idle,
        }
    }

    /// Returns the current state.
    pub fn state(&self) -> LifecycleState {
        self.state
    }

    /// Returns the configuration.
    pub fn config(&self) -> &ReporterConfig {
        &self.config
    }

    /// Returns the supplemental data store.
    pub fn store(&self) -> &SupplementalStore {
        &self.store
    }

    /// Called when a run starts. Clears any supplemental data left over from a previous run.
    pub fn on_run_start(&mut self) {
        self.state = LifecycleState::Running;
        self.store.reset();
    }

    /// Called when a run completes, after every test has finished.
    ///
    /// Returns a handle to the upload, or `None` if reporting is disabled.
    pub fn on_run_complete(&mut self, facts: &RunFacts) -> Option<UploadHandle> {
        if self.state != LifecycleState::Running {
            debug!("run completed in state {:?}", self.state);
        }
        self.state = LifecycleState::Finalizing;
        let handle = self
            .build_payload(facts)
            .map(|payload| spawn_upload(Arc::clone(&*self.transport), payload));
        self.state = LifecycleState::Idle;
        handle
    }

    /// Assembles the payload for a completed run, without uploading it.
    ///
    /// Returns `None` if no target is configured.
    pub fn build_payload(&self, facts: &RunFacts) -> Option<Payload> {
        let Some(target) = self.config.target() else {
            info!("target not provided, reporting disabled");
            return None;
        };

        let supplemental = self.store.read();
        debug!(
            "assembling {} cases with supplemental data for {} tests",
            facts.case_count(),
            supplemental.len(),
        );

        let mut payload = Payload::new(target, self.config.metadata());
        payload.add_cases(assemble_cases(&self.config, facts, &supplemental));
        Some(payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        annotate::{self, TestContext},
        transport::test_helpers::RecordingTransport,
    };
    use camino_tempfile::Utf8TempDir;
    use indexmap::{IndexMap, IndexSet};
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use tesults_metadata::{CaseFacts, CaseStatus, SuiteFacts};
    use tesults_payload::{CaseResult, Step};
    use test_strategy::{Arbitrary, proptest};

    struct Fixture {
        _temp_dir: Utf8TempDir,
        transport: Arc<RecordingTransport>,
        lifecycle: RunLifecycle,
    }

    fn fixture(options: &[(&str, &str)]) -> Fixture {
        let temp_dir = Utf8TempDir::new().unwrap();
        let store = SupplementalStore::new(temp_dir.path().join("supplemental.json"));
        let transport = Arc::new(RecordingTransport::default());
        let lifecycle = RunLifecycle::new(
            ReporterConfig::from_options(options.iter().copied()),
            store,
            transport.clone(),
        );
        Fixture {
            _temp_dir: temp_dir,
            transport,
            lifecycle,
        }
    }

    fn login_facts() -> RunFacts {
        RunFacts {
            suites: vec![SuiteFacts {
                test_path: "tests/login.rs".into(),
                cases: vec![CaseFacts {
                    title: "succeeds".to_owned(),
                    full_name: "login::succeeds".to_owned(),
                    ancestor_titles: vec!["Login".to_owned()],
                    status: CaseStatus::Passed,
                    duration_ms: Some(120),
                    failure_messages: vec![],
                }],
            }],
        }
    }

    fn login_context() -> TestContext {
        TestContext::new("tests/login.rs", "login::succeeds")
    }

    #[test]
    fn end_to_end_single_case() {
        let Fixture {
            _temp_dir,
            transport,
            mut lifecycle,
        } = fixture(&[("target", "T")]);

        lifecycle.on_run_start();
        assert_eq!(lifecycle.state(), LifecycleState::Running);

        let handle = lifecycle
            .on_run_complete(&login_facts())
            .expect("target is configured");
        assert_eq!(lifecycle.state(), LifecycleState::Idle);
        assert!(handle.wait().unwrap().success);

        let uploads = transport.uploads();
        assert_eq!(uploads.len(), 1);
        let actual: serde_json::Value =
            serde_json::from_str(&uploads[0].to_string().unwrap()).unwrap();
        assert_eq!(
            actual,
            json!({
                "target": "T",
                "results": {
                    "cases": [
                        {"name": "succeeds", "result": "pass", "suite": "Login", "duration": 120},
                    ],
                },
                "metadata": {
                    "integration_name": "cargo-tesults",
                    "integration_version": env!("CARGO_PKG_VERSION"),
                    "test_framework": "cargo-test",
                },
            })
        );
    }

    #[test]
    fn upload_failure_returns_to_idle() {
        let temp_dir = Utf8TempDir::new().unwrap();
        let transport = Arc::new(RecordingTransport::failing());
        let mut lifecycle = RunLifecycle::new(
            ReporterConfig::from_options([("target", "T")]),
            SupplementalStore::new(temp_dir.path().join("supplemental.json")),
            transport.clone(),
        );

        lifecycle.on_run_start();
        let handle = lifecycle
            .on_run_complete(&login_facts())
            .expect("target is configured");
        assert_eq!(lifecycle.state(), LifecycleState::Idle);
        assert!(matches!(
            handle.wait(),
            Err(crate::errors::TransportError::Request { .. })
        ));
        assert_eq!(transport.uploads().len(), 1);

        // A failed upload doesn't prevent the next run from reporting.
        lifecycle.on_run_start();
        assert_eq!(lifecycle.state(), LifecycleState::Running);
        assert!(lifecycle.on_run_complete(&login_facts()).is_some_and(|handle| {
            handle.wait().is_err()
        }));
        assert_eq!(lifecycle.state(), LifecycleState::Idle);
    }

    #[test]
    fn end_to_end_build_case() {
        let Fixture {
            _temp_dir,
            lifecycle,
            ..
        } = fixture(&[
            ("target", "T"),
            ("build-name", "nightly"),
            ("build-result", "FAIL"),
        ]);

        let payload = lifecycle.build_payload(&login_facts()).unwrap();
        let cases = serde_json::to_value(payload.cases()).unwrap();
        assert_eq!(
            cases,
            json!([
                {"name": "succeeds", "result": "pass", "suite": "Login", "duration": 120},
                {"name": "nightly", "result": "fail", "suite": "[build]"},
            ])
        );
    }

    #[test]
    fn disabled_without_target() {
        let Fixture {
            _temp_dir,
            transport,
            mut lifecycle,
        } = fixture(&[("build-name", "nightly")]);

        lifecycle.on_run_start();
        assert!(lifecycle.on_run_complete(&login_facts()).is_none());
        assert_eq!(lifecycle.state(), LifecycleState::Idle);
        assert!(transport.uploads().is_empty());
    }

    #[test]
    fn run_start_clears_previous_annotations() {
        let Fixture {
            _temp_dir,
            mut lifecycle,
            ..
        } = fixture(&[("target", "T")]);
        let cx = login_context();

        annotate::set_description(lifecycle.store(), Some(&cx), "stale");
        lifecycle.on_run_start();
        let payload = lifecycle.build_payload(&login_facts()).unwrap();
        assert_eq!(payload.cases()[0].desc, None);

        annotate::set_description(lifecycle.store(), Some(&cx), "fresh");
        let payload = lifecycle.build_payload(&login_facts()).unwrap();
        assert_eq!(payload.cases()[0].desc.as_deref(), Some("fresh"));
    }

    #[test]
    fn steps_are_collapsed() {
        let Fixture {
            _temp_dir,
            mut lifecycle,
            ..
        } = fixture(&[("target", "T")]);
        let cx = login_context();

        lifecycle.on_run_start();
        for step in [
            Step::new("a", CaseResult::Pass),
            Step::new("a", CaseResult::Pass),
            Step::new("b", CaseResult::Fail),
        ] {
            annotate::append_step(lifecycle.store(), Some(&cx), step);
        }

        let payload = lifecycle.build_payload(&login_facts()).unwrap();
        assert_eq!(
            payload.cases()[0].steps,
            Some(vec![
                Step::new("a", CaseResult::Pass),
                Step::new("b", CaseResult::Fail),
            ])
        );
    }

    #[derive(Clone, Debug, Arbitrary)]
    enum Annotation {
        File(#[strategy("[a-c]\\.png")] String),
        Custom(#[strategy("[xy]")] String, #[strategy("[0-9]")] String),
        Desc(#[strategy("[a-z]{0,3}")] String),
        Step(#[strategy("[ab]")] String, bool),
    }

    #[proptest(cases = 32)]
    fn sequential_annotations_merge(
        #[strategy(proptest::collection::vec(proptest::arbitrary::any::<Annotation>(), 0..12))]
        annotations: Vec<Annotation>,
    ) {
        let Fixture {
            _temp_dir,
            mut lifecycle,
            ..
        } = fixture(&[("target", "T")]);
        let cx = login_context();
        lifecycle.on_run_start();

        let mut files = IndexSet::new();
        let mut desc = None;
        let mut steps: Vec<Step> = Vec::new();
        let mut custom = IndexMap::new();
        for annotation in &annotations {
            match annotation {
                Annotation::File(path) => {
                    annotate::attach_file(lifecycle.store(), Some(&cx), path);
                    files.insert(path.clone());
                }
                Annotation::Custom(name, value) => {
                    annotate::attach_custom(lifecycle.store(), Some(&cx), name, value);
                    custom.insert(format!("_{name}"), value.clone());
                }
                Annotation::Desc(value) => {
                    annotate::set_description(lifecycle.store(), Some(&cx), value);
                    desc = Some(value.clone());
                }
                Annotation::Step(name, passed) => {
                    let result = if *passed {
                        CaseResult::Pass
                    } else {
                        CaseResult::Fail
                    };
                    let step = Step::new(name, result);
                    annotate::append_step(lifecycle.store(), Some(&cx), step.clone());
                    if steps.last().is_none_or(|last| !last.same_outcome(&step)) {
                        steps.push(step);
                    }
                }
            }
        }

        let payload = lifecycle.build_payload(&login_facts()).unwrap();
        let case = &payload.cases()[0];
        let expected_files = (!files.is_empty()).then(|| files.into_iter().collect::<Vec<_>>());
        let expected_steps = (!steps.is_empty()).then_some(steps);
        assert_eq!(case.files, expected_files);
        assert_eq!(case.desc, desc);
        assert_eq!(case.steps, expected_steps);
        assert_eq!(case.custom, custom);
    }
}

// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Attach supplemental data to the currently running test.
//!
//! Each operation is addressed by a [`TestContext`]. When the context is `None` (for example when
//! called outside of a test), the operation does nothing.
//!
//! ```no_run
//! use tesults_reporter::{annotate, store::SupplementalStore, test_context};
//! use tesults_payload::{CaseResult, Step};
//!
//! let store = SupplementalStore::default_location();
//! let cx = test_context!();
//! annotate::set_description(&store, cx.as_ref(), "logs in with a valid password");
//! annotate::append_step(&store, cx.as_ref(), Step::new("submit form", CaseResult::Pass));
//! annotate::attach_file(&store, cx.as_ref(), "target/screenshots/login.png");
//! ```

use crate::store::{RecordKey, SupplementalStore};
use tesults_payload::Step;
use tracing::debug;

/// The environment variable holding the test file path for out-of-process annotations.
pub static TEST_FILE_ENV: &str = "TESULTS_TEST_FILE";

/// The environment variable holding the full test name for out-of-process annotations.
pub static TEST_NAME_ENV: &str = "TESULTS_TEST_NAME";

/// Identifies the test that annotations are attached to.
///
/// The runner must report the same test path and full name for the annotations to be merged into
/// its case.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct TestContext {
    test_path: String,
    full_name: String,
}

impl TestContext {
    /// Creates a new context.
    pub fn new(test_path: impl Into<String>, full_name: impl Into<String>) -> Self {
        Self {
            test_path: test_path.into(),
            full_name: full_name.into(),
        }
    }

    /// Returns the context for the test running on the current thread.
    ///
    /// The libtest harness names each test thread after the test's full path. Returns `None` on
    /// unnamed threads and on the main thread.
    pub fn current(test_path: impl Into<String>) -> Option<Self> {
        let thread = std::thread::current();
        match thread.name() {
            Some(name) if name != "main" => Some(Self::new(test_path, name)),
            _ => None,
        }
    }

    /// Returns the context named by [`TEST_FILE_ENV`] and [`TEST_NAME_ENV`], if both are set.
    pub fn from_env() -> Option<Self> {
        let test_path = std::env::var(TEST_FILE_ENV).ok()?;
        let full_name = std::env::var(TEST_NAME_ENV).ok()?;
        Some(Self::new(test_path, full_name))
    }

    /// Returns the path to the test file.
    pub fn test_path(&self) -> &str {
        &self.test_path
    }

    /// Returns the fully qualified test name.
    pub fn full_name(&self) -> &str {
        &self.full_name
    }

    /// Returns the key under which this test's supplemental data is stored.
    pub fn record_key(&self) -> RecordKey {
        RecordKey::new(&self.test_path, &self.full_name)
    }
}

/// Returns the [`TestContext`] for the test running on the current thread, using the current
/// source file as the test path.
#[macro_export]
macro_rules! test_context {
    () => {
        $crate::annotate::TestContext::current(file!())
    };
}

/// Attaches a file to the test.
///
/// Attaching the same path twice is allowed; duplicates are removed in the final report.
pub fn attach_file(store: &SupplementalStore, cx: Option<&TestContext>, path: impl Into<String>) {
    let Some(cx) = cx else {
        debug!("no test context, not attaching file");
        return;
    };
    let path = path.into();
    store.update(cx.record_key(), |record| record.files.push(path));
}

/// Sets the custom field `name` on the test, replacing any previous value.
pub fn attach_custom(
    store: &SupplementalStore,
    cx: Option<&TestContext>,
    name: &str,
    value: impl Into<String>,
) {
    let Some(cx) = cx else {
        debug!("no test context, not attaching custom field `{name}`");
        return;
    };
    let value = value.into();
    store.update(cx.record_key(), |record| record.set_custom(name, value));
}

/// Sets the description of the test, replacing any previous description.
pub fn set_description(store: &SupplementalStore, cx: Option<&TestContext>, value: impl Into<String>) {
    let Some(cx) = cx else {
        debug!("no test context, not setting description");
        return;
    };
    let value = value.into();
    store.update(cx.record_key(), |record| record.desc = Some(value));
}

/// Appends a step to the test.
pub fn append_step(store: &SupplementalStore, cx: Option<&TestContext>, step: Step) {
    let Some(cx) = cx else {
        debug!("no test context, not appending step `{}`", step.name);
        return;
    };
    store.update(cx.record_key(), |record| record.steps.push(step));
}

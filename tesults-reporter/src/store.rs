// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The supplemental data store.
//!
//! Test code running in worker threads or processes records supplemental data (files, a
//! description, steps and custom fields) about the test it is running. The finalizing process reads
//! it back once every worker is done. The two sides rendezvous through a single JSON document on
//! disk:
//!
//! - Writes replace the whole document atomically (write to a temporary file, then rename), so
//!   readers never observe a partial document.
//! - Read-modify-write cycles ([`SupplementalStore::update`]) hold an exclusive lock on a sibling
//!   `.lock` file, so concurrent workers annotating different tests do not lose each other's
//!   updates.
//!
//! Every operation here degrades instead of failing: errors are logged and the caller proceeds
//! with less data.

use crate::errors::{DisplayErrorChain, StoreLockError, StoreReadError, StoreWriteError};
use camino::{Utf8Path, Utf8PathBuf};
use debug_ignore::DebugIgnore;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::{
    fmt,
    fs::{self, File, TryLockError},
    io, thread,
    time::{Duration, Instant},
};
use tesults_payload::{CUSTOM_FIELD_PREFIX, Step};
use tracing::{debug, warn};

/// The well-known location of the store, relative to the working directory.
pub static DEFAULT_STORE_PATH: &str = "target/tesults/supplemental-data.json";

/// Supplemental data for all tests in a run, keyed by test.
pub type SupplementalData = IndexMap<RecordKey, SupplementalRecord>;

/// Identifies the test a [`SupplementalRecord`] belongs to.
///
/// The key is structured rather than a concatenated string, so a separator appearing inside either
/// component can't cause two tests to collide.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct RecordKey {
    test_path: String,
    full_name: String,
}

impl RecordKey {
    /// Creates a new key from the path to the test file and the fully qualified test name.
    pub fn new(test_path: impl Into<String>, full_name: impl Into<String>) -> Self {
        Self {
            test_path: test_path.into(),
            full_name: full_name.into(),
        }
    }

    /// Returns the path to the test file.
    pub fn test_path(&self) -> &str {
        &self.test_path
    }

    /// Returns the fully qualified test name.
    pub fn full_name(&self) -> &str {
        &self.full_name
    }
}

impl fmt::Display for RecordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.test_path, self.full_name)
    }
}

/// Supplemental data recorded for a single test.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct SupplementalRecord {
    /// Paths to files attached to the test, in the order they were attached.
    ///
    /// May contain duplicates; these are removed when merging into the report.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub files: Vec<String>,

    /// The description of the test.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub desc: Option<String>,

    /// Steps, in the order they were appended.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub steps: Vec<Step>,

    /// Custom fields, stored with their [`CUSTOM_FIELD_PREFIX`].
    #[serde(flatten)]
    pub custom: IndexMap<String, String>,
}

impl SupplementalRecord {
    /// Sets the custom field `name`, prefixing it to mark it as user-defined.
    pub fn set_custom(&mut self, name: &str, value: impl Into<String>) {
        self.custom
            .insert(format!("{CUSTOM_FIELD_PREFIX}{name}"), value.into());
    }

    /// Returns the custom fields of this record, with their prefix.
    pub fn custom_fields(&self) -> impl Iterator<Item = (&str, &str)> {
        self.custom
            .iter()
            .filter(|(name, _)| name.starts_with(CUSTOM_FIELD_PREFIX))
            .map(|(name, value)| (name.as_str(), value.as_str()))
    }
}

/// A handle to the supplemental data store on disk.
#[derive(Clone, Debug)]
pub struct SupplementalStore {
    path: Utf8PathBuf,
}

impl SupplementalStore {
    /// Current version of the store format.
    pub const CURRENT_VERSION: u32 = 1;

    /// Creates a handle to a store at the given path.
    ///
    /// Nothing is created on disk until the store is first written.
    pub fn new(path: impl Into<Utf8PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Creates a handle to the store at [`DEFAULT_STORE_PATH`].
    pub fn default_location() -> Self {
        Self::new(DEFAULT_STORE_PATH)
    }

    /// Returns the path to the store file.
    pub fn path(&self) -> &Utf8Path {
        &self.path
    }

    /// Reads the store, returning an empty mapping if it is absent or unreadable.
    pub fn read(&self) -> SupplementalData {
        match self.try_read() {
            Ok(Some(data)) => data,
            Ok(None) => {
                debug!("no supplemental data at `{}`", self.path);
                SupplementalData::new()
            }
            Err(error) => {
                warn!(
                    "ignoring supplemental data: {}",
                    DisplayErrorChain::new(&error)
                );
                SupplementalData::new()
            }
        }
    }

    /// Reads the store, returning `Ok(None)` if it doesn't exist.
    pub fn try_read(&self) -> Result<Option<SupplementalData>, StoreReadError> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(error) if error.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(error) => {
                return Err(StoreReadError::Read {
                    path: self.path.clone(),
                    error,
                });
            }
        };

        let document: StoreDocument =
            serde_json::from_str(&contents).map_err(|error| StoreReadError::Deserialize {
                path: self.path.clone(),
                error,
            })?;
        if document.version != Self::CURRENT_VERSION {
            return Err(StoreReadError::VersionMismatch {
                path: self.path.clone(),
                expected: Self::CURRENT_VERSION,
                actual: document.version,
            });
        }

        Ok(Some(
            document
                .records
                .into_iter()
                .map(|entry| (entry.key, entry.record))
                .collect(),
        ))
    }

    /// Replaces the store with `data`.
    ///
    /// On failure, the error is logged and whatever was on disk before is left in place.
    pub fn write(&self, data: &SupplementalData) {
        if let Err(error) = self.try_write(data) {
            warn!(
                "dropping supplemental data update: {}",
                DisplayErrorChain::new(&error)
            );
        }
    }

    /// Replaces the store with `data`, atomically.
    pub fn try_write(&self, data: &SupplementalData) -> Result<(), StoreWriteError> {
        self.create_parent_dir()?;

        let document = StoreDocumentRef {
            version: Self::CURRENT_VERSION,
            records: data
                .iter()
                .map(|(key, record)| StoreEntryRef { key, record })
                .collect(),
        };

        atomicwrites::AtomicFile::new(&self.path, atomicwrites::AllowOverwrite)
            .write(|file| serde_json::to_writer_pretty(file, &document))
            .map_err(|error| StoreWriteError::Write {
                path: self.path.clone(),
                error,
            })
    }

    /// Empties the store. Called once at the start of every run.
    pub fn reset(&self) {
        let _lock = self.lock_or_warn();
        self.write(&SupplementalData::new());
    }

    /// Applies `f` to the record for `key`, creating it if necessary, and writes the store back.
    ///
    /// The read-modify-write cycle holds the store lock. If the lock can't be acquired, the update
    /// still goes ahead unlocked.
    pub fn update(&self, key: RecordKey, f: impl FnOnce(&mut SupplementalRecord)) {
        let _lock = self.lock_or_warn();
        let mut data = self.read();
        f(data.entry(key).or_default());
        self.write(&data);
    }

    /// Acquires an exclusive lock on the store.
    ///
    /// The lock is released when the returned guard is dropped.
    pub fn lock_exclusive(&self) -> Result<StoreLock, StoreLockError> {
        let lock_path = self.lock_path();
        if let Some(parent) = lock_path.parent().filter(|p| !p.as_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|error| StoreLockError::Lock {
                path: lock_path.clone(),
                error,
            })?;
        }

        let file = fs::OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&lock_path)
            .map_err(|error| StoreLockError::Lock {
                path: lock_path.clone(),
                error,
            })?;

        acquire_lock_with_retry(&file, &lock_path)?;
        Ok(StoreLock {
            locked_file: DebugIgnore(file),
        })
    }

    fn lock_or_warn(&self) -> Option<StoreLock> {
        match self.lock_exclusive() {
            Ok(lock) => Some(lock),
            Err(error) => {
                warn!(
                    "proceeding without store lock: {}",
                    DisplayErrorChain::new(&error)
                );
                None
            }
        }
    }

    fn lock_path(&self) -> Utf8PathBuf {
        let mut lock_path = self.path.clone().into_string();
        lock_path.push_str(".lock");
        lock_path.into()
    }

    fn create_parent_dir(&self) -> Result<(), StoreWriteError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|error| StoreWriteError::CreateDir {
                path: parent.to_owned(),
                error,
            })?;
        }
        Ok(())
    }
}

/// An exclusive lock on a [`SupplementalStore`].
#[derive(Debug)]
pub struct StoreLock {
    // Held for RAII lock semantics; the lock is released when this struct is dropped.
    #[expect(dead_code, reason = "held for lock duration")]
    locked_file: DebugIgnore<File>,
}

#[derive(Deserialize)]
struct StoreDocument {
    version: u32,
    #[serde(default)]
    records: Vec<StoreEntry>,
}

#[derive(Deserialize)]
struct StoreEntry {
    #[serde(flatten)]
    key: RecordKey,
    record: SupplementalRecord,
}

#[derive(Serialize)]
struct StoreDocumentRef<'a> {
    version: u32,
    records: Vec<StoreEntryRef<'a>>,
}

#[derive(Serialize)]
struct StoreEntryRef<'a> {
    #[serde(flatten)]
    key: &'a RecordKey,
    record: &'a SupplementalRecord,
}

/// Acquires a file lock with retries, timing out after 5 seconds.
///
/// Annotations are short read-modify-write cycles, so contention is brief.
fn acquire_lock_with_retry(file: &File, lock_path: &Utf8Path) -> Result<(), StoreLockError> {
    const LOCK_TIMEOUT: Duration = Duration::from_secs(5);
    const LOCK_RETRY_INTERVAL: Duration = Duration::from_millis(100);

    let start = Instant::now();
    loop {
        match file.try_lock() {
            Ok(()) => return Ok(()),
            Err(TryLockError::WouldBlock) => {
                // Lock is held by another worker. Retry if we haven't timed out.
                if start.elapsed() >= LOCK_TIMEOUT {
                    return Err(StoreLockError::Timeout {
                        path: lock_path.to_owned(),
                        timeout_secs: LOCK_TIMEOUT.as_secs(),
                    });
                }
                thread::sleep(LOCK_RETRY_INTERVAL);
            }
            Err(TryLockError::Error(error)) => {
                // Some other error (e.g., locking not supported on this filesystem).
                return Err(StoreLockError::Lock {
                    path: lock_path.to_owned(),
                    error,
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use camino_tempfile::Utf8TempDir;
    use pretty_assertions::assert_eq;
    use tesults_payload::CaseResult;

    fn sample_data() -> SupplementalData {
        let mut record = SupplementalRecord {
            files: vec!["/tmp/a.png".to_owned(), "/tmp/a.png".to_owned()],
            desc: Some("checks the login page".to_owned()),
            steps: vec![
                Step::new("open", CaseResult::Pass),
                Step::new("submit", CaseResult::Fail),
            ],
            custom: IndexMap::new(),
        };
        record.set_custom("browser", "firefox");

        let mut data = SupplementalData::new();
        data.insert(RecordKey::new("tests/login.rs", "login::succeeds"), record);
        data.insert(
            RecordKey::new("tests/login.rs", "login::rejects"),
            SupplementalRecord::default(),
        );
        data
    }

    #[test]
    fn store_lifecycle() {
        let temp_dir = Utf8TempDir::new().unwrap();
        let store = SupplementalStore::new(temp_dir.path().join("nested/dir/supplemental.json"));

        // Initially, there's nothing on disk.
        assert!(store.try_read().unwrap().is_none());
        assert!(store.read().is_empty());

        let data = sample_data();
        store.try_write(&data).expect("parent directories are created");
        assert_eq!(store.read(), data);

        store.reset();
        assert!(store.try_read().unwrap().unwrap().is_empty());
        store.reset();
        assert!(store.try_read().unwrap().unwrap().is_empty());
    }

    #[test]
    fn document_format() {
        let temp_dir = Utf8TempDir::new().unwrap();
        let store = SupplementalStore::new(temp_dir.path().join("supplemental.json"));
        store.write(&sample_data());

        let contents = fs::read_to_string(store.path()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&contents).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "version": 1,
                "records": [
                    {
                        "test-path": "tests/login.rs",
                        "full-name": "login::succeeds",
                        "record": {
                            "files": ["/tmp/a.png", "/tmp/a.png"],
                            "desc": "checks the login page",
                            "steps": [
                                {"name": "open", "result": "pass"},
                                {"name": "submit", "result": "fail"},
                            ],
                            "_browser": "firefox",
                        },
                    },
                    {
                        "test-path": "tests/login.rs",
                        "full-name": "login::rejects",
                        "record": {},
                    },
                ],
            })
        );
    }

    #[test]
    fn separator_in_key_components_does_not_collide() {
        let temp_dir = Utf8TempDir::new().unwrap();
        let store = SupplementalStore::new(temp_dir.path().join("supplemental.json"));

        // Both keys render as "a-b-c".
        let first = RecordKey::new("a-b", "c");
        let second = RecordKey::new("a", "b-c");
        assert_eq!(first.to_string(), second.to_string());

        store.update(first.clone(), |record| record.desc = Some("first".to_owned()));
        store.update(second.clone(), |record| record.desc = Some("second".to_owned()));

        let data = store.read();
        assert_eq!(data.len(), 2);
        assert_eq!(data[&first].desc.as_deref(), Some("first"));
        assert_eq!(data[&second].desc.as_deref(), Some("second"));
    }

    #[test]
    fn corrupt_store_reads_as_empty() {
        let temp_dir = Utf8TempDir::new().unwrap();
        let store = SupplementalStore::new(temp_dir.path().join("supplemental.json"));

        fs::write(store.path(), "{ not json").unwrap();
        assert!(matches!(
            store.try_read(),
            Err(StoreReadError::Deserialize { .. })
        ));
        assert!(store.read().is_empty());

        fs::write(store.path(), r#"{"version": 99, "records": []}"#).unwrap();
        assert!(matches!(
            store.try_read(),
            Err(StoreReadError::VersionMismatch {
                expected: 1,
                actual: 99,
                ..
            })
        ));
        assert!(store.read().is_empty());

        // An update on top of a corrupt store starts over from an empty mapping.
        let key = RecordKey::new("tests/a.rs", "a");
        store.update(key.clone(), |record| record.files.push("x".to_owned()));
        let data = store.read();
        assert_eq!(data.len(), 1);
        assert_eq!(data[&key].files, ["x"]);
    }

    #[test]
    fn write_failure_is_not_propagated() {
        let temp_dir = Utf8TempDir::new().unwrap();
        let blocker = temp_dir.path().join("blocker");
        fs::write(&blocker, "a file, not a directory").unwrap();

        let store = SupplementalStore::new(blocker.join("supplemental.json"));
        assert!(matches!(
            store.try_write(&sample_data()),
            Err(StoreWriteError::CreateDir { .. })
        ));

        // None of these panic or return errors.
        store.write(&sample_data());
        store.reset();
        store.update(RecordKey::new("a", "b"), |record| {
            record.desc = Some("lost".to_owned())
        });
        assert!(store.read().is_empty());
        assert_eq!(
            fs::read_to_string(&blocker).unwrap(),
            "a file, not a directory"
        );
    }

    #[test]
    fn lock_is_exclusive() {
        let temp_dir = Utf8TempDir::new().unwrap();
        let store = SupplementalStore::new(temp_dir.path().join("supplemental.json"));

        let lock = store.lock_exclusive().expect("first lock succeeds");
        let file = fs::OpenOptions::new()
            .write(true)
            .open(store.lock_path())
            .unwrap();
        assert!(matches!(file.try_lock(), Err(TryLockError::WouldBlock)));

        drop(lock);
        file.try_lock().expect("lock is released on drop");
    }
}

// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Reporter configuration.
//!
//! Configuration is a flat set of string keys and values:
//!
//! | key | effect |
//! |---|---|
//! | `target` | required; the upload target token. Without it, reporting is disabled. |
//! | `files` | base directory for per-case files. |
//! | `build-name` | report a build case with this name. |
//! | `build-desc` | description of the build case. |
//! | `build-result` | `pass` or `fail` (case-insensitive); anything else is `unknown`. |
//! | `build-reason` | reason for the build case's result. |
//! | `test-framework` | reported in the payload metadata (default `cargo-test`). |
//!
//! Keys may also be spelled with a `tesults-` prefix, e.g. `tesults-target`.

use crate::errors::{ConfigParseError, ConfigParseErrorKind};
use camino::{Utf8Path, Utf8PathBuf};
use config::{Config, ConfigError, Environment, File, FileFormat, Source};
use std::collections::BTreeMap;
use tesults_payload::{CaseResult, PayloadMetadata};
use tracing::debug;

/// The name reported in payload metadata.
pub static INTEGRATION_NAME: &str = "cargo-tesults";

/// The default value for the `test-framework` key.
pub static DEFAULT_TEST_FRAMEWORK: &str = "cargo-test";

/// Configuration for a reporting run.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ReporterConfig {
    target: Option<String>,
    files: Option<Utf8PathBuf>,
    build: Option<BuildCaseConfig>,
    test_framework: Option<String>,
}

impl ReporterConfig {
    /// The path to the config file, relative to the working directory.
    pub const CONFIG_PATH: &'static str = ".config/tesults.toml";

    /// The prefix for environment variables, e.g. `TESULTS_TARGET`.
    pub const ENV_PREFIX: &'static str = "TESULTS";

    /// The legacy prefix accepted on keys, e.g. `tesults-target`.
    pub const KEY_PREFIX: &'static str = "tesults-";

    /// Creates a new configuration from flat key/value pairs.
    ///
    /// Later values for the same key override earlier ones. Unknown keys are ignored.
    pub fn from_options<K, V>(options: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: AsRef<str>,
        V: Into<String>,
    {
        let mut target = None;
        let mut files = None;
        let mut build_name = None;
        let mut build_desc = None;
        let mut build_result = None;
        let mut build_reason = None;
        let mut test_framework = None;

        for (key, value) in options {
            let key = normalize_key(key.as_ref());
            let value = value.into();
            match key.as_str() {
                "target" => target = Some(value),
                "files" => files = Some(Utf8PathBuf::from(value)),
                "build-name" => build_name = Some(value),
                "build-desc" => build_desc = Some(value),
                "build-result" => build_result = Some(value),
                "build-reason" => build_reason = Some(value),
                "test-framework" => test_framework = Some(value),
                _ => debug!("ignoring unknown config key `{key}`"),
            }
        }

        let build = build_name.map(|name| BuildCaseConfig {
            name,
            desc: build_desc,
            result: build_result,
            reason: build_reason,
        });

        Self {
            target,
            files,
            build,
            test_framework,
        }
    }

    /// Loads configuration from layered sources, lowest priority first:
    ///
    /// 1. `config_file` if given (it must exist), otherwise [`Self::CONFIG_PATH`] if it exists.
    /// 2. Environment variables prefixed with [`Self::ENV_PREFIX`], e.g. `TESULTS_BUILD_NAME`.
    /// 3. `overrides`, each of the form `key=value`.
    pub fn from_sources<'a>(
        config_file: Option<&Utf8Path>,
        overrides: impl IntoIterator<Item = &'a str>,
    ) -> Result<Self, ConfigParseError> {
        Self::from_sources_impl(
            config_file,
            Utf8Path::new(Self::CONFIG_PATH),
            Environment::with_prefix(Self::ENV_PREFIX),
            overrides,
        )
    }

    fn from_sources_impl<'a>(
        config_file: Option<&Utf8Path>,
        default_config_file: &Utf8Path,
        environment: Environment,
        overrides: impl IntoIterator<Item = &'a str>,
    ) -> Result<Self, ConfigParseError> {
        let (config_file, source) = match config_file {
            Some(file) => (file, File::new(file.as_str(), FileFormat::Toml)),
            None => (
                default_config_file,
                File::new(default_config_file.as_str(), FileFormat::Toml).required(false),
            ),
        };
        let error = |kind: ConfigParseErrorKind| {
            ConfigParseError::new(Some(config_file.to_owned()), kind)
        };

        // Layers are read separately so that a later layer wins regardless of how each layer
        // spells the key (`build-name`, `build_name` or `tesults-build-name`).
        let mut options = read_layer(source).map_err(|err| error(err.into()))?;
        options.extend(read_layer(environment).map_err(|err| error(err.into()))?);
        for input in overrides {
            let (key, value) = input.split_once('=').ok_or_else(|| {
                error(ConfigParseErrorKind::InvalidOverride {
                    input: input.to_owned(),
                })
            })?;
            options.push((key.to_owned(), value.to_owned()));
        }

        Ok(Self::from_options(options))
    }

    /// Returns the upload target, or `None` if reporting is disabled.
    pub fn target(&self) -> Option<&str> {
        self.target.as_deref()
    }

    /// Returns the base directory for per-case files, if configured.
    pub fn files(&self) -> Option<&Utf8Path> {
        self.files.as_deref()
    }

    /// Returns the build case configuration, if a build name was given.
    pub fn build(&self) -> Option<&BuildCaseConfig> {
        self.build.as_ref()
    }

    /// Returns the metadata to attach to payloads.
    pub fn metadata(&self) -> PayloadMetadata {
        PayloadMetadata::new(
            INTEGRATION_NAME,
            env!("CARGO_PKG_VERSION"),
            self.test_framework
                .as_deref()
                .unwrap_or(DEFAULT_TEST_FRAMEWORK),
        )
    }
}

/// Configuration for the synthetic case representing the overall build.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct BuildCaseConfig {
    name: String,
    desc: Option<String>,
    result: Option<String>,
    reason: Option<String>,
}

impl BuildCaseConfig {
    /// The suite build cases are reported under.
    pub const SUITE: &'static str = "[build]";

    /// Returns the name of the build case.
    ///
    /// An empty configured name is reported as `-`.
    pub fn name(&self) -> &str {
        if self.name.is_empty() { "-" } else { &self.name }
    }

    /// Returns the description of the build case.
    pub fn desc(&self) -> Option<&str> {
        self.desc.as_deref()
    }

    /// Returns the result of the build case.
    ///
    /// Only `pass` and `fail` are recognized, ignoring case.
    pub fn result(&self) -> CaseResult {
        self.result
            .as_deref()
            .and_then(|result| result.parse().ok())
            .unwrap_or(CaseResult::Unknown)
    }

    /// Returns the reason for the build case's result.
    pub fn reason(&self) -> Option<&str> {
        self.reason.as_deref()
    }
}

fn read_layer(
    source: impl Source + Send + Sync + 'static,
) -> Result<Vec<(String, String)>, ConfigError> {
    let options: BTreeMap<String, String> = Config::builder()
        .add_source(source)
        .build()?
        .try_deserialize()?;
    Ok(options.into_iter().collect())
}

/// Strips the legacy `tesults-` prefix and converts environment-style keys to kebab case.
fn normalize_key(key: &str) -> String {
    let key = key.trim().to_ascii_lowercase().replace('_', "-");
    match key.strip_prefix(ReporterConfig::KEY_PREFIX) {
        Some(stripped) => stripped.to_owned(),
        None => key,
    }
}

// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::{
    ExpectedError, Result,
    output::{OutputContext, OutputOpts, OutputWriter},
};
use camino::{Utf8Path, Utf8PathBuf};
use clap::{Args, Subcommand};
use std::{fs::File, io::Write, sync::Arc};
use tesults_metadata::{RunFacts, TesultsExitCode};
use tesults_payload::{CaseResult, Step};
use tesults_reporter::{
    annotate::{self, TEST_FILE_ENV, TEST_NAME_ENV, TestContext},
    config::ReporterConfig,
    reporter::RunLifecycle,
    store::{DEFAULT_STORE_PATH, SupplementalStore},
    transport::{DEFAULT_API_URL, UreqTransport},
};
use tracing::{debug, info};

/// Report test results to Tesults.
///
/// This binary should typically be invoked as `cargo tesults` (in which case
/// this message will not be seen), not `cargo-tesults`.
#[derive(Debug, clap::Parser)]
#[command(
    version,
    bin_name = "cargo",
    styles = crate::output::clap_styles::style(),
    max_term_width = 100,
)]
pub struct CargoTesultsApp {
    #[command(subcommand)]
    subcommand: TesultsSubcommand,
}

impl CargoTesultsApp {
    /// Initializes the output context.
    pub fn init_output(&self) -> OutputContext {
        match &self.subcommand {
            TesultsSubcommand::Tesults(app) => app.output.init(),
        }
    }

    /// Executes the app.
    ///
    /// Returns the exit code.
    pub fn exec(self, output_writer: &mut OutputWriter) -> Result<i32> {
        match self.subcommand {
            TesultsSubcommand::Tesults(app) => app.exec(output_writer),
        }
    }
}

#[derive(Debug, Subcommand)]
enum TesultsSubcommand {
    /// Report test results to Tesults.
    Tesults(Box<AppOpts>),
}

#[derive(Debug, Args)]
#[command(version, display_name = "cargo-tesults")]
struct AppOpts {
    #[command(flatten)]
    output: OutputOpts,

    /// Path to the supplemental data store
    #[arg(
        long,
        global = true,
        value_name = "PATH",
        env = "TESULTS_STORE_PATH",
        default_value = DEFAULT_STORE_PATH,
    )]
    store_path: Utf8PathBuf,

    #[command(subcommand)]
    command: Command,
}

impl AppOpts {
    fn exec(self, output_writer: &mut OutputWriter) -> Result<i32> {
        let store = SupplementalStore::new(self.store_path);
        match self.command {
            Command::Start => {
                debug!("clearing supplemental data at `{}`", store.path());
                store.reset();
            }
            Command::File { test, path } => {
                annotate::attach_file(&store, test.context().as_ref(), path);
            }
            Command::Custom { test, name, value } => {
                annotate::attach_custom(&store, test.context().as_ref(), &name, value);
            }
            Command::Desc { test, value } => {
                annotate::set_description(&store, test.context().as_ref(), value);
            }
            Command::Step {
                test,
                name,
                result,
                desc,
            } => {
                let mut step = Step::new(name, result);
                if let Some(desc) = desc {
                    step.set_desc(desc);
                }
                annotate::append_step(&store, test.context().as_ref(), step);
            }
            Command::Report(opts) => opts.exec(store, output_writer)?,
        }

        Ok(TesultsExitCode::OK)
    }
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Start a run, clearing supplemental data left over from previous runs
    Start,

    /// Attach a file to the current test
    File {
        #[command(flatten)]
        test: TestOpts,

        /// Path to the file
        path: String,
    },

    /// Set a custom field on the current test
    Custom {
        #[command(flatten)]
        test: TestOpts,

        /// Name of the field, without the leading underscore
        name: String,

        /// Value of the field
        value: String,
    },

    /// Set the description of the current test
    Desc {
        #[command(flatten)]
        test: TestOpts,

        /// The description
        value: String,
    },

    /// Append a step to the current test
    Step {
        #[command(flatten)]
        test: TestOpts,

        /// Name of the step
        #[arg(long)]
        name: String,

        /// Result of the step: pass, fail or unknown
        #[arg(long, default_value_t)]
        result: CaseResult,

        /// Description of the step
        #[arg(long)]
        desc: Option<String>,
    },

    /// Assemble results for a completed run and upload them
    Report(ReportOpts),
}

/// Identifies the test being annotated.
///
/// If either is missing, annotation commands do nothing.
#[derive(Debug, Args)]
struct TestOpts {
    /// Path to the test file, as reported by the runner
    #[arg(long, value_name = "PATH", env = TEST_FILE_ENV)]
    test_file: Option<String>,

    /// Fully qualified name of the test, as reported by the runner
    #[arg(long, value_name = "NAME", env = TEST_NAME_ENV)]
    test_name: Option<String>,
}

impl TestOpts {
    fn context(&self) -> Option<TestContext> {
        match (&self.test_file, &self.test_name) {
            (Some(test_file), Some(test_name)) => Some(TestContext::new(test_file, test_name)),
            _ => None,
        }
    }
}

#[derive(Debug, Args)]
struct ReportOpts {
    /// Path to the runner facts for the completed run, as JSON
    #[arg(long, value_name = "FILE")]
    facts: Utf8PathBuf,

    /// Config file [default: .config/tesults.toml]
    #[arg(long, value_name = "PATH")]
    config_file: Option<Utf8PathBuf>,

    /// Override a config key, e.g. `-o target=TOKEN`
    #[arg(short = 'o', long = "option", value_name = "KEY=VALUE")]
    options: Vec<String>,

    /// URL to upload results to
    #[arg(long, value_name = "URL", env = "TESULTS_API_URL", default_value = DEFAULT_API_URL)]
    api_url: String,

    /// Print the payload to stdout instead of uploading it
    #[arg(long)]
    dry_run: bool,

    /// Exit without waiting for the upload to finish
    #[arg(long, conflicts_with = "dry_run")]
    no_wait: bool,
}

impl ReportOpts {
    fn exec(self, store: SupplementalStore, output_writer: &mut OutputWriter) -> Result<()> {
        let facts = read_facts(&self.facts)?;
        let config = ReporterConfig::from_sources(
            self.config_file.as_deref(),
            self.options.iter().map(String::as_str),
        )?;
        let transport = Arc::new(UreqTransport::new(self.api_url));
        let mut lifecycle = RunLifecycle::new(config, store, transport);

        if self.dry_run {
            if let Some(payload) = lifecycle.build_payload(&facts) {
                let mut writer = output_writer.stdout_writer();
                serde_json::to_writer_pretty(&mut writer, &payload)
                    .map_err(std::io::Error::from)
                    .and_then(|()| writeln!(writer))
                    .and_then(|()| writer.flush())
                    .map_err(|err| ExpectedError::WriteOutputError { err })?;
            }
            return Ok(());
        }

        match lifecycle.on_run_complete(&facts) {
            Some(handle) if self.no_wait => {
                info!("not waiting for upload to finish");
                drop(handle);
            }
            Some(handle) => {
                // The outcome is logged by the upload itself, and never affects the exit code.
                _ = handle.wait();
            }
            None => {}
        }
        Ok(())
    }
}

fn read_facts(path: &Utf8Path) -> Result<RunFacts> {
    let file = File::open(path).map_err(|err| {
        ExpectedError::facts_read_error(path, tesults_metadata::FactsParseError::Read(err))
    })?;
    RunFacts::from_reader(std::io::BufReader::new(file))
        .map_err(|err| ExpectedError::facts_read_error(path, err))
}

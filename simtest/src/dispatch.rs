// Copyright (c) The simtest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::{
    ExpectedError, Result,
    output::{OutputContext, OutputOpts, OutputWriter},
    select::InteractiveSelector,
};
use camino::Utf8PathBuf;
use clap::{Args, Parser, Subcommand};
use simtest_runner::{
    SimtestExitCode,
    batch::BatchDir,
    catalog::{JobSpec, RegisterRequest, TestCatalog, TestName},
    config::SimtestConfig,
    graph::DependencyGraph,
    runner::BatchRunner,
    toolchain::{ExternalToolchain, Toolchain},
};
use std::io::Write;
use supports_color::Stream;

/// A regression-test harness for long-running simulation jobs.
///
/// Tests live under the simulation root's tests directory. Each one is run as a fresh job in a
/// timestamped batch directory, and its output artifacts are compared against known-good copies.
#[derive(Debug, Parser)]
#[command(
    version,
    styles = crate::output::clap_styles::style(),
    max_term_width = 100,
)]
pub struct SimtestApp {
    #[clap(flatten)]
    common: CommonOpts,

    #[clap(subcommand)]
    command: Command,
}

impl SimtestApp {
    /// Initializes the output context.
    pub fn init_output(&self) -> OutputContext {
        self.common.output.init()
    }

    /// Executes the app.
    ///
    /// Returns the exit code.
    pub fn exec(self, output: OutputContext, output_writer: &mut OutputWriter) -> Result<i32> {
        let root = self.common.root()?;
        let config = SimtestConfig::from_sources(root, self.common.config_file.as_deref())?;
        let catalog = TestCatalog::new(&config);

        match self.command {
            Command::List => exec_list(&catalog, output_writer),
            Command::Add { job, restart_from } => {
                let request = RegisterRequest::new(job, restart_from);
                let mut selector = InteractiveSelector::new(output);
                catalog.register_test(&request, &mut selector)?;
                Ok(SimtestExitCode::OK)
            }
            Command::Run { tests } => exec_run(&config, &catalog, &tests, output, output_writer),
        }
    }
}

#[derive(Debug, Args)]
struct CommonOpts {
    /// Simulation root [default: current directory]
    #[arg(long, global = true, value_name = "PATH", env = "SIMTEST_ROOT")]
    root: Option<Utf8PathBuf>,

    /// Config file [default: <root>/.config/simtest.toml]
    #[arg(long, global = true, value_name = "PATH")]
    config_file: Option<Utf8PathBuf>,

    #[clap(flatten)]
    output: OutputOpts,
}

impl CommonOpts {
    fn root(&self) -> Result<Utf8PathBuf> {
        if let Some(root) = &self.root {
            return Ok(root.clone());
        }
        let current_dir =
            std::env::current_dir().map_err(|err| ExpectedError::CurrentDir { err })?;
        Utf8PathBuf::try_from(current_dir).map_err(|err| ExpectedError::CurrentDirInvalidUtf8 {
            path: err.into_path_buf(),
        })
    }
}

#[derive(Debug, Subcommand)]
enum Command {
    /// List every test in the tests directory
    List,

    /// Register an existing job as a new test
    ///
    /// The job must have been run, so that its output directory holds the artifacts to use as
    /// known-good copies. Each candidate artifact is offered interactively.
    Add {
        /// The job to register, optionally renamed as `<job>=<name>`
        #[arg(value_name = "JOB[=NAME]")]
        job: JobSpec,

        /// Restart the new test from the output of an existing test
        #[arg(long, short = 'r', value_name = "TEST")]
        restart_from: Option<TestName>,
    },

    /// Run tests and compare their output against known-good artifacts
    ///
    /// Tests that the requested tests restart from are run first. Pass `ALL` to run every test.
    Run {
        /// Test or group names, or `ALL`
        #[arg(required = true, value_name = "TESTS")]
        tests: Vec<String>,
    },
}

fn exec_list(catalog: &TestCatalog, output_writer: &mut OutputWriter) -> Result<i32> {
    let mut writer = output_writer.stdout_writer();
    for test in catalog.list_tests() {
        writeln!(writer, "{}", test?).map_err(ExpectedError::write_output)?;
    }
    writer.flush().map_err(ExpectedError::write_output)?;
    Ok(SimtestExitCode::OK)
}

fn exec_run(
    config: &SimtestConfig,
    catalog: &TestCatalog,
    tests: &[String],
    output: OutputContext,
    output_writer: &mut OutputWriter,
) -> Result<i32> {
    // Everything that can be checked up front is checked before the batch directory exists.
    let leaf_tests = catalog.expand_request(tests)?;
    let graph = DependencyGraph::build(catalog, leaf_tests)?;
    let order = graph.execution_order()?;
    tracing::debug!(
        "running {} tests in {} waves",
        order.len(),
        order.wave_count()
    );

    let toolchain = ExternalToolchain::new(config);
    toolchain.ensure_comparator()?;
    let batch = BatchDir::create_now(config.jobs_dir())?;

    let mut runner = BatchRunner::new(catalog, &toolchain, config.on_tool_failure());
    if output.color.should_colorize(Stream::Stdout) {
        runner.colorize();
    }

    let mut writer = output_writer.stdout_writer();
    let summary = runner.run(&graph, &order, &batch, &mut writer)?;
    let summary_path = batch.summary_path();
    summary.persist(&summary_path)?;
    runner
        .reporter()
        .write_summary(&summary, &mut writer)
        .map_err(ExpectedError::write_output)?;
    writer.flush().map_err(ExpectedError::write_output)?;

    if let Some(abort) = summary.abort() {
        return Err(ExpectedError::BatchAborted {
            test: abort.test.clone(),
            not_attempted: abort.not_attempted,
            summary_path,
        });
    }
    // Mismatches are reported in the summary only, but tests that errored are not a success.
    match summary.errored_count() {
        0 => Ok(SimtestExitCode::OK),
        count => Err(ExpectedError::TestsErrored {
            count,
            summary_path,
        }),
    }
}

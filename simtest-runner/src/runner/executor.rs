// Copyright (c) The simtest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Runs a single test: configures its job, stages restart input, builds and runs the job, and
//! compares its output against the known-good artifacts.

use crate::{
    batch::{BatchDir, BatchLog},
    catalog::{TestCatalog, TestDefinition, TestName},
    errors::{ExecuteError, ToolFailure},
    helpers::{copy_tree, plural},
    reporter::{BatchEvent, BatchReporter},
    toolchain::{JobConfiguration, ToolExit, Toolchain},
};
use camino::{Utf8Path, Utf8PathBuf};
use std::{
    fs::File,
    io::{self, Write},
};

/// Where a test's restart input came from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RestartSource {
    /// Copied from the output of the prerequisite's job in the same batch.
    Prerequisite {
        /// The prerequisite test.
        test: TestName,

        /// The directory that was copied.
        from: Utf8PathBuf,
    },

    /// Copied from the test's saved snapshot.
    Snapshot {
        /// The directory that was copied.
        from: Utf8PathBuf,
    },

    /// The test has no restart input.
    None,
}

/// The result of comparing one artifact.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ComparisonResult {
    /// The comparator exited with status 0.
    Match,

    /// The comparator exited with a nonzero status or was terminated by a signal.
    Mismatch {
        /// The comparator's exit code.
        exit_code: Option<i32>,
    },
}

/// A comparison of a produced artifact against its reference.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ArtifactComparison {
    /// The artifact, relative to the known-good and output directories.
    pub artifact: Utf8PathBuf,

    /// The result.
    pub result: ComparisonResult,
}

/// A test that ran to completion.
#[derive(Clone, Debug)]
pub struct TestRun {
    /// The test.
    pub test: TestName,

    /// The job workspace within the batch directory.
    pub job_dir: Utf8PathBuf,

    /// Where restart input came from.
    pub restart_source: RestartSource,

    /// Every known-good artifact's comparison, in sorted order.
    pub comparisons: Vec<ArtifactComparison>,
}

impl TestRun {
    /// Returns true if every comparison matched. A test without known-good artifacts passes.
    pub fn passed(&self) -> bool {
        self.comparisons
            .iter()
            .all(|comparison| comparison.result == ComparisonResult::Match)
    }

    /// Returns the artifacts that did not match.
    pub fn mismatched(&self) -> Vec<Utf8PathBuf> {
        self.comparisons
            .iter()
            .filter(|comparison| comparison.result != ComparisonResult::Match)
            .map(|comparison| comparison.artifact.clone())
            .collect()
    }
}

/// Where a batch writes progress: the interactive stream and the shared log.
pub struct ProgressSink<'a> {
    reporter: &'a BatchReporter,
    plain: BatchReporter,
    out: &'a mut dyn Write,
    log: &'a mut BatchLog,
}

impl<'a> ProgressSink<'a> {
    /// Creates a new sink. `reporter` styles the interactive stream; the log is always plain.
    pub fn new(reporter: &'a BatchReporter, out: &'a mut dyn Write, log: &'a mut BatchLog) -> Self {
        Self {
            reporter,
            plain: BatchReporter::new(),
            out,
            log,
        }
    }

    /// Reports an event to both destinations.
    pub fn report(&mut self, event: BatchEvent<'_>) -> io::Result<()> {
        self.reporter.report_event(event, &mut *self.out)?;
        self.plain.report_event(event, &mut *self.log)?;
        // Tool output goes straight to the log, so keep the interactive stream in step with it.
        self.out.flush()
    }

    /// Returns a handle to the log for a tool to write its output into.
    pub fn tool_log(&mut self) -> io::Result<File> {
        self.log.tool_sink()
    }
}

/// Runs individual tests in a batch.
#[derive(Debug)]
pub struct TestExecutor<'a, T: ?Sized> {
    catalog: &'a TestCatalog,
    toolchain: &'a T,
}

impl<'a, T: Toolchain + ?Sized> TestExecutor<'a, T> {
    /// Creates a new executor.
    pub fn new(catalog: &'a TestCatalog, toolchain: &'a T) -> Self {
        Self { catalog, toolchain }
    }

    /// Runs `test` in `batch`.
    ///
    /// Restart prerequisites must already have run in the same batch. Comparison mismatches are
    /// reported in the returned [`TestRun`], not as errors.
    pub fn run(
        &self,
        test: &TestName,
        batch: &BatchDir,
        sink: &mut ProgressSink<'_>,
    ) -> Result<TestRun, ExecuteError> {
        let write_err = |err| ExecuteError::WriteProgress {
            test: test.clone(),
            err,
        };
        sink.report(BatchEvent::TestStarted { test })
            .map_err(write_err)?;

        // Validate the whole definition before any tool runs.
        let definition = self.catalog.definition(test)?;
        let config = definition.config_form()?;
        let run_length = definition.run_length()?;
        let restart_from = definition.restart_from()?;

        sink.report(BatchEvent::ConfiguringJob).map_err(write_err)?;
        let job = JobConfiguration {
            test,
            config: &config,
            batch_dir: batch.path(),
            t100: definition.t100(),
            run_length,
        };
        let to_error = |failure| ExecuteError::ConfigurationFailure {
            test: test.clone(),
            failure,
        };
        let log = sink.tool_log().map_err(write_err)?;
        let exit = self.toolchain.configure_job(&job, log).map_err(to_error)?;
        check_exit(&exit, to_error)?;

        let job_dir = batch.job_dir(test);
        let restart_source =
            self.stage_restart(test, &definition, restart_from.as_ref(), batch, &job_dir)?;

        sink.report(BatchEvent::BuildingJob).map_err(write_err)?;
        let to_error = |failure| ExecuteError::BuildOrRunFailure {
            test: test.clone(),
            failure,
        };
        let log = sink.tool_log().map_err(write_err)?;
        let exit = self.toolchain.build_and_run(&job_dir, log).map_err(to_error)?;
        check_exit(&exit, to_error)?;

        sink.report(BatchEvent::CheckingResults)
            .map_err(write_err)?;
        let comparisons = self.compare_artifacts(test, &definition, &job_dir, sink)?;

        Ok(TestRun {
            test: test.clone(),
            job_dir,
            restart_source,
            comparisons,
        })
    }

    fn stage_restart(
        &self,
        test: &TestName,
        definition: &TestDefinition,
        restart_from: Option<&TestName>,
        batch: &BatchDir,
        job_dir: &Utf8Path,
    ) -> Result<RestartSource, ExecuteError> {
        let (source, from) = match restart_from {
            Some(prerequisite) => {
                let from = batch.job_dir(prerequisite).join("output");
                if !from.is_dir() {
                    return Err(ExecuteError::MissingRestartOutput {
                        test: test.clone(),
                        prerequisite: prerequisite.clone(),
                        path: from,
                    });
                }
                let source = RestartSource::Prerequisite {
                    test: prerequisite.clone(),
                    from: from.clone(),
                };
                (source, from)
            }
            None => match definition.restart_snapshot() {
                Some(from) => (RestartSource::Snapshot { from: from.clone() }, from),
                None => return Ok(RestartSource::None),
            },
        };

        let to = job_dir.join(TestDefinition::RESTART_DIR);
        copy_tree(&from, &to).map_err(|err| ExecuteError::RestartStaging {
            test: test.clone(),
            from,
            to,
            err,
        })?;
        Ok(source)
    }

    fn compare_artifacts(
        &self,
        test: &TestName,
        definition: &TestDefinition,
        job_dir: &Utf8Path,
        sink: &mut ProgressSink<'_>,
    ) -> Result<Vec<ArtifactComparison>, ExecuteError> {
        let known_good_dir = definition.known_good_dir();
        let artifacts =
            definition
                .known_good_artifacts()
                .map_err(|err| ExecuteError::KnownGoodRead {
                    test: test.clone(),
                    dir: known_good_dir.clone(),
                    err,
                })?;
        if artifacts.is_empty() {
            tracing::warn!(
                "test `{test}` has no known-good artifacts, so it passes without any comparisons"
            );
        } else {
            tracing::debug!(
                "comparing {} {} for test `{test}`",
                artifacts.len(),
                plural::artifacts_str(artifacts.len()),
            );
        }

        let output_dir = job_dir.join("output");
        let mut comparisons = Vec::with_capacity(artifacts.len());
        let write_err = |err| ExecuteError::WriteProgress {
            test: test.clone(),
            err,
        };
        for artifact in artifacts {
            let log = sink.tool_log().map_err(write_err)?;
            let exit = self
                .toolchain
                .compare(
                    &known_good_dir.join(&artifact),
                    &output_dir.join(&artifact),
                    log,
                )
                .map_err(|failure| ExecuteError::ComparatorFailure {
                    test: test.clone(),
                    artifact: artifact.clone(),
                    failure,
                })?;
            let result = if exit.success() {
                ComparisonResult::Match
            } else {
                ComparisonResult::Mismatch {
                    exit_code: exit.exit_code,
                }
            };

            sink.report(BatchEvent::ArtifactChecked {
                artifact: &artifact,
                matched: result == ComparisonResult::Match,
            })
            .map_err(write_err)?;
            comparisons.push(ArtifactComparison { artifact, result });
        }
        Ok(comparisons)
    }
}

fn check_exit(
    exit: &ToolExit,
    to_error: impl FnOnce(ToolFailure) -> ExecuteError,
) -> Result<(), ExecuteError> {
    match exit.failure() {
        Some(failure) => Err(to_error(failure)),
        None => Ok(()),
    }
}

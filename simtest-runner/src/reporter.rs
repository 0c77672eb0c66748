// Copyright (c) The simtest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Reporting progress and results for a batch.
//!
//! Progress is reported through [`BatchEvent`]s, rendered by a [`BatchReporter`]. Results are
//! collected into a [`BatchSummary`].

use crate::{
    catalog::TestName,
    errors::{ExecuteError, SummaryWriteError},
    helpers::plural,
};
use camino::{Utf8Path, Utf8PathBuf};
use owo_colors::{OwoColorize, Style};
use std::{
    error::Error,
    fmt,
    io::{self, Write},
};

/// The outcome of a single test in a batch.
#[derive(Debug)]
pub enum TestOutcome {
    /// Every known-good artifact matched.
    Passed,

    /// At least one known-good artifact did not match.
    Failed {
        /// The artifacts that did not match, in comparison order.
        mismatched: Vec<Utf8PathBuf>,
    },

    /// The test could not be run to completion.
    Errored {
        /// The error.
        error: ExecuteError,
    },

    /// The test was not attempted because its restart prerequisite produced no output.
    Skipped {
        /// The prerequisite that errored or was skipped.
        prerequisite: TestName,
    },
}

impl TestOutcome {
    /// Returns the label used in summaries.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Passed => "OK",
            Self::Failed { .. } => "FAILED",
            Self::Errored { .. } => "ERROR",
            Self::Skipped { .. } => "SKIPPED",
        }
    }

    /// Returns true if the test's job ran to completion, so its output can be restarted from.
    pub fn has_output(&self) -> bool {
        matches!(self, Self::Passed | Self::Failed { .. })
    }

    /// Returns true if the test passed.
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Passed)
    }
}

/// Records that a batch stopped early.
#[derive(Debug)]
pub struct BatchAbort {
    /// The test that stopped the batch.
    pub test: TestName,

    /// Why the test could not be run.
    pub error: ExecuteError,

    /// The number of tests after `test` in the execution order that were never attempted.
    pub not_attempted: usize,
}

/// The outcomes of a batch, in execution order.
#[derive(Debug, Default)]
pub struct BatchSummary {
    entries: Vec<(TestName, TestOutcome)>,
    abort: Option<BatchAbort>,
}

impl BatchSummary {
    /// The text printed and persisted when no tests ran.
    pub const NO_TESTS_RUN: &'static str = "NO TESTS RUN";

    /// Creates a new, empty summary.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the outcome of the next test.
    pub fn push(&mut self, test: TestName, outcome: TestOutcome) {
        self.entries.push((test, outcome));
    }

    /// Records that the batch stopped early.
    pub fn set_abort(&mut self, abort: BatchAbort) {
        self.abort = Some(abort);
    }

    /// Returns the recorded outcomes in execution order.
    pub fn entries(&self) -> &[(TestName, TestOutcome)] {
        &self.entries
    }

    /// Returns the outcome for a test, if it was recorded.
    pub fn outcome(&self, test: &TestName) -> Option<&TestOutcome> {
        self.entries
            .iter()
            .find(|(name, _)| name == test)
            .map(|(_, outcome)| outcome)
    }

    /// Returns the abort record, if the batch stopped early.
    pub fn abort(&self) -> Option<&BatchAbort> {
        self.abort.as_ref()
    }

    /// Returns true if no tests were attempted and the batch was not aborted.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty() && self.abort.is_none()
    }

    /// Returns the number of tests that did not pass.
    pub fn failure_count(&self) -> usize {
        self.entries
            .iter()
            .filter(|(_, outcome)| !outcome.is_success())
            .count()
    }

    /// Returns the number of tests that could not be run to completion.
    pub fn errored_count(&self) -> usize {
        self.entries
            .iter()
            .filter(|(_, outcome)| matches!(outcome, TestOutcome::Errored { .. }))
            .count()
    }

    /// Writes the uncolored summary to `path`.
    ///
    /// Nothing is written for an empty summary.
    pub fn persist(&self, path: &Utf8Path) -> Result<(), SummaryWriteError> {
        if self.is_empty() {
            return Ok(());
        }
        let mut buf = Vec::new();
        BatchReporter::new()
            .write_summary(self, &mut buf)
            .and_then(|()| std::fs::write(path, buf))
            .map_err(|err| SummaryWriteError::new(path, err))
    }
}

/// A progress event in a batch.
#[derive(Clone, Copy, Debug)]
#[non_exhaustive]
pub enum BatchEvent<'a> {
    /// A test started.
    TestStarted {
        /// The test.
        test: &'a TestName,
    },

    /// The job-configuration tool is about to run.
    ConfiguringJob,

    /// The build-and-run command is about to run.
    BuildingJob,

    /// Artifact comparisons are about to start.
    CheckingResults,

    /// An artifact was compared.
    ArtifactChecked {
        /// The artifact, relative to the known-good directory.
        artifact: &'a Utf8Path,

        /// True if the produced artifact matched.
        matched: bool,
    },

    /// A test was skipped because its prerequisite produced no output.
    TestSkipped {
        /// The test.
        test: &'a TestName,

        /// The prerequisite.
        prerequisite: &'a TestName,
    },

    /// A test could not be run to completion.
    TestErrored {
        /// The test.
        test: &'a TestName,

        /// The error.
        error: &'a ExecuteError,
    },
}

/// Renders batch progress and summaries.
#[derive(Debug, Default)]
pub struct BatchReporter {
    styles: Styles,
}

impl BatchReporter {
    /// Creates a new reporter with uncolored output.
    pub fn new() -> Self {
        Self::default()
    }

    /// Colorizes output.
    pub fn colorize(&mut self) {
        self.styles.colorize();
    }

    /// Reports a progress event.
    pub fn report_event(&self, event: BatchEvent<'_>, mut writer: impl Write) -> io::Result<()> {
        match event {
            BatchEvent::TestStarted { test } => {
                writeln!(writer, "Running test \"{}\"", test.style(self.styles.bold))?;
            }
            BatchEvent::ConfiguringJob => {
                writeln!(writer, "  Configuring job...")?;
            }
            BatchEvent::BuildingJob => {
                writeln!(writer, "  Building and running job...")?;
            }
            BatchEvent::CheckingResults => {
                writeln!(writer, "  Checking results...")?;
            }
            BatchEvent::ArtifactChecked { artifact, matched } => {
                if matched {
                    writeln!(writer, "    {}: {artifact}", "OK".style(self.styles.pass))?;
                } else {
                    writeln!(writer, "    {}: {artifact}", "FAILED".style(self.styles.fail))?;
                }
            }
            BatchEvent::TestSkipped { test, prerequisite } => {
                writeln!(
                    writer,
                    "{} test \"{}\": restart prerequisite \"{}\" did not complete",
                    "Skipping".style(self.styles.skip),
                    test.style(self.styles.bold),
                    prerequisite.style(self.styles.bold),
                )?;
            }
            BatchEvent::TestErrored { test, error } => {
                writeln!(
                    writer,
                    "  {}: test \"{}\" did not complete",
                    "ERROR".style(self.styles.error),
                    test.style(self.styles.bold),
                )?;
                writeln!(writer, "    {}", DisplayErrorChain(error))?;
            }
        }
        Ok(())
    }

    /// Writes a summary of the batch.
    pub fn write_summary(&self, summary: &BatchSummary, mut writer: impl Write) -> io::Result<()> {
        if summary.is_empty() {
            return writeln!(writer, "{}", BatchSummary::NO_TESTS_RUN);
        }

        writeln!(writer)?;
        writeln!(writer, "{}", "SUMMARY:".style(self.styles.bold))?;
        let width = summary
            .entries()
            .iter()
            .map(|(test, _)| test.as_str().len())
            .max()
            .unwrap_or(0)
            + 3;
        for (test, outcome) in summary.entries() {
            let style = match outcome {
                TestOutcome::Passed => self.styles.pass,
                TestOutcome::Failed { .. } | TestOutcome::Errored { .. } => self.styles.fail,
                TestOutcome::Skipped { .. } => self.styles.skip,
            };
            writeln!(
                writer,
                "{:width$}{}",
                test.as_str(),
                outcome.label().style(style),
            )?;
        }

        if let Some(abort) = summary.abort() {
            writeln!(writer)?;
            writeln!(
                writer,
                "{} at test \"{}\": {} {} not attempted",
                "Batch aborted".style(self.styles.error),
                abort.test.style(self.styles.bold),
                abort.not_attempted.style(self.styles.bold),
                plural::tests_str(abort.not_attempted),
            )?;
        }
        Ok(())
    }
}

/// Displays an error followed by its sources, separated by `: `.
struct DisplayErrorChain<'a>(&'a ExecuteError);

impl fmt::Display for DisplayErrorChain<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)?;
        let mut source = self.0.source();
        while let Some(err) = source {
            write!(f, ": {err}")?;
            source = err.source();
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
struct Styles {
    bold: Style,
    pass: Style,
    fail: Style,
    skip: Style,
    error: Style,
}

impl Styles {
    fn colorize(&mut self) {
        self.bold = Style::new().bold();
        self.pass = Style::new().green().bold();
        self.fail = Style::new().red().bold();
        self.skip = Style::new().yellow().bold();
        self.error = Style::new().red().bold();
    }
}

// Copyright (c) The simtest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Errors produced by simtest.

use crate::catalog::TestName;
use camino::Utf8PathBuf;
use config::ConfigError;
use itertools::Itertools;
use std::{fmt, io};
use thiserror::Error;

/// An error that occurred while parsing the simtest config.
#[derive(Debug, Error)]
#[error("failed to parse simtest config at `{config_file}`")]
#[non_exhaustive]
pub struct ConfigParseError {
    config_file: Utf8PathBuf,
    #[source]
    kind: ConfigParseErrorKind,
}

impl ConfigParseError {
    pub(crate) fn new(config_file: impl Into<Utf8PathBuf>, kind: ConfigParseErrorKind) -> Self {
        Self {
            config_file: config_file.into(),
            kind,
        }
    }

    /// Returns the config file for this error.
    pub fn config_file(&self) -> &Utf8PathBuf {
        &self.config_file
    }

    /// Returns the kind of error this is.
    pub fn kind(&self) -> &ConfigParseErrorKind {
        &self.kind
    }
}

/// The kind of error that occurred while parsing a config.
///
/// Returned by [`ConfigParseError::kind`].
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigParseErrorKind {
    /// An error occurred while building the config.
    #[error(transparent)]
    BuildError(Box<ConfigError>),

    /// An error occurred while deserializing the config.
    #[error(transparent)]
    DeserializeError(Box<serde_path_to_error::Error<ConfigError>>),
}

/// An error returned while validating a [`TestName`].
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("invalid test name `{input}`: {reason}")]
pub struct TestNameError {
    input: String,
    reason: &'static str,
}

impl TestNameError {
    pub(crate) fn new(input: impl Into<String>, reason: &'static str) -> Self {
        Self {
            input: input.into(),
            reason,
        }
    }

    /// Returns the input that failed validation.
    pub fn input(&self) -> &str {
        &self.input
    }
}

/// An error that occurred while discovering tests or expanding a test request.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CatalogError {
    /// A requested name matched no test definitions.
    #[error("test `{name}` does not exist")]
    UnknownTest {
        /// The requested name.
        name: String,
    },

    /// The request was not well-formed.
    #[error(transparent)]
    InvalidRequest(#[from] InvalidRequest),

    /// A requested name is not a valid test name.
    #[error(transparent)]
    InvalidName(#[from] TestNameError),

    /// An error occurred while walking the test directory.
    #[error("error reading test directory `{dir}`")]
    Walk {
        /// The directory being walked.
        dir: Utf8PathBuf,

        /// The underlying error.
        #[source]
        err: io::Error,
    },
}

/// A test request which cannot be expanded into a set of tests.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum InvalidRequest {
    /// No test names were given.
    #[error("no tests were requested")]
    Empty,

    /// The `ALL` sentinel was combined with explicit test names.
    #[error(
        "must specify either \"ALL\" or a list of tests, not both (also requested: {})",
        .others.join(", ")
    )]
    AllWithOthers {
        /// The other names in the request.
        others: Vec<String>,
    },
}

/// A test definition that cannot be used.
#[derive(Debug, Error)]
#[error("test `{test}` is configured incorrectly")]
pub struct MalformedTestError {
    test: TestName,
    #[source]
    kind: MalformedTestKind,
}

impl MalformedTestError {
    pub(crate) fn new(test: TestName, kind: MalformedTestKind) -> Self {
        Self { test, kind }
    }

    /// Returns the name of the malformed test.
    pub fn test(&self) -> &TestName {
        &self.test
    }

    /// Returns the reason the test is malformed.
    pub fn kind(&self) -> &MalformedTestKind {
        &self.kind
    }
}

/// The reason a test definition is malformed.
///
/// Returned by [`MalformedTestError::kind`].
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum MalformedTestKind {
    /// The definition file could not be read.
    #[error("failed to read `{path}`")]
    ReadInfo {
        /// The path to the definition file.
        path: Utf8PathBuf,

        /// The underlying error.
        #[source]
        err: io::Error,
    },

    /// A line in the definition file is not of the form `key: value`.
    #[error("line {line_number} is missing a colon: `{line}`")]
    MissingColon {
        /// The 1-based line number.
        line_number: usize,

        /// The contents of the line.
        line: String,
    },

    /// The required `run_length` key is absent.
    #[error("`run_length` is not specified")]
    MissingRunLength,

    /// Neither configuration form is present.
    #[error("neither `full_config` nor both of `base_config` and `user_config` are present")]
    NoConfiguration,

    /// `restart_from` does not name a valid test.
    #[error("invalid `restart_from` value")]
    InvalidRestartFrom(#[source] TestNameError),
}

/// An error that occurred while closing a test set over its restart prerequisites.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum DependencyError {
    /// A requested test has no definition.
    #[error("test `{name}` does not exist")]
    UnknownTest {
        /// The name of the test.
        name: TestName,
    },

    /// A test restarts from a test that has no definition.
    #[error("test `{name}` (restart prerequisite of `{referenced_by}`) does not exist")]
    MissingTest {
        /// The missing test.
        name: TestName,

        /// The test declaring the restart dependency.
        referenced_by: TestName,
    },

    /// A test definition could not be read.
    #[error(transparent)]
    Malformed(#[from] MalformedTestError),
}

/// The restart dependencies between tests form at least one cycle.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub struct CyclicDependencyError {
    cycles: Vec<Vec<TestName>>,
}

impl CyclicDependencyError {
    pub(crate) fn new(cycles: Vec<Vec<TestName>>) -> Self {
        Self { cycles }
    }

    /// Returns the cycles, each sorted by name.
    pub fn cycles(&self) -> &[Vec<TestName>] {
        &self.cycles
    }
}

impl fmt::Display for CyclicDependencyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "restart dependencies form a cycle: {}",
            self.cycles
                .iter()
                .map(|cycle| format!("[{}]", cycle.iter().join(", ")))
                .join(", ")
        )
    }
}

/// An error returned while parsing a `<job>[=<name>]` argument.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum JobSpecParseError {
    /// The job part is empty.
    #[error("job name is empty in `{input}`")]
    EmptyJob {
        /// The input.
        input: String,
    },

    /// The job part contains a path separator.
    #[error("job name `{job}` must not contain a path separator")]
    InvalidJob {
        /// The job name.
        job: String,
    },

    /// More than one `=` was specified.
    #[error("expected `<job>` or `<job>=<name>`, found `{input}`")]
    TooManyParts {
        /// The input.
        input: String,
    },

    /// The test name is invalid.
    #[error(transparent)]
    InvalidName(#[from] TestNameError),
}

/// A precondition for registering a new test was not met.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum PreconditionError {
    /// The job directory does not exist.
    #[error("job `{job}` does not exist")]
    JobNotFound {
        /// The job.
        job: String,
    },

    /// The job has not produced any output yet.
    #[error("need to run job `{job}` before adding it as a test")]
    JobHasNoOutput {
        /// The job.
        job: String,
    },

    /// The job has no `config/config` file to use as a test definition.
    #[error("job `{job}` has no configuration at `{path}`")]
    JobConfigMissing {
        /// The job.
        job: String,

        /// The expected configuration path.
        path: Utf8PathBuf,
    },

    /// A test with this name already exists.
    #[error("test `{name}` already exists")]
    TestExists {
        /// The test name.
        name: TestName,
    },

    /// The restart prerequisite does not exist.
    #[error("restart test `{name}` does not exist")]
    RestartTestMissing {
        /// The restart test name.
        name: TestName,
    },
}

/// An error returned by an [`ArtifactSelector`](crate::catalog::ArtifactSelector).
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ArtifactSelectError {
    /// A pre-selected artifact is not one of the candidates.
    #[error(
        "artifact `{artifact}` is not a candidate (candidates: {})",
        .candidates.iter().join(", ")
    )]
    NotACandidate {
        /// The requested artifact.
        artifact: Utf8PathBuf,

        /// The available candidates.
        candidates: Vec<Utf8PathBuf>,
    },

    /// Prompting the user failed.
    #[error("error reading artifact selection")]
    Prompt(#[source] Box<dyn std::error::Error + Send + Sync>),
}

/// An error that occurred while registering a job as a test.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum RegisterError {
    /// A precondition was not met. Nothing was written.
    #[error(transparent)]
    Precondition(#[from] PreconditionError),

    /// Artifact selection failed. Nothing was written.
    #[error(transparent)]
    Select(#[from] ArtifactSelectError),

    /// An I/O error occurred while reading the job or writing the test.
    #[error("error registering test `{name}` at `{path}`")]
    Io {
        /// The test being registered.
        name: TestName,

        /// The path being read or written.
        path: Utf8PathBuf,

        /// The underlying error.
        #[source]
        err: io::Error,
    },

    /// Copying the job's restart snapshot failed.
    #[error("error copying restart snapshot for test `{name}` to `{path}`")]
    CopyRestart {
        /// The test being registered.
        name: TestName,

        /// The destination directory.
        path: Utf8PathBuf,

        /// The underlying error.
        #[source]
        err: cp_r::Error,
    },
}

/// An external tool did not complete successfully.
#[derive(Debug, Error)]
pub enum ToolFailure {
    /// The tool could not be started.
    #[error("failed to execute `{command}`")]
    Spawn {
        /// The command line.
        command: String,

        /// The underlying error.
        #[source]
        err: io::Error,
    },

    /// The tool exited with a failure status.
    #[error("command `{command}` {}", display_exit_code(*.exit_code))]
    Exited {
        /// The command line.
        command: String,

        /// The exit code, or `None` if the tool was terminated by a signal.
        exit_code: Option<i32>,
    },
}

fn display_exit_code(exit_code: Option<i32>) -> String {
    match exit_code {
        Some(code) => format!("exited with code {code}"),
        None => "was terminated by a signal".to_owned(),
    }
}

/// An error that occurred while running a single test.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ExecuteError {
    /// The test definition cannot be used.
    #[error(transparent)]
    Malformed(#[from] MalformedTestError),

    /// The job-configuration tool failed.
    #[error("failed to configure job for test `{test}`")]
    ConfigurationFailure {
        /// The test.
        test: TestName,

        /// The failure.
        #[source]
        failure: ToolFailure,
    },

    /// The build-and-run tool failed.
    #[error("failed to build and run job for test `{test}`")]
    BuildOrRunFailure {
        /// The test.
        test: TestName,

        /// The failure.
        #[source]
        failure: ToolFailure,
    },

    /// The comparator could not be started.
    #[error("failed to compare `{artifact}` for test `{test}`")]
    ComparatorFailure {
        /// The test.
        test: TestName,

        /// The artifact being compared.
        artifact: Utf8PathBuf,

        /// The failure.
        #[source]
        failure: ToolFailure,
    },

    /// The restart prerequisite did not leave an output directory behind.
    #[error("restart prerequisite `{prerequisite}` of test `{test}` has no output at `{path}`")]
    MissingRestartOutput {
        /// The test.
        test: TestName,

        /// The prerequisite test.
        prerequisite: TestName,

        /// The expected output directory.
        path: Utf8PathBuf,
    },

    /// Copying restart input failed.
    #[error("failed to copy restart input for test `{test}` from `{from}` to `{to}`")]
    RestartStaging {
        /// The test.
        test: TestName,

        /// The source directory.
        from: Utf8PathBuf,

        /// The destination directory.
        to: Utf8PathBuf,

        /// The underlying error.
        #[source]
        err: cp_r::Error,
    },

    /// The known-good artifacts could not be listed.
    #[error("failed to read known-good artifacts for test `{test}` in `{dir}`")]
    KnownGoodRead {
        /// The test.
        test: TestName,

        /// The known-good directory.
        dir: Utf8PathBuf,

        /// The underlying error.
        #[source]
        err: io::Error,
    },

    /// Writing progress to the batch log or the output stream, or opening the log for a tool,
    /// failed.
    #[error("failed to write progress for test `{test}`")]
    WriteProgress {
        /// The test.
        test: TestName,

        /// The underlying error.
        #[source]
        err: io::Error,
    },
}

impl ExecuteError {
    /// Returns the name of the test this error occurred in.
    pub fn test(&self) -> &TestName {
        match self {
            Self::Malformed(err) => err.test(),
            Self::ConfigurationFailure { test, .. }
            | Self::BuildOrRunFailure { test, .. }
            | Self::ComparatorFailure { test, .. }
            | Self::MissingRestartOutput { test, .. }
            | Self::RestartStaging { test, .. }
            | Self::KnownGoodRead { test, .. }
            | Self::WriteProgress { test, .. } => test,
        }
    }
}

/// An error that occurred while creating or using a batch directory.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum BatchDirError {
    /// The batch directory could not be created.
    #[error("failed to create batch directory `{path}`")]
    Create {
        /// The batch directory.
        path: Utf8PathBuf,

        /// The underlying error.
        #[source]
        err: io::Error,
    },

    /// The batch log could not be opened.
    #[error("failed to open batch log `{path}`")]
    OpenLog {
        /// The log path.
        path: Utf8PathBuf,

        /// The underlying error.
        #[source]
        err: io::Error,
    },
}

/// An error that occurred while writing a batch summary.
#[derive(Debug, Error)]
#[error("failed to write summary to `{path}`")]
pub struct SummaryWriteError {
    path: Utf8PathBuf,
    #[source]
    err: io::Error,
}

impl SummaryWriteError {
    pub(crate) fn new(path: impl Into<Utf8PathBuf>, err: io::Error) -> Self {
        Self {
            path: path.into(),
            err,
        }
    }
}

/// The comparison tool is not available and could not be built.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ComparatorUnavailable {
    /// The comparator does not exist and no build command is configured.
    #[error("comparator `{path}` does not exist and no build command is configured")]
    NotFound {
        /// The comparator path.
        path: Utf8PathBuf,
    },

    /// The build command failed.
    #[error("could not build comparator `{path}`")]
    BuildFailed {
        /// The comparator path.
        path: Utf8PathBuf,

        /// The failure.
        #[source]
        failure: ToolFailure,
    },

    /// The build command succeeded but did not produce the comparator.
    #[error("building the comparator did not produce `{path}`")]
    NotProduced {
        /// The comparator path.
        path: Utf8PathBuf,
    },
}

/// An error that stopped a batch from running at all.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum BatchRunError {
    /// The batch log could not be opened.
    #[error(transparent)]
    BatchDir(#[from] BatchDirError),

    /// Writing to the output stream failed.
    #[error("failed to write batch output")]
    WriteOutput(#[source] io::Error),
}

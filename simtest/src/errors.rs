// Copyright (c) The simtest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::output::{NO_HEADING, StderrStyles};
use camino::Utf8PathBuf;
use owo_colors::OwoColorize;
use simtest_runner::{SimtestExitCode, catalog::TestName, errors::*, helpers::plural};
use std::error::Error;
use thiserror::Error;

pub(crate) type Result<T, E = ExpectedError> = std::result::Result<T, E>;

// Note that the #[error()] strings are mostly placeholder messages -- the expected way to print out
// errors is with the display_to_stderr method, which colorizes errors.

/// An error that simtest expects and reports without a backtrace.
#[derive(Debug, Error)]
#[doc(hidden)]
pub enum ExpectedError {
    #[error("could not determine the current directory")]
    CurrentDir {
        #[source]
        err: std::io::Error,
    },
    #[error("current directory is not valid UTF-8")]
    CurrentDirInvalidUtf8 { path: std::path::PathBuf },
    #[error("config parse error")]
    ConfigParse {
        #[from]
        err: ConfigParseError,
    },
    #[error("catalog error")]
    Catalog {
        #[from]
        err: CatalogError,
    },
    #[error("dependency error")]
    Dependency {
        #[from]
        err: DependencyError,
    },
    #[error("cyclic dependency error")]
    Cycle {
        #[from]
        err: CyclicDependencyError,
    },
    #[error("register error")]
    Register {
        #[from]
        err: RegisterError,
    },
    #[error("comparator unavailable")]
    ComparatorUnavailable {
        #[from]
        err: ComparatorUnavailable,
    },
    #[error("batch directory error")]
    BatchDir {
        #[from]
        err: BatchDirError,
    },
    #[error("batch run error")]
    BatchRun {
        #[from]
        err: BatchRunError,
    },
    #[error("summary write error")]
    SummaryWrite {
        #[from]
        err: SummaryWriteError,
    },
    #[error("batch aborted")]
    BatchAborted {
        test: TestName,
        not_attempted: usize,
        summary_path: Utf8PathBuf,
    },
    #[error("tests errored")]
    TestsErrored {
        count: usize,
        summary_path: Utf8PathBuf,
    },
    #[error("error writing output")]
    WriteOutput {
        #[source]
        err: std::io::Error,
    },
}

impl ExpectedError {
    pub(crate) fn write_output(err: std::io::Error) -> Self {
        Self::WriteOutput { err }
    }

    /// Returns the exit code for the process.
    pub fn process_exit_code(&self) -> i32 {
        match self {
            Self::CurrentDir { .. }
            | Self::CurrentDirInvalidUtf8 { .. }
            | Self::ConfigParse { .. }
            | Self::ComparatorUnavailable { .. } => SimtestExitCode::SETUP_ERROR,
            Self::Catalog { err } => match err {
                CatalogError::Walk { .. } => SimtestExitCode::SETUP_ERROR,
                _ => SimtestExitCode::INVALID_REQUEST,
            },
            Self::Dependency { err } => match err {
                DependencyError::UnknownTest { .. } => SimtestExitCode::INVALID_REQUEST,
                DependencyError::Malformed(_) => SimtestExitCode::MALFORMED_TEST,
                _ => SimtestExitCode::DEPENDENCY_ERROR,
            },
            Self::Cycle { .. } => SimtestExitCode::DEPENDENCY_ERROR,
            Self::Register { .. } => SimtestExitCode::REGISTER_FAILED,
            Self::BatchAborted { .. } => SimtestExitCode::TEST_RUN_ABORTED,
            Self::TestsErrored { .. } => SimtestExitCode::TESTS_ERRORED,
            Self::BatchDir { .. }
            | Self::BatchRun { .. }
            | Self::SummaryWrite { .. }
            | Self::WriteOutput { .. } => SimtestExitCode::WRITE_OUTPUT_ERROR,
        }
    }

    /// Displays this error to stderr.
    pub fn display_to_stderr(&self, styles: &StderrStyles) {
        let mut next_error = match self {
            Self::CurrentDir { err } => {
                tracing::error!("could not determine the current directory");
                Some(err as &dyn Error)
            }
            Self::CurrentDirInvalidUtf8 { path } => {
                tracing::error!(
                    "current directory `{}` is not valid UTF-8 (pass --root instead)",
                    path.display()
                );
                None
            }
            Self::ConfigParse { err } => {
                tracing::error!("{err}");
                err.source()
            }
            Self::Catalog { err } => {
                tracing::error!("{err}");
                err.source()
            }
            Self::Dependency { err } => {
                tracing::error!("{err}");
                err.source()
            }
            Self::Cycle { err } => {
                tracing::error!("{err}");
                None
            }
            Self::Register { err } => {
                tracing::error!("{err}");
                err.source()
            }
            Self::ComparatorUnavailable { err } => {
                tracing::error!("{err}");
                err.source()
            }
            Self::BatchDir { err } => {
                tracing::error!("{err}");
                err.source()
            }
            Self::BatchRun { err } => {
                tracing::error!("{err}");
                err.source()
            }
            Self::SummaryWrite { err } => {
                tracing::error!("{err}");
                err.source()
            }
            Self::BatchAborted {
                test,
                not_attempted,
                summary_path,
            } => {
                tracing::error!(
                    "batch aborted at test `{}` ({} not attempted); summary written to {}",
                    test.style(styles.bold),
                    not_attempted.style(styles.bold),
                    summary_path.style(styles.bold),
                );
                None
            }
            Self::TestsErrored {
                count,
                summary_path,
            } => {
                tracing::error!(
                    "{} {} could not be run to completion; summary written to {}",
                    count.style(styles.bold),
                    plural::tests_str(*count),
                    summary_path.style(styles.bold),
                );
                None
            }
            Self::WriteOutput { err } => {
                tracing::error!("error writing output");
                Some(err as &dyn Error)
            }
        };

        while let Some(err) = next_error {
            tracing::error!(target: NO_HEADING, "\nCaused by:\n  {}", err);
            next_error = err.source();
        }
    }
}

// Copyright (c) The simtest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The boundary to the external job tool-chain and comparator.
//!
//! [`ExternalToolchain`] runs the configured commands. Anything implementing [`Toolchain`] can
//! stand in for it, which is how the executor is tested without real simulations.

use crate::{
    catalog::{ConfigForm, TestName},
    config::SimtestConfig,
    errors::{ComparatorUnavailable, ToolFailure},
    helpers::resolve_program,
};
use camino::{Utf8Path, Utf8PathBuf};
use duct::cmd;
use std::fs::File;

/// Everything the job-configuration tool needs to set up a job for a test.
#[derive(Clone, Copy, Debug)]
pub struct JobConfiguration<'a> {
    /// The test being configured. The job is created at `batch_dir/test`.
    pub test: &'a TestName,

    /// The test's configuration files.
    pub config: &'a ConfigForm,

    /// The batch directory jobs are created in.
    pub batch_dir: &'a Utf8Path,

    /// Whether to pass `--t100`.
    pub t100: bool,

    /// The opaque run length.
    pub run_length: &'a str,
}

impl JobConfiguration<'_> {
    /// Returns the arguments passed to the job-configuration tool.
    pub fn to_args(&self) -> Vec<String> {
        let mut args = Vec::with_capacity(9);
        match self.config {
            ConfigForm::Full { config } => {
                args.extend(["-c".to_owned(), config.to_string()]);
            }
            ConfigForm::Split { base, user } => {
                args.extend([
                    "-b".to_owned(),
                    base.to_string(),
                    "-u".to_owned(),
                    user.to_string(),
                ]);
            }
        }
        args.extend(["-j".to_owned(), self.batch_dir.to_string()]);
        if self.t100 {
            args.push("--t100".to_owned());
        }
        args.extend([self.test.to_string(), self.run_length.to_owned()]);
        args
    }
}

/// How a tool exited.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ToolExit {
    /// The command line, for display.
    pub command: String,

    /// The exit code, or `None` if the tool was terminated by a signal.
    pub exit_code: Option<i32>,
}

impl ToolExit {
    /// Returns true if the tool exited with status 0.
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }

    /// Returns the failure corresponding to this exit, or `None` if the tool succeeded.
    pub fn failure(&self) -> Option<ToolFailure> {
        (!self.success()).then(|| ToolFailure::Exited {
            command: self.command.clone(),
            exit_code: self.exit_code,
        })
    }
}

/// The external commands a test run relies on.
///
/// Each method blocks until the tool exits, while the tool's standard output and standard error
/// are written to `log` as they are produced. `Err` is returned only if the tool could not be
/// started: a nonzero exit is reported through [`ToolExit::exit_code`].
pub trait Toolchain {
    /// Configures a new job for a test, from the simulation root.
    fn configure_job(&self, job: &JobConfiguration<'_>, log: File)
    -> Result<ToolExit, ToolFailure>;

    /// Builds and runs the job in `job_dir`.
    fn build_and_run(&self, job_dir: &Utf8Path, log: File) -> Result<ToolExit, ToolFailure>;

    /// Compares a produced artifact against its reference. Exit status 0 means they match.
    fn compare(
        &self,
        reference: &Utf8Path,
        produced: &Utf8Path,
        log: File,
    ) -> Result<ToolExit, ToolFailure>;

    /// Makes sure the comparator can be run, building it if necessary.
    fn ensure_comparator(&self) -> Result<(), ComparatorUnavailable> {
        Ok(())
    }
}

/// Runs the tool-chain configured in [`SimtestConfig`].
#[derive(Clone, Debug)]
pub struct ExternalToolchain {
    root: Utf8PathBuf,
    new_job: String,
    run_job: Vec<String>,
    comparator: Utf8PathBuf,
    comparator_build: Vec<String>,
    absolute_tolerance: String,
    relative_tolerance: String,
}

impl ExternalToolchain {
    /// Creates a new tool-chain from the config.
    pub fn new(config: &SimtestConfig) -> Self {
        let tools = config.tools();
        Self {
            root: config.root().to_owned(),
            new_job: resolve_program(config.root(), tools.new_job()),
            run_job: tools.run_job().to_vec(),
            comparator: tools.comparator().to_owned(),
            comparator_build: tools.comparator_build().to_vec(),
            absolute_tolerance: config.compare().absolute_tolerance().to_owned(),
            relative_tolerance: config.compare().relative_tolerance().to_owned(),
        }
    }

    /// Returns the arguments passed to the comparator.
    pub fn comparator_args(&self, reference: &Utf8Path, produced: &Utf8Path) -> Vec<String> {
        vec![
            "-v".to_owned(),
            "-a".to_owned(),
            self.absolute_tolerance.clone(),
            "-r".to_owned(),
            self.relative_tolerance.clone(),
            reference.to_string(),
            produced.to_string(),
        ]
    }
}

impl Toolchain for ExternalToolchain {
    fn configure_job(
        &self,
        job: &JobConfiguration<'_>,
        log: File,
    ) -> Result<ToolExit, ToolFailure> {
        run_logged(&self.new_job, &job.to_args(), &self.root, log)
    }

    fn build_and_run(&self, job_dir: &Utf8Path, log: File) -> Result<ToolExit, ToolFailure> {
        let Some((program, args)) = self.run_job.split_first() else {
            // Nothing to run: treat as a successful no-op.
            return Ok(ToolExit {
                command: String::new(),
                exit_code: Some(0),
            });
        };
        // Relative programs like `./go` live in the job directory.
        run_logged(&resolve_program(job_dir, program), args, job_dir, log)
    }

    fn compare(
        &self,
        reference: &Utf8Path,
        produced: &Utf8Path,
        log: File,
    ) -> Result<ToolExit, ToolFailure> {
        run_logged(
            self.comparator.as_str(),
            &self.comparator_args(reference, produced),
            &self.root,
            log,
        )
    }

    fn ensure_comparator(&self) -> Result<(), ComparatorUnavailable> {
        if self.comparator.is_file() {
            return Ok(());
        }
        let Some((program, args)) = self.comparator_build.split_first() else {
            return Err(ComparatorUnavailable::NotFound {
                path: self.comparator.clone(),
            });
        };

        let program = resolve_program(&self.root, program);
        let command = display_command(&program, args);
        tracing::info!("building comparator with `{command}`");
        let status = cmd(program.as_str(), args)
            .dir(self.root.as_std_path())
            .stdout_null()
            .stderr_null()
            .unchecked()
            .run()
            .map_err(|err| ComparatorUnavailable::BuildFailed {
                path: self.comparator.clone(),
                failure: ToolFailure::Spawn {
                    command: command.clone(),
                    err,
                },
            })?
            .status;
        if !status.success() {
            return Err(ComparatorUnavailable::BuildFailed {
                path: self.comparator.clone(),
                failure: ToolFailure::Exited {
                    command,
                    exit_code: status.code(),
                },
            });
        }

        if self.comparator.is_file() {
            Ok(())
        } else {
            Err(ComparatorUnavailable::NotProduced {
                path: self.comparator.clone(),
            })
        }
    }
}

/// Runs a tool with both of its output streams going straight to `log`.
fn run_logged(
    program: &str,
    args: &[String],
    dir: &Utf8Path,
    log: File,
) -> Result<ToolExit, ToolFailure> {
    let command = display_command(program, args);
    tracing::debug!("running `{command}` in {dir}");
    let output = cmd(program, args)
        .dir(dir.as_std_path())
        .stderr_to_stdout()
        .stdout_file(log)
        .unchecked()
        .run()
        .map_err(|err| ToolFailure::Spawn {
            command: command.clone(),
            err,
        })?;
    Ok(ToolExit {
        command,
        exit_code: output.status.code(),
    })
}

fn display_command(program: &str, args: &[String]) -> String {
    shell_words::join(std::iter::once(program).chain(args.iter().map(String::as_str)))
}

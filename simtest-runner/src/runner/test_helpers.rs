// Copyright (c) The simtest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::{
    batch::BatchDir,
    catalog::{ConfigForm, TestCatalog},
    errors::ToolFailure,
    helpers::relative_files,
    toolchain::{JobConfiguration, ToolExit, Toolchain},
};
use camino::{Utf8Path, Utf8PathBuf};
use camino_tempfile::Utf8TempDir;
use chrono::{TimeZone, Utc};
use std::{
    cell::RefCell,
    collections::{BTreeMap, BTreeSet},
    fs::{self, File},
    io::Write,
};

/// A temporary simulation root.
pub(super) struct Sim {
    dir: Utf8TempDir,
}

impl Sim {
    pub(super) fn new() -> Self {
        Self {
            dir: Utf8TempDir::new().expect("created temp dir"),
        }
    }

    pub(super) fn root(&self) -> &Utf8Path {
        self.dir.path()
    }

    pub(super) fn catalog(&self) -> TestCatalog {
        TestCatalog::from_dirs(self.root().join("tests"), self.root().join("jobs"))
    }

    pub(super) fn add_test(&self, name: &str, info: &str, known_good: &[(&str, &str)]) {
        self.add_test_without_config(name, info);
        let test_dir = self.root().join("tests").join(name);
        fs::write(test_dir.join(ConfigForm::FULL), "full").unwrap();
        for (artifact, contents) in known_good {
            write_file(&test_dir.join("knowngood").join(artifact), contents);
        }
    }

    pub(super) fn add_test_without_config(&self, name: &str, info: &str) {
        let test_dir = self.root().join("tests").join(name);
        write_file(&test_dir.join(TestCatalog::DEFINITION_FILE), info);
    }

    pub(super) fn batch_dir(&self) -> BatchDir {
        let time = Utc.with_ymd_and_hms(2024, 5, 6, 7, 8, 9).unwrap();
        BatchDir::create(&self.root().join("jobs"), &time).expect("created batch dir")
    }
}

fn write_file(path: &Utf8Path, contents: &str) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, contents).unwrap();
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub(super) enum FakeCall {
    Configure { test: String, args: Vec<String> },
    BuildAndRun { test: String, restart_files: Vec<String> },
    Compare { reference: Utf8PathBuf, produced: Utf8PathBuf },
}

/// An in-process tool-chain: jobs "produce" fixed files, and comparisons are byte equality.
#[derive(Debug, Default)]
pub(super) struct FakeToolchain {
    outputs: BTreeMap<String, Vec<(String, String)>>,
    fail_configure: BTreeSet<String>,
    fail_build: BTreeSet<String>,
    batch_dir: RefCell<Option<Utf8PathBuf>>,
    calls: RefCell<Vec<FakeCall>>,
}

impl FakeToolchain {
    pub(super) fn new() -> Self {
        Self::default()
    }

    pub(super) fn produces(mut self, test: &str, files: &[(&str, &str)]) -> Self {
        self.outputs.insert(
            test.to_owned(),
            files
                .iter()
                .map(|(path, contents)| ((*path).to_owned(), (*contents).to_owned()))
                .collect(),
        );
        self
    }

    pub(super) fn fail_configure(mut self, test: &str) -> Self {
        self.fail_configure.insert(test.to_owned());
        self
    }

    pub(super) fn fail_build(mut self, test: &str) -> Self {
        self.fail_build.insert(test.to_owned());
        self
    }

    pub(super) fn calls(&self) -> Vec<FakeCall> {
        self.calls.borrow().clone()
    }

    /// Returns the tests the job-configuration tool was invoked for, in order.
    pub(super) fn configured(&self) -> Vec<String> {
        self.calls
            .borrow()
            .iter()
            .filter_map(|call| match call {
                FakeCall::Configure { test, .. } => Some(test.clone()),
                _ => None,
            })
            .collect()
    }

    /// Returns the restart input present when `test`'s job was run.
    pub(super) fn restart_files(&self, test: &str) -> Vec<String> {
        self.calls
            .borrow()
            .iter()
            .find_map(|call| match call {
                FakeCall::BuildAndRun {
                    test: t,
                    restart_files,
                } if t == test => Some(restart_files.clone()),
                _ => None,
            })
            .unwrap_or_else(|| panic!("test {test} was not run"))
    }

    /// Writes `output` to the log the way a real tool would, then exits.
    fn exit(mut log: File, command: &str, exit_code: i32, output: &str) -> ToolExit {
        log.write_all(output.as_bytes()).unwrap();
        ToolExit {
            command: command.to_owned(),
            exit_code: Some(exit_code),
        }
    }
}

impl Toolchain for FakeToolchain {
    fn configure_job(
        &self,
        job: &JobConfiguration<'_>,
        log: File,
    ) -> Result<ToolExit, ToolFailure> {
        let test = job.test.to_string();
        self.calls.borrow_mut().push(FakeCall::Configure {
            test: test.clone(),
            args: job.to_args(),
        });
        *self.batch_dir.borrow_mut() = Some(job.batch_dir.to_owned());

        if self.fail_configure.contains(&test) {
            return Ok(Self::exit(log, "new-job", 1, "configuration failed\n"));
        }
        fs::create_dir_all(job.batch_dir.join(&test)).unwrap();
        Ok(Self::exit(log, "new-job", 0, "configured\n"))
    }

    fn build_and_run(&self, job_dir: &Utf8Path, log: File) -> Result<ToolExit, ToolFailure> {
        let batch_dir = self.batch_dir.borrow().clone().expect("job was configured");
        let test = job_dir
            .strip_prefix(&batch_dir)
            .expect("job dir is in the batch dir")
            .to_string();
        let restart_files = relative_files(&job_dir.join("restart"))
            .unwrap()
            .into_iter()
            .map(|path| path.into_string())
            .collect();
        self.calls.borrow_mut().push(FakeCall::BuildAndRun {
            test: test.clone(),
            restart_files,
        });

        if self.fail_build.contains(&test) {
            return Ok(Self::exit(log, "./go run", 2, "build failed\n"));
        }
        for (path, contents) in self.outputs.get(&test).into_iter().flatten() {
            write_file(&job_dir.join("output").join(path), contents);
        }
        Ok(Self::exit(log, "./go run", 0, "ran\n"))
    }

    fn compare(
        &self,
        reference: &Utf8Path,
        produced: &Utf8Path,
        log: File,
    ) -> Result<ToolExit, ToolFailure> {
        self.calls.borrow_mut().push(FakeCall::Compare {
            reference: reference.to_owned(),
            produced: produced.to_owned(),
        });
        let matched = match (fs::read(reference), fs::read(produced)) {
            (Ok(reference), Ok(produced)) => reference == produced,
            _ => false,
        };
        Ok(if matched {
            Self::exit(log, "nccompare", 0, "")
        } else {
            Self::exit(log, "nccompare", 1, "files differ\n")
        })
    }
}

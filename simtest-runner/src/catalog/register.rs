// Copyright (c) The simtest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use super::{ArtifactSelector, ConfigForm, TestCatalog, TestDefinition, TestInfo, TestName};
use crate::{
    errors::{JobSpecParseError, PreconditionError, RegisterError},
    helpers::{copy_tree, has_any_file, relative_files},
};
use camino::{Utf8Path, Utf8PathBuf};
use std::{fmt, fs, io, str::FromStr};
use swrite::{SWrite, swriteln};

/// A job to register as a test, parsed from `<job>[=<name>]`.
///
/// If no name is given, the test is named after the job.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct JobSpec {
    job: String,
    name: TestName,
}

impl JobSpec {
    /// Returns the job name.
    pub fn job(&self) -> &str {
        &self.job
    }

    /// Returns the name of the test to create.
    pub fn name(&self) -> &TestName {
        &self.name
    }
}

impl FromStr for JobSpec {
    type Err = JobSpecParseError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let mut parts = input.splitn(3, '=');
        let job = parts.next().unwrap_or_default();
        let name = parts.next();
        if parts.next().is_some() {
            return Err(JobSpecParseError::TooManyParts {
                input: input.to_owned(),
            });
        }

        if job.is_empty() {
            return Err(JobSpecParseError::EmptyJob {
                input: input.to_owned(),
            });
        }
        if job.contains(['/', '\\']) || job == "." || job == ".." {
            return Err(JobSpecParseError::InvalidJob {
                job: job.to_owned(),
            });
        }

        let name = TestName::new(name.unwrap_or(job))?;
        Ok(Self {
            job: job.to_owned(),
            name,
        })
    }
}

impl fmt::Display for JobSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.name.as_str() == self.job {
            write!(f, "{}", self.job)
        } else {
            write!(f, "{}={}", self.job, self.name)
        }
    }
}

/// A request to register a job as a new test.
#[derive(Clone, Debug)]
pub struct RegisterRequest {
    spec: JobSpec,
    restart_from: Option<TestName>,
}

impl RegisterRequest {
    /// Creates a new request.
    pub fn new(spec: JobSpec, restart_from: Option<TestName>) -> Self {
        Self { spec, restart_from }
    }

    /// Returns the job name.
    pub fn job(&self) -> &str {
        self.spec.job()
    }

    /// Returns the name of the test to create.
    pub fn name(&self) -> &TestName {
        self.spec.name()
    }

    /// Returns the test this test restarts from, if any.
    pub fn restart_from(&self) -> Option<&TestName> {
        self.restart_from.as_ref()
    }
}

/// A test created by [`TestCatalog::register_test`].
#[derive(Clone, Debug)]
pub struct RegisteredTest {
    /// The name of the new test.
    pub name: TestName,

    /// The directory of the new test.
    pub dir: Utf8PathBuf,

    /// The artifacts copied into `knowngood/`, relative to the job's output directory.
    pub artifacts: Vec<Utf8PathBuf>,

    /// True if the job's restart snapshot was copied.
    pub copied_restart: bool,
}

impl TestCatalog {
    /// The job's configuration file, relative to the job directory, which becomes `test_info`.
    pub const JOB_CONFIG: &'static str = "config/config";

    /// Registers an existing job as a new test.
    ///
    /// Preconditions are checked in order, and artifacts are selected, before anything is written.
    pub fn register_test(
        &self,
        request: &RegisterRequest,
        selector: &mut dyn ArtifactSelector,
    ) -> Result<RegisteredTest, RegisterError> {
        let job = request.job();
        let name = request.name();
        let job_dir = self.jobs_dir.join(job);
        let output_dir = job_dir.join("output");

        if !job_dir.is_dir() {
            return Err(PreconditionError::JobNotFound {
                job: job.to_owned(),
            }
            .into());
        }
        if !has_any_file(&output_dir) {
            return Err(PreconditionError::JobHasNoOutput {
                job: job.to_owned(),
            }
            .into());
        }
        let test_dir = self.test_dir(name);
        if test_dir.exists() {
            return Err(PreconditionError::TestExists { name: name.clone() }.into());
        }
        if let Some(restart_from) = request.restart_from()
            && !self.exists(restart_from)
        {
            return Err(PreconditionError::RestartTestMissing {
                name: restart_from.clone(),
            }
            .into());
        }
        let job_config = job_dir.join(Self::JOB_CONFIG);
        if !job_config.is_file() {
            return Err(PreconditionError::JobConfigMissing {
                job: job.to_owned(),
                path: job_config,
            }
            .into());
        }

        let candidates = candidate_artifacts(&output_dir).map_err(|err| RegisterError::Io {
            name: name.clone(),
            path: output_dir.clone(),
            err,
        })?;
        let artifacts = selector.select(job, &candidates)?;
        tracing::debug!(
            "selected {} of {} candidate artifacts for test `{name}`",
            artifacts.len(),
            candidates.len(),
        );

        let io_err = |path: &Utf8Path| {
            let name = name.clone();
            let path = path.to_owned();
            move |err: io::Error| RegisterError::Io { name, path, err }
        };

        fs::create_dir_all(&test_dir).map_err(io_err(&test_dir))?;

        let mut info = fs::read_to_string(&job_config).map_err(io_err(&job_config))?;
        if let Some(restart_from) = request.restart_from() {
            if !info.is_empty() && !info.ends_with('\n') {
                info.push('\n');
            }
            swriteln!(info, "{}: {restart_from}", TestInfo::RESTART_FROM);
        }
        let info_path = test_dir.join(Self::DEFINITION_FILE);
        fs::write(&info_path, info).map_err(io_err(&info_path))?;

        for file_name in ConfigForm::FILE_NAMES {
            let src = job_dir.join("config").join(file_name);
            if src.is_file() {
                let dst = test_dir.join(file_name);
                fs::copy(&src, &dst).map_err(io_err(&dst))?;
            }
        }

        let known_good_dir = test_dir.join(TestDefinition::KNOWN_GOOD_DIR);
        for artifact in &artifacts {
            let dst = known_good_dir.join(artifact);
            if let Some(parent) = dst.parent() {
                fs::create_dir_all(parent).map_err(io_err(parent))?;
            }
            fs::copy(output_dir.join(artifact), &dst).map_err(io_err(&dst))?;
        }

        let job_restart = job_dir.join(TestDefinition::RESTART_DIR);
        let copied_restart = request.restart_from().is_none() && job_restart.is_dir();
        if copied_restart {
            let dst = test_dir.join(TestDefinition::RESTART_DIR);
            copy_tree(&job_restart, &dst).map_err(|err| RegisterError::CopyRestart {
                name: name.clone(),
                path: dst.clone(),
                err,
            })?;
        }

        tracing::info!("registered job `{job}` as test `{name}` at {test_dir}");
        Ok(RegisteredTest {
            name: name.clone(),
            dir: test_dir,
            artifacts,
            copied_restart,
        })
    }
}

/// Returns the output files that may be used as known-good artifacts: `.nc` files other than
/// restart dumps, relative to `output_dir` and sorted.
pub fn candidate_artifacts(output_dir: &Utf8Path) -> io::Result<Vec<Utf8PathBuf>> {
    let mut files = relative_files(output_dir)?;
    files.retain(|file| {
        file.file_name() != Some("_restart.nc")
            && file
                .extension()
                .is_some_and(|ext| ext.eq_ignore_ascii_case("nc"))
    });
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        catalog::{AllArtifacts, PreselectedArtifacts},
        errors::ArtifactSelectError,
    };
    use camino_tempfile::Utf8TempDir;
    use pretty_assertions::assert_eq;
    use test_case::test_case;

    struct Sim {
        dir: Utf8TempDir,
        catalog: TestCatalog,
    }

    impl Sim {
        fn new() -> Self {
            let dir = Utf8TempDir::new().expect("created temp dir");
            let catalog = TestCatalog::from_dirs(dir.path().join("tests"), dir.path().join("jobs"));
            Self { dir, catalog }
        }

        fn write(&self, path: &str, contents: &str) {
            let path = self.dir.path().join(path);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, contents).unwrap();
        }

        fn make_job(&self, job: &str) {
            self.write(&format!("jobs/{job}/config/config"), "run_length: 10\nt100: True");
            self.write(&format!("jobs/{job}/config/base_config"), "base");
            self.write(&format!("jobs/{job}/config/user_config"), "user");
            self.write(&format!("jobs/{job}/output/a.nc"), "a");
            self.write(&format!("jobs/{job}/output/sub/B.NC"), "b");
            self.write(&format!("jobs/{job}/output/sub/_restart.nc"), "r");
            self.write(&format!("jobs/{job}/output/log.txt"), "log");
            self.write(&format!("jobs/{job}/restart/state.nc"), "state");
        }

        fn request(&self, spec: &str, restart_from: Option<&str>) -> RegisterRequest {
            RegisterRequest::new(
                spec.parse().unwrap(),
                restart_from.map(|name| TestName::new(name).unwrap()),
            )
        }
    }

    #[test_case("job", "job", "job" ; "job only")]
    #[test_case("job=renamed", "job", "renamed" ; "renamed")]
    #[test_case("job=group/leaf", "job", "group/leaf" ; "nested name")]
    fn parse_job_spec(input: &str, job: &str, name: &str) {
        let spec: JobSpec = input.parse().expect("valid job spec");
        assert_eq!(spec.job(), job);
        assert_eq!(spec.name().as_str(), name);
        assert_eq!(spec.to_string(), input);
    }

    #[test]
    fn parse_job_spec_errors() {
        assert!(matches!(
            "=name".parse::<JobSpec>(),
            Err(JobSpecParseError::EmptyJob { .. })
        ));
        assert!(matches!(
            "a/b".parse::<JobSpec>(),
            Err(JobSpecParseError::InvalidJob { .. })
        ));
        assert!(matches!(
            "a=b=c".parse::<JobSpec>(),
            Err(JobSpecParseError::TooManyParts { .. })
        ));
        assert!(matches!(
            "job=../x".parse::<JobSpec>(),
            Err(JobSpecParseError::InvalidName(_))
        ));
    }

    #[test]
    fn candidates_are_nc_files() {
        let sim = Sim::new();
        sim.make_job("job");
        let candidates = candidate_artifacts(&sim.dir.path().join("jobs/job/output")).unwrap();
        assert_eq!(
            candidates,
            vec![Utf8PathBuf::from("a.nc"), Utf8PathBuf::from("sub/B.NC")]
        );
    }

    #[test]
    fn register_copies_definition_and_artifacts() {
        let sim = Sim::new();
        sim.make_job("job");

        let mut selector = PreselectedArtifacts::new(["sub/B.NC"]);
        let registered = sim
            .catalog
            .register_test(&sim.request("job=new", None), &mut selector)
            .expect("registered test");
        assert_eq!(registered.name.as_str(), "new");
        assert_eq!(registered.artifacts, vec![Utf8PathBuf::from("sub/B.NC")]);
        assert!(registered.copied_restart);

        let definition = sim.catalog.definition(&registered.name).unwrap();
        assert_eq!(definition.run_length().unwrap(), "10");
        assert!(definition.t100());
        assert_eq!(definition.restart_from().unwrap(), None);
        assert!(matches!(
            definition.config_form().unwrap(),
            ConfigForm::Split { .. }
        ));
        assert_eq!(
            definition.known_good_artifacts().unwrap(),
            vec![Utf8PathBuf::from("sub/B.NC")]
        );
        assert!(definition.restart_snapshot().is_some());
    }

    #[test]
    fn register_with_restart_chain() {
        let sim = Sim::new();
        sim.make_job("base");
        sim.make_job("child");
        sim.catalog
            .register_test(&sim.request("base", None), &mut AllArtifacts)
            .unwrap();

        let registered = sim
            .catalog
            .register_test(&sim.request("child", Some("base")), &mut AllArtifacts)
            .expect("registered test");
        assert!(!registered.copied_restart);

        let definition = sim.catalog.definition(&registered.name).unwrap();
        assert_eq!(
            definition.restart_from().unwrap(),
            Some(TestName::new("base").unwrap())
        );
        // The job config had no trailing newline.
        assert_eq!(definition.info().get("t100"), Some("True"));
        assert_eq!(definition.restart_snapshot(), None);
    }

    #[test]
    fn empty_output_is_rejected() {
        let sim = Sim::new();
        sim.write("jobs/job/config/config", "run_length: 1\n");
        fs::create_dir_all(sim.dir.path().join("jobs/job/output/empty")).unwrap();

        let err = sim
            .catalog
            .register_test(&sim.request("job", None), &mut AllArtifacts)
            .expect_err("empty output is rejected");
        assert!(matches!(
            err,
            RegisterError::Precondition(PreconditionError::JobHasNoOutput { .. })
        ));
        assert!(!sim.catalog.test_dir(&TestName::new("job").unwrap()).exists());
    }

    #[test]
    fn preconditions_are_checked_in_order() {
        let sim = Sim::new();
        let err = sim
            .catalog
            .register_test(&sim.request("missing", Some("nope")), &mut AllArtifacts)
            .unwrap_err();
        assert!(matches!(
            err,
            RegisterError::Precondition(PreconditionError::JobNotFound { .. })
        ));

        sim.make_job("job");
        sim.write("tests/job/test_info", "run_length: 1\n");
        let err = sim
            .catalog
            .register_test(&sim.request("job", Some("nope")), &mut AllArtifacts)
            .unwrap_err();
        assert!(matches!(
            err,
            RegisterError::Precondition(PreconditionError::TestExists { .. })
        ));

        let err = sim
            .catalog
            .register_test(&sim.request("job=other", Some("nope")), &mut AllArtifacts)
            .unwrap_err();
        assert!(matches!(
            err,
            RegisterError::Precondition(PreconditionError::RestartTestMissing { .. })
        ));
    }

    #[test]
    fn failed_selection_writes_nothing() {
        let sim = Sim::new();
        sim.make_job("job");
        let err = sim
            .catalog
            .register_test(
                &sim.request("job", None),
                &mut PreselectedArtifacts::new(["log.txt"]),
            )
            .expect_err("log.txt is not a candidate");
        assert!(matches!(
            err,
            RegisterError::Select(ArtifactSelectError::NotACandidate { .. })
        ));
        assert!(!sim.catalog.test_dir(&TestName::new("job").unwrap()).exists());
    }
}

// Copyright (c) The simtest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use super::TestName;
use crate::{
    errors::{MalformedTestError, MalformedTestKind},
    helpers::relative_files,
};
use camino::{Utf8Path, Utf8PathBuf};
use std::{collections::BTreeMap, io};

/// The key/value pairs in a test's definition file.
///
/// Each non-blank line is of the form `key: value`, split at the first colon. Later occurrences of
/// a key override earlier ones.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TestInfo {
    entries: BTreeMap<String, String>,
}

impl TestInfo {
    /// The opaque run length passed to the job-configuration tool. Required.
    pub const RUN_LENGTH: &'static str = "run_length";

    /// The name of the test this test restarts from. Optional.
    pub const RESTART_FROM: &'static str = "restart_from";

    /// If `True`, the job is configured with `--t100`. Optional.
    pub const T100: &'static str = "t100";

    /// Parses a definition file.
    ///
    /// Returns the 1-based line number and contents of the first line without a colon on failure.
    pub fn parse(input: &str) -> Result<Self, (usize, String)> {
        let mut entries = BTreeMap::new();
        for (index, line) in input.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let Some((key, value)) = line.split_once(':') else {
                return Err((index + 1, line.to_owned()));
            };
            entries.insert(key.trim().to_owned(), value.trim().to_owned());
        }
        Ok(Self { entries })
    }

    /// Returns the value for a key, if present.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    /// Iterates over all keys and values, sorted by key.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

/// Which configuration files a test provides to the job-configuration tool.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ConfigForm {
    /// A single combined configuration file.
    Full {
        /// Path to `full_config`.
        config: Utf8PathBuf,
    },

    /// A base configuration with user overrides.
    Split {
        /// Path to `base_config`.
        base: Utf8PathBuf,

        /// Path to `user_config`.
        user: Utf8PathBuf,
    },
}

impl ConfigForm {
    /// The combined configuration file name.
    pub const FULL: &'static str = "full_config";

    /// The base configuration file name.
    pub const BASE: &'static str = "base_config";

    /// The user configuration file name.
    pub const USER: &'static str = "user_config";

    /// All configuration file names, in the order they're looked for.
    pub const FILE_NAMES: [&'static str; 3] = [Self::FULL, Self::BASE, Self::USER];

    /// Determines the configuration form present in `dir`.
    ///
    /// `full_config` takes precedence. Returns `None` if neither form is complete.
    pub fn detect(dir: &Utf8Path) -> Option<Self> {
        let full = dir.join(Self::FULL);
        if full.is_file() {
            return Some(Self::Full { config: full });
        }
        let base = dir.join(Self::BASE);
        let user = dir.join(Self::USER);
        (base.is_file() && user.is_file()).then_some(Self::Split { base, user })
    }
}

/// A parsed test definition.
///
/// Returned by [`TestCatalog::definition`](super::TestCatalog::definition).
#[derive(Clone, Debug)]
pub struct TestDefinition {
    name: TestName,
    dir: Utf8PathBuf,
    info: TestInfo,
}

impl TestDefinition {
    /// The directory of known-good artifacts, mirroring output paths.
    pub const KNOWN_GOOD_DIR: &'static str = "knowngood";

    /// The directory holding a saved restart snapshot.
    pub const RESTART_DIR: &'static str = "restart";

    /// Reads the definition of `name` from `dir`.
    pub fn read(name: TestName, dir: Utf8PathBuf) -> Result<Self, MalformedTestError> {
        let path = dir.join(super::TestCatalog::DEFINITION_FILE);
        let contents = match std::fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(err) => {
                return Err(MalformedTestError::new(
                    name,
                    MalformedTestKind::ReadInfo { path, err },
                ));
            }
        };
        let info = TestInfo::parse(&contents).map_err(|(line_number, line)| {
            MalformedTestError::new(
                name.clone(),
                MalformedTestKind::MissingColon { line_number, line },
            )
        })?;
        Ok(Self { name, dir, info })
    }

    /// Returns the name of the test.
    pub fn name(&self) -> &TestName {
        &self.name
    }

    /// Returns the test directory.
    pub fn dir(&self) -> &Utf8Path {
        &self.dir
    }

    /// Returns the raw key/value pairs.
    pub fn info(&self) -> &TestInfo {
        &self.info
    }

    /// Returns the test this test restarts from, if any.
    ///
    /// An empty value is treated as absent.
    pub fn restart_from(&self) -> Result<Option<TestName>, MalformedTestError> {
        match self.info.get(TestInfo::RESTART_FROM) {
            None | Some("") => Ok(None),
            Some(value) => TestName::new(value).map(Some).map_err(|err| {
                MalformedTestError::new(
                    self.name.clone(),
                    MalformedTestKind::InvalidRestartFrom(err),
                )
            }),
        }
    }

    /// Returns the run length.
    pub fn run_length(&self) -> Result<&str, MalformedTestError> {
        self.info.get(TestInfo::RUN_LENGTH).ok_or_else(|| {
            MalformedTestError::new(self.name.clone(), MalformedTestKind::MissingRunLength)
        })
    }

    /// Returns true if the `--t100` flag is enabled.
    pub fn t100(&self) -> bool {
        self.info.get(TestInfo::T100) == Some("True")
    }

    /// Returns the configuration form of this test.
    pub fn config_form(&self) -> Result<ConfigForm, MalformedTestError> {
        ConfigForm::detect(&self.dir).ok_or_else(|| {
            MalformedTestError::new(self.name.clone(), MalformedTestKind::NoConfiguration)
        })
    }

    /// Returns the known-good directory.
    pub fn known_good_dir(&self) -> Utf8PathBuf {
        self.dir.join(Self::KNOWN_GOOD_DIR)
    }

    /// Returns the known-good artifacts as sorted paths relative to [`Self::known_good_dir`].
    pub fn known_good_artifacts(&self) -> io::Result<Vec<Utf8PathBuf>> {
        relative_files(&self.known_good_dir())
    }

    /// Returns the saved restart snapshot directory, if one exists.
    pub fn restart_snapshot(&self) -> Option<Utf8PathBuf> {
        let dir = self.dir.join(Self::RESTART_DIR);
        dir.is_dir().then_some(dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use camino_tempfile::Utf8TempDir;
    use indoc::indoc;
    use maplit::btreemap;
    use pretty_assertions::assert_eq;

    #[test]
    fn parse_test_info() {
        let info = TestInfo::parse(indoc! {"
            run_length: 10
            t100: True

            restart_from : base
            url: http://example.com
        "})
        .expect("parsed");
        let expected = btreemap! {
            "restart_from" => "base",
            "run_length" => "10",
            "t100" => "True",
            "url" => "http://example.com",
        };
        assert_eq!(info.iter().collect::<BTreeMap<_, _>>(), expected);
    }

    #[test]
    fn parse_missing_colon() {
        let err = TestInfo::parse("run_length: 10\nbogus line\n").expect_err("missing colon");
        assert_eq!(err, (2, "bogus line".to_owned()));
    }

    fn make_test(info: &str, files: &[&str]) -> (Utf8TempDir, TestDefinition) {
        let dir = Utf8TempDir::new().expect("created temp dir");
        std::fs::write(dir.path().join("test_info"), info).unwrap();
        for file in files {
            let path = dir.path().join(file);
            std::fs::create_dir_all(path.parent().unwrap()).unwrap();
            std::fs::write(path, file).unwrap();
        }
        let definition =
            TestDefinition::read(TestName::new("t").unwrap(), dir.path().to_owned()).unwrap();
        (dir, definition)
    }

    #[test]
    fn full_config_takes_precedence() {
        let (dir, definition) = make_test(
            "run_length: 1\n",
            &["full_config", "base_config", "user_config"],
        );
        assert_eq!(
            definition.config_form().unwrap(),
            ConfigForm::Full {
                config: dir.path().join("full_config")
            }
        );
    }

    #[test]
    fn split_config_requires_both() {
        let (dir, definition) = make_test("run_length: 1\n", &["base_config", "user_config"]);
        assert_eq!(
            definition.config_form().unwrap(),
            ConfigForm::Split {
                base: dir.path().join("base_config"),
                user: dir.path().join("user_config"),
            }
        );

        let (_dir, definition) = make_test("run_length: 1\n", &["base_config"]);
        let err = definition.config_form().expect_err("incomplete pair");
        assert!(matches!(err.kind(), MalformedTestKind::NoConfiguration));
        assert_eq!(err.test().as_str(), "t");
    }

    #[test]
    fn fields() {
        let (_dir, definition) = make_test(
            "run_length: 5\nt100: True\nrestart_from: group/base\n",
            &["knowngood/b.nc", "knowngood/sub/a.nc", "restart/state.nc"],
        );
        assert_eq!(definition.run_length().unwrap(), "5");
        assert!(definition.t100());
        assert_eq!(
            definition.restart_from().unwrap(),
            Some(TestName::new("group/base").unwrap())
        );
        assert_eq!(
            definition.known_good_artifacts().unwrap(),
            vec![Utf8PathBuf::from("b.nc"), Utf8PathBuf::from("sub/a.nc")]
        );
        assert!(definition.restart_snapshot().is_some());
    }

    #[test]
    fn defaults_and_missing_run_length() {
        let (_dir, definition) = make_test("t100: true\nrestart_from:\n", &[]);
        // Only the literal `True` enables the flag.
        assert!(!definition.t100());
        assert_eq!(definition.restart_from().unwrap(), None);
        assert!(definition.known_good_artifacts().unwrap().is_empty());
        assert_eq!(definition.restart_snapshot(), None);

        let err = definition.run_length().expect_err("run_length is required");
        assert!(matches!(err.kind(), MalformedTestKind::MissingRunLength));
    }
}

// Copyright (c) The simtest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Discovery of test definitions on disk.
//!
//! A test is any directory under the tests root containing a [`TestCatalog::DEFINITION_FILE`].
//! Tests may be nested, in which case the parent directories act as groups: requesting a group
//! name expands to every test underneath it.

mod definition;
mod register;
mod select;

pub use definition::*;
pub use register::*;
pub use select::*;

use crate::{
    config::SimtestConfig,
    errors::{CatalogError, InvalidRequest, TestNameError},
    helpers::utf8_path,
};
use camino::{Utf8Path, Utf8PathBuf};
use std::{borrow::Borrow, collections::BTreeSet, fmt, str::FromStr};
use walkdir::WalkDir;

/// The name of a test: its path relative to the tests root, with `/` separators.
///
/// Names are ordered by their string value, which is used for every tie-break in simtest.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TestName(String);

impl TestName {
    /// Creates a new test name, validating that it is a non-empty relative path without `.` or
    /// `..` components.
    pub fn new(name: impl Into<String>) -> Result<Self, TestNameError> {
        let name = name.into();
        if name.is_empty() {
            return Err(TestNameError::new(name, "name is empty"));
        }
        if name.starts_with('/') {
            return Err(TestNameError::new(name, "name must be relative"));
        }
        if name.contains('\\') {
            return Err(TestNameError::new(name, "name must use `/` as a separator"));
        }
        for component in name.split('/') {
            match component {
                "" => return Err(TestNameError::new(name, "name has an empty component")),
                "." | ".." => {
                    return Err(TestNameError::new(
                        name,
                        "name must not contain `.` or `..` components",
                    ));
                }
                _ => {}
            }
        }
        Ok(Self(name))
    }

    /// Returns the name as a string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the name as a relative path.
    pub fn as_path(&self) -> &Utf8Path {
        Utf8Path::new(&self.0)
    }

    fn from_relative_path(path: &Utf8Path) -> Result<Self, TestNameError> {
        let joined = path
            .components()
            .map(|component| component.as_str())
            .collect::<Vec<_>>()
            .join("/");
        Self::new(joined)
    }
}

impl FromStr for TestName {
    type Err = TestNameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl fmt::Display for TestName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for TestName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for TestName {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// Discovers and reads test definitions, and registers new tests from jobs.
#[derive(Clone, Debug)]
pub struct TestCatalog {
    tests_dir: Utf8PathBuf,
    jobs_dir: Utf8PathBuf,
}

impl TestCatalog {
    /// The file whose presence marks a directory as a test.
    pub const DEFINITION_FILE: &'static str = "test_info";

    /// The request sentinel that expands to every test.
    pub const ALL: &'static str = "ALL";

    /// Creates a new catalog from the given config.
    pub fn new(config: &SimtestConfig) -> Self {
        Self::from_dirs(config.tests_dir(), config.jobs_dir())
    }

    /// Creates a new catalog over the given tests and jobs directories.
    pub fn from_dirs(tests_dir: impl Into<Utf8PathBuf>, jobs_dir: impl Into<Utf8PathBuf>) -> Self {
        Self {
            tests_dir: tests_dir.into(),
            jobs_dir: jobs_dir.into(),
        }
    }

    /// Returns the tests root.
    pub fn tests_dir(&self) -> &Utf8Path {
        &self.tests_dir
    }

    /// Returns the jobs root.
    pub fn jobs_dir(&self) -> &Utf8Path {
        &self.jobs_dir
    }

    /// Returns the directory for the given test.
    pub fn test_dir(&self, name: &TestName) -> Utf8PathBuf {
        self.tests_dir.join(name.as_path())
    }

    /// Returns true if the given test has a definition.
    pub fn exists(&self, name: &TestName) -> bool {
        self.test_dir(name).join(Self::DEFINITION_FILE).is_file()
    }

    /// Lazily iterates over every test under the tests root.
    ///
    /// Directories are visited in sorted order, so the sequence is stable. Each call starts a fresh
    /// walk.
    pub fn list_tests(&self) -> impl Iterator<Item = Result<TestName, CatalogError>> + '_ {
        self.walk_definitions(self.tests_dir.clone())
    }

    /// Expands a request into the sorted set of leaf tests it names.
    ///
    /// `["ALL"]` expands to every test, as does `ALL` repeated. Any other name expands to every
    /// test at or below it, so group names are supported.
    pub fn expand_request<S: AsRef<str>>(
        &self,
        names: &[S],
    ) -> Result<Vec<TestName>, CatalogError> {
        if names.is_empty() {
            return Err(InvalidRequest::Empty.into());
        }

        let has_all = names.iter().any(|name| name.as_ref() == Self::ALL);
        if has_all {
            let others: Vec<String> = names
                .iter()
                .map(|name| name.as_ref())
                .filter(|name| *name != Self::ALL)
                .map(|name| name.to_owned())
                .collect();
            if !others.is_empty() {
                return Err(InvalidRequest::AllWithOthers { others }.into());
            }
            let all = self.list_tests().collect::<Result<BTreeSet<_>, _>>()?;
            return Ok(all.into_iter().collect());
        }

        // Validate every name before touching the filesystem.
        let requested = names
            .iter()
            .map(|name| TestName::new(name.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;

        let mut leaf_tests = BTreeSet::new();
        for name in requested {
            let before = leaf_tests.len();
            let mut found_any = false;
            for test in self.walk_definitions(self.test_dir(&name)) {
                leaf_tests.insert(test?);
                found_any = true;
            }
            if !found_any {
                return Err(CatalogError::UnknownTest {
                    name: name.to_string(),
                });
            }
            tracing::debug!(
                "request `{name}` expanded to {} new leaf tests",
                leaf_tests.len() - before,
            );
        }

        Ok(leaf_tests.into_iter().collect())
    }

    /// Reads the definition of the given test.
    pub fn definition(
        &self,
        name: &TestName,
    ) -> Result<TestDefinition, crate::errors::MalformedTestError> {
        TestDefinition::read(name.clone(), self.test_dir(name))
    }

    // ---
    // Helper methods
    // ---

    fn walk_definitions(
        &self,
        start: Utf8PathBuf,
    ) -> impl Iterator<Item = Result<TestName, CatalogError>> + '_ {
        let walker = start
            .is_dir()
            .then(|| WalkDir::new(&start).sort_by_file_name().into_iter());

        walker.into_iter().flatten().filter_map(move |entry| {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => return Some(Err(self.walk_error(err.into()))),
            };
            if !entry.file_type().is_dir() || !entry.path().join(Self::DEFINITION_FILE).exists() {
                return None;
            }
            Some(self.name_for(entry.path()))
        })
    }

    fn name_for(&self, path: &std::path::Path) -> Result<TestName, CatalogError> {
        let path = utf8_path(path).map_err(|err| self.walk_error(err))?;
        let relative = match path.strip_prefix(&self.tests_dir) {
            Ok(relative) => relative,
            // Walks always start under the tests root.
            Err(_) => path,
        };
        Ok(TestName::from_relative_path(relative)?)
    }

    fn walk_error(&self, err: std::io::Error) -> CatalogError {
        CatalogError::Walk {
            dir: self.tests_dir.clone(),
            err,
        }
    }
}

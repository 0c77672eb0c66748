// Copyright (c) The simtest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration support for simtest.

use crate::errors::{ConfigParseError, ConfigParseErrorKind};
use camino::{Utf8Path, Utf8PathBuf};
use config::{Config, ConfigBuilder, File, FileFormat, builder::DefaultState};
use itertools::Itertools;
use serde::Deserialize;
use std::{collections::BTreeSet, fmt};

/// Overall configuration for simtest.
///
/// This is constructed once per invocation and passed to every component that needs to know where
/// tests and jobs live or how to invoke the external tool-chain. All relative paths are resolved
/// against the simulation root at construction time.
#[derive(Clone, Debug)]
pub struct SimtestConfig {
    root: Utf8PathBuf,
    tests_dir: Utf8PathBuf,
    jobs_dir: Utf8PathBuf,
    tools: ToolsConfig,
    compare: CompareConfig,
    on_tool_failure: ToolFailurePolicy,
    unknown_keys: BTreeSet<String>,
}

impl SimtestConfig {
    /// The default location of the config within the simulation root: `.config/simtest.toml`.
    pub const CONFIG_PATH: &'static str = ".config/simtest.toml";

    /// Contains the default config as a TOML file.
    ///
    /// Repository-specific configuration is layered on top of the default config.
    pub const DEFAULT_CONFIG: &'static str = include_str!("../default-config.toml");

    /// Reads the simtest config from the given file, or if not specified from
    /// `.config/simtest.toml` under the simulation root.
    ///
    /// If no config file is specified and the root doesn't have `.config/simtest.toml`, uses the
    /// default config options.
    pub fn from_sources(
        root: impl Into<Utf8PathBuf>,
        config_file: Option<&Utf8Path>,
    ) -> Result<Self, ConfigParseError> {
        let root = root.into();
        let (config_file, source) = match config_file {
            Some(file) => (file.to_owned(), File::new(file.as_str(), FileFormat::Toml)),
            None => {
                let config_file = root.join(Self::CONFIG_PATH);
                let source = File::new(config_file.as_str(), FileFormat::Toml).required(false);
                (config_file, source)
            }
        };

        let builder = Self::make_default_config().add_source(source);
        let (inner, unknown_keys) = Self::build_and_deserialize_config(&builder)
            .map_err(|kind| ConfigParseError::new(config_file.clone(), kind))?;
        if !unknown_keys.is_empty() {
            tracing::warn!(
                "ignoring unknown config keys in {config_file}: {}",
                unknown_keys.iter().join(", ")
            );
        }
        Ok(Self::resolve(root, inner, unknown_keys))
    }

    /// Returns the default simtest config for the given simulation root.
    pub fn default_config(root: impl Into<Utf8PathBuf>) -> Self {
        let (inner, unknown_keys) =
            Self::build_and_deserialize_config(&Self::make_default_config())
                .expect("default config is always valid");
        Self::resolve(root.into(), inner, unknown_keys)
    }

    /// Returns the simulation root.
    pub fn root(&self) -> &Utf8Path {
        &self.root
    }

    /// Returns the absolute directory containing test definitions.
    pub fn tests_dir(&self) -> &Utf8Path {
        &self.tests_dir
    }

    /// Returns the absolute directory jobs are run in.
    pub fn jobs_dir(&self) -> &Utf8Path {
        &self.jobs_dir
    }

    /// Returns the tool-chain configuration.
    pub fn tools(&self) -> &ToolsConfig {
        &self.tools
    }

    /// Returns the comparator tolerances.
    pub fn compare(&self) -> &CompareConfig {
        &self.compare
    }

    /// Returns the policy applied when a test fails for a reason other than a comparison mismatch.
    pub fn on_tool_failure(&self) -> ToolFailurePolicy {
        self.on_tool_failure
    }

    /// Returns the dotted paths of config keys that were not recognized, such as
    /// `tools.comparater`.
    pub fn unknown_keys(&self) -> &BTreeSet<String> {
        &self.unknown_keys
    }

    // ---
    // Helper methods
    // ---

    fn make_default_config() -> ConfigBuilder<DefaultState> {
        Config::builder().add_source(File::from_str(Self::DEFAULT_CONFIG, FileFormat::Toml))
    }

    fn build_and_deserialize_config(
        builder: &ConfigBuilder<DefaultState>,
    ) -> Result<(SimtestConfigImpl, BTreeSet<String>), ConfigParseErrorKind> {
        let config = builder
            .build_cloned()
            .map_err(|err| ConfigParseErrorKind::BuildError(Box::new(err)))?;

        let mut unknown_keys = BTreeSet::new();
        let mut cb = |path: serde_ignored::Path| {
            unknown_keys.insert(path.to_string());
        };
        let ignored_de = serde_ignored::Deserializer::new(config, &mut cb);
        let inner = serde_path_to_error::deserialize(ignored_de)
            .map_err(|err| ConfigParseErrorKind::DeserializeError(Box::new(err)))?;
        Ok((inner, unknown_keys))
    }

    fn resolve(
        root: Utf8PathBuf,
        inner: SimtestConfigImpl,
        unknown_keys: BTreeSet<String>,
    ) -> Self {
        let SimtestConfigImpl {
            store,
            tools,
            compare,
            run,
        } = inner;

        // join() replaces the base if the argument is absolute.
        let tests_dir = root.join(&store.tests_dir);
        let jobs_dir = root.join(&store.jobs_dir);
        let comparator = root.join(&tools.comparator);

        Self {
            tests_dir,
            jobs_dir,
            tools: ToolsConfig {
                new_job: tools.new_job,
                run_job: tools.run_job,
                comparator,
                comparator_build: tools.comparator_build,
            },
            compare: CompareConfig {
                absolute_tolerance: compare.absolute_tolerance,
                relative_tolerance: compare.relative_tolerance,
            },
            on_tool_failure: run.on_tool_failure,
            unknown_keys,
            root,
        }
    }
}

/// Commands making up the external job tool-chain.
///
/// Returned by [`SimtestConfig::tools`].
#[derive(Clone, Debug)]
pub struct ToolsConfig {
    new_job: String,
    run_job: Vec<String>,
    comparator: Utf8PathBuf,
    comparator_build: Vec<String>,
}

impl ToolsConfig {
    /// The job-configuration program, relative to the simulation root if it contains a separator.
    pub fn new_job(&self) -> &str {
        &self.new_job
    }

    /// The build-and-run command, relative to the job directory.
    pub fn run_job(&self) -> &[String] {
        &self.run_job
    }

    /// The absolute path to the comparator.
    pub fn comparator(&self) -> &Utf8Path {
        &self.comparator
    }

    /// The command used to build the comparator, or empty if it is never built.
    pub fn comparator_build(&self) -> &[String] {
        &self.comparator_build
    }
}

/// Tolerance parameters passed to the comparator.
///
/// These are passed through verbatim: their numeric meaning belongs to the comparator.
#[derive(Clone, Debug)]
pub struct CompareConfig {
    absolute_tolerance: String,
    relative_tolerance: String,
}

impl CompareConfig {
    /// The absolute tolerance, passed as `-a`.
    pub fn absolute_tolerance(&self) -> &str {
        &self.absolute_tolerance
    }

    /// The relative tolerance parameter, passed as `-r`.
    pub fn relative_tolerance(&self) -> &str {
        &self.relative_tolerance
    }
}

/// What to do when a test fails for a reason other than a comparison mismatch.
///
/// Comparison mismatches never stop a batch.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub enum ToolFailurePolicy {
    /// Stop the batch at the first malformed test or tool-chain failure.
    #[default]
    Abort,

    /// Mark the test as errored, skip tests that restart from it, and continue.
    Isolate,
}

impl fmt::Display for ToolFailurePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Abort => write!(f, "abort"),
            Self::Isolate => write!(f, "isolate"),
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct SimtestConfigImpl {
    store: StoreConfigImpl,
    tools: ToolsConfigImpl,
    compare: CompareConfigImpl,
    run: RunConfigImpl,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct StoreConfigImpl {
    tests_dir: Utf8PathBuf,
    jobs_dir: Utf8PathBuf,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct ToolsConfigImpl {
    new_job: String,
    run_job: Vec<String>,
    comparator: Utf8PathBuf,
    comparator_build: Vec<String>,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct CompareConfigImpl {
    absolute_tolerance: String,
    relative_tolerance: String,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct RunConfigImpl {
    on_tool_failure: ToolFailurePolicy,
}

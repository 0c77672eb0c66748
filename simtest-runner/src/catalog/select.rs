// Copyright (c) The simtest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::errors::ArtifactSelectError;
use camino::Utf8PathBuf;

/// Chooses which of a job's output artifacts become known-good artifacts for a new test.
///
/// Used by [`TestCatalog::register_test`](super::TestCatalog::register_test). The CLI provides an
/// interactive implementation; library callers and tests can use [`PreselectedArtifacts`] or
/// [`AllArtifacts`].
pub trait ArtifactSelector {
    /// Returns the chosen subset of `candidates`.
    ///
    /// `candidates` are relative to the job's output directory and sorted. The returned paths must
    /// be drawn from `candidates`. An empty selection is allowed.
    fn select(
        &mut self,
        job: &str,
        candidates: &[Utf8PathBuf],
    ) -> Result<Vec<Utf8PathBuf>, ArtifactSelectError>;
}

/// Selects a fixed list of artifacts, failing if any of them is not a candidate.
#[derive(Clone, Debug, Default)]
pub struct PreselectedArtifacts {
    artifacts: Vec<Utf8PathBuf>,
}

impl PreselectedArtifacts {
    /// Creates a new selector that always picks `artifacts`.
    pub fn new(artifacts: impl IntoIterator<Item = impl Into<Utf8PathBuf>>) -> Self {
        Self {
            artifacts: artifacts.into_iter().map(Into::into).collect(),
        }
    }
}

impl ArtifactSelector for PreselectedArtifacts {
    fn select(
        &mut self,
        _job: &str,
        candidates: &[Utf8PathBuf],
    ) -> Result<Vec<Utf8PathBuf>, ArtifactSelectError> {
        let mut selected = Vec::with_capacity(self.artifacts.len());
        for artifact in &self.artifacts {
            if !candidates.contains(artifact) {
                return Err(ArtifactSelectError::NotACandidate {
                    artifact: artifact.clone(),
                    candidates: candidates.to_vec(),
                });
            }
            if !selected.contains(artifact) {
                selected.push(artifact.clone());
            }
        }
        Ok(selected)
    }
}

/// Selects every candidate.
#[derive(Clone, Copy, Debug, Default)]
pub struct AllArtifacts;

impl ArtifactSelector for AllArtifacts {
    fn select(
        &mut self,
        _job: &str,
        candidates: &[Utf8PathBuf],
    ) -> Result<Vec<Utf8PathBuf>, ArtifactSelectError> {
        Ok(candidates.to_vec())
    }
}

// Copyright (c) The simtest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::output::OutputContext;
use camino::Utf8PathBuf;
use simtest_runner::{catalog::ArtifactSelector, errors::ArtifactSelectError};

/// Asks on the terminal whether each candidate artifact should be kept as known-good.
pub(crate) struct InteractiveSelector {
    colorize: bool,
}

impl InteractiveSelector {
    pub(crate) fn new(output: OutputContext) -> Self {
        Self {
            colorize: output
                .color
                .should_colorize(supports_color::Stream::Stderr),
        }
    }
}

impl ArtifactSelector for InteractiveSelector {
    fn select(
        &mut self,
        job: &str,
        candidates: &[Utf8PathBuf],
    ) -> Result<Vec<Utf8PathBuf>, ArtifactSelectError> {
        let colorful_theme = dialoguer::theme::ColorfulTheme::default();
        let mut selected = Vec::new();
        for candidate in candidates {
            let confirm = if self.colorize {
                dialoguer::Confirm::with_theme(&colorful_theme)
            } else {
                dialoguer::Confirm::with_theme(&dialoguer::theme::SimpleTheme)
            };
            let keep = confirm
                .with_prompt(format!("use {job}/output/{candidate} as a known-good artifact?"))
                .default(false)
                .show_default(true)
                .interact()
                .map_err(|err| ArtifactSelectError::Prompt(Box::new(err)))?;
            if keep {
                selected.push(candidate.clone());
            }
        }
        Ok(selected)
    }
}

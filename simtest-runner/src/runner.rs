// Copyright (c) The simtest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The batch runner.
//!
//! The main structure in this module is [`BatchRunner`], which runs an [`ExecutionOrder`] one test
//! at a time through a [`TestExecutor`].

mod executor;
#[cfg(test)]
mod test_helpers;

pub use executor::*;

use crate::{
    batch::BatchDir,
    catalog::{TestCatalog, TestName},
    config::ToolFailurePolicy,
    errors::BatchRunError,
    graph::DependencyGraph,
    reporter::{BatchAbort, BatchEvent, BatchReporter, BatchSummary, TestOutcome},
    schedule::ExecutionOrder,
    toolchain::Toolchain,
};
use std::io::Write;

/// Runs a batch of tests sequentially, in execution order.
#[derive(Debug)]
pub struct BatchRunner<'a, T: ?Sized> {
    executor: TestExecutor<'a, T>,
    policy: ToolFailurePolicy,
    reporter: BatchReporter,
}

impl<'a, T: Toolchain + ?Sized> BatchRunner<'a, T> {
    /// Creates a new batch runner.
    pub fn new(catalog: &'a TestCatalog, toolchain: &'a T, policy: ToolFailurePolicy) -> Self {
        Self {
            executor: TestExecutor::new(catalog, toolchain),
            policy,
            reporter: BatchReporter::new(),
        }
    }

    /// Colorizes progress written to the output stream. The batch log is never colorized.
    pub fn colorize(&mut self) {
        self.reporter.colorize();
    }

    /// Returns the reporter used for the output stream.
    pub fn reporter(&self) -> &BatchReporter {
        &self.reporter
    }

    /// Runs every test in `order` within `batch`, writing progress to `out` and the batch log.
    ///
    /// Tests whose restart prerequisite errored or was skipped are skipped. If a test errors, the
    /// [`ToolFailurePolicy`] decides whether the batch stops or carries on.
    pub fn run(
        &self,
        graph: &DependencyGraph,
        order: &ExecutionOrder,
        batch: &BatchDir,
        out: &mut dyn Write,
    ) -> Result<BatchSummary, BatchRunError> {
        let mut log = batch.open_log()?;
        let mut sink = ProgressSink::new(&self.reporter, out, &mut log);
        let mut summary = BatchSummary::new();

        for (index, test) in order.iter().enumerate() {
            if let Some(prerequisite) = self.unavailable_prerequisite(graph, &summary, test) {
                sink.report(BatchEvent::TestSkipped {
                    test,
                    prerequisite: &prerequisite,
                })
                .map_err(BatchRunError::WriteOutput)?;
                tracing::debug!("skipped `{test}`: `{prerequisite}` has no output");
                summary.push(test.clone(), TestOutcome::Skipped { prerequisite });
                continue;
            }

            match self.executor.run(test, batch, &mut sink) {
                Ok(run) => {
                    let outcome = if run.passed() {
                        TestOutcome::Passed
                    } else {
                        TestOutcome::Failed {
                            mismatched: run.mismatched(),
                        }
                    };
                    summary.push(test.clone(), outcome);
                }
                Err(error) => {
                    sink.report(BatchEvent::TestErrored {
                        test,
                        error: &error,
                    })
                    .map_err(BatchRunError::WriteOutput)?;

                    match self.policy {
                        ToolFailurePolicy::Abort => {
                            let not_attempted = order.len() - index - 1;
                            tracing::debug!(
                                "aborting batch at `{test}` with {not_attempted} tests remaining"
                            );
                            summary.set_abort(BatchAbort {
                                test: test.clone(),
                                error,
                                not_attempted,
                            });
                            break;
                        }
                        ToolFailurePolicy::Isolate => {
                            summary.push(test.clone(), TestOutcome::Errored { error });
                        }
                    }
                }
            }
        }

        Ok(summary)
    }

    /// Returns the prerequisite of `test` if it ran in this batch without producing output.
    fn unavailable_prerequisite(
        &self,
        graph: &DependencyGraph,
        summary: &BatchSummary,
        test: &TestName,
    ) -> Option<TestName> {
        let prerequisite = graph.restart_from(test)?;
        summary
            .outcome(prerequisite)
            .is_some_and(|outcome| !outcome.has_output())
            .then(|| prerequisite.clone())
    }
}

// Copyright (c) The simtest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::fixtures::*;
use color_eyre::eyre::{Result, ensure};
use indoc::indoc;
use pretty_assertions::assert_eq;
use simtest_runner::{
    batch::BatchDir,
    catalog::TestCatalog,
    config::SimtestConfig,
    errors::ComparatorUnavailable,
    graph::DependencyGraph,
    reporter::BatchSummary,
    runner::BatchRunner,
    toolchain::{ExternalToolchain, Toolchain},
};
use std::fs;

struct BatchResult {
    summary: BatchSummary,
    batch: BatchDir,
    output: String,
}

fn run_batch(root: &SimRoot, request: &[&str]) -> Result<BatchResult> {
    let config = SimtestConfig::from_sources(root.path(), None)?;
    let catalog = TestCatalog::new(&config);
    let leafs = catalog.expand_request(request)?;
    let graph = DependencyGraph::build(&catalog, leafs)?;
    let order = graph.execution_order()?;

    let toolchain = ExternalToolchain::new(&config);
    toolchain.ensure_comparator()?;
    let batch = BatchDir::create_now(config.jobs_dir())?;

    let mut output = Vec::new();
    let runner = BatchRunner::new(&catalog, &toolchain, config.on_tool_failure());
    let summary = runner.run(&graph, &order, &batch, &mut output)?;
    summary.persist(&batch.summary_path())?;

    Ok(BatchResult {
        summary,
        batch,
        output: String::from_utf8(output)?,
    })
}

#[test]
fn restart_chain_with_external_tools() -> Result<()> {
    let root = SimRoot::new()?;
    root.add_test(
        "base",
        "run_length: 10\n",
        &[("result.nc", "run_length=10 t100=no\n")],
    )?;
    root.add_test(
        "restartchild",
        "run_length: 20\nt100: True\nrestart_from: base\n",
        &[
            ("result.nc", "run_length=20 t100=yes\n"),
            ("restart_seen.nc", "result.nc\n"),
        ],
    )?;
    root.add_test(
        "wrong",
        "run_length: 5\n",
        &[("result.nc", "run_length=6 t100=no\n")],
    )?;

    let result = run_batch(&root, &["restartchild", "wrong"])?;

    let summary = fs::read_to_string(result.batch.summary_path())?;
    assert_eq!(
        summary,
        indoc! {"

            SUMMARY:
            base           OK
            wrong          FAILED
            restartchild   OK
        "}
    );
    ensure!(
        result.output.contains("    FAILED: result.nc\n"),
        "mismatch reported: {}",
        result.output
    );
    ensure!(
        result.output.contains("    OK: restart_seen.nc\n"),
        "restart handoff reported: {}",
        result.output
    );

    let log = fs::read_to_string(result.batch.log_path())?;
    ensure!(log.contains("configured base\n"), "log has tool output");
    ensure!(log.contains("ran job\n"), "log has build output");
    ensure!(
        log.contains("Running test \"restartchild\"\n"),
        "log has progress lines"
    );
    Ok(())
}

#[test]
fn comparator_is_built_on_demand() -> Result<()> {
    let root = SimRoot::without_comparator()?;
    root.write(
        ".config/simtest.toml",
        indoc! {r#"
            [tools]
            comparator-build = ["./build-comparator"]
        "#},
    )?;
    root.add_test(
        "base",
        "run_length: 1\n",
        &[("result.nc", "run_length=1 t100=no\n")],
    )?;

    let result = run_batch(&root, &["ALL"])?;
    ensure!(root.path().join("build/nccompare.exe").is_file());
    assert_eq!(result.summary.entries().len(), 1);
    ensure!(result.summary.entries()[0].1.is_success());
    Ok(())
}

#[test]
fn missing_comparator_stops_before_batch() -> Result<()> {
    let root = SimRoot::without_comparator()?;
    let config = SimtestConfig::from_sources(root.path(), None)?;
    let toolchain = ExternalToolchain::new(&config);
    let err = toolchain
        .ensure_comparator()
        .expect_err("no comparator and no build command");
    ensure!(matches!(err, ComparatorUnavailable::NotFound { .. }));
    ensure!(!config.jobs_dir().exists(), "no batch directory was created");
    Ok(())
}

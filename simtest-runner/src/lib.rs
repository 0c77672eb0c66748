// Copyright (c) The simtest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

#![warn(missing_docs)]

//! Core functionality for simtest, a regression-test harness for long-running simulation jobs.
//!
//! The basic flow is:
//!
//! 1. [`TestCatalog`](catalog::TestCatalog) expands the requested names into leaf tests.
//! 2. [`DependencyGraph`](graph::DependencyGraph) closes them over their restart prerequisites.
//! 3. [`ExecutionOrder`](schedule::ExecutionOrder) orders them so prerequisites run first.
//! 4. [`BatchRunner`](runner::BatchRunner) runs each test in a fresh
//!    [`BatchDir`](batch::BatchDir) through a [`Toolchain`](toolchain::Toolchain).
//! 5. [`BatchSummary`](reporter::BatchSummary) records the outcomes.

pub mod batch;
pub mod catalog;
pub mod config;
pub mod errors;
mod exit_codes;
pub mod graph;
pub mod helpers;
pub mod reporter;
pub mod runner;
pub mod schedule;
pub mod toolchain;

pub use exit_codes::SimtestExitCode;

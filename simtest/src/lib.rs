// Copyright (c) The simtest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! A regression-test harness for long-running simulation jobs.
//!
//! `simtest list` shows the registered tests, `simtest add` registers a finished job as a test,
//! and `simtest run` runs tests (and the tests they restart from) and compares their output
//! against known-good artifacts. The core logic lives in the `simtest-runner` crate.

#![warn(missing_docs)]

mod dispatch;
mod errors;
mod output;
mod select;

#[doc(hidden)]
pub use dispatch::*;
#[doc(hidden)]
pub use errors::*;
#[doc(hidden)]
pub use output::{Color, OutputContext, OutputWriter, StderrStyles};

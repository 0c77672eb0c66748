// Copyright (c) The simtest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Integration tests that drive the external tool-chain through shell scripts.

#[cfg(unix)]
mod basic;
#[cfg(unix)]
mod fixtures;

// Copyright (c) Asymptotic Labs
// SPDX-License-Identifier: Apache-2.0

//! Command-line front end: loads a parsed program, runs the analyzer and the
//! IR translation, and prints the IR or a declaration summary.

pub mod config;
pub mod diagnostics;
pub mod translate;

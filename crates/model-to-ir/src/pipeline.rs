// Copyright (c) Asymptotic Labs
// SPDX-License-Identifier: Apache-2.0

//! High-level translation pipeline from an analyzed model to the verification IR
//!
//! This is the main entry point for the CLI. Call `translate_program()` to get a
//! complete `Program` with all members translated, checks generated and, when a
//! selection is given, everything outside its dependency closure sliced away.

use crate::program_builder::ProgramBuilder;
use program_model::{Model, Result};
use serde::{Deserialize, Serialize};
use verification_ir::Program;

/// What to translate and which obligations to generate
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TranslationOptions {
    /// `Class`, `Class.member` or module-level names; empty selects everything
    pub select: Vec<String>,
    /// Translate module-level statements of the main modules into `main`
    pub main_method: bool,
    pub check_overrides: bool,
    pub check_inheritance: bool,
}

impl Default for TranslationOptions {
    fn default() -> Self {
        Self {
            select: vec![],
            main_method: false,
            check_overrides: true,
            check_inheritance: true,
        }
    }
}

/// Translate an analyzed model to an IR program
///
/// Fails on the first unsupported construct or invalid program; there is no
/// partial output.
pub fn translate_program(model: &Model, options: &TranslationOptions) -> Result<Program> {
    ProgramBuilder::new(model, options).build()
}

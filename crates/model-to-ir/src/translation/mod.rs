// Copyright (c) Asymptotic Labs
// SPDX-License-Identifier: Apache-2.0

//! Translation of source members to the verification IR
//!
//! This module provides specialized translators:
//! - utilities: boxing, coercion and receiver helpers shared by all translators
//! - expression_translator: source expressions → IR expressions
//! - call_translator: call target resolution, inlining of statically bound calls
//! - contract_translator: contract pseudo-calls (`Acc`, `Forall`, `Old`, ...)
//! - statement_translator: statements → IR statements with explicit control labels
//! - method_translator: one member → one IR declaration, override and inherit checks
//! - io_translator: IO operations and call slots

pub mod call_translator;
pub mod contract_translator;
pub mod expression_translator;
pub mod io_translator;
pub mod method_translator;
pub mod statement_translator;
mod utilities;

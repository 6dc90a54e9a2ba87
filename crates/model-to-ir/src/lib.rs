// Copyright (c) Asymptotic Labs
// SPDX-License-Identifier: Apache-2.0

//! Semantic Model to Verification IR Translation
//!
//! Lowers an analyzed [`program_model::Model`] into a [`verification_ir::Program`]:
//! the `PyType` domain, the built-in prelude, one IR declaration per class member,
//! module function, predicate, IO operation and call slot, plus the generated
//! override and inherit checks. The result is sliced to the dependency closure of
//! the selected declarations.

mod context;
mod pipeline;
mod prelude;
mod program_builder;
mod translation;
pub mod type_domain;

pub use pipeline::{translate_program, TranslationOptions};
pub use type_domain::{TypeDomainFactory, TYPE_DOMAIN};

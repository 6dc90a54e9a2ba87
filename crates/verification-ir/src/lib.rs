// Copyright (c) Asymptotic Labs
// SPDX-License-Identifier: Apache-2.0

//! Verification IR
//!
//! A first-order verification language of domains, fields, functions, predicates
//! and methods with pre/postconditions. This crate only holds the data model, the
//! dependency slicer and a text renderer; lowering source programs into it is done
//! by `model-to-ir`.

mod data;
pub mod analysis;
pub mod renderer;

// Program container and errors (from data/mod.rs)
pub use data::{Dependable, IrError, Program};

// Types and positions
pub use data::types::Type;
pub use data::position::Position;

// Expressions and statements
pub use data::expressions::{BinOp, Expr, FieldRef, LocalVar, UnOp};
pub use data::statements::Stmt;

// Top-level declarations
pub use data::declarations::{
    Assertion, Declaration, DeclarationKind, Domain, DomainAxiom, DomainFunc, Field, Function,
    Method, Predicate,
};

pub use analysis::dependency_slice::slice_program;
pub use renderer::render_program;

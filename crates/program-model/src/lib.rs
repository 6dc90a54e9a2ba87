// Copyright (c) Asymptotic Labs
// SPDX-License-Identifier: Apache-2.0

//! Program Model
//!
//! Input syntax of contract-annotated programs, the external type table, and the
//! semantic model (modules, classes, methods, variables, try blocks) built from
//! them by the analyzer. Lowering the model to the verification IR lives in
//! `model-to-ir`.

pub mod analyzer;
pub mod error;
pub mod interface;
pub mod model;
pub mod registry;
pub mod syntax;
pub mod type_expr;
pub mod type_table;

pub use analyzer::{analyze, Analyzer};
pub use error::{Result, SourcePos, TranslationError};
pub use interface::InterfaceDecls;
pub use model::*;
pub use registry::IdentifierRegistry;
pub use syntax::{Expr, ExprKind, SourceModule, SourceProgram, Stmt, StmtKind};
pub use type_expr::TypeExpr;
pub use type_table::TypeTable;

// Copyright (c) Asymptotic Labs
// SPDX-License-Identifier: Apache-2.0

use crate::error::SourcePos;
use crate::model::{ModuleId, VarId};
use crate::syntax::Expr;
use indexmap::IndexMap;

/// Input/output operation declared with `@IOOperation`
#[derive(Debug, Clone)]
pub struct IOOperation {
    pub name: String,
    pub sil_name: String,
    pub module: ModuleId,
    /// Place parameters and ordinary parameters
    pub params: IndexMap<String, VarId>,
    /// Result parameters (declared with a `Result()` default)
    pub results: IndexMap<String, VarId>,
    /// Definition in terms of other operations, if not basic
    pub body: Option<Expr>,
    pub terminates: Option<Expr>,
    pub termination_measure: Option<Expr>,
    pub pos: SourcePos,
}

/// Call slot declared with `@CallSlot`
#[derive(Debug, Clone)]
pub struct CallSlot {
    pub name: String,
    pub sil_name: String,
    pub module: ModuleId,
    pub args: IndexMap<String, VarId>,
    /// Variables bound by a nested `@UniversallyQuantified` function
    pub uq_vars: IndexMap<String, VarId>,
    pub precondition: Vec<Expr>,
    pub postcondition: Vec<Expr>,
    pub pos: SourcePos,
}

// Copyright (c) Asymptotic Labs
// SPDX-License-Identifier: Apache-2.0

use crate::error::SourcePos;
use crate::model::{ClassId, FieldId, PyType, ScopeRef};
use crate::syntax::Expr;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VarKind {
    Arg,
    Local,
    Global,
    StaticField,
    /// Synthesized in-flight exception holder of a try block
    TryError,
    /// Synthesized finally continuation code of a try block
    FinallyCode,
}

#[derive(Debug, Clone)]
pub struct Var {
    pub name: String,
    pub sil_name: String,
    pub typ: PyType,
    pub kind: VarKind,
    pub owner: ScopeRef,
    /// Stable numeric identity used by the definedness encoding
    pub id: usize,
    /// Narrowed types keyed by `(line, col)`
    pub alt_types: BTreeMap<(usize, usize), PyType>,
    pub reads: Vec<SourcePos>,
    pub writes: Vec<SourcePos>,
    /// Defining value of globals and static fields
    pub value: Option<Expr>,
}

impl Var {
    /// Type of the variable at a given source location
    pub fn type_at(&self, line: usize, col: usize) -> &PyType {
        self.alt_types.get(&(line, col)).unwrap_or(&self.typ)
    }
}

#[derive(Debug, Clone)]
pub struct Field {
    pub name: String,
    pub sil_name: String,
    pub cls: ClassId,
    pub typ: PyType,
    /// Same-named field of a superclass; only the root field is materialized
    pub inherited: Option<FieldId>,
    pub reads: Vec<SourcePos>,
    pub writes: Vec<SourcePos>,
}

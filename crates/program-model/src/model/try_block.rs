// Copyright (c) Asymptotic Labs
// SPDX-License-Identifier: Apache-2.0

use crate::error::SourcePos;
use crate::model::{ClassId, MethodId, VarId};
use crate::syntax::{Expr, NodeId, Stmt};

/// One `except` clause
#[derive(Debug, Clone)]
pub struct ExceptionHandler {
    pub exception: ClassId,
    pub body: Vec<Stmt>,
    /// Local bound by `except E as name`
    pub var: Option<VarId>,
    pub label: String,
    pub pos: SourcePos,
}

/// Context manager of a `with` block
#[derive(Debug, Clone)]
pub struct WithContext {
    pub context_expr: Expr,
    /// Holds the context manager object between `__enter__` and `__exit__`
    pub manager_var: VarId,
    /// Local bound by `with ... as name`
    pub target: Option<Expr>,
}

/// A protected region (`try` or `with`) of a method body
#[derive(Debug, Clone)]
pub struct TryBlock {
    pub node: NodeId,
    pub method: MethodId,
    pub body: Vec<Stmt>,
    pub handlers: Vec<ExceptionHandler>,
    pub else_body: Option<Vec<Stmt>>,
    pub finally_body: Option<Vec<Stmt>>,
    /// In-flight exception reference, or null
    pub error_var: VarId,
    /// Finally continuation code: 0 fall through, 1 return, 2 exception,
    /// 3 break, 4 continue
    pub finally_var: VarId,
    pub try_name: String,
    pub post_name: String,
    pub else_name: String,
    pub finally_name: String,
    pub with_context: Option<WithContext>,
    pub pos: SourcePos,
}

impl TryBlock {
    pub fn has_finally(&self) -> bool {
        self.finally_body.is_some() || self.with_context.is_some()
    }
}

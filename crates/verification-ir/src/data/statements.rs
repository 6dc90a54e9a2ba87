// Copyright (c) Asymptotic Labs
// SPDX-License-Identifier: Apache-2.0

use crate::data::expressions::{Expr, FieldRef, LocalVar};
use crate::data::position::Position;

/// IR statement
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Stmt {
    /// `target := value`
    LocalAssign { target: LocalVar, value: Expr },

    /// `receiver.field := value`
    FieldAssign {
        receiver: Expr,
        field: FieldRef,
        value: Expr,
    },

    /// `targets := method(args)`
    MethodCall {
        method: String,
        args: Vec<Expr>,
        targets: Vec<LocalVar>,
        pos: Position,
    },

    /// `target := new(fields)`
    New { target: LocalVar, fields: Vec<FieldRef> },

    Inhale(Expr, Position),
    Exhale(Expr, Position),
    Assert(Expr, Position),

    /// `fold acc(pred(args), perm)`; the operand is a predicate access
    Fold(Expr, Position),
    Unfold(Expr, Position),

    If {
        cond: Expr,
        then: Vec<Stmt>,
        els: Vec<Stmt>,
    },

    While {
        cond: Expr,
        invariants: Vec<Expr>,
        body: Vec<Stmt>,
    },

    /// Label, optionally carrying loop-head invariants
    Label { name: String, invariants: Vec<Expr> },

    Goto(String),

    /// Nested block
    Seqn(Vec<Stmt>),

    Comment(String),
}

impl Stmt {
    pub fn assign(target: LocalVar, value: Expr) -> Self {
        Stmt::LocalAssign { target, value }
    }

    pub fn label(name: impl Into<String>) -> Self {
        Stmt::Label {
            name: name.into(),
            invariants: vec![],
        }
    }

    pub fn goto(name: impl Into<String>) -> Self {
        Stmt::Goto(name.into())
    }

    pub fn if_then(cond: Expr, then: Vec<Stmt>) -> Self {
        Stmt::If {
            cond,
            then,
            els: vec![],
        }
    }

    pub fn call(method: impl Into<String>, args: Vec<Expr>, targets: Vec<LocalVar>, pos: Position) -> Self {
        Stmt::MethodCall {
            method: method.into(),
            args,
            targets,
            pos,
        }
    }

    /// Visit every expression directly or transitively contained in this statement
    pub fn visit_exprs(&self, f: &mut impl FnMut(&Expr)) {
        match self {
            Stmt::LocalAssign { value, .. } => value.visit(f),
            Stmt::FieldAssign {
                receiver, value, ..
            } => {
                receiver.visit(f);
                value.visit(f);
            }
            Stmt::MethodCall { args, .. } => args.iter().for_each(|a| a.visit(f)),
            Stmt::New { .. } | Stmt::Goto(_) | Stmt::Comment(_) => {}
            Stmt::Inhale(e, _)
            | Stmt::Exhale(e, _)
            | Stmt::Assert(e, _)
            | Stmt::Fold(e, _)
            | Stmt::Unfold(e, _) => e.visit(f),
            Stmt::If { cond, then, els } => {
                cond.visit(f);
                then.iter().chain(els.iter()).for_each(|s| s.visit_exprs(f));
            }
            Stmt::While {
                cond,
                invariants,
                body,
            } => {
                cond.visit(f);
                invariants.iter().for_each(|i| i.visit(f));
                body.iter().for_each(|s| s.visit_exprs(f));
            }
            Stmt::Label { invariants, .. } => invariants.iter().for_each(|i| i.visit(f)),
            Stmt::Seqn(stmts) => stmts.iter().for_each(|s| s.visit_exprs(f)),
        }
    }

    /// Visit this statement and all nested statements
    pub fn visit(&self, f: &mut impl FnMut(&Stmt)) {
        f(self);
        match self {
            Stmt::If { then, els, .. } => then.iter().chain(els.iter()).for_each(|s| s.visit(f)),
            Stmt::While { body, .. } | Stmt::Seqn(body) => body.iter().for_each(|s| s.visit(f)),
            _ => {}
        }
    }

    /// Names of declarations referenced by this statement
    pub fn referenced_names(&self, out: &mut Vec<String>) {
        self.visit(&mut |s| match s {
            Stmt::MethodCall { method, targets, .. } => {
                out.push(method.clone());
                out.extend(targets.iter().flat_map(|t| t.typ.domain_names()).map(String::from));
            }
            Stmt::New { fields, .. } => out.extend(fields.iter().map(|f| f.name.clone())),
            Stmt::FieldAssign { field, .. } => out.push(field.name.clone()),
            _ => {}
        });
        self.visit_exprs(&mut |e| e.own_names(out));
    }

    /// Labels declared by this statement or nested statements
    pub fn declared_labels(&self) -> Vec<String> {
        let mut labels = vec![];
        self.visit(&mut |s| {
            if let Stmt::Label { name, .. } = s {
                labels.push(name.clone());
            }
        });
        labels
    }
}

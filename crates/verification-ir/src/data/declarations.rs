// Copyright (c) Asymptotic Labs
// SPDX-License-Identifier: Apache-2.0

use crate::data::expressions::{Expr, LocalVar};
use crate::data::position::Position;
use crate::data::statements::Stmt;
use crate::data::types::Type;
use crate::data::Dependable;
use std::collections::BTreeSet;

/// A contract clause together with the source position it was written at
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assertion {
    pub expr: Expr,
    pub pos: Position,
}

impl Assertion {
    pub fn new(expr: Expr, pos: Position) -> Self {
        Self { expr, pos }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    pub name: String,
    pub typ: Type,
}

/// Uninterpreted function of a domain
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DomainFunc {
    pub name: String,
    pub params: Vec<LocalVar>,
    pub ret: Type,
    /// Unique constants are pairwise distinct
    pub unique: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DomainAxiom {
    pub name: String,
    pub expr: Expr,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Domain {
    pub name: String,
    pub functions: Vec<DomainFunc>,
    pub axioms: Vec<DomainAxiom>,
}

/// Heap-dependent pure function
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Function {
    pub name: String,
    pub params: Vec<LocalVar>,
    pub ret: Type,
    pub pres: Vec<Assertion>,
    pub posts: Vec<Assertion>,
    /// Abstract when `None`
    pub body: Option<Expr>,
    pub pos: Position,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Predicate {
    pub name: String,
    pub params: Vec<LocalVar>,
    /// Abstract when `None`
    pub body: Option<Expr>,
    pub pos: Position,
}

/// Impure procedure
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Method {
    pub name: String,
    pub params: Vec<LocalVar>,
    pub returns: Vec<LocalVar>,
    pub pres: Vec<Assertion>,
    pub posts: Vec<Assertion>,
    pub locals: Vec<LocalVar>,
    /// Abstract (contract only) when `None`
    pub body: Option<Vec<Stmt>>,
    pub pos: Position,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DeclarationKind {
    Domain,
    Field,
    Function,
    Predicate,
    Method,
}

/// Any top-level declaration
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Declaration {
    Domain(Domain),
    Field(Field),
    Function(Function),
    Predicate(Predicate),
    Method(Method),
}

impl Declaration {
    pub fn name(&self) -> &str {
        match self {
            Declaration::Domain(d) => &d.name,
            Declaration::Field(f) => &f.name,
            Declaration::Function(f) => &f.name,
            Declaration::Predicate(p) => &p.name,
            Declaration::Method(m) => &m.name,
        }
    }

    pub fn kind(&self) -> DeclarationKind {
        match self {
            Declaration::Domain(_) => DeclarationKind::Domain,
            Declaration::Field(_) => DeclarationKind::Field,
            Declaration::Function(_) => DeclarationKind::Function,
            Declaration::Predicate(_) => DeclarationKind::Predicate,
            Declaration::Method(_) => DeclarationKind::Method,
        }
    }
}

fn param_domains(params: &[LocalVar], out: &mut Vec<String>) {
    out.extend(params.iter().flat_map(|p| p.typ.domain_names()).map(String::from));
}

fn assertion_names(assertions: &[Assertion], out: &mut Vec<String>) {
    assertions.iter().for_each(|a| a.expr.referenced_names(out));
}

fn finish(own: &str, names: Vec<String>) -> BTreeSet<String> {
    names.into_iter().filter(|n| n != own).collect()
}

impl Dependable for Domain {
    fn name(&self) -> &str {
        &self.name
    }

    fn dependencies(&self) -> BTreeSet<String> {
        let mut names = vec![];
        for func in &self.functions {
            param_domains(&func.params, &mut names);
            names.extend(func.ret.domain_names().into_iter().map(String::from));
        }
        for axiom in &self.axioms {
            axiom.expr.referenced_names(&mut names);
        }
        finish(&self.name, names)
    }
}

impl Dependable for Field {
    fn name(&self) -> &str {
        &self.name
    }

    fn dependencies(&self) -> BTreeSet<String> {
        finish(&self.name, self.typ.domain_names().into_iter().map(String::from).collect())
    }
}

impl Dependable for Function {
    fn name(&self) -> &str {
        &self.name
    }

    fn dependencies(&self) -> BTreeSet<String> {
        let mut names = vec![];
        param_domains(&self.params, &mut names);
        names.extend(self.ret.domain_names().into_iter().map(String::from));
        assertion_names(&self.pres, &mut names);
        assertion_names(&self.posts, &mut names);
        if let Some(body) = &self.body {
            body.referenced_names(&mut names);
        }
        // self-recursion is not a dependency
        finish(&self.name, names)
    }
}

impl Dependable for Predicate {
    fn name(&self) -> &str {
        &self.name
    }

    fn dependencies(&self) -> BTreeSet<String> {
        let mut names = vec![];
        param_domains(&self.params, &mut names);
        if let Some(body) = &self.body {
            body.referenced_names(&mut names);
        }
        finish(&self.name, names)
    }
}

impl Dependable for Method {
    fn name(&self) -> &str {
        &self.name
    }

    fn dependencies(&self) -> BTreeSet<String> {
        let mut names = vec![];
        param_domains(&self.params, &mut names);
        param_domains(&self.returns, &mut names);
        param_domains(&self.locals, &mut names);
        assertion_names(&self.pres, &mut names);
        assertion_names(&self.posts, &mut names);
        for stmt in self.body.iter().flatten() {
            stmt.referenced_names(&mut names);
        }
        finish(&self.name, names)
    }
}

impl Dependable for Declaration {
    fn name(&self) -> &str {
        Declaration::name(self)
    }

    fn dependencies(&self) -> BTreeSet<String> {
        match self {
            Declaration::Domain(d) => d.dependencies(),
            Declaration::Field(f) => f.dependencies(),
            Declaration::Function(f) => f.dependencies(),
            Declaration::Predicate(p) => p.dependencies(),
            Declaration::Method(m) => m.dependencies(),
        }
    }
}

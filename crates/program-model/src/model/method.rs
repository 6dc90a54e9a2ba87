// Copyright (c) Asymptotic Labs
// SPDX-License-Identifier: Apache-2.0

use crate::error::SourcePos;
use crate::model::{ClassId, MethodId, ModuleId, PyType, TryBlockId, VarId};
use crate::syntax::{Expr, NodeId, Stmt};
use indexmap::IndexMap;

/// What kind of member a function definition declares, fixed by its decorators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MethodKind {
    Normal,
    Static,
    ClassMethod,
    Predicate,
    Pure,
    /// Property getter; the setter is linked through `Method::setter`
    Property,
    IOOperation,
    CallSlot,
}

/// How the receiver is passed, independent of purity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum MethodType {
    #[default]
    Normal,
    Static,
    ClassMethod,
}

#[derive(Debug, Clone)]
pub struct Method {
    pub name: String,
    pub sil_name: String,
    pub module: ModuleId,
    pub cls: Option<ClassId>,
    pub kind: MethodKind,
    pub method_type: MethodType,
    /// Only the contract is translated, never the body
    pub contract_only: bool,
    /// Declared by an interface; implemented by the backend
    pub interface: bool,
    pub args: IndexMap<String, VarId>,
    pub locals: IndexMap<String, VarId>,
    pub var_arg: Option<VarId>,
    pub kw_arg: Option<VarId>,
    /// Default value per argument, aligned with `args`
    pub defaults: Vec<Option<Expr>>,
    /// Declared return type; `None` for procedures returning nothing
    pub return_type: Option<PyType>,
    /// Exception class -> `Exsures` conditions
    pub declared_exceptions: IndexMap<ClassId, Vec<Expr>>,
    pub precondition: Vec<Expr>,
    pub postcondition: Vec<Expr>,
    pub try_blocks: Vec<TryBlockId>,
    pub loop_invariants: IndexMap<NodeId, Vec<Expr>>,
    /// Nearest same-named member in the superclass chain, resolved by `process`
    pub overrides: Option<MethodId>,
    /// Setter of a property getter
    pub setter: Option<MethodId>,
    /// Body with the leading contract statements removed
    pub body: Vec<Stmt>,
    /// Method-level type variables
    pub type_vars: IndexMap<String, PyType>,
    /// Extra dependencies of interface members
    pub requires: Vec<String>,
    pub pos: SourcePos,
}

impl Method {
    pub fn new(name: &str, module: ModuleId, cls: Option<ClassId>, kind: MethodKind, pos: SourcePos) -> Self {
        Self {
            name: name.to_string(),
            sil_name: String::new(),
            module,
            cls,
            kind,
            method_type: MethodType::Normal,
            contract_only: false,
            interface: false,
            args: IndexMap::new(),
            locals: IndexMap::new(),
            var_arg: None,
            kw_arg: None,
            defaults: vec![],
            return_type: None,
            declared_exceptions: IndexMap::new(),
            precondition: vec![],
            postcondition: vec![],
            try_blocks: vec![],
            loop_invariants: IndexMap::new(),
            overrides: None,
            setter: None,
            body: vec![],
            type_vars: IndexMap::new(),
            requires: vec![],
            pos,
        }
    }

    /// Translated as an IR function
    pub fn is_pure(&self) -> bool {
        matches!(self.kind, MethodKind::Pure | MethodKind::Property)
    }

    pub fn is_predicate(&self) -> bool {
        self.kind == MethodKind::Predicate
    }

    /// Whether calls pass a receiver as first argument
    pub fn has_receiver(&self) -> bool {
        self.cls.is_some() && self.method_type != MethodType::Static
    }

    pub fn declares_exceptions(&self) -> bool {
        !self.declared_exceptions.is_empty()
    }

    pub fn arg_ids(&self) -> impl Iterator<Item = VarId> + '_ {
        self.args.values().copied()
    }
}

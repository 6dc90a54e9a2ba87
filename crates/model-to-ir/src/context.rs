// Copyright (c) Asymptotic Labs
// SPDX-License-Identifier: Apache-2.0

//! Per-method translation state.
//!
//! A [`MethodContext`] is created for every emitted IR method, function or
//! predicate. It borrows the compilation's name registry, owns the declared IR
//! locals and a stack of [`Frame`]s: the bottom frame is the method being emitted, every
//! inlined statically bound call pushes one more.

use crate::type_domain::TypeDomainFactory;
use indexmap::IndexMap;
use itertools::Itertools;
use program_model::{
    ClassId, IdentifierRegistry, MethodId, Model, ModuleId, PyType, Result, SourcePos, TranslationError,
    TryBlockId, VarId, VarKind,
};
use std::collections::{BTreeSet, HashMap};
use verification_ir::{self as ir, LocalVar, Position, Type};

/// Default argument values per method, in the IR type of the argument
pub type Defaults = HashMap<MethodId, Vec<Option<ir::Expr>>>;

/// A translated expression together with its static source type
#[derive(Debug, Clone)]
pub struct Typed {
    pub expr: ir::Expr,
    pub typ: PyType,
}

impl Typed {
    pub fn new(expr: ir::Expr, typ: PyType) -> Self {
        Self { expr, typ }
    }
}

/// Phase of a protected region the translator is currently in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Body,
    Handler,
    Else,
    Finally,
}

/// Enclosing construct that intercepts non-local exits
#[derive(Debug, Clone)]
pub enum Region {
    Try { block: TryBlockId, phase: Phase },
    Loop { break_label: String, continue_label: String },
}

/// Non-local exit of a statement
#[derive(Debug, Clone)]
pub enum Exit {
    Return,
    /// In-flight exception and its static class
    Exception(ir::Expr, ClassId),
    Break,
    Continue,
}

impl Exit {
    /// Finally continuation code recorded when the exit passes a finally block
    pub fn finally_code(&self) -> i64 {
        match self {
            Exit::Return => 1,
            Exit::Exception(..) => 2,
            Exit::Break => 3,
            Exit::Continue => 4,
        }
    }
}

/// Translation scope of one source method body
#[derive(Debug, Clone)]
pub struct Frame {
    pub method: MethodId,
    pub module: ModuleId,
    pub cls: Option<ClassId>,
    /// Variables whose IR value is not their own local
    pub aliases: HashMap<VarId, ir::Expr>,
    /// Value of `Result()`
    pub result: Option<ir::Expr>,
    pub error: Option<LocalVar>,
    pub end_label: String,
    pub regions: Vec<Region>,
    /// Renamed labels of an inlined body; `None` keeps the analyzer's labels
    pub label_aliases: Option<HashMap<String, String>>,
    /// Runtime class assumed for the receiver (inherit checks)
    pub receiver_class: Option<ClassId>,
    /// Module-level declaration (IO operation, call slot): `method` names no scope
    pub module_level: bool,
}

impl Frame {
    pub fn new(model: &Model, method: MethodId) -> Self {
        let m = model.method(method);
        Self {
            method,
            module: m.module,
            cls: m.cls,
            aliases: HashMap::new(),
            result: None,
            error: None,
            end_label: "__end".to_string(),
            regions: vec![],
            label_aliases: None,
            receiver_class: None,
            module_level: false,
        }
    }
}

pub struct MethodContext<'a> {
    pub model: &'a Model,
    pub types: &'a mut TypeDomainFactory,
    pub defaults: &'a Defaults,
    pub names: &'a mut IdentifierRegistry,
    pub frames: Vec<Frame>,
    /// Declared IR locals of the emitted method
    pub locals: IndexMap<String, LocalVar>,
    /// Parameters and returns; never declared as locals
    pub params: BTreeSet<String>,
    /// Translating a function, predicate or contract: no statements may be produced
    pub pure: bool,
    pub is_main: bool,
    pub loop_depth: usize,
    /// Variables bound by enclosing `Forall`/`Exists` lambdas
    pub lambda_vars: Vec<(String, Typed)>,
    /// Iterator of the loop whose target is the given variable (for `Previous`)
    pub loop_iterators: HashMap<VarId, LocalVar>,
    /// Finally continuation codes actually used per protected region
    pub finally_codes: HashMap<TryBlockId, BTreeSet<i64>>,
    /// Methods currently inlined
    pub inline_stack: Vec<MethodId>,
    /// Static type of `RaisedException()` while translating an `Exsures` clause
    pub raised: Option<PyType>,
    /// Globals already given their value by `main`
    pub assigned_globals: BTreeSet<VarId>,
}

impl<'a> MethodContext<'a> {
    pub fn new(
        model: &'a Model,
        types: &'a mut TypeDomainFactory,
        defaults: &'a Defaults,
        names: &'a mut IdentifierRegistry,
        method: MethodId,
    ) -> Self {
        Self {
            model,
            types,
            defaults,
            names,
            frames: vec![Frame::new(model, method)],
            locals: IndexMap::new(),
            params: BTreeSet::new(),
            pure: false,
            is_main: false,
            loop_depth: 0,
            lambda_vars: vec![],
            loop_iterators: HashMap::new(),
            finally_codes: HashMap::new(),
            inline_stack: vec![],
            raised: None,
            assigned_globals: BTreeSet::new(),
        }
    }

    /// Context for a module-level declaration; names resolve in `module` only
    pub fn for_module(
        model: &'a Model,
        types: &'a mut TypeDomainFactory,
        defaults: &'a Defaults,
        names: &'a mut IdentifierRegistry,
        module: ModuleId,
    ) -> Self {
        let mut ctx = Self::new(model, types, defaults, names, MethodId::default());
        ctx.pure = true;
        let frame = ctx.frame_mut();
        frame.module = module;
        frame.cls = None;
        frame.module_level = true;
        ctx
    }

    pub fn frame(&self) -> &Frame {
        // the bottom frame is pushed by `new` and never popped
        &self.frames[self.frames.len() - 1]
    }

    pub fn frame_mut(&mut self) -> &mut Frame {
        let last = self.frames.len() - 1;
        &mut self.frames[last]
    }

    pub fn method(&self) -> MethodId {
        self.frame().method
    }

    pub fn module(&self) -> ModuleId {
        self.frame().module
    }

    // ------------------------------------------------------------------------
    // Positions
    // ------------------------------------------------------------------------

    fn module_path(&self) -> &str {
        let module = self.model.module(self.module());
        if module.path.is_empty() {
            &module.name
        } else {
            &module.path
        }
    }

    pub fn pos(&self, line: usize, col: usize) -> Position {
        Position::new(self.module_path(), line, col)
    }

    pub fn source_pos(&self, line: usize, col: usize) -> SourcePos {
        SourcePos::new(self.module_path(), line, col)
    }

    pub fn unsupported(&self, construct: impl Into<String>, line: usize, col: usize) -> TranslationError {
        TranslationError::unsupported(construct, Some(self.source_pos(line, col)))
    }

    pub fn invalid(&self, code: &str, message: impl Into<String>, line: usize, col: usize) -> TranslationError {
        TranslationError::invalid(code, message, Some(self.source_pos(line, col)))
    }

    // ------------------------------------------------------------------------
    // Locals and labels
    // ------------------------------------------------------------------------

    pub fn declare_local(&mut self, var: LocalVar) {
        if !self.params.contains(&var.name) && !self.locals.contains_key(&var.name) {
            self.locals.insert(var.name.clone(), var);
        }
    }

    pub fn fresh_local(&mut self, base: &str, typ: Type) -> LocalVar {
        let var = LocalVar::new(self.names.freshen(base), typ);
        self.declare_local(var.clone());
        var
    }

    pub fn fresh_label(&mut self, base: &str) -> String {
        self.names.freshen(base)
    }

    /// Label name of the current frame for a label chosen by the analyzer
    pub fn label(&mut self, name: &str) -> String {
        let existing = match &self.frame().label_aliases {
            None => return name.to_string(),
            Some(aliases) => aliases.get(name).cloned(),
        };
        if let Some(alias) = existing {
            return alias;
        }
        let fresh = self.names.freshen(name);
        if let Some(aliases) = &mut self.frame_mut().label_aliases {
            aliases.insert(name.to_string(), fresh.clone());
        }
        fresh
    }

    /// IR value of a source variable in the current frame
    pub fn var_expr(&mut self, var: VarId) -> ir::Expr {
        if let Some(alias) = self.frame().aliases.get(&var) {
            return alias.clone();
        }
        let v = self.model.var(var);
        let local = LocalVar::new(v.sil_name.clone(), ir_type(self.model, &v.typ));
        if v.kind != VarKind::Arg {
            self.declare_local(local.clone());
        }
        ir::Expr::Local(local)
    }

    /// IR local a source variable is assigned through
    pub fn var_local(&mut self, var: VarId) -> Option<LocalVar> {
        match self.var_expr(var) {
            ir::Expr::Local(local) => Some(local),
            _ => None,
        }
    }

    // ------------------------------------------------------------------------
    // Types
    // ------------------------------------------------------------------------

    pub fn ir_type(&self, typ: &PyType) -> Type {
        ir_type(self.model, typ)
    }

    pub fn builtin_type(&self, name: &str) -> PyType {
        builtin_type(self.model, name)
    }

    pub fn r#typeof(&self, expr: ir::Expr) -> ir::Expr {
        TypeDomainFactory::r#typeof(expr)
    }

    /// `issubtype(typeof(expr), literal)` style check of `expr` against `typ`
    pub fn type_check(&mut self, expr: ir::Expr, typ: &PyType) -> ir::Expr {
        let receiver = self.receiver_expr();
        self.types.type_check(self.model, expr, typ, receiver.as_ref())
    }

    pub fn type_literal(&mut self, typ: &PyType) -> ir::Expr {
        let receiver = self.receiver_expr();
        self.types.literal(self.model, typ, receiver.as_ref())
    }

    /// Receiver of the current frame's method, used to resolve class type variables
    pub fn receiver_expr(&mut self) -> Option<ir::Expr> {
        if self.frame().module_level {
            return None;
        }
        let method = self.model.method(self.method());
        if !method.has_receiver() {
            return None;
        }
        let first = method.args.values().next().copied()?;
        Some(self.var_expr(first))
    }
}

/// IR representation of values of a source type
pub fn ir_type(model: &Model, typ: &PyType) -> Type {
    if model.is_int(typ) {
        Type::Int
    } else if model.is_bool(typ) {
        Type::Bool
    } else if is_type_object(model, typ) {
        Type::domain(crate::type_domain::TYPE_DOMAIN)
    } else {
        Type::Ref
    }
}

/// `type[C]` values are represented by type-domain literals
pub fn is_type_object(model: &Model, typ: &PyType) -> bool {
    matches!(typ, PyType::Generic { cls, .. } | PyType::Class(cls) if model.is_builtin(*cls, "type"))
}

/// Module global that is not defined by exactly one top-level assignment; it
/// lives as a local of `main`
pub fn is_mutable_global(model: &Model, var: VarId) -> bool {
    let v = model.var(var);
    v.kind == VarKind::Global && (v.value.is_none() || v.writes.iter().unique().count() > 1)
}

pub fn builtin_type(model: &Model, name: &str) -> PyType {
    PyType::Class(model.builtin(name).unwrap_or_default())
}

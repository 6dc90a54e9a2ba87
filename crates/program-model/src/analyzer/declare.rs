// Copyright (c) Asymptotic Labs
// SPDX-License-Identifier: Apache-2.0

//! First phase: module-level declarations and member signatures.

use super::decorators::{classify, is_magic, ALLOWED_MAGIC_METHODS};
use super::names::LIBRARY_MODULES;
use super::types::{builtin_class, literal_type, resolve_type};
use super::Analyzer;
use crate::error::{Result, SourcePos, TranslationError};
use crate::model::{
    CallSlot, ClassId, Field, FieldId, IOOperation, Method, MethodId, MethodKind, MethodType,
    ModuleId, PyType, ScopeRef, VarId, VarKind,
};
use crate::syntax::{Arguments, Expr, ExprKind, SourceModule, Stmt, StmtKind};
use crate::type_expr::TypeExpr;
use indexmap::IndexMap;
use log::debug;

/// Name bound by `T = TypeVar('T', ...)`
fn type_var_decl(stmt: &Stmt) -> Option<(&str, &Expr)> {
    let StmtKind::Assign { targets, value } = &stmt.kind else {
        return None;
    };
    let [target] = targets.as_slice() else {
        return None;
    };
    match &value.kind {
        ExprKind::Call { func, .. } if func.dotted_name().as_deref() == Some("TypeVar") => {
            target.as_name().map(|name| (name, value))
        }
        _ => None,
    }
}

fn is_docstring(stmt: &Stmt) -> bool {
    matches!(&stmt.kind, StmtKind::Expr { value } if matches!(value.kind, ExprKind::Str { .. }))
}

/// Names bound by an assignment target
fn store_names(target: &Expr, names: &mut Vec<String>) {
    match &target.kind {
        ExprKind::Name { id } => names.push(id.clone()),
        ExprKind::Tuple { elts } | ExprKind::List { elts } => {
            elts.iter().for_each(|e| store_names(e, names))
        }
        ExprKind::Starred { value } => store_names(value, names),
        _ => {}
    }
}

impl<'a> Analyzer<'a> {
    pub(super) fn declare_module(&mut self, module: ModuleId, source: &SourceModule) -> Result<()> {
        let body = &source.body;
        for stmt in body {
            self.declare_import(module, stmt)?;
        }
        for stmt in body {
            if let StmtKind::ClassDef { name, .. } = &stmt.kind {
                self.declare_class_shell(module, name, stmt)?;
            }
        }
        for stmt in body {
            if let Some((name, call)) = type_var_decl(stmt) {
                self.declare_type_var(module, name, call)?;
            }
        }
        for stmt in body {
            if matches!(stmt.kind, StmtKind::ClassDef { .. }) {
                self.declare_class(module, stmt)?;
            }
        }
        for stmt in body {
            if matches!(stmt.kind, StmtKind::FunctionDef { .. }) {
                self.declare_function(module, None, stmt)?;
            }
        }

        let mut main_body = vec![];
        for (index, stmt) in body.iter().enumerate() {
            let skip = matches!(
                stmt.kind,
                StmtKind::ClassDef { .. }
                    | StmtKind::FunctionDef { .. }
                    | StmtKind::Import { .. }
                    | StmtKind::ImportFrom { .. }
            ) || type_var_decl(stmt).is_some()
                || (index == 0 && is_docstring(stmt));
            if skip {
                continue;
            }
            self.declare_globals(module, stmt)?;
            main_body.push(stmt.clone());
        }
        self.model.module_mut(module).body = main_body;
        Ok(())
    }

    fn declare_import(&mut self, module: ModuleId, stmt: &Stmt) -> Result<()> {
        let pos = self.pos(module, stmt.line, stmt.col);
        match &stmt.kind {
            StmtKind::Import { names } => {
                for alias in names {
                    if LIBRARY_MODULES.contains(&alias.name.as_str()) {
                        continue;
                    }
                    let target = self.find_module(&alias.name, &pos)?;
                    let local = alias.asname.clone().unwrap_or_else(|| alias.name.clone());
                    self.model.module_mut(module).namespaces.insert(local, target);
                }
            }
            StmtKind::ImportFrom { module: from, names } => {
                if LIBRARY_MODULES.contains(&from.as_str()) {
                    debug!("skipping library import from `{}`", from);
                    return Ok(());
                }
                let target = self.find_module(from, &pos)?;
                for alias in names {
                    if alias.name == "*" {
                        self.model.module_mut(module).from_imports.push(target);
                    } else {
                        let local = alias.asname.clone().unwrap_or_else(|| alias.name.clone());
                        self.model
                            .module_mut(module)
                            .imported_names
                            .insert(local, (target, alias.name.clone()));
                    }
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn find_module(&self, name: &str, pos: &SourcePos) -> Result<ModuleId> {
        self.model
            .modules
            .iter()
            .position(|m| m.name == name && !m.is_global)
            .map(ModuleId)
            .ok_or_else(|| {
                TranslationError::unsupported(format!("import of unknown module `{}`", name), Some(pos.clone()))
            })
    }

    fn declare_type_var(&mut self, module: ModuleId, name: &str, call: &Expr) -> Result<()> {
        let pos = self.pos(module, call.line, call.col);
        let object = builtin_class(&self.model, "object", Some(&pos))?;
        let ExprKind::Call { keywords, .. } = &call.kind else {
            return Ok(());
        };
        let bound = match keywords.iter().find(|k| k.arg.as_deref() == Some("bound")) {
            None => PyType::Class(object),
            Some(keyword) => {
                let typ = TypeExpr::from_annotation(&keyword.value).ok_or_else(|| {
                    TranslationError::unsupported("type variable bound", Some(pos.clone()))
                })?;
                resolve_type(&self.model, module, None, &typ, Some(&pos))?
            }
        };
        let var = PyType::TypeVar {
            name: name.to_string(),
            bound: Box::new(bound),
            class: None,
            index: 0,
        };
        self.model
            .module_mut(module)
            .type_vars
            .insert(name.to_string(), var);
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Classes
    // ------------------------------------------------------------------------

    fn declare_class_shell(&mut self, module: ModuleId, name: &str, stmt: &Stmt) -> Result<()> {
        let pos = self.pos(module, stmt.line, stmt.col);
        if self.model.module(module).classes.contains_key(name) {
            return Err(TranslationError::invalid(
                "multiple.definitions",
                format!("class `{}` is defined more than once", name),
                Some(pos),
            ));
        }
        let id = self.model.add_class(crate::model::Class {
            name: name.to_string(),
            module,
            pos,
            ..Default::default()
        });
        self.model
            .module_mut(module)
            .classes
            .insert(name.to_string(), id);
        Ok(())
    }

    fn declare_class(&mut self, module: ModuleId, stmt: &Stmt) -> Result<()> {
        let StmtKind::ClassDef { name, bases, body, .. } = &stmt.kind else {
            return Ok(());
        };
        let pos = self.pos(module, stmt.line, stmt.col);
        let cls = self.model.module(module).classes[name.as_str()];

        // `Generic[T, ...]` and type variables used in the base bind class type variables
        let mut real_bases = vec![];
        let mut type_var_names = vec![];
        for base in bases {
            match &base.kind {
                ExprKind::Subscript { value, slice } => {
                    let args: Vec<&Expr> = match &slice.kind {
                        ExprKind::Tuple { elts } => elts.iter().collect(),
                        _ => vec![slice.as_ref()],
                    };
                    for arg in args {
                        if let Some(n) = arg.as_name() {
                            if self.model.module(module).type_vars.contains_key(n) && !type_var_names.contains(&n) {
                                type_var_names.push(n);
                            }
                        }
                    }
                    if value.dotted_name().as_deref() != Some("Generic") {
                        real_bases.push(base);
                    }
                }
                _ => real_bases.push(base),
            }
        }
        for (index, var_name) in type_var_names.iter().enumerate() {
            let bound = match &self.model.module(module).type_vars[*var_name] {
                PyType::TypeVar { bound, .. } => bound.clone(),
                other => Box::new(other.clone()),
            };
            let var = PyType::TypeVar {
                name: var_name.to_string(),
                bound,
                class: Some(cls),
                index,
            };
            self.model
                .class_mut(cls)
                .type_vars
                .insert(var_name.to_string(), var);
        }

        if real_bases.len() > 1 {
            return Err(TranslationError::unsupported(
                format!("multiple inheritance in class `{}`", name),
                Some(pos),
            ));
        }
        let object = builtin_class(&self.model, "object", Some(&pos))?;
        let (superclass, superclass_args) = match real_bases.first() {
            None => (object, vec![]),
            Some(base) => {
                let typ = TypeExpr::from_annotation(base).ok_or_else(|| {
                    TranslationError::unsupported("base class expression", Some(pos.clone()))
                })?;
                match resolve_type(&self.model, module, Some(cls), &typ, Some(&pos))? {
                    PyType::Class(sup) => (sup, vec![]),
                    PyType::Generic { cls: sup, args, .. } => (sup, args),
                    _ => {
                        return Err(TranslationError::unsupported(
                            format!("base class `{}`", typ),
                            Some(pos),
                        ))
                    }
                }
            }
        };
        if self.model.superclass_chain(superclass).contains(&cls) {
            return Err(TranslationError::invalid(
                "cyclic.inheritance",
                format!("class `{}` inherits from itself", name),
                Some(pos),
            ));
        }
        {
            let class = self.model.class_mut(cls);
            class.superclass = Some(superclass);
            class.superclass_args = superclass_args;
            class.defined = true;
        }

        for member in body {
            let member_pos = self.pos(module, member.line, member.col);
            match &member.kind {
                StmtKind::FunctionDef { .. } => self.declare_function(module, Some(cls), member)?,
                StmtKind::AnnAssign {
                    target,
                    annotation,
                    value,
                } => {
                    let field = target.as_name().ok_or_else(|| {
                        TranslationError::unsupported("class attribute target", Some(member_pos.clone()))
                    })?;
                    let typ = self.class_attribute_type(module, cls, field, Some(annotation), value.as_ref(), &member_pos)?;
                    match value {
                        Some(value) => self.declare_static_field(cls, field, typ, value, &member_pos)?,
                        None => {
                            self.declare_field(cls, field, typ, &member_pos)?;
                        }
                    }
                }
                StmtKind::Assign { targets, value } => {
                    let [target] = targets.as_slice() else {
                        return Err(TranslationError::unsupported("multiple assignment targets", Some(member_pos)));
                    };
                    let field = target.as_name().ok_or_else(|| {
                        TranslationError::unsupported("class attribute target", Some(member_pos.clone()))
                    })?;
                    let typ = self.class_attribute_type(module, cls, field, None, Some(value), &member_pos)?;
                    self.declare_static_field(cls, field, typ, value, &member_pos)?;
                }
                StmtKind::Pass => {}
                _ if is_docstring(member) => {}
                _ => {
                    return Err(TranslationError::unsupported(
                        "statement in class body",
                        Some(member_pos),
                    ))
                }
            }
        }
        Ok(())
    }

    fn class_attribute_type(
        &self,
        module: ModuleId,
        cls: ClassId,
        name: &str,
        annotation: Option<&Expr>,
        value: Option<&Expr>,
        pos: &SourcePos,
    ) -> Result<PyType> {
        let path = self.model.scope_path(ScopeRef::Class(cls));
        if let Some((typ, _)) = self.table_type(module, Some(cls), &path, name, pos)? {
            return Ok(typ);
        }
        if let Some(annotation) = annotation {
            let typ = TypeExpr::from_annotation(annotation)
                .ok_or_else(|| TranslationError::unsupported("type annotation", Some(pos.clone())))?;
            return resolve_type(&self.model, module, Some(cls), &typ, Some(pos));
        }
        value
            .and_then(|v| literal_type(&self.model, module, v))
            .ok_or_else(|| {
                TranslationError::unsupported(format!("cannot determine type of `{}`", name), Some(pos.clone()))
            })
    }

    pub(super) fn declare_field(&mut self, cls: ClassId, name: &str, typ: PyType, pos: &SourcePos) -> Result<FieldId> {
        if let Some(existing) = self.model.class(cls).fields.get(name) {
            return Ok(*existing);
        }
        let id = self.model.add_field(Field {
            name: name.to_string(),
            sil_name: String::new(),
            cls,
            typ,
            inherited: None,
            reads: vec![],
            writes: vec![pos.clone()],
        });
        self.model.class_mut(cls).fields.insert(name.to_string(), id);
        Ok(id)
    }

    fn declare_static_field(&mut self, cls: ClassId, name: &str, typ: PyType, value: &Expr, pos: &SourcePos) -> Result<()> {
        if self.model.class(cls).static_fields.contains_key(name) {
            return Err(TranslationError::invalid(
                "multiple.definitions",
                format!("static field `{}` is defined more than once", name),
                Some(pos.clone()),
            ));
        }
        let var = self
            .model
            .add_var(name, typ, VarKind::StaticField, ScopeRef::Class(cls));
        let v = self.model.var_mut(var);
        v.value = Some(value.clone());
        v.writes.push(pos.clone());
        self.model
            .class_mut(cls)
            .static_fields
            .insert(name.to_string(), var);
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Functions and methods
    // ------------------------------------------------------------------------

    fn declare_function(&mut self, module: ModuleId, cls: Option<ClassId>, stmt: &Stmt) -> Result<()> {
        let StmtKind::FunctionDef {
            name,
            args,
            body,
            decorators,
            returns,
        } = &stmt.kind
        else {
            return Ok(());
        };
        let pos = self.pos(module, stmt.line, stmt.col);
        let classification = classify(decorators, &pos)?;
        if classification.call_slot_helper {
            return Err(TranslationError::unsupported(
                format!("`{}` outside of a call slot", name),
                Some(pos),
            ));
        }
        match classification.kind {
            MethodKind::IOOperation | MethodKind::CallSlot if cls.is_some() => {
                return Err(TranslationError::unsupported(
                    "IO operation or call slot inside a class",
                    Some(pos),
                ))
            }
            MethodKind::IOOperation => return self.declare_io_operation(module, name, args, body, &pos),
            MethodKind::CallSlot => return self.declare_call_slot(module, name, args, body, &pos),
            _ => {}
        }
        if cls.is_some() && is_magic(name) && !ALLOWED_MAGIC_METHODS.contains(&name.as_str()) {
            return Err(TranslationError::invalid(
                "illegal.magic.method",
                format!("magic method `{}` is not supported", name),
                Some(pos),
            ));
        }
        for stmt in body {
            let mut nested = None;
            stmt.walk(&mut |s| {
                if nested.is_none() && matches!(s.kind, StmtKind::FunctionDef { .. } | StmtKind::ClassDef { .. }) {
                    nested = Some(s);
                }
            });
            if let Some(nested) = nested {
                return Err(TranslationError::invalid(
                    "nested.function.declaration",
                    format!("nested definition inside `{}`", name),
                    Some(self.pos(module, nested.line, nested.col)),
                ));
            }
        }

        let existing = match cls {
            Some(c) => self.model.class(c).own_member(name),
            None => {
                let m = self.model.module(module);
                m.functions
                    .get(name.as_str())
                    .or_else(|| m.methods.get(name.as_str()))
                    .or_else(|| m.predicates.get(name.as_str()))
                    .copied()
            }
        };

        let mut method = Method::new(name, module, cls, classification.kind, pos.clone());
        method.method_type = classification.method_type;
        method.contract_only = classification.contract_only;
        let id = self.model.add_method(method);
        self.declare_args(id, args, &pos)?;
        self.declare_return_type(id, returns.as_ref(), &pos)?;
        self.split_contracts(id, body)?;

        if let Some(property) = &classification.setter_of {
            let getter = cls
                .and_then(|c| self.model.class(c).functions.get(property.as_str()).copied())
                .filter(|g| self.model.method(*g).kind == MethodKind::Property)
                .ok_or_else(|| {
                    TranslationError::invalid(
                        "invalid.setter",
                        format!("setter for unknown property `{}`", property),
                        Some(pos.clone()),
                    )
                })?;
            if self.model.method(getter).setter.is_some() {
                return Err(TranslationError::invalid(
                    "multiple.definitions",
                    format!("property `{}` has more than one setter", property),
                    Some(pos),
                ));
            }
            self.model.method_mut(getter).setter = Some(id);
            return Ok(());
        }
        if existing.is_some() {
            return Err(TranslationError::invalid(
                "multiple.definitions",
                format!("`{}` is defined more than once", name),
                Some(pos),
            ));
        }

        let kind = self.model.method(id).kind;
        match cls {
            Some(c) => {
                let class = self.model.class_mut(c);
                let map = match kind {
                    MethodKind::Pure | MethodKind::Property => &mut class.functions,
                    MethodKind::Predicate => &mut class.predicates,
                    MethodKind::Static => &mut class.static_methods,
                    _ => &mut class.methods,
                };
                map.insert(name.clone(), id);
            }
            None => {
                let m = self.model.module_mut(module);
                let map = match kind {
                    MethodKind::Pure | MethodKind::Property => &mut m.functions,
                    MethodKind::Predicate => &mut m.predicates,
                    _ => &mut m.methods,
                };
                map.insert(name.clone(), id);
            }
        }
        Ok(())
    }

    fn declare_args(&mut self, id: MethodId, args: &Arguments, pos: &SourcePos) -> Result<()> {
        let (module, cls, method_type) = {
            let m = self.model.method(id);
            (m.module, m.cls, m.method_type)
        };
        let path = self.model.scope_path(ScopeRef::Method(id));
        for (index, arg) in args.args.iter().enumerate() {
            let arg_pos = if arg.line > 0 {
                self.pos(module, arg.line, arg.col)
            } else {
                pos.clone()
            };
            let (typ, alts) = match self.table_type(module, cls, &path, &arg.name, &arg_pos)? {
                Some(found) => found,
                None => {
                    let typ = match (&arg.annotation, cls, index, method_type) {
                        (Some(annotation), _, _, _) => {
                            let typ = TypeExpr::from_annotation(annotation).ok_or_else(|| {
                                TranslationError::unsupported("type annotation", Some(arg_pos.clone()))
                            })?;
                            resolve_type(&self.model, module, cls, &typ, Some(&arg_pos))?
                        }
                        (None, Some(c), 0, MethodType::Normal) => self.model.class_type(c),
                        (None, Some(c), 0, MethodType::ClassMethod) => {
                            let type_class = builtin_class(&self.model, "type", Some(&arg_pos))?;
                            PyType::generic(type_class, vec![self.model.class_type(c)])
                        }
                        _ => {
                            return Err(TranslationError::unsupported(
                                format!("argument `{}` without a type", arg.name),
                                Some(arg_pos),
                            ))
                        }
                    };
                    (typ, Default::default())
                }
            };
            let var = self
                .model
                .add_var(&arg.name, typ, VarKind::Arg, ScopeRef::Method(id));
            self.model.var_mut(var).alt_types = alts;
            let method = self.model.method_mut(id);
            if method.args.insert(arg.name.clone(), var).is_some() {
                return Err(TranslationError::invalid(
                    "multiple.definitions",
                    format!("duplicate argument `{}`", arg.name),
                    Some(arg_pos),
                ));
            }
            method.defaults.push(args.default_for(index).cloned());
        }
        for (variadic, class_name) in [(&args.vararg, "tuple"), (&args.kwarg, "dict")] {
            let Some(arg) = variadic else { continue };
            let typ = match self.table_type(module, cls, &path, &arg.name, pos)? {
                Some((typ, _)) => typ,
                None => PyType::Class(builtin_class(&self.model, class_name, Some(pos))?),
            };
            let var = self
                .model
                .add_var(&arg.name, typ, VarKind::Arg, ScopeRef::Method(id));
            let method = self.model.method_mut(id);
            if class_name == "tuple" {
                method.var_arg = Some(var);
            } else {
                method.kw_arg = Some(var);
            }
        }
        Ok(())
    }

    fn declare_return_type(&mut self, id: MethodId, returns: Option<&Expr>, pos: &SourcePos) -> Result<()> {
        let (module, cls, kind) = {
            let m = self.model.method(id);
            (m.module, m.cls, m.kind)
        };
        let path = self.model.scope_path(ScopeRef::Method(id));
        let declared = match self.types.get_func_type(&path) {
            Some(typ) => Some(typ),
            None => match returns {
                Some(annotation) => Some(TypeExpr::from_annotation(annotation).ok_or_else(|| {
                    TranslationError::unsupported("return annotation", Some(pos.clone()))
                })?),
                None => None,
            },
        };
        let resolved = match declared {
            Some(typ) => Some(resolve_type(&self.model, module, cls, &typ, Some(pos))?),
            None => None,
        };
        let resolved = resolved.filter(|t| !self.model.is_none(t));
        let return_type = match (resolved, kind) {
            (None, MethodKind::Pure | MethodKind::Property) => {
                return Err(TranslationError::invalid(
                    "function.type.none",
                    format!("pure function `{}` must declare a return type", self.model.method(id).name),
                    Some(pos.clone()),
                ))
            }
            (None, MethodKind::Predicate) => Some(PyType::Class(builtin_class(&self.model, "bool", Some(pos))?)),
            (typ, _) => typ,
        };
        self.model.method_mut(id).return_type = return_type;
        Ok(())
    }

    /// Move leading `Requires`/`Ensures`/`Exsures` statements into the contract
    fn split_contracts(&mut self, id: MethodId, body: &[Stmt]) -> Result<()> {
        let module = self.model.method(id).module;
        let mut rest = vec![];
        let mut in_prefix = true;
        for (index, stmt) in body.iter().enumerate() {
            if in_prefix {
                if index == 0 && is_docstring(stmt) {
                    continue;
                }
                let pos = self.pos(module, stmt.line, stmt.col);
                match stmt.as_call() {
                    Some(("Requires", [cond])) => {
                        self.model.method_mut(id).precondition.push(cond.clone());
                        continue;
                    }
                    Some(("Ensures", [cond])) => {
                        self.model.method_mut(id).postcondition.push(cond.clone());
                        continue;
                    }
                    Some(("Exsures", [exception, cond])) => {
                        let name = exception.dotted_name().ok_or_else(|| {
                            TranslationError::unsupported("exception type in Exsures", Some(pos.clone()))
                        })?;
                        let exception = self.model.lookup_class(module, &name).ok_or_else(|| {
                            TranslationError::unsupported(format!("unknown exception `{}`", name), Some(pos.clone()))
                        })?;
                        self.model
                            .method_mut(id)
                            .declared_exceptions
                            .entry(exception)
                            .or_default()
                            .push(cond.clone());
                        continue;
                    }
                    Some(("Requires" | "Ensures" | "Exsures", _)) => {
                        return Err(TranslationError::unsupported("malformed contract", Some(pos)));
                    }
                    _ => in_prefix = false,
                }
            }
            rest.push(stmt.clone());
        }
        self.model.method_mut(id).body = rest;
        Ok(())
    }

    // ------------------------------------------------------------------------
    // IO operations and call slots
    // ------------------------------------------------------------------------

    /// Parameters of an IO operation or call slot, in declaration order
    fn declare_params(&mut self, module: ModuleId, owner: ScopeRef, args: &Arguments, pos: &SourcePos) -> Result<IndexMap<String, (VarId, Option<Expr>)>> {
        let path = self.model.scope_path(owner);
        let mut params = IndexMap::new();
        for (index, arg) in args.args.iter().enumerate() {
            let typ = match self.table_type(module, None, &path, &arg.name, pos)? {
                Some((typ, _)) => typ,
                None => {
                    let annotation = arg.annotation.as_ref().and_then(TypeExpr::from_annotation).ok_or_else(|| {
                        TranslationError::unsupported(format!("parameter `{}` without a type", arg.name), Some(pos.clone()))
                    })?;
                    resolve_type(&self.model, module, None, &annotation, Some(pos))?
                }
            };
            let var = self.model.add_var(&arg.name, typ, VarKind::Arg, owner);
            params.insert(arg.name.clone(), (var, args.default_for(index).cloned()));
        }
        Ok(params)
    }

    fn declare_io_operation(&mut self, module: ModuleId, name: &str, args: &Arguments, body: &[Stmt], pos: &SourcePos) -> Result<()> {
        if self.model.module(module).io_operations.contains_key(name) {
            return Err(TranslationError::invalid(
                "multiple.definitions",
                format!("IO operation `{}` is defined more than once", name),
                Some(pos.clone()),
            ));
        }
        let id = self.model.add_io_operation(IOOperation {
            name: name.to_string(),
            sil_name: String::new(),
            module,
            params: IndexMap::new(),
            results: IndexMap::new(),
            body: None,
            terminates: None,
            termination_measure: None,
            pos: pos.clone(),
        });
        let params = self.declare_params(module, ScopeRef::IoOperation(id), args, pos)?;
        let mut op_body = None;
        let mut terminates = None;
        let mut measure = None;
        for stmt in body {
            let stmt_pos = self.pos(module, stmt.line, stmt.col);
            match (&stmt.kind, stmt.as_call()) {
                (_, Some(("Terminates", [cond]))) => terminates = Some(cond.clone()),
                (_, Some(("TerminationMeasure", [value]))) => measure = Some(value.clone()),
                (StmtKind::Return { value: Some(value) }, _) => op_body = Some(value.clone()),
                (StmtKind::Pass, _) => {}
                _ if is_docstring(stmt) => {}
                _ => {
                    return Err(TranslationError::unsupported(
                        "statement in IO operation",
                        Some(stmt_pos),
                    ))
                }
            }
        }
        let op = &mut self.model.io_operations[id.0];
        for (param, (var, default)) in params {
            let is_result = matches!(&default, Some(d) if d.as_named_call().map(|(n, _)| n) == Some("Result"));
            if is_result {
                op.results.insert(param, var);
            } else {
                op.params.insert(param, var);
            }
        }
        op.body = op_body;
        op.terminates = terminates;
        op.termination_measure = measure;
        self.model
            .module_mut(module)
            .io_operations
            .insert(name.to_string(), id);
        Ok(())
    }

    fn declare_call_slot(&mut self, module: ModuleId, name: &str, args: &Arguments, body: &[Stmt], pos: &SourcePos) -> Result<()> {
        if self.model.module(module).call_slots.contains_key(name) {
            return Err(TranslationError::invalid(
                "multiple.definitions",
                format!("call slot `{}` is defined more than once", name),
                Some(pos.clone()),
            ));
        }
        let id = self.model.add_call_slot(CallSlot {
            name: name.to_string(),
            sil_name: String::new(),
            module,
            args: IndexMap::new(),
            uq_vars: IndexMap::new(),
            precondition: vec![],
            postcondition: vec![],
            pos: pos.clone(),
        });
        let owner = ScopeRef::CallSlot(id);
        let params = self.declare_params(module, owner, args, pos)?;
        let mut uq_vars = IndexMap::new();
        let mut pre = vec![];
        let mut post = vec![];
        let mut pending: Vec<&Stmt> = body.iter().collect();
        while !pending.is_empty() {
            let stmt = pending.remove(0);
            let stmt_pos = self.pos(module, stmt.line, stmt.col);
            match (&stmt.kind, stmt.as_call()) {
                (_, Some(("Requires", [cond]))) => pre.push(cond.clone()),
                (_, Some(("Ensures", [cond]))) => post.push(cond.clone()),
                (StmtKind::FunctionDef { args, body, decorators, .. }, _) => {
                    let classification = classify(decorators, &stmt_pos)?;
                    if !classification.call_slot_helper || !uq_vars.is_empty() {
                        return Err(TranslationError::unsupported("nested definition in call slot", Some(stmt_pos)));
                    }
                    let vars = self.declare_params(module, owner, args, &stmt_pos)?;
                    uq_vars.extend(vars.into_iter().map(|(n, (v, _))| (n, v)));
                    let mut nested: Vec<&Stmt> = body.iter().collect();
                    nested.append(&mut pending);
                    pending = nested;
                }
                // the slot's call itself only fixes the callee shape
                (StmtKind::Expr { .. }, _) | (StmtKind::Pass, _) => {}
                _ => {
                    return Err(TranslationError::unsupported(
                        "statement in call slot",
                        Some(stmt_pos),
                    ))
                }
            }
        }
        let slot = &mut self.model.call_slots[id.0];
        slot.args = params.into_iter().map(|(n, (v, _))| (n, v)).collect();
        slot.uq_vars = uq_vars;
        slot.precondition = pre;
        slot.postcondition = post;
        self.model
            .module_mut(module)
            .call_slots
            .insert(name.to_string(), id);
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Module globals
    // ------------------------------------------------------------------------

    fn declare_globals(&mut self, module: ModuleId, stmt: &Stmt) -> Result<()> {
        // (name, defining value, annotation, position, assigned by `stmt` itself)
        let mut found: Vec<(String, Option<Expr>, Option<Expr>, (usize, usize), bool)> = vec![];
        stmt.walk(&mut |s| {
            let top_level = std::ptr::eq(s, stmt);
            match &s.kind {
                StmtKind::Assign { targets, value } => {
                    for target in targets {
                        let direct = targets.len() == 1 && target.as_name().is_some();
                        let mut names = vec![];
                        store_names(target, &mut names);
                        for name in names {
                            let value = direct.then(|| value.clone());
                            found.push((name, value, None, (s.line, s.col), top_level));
                        }
                    }
                }
                StmtKind::AnnAssign {
                    target,
                    annotation,
                    value,
                } => {
                    if let Some(name) = target.as_name() {
                        let annotation = Some(annotation.clone());
                        found.push((name.to_string(), value.clone(), annotation, (s.line, s.col), top_level));
                    }
                }
                StmtKind::For { target, .. } => {
                    let mut names = vec![];
                    store_names(target, &mut names);
                    for name in names {
                        found.push((name, None, None, (s.line, s.col), false));
                    }
                }
                _ => {}
            }
        });
        let path = self.model.scope_path(ScopeRef::Module(module));
        for (name, value, annotation, (line, col), top_level) in found {
            let pos = self.pos(module, line, col);
            if let Some(existing) = self.model.module(module).global_vars.get(&name) {
                self.model.var_mut(*existing).writes.push(pos);
                continue;
            }
            let typ = match self.table_type(module, None, &path, &name, &pos)? {
                Some((typ, _)) => typ,
                None => match annotation.as_ref().and_then(TypeExpr::from_annotation) {
                    Some(annotation) => resolve_type(&self.model, module, None, &annotation, Some(&pos))?,
                    None => value
                        .as_ref()
                        .and_then(|v| literal_type(&self.model, module, v))
                        .ok_or_else(|| {
                            TranslationError::unsupported(
                                format!("cannot determine type of global `{}`", name),
                                Some(pos.clone()),
                            )
                        })?,
                },
            };
            let var = self
                .model
                .add_var(&name, typ, VarKind::Global, ScopeRef::Module(module));
            let v = self.model.var_mut(var);
            v.writes.push(pos);
            if top_level {
                v.value = value;
            }
            self.model
                .module_mut(module)
                .global_vars
                .insert(name, var);
        }
        Ok(())
    }
}

// Copyright (c) Asymptotic Labs
// SPDX-License-Identifier: Apache-2.0

//! Second phase: method bodies.

use super::names::{resolve_name, Binding, CONTRACT_STATEMENTS};
use super::types::{builtin_class, literal_type, resolve_type};
use super::Analyzer;
use crate::error::{Result, SourcePos, TranslationError};
use crate::model::{
    ClassId, ExceptionHandler, Method, MethodId, MethodKind, MethodType, ModuleId, PyType,
    ScopeRef, TryBlock, VarId, VarKind, WithContext,
};
use crate::syntax::{Expr, ExprKind, Stmt, StmtKind};
use crate::type_expr::TypeExpr;
use itertools::Itertools;
use std::collections::BTreeSet;

/// Walk state for one method body
struct BodyContext {
    method: MethodId,
    module: ModuleId,
    cls: Option<ClassId>,
    path: Vec<String>,
    /// Names declared `global`
    globals: BTreeSet<String>,
    /// Inside a `finally` body and not inside a loop nested in it
    in_finally: bool,
    /// Names bound by enclosing lambdas
    bound: Vec<String>,
    is_main: bool,
}

impl<'a> Analyzer<'a> {
    pub(super) fn analyze_module_bodies(&mut self, module: ModuleId) -> Result<()> {
        let classes = self.model.module(module).classes.values().copied().collect_vec();
        for cls in classes {
            let members = self.model.class(cls).all_members().collect_vec();
            for member in members {
                self.analyze_method(member, false)?;
                if let Some(setter) = self.model.method(member).setter {
                    self.analyze_method(setter, false)?;
                }
            }
        }
        let m = self.model.module(module);
        let functions = m
            .functions
            .values()
            .chain(m.methods.values())
            .chain(m.predicates.values())
            .copied()
            .collect_vec();
        for function in functions {
            self.analyze_method(function, false)?;
        }

        let body = self.model.module(module).body.clone();
        if self.model.main_modules.contains(&module) && !body.is_empty() {
            let pos = self.pos(module, body[0].line, body[0].col);
            let mut main = Method::new("main", module, None, MethodKind::Normal, pos);
            main.body = body;
            let id = self.model.add_method(main);
            self.model.module_mut(module).main = Some(id);
            self.analyze_method(id, true)?;
        }
        Ok(())
    }

    fn analyze_method(&mut self, id: MethodId, is_main: bool) -> Result<()> {
        let (module, cls, body) = {
            let m = self.model.method(id);
            (m.module, m.cls, m.body.clone())
        };
        let mut ctx = BodyContext {
            method: id,
            module,
            cls,
            path: self.model.scope_path(ScopeRef::Method(id)),
            globals: BTreeSet::new(),
            in_finally: false,
            bound: vec![],
            is_main,
        };
        let (pre, post, exsures) = {
            let m = self.model.method(id);
            let exsures = m.declared_exceptions.values().flatten().cloned().collect_vec();
            (m.precondition.clone(), m.postcondition.clone(), exsures)
        };
        for cond in pre.iter().chain(post.iter()).chain(exsures.iter()) {
            self.check_expr(&mut ctx, cond)?;
        }
        for default in self.model.method(id).defaults.clone().iter().flatten() {
            self.check_expr(&mut ctx, default)?;
        }
        self.analyze_block(&mut ctx, &body)
    }

    fn analyze_block(&mut self, ctx: &mut BodyContext, stmts: &[Stmt]) -> Result<()> {
        for stmt in stmts {
            self.analyze_stmt(ctx, stmt)?;
        }
        Ok(())
    }

    /// Record leading `Invariant(...)` statements of a loop body; returns the rest
    fn split_invariants<'b>(&mut self, ctx: &mut BodyContext, node: usize, body: &'b [Stmt]) -> Result<&'b [Stmt]> {
        let count = body
            .iter()
            .take_while(|s| matches!(s.as_call(), Some(("Invariant", _))))
            .count();
        let mut invariants = vec![];
        for stmt in &body[..count] {
            let Some((_, [cond])) = stmt.as_call() else {
                let pos = self.pos(ctx.module, stmt.line, stmt.col);
                return Err(TranslationError::unsupported("malformed invariant", Some(pos)));
            };
            self.check_expr(ctx, cond)?;
            invariants.push(cond.clone());
        }
        self.model
            .method_mut(ctx.method)
            .loop_invariants
            .insert(node, invariants);
        Ok(&body[count..])
    }

    fn analyze_stmt(&mut self, ctx: &mut BodyContext, stmt: &Stmt) -> Result<()> {
        let pos = self.pos(ctx.module, stmt.line, stmt.col);
        match &stmt.kind {
            StmtKind::FunctionDef { .. } => Err(TranslationError::invalid(
                "nested.function.declaration",
                "functions may only be declared at module or class level",
                Some(pos),
            )),
            StmtKind::ClassDef { .. } => Err(TranslationError::unsupported("nested class", Some(pos))),
            StmtKind::Import { .. } | StmtKind::ImportFrom { .. } => {
                Err(TranslationError::unsupported("import inside a function", Some(pos)))
            }
            StmtKind::Global { names } => {
                for name in names {
                    if self.model.lookup_global_var(ctx.module, name).is_none() {
                        return Err(TranslationError::unsupported(
                            format!("unknown global `{}`", name),
                            Some(pos),
                        ));
                    }
                    ctx.globals.insert(name.clone());
                }
                Ok(())
            }
            StmtKind::Assign { targets, value } => {
                self.check_expr(ctx, value)?;
                for target in targets {
                    self.bind_target(ctx, target, Some(value), None, &pos)?;
                }
                Ok(())
            }
            StmtKind::AnnAssign {
                target,
                annotation,
                value,
            } => {
                if let Some(value) = value {
                    self.check_expr(ctx, value)?;
                }
                let annotation = TypeExpr::from_annotation(annotation)
                    .ok_or_else(|| TranslationError::unsupported("type annotation", Some(pos.clone())))?;
                let typ = resolve_type(&self.model, ctx.module, ctx.cls, &annotation, Some(&pos))?;
                self.bind_target(ctx, target, value.as_ref(), Some(typ), &pos)
            }
            StmtKind::AugAssign { target, value, .. } => {
                self.check_expr(ctx, value)?;
                self.check_expr(ctx, target)?;
                self.bind_target(ctx, target, None, None, &pos)
            }
            StmtKind::Expr { value } => {
                if let Some((name, _)) = value.as_named_call() {
                    if CONTRACT_STATEMENTS.contains(&name) {
                        return Err(TranslationError::invalid(
                            "invalid.contract.position",
                            format!("`{}` is only allowed at the start of a body", name),
                            Some(pos),
                        ));
                    }
                }
                self.check_expr(ctx, value)
            }
            StmtKind::If { test, body, orelse } => {
                self.check_expr(ctx, test)?;
                self.analyze_block(ctx, body)?;
                self.analyze_block(ctx, orelse)
            }
            StmtKind::While { test, body, orelse } => {
                if !orelse.is_empty() {
                    return Err(TranslationError::unsupported("else block of a loop", Some(pos)));
                }
                self.check_expr(ctx, test)?;
                let rest = self.split_invariants(ctx, stmt.id, body)?;
                self.analyze_loop_body(ctx, rest)
            }
            StmtKind::For {
                target,
                iter,
                body,
                orelse,
            } => {
                if !orelse.is_empty() {
                    return Err(TranslationError::unsupported("else block of a loop", Some(pos)));
                }
                self.check_expr(ctx, iter)?;
                let element = self.element_type(ctx, iter);
                self.bind_target(ctx, target, None, element, &pos)?;
                let rest = self.split_invariants(ctx, stmt.id, body)?;
                self.analyze_loop_body(ctx, rest)
            }
            StmtKind::Try {
                body,
                handlers,
                orelse,
                finalbody,
            } => {
                if handlers.is_empty() && finalbody.is_empty() {
                    return Err(TranslationError::unsupported("try without handlers", Some(pos)));
                }
                self.declare_try(ctx, stmt, &pos)?;
                self.analyze_block(ctx, body)?;
                for handler in handlers {
                    self.analyze_block(ctx, &handler.body)?;
                }
                self.analyze_block(ctx, orelse)?;
                let was_in_finally = std::mem::replace(&mut ctx.in_finally, true);
                self.analyze_block(ctx, finalbody)?;
                ctx.in_finally = was_in_finally;
                Ok(())
            }
            StmtKind::With { items, body } => {
                let [item] = items.as_slice() else {
                    return Err(TranslationError::unsupported("with statement with several items", Some(pos)));
                };
                self.check_expr(ctx, &item.context_expr)?;
                self.declare_with(ctx, stmt, &pos)?;
                self.analyze_block(ctx, body)
            }
            StmtKind::Raise { exc } => match exc {
                Some(exc) => self.check_expr(ctx, exc),
                None => Err(TranslationError::unsupported("re-raise without an exception", Some(pos))),
            },
            StmtKind::Return { value } => match value {
                Some(value) => self.check_expr(ctx, value),
                None => Ok(()),
            },
            StmtKind::Continue if ctx.in_finally => Err(TranslationError::invalid(
                "continue.in.finally",
                "`continue` is not allowed inside a finally block",
                Some(pos),
            )),
            StmtKind::Break | StmtKind::Continue | StmtKind::Pass => Ok(()),
            StmtKind::Assert { test, .. } => self.check_expr(ctx, test),
        }
    }

    fn analyze_loop_body(&mut self, ctx: &mut BodyContext, body: &[Stmt]) -> Result<()> {
        let was_in_finally = std::mem::replace(&mut ctx.in_finally, false);
        let result = self.analyze_block(ctx, body);
        ctx.in_finally = was_in_finally;
        result
    }

    /// Element type of an iterable, for loop targets without a table entry
    fn element_type(&self, ctx: &BodyContext, iter: &Expr) -> Option<PyType> {
        let typ = match &iter.kind {
            ExprKind::Name { id } => match resolve_name(&self.model, ctx.module, Some(ctx.method), id)? {
                Binding::Var(var) => self.model.var(var).typ.clone(),
                _ => return None,
            },
            _ => literal_type(&self.model, ctx.module, iter)?,
        };
        if self.model.is_builtin(typ.cls(&self.model), "range") {
            return self.model.builtin("int").map(PyType::Class);
        }
        typ.type_args().first().cloned()
    }

    // ------------------------------------------------------------------------
    // Binding
    // ------------------------------------------------------------------------

    fn bind_target(
        &mut self,
        ctx: &mut BodyContext,
        target: &Expr,
        value: Option<&Expr>,
        typ: Option<PyType>,
        pos: &SourcePos,
    ) -> Result<()> {
        match &target.kind {
            ExprKind::Name { id } => self.bind_name(ctx, id, target, value, typ, pos).map(|_| ()),
            ExprKind::Tuple { elts } | ExprKind::List { elts } => {
                if elts.iter().filter(|e| matches!(e.kind, ExprKind::Starred { .. })).count() > 1 {
                    return Err(TranslationError::unsupported("several starred targets", Some(pos.clone())));
                }
                let values = match value.map(|v| &v.kind) {
                    Some(ExprKind::Tuple { elts: values }) if values.len() == elts.len() => Some(values),
                    _ => None,
                };
                for (index, elt) in elts.iter().enumerate() {
                    let element_value = values.map(|v| &v[index]);
                    let element_type = typ.as_ref().and_then(|t| t.type_args().get(index).cloned());
                    self.bind_target(ctx, elt, element_value, element_type, pos)?;
                }
                Ok(())
            }
            ExprKind::Starred { value: inner } => {
                let list = match &typ {
                    Some(t) => Some(PyType::generic(builtin_class(&self.model, "list", Some(pos))?, vec![t.clone()])),
                    None => None,
                };
                self.bind_target(ctx, inner, None, list, pos)
            }
            ExprKind::Attribute { value: receiver, attr } => {
                self.check_expr(ctx, receiver)?;
                if self.is_self(ctx, receiver) {
                    if let Some(cls) = ctx.cls {
                        if self.model.get_field(cls, attr).is_none() {
                            let field_type = self.field_type(ctx, cls, attr, value, typ, pos)?;
                            self.declare_field(cls, attr, field_type, pos)?;
                        }
                    }
                }
                if let Some(cls) = ctx.cls {
                    if let Some(field) = self.model.get_field(cls, attr) {
                        self.model.field_mut(field).writes.push(pos.clone());
                    }
                }
                Ok(())
            }
            ExprKind::Subscript { value: container, slice } => {
                self.check_expr(ctx, container)?;
                self.check_expr(ctx, slice)
            }
            _ => Err(TranslationError::unsupported("assignment target", Some(pos.clone()))),
        }
    }

    /// Whether `expr` is the receiver argument of the current method
    fn is_self(&self, ctx: &BodyContext, expr: &Expr) -> bool {
        let method = self.model.method(ctx.method);
        if ctx.cls.is_none() || method.method_type != MethodType::Normal {
            return false;
        }
        match (expr.as_name(), method.args.first()) {
            (Some(name), Some((first, _))) => name == first,
            _ => false,
        }
    }

    fn field_type(
        &self,
        ctx: &BodyContext,
        cls: ClassId,
        name: &str,
        value: Option<&Expr>,
        typ: Option<PyType>,
        pos: &SourcePos,
    ) -> Result<PyType> {
        let class_path = self.model.scope_path(ScopeRef::Class(cls));
        if let Some((found, _)) = self.table_type(ctx.module, Some(cls), &class_path, name, pos)? {
            return Ok(found);
        }
        if let Some(typ) = typ {
            return Ok(typ);
        }
        let from_value = value.and_then(|v| match &v.kind {
            ExprKind::Name { id } => match resolve_name(&self.model, ctx.module, Some(ctx.method), id) {
                Some(Binding::Var(var)) => Some(self.model.var(var).typ.clone()),
                _ => None,
            },
            _ => literal_type(&self.model, ctx.module, v),
        });
        from_value.ok_or_else(|| {
            TranslationError::unsupported(format!("cannot determine type of field `{}`", name), Some(pos.clone()))
        })
    }

    fn bind_name(
        &mut self,
        ctx: &mut BodyContext,
        name: &str,
        target: &Expr,
        value: Option<&Expr>,
        typ: Option<PyType>,
        pos: &SourcePos,
    ) -> Result<VarId> {
        let global = (ctx.is_main || ctx.globals.contains(name))
            .then(|| self.model.lookup_global_var(ctx.module, name))
            .flatten();
        let existing = {
            let m = self.model.method(ctx.method);
            m.args.get(name).or_else(|| m.locals.get(name)).copied()
        };
        if let Some(var) = existing.or(global) {
            self.model.var_mut(var).writes.push(pos.clone());
            return Ok(var);
        }

        let (typ, alts) = match self.table_type(ctx.module, ctx.cls, &ctx.path, name, pos)? {
            Some(found) => found,
            None => {
                let typ = typ
                    .or_else(|| value.and_then(|v| literal_type(&self.model, ctx.module, v)))
                    .ok_or_else(|| {
                        TranslationError::unsupported(
                            format!("cannot determine type of `{}`", name),
                            Some(self.pos(ctx.module, target.line, target.col)),
                        )
                    })?;
                (typ, Default::default())
            }
        };
        let var = self
            .model
            .add_var(name, typ, VarKind::Local, ScopeRef::Method(ctx.method));
        let v = self.model.var_mut(var);
        v.alt_types = alts;
        v.writes.push(pos.clone());
        self.model
            .method_mut(ctx.method)
            .locals
            .insert(name.to_string(), var);
        Ok(var)
    }

    // ------------------------------------------------------------------------
    // Try and with blocks
    // ------------------------------------------------------------------------

    fn synthetic_var(&mut self, ctx: &BodyContext, name: &str, typ: PyType, kind: VarKind) -> VarId {
        self.model
            .add_var(name, typ, kind, ScopeRef::Method(ctx.method))
    }

    fn declare_try(&mut self, ctx: &mut BodyContext, stmt: &Stmt, pos: &SourcePos) -> Result<()> {
        let StmtKind::Try {
            body,
            handlers,
            orelse,
            finalbody,
        } = &stmt.kind
        else {
            return Ok(());
        };
        let exception = builtin_class(&self.model, "Exception", Some(pos))?;
        let int = builtin_class(&self.model, "int", Some(pos))?;
        let error_var = self.synthetic_var(ctx, "error", PyType::Class(exception), VarKind::TryError);
        let finally_var = self.synthetic_var(ctx, "finally_code", PyType::Class(int), VarKind::FinallyCode);

        let mut model_handlers = vec![];
        for handler in handlers {
            let handler_pos = self.pos(ctx.module, handler.line, handler.col);
            let class = match &handler.typ {
                None => exception,
                Some(typ) => {
                    let name = typ.dotted_name().ok_or_else(|| {
                        TranslationError::unsupported("handler for several exception types", Some(handler_pos.clone()))
                    })?;
                    self.model.lookup_class(ctx.module, &name).ok_or_else(|| {
                        TranslationError::unsupported(format!("unknown exception `{}`", name), Some(handler_pos.clone()))
                    })?
                }
            };
            if !self.model.issubtype(class, exception) {
                return Err(TranslationError::invalid(
                    "invalid.handler",
                    format!("`{}` is not an exception class", self.model.class(class).name),
                    Some(handler_pos),
                ));
            }
            let var = match &handler.name {
                Some(name) => {
                    let target = Expr::new(ExprKind::Name { id: name.clone() }, handler.line, handler.col);
                    let typ = Some(self.model.class_type(class));
                    Some(self.bind_name(ctx, name, &target, None, typ, &handler_pos)?)
                }
                None => None,
            };
            model_handlers.push(ExceptionHandler {
                exception: class,
                body: handler.body.clone(),
                var,
                label: String::new(),
                pos: handler_pos,
            });
        }

        let block = TryBlock {
            node: stmt.id,
            method: ctx.method,
            body: body.clone(),
            handlers: model_handlers,
            else_body: (!orelse.is_empty()).then(|| orelse.clone()),
            finally_body: (!finalbody.is_empty()).then(|| finalbody.clone()),
            error_var,
            finally_var,
            try_name: String::new(),
            post_name: String::new(),
            else_name: String::new(),
            finally_name: String::new(),
            with_context: None,
            pos: pos.clone(),
        };
        let id = self.model.add_try_block(block);
        self.model.method_mut(ctx.method).try_blocks.push(id);
        Ok(())
    }

    fn declare_with(&mut self, ctx: &mut BodyContext, stmt: &Stmt, pos: &SourcePos) -> Result<()> {
        let StmtKind::With { items, body } = &stmt.kind else {
            return Ok(());
        };
        let [item] = items.as_slice() else {
            return Ok(());
        };
        let manager_type = match &item.context_expr.kind {
            ExprKind::Name { id } => match resolve_name(&self.model, ctx.module, Some(ctx.method), id) {
                Some(Binding::Var(var)) => Some(self.model.var(var).typ.clone()),
                _ => None,
            },
            _ => literal_type(&self.model, ctx.module, &item.context_expr),
        }
        .ok_or_else(|| TranslationError::unsupported("context manager of unknown type", Some(pos.clone())))?;
        let manager_class = manager_type.cls(&self.model);
        for required in ["__enter__", "__exit__"] {
            if self.model.get_member(manager_class, required).is_none() {
                return Err(TranslationError::unsupported(
                    format!("context manager without `{}`", required),
                    Some(pos.clone()),
                ));
            }
        }
        let exception = builtin_class(&self.model, "Exception", Some(pos))?;
        let int = builtin_class(&self.model, "int", Some(pos))?;
        let error_var = self.synthetic_var(ctx, "error", PyType::Class(exception), VarKind::TryError);
        let finally_var = self.synthetic_var(ctx, "finally_code", PyType::Class(int), VarKind::FinallyCode);
        let manager_var = self.synthetic_var(ctx, "with_manager", manager_type, VarKind::Local);

        if let Some(target) = &item.optional_vars {
            let enter_type = self
                .model
                .get_member(manager_class, "__enter__")
                .and_then(|m| self.model.method(m).return_type.clone());
            self.bind_target(ctx, target, None, enter_type, pos)?;
        }

        let block = TryBlock {
            node: stmt.id,
            method: ctx.method,
            body: body.clone(),
            handlers: vec![],
            else_body: None,
            finally_body: None,
            error_var,
            finally_var,
            try_name: String::new(),
            post_name: String::new(),
            else_name: String::new(),
            finally_name: String::new(),
            with_context: Some(WithContext {
                context_expr: item.context_expr.clone(),
                manager_var,
                target: item.optional_vars.clone(),
            }),
            pos: pos.clone(),
        };
        let id = self.model.add_try_block(block);
        self.model.method_mut(ctx.method).try_blocks.push(id);
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Name references
    // ------------------------------------------------------------------------

    /// Check that every name read by `expr` is bound; records read sites
    fn check_expr(&mut self, ctx: &mut BodyContext, expr: &Expr) -> Result<()> {
        match &expr.kind {
            ExprKind::Name { id } => {
                if ctx.bound.contains(id) {
                    return Ok(());
                }
                let pos = self.pos(ctx.module, expr.line, expr.col);
                let scope = (!ctx.is_main).then_some(ctx.method);
                let binding = resolve_name(&self.model, ctx.module, scope, id)
                    .or_else(|| resolve_name(&self.model, ctx.module, Some(ctx.method), id));
                match binding {
                    Some(Binding::Var(var)) => {
                        self.model.var_mut(var).reads.push(pos);
                        Ok(())
                    }
                    Some(_) => Ok(()),
                    None => Err(TranslationError::unsupported(
                        format!("undefined name `{}`", id),
                        Some(pos),
                    )),
                }
            }
            ExprKind::Call { func, args, keywords } => {
                let callee = func.as_name().unwrap_or_default();
                // type positions
                let skip_first = matches!(callee, "cast" | "Forall" | "Exists");
                let only_first = callee == "isinstance";
                self.check_expr(ctx, func)?;
                for (index, arg) in args.iter().enumerate() {
                    if (skip_first && index == 0) || (only_first && index > 0) {
                        continue;
                    }
                    self.check_expr(ctx, arg)?;
                }
                for keyword in keywords {
                    self.check_expr(ctx, &keyword.value)?;
                }
                Ok(())
            }
            ExprKind::Lambda { args, body } => {
                let depth = ctx.bound.len();
                ctx.bound.extend(args.iter().cloned());
                let result = self.check_expr(ctx, body);
                ctx.bound.truncate(depth);
                result
            }
            ExprKind::Attribute { value, attr } => {
                self.check_expr(ctx, value)?;
                if let Some(cls) = ctx.cls.filter(|_| self.is_self(ctx, value)) {
                    if let Some(field) = self.model.get_field(cls, attr) {
                        let pos = self.pos(ctx.module, expr.line, expr.col);
                        self.model.field_mut(field).reads.push(pos);
                    }
                }
                Ok(())
            }
            _ => {
                for child in expr.children() {
                    self.check_expr(ctx, child)?;
                }
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::analyzer::tests::analyze_json;
    use crate::model::VarKind;

    fn module_with(body: &str) -> String {
        format!(r#"{{ "modules": [{{ "name": "m", "path": "m.py", "body": [{}] }}] }}"#, body)
    }

    const INT_ARG: &str = r#"{ "name": "x", "annotation": { "kind": "Name", "id": "int" } }"#;

    fn function(name: &str, body: &str) -> String {
        format!(
            r#"{{ "kind": "FunctionDef", "name": "{}", "line": 1, "args": {{ "args": [{}] }}, "body": [{}] }}"#,
            name, INT_ARG, body
        )
    }

    #[test]
    fn test_locals_and_try_blocks() {
        let json = module_with(&function(
            "f",
            r#"
            { "kind": "Assign", "line": 2, "targets": [{ "kind": "Name", "id": "y" }], "value": { "kind": "Name", "id": "x" } },
            { "kind": "Try", "line": 3,
              "body": [{ "kind": "Raise", "exc": { "kind": "Call", "func": { "kind": "Name", "id": "ValueError" } } }],
              "handlers": [{ "type": { "kind": "Name", "id": "ValueError" }, "name": "e", "body": [{ "kind": "Pass" }] }] }
            "#,
        ));
        let json = json.replace(
            r#""value": { "kind": "Name", "id": "x" }"#,
            r#""value": { "kind": "Int", "value": 3 }"#,
        );
        let model = analyze_json(&json).unwrap();
        let m = model.module(crate::model::ModuleId(1));
        let f = model.method(m.methods["f"]);
        assert_eq!(f.locals.len(), 2);
        let y = model.var(f.locals["y"]);
        assert_eq!(y.kind, VarKind::Local);
        assert_eq!(y.typ.display(&model), "int");
        assert_eq!(f.try_blocks.len(), 1);
        let block = model.try_block(f.try_blocks[0]);
        assert_eq!(block.handlers.len(), 1);
        assert_eq!(model.class(block.handlers[0].exception).name, "ValueError");
        assert!(block.try_name.starts_with("try"));
        assert!(block.handlers[0].label.starts_with("handlerValueError"));
    }

    #[test]
    fn test_undefined_name_is_unsupported() {
        let json = module_with(&function(
            "f",
            r#"{ "kind": "Return", "value": { "kind": "Name", "id": "nowhere" } }"#,
        ));
        let err = analyze_json(&json).unwrap_err();
        assert_eq!(err.code(), "unsupported");
        assert!(err.to_string().contains("nowhere"));
    }

    #[test]
    fn test_contract_outside_prefix() {
        let json = module_with(&function(
            "f",
            r#"
            { "kind": "Pass" },
            { "kind": "Expr", "value": { "kind": "Call", "func": { "kind": "Name", "id": "Requires" },
              "args": [{ "kind": "Bool", "value": true }] } }
            "#,
        ));
        assert_eq!(analyze_json(&json).unwrap_err().code(), "invalid.contract.position");
    }

    #[test]
    fn test_continue_in_finally() {
        let json = module_with(&function(
            "f",
            r#"
            { "kind": "While", "test": { "kind": "Bool", "value": true }, "body": [
                { "kind": "Try", "body": [{ "kind": "Pass" }], "finalbody": [{ "kind": "Continue" }] }
            ] }
            "#,
        ));
        assert_eq!(analyze_json(&json).unwrap_err().code(), "continue.in.finally");
    }

    #[test]
    fn test_nested_function() {
        let json = module_with(&function("f", &function("g", r#"{ "kind": "Pass" }"#)));
        assert_eq!(analyze_json(&json).unwrap_err().code(), "nested.function.declaration");
    }
}

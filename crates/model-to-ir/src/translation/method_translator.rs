// Copyright (c) Asymptotic Labs
// SPDX-License-Identifier: Apache-2.0

//! Member translation
//!
//! Single responsibility: emit the IR declaration of one source member. Impure
//! methods become IR methods returning `_res`/`_err`, pure functions and
//! properties become IR functions whose body is a single expression, predicates
//! become IR predicates. The generated override and inherit checks reuse the
//! same signature and contract translation.

use super::expression_translator::{resolve, translate_assertion, translate_pure};
use super::statement_translator::translate_block;
use super::utilities::{coerce, through_receiver};
use crate::context::{Defaults, MethodContext, Typed};
use crate::prelude::is_defined;
use crate::type_domain::TypeDomainFactory;
use program_model::analyzer::names::Binding;
use program_model::{
    ClassId, Expr, ExprKind, IdentifierRegistry, MethodId, MethodType, Model, ModuleId, PyType, Result, Stmt,
    StmtKind, VarId,
};
use verification_ir::{self as ir, Assertion, LocalVar, Type};

/// Default argument values of every member, in the IR type of their argument
pub fn default_values(model: &Model, types: &mut TypeDomainFactory, names: &mut IdentifierRegistry) -> Result<Defaults> {
    let empty = Defaults::new();
    let mut defaults = Defaults::new();
    for (index, m) in model.methods.iter().enumerate() {
        if m.defaults.iter().all(Option::is_none) {
            continue;
        }
        let mut ctx = MethodContext::for_module(model, types, &empty, names, m.module);
        let mut values = vec![];
        for (default, var) in m.defaults.iter().zip(m.arg_ids()) {
            let value = match default {
                Some(e) => {
                    let typ = &model.var(var).typ;
                    let value = translate_pure(&mut ctx, e, Some(typ))?;
                    Some(coerce(&ctx, &value, &ctx.ir_type(typ)))
                }
                None => None,
            };
            values.push(value);
        }
        defaults.insert(MethodId(index), values);
    }
    Ok(defaults)
}

// ============================================================================
// Methods
// ============================================================================

/// IR method of an impure member; without `with_body` only its contract
pub fn translate_method(ctx: &mut MethodContext, member: MethodId, with_body: bool) -> Result<ir::Method> {
    let name = ctx.model.method(member).sil_name.clone();
    procedure(ctx, member, name, with_body)
}

/// The superclass body of `member` verified again with a receiver of class `cls`
pub fn inherit_check(ctx: &mut MethodContext, cls: ClassId, member: MethodId, name: String) -> Result<ir::Method> {
    ctx.frame_mut().receiver_class = Some(cls);
    procedure(ctx, member, name, true)
}

/// Whether `member` is re-verified for subclasses that inherit it
pub fn needs_inherit_check(model: &Model, member: MethodId) -> bool {
    let m = model.method(member);
    !(m.interface || m.contract_only || m.is_pure() || m.is_predicate())
        && m.has_receiver()
        && m.method_type == MethodType::Normal
}

fn procedure(ctx: &mut MethodContext, member: MethodId, name: String, with_body: bool) -> Result<ir::Method> {
    let model = ctx.model;
    let m = model.method(member);
    if m.var_arg.is_some() || m.kw_arg.is_some() {
        return Err(ctx.unsupported("variadic arguments", m.pos.line, m.pos.col));
    }
    let pos = ctx.pos(m.pos.line, m.pos.col);
    let with_body = with_body && !m.interface && !m.contract_only;

    // an argument the body writes to is passed in a separate parameter
    let mut params = vec![];
    let mut copies = vec![];
    for var in m.arg_ids() {
        let v = model.var(var);
        let typ = ctx.ir_type(&v.typ);
        if with_body && !v.writes.is_empty() {
            let param = LocalVar::new(ctx.names.freshen(&format!("{}_in", v.sil_name)), typ);
            copies.push((var, param.clone()));
            params.push(param);
        } else {
            params.push(LocalVar::new(v.sil_name.clone(), typ));
        }
    }
    let (result, error) = result_locals(ctx, member);
    for local in params.iter().chain(result.iter()).chain(error.iter()) {
        ctx.params.insert(local.name.clone());
    }
    let frame = ctx.frame_mut();
    frame.result = result.as_ref().map(LocalVar::to_expr);
    frame.error = error.clone();

    // contracts see the values as passed
    for (var, param) in &copies {
        ctx.frame_mut().aliases.insert(*var, param.to_expr());
    }
    let pres = preconditions(ctx, member, &params)?;
    let posts = postconditions(ctx, member, result.as_ref(), error.as_ref())?;
    for (var, _) in &copies {
        ctx.frame_mut().aliases.remove(var);
    }

    let body = if with_body {
        let mut body = vec![];
        for (var, param) in &copies {
            let local = LocalVar::new(model.var(*var).sil_name.clone(), param.typ.clone());
            ctx.declare_local(local.clone());
            body.push(ir::Stmt::assign(local, param.to_expr()));
        }
        if let Some(error) = &error {
            body.push(ir::Stmt::assign(error.clone(), ir::Expr::Null));
        }
        body.extend(translate_block(ctx, &m.body)?);
        body.push(ir::Stmt::label(ctx.frame().end_label.clone()));
        Some(body)
    } else {
        None
    };

    Ok(ir::Method {
        name,
        params,
        returns: result.into_iter().chain(error).collect(),
        pres,
        posts,
        locals: ctx.locals.values().cloned().collect(),
        body,
        pos,
    })
}

/// `_res` for members returning a value and `_err` for members declaring exceptions
fn result_locals(ctx: &MethodContext, member: MethodId) -> (Option<LocalVar>, Option<LocalVar>) {
    let model = ctx.model;
    let m = model.method(member);
    let result = m
        .return_type
        .as_ref()
        .filter(|t| !model.is_none(t))
        .map(|t| LocalVar::new("_res", ctx.ir_type(t)));
    let error = m.declares_exceptions().then(|| LocalVar::new("_err", Type::Ref));
    (result, error)
}

/// Type facts of the parameters followed by the declared preconditions
fn preconditions(ctx: &mut MethodContext, member: MethodId, params: &[LocalVar]) -> Result<Vec<Assertion>> {
    let model = ctx.model;
    let m = model.method(member);
    let pos = ctx.pos(m.pos.line, m.pos.col);
    let mut pres = vec![];
    for (index, (var, param)) in m.arg_ids().zip(params).enumerate() {
        if param.typ != Type::Ref {
            continue;
        }
        let receiver = index == 0 && m.has_receiver() && m.method_type == MethodType::Normal;
        let typ = match ctx.frame().receiver_class {
            Some(cls) if receiver => model.class_type(cls),
            _ => model.var(var).typ.clone(),
        };
        if receiver {
            pres.push(Assertion::new(ir::Expr::ne(param.to_expr(), ir::Expr::Null), pos.clone()));
        }
        let check = ctx.type_check(param.to_expr(), &typ);
        pres.push(Assertion::new(check, pos.clone()));
    }
    for pre in &m.precondition {
        let cond = translate_assertion(ctx, pre)?;
        pres.push(Assertion::new(cond, ctx.pos(pre.line, pre.col)));
    }
    Ok(pres)
}

/// Result type, declared postconditions for normal termination, `Exsures`
/// conditions and the set of exceptions that may escape
fn postconditions(
    ctx: &mut MethodContext,
    member: MethodId,
    result: Option<&LocalVar>,
    error: Option<&LocalVar>,
) -> Result<Vec<Assertion>> {
    let model = ctx.model;
    let m = model.method(member);
    let pos = ctx.pos(m.pos.line, m.pos.col);
    let success = error.map(|e| ir::Expr::eq(e.to_expr(), ir::Expr::Null));
    let normally = |cond: ir::Expr| match &success {
        Some(success) => ir::Expr::implies(success.clone(), cond),
        None => cond,
    };
    let mut posts = vec![];
    if let (Some(result), Some(declared)) = (result, &m.return_type) {
        if result.typ == Type::Ref {
            let receiver_type = ctx.frame().receiver_class.map(|cls| model.class_type(cls));
            let typ = through_receiver(model, declared, m.cls, receiver_type.as_ref());
            let check = ctx.type_check(result.to_expr(), &typ);
            posts.push(Assertion::new(normally(check), pos.clone()));
        }
    }
    for post in &m.postcondition {
        let cond = translate_assertion(ctx, post)?;
        posts.push(Assertion::new(normally(cond), ctx.pos(post.line, post.col)));
    }
    let Some(error) = error else {
        return Ok(posts);
    };
    let mut raised = vec![];
    for (exc, conditions) in &m.declared_exceptions {
        let is_exc = TypeDomainFactory::issubtype(
            ctx.r#typeof(error.to_expr()),
            TypeDomainFactory::raw_literal(model, *exc),
        );
        raised.push(is_exc.clone());
        let thrown = ir::Expr::and(ir::Expr::ne(error.to_expr(), ir::Expr::Null), is_exc);
        ctx.raised = Some(model.class_type(*exc));
        for condition in conditions {
            let cond = translate_assertion(ctx, condition);
            let cond = match cond {
                Ok(cond) => cond,
                Err(err) => {
                    ctx.raised = None;
                    return Err(err);
                }
            };
            posts.push(Assertion::new(
                ir::Expr::implies(thrown.clone(), cond),
                ctx.pos(condition.line, condition.col),
            ));
        }
        ctx.raised = None;
    }
    let escaping = ir::Expr::or(ir::Expr::eq(error.to_expr(), ir::Expr::Null), ir::Expr::disjoin(raised));
    posts.push(Assertion::new(escaping, pos));
    Ok(posts)
}

/// Module-level statements of `module` as the parameterless method `main`
pub fn translate_main(ctx: &mut MethodContext, module: ModuleId) -> Result<Option<ir::Method>> {
    let model = ctx.model;
    let Some(main) = model.module(module).main else {
        return Ok(None);
    };
    let m = model.method(main);
    ctx.is_main = true;
    let mut body = translate_block(ctx, &m.body)?;
    body.push(ir::Stmt::label(ctx.frame().end_label.clone()));
    Ok(Some(ir::Method {
        name: m.sil_name.clone(),
        params: vec![],
        returns: vec![],
        pres: vec![],
        posts: vec![],
        locals: ctx.locals.values().cloned().collect(),
        body: Some(body),
        pos: ctx.pos(m.pos.line, m.pos.col),
    }))
}

// ============================================================================
// Override checks
// ============================================================================

/// Behavioral subtyping obligation of `member` against the member it overrides:
/// under the overridden contract and a receiver of the overriding class, the
/// override must establish the overridden postconditions.
///
/// `ctx` is created for the overridden member.
pub fn override_check(ctx: &mut MethodContext, member: MethodId, name: String) -> Result<Option<ir::Method>> {
    let model = ctx.model;
    let m = model.method(member);
    let (Some(overridden), Some(cls)) = (m.overrides, m.cls) else {
        return Ok(None);
    };
    let o = model.method(overridden);
    if !checks_override(model, member) {
        return Ok(None);
    }
    let pos = ctx.pos(m.pos.line, m.pos.col);
    ctx.frame_mut().receiver_class = Some(cls);

    let params = o
        .arg_ids()
        .map(|var| {
            let v = model.var(var);
            LocalVar::new(v.sil_name.clone(), ctx.ir_type(&v.typ))
        })
        .collect::<Vec<_>>();
    let (result, error) = result_locals(ctx, overridden);
    for local in params.iter().chain(result.iter()).chain(error.iter()) {
        ctx.params.insert(local.name.clone());
    }
    let frame = ctx.frame_mut();
    frame.result = result.as_ref().map(LocalVar::to_expr);
    frame.error = error.clone();
    let pres = preconditions(ctx, overridden, &params)?;
    let posts = postconditions(ctx, overridden, result.as_ref(), error.as_ref())?;

    // the analyzer ensures both members take the same arguments
    let mut args = vec![];
    for (param, (own, declared)) in params.iter().zip(m.arg_ids().zip(o.arg_ids())) {
        let passed = Typed::new(param.to_expr(), model.var(declared).typ.clone());
        let target = ctx.ir_type(&model.var(own).typ);
        args.push(coerce(ctx, &passed, &target));
    }

    let mut body = vec![];
    let own_defaults = ctx.defaults.get(&member).cloned().unwrap_or_default();
    let other_defaults = ctx.defaults.get(&overridden).cloned().unwrap_or_default();
    for (own, other) in own_defaults.into_iter().zip(other_defaults) {
        if let (Some(own), Some(other)) = (own, other) {
            body.push(ir::Stmt::Assert(ir::Expr::eq(own, other), pos.clone()));
        }
    }
    let returned = m.return_type.clone().filter(|t| !model.is_none(t));
    if m.is_pure() {
        if let (Some(result), Some(typ)) = (&result, returned) {
            let value = Typed::new(ir::Expr::func_app(m.sil_name.clone(), args, ctx.ir_type(&typ)), typ);
            body.push(ir::Stmt::assign(result.clone(), coerce(ctx, &value, &result.typ)));
        }
    } else {
        let mut targets = vec![];
        let sub_result = returned.map(|typ| {
            let local = ctx.fresh_local("override_res", ctx.ir_type(&typ));
            targets.push(local.clone());
            Typed::new(local.to_expr(), typ)
        });
        let sub_error = m.declares_exceptions().then(|| {
            let local = ctx.fresh_local("override_err", Type::Ref);
            targets.push(local.clone());
            local
        });
        body.push(ir::Stmt::call(m.sil_name.clone(), args, targets, pos.clone()));
        if let (Some(result), Some(value)) = (&result, sub_result) {
            body.push(ir::Stmt::assign(result.clone(), coerce(ctx, &value, &result.typ)));
        }
        match (&error, sub_error) {
            (Some(error), Some(sub_error)) => body.push(ir::Stmt::assign(error.clone(), sub_error.to_expr())),
            (Some(error), None) => body.push(ir::Stmt::assign(error.clone(), ir::Expr::Null)),
            // the overridden member promises not to raise
            (None, Some(sub_error)) => body.push(ir::Stmt::Assert(
                ir::Expr::eq(sub_error.to_expr(), ir::Expr::Null),
                pos.clone(),
            )),
            (None, None) => {}
        }
    }

    Ok(Some(ir::Method {
        name,
        params,
        returns: result.into_iter().chain(error).collect(),
        pres,
        posts,
        locals: ctx.locals.values().cloned().collect(),
        body: Some(body),
        pos,
    }))
}

/// Constructors, predicates and overrides of backend-native members carry no
/// checkable contract
pub fn checks_override(model: &Model, member: MethodId) -> bool {
    let m = model.method(member);
    match m.overrides {
        Some(overridden) => {
            let o = model.method(overridden);
            m.name != "__init__" && !o.interface && !m.is_predicate() && !o.is_predicate()
        }
        None => false,
    }
}

// ============================================================================
// Functions and predicates
// ============================================================================

/// What the `return` statements of a pure body produce
enum Returned<'t> {
    Value(&'t PyType),
    Assertion,
}

/// IR function of a pure member or property getter
pub fn translate_function(ctx: &mut MethodContext, member: MethodId) -> Result<ir::Function> {
    let model = ctx.model;
    let m = model.method(member);
    ctx.pure = true;
    let Some(declared) = m.return_type.clone() else {
        return Err(ctx.invalid(
            "function.type.none",
            format!("pure function `{}` has no return type", m.name),
            m.pos.line,
            m.pos.col,
        ));
    };
    let ret = ctx.ir_type(&declared);
    let params = plain_params(ctx, member);
    let pres = preconditions(ctx, member, &params)?;

    let mut posts = vec![];
    if ret == Type::Ref {
        let check = ctx.type_check(ir::Expr::Result(ret.clone()), &declared);
        posts.push(Assertion::new(check, ctx.pos(m.pos.line, m.pos.col)));
    }
    for post in &m.postcondition {
        let cond = translate_assertion(ctx, post)?;
        posts.push(Assertion::new(cond, ctx.pos(post.line, post.col)));
    }
    let body = if m.interface || m.contract_only {
        None
    } else {
        Some(pure_body(ctx, member, &Returned::Value(&declared))?)
    };
    Ok(ir::Function {
        name: m.sil_name.clone(),
        params,
        ret,
        pres,
        posts,
        body,
        pos: ctx.pos(m.pos.line, m.pos.col),
    })
}

/// IR predicate of a `@Predicate` member
pub fn translate_predicate(ctx: &mut MethodContext, member: MethodId) -> Result<ir::Predicate> {
    let model = ctx.model;
    let m = model.method(member);
    ctx.pure = true;
    let params = plain_params(ctx, member);
    let body = if m.interface {
        None
    } else {
        Some(pure_body(ctx, member, &Returned::Assertion)?)
    };
    Ok(ir::Predicate {
        name: m.sil_name.clone(),
        params,
        body,
        pos: ctx.pos(m.pos.line, m.pos.col),
    })
}

fn plain_params(ctx: &mut MethodContext, member: MethodId) -> Vec<LocalVar> {
    let model = ctx.model;
    let params = model
        .method(member)
        .arg_ids()
        .map(|var| {
            let v = model.var(var);
            LocalVar::new(v.sil_name.clone(), ctx.ir_type(&v.typ))
        })
        .collect::<Vec<_>>();
    ctx.params.extend(params.iter().map(|p| p.name.clone()));
    params
}

fn pure_body(ctx: &mut MethodContext, member: MethodId, returned: &Returned) -> Result<ir::Expr> {
    let model = ctx.model;
    let m = model.method(member);
    match pure_block(ctx, &m.body, returned)? {
        Some(body) => Ok(body),
        None => Err(ctx.invalid(
            "function.return.missing",
            format!("`{}` does not return a value on every path", m.name),
            m.pos.line,
            m.pos.col,
        )),
    }
}

/// Fold a straight-line body of assignments, conditionals and returns into one
/// expression; `None` when some path does not return
fn pure_block(ctx: &mut MethodContext, stmts: &[Stmt], returned: &Returned) -> Result<Option<ir::Expr>> {
    let Some((first, rest)) = stmts.split_first() else {
        return Ok(None);
    };
    match &first.kind {
        StmtKind::Pass => pure_block(ctx, rest, returned),
        StmtKind::Expr { value } if matches!(value.kind, ExprKind::Str { .. }) => pure_block(ctx, rest, returned),
        StmtKind::Return { value: Some(value) } => {
            let expr = match returned {
                Returned::Value(typ) => {
                    let value = translate_pure(ctx, value, Some(typ))?;
                    coerce(ctx, &value, &ctx.ir_type(typ))
                }
                Returned::Assertion => translate_assertion(ctx, value)?,
            };
            Ok(Some(expr))
        }
        StmtKind::Assign { targets, value } if targets.len() == 1 => pure_let(ctx, first, &targets[0], value, rest, returned),
        StmtKind::AnnAssign {
            target,
            value: Some(value),
            ..
        } => pure_let(ctx, first, target, value, rest, returned),
        StmtKind::If { test, body, orelse } => {
            let test = translate_pure(ctx, test, None)?;
            let cond = coerce(ctx, &test, &Type::Bool);
            let then = pure_block(ctx, &[body.as_slice(), rest].concat(), returned)?;
            let els = pure_block(ctx, &[orelse.as_slice(), rest].concat(), returned)?;
            match (then, els) {
                (Some(then), Some(els)) => Ok(Some(ir::Expr::cond(cond, then, els))),
                (None, None) => Ok(None),
                _ => Err(ctx.invalid(
                    "function.return.missing",
                    "only one branch of a conditional returns a value",
                    first.line,
                    first.col,
                )),
            }
        }
        _ => Err(ctx.invalid(
            "purity.violated",
            "statement not allowed in a pure function",
            first.line,
            first.col,
        )),
    }
}

/// `x = value; rest` as `let x == (value) in rest`
fn pure_let(
    ctx: &mut MethodContext,
    stmt: &Stmt,
    target: &Expr,
    value: &Expr,
    rest: &[Stmt],
    returned: &Returned,
) -> Result<Option<ir::Expr>> {
    let model = ctx.model;
    let var: VarId = match target.as_name().and_then(|name| resolve(ctx, name)) {
        Some(Binding::Var(var)) => var,
        _ => return Err(ctx.unsupported("assignment target in a pure function", stmt.line, stmt.col)),
    };
    let v = model.var(var);
    let hint = v.type_at(target.line, target.col).clone();
    let bound = translate_pure(ctx, value, Some(&hint))?;
    let local = LocalVar::new(ctx.names.freshen(&v.sil_name), ctx.ir_type(&v.typ));
    let value = coerce(ctx, &bound, &local.typ);

    let shadowed = ctx.frame_mut().aliases.insert(var, local.to_expr());
    let body = pure_block(ctx, rest, returned);
    match shadowed {
        Some(previous) => ctx.frame_mut().aliases.insert(var, previous),
        None => ctx.frame_mut().aliases.remove(&var),
    };
    Ok(body?.map(|body| ir::Expr::Let {
        var: local,
        value: Box::new(value),
        body: Box::new(body),
    }))
}

// ============================================================================
// Globals and static fields
// ============================================================================

/// Accessor of a module global defined by exactly one top-level assignment
pub fn global_function(model: &Model, types: &mut TypeDomainFactory, var: VarId) -> ir::Function {
    let v = model.var(var);
    let ret = crate::context::ir_type(model, &v.typ);
    let pos = ir::Position::new(model.module(model.module_of(v.owner)).path.clone(), 0, 0);
    let mut posts = vec![];
    if ret == Type::Ref {
        let check = types.type_check(model, ir::Expr::Result(ret.clone()), &v.typ, None);
        posts.push(Assertion::new(check, pos.clone()));
    }
    ir::Function {
        name: v.sil_name.clone(),
        params: vec![],
        ret,
        pres: vec![Assertion::new(is_defined(v.id as i64), pos.clone())],
        posts,
        body: None,
        pos,
    }
}

/// Accessor of a class-level field; its body is the defining value
///
/// `ctx` is created for the module declaring the class.
pub fn static_field_function(ctx: &mut MethodContext, var: VarId) -> Result<ir::Function> {
    let model = ctx.model;
    let v = model.var(var);
    let ret = ctx.ir_type(&v.typ);
    let pos = v
        .writes
        .first()
        .map(|p| ctx.pos(p.line, p.col))
        .unwrap_or_else(|| ctx.pos(0, 0));
    let body = match &v.value {
        Some(value) => {
            let value = translate_pure(ctx, value, Some(&v.typ))?;
            Some(coerce(ctx, &value, &ret))
        }
        None => None,
    };
    let mut posts = vec![];
    if ret == Type::Ref {
        let check = ctx.type_check(ir::Expr::Result(ret.clone()), &v.typ);
        posts.push(Assertion::new(check, pos.clone()));
    }
    Ok(ir::Function {
        name: v.sil_name.clone(),
        params: vec![],
        ret,
        pres: vec![],
        posts,
        body,
        pos,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use program_model::{analyze, InterfaceDecls, Model, SourceProgram};

    fn model_of(body: &str) -> Model {
        let text = format!(r#"{{ "modules": [{{ "name": "main", "path": "main.py", "body": {} }}] }}"#, body);
        let program = SourceProgram::from_json(&text).unwrap();
        analyze(&program, &InterfaceDecls::builtins().unwrap()).unwrap()
    }

    fn function(model: &Model, name: &str) -> MethodId {
        model.module(model.main_modules[0]).functions[name]
    }

    const ANIMALS: &str = r#"[
        { "kind": "ClassDef", "name": "Animal", "line": 1, "body": [
            { "kind": "FunctionDef", "name": "speak", "line": 2,
              "args": { "args": [{ "name": "self" }] },
              "returns": { "kind": "Name", "id": "int" },
              "body": [
                { "kind": "Expr", "line": 3, "value": { "kind": "Call", "func": { "kind": "Name", "id": "Ensures" },
                  "args": [{ "kind": "Compare", "left": { "kind": "Call", "func": { "kind": "Name", "id": "Result" } },
                             "ops": ["Gt"], "comparators": [{ "kind": "Int", "value": 0 }] }] } },
                { "kind": "Return", "line": 4, "value": { "kind": "Int", "value": 1 } }
              ] }
        ] },
        { "kind": "ClassDef", "name": "Dog", "line": 5, "bases": [{ "kind": "Name", "id": "Animal" }], "body": [
            { "kind": "FunctionDef", "name": "speak", "line": 6,
              "args": { "args": [{ "name": "self" }] },
              "returns": { "kind": "Name", "id": "int" },
              "body": [{ "kind": "Return", "line": 7, "value": { "kind": "Int", "value": 2 } }] }
        ] }
    ]"#;

    fn member(model: &Model, cls: &str, name: &str) -> MethodId {
        let cls = model.lookup_class(model.main_modules[0], cls).unwrap();
        model.class(cls).methods[name]
    }

    #[test]
    fn test_override_check_assumes_subclass_receiver() {
        let model = model_of(ANIMALS);
        let speak = member(&model, "Dog", "speak");
        let overridden = model.method(speak).overrides.unwrap();
        let mut types = TypeDomainFactory::new();
        let defaults = Defaults::new();
        let mut names = model.registry.clone();
        let mut ctx = MethodContext::new(&model, &mut types, &defaults, &mut names, overridden);
        let check = override_check(&mut ctx, speak, "Dog_speak_override_check".to_string())
            .unwrap()
            .unwrap();

        assert_eq!(check.params.len(), model.method(overridden).args.len());
        assert_ne!(check.name, model.method(speak).sil_name);
        let dog = model.lookup_class(model.main_modules[0], "Dog").unwrap();
        let literal = TypeDomainFactory::raw_literal(&model, dog);
        let mentions_dog = check.pres.iter().any(|pre| {
            let mut found = false;
            pre.expr.visit(&mut |e| found |= *e == literal);
            found
        });
        assert!(mentions_dog);
        // the overridden postcondition `Result() > 0` is the obligation
        assert_eq!(check.posts.len(), 1);
        let Some(ir::Stmt::MethodCall { method, .. }) = check.body.as_ref().and_then(|b| b.first()) else {
            panic!("expected a call of the override");
        };
        assert_eq!(method, &model.method(speak).sil_name);
    }

    #[test]
    fn test_override_check_asserts_equal_defaults() {
        let speak = |cls: &str, line: usize, default: &str| {
            format!(
                r#"{{ "kind": "ClassDef", "name": "{cls}", "line": {line}, {bases} "body": [
                    {{ "kind": "FunctionDef", "name": "speak", "line": {next},
                      "args": {{ "args": [{{ "name": "self" }}, {{ "name": "x", "annotation": {{ "kind": "Name", "id": "int" }} }}],
                                "defaults": [{default}] }},
                      "returns": {{ "kind": "Name", "id": "int" }},
                      "body": [{{ "kind": "Return", "line": {next}, "value": {{ "kind": "Name", "id": "x" }} }}] }}
                ] }}"#,
                bases = if cls == "Dog" { r#""bases": [{ "kind": "Name", "id": "Animal" }],"# } else { "" },
                next = line + 1,
            )
        };
        let sum = r#"{ "kind": "BinOp", "left": { "kind": "Int", "value": 1 }, "op": "Add", "right": { "kind": "Int", "value": 1 } }"#;
        let model = model_of(&format!(
            "[{}, {}]",
            speak("Animal", 1, sum),
            speak("Dog", 5, r#"{ "kind": "Int", "value": 2 }"#)
        ));
        let speak = member(&model, "Dog", "speak");
        let overridden = model.method(speak).overrides.unwrap();
        let mut types = TypeDomainFactory::new();
        let mut names = model.registry.clone();
        let defaults = default_values(&model, &mut types, &mut names).unwrap();
        let mut ctx = MethodContext::new(&model, &mut types, &defaults, &mut names, overridden);
        let check = override_check(&mut ctx, speak, "Dog_speak_override_check".to_string())
            .unwrap()
            .unwrap();

        let body = check.body.unwrap();
        let ir::Stmt::Assert(ir::Expr::Binary { op: ir::BinOp::Eq, lhs, rhs }, _) = &body[0] else {
            panic!("expected the default values to be compared first, got {:?}", body[0]);
        };
        assert_eq!(**lhs, ir::Expr::int(2));
        assert_ne!(**rhs, ir::Expr::int(2));
    }

    #[test]
    fn test_constructor_is_exempt_from_override_checks() {
        let model = model_of(
            r#"[{ "kind": "ClassDef", "name": "A", "line": 1, "body": [
                { "kind": "FunctionDef", "name": "__init__", "line": 2,
                  "args": { "args": [{ "name": "self" }] },
                  "returns": { "kind": "None" }, "body": [{ "kind": "Pass", "line": 3 }] } ] }]"#,
        );
        let init = member(&model, "A", "__init__");
        assert!(!checks_override(&model, init));
    }

    #[test]
    fn test_pure_function_body_becomes_conditional() {
        let model = model_of(
            r#"[{ "kind": "FunctionDef", "name": "sign", "line": 1,
                  "decorators": [{ "kind": "Name", "id": "Pure" }],
                  "args": { "args": [{ "name": "x", "annotation": { "kind": "Name", "id": "int" } }] },
                  "returns": { "kind": "Name", "id": "int" },
                  "body": [
                    { "kind": "If", "line": 2,
                      "test": { "kind": "Compare", "left": { "kind": "Name", "id": "x" }, "ops": ["Lt"],
                                "comparators": [{ "kind": "Int", "value": 0 }] },
                      "body": [{ "kind": "Return", "line": 3, "value": { "kind": "Int", "value": -1 } }] },
                    { "kind": "Return", "line": 4, "value": { "kind": "Int", "value": 1 } }
                  ] }]"#,
        );
        let sign = function(&model, "sign");
        let mut types = TypeDomainFactory::new();
        let defaults = Defaults::new();
        let mut names = model.registry.clone();
        let mut ctx = MethodContext::new(&model, &mut types, &defaults, &mut names, sign);
        let translated = translate_function(&mut ctx, sign).unwrap();
        assert_eq!(translated.ret, Type::Int);
        assert!(matches!(translated.body, Some(ir::Expr::Cond { .. })));
    }

    #[test]
    fn test_pure_function_without_return_is_rejected() {
        let model = model_of(
            r#"[{ "kind": "FunctionDef", "name": "f", "line": 1,
                  "decorators": [{ "kind": "Name", "id": "Pure" }],
                  "returns": { "kind": "Name", "id": "int" },
                  "body": [{ "kind": "Pass", "line": 2 }] }]"#,
        );
        let f = function(&model, "f");
        let mut types = TypeDomainFactory::new();
        let defaults = Defaults::new();
        let mut names = model.registry.clone();
        let mut ctx = MethodContext::new(&model, &mut types, &defaults, &mut names, f);
        let err = translate_function(&mut ctx, f).unwrap_err();
        assert_eq!(err.code(), "function.return.missing");
    }

    #[test]
    fn test_method_declaring_exceptions_returns_error() {
        let model = model_of(
            r#"[{ "kind": "FunctionDef", "name": "f", "line": 1,
                  "returns": { "kind": "None" },
                  "body": [
                    { "kind": "Expr", "line": 2, "value": { "kind": "Call", "func": { "kind": "Name", "id": "Exsures" },
                      "args": [{ "kind": "Name", "id": "ValueError" }, { "kind": "Bool", "value": true }] } },
                    { "kind": "Raise", "line": 3,
                      "exc": { "kind": "Call", "func": { "kind": "Name", "id": "ValueError" } } }
                  ] }]"#,
        );
        let f = function(&model, "f");
        let mut types = TypeDomainFactory::new();
        let defaults = Defaults::new();
        let mut names = model.registry.clone();
        let mut ctx = MethodContext::new(&model, &mut types, &defaults, &mut names, f);
        let method = translate_method(&mut ctx, f, true).unwrap();
        assert_eq!(method.returns, vec![LocalVar::new("_err", Type::Ref)]);
        let body = method.body.unwrap();
        assert_eq!(body.last(), Some(&ir::Stmt::label("__end")));
        let mut raises_undeclared = false;
        for stmt in &body {
            stmt.visit(&mut |s| raises_undeclared |= matches!(s, ir::Stmt::Exhale(e, _) if *e == ir::Expr::ff()));
        }
        assert!(!raises_undeclared);
    }
}

// Copyright (c) Asymptotic Labs
// SPDX-License-Identifier: Apache-2.0

//! Call translation
//!
//! Single responsibility: resolve the callee of a call expression and lower it to
//! a function application, a predicate access, a method call statement or an
//! inlined body. Argument binding (keywords, defaults, receivers) and the
//! propagation of exceptions raised by callees live here as well.

use super::contract_translator::translate_contract_call;
use super::expression_translator::{
    class_object, class_ref, module_ref, resolve, translate_dict, translate_expr, translate_hinted, translate_list,
    translate_pure, translate_set,
};
use super::statement_translator::{route_exception, translate_block};
use super::utilities::{coerce, join_types, require_impure, through_receiver, to_bool, to_ref};
use crate::context::{Frame, MethodContext, Typed};
use crate::type_domain::TypeDomainFactory;
use itertools::Itertools;
use program_model::analyzer::names::Binding;
use program_model::analyzer::types::resolve_type;
use program_model::syntax::Keyword;
use program_model::{
    CallSlotId, ClassId, Expr, ExprKind, IoOperationId, MethodId, MethodKind, MethodType, PyType, Result, ScopeRef,
    TypeExpr, VarId, VarKind,
};
use std::collections::HashMap;
use verification_ir::{self as ir, FieldRef, Stmt, Type};

/// A call argument, either still to be translated or already evaluated
#[derive(Debug, Clone)]
pub enum CallArg<'e> {
    Source(&'e Expr),
    Value(Typed),
}

fn sources(args: &[Expr]) -> Vec<CallArg<'_>> {
    args.iter().map(CallArg::Source).collect()
}

fn none(ctx: &MethodContext) -> Typed {
    Typed::new(ir::Expr::Null, ctx.builtin_type("NoneType"))
}

pub fn translate_call(
    ctx: &mut MethodContext,
    e: &Expr,
    func: &Expr,
    args: &[Expr],
    keywords: &[Keyword],
    hint: Option<&PyType>,
    stmts: &mut Vec<Stmt>,
) -> Result<Typed> {
    match &func.kind {
        ExprKind::Name { id } => {
            if ctx.lambda_vars.iter().any(|(name, _)| name == id) {
                return Err(ctx.unsupported("call of a quantified variable", e.line, e.col));
            }
            match resolve(ctx, id) {
                Some(Binding::Contract) => translate_contract_call(ctx, id, args, keywords, e, stmts),
                Some(Binding::Builtin) => translate_builtin(ctx, id, args, keywords, e, hint, stmts),
                Some(Binding::Class(cls)) => construct(ctx, cls, args, keywords, e, hint, stmts),
                Some(Binding::Function(function)) => call_member(ctx, function, None, sources(args), keywords, e, stmts),
                Some(Binding::IoOperation(op)) => io_operation_call(ctx, op, args, e),
                Some(Binding::CallSlot(slot)) => call_slot_call(ctx, slot, args, e),
                Some(Binding::Var(_)) | Some(Binding::Module(_)) => {
                    Err(ctx.unsupported(format!("call of `{}`", id), e.line, e.col))
                }
                None => Err(ctx.unsupported(format!("undefined name `{}`", id), e.line, e.col)),
            }
        }
        ExprKind::Attribute { value, attr } => {
            if let Some(("super", _)) = value.as_named_call() {
                return super_call(ctx, attr, args, keywords, e, stmts);
            }
            if let Some(module) = module_ref(ctx, value) {
                return module_call(ctx, module, attr, args, keywords, e, hint, stmts);
            }
            if let Some(cls) = class_ref(ctx, value) {
                return class_call(ctx, cls, attr, args, keywords, e, stmts);
            }
            let receiver = translate_expr(ctx, value, stmts)?;
            call_method(ctx, &receiver, attr, sources(args), keywords, e, stmts)
        }
        _ => Err(ctx.unsupported("call of a computed callee", e.line, e.col)),
    }
}

#[allow(clippy::too_many_arguments)]
fn module_call(
    ctx: &mut MethodContext,
    module: program_model::ModuleId,
    name: &str,
    args: &[Expr],
    keywords: &[Keyword],
    e: &Expr,
    hint: Option<&PyType>,
    stmts: &mut Vec<Stmt>,
) -> Result<Typed> {
    let model = ctx.model;
    if let Some(function) = model.lookup_function(module, name) {
        return call_member(ctx, function, None, sources(args), keywords, e, stmts);
    }
    if let Some(cls) = model.lookup_class(module, name) {
        return construct(ctx, cls, args, keywords, e, hint, stmts);
    }
    if let Some(op) = model.lookup_io_operation(module, name) {
        return io_operation_call(ctx, op, args, e);
    }
    if let Some(slot) = model.lookup_call_slot(module, name) {
        return call_slot_call(ctx, slot, args, e);
    }
    Err(ctx.unsupported(
        format!("module `{}` has no member `{}`", model.module(module).name, name),
        e.line,
        e.col,
    ))
}

/// `C.m(...)`: class methods, static methods and statically bound instance methods
fn class_call(
    ctx: &mut MethodContext,
    cls: ClassId,
    name: &str,
    args: &[Expr],
    keywords: &[Keyword],
    e: &Expr,
    stmts: &mut Vec<Stmt>,
) -> Result<Typed> {
    let model = ctx.model;
    let Some(member) = model.get_member(cls, name) else {
        return Err(ctx.invalid(
            "attribute.unknown",
            format!("class `{}` has no member `{}`", model.class(cls).name, name),
            e.line,
            e.col,
        ));
    };
    let m = model.method(member);
    match m.method_type {
        MethodType::ClassMethod => {
            let receiver = class_object(ctx, cls);
            call_member(ctx, member, Some(receiver), sources(args), keywords, e, stmts)
        }
        MethodType::Static => call_member(ctx, member, None, sources(args), keywords, e, stmts),
        MethodType::Normal => {
            let Some((first, rest)) = args.split_first() else {
                return Err(ctx.invalid(
                    "call.arguments",
                    format!("`{}.{}` needs an explicit receiver", model.class(cls).name, name),
                    e.line,
                    e.col,
                ));
            };
            let receiver = translate_expr(ctx, first, stmts)?;
            if m.is_pure() || m.is_predicate() || m.interface || m.contract_only {
                call_member(ctx, member, Some(receiver), sources(rest), keywords, e, stmts)
            } else {
                inline_call(ctx, member, Some(receiver), sources(rest), keywords, e, stmts)
            }
        }
    }
}

/// `super().m(...)`: the superclass implementation, bound statically
fn super_call(
    ctx: &mut MethodContext,
    name: &str,
    args: &[Expr],
    keywords: &[Keyword],
    e: &Expr,
    stmts: &mut Vec<Stmt>,
) -> Result<Typed> {
    let model = ctx.model;
    let sup = ctx.frame().cls.and_then(|cls| model.class(cls).superclass);
    let receiver = ctx.receiver_expr();
    let (Some(sup), Some(receiver)) = (sup, receiver) else {
        return Err(ctx.invalid("super.invalid", "`super()` outside of an instance method", e.line, e.col));
    };
    let Some(member) = model.get_member(sup, name) else {
        return Err(ctx.invalid(
            "attribute.unknown",
            format!("superclass `{}` has no member `{}`", model.class(sup).name, name),
            e.line,
            e.col,
        ));
    };
    let m = model.method(member);
    if m.interface && m.name == "__init__" {
        return Ok(none(ctx));
    }
    let receiver_type = ctx.frame().cls.map(|cls| model.class_type(cls)).unwrap_or_else(|| model.class_type(sup));
    let receiver = Typed::new(receiver, receiver_type);
    if m.is_pure() || m.is_predicate() || m.interface || m.contract_only {
        call_member(ctx, member, Some(receiver), sources(args), keywords, e, stmts)
    } else {
        inline_call(ctx, member, Some(receiver), sources(args), keywords, e, stmts)
    }
}

/// Dynamically dispatched call `receiver.name(args)`
pub fn call_method(
    ctx: &mut MethodContext,
    receiver: &Typed,
    name: &str,
    args: Vec<CallArg>,
    keywords: &[Keyword],
    e: &Expr,
    stmts: &mut Vec<Stmt>,
) -> Result<Typed> {
    let model = ctx.model;
    if let Some(member) = model.get_member(receiver.typ.cls(model), name) {
        return call_member(ctx, member, Some(receiver.clone()), args, keywords, e, stmts);
    }
    let Some(members) = receiver.typ.union_members() else {
        return Err(ctx.invalid(
            "attribute.unknown",
            format!("`{}` has no member `{}`", receiver.typ.display(model), name),
            e.line,
            e.col,
        ));
    };

    // member only defined on the alternatives: dispatch on the runtime type
    let object = to_ref(ctx, receiver);
    let mut branches = vec![];
    for member in members {
        let mut own = vec![];
        let narrowed = Typed::new(receiver.expr.clone(), member.clone());
        let value = call_method(ctx, &narrowed, name, args.clone(), keywords, e, &mut own)?;
        let guard = ctx.type_check(object.clone(), member);
        branches.push((guard, value, own));
    }
    let typ = join_types(model, &branches.iter().map(|(_, v, _)| v.typ.clone()).collect_vec());
    let ir_type = ctx.ir_type(&typ);

    if branches.iter().all(|(_, _, own)| own.is_empty()) {
        let mut branches = branches.into_iter().rev();
        let Some((_, last, _)) = branches.next() else {
            return Err(ctx.unsupported("call on an empty union", e.line, e.col));
        };
        let mut expr = coerce(ctx, &last, &ir_type);
        for (guard, value, _) in branches {
            expr = ir::Expr::cond(guard, coerce(ctx, &value, &ir_type), expr);
        }
        return Ok(Typed::new(expr, typ));
    }

    require_impure(ctx, &format!("call of `{}`", name), e.line, e.col)?;
    let result = ctx.fresh_local(&format!("{}_res", name), ir_type.clone());
    let mut chain: Vec<Stmt> = vec![];
    for (index, (guard, value, mut own)) in branches.into_iter().enumerate().rev() {
        own.push(Stmt::assign(result.clone(), coerce(ctx, &value, &ir_type)));
        chain = if chain.is_empty() && index > 0 {
            // the last alternative needs no test
            own
        } else {
            vec![Stmt::If {
                cond: guard,
                then: own,
                els: chain,
            }]
        };
    }
    stmts.extend(chain);
    Ok(Typed::new(result.to_expr(), typ))
}

/// Operator method `receiver.name(args)`
pub fn call_magic(
    ctx: &mut MethodContext,
    receiver: &Typed,
    name: &str,
    args: Vec<CallArg>,
    e: &Expr,
    stmts: &mut Vec<Stmt>,
) -> Result<Typed> {
    let model = ctx.model;
    let cls = receiver.typ.cls(model);
    if model.get_member(cls, name).is_none() && receiver.typ.union_members().is_none() {
        return Err(ctx.unsupported(
            format!("`{}` on `{}`", name, receiver.typ.display(model)),
            e.line,
            e.col,
        ));
    }
    call_method(ctx, receiver, name, args, &[], e, stmts)
}

// ============================================================================
// Argument binding
// ============================================================================

/// IR arguments of a call to `member`, receiver first, in declaration order
pub fn bind_args(
    ctx: &mut MethodContext,
    member: MethodId,
    receiver: Option<&Typed>,
    positional: Vec<CallArg>,
    keywords: &[Keyword],
    e: &Expr,
    stmts: &mut Vec<Stmt>,
) -> Result<Vec<ir::Expr>> {
    let model = ctx.model;
    let m = model.method(member);
    let params = m.arg_ids().collect_vec();
    let mut slots: Vec<Option<ir::Expr>> = vec![None; params.len()];
    let mut next = 0;
    if m.has_receiver() {
        let (Some(recv), Some(first)) = (receiver, params.first()) else {
            return Err(ctx.invalid(
                "call.arguments",
                format!("`{}` is called without a receiver", m.name),
                e.line,
                e.col,
            ));
        };
        let target = ctx.ir_type(&model.var(*first).typ);
        slots[0] = Some(coerce(ctx, recv, &target));
        next = 1;
    }
    if m.var_arg.is_some() || m.kw_arg.is_some() {
        return Err(ctx.unsupported("call of a variadic function", e.line, e.col));
    }
    let receiver_type = receiver.map(|r| r.typ.clone());
    for arg in positional {
        if let CallArg::Source(Expr {
            kind: ExprKind::Starred { .. },
            ..
        }) = arg
        {
            return Err(ctx.unsupported("starred argument", e.line, e.col));
        }
        if next >= params.len() {
            return Err(ctx.invalid(
                "call.arguments",
                format!("too many arguments for `{}`", m.name),
                e.line,
                e.col,
            ));
        }
        slots[next] = Some(bind_one(ctx, member, params[next], receiver_type.as_ref(), arg, stmts)?);
        next += 1;
    }
    for keyword in keywords {
        let Some(name) = &keyword.arg else {
            return Err(ctx.unsupported("keyword argument splat", e.line, e.col));
        };
        let Some(index) = m.args.get_index_of(name.as_str()) else {
            return Err(ctx.invalid(
                "call.arguments",
                format!("`{}` has no argument `{}`", m.name, name),
                e.line,
                e.col,
            ));
        };
        if slots[index].is_some() {
            return Err(ctx.invalid(
                "call.arguments",
                format!("argument `{}` of `{}` given twice", name, m.name),
                e.line,
                e.col,
            ));
        }
        let value = bind_one(ctx, member, params[index], receiver_type.as_ref(), CallArg::Source(&keyword.value), stmts)?;
        slots[index] = Some(value);
    }
    let defaults = ctx.defaults.get(&member);
    let mut bound = vec![];
    for (index, slot) in slots.into_iter().enumerate() {
        let value = slot.or_else(|| defaults.and_then(|d| d.get(index).cloned().flatten()));
        match value {
            Some(value) => bound.push(value),
            None => {
                return Err(ctx.invalid(
                    "call.arguments",
                    format!("missing argument `{}` of `{}`", model.var(params[index]).name, m.name),
                    e.line,
                    e.col,
                ))
            }
        }
    }
    Ok(bound)
}

fn bind_one(
    ctx: &mut MethodContext,
    member: MethodId,
    param: VarId,
    receiver: Option<&PyType>,
    arg: CallArg,
    stmts: &mut Vec<Stmt>,
) -> Result<ir::Expr> {
    let model = ctx.model;
    let declared = &model.var(param).typ;
    let expected = through_receiver(model, declared, model.method(member).cls, receiver);
    let value = match arg {
        CallArg::Source(expr) => translate_hinted(ctx, expr, Some(&expected), stmts)?,
        CallArg::Value(value) => value,
    };
    Ok(coerce(ctx, &value, &ctx.ir_type(declared)))
}

/// Declared return type of `member` as seen by the caller; `None` for procedures
fn return_type(ctx: &MethodContext, member: MethodId, receiver: Option<&Typed>) -> Option<(PyType, Type)> {
    let model = ctx.model;
    let m = model.method(member);
    let declared = m.return_type.as_ref().filter(|t| !model.is_none(t))?;
    let seen = through_receiver(model, declared, m.cls, receiver.map(|r| &r.typ));
    Some((seen, ctx.ir_type(declared)))
}

// ============================================================================
// Members
// ============================================================================

/// Call of a resolved member: function application, predicate access or method call
pub fn call_member(
    ctx: &mut MethodContext,
    member: MethodId,
    receiver: Option<Typed>,
    positional: Vec<CallArg>,
    keywords: &[Keyword],
    e: &Expr,
    stmts: &mut Vec<Stmt>,
) -> Result<Typed> {
    let model = ctx.model;
    let m = model.method(member);
    let args = bind_args(ctx, member, receiver.as_ref(), positional, keywords, e, stmts)?;
    match m.kind {
        MethodKind::Pure | MethodKind::Property => {
            let (typ, ir_type) = return_type(ctx, member, receiver.as_ref())
                .unwrap_or_else(|| (ctx.builtin_type("NoneType"), Type::Ref));
            Ok(Typed::new(ir::Expr::func_app(m.sil_name.clone(), args, ir_type), typ))
        }
        MethodKind::Predicate => Ok(Typed::new(
            ir::Expr::predicate_acc(m.sil_name.clone(), args, ir::Expr::FullPerm),
            ctx.builtin_type("bool"),
        )),
        _ => method_call(ctx, member, args, receiver.as_ref(), e, stmts),
    }
}

/// `targets := m(args)` followed by propagation of a raised exception
fn method_call(
    ctx: &mut MethodContext,
    member: MethodId,
    args: Vec<ir::Expr>,
    receiver: Option<&Typed>,
    e: &Expr,
    stmts: &mut Vec<Stmt>,
) -> Result<Typed> {
    let model = ctx.model;
    let m = model.method(member);
    require_impure(ctx, &format!("call of method `{}`", m.name), e.line, e.col)?;
    let mut targets = vec![];
    let result = return_type(ctx, member, receiver).map(|(typ, ir_type)| {
        let local = ctx.fresh_local(&format!("{}_res", m.name), ir_type);
        targets.push(local.clone());
        Typed::new(local.to_expr(), typ)
    });
    let error = m.declares_exceptions().then(|| {
        let local = ctx.fresh_local(&format!("{}_err", m.name), Type::Ref);
        targets.push(local.clone());
        local
    });
    let pos = ctx.pos(e.line, e.col);
    stmts.push(Stmt::call(m.sil_name.clone(), args, targets, pos));
    if let Some(error) = error {
        let raised = model.common_superclass(&m.declared_exceptions.keys().copied().collect_vec());
        let handling = route_exception(ctx, error.to_expr(), raised, e.line, e.col)?;
        stmts.push(Stmt::if_then(ir::Expr::ne(error.to_expr(), ir::Expr::Null), handling));
    }
    Ok(result.unwrap_or_else(|| none(ctx)))
}

/// Translate the body of a statically bound call in place
pub fn inline_call(
    ctx: &mut MethodContext,
    member: MethodId,
    receiver: Option<Typed>,
    positional: Vec<CallArg>,
    keywords: &[Keyword],
    e: &Expr,
    stmts: &mut Vec<Stmt>,
) -> Result<Typed> {
    let model = ctx.model;
    let m = model.method(member);
    require_impure(ctx, &format!("statically bound call of `{}`", m.name), e.line, e.col)?;
    if ctx.inline_stack.contains(&member) || ctx.frames.iter().any(|f| f.method == member) {
        return Err(ctx.invalid(
            "recursive.static.call",
            format!("statically bound call of `{}` is recursive", m.name),
            e.line,
            e.col,
        ));
    }
    let args = bind_args(ctx, member, receiver.as_ref(), positional, keywords, e, stmts)?;

    let mut frame = Frame::new(model, member);
    frame.label_aliases = Some(HashMap::new());
    for (value, param) in args.into_iter().zip(m.arg_ids()) {
        let var = model.var(param);
        let local = ctx.fresh_local(&var.sil_name, ctx.ir_type(&var.typ));
        stmts.push(Stmt::assign(local.clone(), value));
        frame.aliases.insert(param, local.to_expr());
    }
    for (index, var) in model.vars.iter().enumerate() {
        if var.owner == ScopeRef::Method(member) && var.kind != VarKind::Arg {
            let local = ctx.fresh_local(&var.sil_name, ctx.ir_type(&var.typ));
            frame.aliases.insert(VarId(index), local.to_expr());
        }
    }
    let result = return_type(ctx, member, receiver.as_ref()).map(|(typ, ir_type)| {
        let local = ctx.fresh_local(&format!("{}_res", m.name), ir_type);
        Typed::new(local.to_expr(), typ)
    });
    let error = m
        .declares_exceptions()
        .then(|| ctx.fresh_local(&format!("{}_err", m.name), Type::Ref));
    if let Some(error) = &error {
        stmts.push(Stmt::assign(error.clone(), ir::Expr::Null));
    }
    let end = ctx.fresh_label(&format!("{}_end", m.name));
    frame.result = result.as_ref().map(|r| r.expr.clone());
    frame.error = error.clone();
    frame.end_label = end.clone();

    ctx.frames.push(frame);
    ctx.inline_stack.push(member);
    let body = translate_block(ctx, &m.body);
    ctx.inline_stack.pop();
    ctx.frames.pop();
    stmts.extend(body?);
    stmts.push(Stmt::label(end));

    if let Some(error) = error {
        let raised = model.common_superclass(&m.declared_exceptions.keys().copied().collect_vec());
        let handling = route_exception(ctx, error.to_expr(), raised, e.line, e.col)?;
        stmts.push(Stmt::if_then(ir::Expr::ne(error.to_expr(), ir::Expr::Null), handling));
    }
    Ok(result.unwrap_or_else(|| none(ctx)))
}

// ============================================================================
// Construction
// ============================================================================

#[allow(clippy::too_many_arguments)]
fn construct(
    ctx: &mut MethodContext,
    cls: ClassId,
    args: &[Expr],
    keywords: &[Keyword],
    e: &Expr,
    hint: Option<&PyType>,
    stmts: &mut Vec<Stmt>,
) -> Result<Typed> {
    let model = ctx.model;
    let class = model.class(cls);
    if class.interface {
        return construct_builtin(ctx, cls, args, e, hint, stmts);
    }
    require_impure(ctx, &format!("construction of `{}`", class.name), e.line, e.col)?;
    let hinted = hint.filter(|h| class.is_generic() && matches!(h, PyType::Generic { cls: c, .. } if *c == cls));
    let typ = hinted.cloned().unwrap_or(PyType::Class(cls));

    let pos = ctx.pos(e.line, e.col);
    let target = ctx.fresh_local(&class.name.to_lowercase(), Type::Ref);
    let fields = model
        .instance_fields(cls)
        .into_iter()
        .map(|f| {
            let field = model.field(f);
            FieldRef::new(field.sil_name.clone(), ctx.ir_type(&field.typ))
        })
        .collect();
    stmts.push(Stmt::New {
        target: target.clone(),
        fields,
    });
    let typeof_target = ctx.r#typeof(target.to_expr());
    let known = if class.is_generic() && hinted.is_none() {
        // type arguments unknown: only the class is fixed
        ctx.type_check(target.to_expr(), &typ)
    } else {
        ir::Expr::eq(typeof_target, ctx.type_literal(&typ))
    };
    stmts.push(Stmt::Inhale(known, pos));

    let object = Typed::new(target.to_expr(), typ);
    let init = model
        .get_member(cls, "__init__")
        .filter(|m| !model.method(*m).interface);
    match init {
        Some(init) => {
            call_member(ctx, init, Some(object.clone()), sources(args), keywords, e, stmts)?;
        }
        None if !args.is_empty() || !keywords.is_empty() => {
            return Err(ctx.invalid(
                "call.arguments",
                format!("`{}` takes no arguments", class.name),
                e.line,
                e.col,
            ))
        }
        None => {}
    }
    Ok(object)
}

/// Calls of built-in classes: conversions, ranges, empty collections, exceptions
fn construct_builtin(
    ctx: &mut MethodContext,
    cls: ClassId,
    args: &[Expr],
    e: &Expr,
    hint: Option<&PyType>,
    stmts: &mut Vec<Stmt>,
) -> Result<Typed> {
    let model = ctx.model;
    let name = model.class(cls).name.as_str();
    match (name, args) {
        ("int", []) => Ok(Typed::new(ir::Expr::int(0), ctx.builtin_type("int"))),
        ("bool", []) => Ok(Typed::new(ir::Expr::ff(), ctx.builtin_type("bool"))),
        ("int", [value]) => {
            let value = translate_expr(ctx, value, stmts)?;
            if !model.is_int(&value.typ) && !model.is_bool(&value.typ) {
                return Err(ctx.unsupported("conversion to `int`", e.line, e.col));
            }
            Ok(Typed::new(coerce(ctx, &value, &Type::Int), ctx.builtin_type("int")))
        }
        ("bool", [value]) => {
            let value = translate_expr(ctx, value, stmts)?;
            Ok(Typed::new(to_bool(ctx, &value), ctx.builtin_type("bool")))
        }
        ("range", [stop]) => {
            let stop = translate_as_int(ctx, stop, stmts)?;
            Ok(range_value(ctx, ir::Expr::int(0), stop))
        }
        ("range", [start, stop]) => {
            let start = translate_as_int(ctx, start, stmts)?;
            let stop = translate_as_int(ctx, stop, stmts)?;
            Ok(range_value(ctx, start, stop))
        }
        ("list", []) => translate_list(ctx, e, &[], hint, stmts),
        ("set", []) => translate_set(ctx, e, &[], hint, stmts),
        ("dict", []) => translate_dict(ctx, e, 0, hint, stmts),
        ("type", [value]) => {
            let value = translate_expr(ctx, value, stmts)?;
            let type_cls = model.builtin("type").unwrap_or_default();
            let object = to_ref(ctx, &value);
            Ok(Typed::new(ctx.r#typeof(object), PyType::generic(type_cls, vec![value.typ])))
        }
        _ if name == "object" || model.builtin("Exception").is_some_and(|exc| model.issubtype(cls, exc)) => {
            require_impure(ctx, &format!("construction of `{}`", name), e.line, e.col)?;
            // messages carry no verification content
            let pos = ctx.pos(e.line, e.col);
            let target = ctx.fresh_local(&name.to_lowercase(), Type::Ref);
            stmts.push(Stmt::New {
                target: target.clone(),
                fields: vec![],
            });
            let literal = TypeDomainFactory::raw_literal(model, cls);
            stmts.push(Stmt::Inhale(ir::Expr::eq(ctx.r#typeof(target.to_expr()), literal), pos));
            Ok(Typed::new(target.to_expr(), PyType::Class(cls)))
        }
        _ => Err(ctx.unsupported(format!("call of built-in `{}` with these arguments", name), e.line, e.col)),
    }
}

fn range_value(ctx: &MethodContext, start: ir::Expr, stop: ir::Expr) -> Typed {
    Typed::new(
        ir::Expr::func_app("range___create__", vec![start, stop], Type::Ref),
        ctx.builtin_type("range"),
    )
}

fn translate_as_int(ctx: &mut MethodContext, e: &Expr, stmts: &mut Vec<Stmt>) -> Result<ir::Expr> {
    let value = translate_expr(ctx, e, stmts)?;
    Ok(coerce(ctx, &value, &Type::Int))
}

// ============================================================================
// Built-in functions
// ============================================================================

fn expect_args(ctx: &MethodContext, name: &str, args: &[Expr], count: usize, e: &Expr) -> Result<()> {
    if args.len() != count {
        return Err(ctx.invalid(
            "call.arguments",
            format!("`{}` takes {} argument(s), {} given", name, count, args.len()),
            e.line,
            e.col,
        ));
    }
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn translate_builtin(
    ctx: &mut MethodContext,
    name: &str,
    args: &[Expr],
    keywords: &[Keyword],
    e: &Expr,
    hint: Option<&PyType>,
    stmts: &mut Vec<Stmt>,
) -> Result<Typed> {
    let model = ctx.model;
    match name {
        "isinstance" => {
            expect_args(ctx, name, args, 2, e)?;
            let value = translate_expr(ctx, &args[0], stmts)?;
            let classes = match &args[1].kind {
                ExprKind::Tuple { elts } => elts.iter().map(|c| class_ref(ctx, c)).collect::<Option<Vec<_>>>(),
                _ => class_ref(ctx, &args[1]).map(|c| vec![c]),
            };
            let Some(classes) = classes else {
                return Err(ctx.unsupported("`isinstance` with a computed class", e.line, e.col));
            };
            let object = to_ref(ctx, &value);
            let checks = classes.into_iter().map(|c| {
                TypeDomainFactory::issubtype(
                    TypeDomainFactory::r#typeof(object.clone()),
                    TypeDomainFactory::raw_literal(model, c),
                )
            });
            Ok(Typed::new(ir::Expr::disjoin(checks.collect_vec()), ctx.builtin_type("bool")))
        }
        "len" => {
            expect_args(ctx, name, args, 1, e)?;
            let value = translate_expr(ctx, &args[0], stmts)?;
            if let Type::Seq(_) = value.expr.typ() {
                return Ok(Typed::new(ir::Expr::seq_len(value.expr), ctx.builtin_type("int")));
            }
            call_magic(ctx, &value, "__len__", vec![], e, stmts)
        }
        "cast" => {
            expect_args(ctx, name, args, 2, e)?;
            let Some(annotation) = TypeExpr::from_annotation(&args[0]) else {
                return Err(ctx.unsupported("`cast` to a computed type", e.line, e.col));
            };
            let pos = ctx.source_pos(e.line, e.col);
            let target = resolve_type(model, ctx.module(), ctx.frame().cls, &annotation, Some(&pos))?;
            let value = translate_hinted(ctx, &args[1], Some(&target), stmts)?;
            Ok(Typed::new(value.expr, target))
        }
        "print" => {
            require_impure(ctx, "`print`", e.line, e.col)?;
            for arg in args {
                translate_expr(ctx, arg, stmts)?;
            }
            Ok(none(ctx))
        }
        "super" => Err(ctx.unsupported("`super()` outside of a method call", e.line, e.col)),
        "TypeVar" | "Generic" => Err(ctx.unsupported(format!("`{}` in an expression", name), e.line, e.col)),
        _ => match model.builtin(name) {
            Some(cls) => construct(ctx, cls, args, keywords, e, hint, stmts),
            None => Err(ctx.unsupported(format!("built-in `{}`", name), e.line, e.col)),
        },
    }
}

// ============================================================================
// IO operations and call slots
// ============================================================================

/// `op(args, results)` inside a contract: the operation's permission plus the
/// equalities fixing its results
fn io_operation_call(ctx: &mut MethodContext, op: IoOperationId, args: &[Expr], e: &Expr) -> Result<Typed> {
    let model = ctx.model;
    let io = model.io_operation(op);
    let arity = io.params.len();
    if args.len() != arity && args.len() != arity + io.results.len() {
        return Err(ctx.invalid(
            "call.arguments",
            format!("wrong number of arguments for IO operation `{}`", io.name),
            e.line,
            e.col,
        ));
    }
    let mut params = vec![];
    for (arg, var) in args.iter().zip(io.params.values()) {
        let typ = &model.var(*var).typ;
        let value = translate_pure(ctx, arg, Some(typ))?;
        params.push(coerce(ctx, &value, &ctx.ir_type(typ)));
    }
    let mut conjuncts = vec![ir::Expr::predicate_acc(io.sil_name.clone(), params.clone(), ir::Expr::FullPerm)];
    for (arg, (result, var)) in args[arity..].iter().zip(&io.results) {
        let typ = &model.var(*var).typ;
        let ir_type = ctx.ir_type(typ);
        let value = translate_pure(ctx, arg, Some(typ))?;
        let getter = ir::Expr::func_app(format!("{}_{}", io.sil_name, result), params.clone(), ir_type.clone());
        conjuncts.push(ir::Expr::eq(getter, coerce(ctx, &value, &ir_type)));
    }
    Ok(Typed::new(ir::Expr::conjoin(conjuncts), ctx.builtin_type("bool")))
}

fn call_slot_call(ctx: &mut MethodContext, slot: CallSlotId, args: &[Expr], e: &Expr) -> Result<Typed> {
    let model = ctx.model;
    let call_slot = model.call_slot(slot);
    if args.len() != call_slot.args.len() {
        return Err(ctx.invalid(
            "call.arguments",
            format!("wrong number of arguments for call slot `{}`", call_slot.name),
            e.line,
            e.col,
        ));
    }
    let mut values = vec![];
    for (arg, var) in args.iter().zip(call_slot.args.values()) {
        let typ = &model.var(*var).typ;
        let value = translate_pure(ctx, arg, Some(typ))?;
        values.push(coerce(ctx, &value, &ctx.ir_type(typ)));
    }
    Ok(Typed::new(
        ir::Expr::func_app(call_slot.sil_name.clone(), values, Type::Bool),
        ctx.builtin_type("bool"),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Defaults;
    use program_model::{analyze, InterfaceDecls, Model, SourceProgram};

    const POINT: &str = r#"{ "modules": [{ "name": "main", "path": "main.py", "body": [
        { "kind": "ClassDef", "name": "Point", "line": 1, "bases": [], "body": [
            { "kind": "FunctionDef", "name": "__init__", "line": 2,
              "args": { "args": [{ "name": "self" }, { "name": "x", "annotation": { "kind": "Name", "id": "int" } }] },
              "returns": { "kind": "None" },
              "body": [{ "kind": "Pass", "line": 3 }] }
        ] },
        { "kind": "Pass", "line": 5 }
    ] }] }"#;

    fn point_model() -> Model {
        let program = SourceProgram::from_json(POINT).unwrap();
        analyze(&program, &InterfaceDecls::builtins().unwrap()).unwrap()
    }

    fn call(func: &str, args: Vec<Expr>, keywords: Vec<Keyword>) -> Expr {
        Expr::new(
            ExprKind::Call {
                func: Box::new(Expr::new(ExprKind::Name { id: func.to_string() }, 6, 0)),
                args,
                keywords,
            },
            6,
            0,
        )
    }

    fn translate(model: &Model, e: &Expr) -> Result<(Typed, Vec<Stmt>)> {
        let mut types = TypeDomainFactory::new();
        let defaults = Defaults::new();
        let main = model.module(model.main_modules[0]).main.unwrap();
        let mut names = model.registry.clone();
        let mut ctx = MethodContext::new(model, &mut types, &defaults, &mut names, main);
        ctx.is_main = true;
        let mut stmts = vec![];
        let value = translate_expr(&mut ctx, e, &mut stmts)?;
        Ok((value, stmts))
    }

    #[test]
    fn test_constructor_allocates_and_calls_init() {
        let model = point_model();
        let e = call("Point", vec![Expr::new(ExprKind::Int { value: 3 }, 6, 6)], vec![]);
        let (value, stmts) = translate(&model, &e).unwrap();
        assert!(matches!(stmts[0], Stmt::New { .. }));
        assert!(matches!(stmts[1], Stmt::Inhale(..)));
        assert!(matches!(&stmts[2], Stmt::MethodCall { method, args, .. } if method == "Point___init__" && args.len() == 2));
        assert_eq!(value.typ.display(&model), "Point");
    }

    #[test]
    fn test_keyword_arguments_bind_by_name() {
        let model = point_model();
        let keyword = Keyword {
            arg: Some("x".to_string()),
            value: Expr::new(ExprKind::Int { value: 1 }, 6, 8),
        };
        let e = call("Point", vec![], vec![keyword]);
        let (_, stmts) = translate(&model, &e).unwrap();
        let Stmt::MethodCall { args, .. } = &stmts[2] else {
            panic!("expected a call of the initializer");
        };
        assert_eq!(args[1], ir::Expr::int(1));
    }

    #[test]
    fn test_missing_argument_is_reported() {
        let model = point_model();
        let err = translate(&model, &call("Point", vec![], vec![])).unwrap_err();
        assert_eq!(err.code(), "call.arguments");
    }

    #[test]
    fn test_isinstance_checks_subtype() {
        let model = point_model();
        let e = call(
            "isinstance",
            vec![
                Expr::new(ExprKind::Int { value: 1 }, 6, 11),
                Expr::new(ExprKind::Name { id: "int".to_string() }, 6, 14),
            ],
            vec![],
        );
        let (value, stmts) = translate(&model, &e).unwrap();
        assert!(stmts.is_empty());
        assert!(matches!(value.expr, ir::Expr::DomainFuncApp { ref name, .. } if name == "issubtype"));
    }
}

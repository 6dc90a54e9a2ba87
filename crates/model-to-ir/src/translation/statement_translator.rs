// Copyright (c) Asymptotic Labs
// SPDX-License-Identifier: Apache-2.0

//! Statement translation from method bodies to IR statements
//!
//! Single responsibility: lower a body to a label-and-goto state machine.
//! Non-local exits (`return`, `break`, `continue`, raised exceptions) are routed
//! through the protected regions and loops of the current frame. A region with
//! a finally block records a continuation code and jumps to its finally label,
//! a handler whose class may match receives the exception, and whatever is left
//! reaches the frame's end label or fails verification.

use super::call_translator::{call_magic, call_member, call_method, CallArg};
use super::expression_translator::{
    class_ref, module_ref, resolve, translate_assertion, translate_bool, translate_expr, translate_hinted,
};
use super::utilities::{coerce, join_types, require_impure, to_ref};
use crate::context::{is_mutable_global, Exit, MethodContext, Phase, Region, Typed};
use crate::prelude::{container, is_defined, iter_index, list_acc, previous};
use crate::type_domain::TypeDomainFactory;
use itertools::Itertools;
use program_model::analyzer::names::Binding;
use program_model::{
    ClassId, Expr, ExprKind, PyType, Result, Stmt, StmtKind, TryBlockId, VarId, VarKind, WithContext,
};
use verification_ir::{self as ir, BinOp, FieldRef, LocalVar, Type};

pub fn translate_block(ctx: &mut MethodContext, body: &[Stmt]) -> Result<Vec<ir::Stmt>> {
    let mut out = vec![];
    for stmt in body {
        translate_stmt(ctx, stmt, &mut out)?;
    }
    Ok(out)
}

pub fn translate_stmt(ctx: &mut MethodContext, s: &Stmt, out: &mut Vec<ir::Stmt>) -> Result<()> {
    let pos = ctx.pos(s.line, s.col);
    match &s.kind {
        StmtKind::FunctionDef { .. }
        | StmtKind::ClassDef { .. }
        | StmtKind::Import { .. }
        | StmtKind::ImportFrom { .. }
        | StmtKind::Global { .. }
        | StmtKind::Pass => Ok(()),
        StmtKind::Expr { value } => {
            // docstrings and loop invariants already collected by the analyzer
            if matches!(value.kind, ExprKind::Str { .. }) || matches!(s.as_call(), Some(("Invariant", _))) {
                return Ok(());
            }
            translate_expr(ctx, value, out)?;
            Ok(())
        }
        StmtKind::Assign { targets, value } => {
            if matches!(value.as_named_call(), Some(("TypeVar", _))) {
                return Ok(());
            }
            let hint = targets.first().and_then(|t| target_hint(ctx, t));
            let mut assigned = translate_hinted(ctx, value, hint.as_ref(), out)?;
            if targets.len() > 1 {
                let temp = ctx.fresh_local("assigned", assigned.expr.typ());
                out.push(ir::Stmt::assign(temp.clone(), assigned.expr));
                assigned = Typed::new(temp.to_expr(), assigned.typ);
            }
            for target in targets {
                assign_to(ctx, target, &assigned, out)?;
            }
            Ok(())
        }
        StmtKind::AnnAssign { value: None, .. } => Ok(()),
        StmtKind::AnnAssign {
            target,
            value: Some(value),
            ..
        } => {
            let hint = target_hint(ctx, target);
            let assigned = translate_hinted(ctx, value, hint.as_ref(), out)?;
            assign_to(ctx, target, &assigned, out)
        }
        StmtKind::AugAssign { target, op, value } => {
            let combined = Expr::new(
                ExprKind::BinOp {
                    left: Box::new(target.clone()),
                    op: *op,
                    right: Box::new(value.clone()),
                },
                s.line,
                s.col,
            );
            let hint = target_hint(ctx, target);
            let assigned = translate_hinted(ctx, &combined, hint.as_ref(), out)?;
            assign_to(ctx, target, &assigned, out)
        }
        StmtKind::If { test, body, orelse } => {
            let cond = translate_bool(ctx, test, out)?;
            let then = translate_block(ctx, body)?;
            let els = translate_block(ctx, orelse)?;
            out.push(ir::Stmt::If { cond, then, els });
            Ok(())
        }
        StmtKind::While { test, body, .. } => translate_while(ctx, s, test, body, out),
        StmtKind::For { target, iter, body, .. } => translate_for(ctx, s, target, iter, body, out),
        StmtKind::Try { .. } | StmtKind::With { .. } => translate_try(ctx, s, out),
        StmtKind::Raise { exc: Some(exc) } => translate_raise(ctx, s, exc, out),
        StmtKind::Raise { exc: None } => Err(ctx.unsupported("re-raise without an exception", s.line, s.col)),
        StmtKind::Return { value } => {
            if let Some(value) = value {
                let declared = ctx.model.method(ctx.method()).return_type.clone();
                let returned = translate_hinted(ctx, value, declared.as_ref(), out)?;
                // procedures without a result only evaluate the value
                if let Some(ir::Expr::Local(result)) = ctx.frame().result.clone() {
                    let converted = coerce(ctx, &returned, &result.typ);
                    out.push(ir::Stmt::assign(result, converted));
                }
            }
            out.extend(route_exit(ctx, Exit::Return, s.line, s.col)?);
            Ok(())
        }
        StmtKind::Break => {
            out.extend(route_exit(ctx, Exit::Break, s.line, s.col)?);
            Ok(())
        }
        StmtKind::Continue => {
            out.extend(route_exit(ctx, Exit::Continue, s.line, s.col)?);
            Ok(())
        }
        StmtKind::Assert { test, .. } => {
            let cond = translate_bool(ctx, test, out)?;
            out.push(ir::Stmt::Assert(cond, pos));
            Ok(())
        }
    }
}

// ============================================================================
// Assignment
// ============================================================================

/// Declared type of an assignment target, used as the value's type hint
fn target_hint(ctx: &MethodContext, target: &Expr) -> Option<PyType> {
    match &target.kind {
        ExprKind::Name { id } => match resolve(ctx, id)? {
            Binding::Var(var) => Some(ctx.model.var(var).type_at(target.line, target.col).clone()),
            _ => None,
        },
        _ => None,
    }
}

/// Store an already evaluated value into an assignment target
pub fn assign_to(ctx: &mut MethodContext, target: &Expr, value: &Typed, out: &mut Vec<ir::Stmt>) -> Result<()> {
    match &target.kind {
        ExprKind::Name { id } => match resolve(ctx, id) {
            Some(Binding::Var(var)) => assign_var(ctx, var, value, target.line, target.col, out),
            _ => Err(ctx.unsupported(format!("assignment to `{}`", id), target.line, target.col)),
        },
        ExprKind::Attribute { value: receiver, attr } => assign_attribute(ctx, target, receiver, attr, value, out),
        ExprKind::Subscript {
            value: collection,
            slice,
        } => {
            let collection = translate_expr(ctx, collection, out)?;
            let args = vec![CallArg::Source(slice.as_ref()), CallArg::Value(value.clone())];
            call_magic(ctx, &collection, "__setitem__", args, target, out)?;
            Ok(())
        }
        ExprKind::Tuple { elts } | ExprKind::List { elts } => unpack(ctx, target, elts, value, out),
        _ => Err(ctx.unsupported("assignment target", target.line, target.col)),
    }
}

/// IR local holding a source variable of the current frame
fn variable_local(ctx: &mut MethodContext, var: VarId) -> LocalVar {
    match ctx.var_expr(var) {
        ir::Expr::Local(local) => local,
        _ => {
            let v = ctx.model.var(var);
            LocalVar::new(v.sil_name.clone(), ctx.ir_type(&v.typ))
        }
    }
}

fn assign_var(
    ctx: &mut MethodContext,
    var: VarId,
    value: &Typed,
    line: usize,
    col: usize,
    out: &mut Vec<ir::Stmt>,
) -> Result<()> {
    let model = ctx.model;
    let v = model.var(var);
    let module_level = ctx.is_main && ctx.frames.len() == 1;
    match v.kind {
        VarKind::Global if !is_mutable_global(model, var) => define_global(ctx, var, value, line, col, out),
        VarKind::Global if !module_level => Err(ctx.unsupported(
            format!("assignment to global `{}` outside module-level code", v.name),
            line,
            col,
        )),
        VarKind::StaticField => Err(ctx.unsupported(format!("assignment to static field `{}`", v.name), line, col)),
        _ => {
            let aliased = ctx.frame().aliases.contains_key(&var);
            let local = variable_local(ctx, var);
            let converted = coerce(ctx, value, &local.typ);
            out.push(ir::Stmt::assign(local, converted));
            if matches!(v.kind, VarKind::Local | VarKind::Global) && !aliased {
                out.push(ir::Stmt::Inhale(is_defined(v.id as i64), ctx.pos(line, col)));
            }
            Ok(())
        }
    }
}

/// The single defining assignment of a constant global fixes its accessor's value
fn define_global(
    ctx: &mut MethodContext,
    var: VarId,
    value: &Typed,
    line: usize,
    col: usize,
    out: &mut Vec<ir::Stmt>,
) -> Result<()> {
    let model = ctx.model;
    let v = model.var(var);
    if !(ctx.is_main && ctx.frames.len() == 1) || ctx.assigned_globals.contains(&var) {
        return Err(ctx.unsupported(format!("reassignment of global `{}`", v.name), line, col));
    }
    ctx.assigned_globals.insert(var);
    let typ = ctx.ir_type(&v.typ);
    let current = ir::Expr::func_app(v.sil_name.clone(), vec![], typ.clone());
    let defined = ir::Expr::and(
        is_defined(v.id as i64),
        ir::Expr::eq(current, coerce(ctx, value, &typ)),
    );
    out.push(ir::Stmt::Inhale(defined, ctx.pos(line, col)));
    Ok(())
}

fn assign_attribute(
    ctx: &mut MethodContext,
    target: &Expr,
    receiver: &Expr,
    attr: &str,
    value: &Typed,
    out: &mut Vec<ir::Stmt>,
) -> Result<()> {
    let model = ctx.model;
    if module_ref(ctx, receiver).is_some() || class_ref(ctx, receiver).is_some() {
        return Err(ctx.unsupported(
            format!("assignment to class or module attribute `{}`", attr),
            target.line,
            target.col,
        ));
    }
    let object = translate_expr(ctx, receiver, out)?;
    let cls = object.typ.cls(model);
    if let Some(field) = model.get_field(cls, attr) {
        let root = model.field(model.root_field(field));
        let field = FieldRef::new(root.sil_name.clone(), ctx.ir_type(&root.typ));
        let converted = coerce(ctx, value, &field.typ);
        out.push(ir::Stmt::FieldAssign {
            receiver: to_ref(ctx, &object),
            field,
            value: converted,
        });
        return Ok(());
    }
    let setter = model.get_member(cls, attr).and_then(|m| model.method(m).setter);
    let Some(setter) = setter else {
        return Err(ctx.invalid(
            "attribute.unknown",
            format!("`{}` has no assignable attribute `{}`", object.typ.display(model), attr),
            target.line,
            target.col,
        ));
    };
    call_member(ctx, setter, Some(object), vec![CallArg::Value(value.clone())], &[], target, out)?;
    Ok(())
}

/// `a, *b, c = value` over a tuple or list
fn unpack(ctx: &mut MethodContext, target: &Expr, elts: &[Expr], value: &Typed, out: &mut Vec<ir::Stmt>) -> Result<()> {
    let model = ctx.model;
    let cls = value.typ.cls(model);
    let kind = if model.is_builtin(cls, "tuple") {
        "tuple"
    } else if model.is_builtin(cls, "list") {
        "list"
    } else {
        return Err(ctx.unsupported(
            format!("unpacking of `{}`", value.typ.display(model)),
            target.line,
            target.col,
        ));
    };
    let pos = ctx.pos(target.line, target.col);
    let source = ctx.fresh_local("unpacked", Type::Ref);
    out.push(ir::Stmt::assign(source.clone(), to_ref(ctx, value)));

    let len = ir::Expr::func_app(format!("{}___len__", kind), vec![source.to_expr()], Type::Int);
    let count = elts.len() as i64;
    let starred = elts.iter().position(|e| matches!(e.kind, ExprKind::Starred { .. }));
    let length_ok = match starred {
        None => ir::Expr::eq(len.clone(), ir::Expr::int(count)),
        Some(_) => ir::Expr::binary(BinOp::Ge, len.clone(), ir::Expr::int(count - 1)),
    };
    out.push(ir::Stmt::Assert(length_ok, pos));

    for (position, elt) in elts.iter().enumerate() {
        if let ExprKind::Starred { value: inner } = &elt.kind {
            let rest = unpack_rest(ctx, kind, &source, &value.typ, position as i64, count, &len, elt, out);
            assign_to(ctx, inner, &rest, out)?;
            continue;
        }
        // positions after the starred target count from the end
        let index = match starred {
            Some(star) if position > star => {
                ir::Expr::binary(BinOp::Sub, len.clone(), ir::Expr::int(count - position as i64))
            }
            _ => ir::Expr::int(position as i64),
        };
        let item = ir::Expr::func_app(format!("{}___getitem__", kind), vec![source.to_expr(), index], Type::Ref);
        let typ = unpacked_type(ctx, &value.typ, starred.is_none().then_some(position));
        assign_to(ctx, elt, &Typed::new(item, typ), out)?;
    }
    Ok(())
}

/// Static type of an unpacked element; `position` only for exact tuple shapes
fn unpacked_type(ctx: &MethodContext, typ: &PyType, position: Option<usize>) -> PyType {
    let model = ctx.model;
    let args = typ.type_args();
    let exact_tuple = model.is_builtin(typ.cls(model), "tuple") && matches!(typ, PyType::Generic { exact_length: true, .. });
    match position {
        Some(position) if exact_tuple => args.get(position).cloned().unwrap_or_else(|| ctx.builtin_type("object")),
        _ if args.is_empty() => ctx.builtin_type("object"),
        _ => join_types(model, args),
    }
}

/// The list bound by a starred target
#[allow(clippy::too_many_arguments)]
fn unpack_rest(
    ctx: &mut MethodContext,
    kind: &str,
    source: &LocalVar,
    typ: &PyType,
    star: i64,
    count: i64,
    len: &ir::Expr,
    e: &Expr,
    out: &mut Vec<ir::Stmt>,
) -> Typed {
    let model = ctx.model;
    let elem = unpacked_type(ctx, typ, None);
    let list_type = PyType::generic(model.builtin("list").unwrap_or_default(), vec![elem]);
    let elems = match kind {
        "tuple" => ir::Expr::func_app("tuple___val__", vec![source.to_expr()], Type::seq(Type::Ref)),
        _ => ir::Expr::field(source.to_expr(), list_acc()),
    };
    let end = ir::Expr::binary(BinOp::Sub, len.clone(), ir::Expr::int(count - star - 1));
    let rest = ir::Expr::seq_drop(ir::Expr::seq_take(elems, end), ir::Expr::int(star));

    let target = ctx.fresh_local("rest", Type::Ref);
    out.push(ir::Stmt::New {
        target: target.clone(),
        fields: vec![list_acc()],
    });
    let literal = ctx.type_literal(&list_type);
    out.push(ir::Stmt::Inhale(
        ir::Expr::eq(ctx.r#typeof(target.to_expr()), literal),
        ctx.pos(e.line, e.col),
    ));
    out.push(ir::Stmt::FieldAssign {
        receiver: target.to_expr(),
        field: list_acc(),
        value: rest,
    });
    Typed::new(target.to_expr(), list_type)
}

// ============================================================================
// Loops
// ============================================================================

fn translate_while(
    ctx: &mut MethodContext,
    s: &Stmt,
    test: &Expr,
    body: &[Stmt],
    out: &mut Vec<ir::Stmt>,
) -> Result<()> {
    require_impure(ctx, "a loop", s.line, s.col)?;
    // statements computing the condition run again at the end of every iteration
    let mut check = vec![];
    let cond = translate_bool(ctx, test, &mut check)?;
    out.extend(check.clone());

    let break_label = ctx.fresh_label("loop_end");
    let continue_label = ctx.fresh_label("loop_continue");
    let invariants = loop_invariants(ctx, s, body)?;
    let mut inner = in_loop(ctx, break_label.clone(), continue_label.clone(), body)?;
    inner.push(ir::Stmt::label(continue_label));
    inner.extend(check);
    out.push(ir::Stmt::While {
        cond,
        invariants,
        body: inner,
    });
    out.push(ir::Stmt::label(break_label));
    Ok(())
}

/// `for target in iter` over a list or range, driven by an explicit iterator
fn translate_for(
    ctx: &mut MethodContext,
    s: &Stmt,
    target: &Expr,
    iter: &Expr,
    body: &[Stmt],
    out: &mut Vec<ir::Stmt>,
) -> Result<()> {
    let model = ctx.model;
    require_impure(ctx, "a loop", s.line, s.col)?;
    let collection = translate_expr(ctx, iter, out)?;
    let cls = collection.typ.cls(model);
    let (kind, elem_type) = if model.is_builtin(cls, "list") {
        let elem = collection.typ.type_args().first().cloned();
        ("list", elem.unwrap_or_else(|| ctx.builtin_type("object")))
    } else if model.is_builtin(cls, "range") {
        ("range", ctx.builtin_type("int"))
    } else {
        return Err(ctx.unsupported(
            format!("iteration over `{}`", collection.typ.display(model)),
            iter.line,
            iter.col,
        ));
    };
    let pos = ctx.pos(s.line, s.col);

    let iterable = ctx.fresh_local("iterable", Type::Ref);
    out.push(ir::Stmt::assign(iterable.clone(), to_ref(ctx, &collection)));
    let iterator = ctx.fresh_local("iter", Type::Ref);
    out.push(ir::Stmt::call(
        format!("{}___iter__", kind),
        vec![iterable.to_expr()],
        vec![iterator.clone()],
        pos.clone(),
    ));

    // fetch the next element and bind it to the target while there is one
    let item = ctx.fresh_local("loop_item", Type::Ref);
    let error = ctx.fresh_local("loop_err", Type::Ref);
    let proceed = ir::Expr::eq(error.to_expr(), ir::Expr::Null);
    let mut bind = vec![];
    if ctx.ir_type(&elem_type) == Type::Ref {
        // element types are not tracked by the collection encoding
        bind.push(ir::Stmt::Inhale(ctx.type_check(item.to_expr(), &elem_type), pos.clone()));
    }
    assign_to(ctx, target, &Typed::new(item.to_expr(), elem_type.clone()), &mut bind)?;
    let advance = vec![
        ir::Stmt::call(
            "Iterator___next__",
            vec![iterator.to_expr()],
            vec![item.clone(), error.clone()],
            pos.clone(),
        ),
        ir::Stmt::if_then(proceed.clone(), bind),
    ];
    out.extend(advance.clone());

    let target_var = match &target.kind {
        ExprKind::Name { id } => match resolve(ctx, id) {
            Some(Binding::Var(var)) => Some(var),
            _ => None,
        },
        _ => None,
    };
    if let Some(var) = target_var {
        ctx.loop_iterators.insert(var, iterator.clone());
    }

    let break_label = ctx.fresh_label("loop_end");
    let continue_label = ctx.fresh_label("loop_continue");
    let state = IterationState {
        kind,
        iterable: &iterable,
        iterator: &iterator,
        item: &item,
        error: &error,
    };
    let mut invariants = iteration_invariants(ctx, &state, target_var, &elem_type);
    invariants.extend(loop_invariants(ctx, s, body)?);
    let mut inner = in_loop(ctx, break_label.clone(), continue_label.clone(), body)?;
    inner.push(ir::Stmt::label(continue_label));
    inner.extend(advance);
    out.push(ir::Stmt::While {
        cond: proceed,
        invariants,
        body: inner,
    });
    out.push(ir::Stmt::label(break_label));
    out.push(ir::Stmt::call("Iterator___del__", vec![iterator.to_expr()], vec![], pos));

    if let Some(var) = target_var {
        ctx.loop_iterators.remove(&var);
    }
    Ok(())
}

struct IterationState<'l> {
    kind: &'l str,
    iterable: &'l LocalVar,
    iterator: &'l LocalVar,
    item: &'l LocalVar,
    error: &'l LocalVar,
}

/// Iterator permissions, sequence equality, index bounds and the
/// correspondence between the current element and the loop target
fn iteration_invariants(
    ctx: &mut MethodContext,
    state: &IterationState,
    target_var: Option<VarId>,
    elem_type: &PyType,
) -> Vec<ir::Expr> {
    let iter = state.iterator.to_expr();
    let iterable = state.iterable.to_expr();
    let elems = ir::Expr::field(iter.clone(), list_acc());
    let index = ir::Expr::field(iter.clone(), iter_index());
    let prev = ir::Expr::field(iter.clone(), previous());
    let source = match state.kind {
        "list" => ir::Expr::field(iterable.clone(), list_acc()),
        _ => ir::Expr::func_app("range___sil_seq__", vec![iterable.clone()], Type::seq(Type::Ref)),
    };
    let full = |f: FieldRef| ir::Expr::field_acc(iter.clone(), f, ir::Expr::FullPerm);

    let mut invariants = vec![ir::Expr::field_acc(iter.clone(), list_acc(), ir::Expr::fraction(1, 20))];
    if state.kind == "list" {
        invariants.push(ir::Expr::field_acc(iterable.clone(), list_acc(), ir::Expr::fraction(1, 20)));
    }
    invariants.extend([
        ir::Expr::eq(elems.clone(), source),
        full(container()),
        ir::Expr::eq(ir::Expr::field(iter.clone(), container()), iterable),
        full(iter_index()),
        full(previous()),
        ir::Expr::and(
            ir::Expr::binary(BinOp::Le, ir::Expr::int(0), index.clone()),
            ir::Expr::binary(BinOp::Le, index.clone(), ir::Expr::seq_len(elems.clone())),
        ),
    ]);

    let proceed = ir::Expr::eq(state.error.to_expr(), ir::Expr::Null);
    let current = ir::Expr::binary(BinOp::Sub, index.clone(), ir::Expr::int(1));
    let mut produced = vec![
        ir::Expr::binary(BinOp::Gt, index.clone(), ir::Expr::int(0)),
        ir::Expr::eq(state.item.to_expr(), ir::Expr::seq_index(elems.clone(), current.clone())),
        ir::Expr::eq(prev.clone(), ir::Expr::seq_take(elems.clone(), current)),
    ];
    let item = Typed::new(state.item.to_expr(), elem_type.clone());
    if ctx.ir_type(elem_type) == Type::Ref {
        produced.push(ctx.type_check(state.item.to_expr(), elem_type));
    }
    if let Some(var) = target_var.filter(|v| !ctx.frame().aliases.contains_key(v)) {
        let model = ctx.model;
        let v = model.var(var);
        let value = ctx.var_expr(var);
        if matches!(v.kind, VarKind::Local | VarKind::Global) {
            produced.push(is_defined(v.id as i64));
        }
        produced.push(ir::Expr::eq(value.clone(), coerce(ctx, &item, &value.typ())));
    }
    invariants.push(ir::Expr::implies(proceed.clone(), ir::Expr::conjoin(produced)));
    invariants.push(ir::Expr::implies(
        ir::Expr::not(proceed),
        ir::Expr::and(
            ir::Expr::eq(prev, elems.clone()),
            ir::Expr::eq(index, ir::Expr::seq_len(elems)),
        ),
    ));
    invariants
}

/// User invariants plus type facts for every variable the body assigns
fn loop_invariants(ctx: &mut MethodContext, s: &Stmt, body: &[Stmt]) -> Result<Vec<ir::Expr>> {
    let model = ctx.model;
    let mut invariants = vec![];
    for var in assigned_vars(ctx, body) {
        let v = model.var(var);
        if ctx.frame().aliases.contains_key(&var) || ctx.ir_type(&v.typ) != Type::Ref {
            continue;
        }
        let value = ctx.var_expr(var);
        let check = ctx.type_check(value, &v.typ);
        match v.kind {
            VarKind::Arg => invariants.push(check),
            VarKind::Local | VarKind::Global => {
                invariants.push(ir::Expr::implies(is_defined(v.id as i64), check))
            }
            _ => {}
        }
    }
    let declared = model
        .method(ctx.method())
        .loop_invariants
        .get(&s.id)
        .cloned()
        .unwrap_or_default();
    for invariant in &declared {
        invariants.push(translate_assertion(ctx, invariant)?);
    }
    Ok(invariants)
}

/// Variables written by a loop body, in order of first write
fn assigned_vars(ctx: &MethodContext, body: &[Stmt]) -> Vec<VarId> {
    let mut names = vec![];
    for stmt in body {
        stmt.walk(&mut |s| match &s.kind {
            StmtKind::Assign { targets, .. } => targets.iter().for_each(|t| target_names(t, &mut names)),
            StmtKind::AnnAssign { target, .. } | StmtKind::AugAssign { target, .. } | StmtKind::For { target, .. } => {
                target_names(target, &mut names)
            }
            StmtKind::Try { handlers, .. } => names.extend(handlers.iter().filter_map(|h| h.name.clone())),
            StmtKind::With { items, .. } => items
                .iter()
                .filter_map(|i| i.optional_vars.as_ref())
                .for_each(|t| target_names(t, &mut names)),
            _ => {}
        });
    }
    names
        .iter()
        .filter_map(|name| match resolve(ctx, name) {
            Some(Binding::Var(var)) if !is_constant(ctx, var) => Some(var),
            _ => None,
        })
        .unique()
        .collect()
}

fn is_constant(ctx: &MethodContext, var: VarId) -> bool {
    ctx.model.var(var).kind == VarKind::Global && !is_mutable_global(ctx.model, var)
}

fn target_names(target: &Expr, out: &mut Vec<String>) {
    match &target.kind {
        ExprKind::Name { id } => out.push(id.clone()),
        ExprKind::Tuple { elts } | ExprKind::List { elts } => elts.iter().for_each(|e| target_names(e, out)),
        ExprKind::Starred { value } => target_names(value, out),
        _ => {}
    }
}

fn in_loop(
    ctx: &mut MethodContext,
    break_label: String,
    continue_label: String,
    body: &[Stmt],
) -> Result<Vec<ir::Stmt>> {
    ctx.loop_depth += 1;
    let region = Region::Loop {
        break_label,
        continue_label,
    };
    let result = with_region(ctx, region, |ctx| translate_block(ctx, body));
    ctx.loop_depth -= 1;
    result
}

fn with_region<'a, T>(
    ctx: &mut MethodContext<'a>,
    region: Region,
    f: impl FnOnce(&mut MethodContext<'a>) -> Result<T>,
) -> Result<T> {
    ctx.frame_mut().regions.push(region);
    let result = f(ctx);
    ctx.frame_mut().regions.pop();
    result
}

// ============================================================================
// Protected regions
// ============================================================================

fn translate_try(ctx: &mut MethodContext, s: &Stmt, out: &mut Vec<ir::Stmt>) -> Result<()> {
    let model = ctx.model;
    require_impure(ctx, "a protected region", s.line, s.col)?;
    let Some(block) = model
        .method(ctx.method())
        .try_blocks
        .iter()
        .copied()
        .find(|b| model.try_block(*b).node == s.id)
    else {
        return Err(ctx.unsupported("protected region unknown to the analyzer", s.line, s.col));
    };
    let b = model.try_block(block);
    let depth = ctx.frame().regions.len();
    let error = variable_local(ctx, b.error_var);
    let code = variable_local(ctx, b.finally_var);

    let manager = match &b.with_context {
        Some(with) => Some(enter_context(ctx, with, out)?),
        None => None,
    };
    out.push(ir::Stmt::assign(code.clone(), ir::Expr::int(0)));
    out.push(ir::Stmt::assign(error.clone(), ir::Expr::Null));
    let try_label = ctx.label(&b.try_name);
    let post_label = ctx.label(&b.post_name);
    let finally_label = b.has_finally().then(|| ctx.label(&b.finally_name));
    let done = finally_label.clone().unwrap_or_else(|| post_label.clone());

    out.push(ir::Stmt::label(try_label));
    out.extend(in_protected(ctx, block, Phase::Body, &b.body)?);
    if let Some(else_body) = &b.else_body {
        out.push(ir::Stmt::label(ctx.label(&b.else_name)));
        out.extend(in_protected(ctx, block, Phase::Else, else_body)?);
    }
    out.push(ir::Stmt::goto(done.clone()));

    for handler in &b.handlers {
        out.push(ir::Stmt::label(ctx.label(&handler.label)));
        if let Some(var) = handler.var {
            let caught = Typed::new(error.to_expr(), model.class_type(handler.exception));
            assign_var(ctx, var, &caught, handler.pos.line, handler.pos.col, out)?;
        }
        out.push(ir::Stmt::assign(error.clone(), ir::Expr::Null));
        out.extend(in_protected(ctx, block, Phase::Handler, &handler.body)?);
        out.push(ir::Stmt::goto(done.clone()));
    }

    if let Some(finally_label) = finally_label {
        out.push(ir::Stmt::label(finally_label));
        match (&b.finally_body, &b.with_context, manager) {
            (Some(body), _, _) => out.extend(in_protected(ctx, block, Phase::Finally, body)?),
            (None, Some(with), Some(manager)) => {
                let region = Region::Try {
                    block,
                    phase: Phase::Finally,
                };
                let exited = with_region(ctx, region, |ctx| {
                    let mut stmts = vec![];
                    exit_context(ctx, with, &manager, &mut stmts)?;
                    Ok(stmts)
                })?;
                out.extend(exited);
            }
            _ => {}
        }
        out.extend(finally_dispatch(ctx, block, &code, &error, depth, s)?);
    }
    out.push(ir::Stmt::label(post_label));
    Ok(())
}

fn in_protected(ctx: &mut MethodContext, block: TryBlockId, phase: Phase, body: &[Stmt]) -> Result<Vec<ir::Stmt>> {
    with_region(ctx, Region::Try { block, phase }, |ctx| translate_block(ctx, body))
}

/// Evaluate the context manager, call `__enter__` and bind its result
fn enter_context(ctx: &mut MethodContext, with: &WithContext, out: &mut Vec<ir::Stmt>) -> Result<Typed> {
    let model = ctx.model;
    let value = translate_expr(ctx, &with.context_expr, out)?;
    let local = variable_local(ctx, with.manager_var);
    out.push(ir::Stmt::assign(local.clone(), to_ref(ctx, &value)));
    let manager = Typed::new(local.to_expr(), model.var(with.manager_var).typ.clone());
    let entered = call_method(ctx, &manager, "__enter__", vec![], &[], &with.context_expr, out)?;
    if let Some(target) = &with.target {
        assign_to(ctx, target, &entered, out)?;
    }
    Ok(manager)
}

fn exit_context(ctx: &mut MethodContext, with: &WithContext, manager: &Typed, out: &mut Vec<ir::Stmt>) -> Result<()> {
    let none = Typed::new(ir::Expr::Null, ctx.builtin_type("NoneType"));
    let args = vec![
        CallArg::Value(none.clone()),
        CallArg::Value(none.clone()),
        CallArg::Value(none),
    ];
    call_method(ctx, manager, "__exit__", args, &[], &with.context_expr, out)?;
    Ok(())
}

/// Continue every exit that was suspended to run the finally block
fn finally_dispatch(
    ctx: &mut MethodContext,
    block: TryBlockId,
    code: &LocalVar,
    error: &LocalVar,
    depth: usize,
    s: &Stmt,
) -> Result<Vec<ir::Stmt>> {
    let exception = ctx.model.builtin("Exception").unwrap_or_default();
    let codes = ctx.finally_codes.get(&block).cloned().unwrap_or_default();
    let mut out = vec![];
    for value in codes {
        let exit = match value {
            1 => Exit::Return,
            2 => Exit::Exception(error.to_expr(), exception),
            3 => Exit::Break,
            _ => Exit::Continue,
        };
        let resumed = route_from(ctx, exit, depth, s.line, s.col)?;
        out.push(ir::Stmt::if_then(
            ir::Expr::eq(code.to_expr(), ir::Expr::int(value)),
            resumed,
        ));
    }
    Ok(out)
}

// ============================================================================
// Exits
// ============================================================================

fn translate_raise(ctx: &mut MethodContext, s: &Stmt, exc: &Expr, out: &mut Vec<ir::Stmt>) -> Result<()> {
    let raised = if class_ref(ctx, exc).is_some() {
        // `raise E` instantiates `E`
        let instantiate = Expr::new(
            ExprKind::Call {
                func: Box::new(exc.clone()),
                args: vec![],
                keywords: vec![],
            },
            exc.line,
            exc.col,
        );
        translate_expr(ctx, &instantiate, out)?
    } else {
        translate_expr(ctx, exc, out)?
    };
    let model = ctx.model;
    let cls = raised.typ.cls(model);
    let exception = model.builtin("Exception").unwrap_or_default();
    if !model.issubtype(cls, exception) {
        return Err(ctx.invalid(
            "invalid.raise",
            format!("`{}` is not an exception", raised.typ.display(model)),
            s.line,
            s.col,
        ));
    }
    let error = to_ref(ctx, &raised);
    out.extend(route_exit(ctx, Exit::Exception(error, cls), s.line, s.col)?);
    Ok(())
}

/// Propagate an exception raised at the current position
pub fn route_exception(
    ctx: &mut MethodContext,
    error: ir::Expr,
    cls: ClassId,
    line: usize,
    col: usize,
) -> Result<Vec<ir::Stmt>> {
    route_exit(ctx, Exit::Exception(error, cls), line, col)
}

fn route_exit(ctx: &mut MethodContext, exit: Exit, line: usize, col: usize) -> Result<Vec<ir::Stmt>> {
    let depth = ctx.frame().regions.len();
    route_from(ctx, exit, depth, line, col)
}

/// Route `exit` through the regions of the current frame below `depth`
fn route_from(ctx: &mut MethodContext, exit: Exit, depth: usize, line: usize, col: usize) -> Result<Vec<ir::Stmt>> {
    let model = ctx.model;
    for index in (0..depth).rev() {
        let region = ctx.frame().regions[index].clone();
        match (region, &exit) {
            (Region::Loop { break_label, .. }, Exit::Break) => return Ok(vec![ir::Stmt::goto(break_label)]),
            (Region::Loop { continue_label, .. }, Exit::Continue) => return Ok(vec![ir::Stmt::goto(continue_label)]),
            (Region::Loop { .. }, _) => {}
            (
                Region::Try {
                    block,
                    phase: Phase::Body,
                },
                Exit::Exception(error, cls),
            ) => return catch(ctx, block, error.clone(), *cls, index, line, col),
            (Region::Try { phase: Phase::Finally, .. }, _) => {}
            (Region::Try { block, .. }, _) => {
                if model.try_block(block).has_finally() {
                    return Ok(enter_finally(ctx, block, &exit));
                }
            }
        }
    }
    leave_frame(ctx, exit, line, col)
}

/// Dispatch an exception raised in a protected body to the handlers that may match
#[allow(clippy::too_many_arguments)]
fn catch(
    ctx: &mut MethodContext,
    block: TryBlockId,
    error: ir::Expr,
    cls: ClassId,
    depth: usize,
    line: usize,
    col: usize,
) -> Result<Vec<ir::Stmt>> {
    let model = ctx.model;
    let b = model.try_block(block);
    let holder = variable_local(ctx, b.error_var);
    let mut out = vec![];
    if error != holder.to_expr() {
        out.push(ir::Stmt::assign(holder.clone(), error));
    }
    let mut branches = vec![];
    let mut covered = false;
    for handler in &b.handlers {
        let always = model.issubtype(cls, handler.exception);
        if !always && !model.issubtype(handler.exception, cls) {
            continue;
        }
        let guard = TypeDomainFactory::issubtype(
            ctx.r#typeof(holder.to_expr()),
            TypeDomainFactory::raw_literal(model, handler.exception),
        );
        branches.push((guard, vec![ir::Stmt::goto(ctx.label(&handler.label))]));
        if always {
            covered = true;
            break;
        }
    }
    let fallback = if covered {
        vec![]
    } else if b.has_finally() {
        enter_finally(ctx, block, &Exit::Exception(holder.to_expr(), cls))
    } else {
        route_from(ctx, Exit::Exception(holder.to_expr(), cls), depth, line, col)?
    };
    out.extend(if_chain(branches, fallback));
    Ok(out)
}

fn enter_finally(ctx: &mut MethodContext, block: TryBlockId, exit: &Exit) -> Vec<ir::Stmt> {
    let model = ctx.model;
    let b = model.try_block(block);
    let code = exit.finally_code();
    ctx.finally_codes.entry(block).or_default().insert(code);
    let mut out = vec![ir::Stmt::assign(variable_local(ctx, b.finally_var), ir::Expr::int(code))];
    if let Exit::Exception(error, _) = exit {
        let holder = variable_local(ctx, b.error_var);
        if *error != holder.to_expr() {
            out.push(ir::Stmt::assign(holder, error.clone()));
        }
    }
    out.push(ir::Stmt::goto(ctx.label(&b.finally_name)));
    out
}

/// Exit that no region of the frame intercepts
fn leave_frame(ctx: &mut MethodContext, exit: Exit, line: usize, col: usize) -> Result<Vec<ir::Stmt>> {
    let model = ctx.model;
    let frame = ctx.frame();
    let end = frame.end_label.clone();
    match exit {
        Exit::Return => Ok(vec![ir::Stmt::goto(end)]),
        Exit::Break | Exit::Continue => Err(ctx.invalid(
            "loop.exit.outside.loop",
            "`break` or `continue` outside of a loop",
            line,
            col,
        )),
        Exit::Exception(error, cls) => {
            let pos = ctx.pos(line, col);
            let undeclared = vec![ir::Stmt::Exhale(ir::Expr::ff(), pos)];
            let Some(holder) = frame.error.clone() else {
                return Ok(undeclared);
            };
            let declared = model.method(frame.method).declared_exceptions.keys().copied().collect_vec();
            let mut branches = vec![];
            let mut covered = false;
            for exc in declared {
                let always = model.issubtype(cls, exc);
                if !always && !model.issubtype(exc, cls) {
                    continue;
                }
                let guard = TypeDomainFactory::issubtype(
                    ctx.r#typeof(error.clone()),
                    TypeDomainFactory::raw_literal(model, exc),
                );
                branches.push((
                    guard,
                    vec![ir::Stmt::assign(holder.clone(), error.clone()), ir::Stmt::goto(end.clone())],
                ));
                if always {
                    covered = true;
                    break;
                }
            }
            Ok(if_chain(branches, if covered { vec![] } else { undeclared }))
        }
    }
}

fn if_chain(branches: Vec<(ir::Expr, Vec<ir::Stmt>)>, fallback: Vec<ir::Stmt>) -> Vec<ir::Stmt> {
    branches
        .into_iter()
        .rev()
        .fold(fallback, |els, (cond, then)| vec![ir::Stmt::If { cond, then, els }])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Defaults;
    use program_model::{analyze, InterfaceDecls, MethodId, Model, SourceProgram};

    fn model_of(body: &str) -> Model {
        let text = format!(r#"{{ "modules": [{{ "name": "main", "path": "main.py", "body": {} }}] }}"#, body);
        let program = SourceProgram::from_json(&text).unwrap();
        analyze(&program, &InterfaceDecls::builtins().unwrap()).unwrap()
    }

    fn function(model: &Model, name: &str) -> MethodId {
        model.module(model.main_modules[0]).functions[name]
    }

    fn all_stmts(stmts: &[ir::Stmt]) -> Vec<ir::Stmt> {
        let mut all = vec![];
        for stmt in stmts {
            stmt.visit(&mut |s| all.push(s.clone()));
        }
        all
    }

    fn exhales_false(stmts: &[ir::Stmt]) -> bool {
        all_stmts(stmts)
            .iter()
            .any(|s| matches!(s, ir::Stmt::Exhale(e, _) if *e == ir::Expr::ff()))
    }

    const CAUGHT: &str = r#"[
        { "kind": "Try", "line": 1, "body": [
            { "kind": "Raise", "line": 2, "exc": { "kind": "Call", "func": { "kind": "Name", "id": "ValueError" } } }
          ],
          "handlers": [{ "type": { "kind": "Name", "id": "ValueError" }, "name": "e", "line": 3,
                         "body": [{ "kind": "Pass", "line": 4 }] }] }
    ]"#;

    #[test]
    fn test_locally_caught_exception_is_type_checked() {
        let model = model_of(CAUGHT);
        let main = model.module(model.main_modules[0]).main.unwrap();
        let mut types = TypeDomainFactory::new();
        let defaults = Defaults::new();
        let mut names = model.registry.clone();
        let mut ctx = MethodContext::new(&model, &mut types, &defaults, &mut names, main);
        ctx.is_main = true;
        let stmts = translate_block(&mut ctx, &model.method(main).body).unwrap();

        let handler = &model.try_block(model.method(main).try_blocks[0]).handlers[0].label;
        let guarded = all_stmts(&stmts).into_iter().any(|s| match s {
            ir::Stmt::If { cond, then, .. } => {
                matches!(cond, ir::Expr::DomainFuncApp { ref name, .. } if name == "issubtype")
                    && then == vec![ir::Stmt::goto(handler.clone())]
            }
            _ => false,
        });
        assert!(guarded);
        assert!(!exhales_false(&stmts));
    }

    #[test]
    fn test_undeclared_exception_fails_verification() {
        let model = model_of(
            r#"[{ "kind": "Raise", "line": 1, "exc": { "kind": "Call", "func": { "kind": "Name", "id": "ValueError" } } }]"#,
        );
        let main = model.module(model.main_modules[0]).main.unwrap();
        let mut types = TypeDomainFactory::new();
        let defaults = Defaults::new();
        let mut names = model.registry.clone();
        let mut ctx = MethodContext::new(&model, &mut types, &defaults, &mut names, main);
        ctx.is_main = true;
        let stmts = translate_block(&mut ctx, &model.method(main).body).unwrap();
        assert!(exhales_false(&stmts));
    }

    #[test]
    fn test_return_in_try_runs_finally() {
        let model = model_of(
            r#"[{ "kind": "FunctionDef", "name": "f", "line": 1, "returns": { "kind": "Name", "id": "int" }, "body": [
                { "kind": "Try", "line": 2,
                  "body": [{ "kind": "Return", "line": 3, "value": { "kind": "Int", "value": 1 } }],
                  "finalbody": [{ "kind": "Pass", "line": 5 }] }
            ] }]"#,
        );
        let f = function(&model, "f");
        let mut types = TypeDomainFactory::new();
        let defaults = Defaults::new();
        let mut names = model.registry.clone();
        let mut ctx = MethodContext::new(&model, &mut types, &defaults, &mut names, f);
        ctx.frame_mut().result = Some(LocalVar::new("_res", Type::Int).to_expr());
        let stmts = translate_block(&mut ctx, &model.method(f).body).unwrap();

        let block = model.try_block(model.method(f).try_blocks[0]);
        let code = model.var(block.finally_var).sil_name.clone();
        let all = all_stmts(&stmts);
        let sets_return_code = all.iter().any(|s| {
            matches!(s, ir::Stmt::LocalAssign { target, value } if target.name == code && *value == ir::Expr::int(1))
        });
        assert!(sets_return_code);
        let position = |wanted: &ir::Stmt| stmts.iter().position(|s| s == wanted).unwrap();
        assert!(
            position(&ir::Stmt::label(block.finally_name.clone()))
                < position(&ir::Stmt::label(block.post_name.clone()))
        );
        let resumes = all.iter().any(|s| matches!(s, ir::Stmt::If { then, .. } if *then == vec![ir::Stmt::goto("__end")]));
        assert!(resumes);
    }

    #[test]
    fn test_for_loop_over_list_carries_iteration_invariants() {
        let model = model_of(
            r#"[{ "kind": "FunctionDef", "name": "f", "line": 1, "returns": { "kind": "None" }, "body": [
                { "kind": "For", "line": 2, "target": { "kind": "Name", "id": "x" },
                  "iter": { "kind": "List", "elts": [
                      { "kind": "Int", "value": 1 }, { "kind": "Int", "value": 2 }, { "kind": "Int", "value": 3 } ] },
                  "body": [{ "kind": "Pass", "line": 3 }] }
            ] }]"#,
        );
        let f = function(&model, "f");
        let mut types = TypeDomainFactory::new();
        let defaults = Defaults::new();
        let mut names = model.registry.clone();
        let mut ctx = MethodContext::new(&model, &mut types, &defaults, &mut names, f);
        let stmts = translate_block(&mut ctx, &model.method(f).body).unwrap();

        let Some(ir::Stmt::While { invariants, .. }) = stmts.iter().find(|s| matches!(s, ir::Stmt::While { .. })) else {
            panic!("expected a loop");
        };
        let sequence_equality = invariants.iter().any(|i| match i {
            ir::Expr::Binary { op: BinOp::Eq, lhs, rhs } => {
                matches!(&**lhs, ir::Expr::Field { field, .. } if field.name == "list_acc")
                    && matches!(&**rhs, ir::Expr::Field { field, .. } if field.name == "list_acc")
            }
            _ => false,
        });
        assert!(sequence_equality);
        let bounds = invariants.iter().any(|i| match i {
            ir::Expr::Binary { op: BinOp::And, lhs, .. } => {
                matches!(&**lhs, ir::Expr::Binary { op: BinOp::Le, .. })
            }
            _ => false,
        });
        assert!(bounds);
        assert!(stmts
            .iter()
            .any(|s| matches!(s, ir::Stmt::MethodCall { method, .. } if method == "Iterator___del__")));
    }

    #[test]
    fn test_break_leaves_through_loop_end() {
        let model = model_of(
            r#"[{ "kind": "FunctionDef", "name": "f", "line": 1, "returns": { "kind": "None" }, "body": [
                { "kind": "While", "line": 2, "test": { "kind": "Bool", "value": true },
                  "body": [{ "kind": "Break", "line": 3 }] }
            ] }]"#,
        );
        let f = function(&model, "f");
        let mut types = TypeDomainFactory::new();
        let defaults = Defaults::new();
        let mut names = model.registry.clone();
        let mut ctx = MethodContext::new(&model, &mut types, &defaults, &mut names, f);
        let stmts = translate_block(&mut ctx, &model.method(f).body).unwrap();
        let Some(ir::Stmt::Label { name, .. }) = stmts.last() else {
            panic!("expected the loop end label last");
        };
        let ir::Stmt::While { body, .. } = &stmts[0] else {
            panic!("expected a loop");
        };
        assert_eq!(body[0], ir::Stmt::goto(name.clone()));
    }
}

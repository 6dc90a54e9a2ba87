// Copyright (c) Asymptotic Labs
// SPDX-License-Identifier: Apache-2.0

//! Expression translation from source expressions to IR expressions
//!
//! Single responsibility: produce the IR value of a source expression. Impure
//! sub-expressions (constructor and method calls, list displays) append the
//! statements computing them to the caller's buffer; in a pure context they are
//! rejected instead.

use super::call_translator::{call_magic, translate_call, CallArg};
use super::utilities::{coerce, join_types, require_impure, string_value, through_receiver, to_bool, to_ref};
use crate::context::{is_mutable_global, MethodContext, Typed};
use crate::prelude::{check_defined, dict_acc, set_acc, tuple_create_name};
use crate::type_domain::TypeDomainFactory;
use itertools::Itertools;
use program_model::analyzer::names::{resolve_name, Binding};
use program_model::syntax::{BoolOperator, CmpOp, Operator, UnaryOperator};
use program_model::{ClassId, Expr, ExprKind, MethodKind, ModuleId, PyType, Result, VarId, VarKind};
use verification_ir::{self as ir, BinOp, FieldRef, Stmt, Type, UnOp};

/// Translate `e` without a type hint
pub fn translate_expr(ctx: &mut MethodContext, e: &Expr, stmts: &mut Vec<Stmt>) -> Result<Typed> {
    translate_hinted(ctx, e, None, stmts)
}

/// Translate `e` and convert the value to the IR type `target`
pub fn translate_as(
    ctx: &mut MethodContext,
    e: &Expr,
    target: &Type,
    hint: Option<&PyType>,
    stmts: &mut Vec<Stmt>,
) -> Result<ir::Expr> {
    let value = translate_hinted(ctx, e, hint, stmts)?;
    Ok(coerce(ctx, &value, target))
}

/// Translate a condition
pub fn translate_bool(ctx: &mut MethodContext, e: &Expr, stmts: &mut Vec<Stmt>) -> Result<ir::Expr> {
    let value = translate_expr(ctx, e, stmts)?;
    Ok(to_bool(ctx, &value))
}

/// Translate `e` where no statements may be produced
pub fn translate_pure(ctx: &mut MethodContext, e: &Expr, hint: Option<&PyType>) -> Result<Typed> {
    let was_pure = std::mem::replace(&mut ctx.pure, true);
    let mut scratch = vec![];
    let result = translate_hinted(ctx, e, hint, &mut scratch);
    ctx.pure = was_pure;
    result
}

/// Translate a contract condition
pub fn translate_assertion(ctx: &mut MethodContext, e: &Expr) -> Result<ir::Expr> {
    let value = translate_pure(ctx, e, None)?;
    Ok(to_bool(ctx, &value))
}

pub fn translate_hinted(
    ctx: &mut MethodContext,
    e: &Expr,
    hint: Option<&PyType>,
    stmts: &mut Vec<Stmt>,
) -> Result<Typed> {
    match &e.kind {
        ExprKind::Int { value } => Ok(Typed::new(ir::Expr::int(*value), ctx.builtin_type("int"))),
        ExprKind::Bool { value } => Ok(Typed::new(ir::Expr::BoolLit(*value), ctx.builtin_type("bool"))),
        ExprKind::NoneLit => Ok(Typed::new(ir::Expr::Null, ctx.builtin_type("NoneType"))),
        ExprKind::Str { value } => {
            let expr = ir::Expr::func_app(
                "str___create__",
                vec![
                    ir::Expr::int(value.chars().count() as i64),
                    ir::Expr::int(string_value(value)),
                ],
                Type::Ref,
            );
            Ok(Typed::new(expr, ctx.builtin_type("str")))
        }
        ExprKind::Name { id } => translate_name(ctx, e, id),
        ExprKind::Attribute { value, attr } => translate_attribute(ctx, e, value, attr, stmts),
        ExprKind::Call { func, args, keywords } => translate_call(ctx, e, func, args, keywords, hint, stmts),
        ExprKind::BinOp { left, op, right } => translate_binop(ctx, e, left, *op, right, stmts),
        ExprKind::UnaryOp { op, operand } => translate_unary(ctx, e, *op, operand, stmts),
        ExprKind::BoolOp { op, values } => translate_boolop(ctx, e, *op, values, hint, stmts),
        ExprKind::Compare {
            left,
            ops,
            comparators,
        } => translate_compare(ctx, e, left, ops, comparators, stmts),
        ExprKind::IfExp { test, body, orelse } => translate_ifexp(ctx, e, test, body, orelse, hint, stmts),
        ExprKind::List { elts } => translate_list(ctx, e, elts, hint, stmts),
        ExprKind::Tuple { elts } => translate_tuple(ctx, e, elts, hint, stmts),
        ExprKind::Set { elts } => translate_set(ctx, e, elts, hint, stmts),
        ExprKind::Dict { keys, .. } => translate_dict(ctx, e, keys.len(), hint, stmts),
        ExprKind::Subscript { value, slice } => translate_subscript(ctx, e, value, slice, stmts),
        ExprKind::Slice { .. } => Err(ctx.unsupported("slicing", e.line, e.col)),
        ExprKind::Starred { .. } => Err(ctx.unsupported("starred expression", e.line, e.col)),
        ExprKind::Lambda { .. } => Err(ctx.unsupported("lambda outside of a quantifier", e.line, e.col)),
    }
}

// ============================================================================
// Names
// ============================================================================

/// What `name` refers to in the current frame
pub fn resolve(ctx: &MethodContext, name: &str) -> Option<Binding> {
    let model = ctx.model;
    let frame = ctx.frame();
    if frame.module_level {
        return resolve_name(model, frame.module, None, name);
    }
    if ctx.is_main && ctx.frames.len() == 1 {
        // module-level code sees module names before its synthesized locals
        resolve_name(model, frame.module, None, name)
            .or_else(|| resolve_name(model, frame.module, Some(frame.method), name))
    } else {
        resolve_name(model, frame.module, Some(frame.method), name)
    }
}

/// Module referred to by a (dotted) name expression
pub fn module_ref(ctx: &MethodContext, e: &Expr) -> Option<ModuleId> {
    match &e.kind {
        ExprKind::Name { id } => match resolve(ctx, id) {
            Some(Binding::Module(module)) => Some(module),
            _ => None,
        },
        ExprKind::Attribute { value, attr } => {
            let outer = module_ref(ctx, value)?;
            let dotted = e.dotted_name()?;
            ctx.model
                .lookup_module(outer, &dotted)
                .or_else(|| ctx.model.lookup_module(outer, attr))
        }
        _ => None,
    }
}

/// Class referred to by a (qualified) class name expression
pub fn class_ref(ctx: &MethodContext, e: &Expr) -> Option<ClassId> {
    match &e.kind {
        ExprKind::Name { id } => match resolve(ctx, id) {
            Some(Binding::Class(cls)) => Some(cls),
            _ => None,
        },
        ExprKind::Attribute { value, attr } => {
            let module = module_ref(ctx, value)?;
            ctx.model.lookup_class(module, attr)
        }
        _ => None,
    }
}

fn translate_name(ctx: &mut MethodContext, e: &Expr, id: &str) -> Result<Typed> {
    if let Some((_, bound)) = ctx.lambda_vars.iter().rev().find(|(name, _)| name == id) {
        return Ok(bound.clone());
    }
    match resolve(ctx, id) {
        Some(Binding::Var(var)) => read_var(ctx, var, e.line, e.col),
        Some(Binding::Class(cls)) => Ok(class_object(ctx, cls)),
        Some(_) => Err(ctx.unsupported(format!("`{}` used as a value", id), e.line, e.col)),
        None => Err(ctx.unsupported(format!("undefined name `{}`", id), e.line, e.col)),
    }
}

/// Current value of a source variable
pub fn read_var(ctx: &mut MethodContext, var: VarId, line: usize, col: usize) -> Result<Typed> {
    let model = ctx.model;
    let v = model.var(var);
    let typ = v.type_at(line, col).clone();
    if is_mutable_global(model, var) {
        if !(ctx.is_main && ctx.frames.len() == 1) {
            return Err(ctx.unsupported(
                format!("read of global `{}` outside module-level code; it is assigned more than once", v.name),
                line,
                col,
            ));
        }
        let value = ctx.var_expr(var);
        return Ok(if ctx.pure {
            Typed::new(value, typ)
        } else {
            Typed::new(check_defined(value, v.id as i64), typ)
        });
    }
    Ok(match v.kind {
        VarKind::Global | VarKind::StaticField => Typed::new(
            ir::Expr::func_app(v.sil_name.clone(), vec![], ctx.ir_type(&v.typ)),
            typ,
        ),
        VarKind::Arg => {
            let typ = match ctx.frame().receiver_class {
                Some(cls) if model.method(ctx.method()).args.values().next() == Some(&var) => {
                    model.class_type(cls)
                }
                _ => typ,
            };
            Typed::new(ctx.var_expr(var), typ)
        }
        VarKind::Local => {
            let aliased = ctx.frame().aliases.contains_key(&var);
            let value = ctx.var_expr(var);
            if ctx.pure || aliased {
                Typed::new(value, typ)
            } else {
                Typed::new(check_defined(value, v.id as i64), typ)
            }
        }
        VarKind::TryError | VarKind::FinallyCode => Typed::new(ctx.var_expr(var), typ),
    })
}

/// A class used as a value: its type literal
pub fn class_object(ctx: &mut MethodContext, cls: ClassId) -> Typed {
    let model = ctx.model;
    let literal = TypeDomainFactory::raw_literal(model, cls);
    let type_cls = model.builtin("type").unwrap_or_default();
    Typed::new(literal, PyType::generic(type_cls, vec![PyType::Class(cls)]))
}

// ============================================================================
// Attributes
// ============================================================================

fn translate_attribute(
    ctx: &mut MethodContext,
    e: &Expr,
    value: &Expr,
    attr: &str,
    stmts: &mut Vec<Stmt>,
) -> Result<Typed> {
    let model = ctx.model;
    if let Some(module) = module_ref(ctx, value) {
        if let Some(var) = model.lookup_global_var(module, attr) {
            return read_var(ctx, var, e.line, e.col);
        }
        if let Some(cls) = model.lookup_class(module, attr) {
            return Ok(class_object(ctx, cls));
        }
        return Err(ctx.unsupported(format!("module attribute `{}`", attr), e.line, e.col));
    }
    if let Some(cls) = class_ref(ctx, value) {
        if let Some(var) = model.get_static_field(cls, attr) {
            return read_var(ctx, var, e.line, e.col);
        }
        return Err(ctx.unsupported(format!("class attribute `{}`", attr), e.line, e.col));
    }
    let receiver = translate_expr(ctx, value, stmts)?;
    receiver_attribute(ctx, &receiver, attr, e)
}

/// Field, property or static field `attr` of an object
pub fn receiver_attribute(ctx: &mut MethodContext, receiver: &Typed, attr: &str, e: &Expr) -> Result<Typed> {
    let model = ctx.model;
    let cls = receiver.typ.cls(model);
    let object = to_ref(ctx, receiver);
    if let Some(field) = model.get_field(cls, attr) {
        let declared = model.field(field);
        let root = model.field(model.root_field(field));
        let typ = through_receiver(model, &declared.typ, Some(declared.cls), Some(&receiver.typ));
        let field_ref = FieldRef::new(root.sil_name.clone(), ctx.ir_type(&root.typ));
        return Ok(Typed::new(ir::Expr::field(object, field_ref), typ));
    }
    if let Some(member) = model.get_member(cls, attr) {
        let m = model.method(member);
        if m.kind == MethodKind::Property {
            let declared = m.return_type.clone().unwrap_or_else(|| ctx.builtin_type("object"));
            let typ = through_receiver(model, &declared, m.cls, Some(&receiver.typ));
            let expr = ir::Expr::func_app(m.sil_name.clone(), vec![object], ctx.ir_type(&declared));
            return Ok(Typed::new(expr, typ));
        }
    }
    if let Some(var) = model.get_static_field(cls, attr) {
        return read_var(ctx, var, e.line, e.col);
    }
    if let Some(members) = receiver.typ.union_members() {
        // attribute only present on the union members: select by runtime type
        let members = members.to_vec();
        let mut options = vec![];
        for member in &members {
            let narrowed = Typed::new(receiver.expr.clone(), member.clone());
            let value = receiver_attribute(ctx, &narrowed, attr, e)?;
            let guard = ctx.type_check(object.clone(), member);
            options.push((guard, value));
        }
        let typ = join_types(model, &options.iter().map(|(_, v)| v.typ.clone()).collect_vec());
        let ir_type = ctx.ir_type(&typ);
        let mut options = options.into_iter().rev();
        let Some((_, last)) = options.next() else {
            return Err(ctx.unsupported(format!("attribute `{}` of an empty union", attr), e.line, e.col));
        };
        let mut expr = coerce(ctx, &last, &ir_type);
        for (guard, value) in options {
            expr = ir::Expr::cond(guard, coerce(ctx, &value, &ir_type), expr);
        }
        return Ok(Typed::new(expr, typ));
    }
    Err(ctx.invalid(
        "attribute.unknown",
        format!("`{}` has no attribute `{}`", receiver.typ.display(model), attr),
        e.line,
        e.col,
    ))
}

// ============================================================================
// Operators
// ============================================================================

fn is_numeric(ctx: &MethodContext, typ: &PyType) -> bool {
    ctx.model.is_int(typ) || ctx.model.is_bool(typ)
}

fn translate_binop(
    ctx: &mut MethodContext,
    e: &Expr,
    left: &Expr,
    op: Operator,
    right: &Expr,
    stmts: &mut Vec<Stmt>,
) -> Result<Typed> {
    let lhs = translate_expr(ctx, left, stmts)?;
    let rhs = translate_expr(ctx, right, stmts)?;
    if is_numeric(ctx, &lhs.typ) && is_numeric(ctx, &rhs.typ) {
        let l = coerce(ctx, &lhs, &Type::Int);
        let r = coerce(ctx, &rhs, &Type::Int);
        let expr = match op {
            Operator::Add => ir::Expr::binary(BinOp::Add, l, r),
            Operator::Sub => ir::Expr::binary(BinOp::Sub, l, r),
            Operator::Mult => ir::Expr::binary(BinOp::Mul, l, r),
            Operator::FloorDiv => ir::Expr::func_app("int___floordiv__", vec![l, r], Type::Int),
            Operator::Mod => ir::Expr::func_app("int___mod__", vec![l, r], Type::Int),
            Operator::Div | Operator::BitAnd | Operator::BitOr | Operator::BitXor => {
                return Err(ctx.unsupported(
                    format!("operator `{}` on integers", op.magic_name()),
                    e.line,
                    e.col,
                ))
            }
        };
        return Ok(Typed::new(expr, ctx.builtin_type("int")));
    }
    call_magic(ctx, &lhs, op.magic_name(), vec![CallArg::Value(rhs)], e, stmts)
}

fn translate_unary(
    ctx: &mut MethodContext,
    e: &Expr,
    op: UnaryOperator,
    operand: &Expr,
    stmts: &mut Vec<Stmt>,
) -> Result<Typed> {
    let value = translate_expr(ctx, operand, stmts)?;
    match op {
        UnaryOperator::Not => Ok(Typed::new(ir::Expr::not(to_bool(ctx, &value)), ctx.builtin_type("bool"))),
        UnaryOperator::USub if is_numeric(ctx, &value.typ) => {
            let expr = match coerce(ctx, &value, &Type::Int) {
                ir::Expr::IntLit(n) => ir::Expr::IntLit(-n),
                other => ir::Expr::Unary {
                    op: UnOp::Neg,
                    operand: Box::new(other),
                },
            };
            Ok(Typed::new(expr, ctx.builtin_type("int")))
        }
        UnaryOperator::UAdd if is_numeric(ctx, &value.typ) => {
            Ok(Typed::new(coerce(ctx, &value, &Type::Int), ctx.builtin_type("int")))
        }
        UnaryOperator::USub => call_magic(ctx, &value, "__neg__", vec![], e, stmts),
        UnaryOperator::UAdd => call_magic(ctx, &value, "__pos__", vec![], e, stmts),
    }
}

fn translate_boolop(
    ctx: &mut MethodContext,
    e: &Expr,
    op: BoolOperator,
    values: &[Expr],
    hint: Option<&PyType>,
    stmts: &mut Vec<Stmt>,
) -> Result<Typed> {
    let mut parts = vec![];
    for value in values {
        let mut own = vec![];
        let typed = translate_hinted(ctx, value, hint, &mut own)?;
        parts.push((typed, own));
    }
    let model = ctx.model;
    let all_bool = parts.iter().all(|(t, _)| model.is_bool(&t.typ));
    let typ = if all_bool {
        ctx.builtin_type("bool")
    } else {
        join_types(model, &parts.iter().map(|(t, _)| t.typ.clone()).collect_vec())
    };

    if parts.iter().skip(1).all(|(_, own)| own.is_empty()) {
        let mut parts = parts.into_iter();
        let Some((first, own)) = parts.next() else {
            return Err(ctx.invalid("syntax.invalid", "empty boolean operation", e.line, e.col));
        };
        stmts.extend(own);
        let rest = parts.map(|(t, _)| t).collect_vec();
        if all_bool {
            let operands = std::iter::once(&first).chain(&rest).map(|t| to_bool(ctx, t)).collect_vec();
            let expr = match op {
                BoolOperator::And => ir::Expr::conjoin(operands),
                BoolOperator::Or => ir::Expr::disjoin(operands),
            };
            return Ok(Typed::new(expr, typ));
        }
        // value semantics: the first operand deciding the outcome is the result
        let mut operands = std::iter::once(first).chain(rest).rev();
        let Some(last) = operands.next() else {
            return Err(ctx.invalid("syntax.invalid", "empty boolean operation", e.line, e.col));
        };
        let mut expr = to_ref(ctx, &last);
        for operand in operands {
            let test = to_bool(ctx, &operand);
            let value = to_ref(ctx, &operand);
            expr = match op {
                BoolOperator::And => ir::Expr::cond(test, expr, value),
                BoolOperator::Or => ir::Expr::cond(test, value, expr),
            };
        }
        return Ok(Typed::new(expr, typ));
    }

    // later operands need statements: evaluate them only when reached
    require_impure(ctx, "a short-circuiting operand with side effects", e.line, e.col)?;
    let ir_type = if all_bool { Type::Bool } else { Type::Ref };
    let result = ctx.fresh_local("bool_op", ir_type.clone());
    let mut tail: Vec<Stmt> = vec![];
    for (typed, own) in parts.into_iter().rev() {
        let mut block = own;
        block.push(Stmt::assign(result.clone(), coerce(ctx, &typed, &ir_type)));
        if !tail.is_empty() {
            let test = to_bool(ctx, &Typed::new(result.to_expr(), typed.typ.clone()));
            let test = match op {
                BoolOperator::And => test,
                BoolOperator::Or => ir::Expr::not(test),
            };
            block.push(Stmt::if_then(test, tail));
        }
        tail = block;
    }
    stmts.extend(tail);
    Ok(Typed::new(result.to_expr(), typ))
}

fn translate_compare(
    ctx: &mut MethodContext,
    e: &Expr,
    left: &Expr,
    ops: &[CmpOp],
    comparators: &[Expr],
    stmts: &mut Vec<Stmt>,
) -> Result<Typed> {
    let mut lhs = translate_expr(ctx, left, stmts)?;
    let mut conjuncts = vec![];
    for (op, right) in ops.iter().zip(comparators) {
        let rhs = translate_expr(ctx, right, stmts)?;
        conjuncts.push(compare(ctx, *op, &lhs, &rhs, e, stmts)?);
        lhs = rhs;
    }
    Ok(Typed::new(ir::Expr::conjoin(conjuncts), ctx.builtin_type("bool")))
}

fn compare(
    ctx: &mut MethodContext,
    op: CmpOp,
    lhs: &Typed,
    rhs: &Typed,
    e: &Expr,
    stmts: &mut Vec<Stmt>,
) -> Result<ir::Expr> {
    let model = ctx.model;
    let numeric = is_numeric(ctx, &lhs.typ) && is_numeric(ctx, &rhs.typ);
    let negate = |positive: ir::Expr, negated: bool| if negated { ir::Expr::not(positive) } else { positive };
    match op {
        CmpOp::Is | CmpOp::IsNot => {
            let same = if numeric {
                ir::Expr::eq(coerce(ctx, lhs, &Type::Int), coerce(ctx, rhs, &Type::Int))
            } else {
                ir::Expr::eq(to_ref(ctx, lhs), to_ref(ctx, rhs))
            };
            Ok(negate(same, op == CmpOp::IsNot))
        }
        CmpOp::Eq | CmpOp::NotEq => {
            let equal = if model.is_bool(&lhs.typ) && model.is_bool(&rhs.typ) {
                ir::Expr::eq(to_bool(ctx, lhs), to_bool(ctx, rhs))
            } else if numeric {
                ir::Expr::eq(coerce(ctx, lhs, &Type::Int), coerce(ctx, rhs, &Type::Int))
            } else if model.is_none(&lhs.typ) || model.is_none(&rhs.typ) {
                ir::Expr::eq(to_ref(ctx, lhs), to_ref(ctx, rhs))
            } else {
                equality(ctx, lhs, rhs, e, stmts)?
            };
            Ok(negate(equal, op == CmpOp::NotEq))
        }
        CmpOp::Lt | CmpOp::LtE | CmpOp::Gt | CmpOp::GtE if numeric => {
            let bin = match op {
                CmpOp::Lt => BinOp::Lt,
                CmpOp::LtE => BinOp::Le,
                CmpOp::Gt => BinOp::Gt,
                _ => BinOp::Ge,
            };
            Ok(ir::Expr::binary(bin, coerce(ctx, lhs, &Type::Int), coerce(ctx, rhs, &Type::Int)))
        }
        CmpOp::Lt | CmpOp::LtE | CmpOp::Gt | CmpOp::GtE => {
            let result = call_magic(ctx, lhs, op.magic_name(), vec![CallArg::Value(rhs.clone())], e, stmts)?;
            Ok(to_bool(ctx, &result))
        }
        CmpOp::In | CmpOp::NotIn => {
            let contained = contains(ctx, rhs, lhs, e, stmts)?;
            Ok(negate(contained, op == CmpOp::NotIn))
        }
    }
}

/// `lhs == rhs` through a user `__eq__` or reference equality otherwise
fn equality(ctx: &mut MethodContext, lhs: &Typed, rhs: &Typed, e: &Expr, stmts: &mut Vec<Stmt>) -> Result<ir::Expr> {
    let model = ctx.model;
    let user_eq = model
        .get_member(lhs.typ.cls(model), "__eq__")
        .filter(|m| !model.method(*m).interface);
    if user_eq.is_some() {
        let result = call_magic(ctx, lhs, "__eq__", vec![CallArg::Value(rhs.clone())], e, stmts)?;
        return Ok(to_bool(ctx, &result));
    }
    Ok(ir::Expr::func_app(
        "object___eq__",
        vec![to_ref(ctx, lhs), to_ref(ctx, rhs)],
        Type::Bool,
    ))
}

/// Membership `item in container`
fn contains(ctx: &mut MethodContext, container: &Typed, item: &Typed, e: &Expr, stmts: &mut Vec<Stmt>) -> Result<ir::Expr> {
    let model = ctx.model;
    let element = to_ref(ctx, item);
    if let Type::Seq(_) = container.expr.typ() {
        return Ok(ir::Expr::contains(element, container.expr.clone()));
    }
    if model.is_builtin(container.typ.cls(model), "range") {
        let seq = ir::Expr::func_app("range___sil_seq__", vec![to_ref(ctx, container)], Type::seq(Type::Ref));
        return Ok(ir::Expr::contains(element, seq));
    }
    let result = call_magic(ctx, container, "__contains__", vec![CallArg::Value(item.clone())], e, stmts)?;
    Ok(to_bool(ctx, &result))
}

// ============================================================================
// Conditional expressions and displays
// ============================================================================

#[allow(clippy::too_many_arguments)]
fn translate_ifexp(
    ctx: &mut MethodContext,
    e: &Expr,
    test: &Expr,
    body: &Expr,
    orelse: &Expr,
    hint: Option<&PyType>,
    stmts: &mut Vec<Stmt>,
) -> Result<Typed> {
    let cond = translate_bool(ctx, test, stmts)?;
    let mut then_stmts = vec![];
    let mut else_stmts = vec![];
    let then_value = translate_hinted(ctx, body, hint, &mut then_stmts)?;
    let else_value = translate_hinted(ctx, orelse, hint, &mut else_stmts)?;
    let typ = join_types(ctx.model, &[then_value.typ.clone(), else_value.typ.clone()]);
    let ir_type = if then_value.expr.typ() == else_value.expr.typ() {
        then_value.expr.typ()
    } else {
        Type::Ref
    };
    let then_expr = coerce(ctx, &then_value, &ir_type);
    let else_expr = coerce(ctx, &else_value, &ir_type);
    if then_stmts.is_empty() && else_stmts.is_empty() {
        return Ok(Typed::new(ir::Expr::cond(cond, then_expr, else_expr), typ));
    }
    require_impure(ctx, "a conditional expression with side effects", e.line, e.col)?;
    let result = ctx.fresh_local("cond_result", ir_type);
    then_stmts.push(Stmt::assign(result.clone(), then_expr));
    else_stmts.push(Stmt::assign(result.clone(), else_expr));
    stmts.push(Stmt::If {
        cond,
        then: then_stmts,
        els: else_stmts,
    });
    Ok(Typed::new(result.to_expr(), typ))
}

/// Element type a display of class `cls` is expected to have
fn element_hint(ctx: &MethodContext, cls: &str, hint: Option<&PyType>) -> Option<PyType> {
    let model = ctx.model;
    let hint = hint?;
    if !model.is_builtin(hint.cls(model), cls) {
        return None;
    }
    hint.type_args().first().cloned()
}

fn translate_elements(
    ctx: &mut MethodContext,
    elts: &[Expr],
    elem_hint: Option<&PyType>,
    stmts: &mut Vec<Stmt>,
) -> Result<Vec<Typed>> {
    elts.iter()
        .map(|elt| match &elt.kind {
            ExprKind::Starred { .. } => Err(ctx.unsupported("starred element in a display", elt.line, elt.col)),
            _ => translate_hinted(ctx, elt, elem_hint, stmts),
        })
        .collect()
}

pub(super) fn translate_list(
    ctx: &mut MethodContext,
    e: &Expr,
    elts: &[Expr],
    hint: Option<&PyType>,
    stmts: &mut Vec<Stmt>,
) -> Result<Typed> {
    require_impure(ctx, "a list display", e.line, e.col)?;
    let elem_hint = element_hint(ctx, "list", hint);
    let values = translate_elements(ctx, elts, elem_hint.as_ref(), stmts)?;
    let elem_type = elem_hint.unwrap_or_else(|| join_types(ctx.model, &values.iter().map(|v| v.typ.clone()).collect_vec()));
    let list_cls = ctx.model.builtin("list").unwrap_or_default();
    let typ = PyType::generic(list_cls, vec![elem_type]);

    let pos = ctx.pos(e.line, e.col);
    let target = ctx.fresh_local("list", Type::Ref);
    stmts.push(Stmt::call("list___init__", vec![], vec![target.clone()], pos.clone()));
    let literal = ctx.type_literal(&typ);
    stmts.push(Stmt::Inhale(ir::Expr::eq(ctx.r#typeof(target.to_expr()), literal), pos.clone()));
    for value in &values {
        let item = to_ref(ctx, value);
        stmts.push(Stmt::call("list_append", vec![target.to_expr(), item], vec![], pos.clone()));
    }
    Ok(Typed::new(target.to_expr(), typ))
}

fn translate_tuple(
    ctx: &mut MethodContext,
    _e: &Expr,
    elts: &[Expr],
    hint: Option<&PyType>,
    stmts: &mut Vec<Stmt>,
) -> Result<Typed> {
    let model = ctx.model;
    let tuple_cls = model.builtin("tuple").unwrap_or_default();
    let hinted = hint
        .filter(|h| model.is_builtin(h.cls(model), "tuple") && h.type_args().len() == elts.len())
        .map(|h| h.type_args().to_vec());
    let mut values = vec![];
    for (index, elt) in elts.iter().enumerate() {
        if let ExprKind::Starred { .. } = elt.kind {
            return Err(ctx.unsupported("starred element in a tuple", elt.line, elt.col));
        }
        let elem_hint = hinted.as_ref().map(|args| &args[index]);
        values.push(translate_hinted(ctx, elt, elem_hint, stmts)?);
    }
    ctx.types.require_tuple_arity(values.len());
    let refs = values.iter().map(|v| to_ref(ctx, v)).collect_vec();
    let mut args = refs.clone();
    args.extend(refs.into_iter().map(|r| ctx.r#typeof(r)));
    let typ = PyType::generic(tuple_cls, values.into_iter().map(|v| v.typ).collect());
    Ok(Typed::new(
        ir::Expr::func_app(tuple_create_name(elts.len()), args, Type::Ref),
        typ,
    ))
}

/// Fresh collection object whose contents are the field `acc`
fn new_collection(
    ctx: &mut MethodContext,
    e: &Expr,
    cls: &str,
    acc: FieldRef,
    typ: &PyType,
    elems: Vec<ir::Expr>,
    stmts: &mut Vec<Stmt>,
) -> ir::Expr {
    let pos = ctx.pos(e.line, e.col);
    let target = ctx.fresh_local(cls, Type::Ref);
    stmts.push(Stmt::New {
        target: target.clone(),
        fields: vec![acc.clone()],
    });
    let literal = ctx.type_literal(typ);
    stmts.push(Stmt::Inhale(ir::Expr::eq(ctx.r#typeof(target.to_expr()), literal), pos));
    stmts.push(Stmt::FieldAssign {
        receiver: target.to_expr(),
        field: acc,
        value: ir::Expr::SetLit {
            elems,
            elem_type: Type::Ref,
        },
    });
    target.to_expr()
}

pub(super) fn translate_set(
    ctx: &mut MethodContext,
    e: &Expr,
    elts: &[Expr],
    hint: Option<&PyType>,
    stmts: &mut Vec<Stmt>,
) -> Result<Typed> {
    require_impure(ctx, "a set display", e.line, e.col)?;
    let elem_hint = element_hint(ctx, "set", hint);
    let values = translate_elements(ctx, elts, elem_hint.as_ref(), stmts)?;
    let elem_type = elem_hint.unwrap_or_else(|| join_types(ctx.model, &values.iter().map(|v| v.typ.clone()).collect_vec()));
    let typ = PyType::generic(ctx.model.builtin("set").unwrap_or_default(), vec![elem_type]);
    let elems = values.iter().map(|v| to_ref(ctx, v)).collect_vec();
    let expr = new_collection(ctx, e, "set", set_acc(), &typ, elems, stmts);
    Ok(Typed::new(expr, typ))
}

pub(super) fn translate_dict(
    ctx: &mut MethodContext,
    e: &Expr,
    entries: usize,
    hint: Option<&PyType>,
    stmts: &mut Vec<Stmt>,
) -> Result<Typed> {
    if entries > 0 {
        return Err(ctx.unsupported("non-empty dict display", e.line, e.col));
    }
    require_impure(ctx, "a dict display", e.line, e.col)?;
    let model = ctx.model;
    let dict_cls = model.builtin("dict").unwrap_or_default();
    let typ = match hint {
        Some(h) if model.is_builtin(h.cls(model), "dict") && h.type_args().len() == 2 => {
            PyType::generic(dict_cls, h.type_args().to_vec())
        }
        _ => {
            let object = ctx.builtin_type("object");
            PyType::generic(dict_cls, vec![object.clone(), object])
        }
    };
    let expr = new_collection(ctx, e, "dict", dict_acc(), &typ, vec![], stmts);
    Ok(Typed::new(expr, typ))
}

fn translate_subscript(
    ctx: &mut MethodContext,
    e: &Expr,
    value: &Expr,
    slice: &Expr,
    stmts: &mut Vec<Stmt>,
) -> Result<Typed> {
    if let ExprKind::Slice { .. } = slice.kind {
        return Err(ctx.unsupported("slicing", e.line, e.col));
    }
    let container = translate_expr(ctx, value, stmts)?;
    let model = ctx.model;
    if model.is_builtin(container.typ.cls(model), "tuple") {
        let index = translate_expr(ctx, slice, stmts)?;
        let args = container.typ.type_args();
        let elem = match (&slice.kind, &container.typ) {
            (_, PyType::Generic { exact_length: false, .. }) => {
                args.first().cloned().unwrap_or_else(|| ctx.builtin_type("object"))
            }
            (ExprKind::Int { value }, _) if *value >= 0 && (*value as usize) < args.len() => {
                args[*value as usize].clone()
            }
            _ => join_types(model, args),
        };
        let expr = ir::Expr::func_app(
            "tuple___getitem__",
            vec![to_ref(ctx, &container), coerce(ctx, &index, &Type::Int)],
            Type::Ref,
        );
        return Ok(Typed::new(expr, elem));
    }
    call_magic(ctx, &container, "__getitem__", vec![CallArg::Source(slice)], e, stmts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Defaults;
    use program_model::{analyze, InterfaceDecls, Model, SourceProgram};

    fn model_of(body: &str) -> Model {
        let text = format!(r#"{{ "modules": [{{ "name": "main", "path": "main.py", "body": {} }}] }}"#, body);
        let program = SourceProgram::from_json(&text).unwrap();
        analyze(&program, &InterfaceDecls::builtins().unwrap()).unwrap()
    }

    fn main_method(model: &Model) -> program_model::MethodId {
        let module = model.main_modules[0];
        model.module(module).main.unwrap()
    }

    fn int(value: i64) -> Expr {
        Expr::new(ExprKind::Int { value }, 1, 0)
    }

    #[test]
    fn test_integer_arithmetic_is_native() {
        let model = model_of(r#"[{ "kind": "Pass", "line": 1 }]"#);
        let mut types = TypeDomainFactory::new();
        let defaults = Defaults::new();
        let mut names = model.registry.clone();
        let mut ctx = MethodContext::new(&model, &mut types, &defaults, &mut names, main_method(&model));
        let sum = Expr::new(
            ExprKind::BinOp {
                left: Box::new(int(1)),
                op: Operator::Add,
                right: Box::new(int(2)),
            },
            1,
            0,
        );
        let mut stmts = vec![];
        let value = translate_expr(&mut ctx, &sum, &mut stmts).unwrap();
        assert!(stmts.is_empty());
        assert_eq!(value.expr, ir::Expr::binary(BinOp::Add, ir::Expr::int(1), ir::Expr::int(2)));
        assert!(model.is_int(&value.typ));
    }

    #[test]
    fn test_list_display_rejected_in_pure_context() {
        let model = model_of(r#"[{ "kind": "Pass", "line": 1 }]"#);
        let mut types = TypeDomainFactory::new();
        let defaults = Defaults::new();
        let mut names = model.registry.clone();
        let mut ctx = MethodContext::new(&model, &mut types, &defaults, &mut names, main_method(&model));
        let list = Expr::new(ExprKind::List { elts: vec![int(1)] }, 3, 4);
        let err = translate_pure(&mut ctx, &list, None).unwrap_err();
        assert_eq!(err.code(), "purity.violated");
    }

    #[test]
    fn test_tuple_display_registers_arity() {
        let model = model_of(r#"[{ "kind": "Pass", "line": 1 }]"#);
        let mut types = TypeDomainFactory::new();
        let defaults = Defaults::new();
        let mut names = model.registry.clone();
        let mut ctx = MethodContext::new(&model, &mut types, &defaults, &mut names, main_method(&model));
        let pair = Expr::new(ExprKind::Tuple { elts: vec![int(1), int(2)] }, 1, 0);
        let mut stmts = vec![];
        let value = translate_expr(&mut ctx, &pair, &mut stmts).unwrap();
        assert!(matches!(value.expr, ir::Expr::FuncApp { ref name, .. } if name == "tuple___create2__"));
        assert!(types.tuple_arities().contains(&2));
    }

    #[test]
    fn test_undefined_name_is_unsupported() {
        let model = model_of(r#"[{ "kind": "Pass", "line": 1 }]"#);
        let mut types = TypeDomainFactory::new();
        let defaults = Defaults::new();
        let mut names = model.registry.clone();
        let mut ctx = MethodContext::new(&model, &mut types, &defaults, &mut names, main_method(&model));
        let name = Expr::new(ExprKind::Name { id: "nowhere".to_string() }, 2, 1);
        let err = translate_pure(&mut ctx, &name, None).unwrap_err();
        assert_eq!(err.code(), "unsupported");
        assert!(err.to_string().contains("nowhere"));
    }
}

// Copyright (c) Asymptotic Labs
// SPDX-License-Identifier: Apache-2.0

//! Contract function translation
//!
//! Single responsibility: lower calls of the contract pseudo-functions
//! (`Result()`, `Old`, `Acc`, quantifiers, `Assert`, `Fold`, ...) into IR
//! expressions and, for the statement forms, IR statements. The leading
//! `Requires`/`Ensures`/`Exsures`/`Invariant` clauses are collected by the
//! analyzer and never reach this module.

use super::call_translator::translate_call;
use super::expression_translator::{translate_bool, translate_expr, translate_hinted};
use super::utilities::{require_impure, through_receiver, to_ref};
use crate::context::{MethodContext, Typed};
use crate::prelude::{list_acc, previous};
use program_model::analyzer::names::CONTRACT_STATEMENTS;
use program_model::analyzer::types::resolve_type;
use program_model::syntax::{Keyword, Operator};
use program_model::{Expr, ExprKind, PyType, Result, TypeExpr};
use verification_ir::{self as ir, BinOp, FieldRef, LocalVar, Stmt, Type};

pub fn translate_contract_call(
    ctx: &mut MethodContext,
    name: &str,
    args: &[Expr],
    keywords: &[Keyword],
    e: &Expr,
    stmts: &mut Vec<Stmt>,
) -> Result<Typed> {
    if !keywords.is_empty() {
        return Err(ctx.unsupported(format!("keyword arguments to `{}`", name), e.line, e.col));
    }
    let boolean = ctx.builtin_type("bool");
    match name {
        "Result" => {
            expect_arity(ctx, name, args, 0, e)?;
            result_value(ctx, e)
        }
        "RaisedException" => {
            expect_arity(ctx, name, args, 0, e)?;
            let Some(error) = ctx.frame().error.clone() else {
                return Err(ctx.invalid(
                    "invalid.contract.position",
                    "`RaisedException()` outside of an exceptional postcondition",
                    e.line,
                    e.col,
                ));
            };
            let typ = ctx.raised.clone().unwrap_or_else(|| ctx.builtin_type("Exception"));
            Ok(Typed::new(error.to_expr(), typ))
        }
        "Implies" => {
            expect_arity(ctx, name, args, 2, e)?;
            let lhs = translate_bool(ctx, &args[0], stmts)?;
            let rhs = translate_bool(ctx, &args[1], stmts)?;
            Ok(Typed::new(ir::Expr::implies(lhs, rhs), boolean))
        }
        "Old" => {
            expect_arity(ctx, name, args, 1, e)?;
            let value = translate_expr(ctx, &args[0], stmts)?;
            Ok(Typed::new(ir::Expr::old(value.expr), value.typ))
        }
        "Acc" => {
            if args.is_empty() || args.len() > 2 {
                return Err(arity_error(ctx, name, e));
            }
            let perm = match args.get(1) {
                Some(amount) => translate_perm(ctx, amount, stmts)?,
                None => ir::Expr::FullPerm,
            };
            let access = translate_access(ctx, &args[0], perm, stmts)?;
            Ok(Typed::new(access, boolean))
        }
        "Rd" => {
            expect_arity(ctx, name, args, 1, e)?;
            let access = translate_access(ctx, &args[0], ir::Expr::WildcardPerm, stmts)?;
            Ok(Typed::new(access, boolean))
        }
        "list_pred" => {
            expect_arity(ctx, name, args, 1, e)?;
            let list = translate_expr(ctx, &args[0], stmts)?;
            let object = to_ref(ctx, &list);
            Ok(Typed::new(ir::Expr::field_acc(object, list_acc(), ir::Expr::FullPerm), boolean))
        }
        "Unfolding" => {
            expect_arity(ctx, name, args, 2, e)?;
            let predicate = translate_expr(ctx, &args[0], stmts)?;
            if !matches!(predicate.expr, ir::Expr::PredicateAcc { .. }) {
                return Err(ctx.invalid(
                    "unfold.non.predicate",
                    "`Unfolding` needs a predicate instance",
                    e.line,
                    e.col,
                ));
            }
            let body = translate_expr(ctx, &args[1], stmts)?;
            Ok(Typed::new(
                ir::Expr::Unfolding {
                    predicate: Box::new(predicate.expr),
                    body: Box::new(body.expr),
                },
                body.typ,
            ))
        }
        "Forall" | "Exists" => {
            expect_arity(ctx, name, args, 2, e)?;
            let quantified = translate_quantifier(ctx, name == "Forall", &args[0], &args[1], e)?;
            Ok(Typed::new(quantified, boolean))
        }
        "Previous" => {
            expect_arity(ctx, name, args, 1, e)?;
            translate_previous(ctx, &args[0], e)
        }
        "Assert" | "Assume" | "Fold" | "Unfold" => {
            expect_arity(ctx, name, args, 1, e)?;
            require_impure(ctx, &format!("`{}`", name), e.line, e.col)?;
            let pos = ctx.pos(e.line, e.col);
            let stmt = match name {
                "Assert" => Stmt::Assert(translate_bool(ctx, &args[0], stmts)?, pos),
                "Assume" => Stmt::Inhale(translate_bool(ctx, &args[0], stmts)?, pos),
                _ => {
                    let predicate = translate_expr(ctx, &args[0], stmts)?;
                    if !matches!(predicate.expr, ir::Expr::PredicateAcc { .. }) {
                        return Err(ctx.invalid(
                            "unfold.non.predicate",
                            format!("`{}` needs a predicate instance", name),
                            e.line,
                            e.col,
                        ));
                    }
                    if name == "Fold" {
                        Stmt::Fold(predicate.expr, pos)
                    } else {
                        Stmt::Unfold(predicate.expr, pos)
                    }
                }
            };
            stmts.push(stmt);
            Ok(Typed::new(ir::Expr::Null, ctx.builtin_type("NoneType")))
        }
        _ if CONTRACT_STATEMENTS.contains(&name) => Err(ctx.invalid(
            "invalid.contract.position",
            format!("`{}` is only allowed at the start of a body", name),
            e.line,
            e.col,
        )),
        _ => Err(ctx.invalid(
            "invalid.contract.position",
            format!("`{}` is not allowed here", name),
            e.line,
            e.col,
        )),
    }
}

fn arity_error(ctx: &MethodContext, name: &str, e: &Expr) -> program_model::TranslationError {
    ctx.invalid(
        "call.arguments",
        format!("wrong number of arguments for `{}`", name),
        e.line,
        e.col,
    )
}

fn expect_arity(ctx: &MethodContext, name: &str, args: &[Expr], count: usize, e: &Expr) -> Result<()> {
    if args.len() != count {
        return Err(arity_error(ctx, name, e));
    }
    Ok(())
}

/// `Result()`: the result local of a method, or the function result
fn result_value(ctx: &mut MethodContext, e: &Expr) -> Result<Typed> {
    let model = ctx.model;
    let method = model.method(ctx.method());
    let Some(declared) = method.return_type.clone() else {
        return Err(ctx.invalid(
            "invalid.contract.position",
            "`Result()` in a method without a return type",
            e.line,
            e.col,
        ));
    };
    let typ = match ctx.frame().receiver_class {
        Some(cls) => through_receiver(model, &declared, method.cls, Some(&model.class_type(cls))),
        None => declared.clone(),
    };
    match ctx.frame().result.clone() {
        Some(result) => Ok(Typed::new(result, typ)),
        None if method.is_pure() => Ok(Typed::new(ir::Expr::Result(ctx.ir_type(&declared)), typ)),
        None => Err(ctx.invalid(
            "invalid.contract.position",
            "`Result()` outside of a postcondition",
            e.line,
            e.col,
        )),
    }
}

/// Permission amount: `1/2`, `n/m`, or a full permission
fn translate_perm(ctx: &mut MethodContext, e: &Expr, stmts: &mut Vec<Stmt>) -> Result<ir::Expr> {
    match &e.kind {
        ExprKind::Int { value: 1 } => Ok(ir::Expr::FullPerm),
        ExprKind::BinOp {
            left,
            op: Operator::Div,
            right,
        } => match (&left.kind, &right.kind) {
            (ExprKind::Int { value: num }, ExprKind::Int { value: den }) => Ok(ir::Expr::fraction(*num, *den)),
            _ => {
                let num = translate_expr(ctx, left, stmts)?;
                let den = translate_expr(ctx, right, stmts)?;
                if num.expr.typ() != Type::Int || den.expr.typ() != Type::Int {
                    return Err(ctx.unsupported("non-integer permission fraction", e.line, e.col));
                }
                Ok(ir::Expr::binary(BinOp::PermDiv, num.expr, den.expr))
            }
        },
        _ => Err(ctx.unsupported("permission amount", e.line, e.col)),
    }
}

/// `Acc(obj.field, perm)`, `Acc(pred(args), perm)` or `Acc(list_pred(xs), perm)`
fn translate_access(ctx: &mut MethodContext, target: &Expr, perm: ir::Expr, stmts: &mut Vec<Stmt>) -> Result<ir::Expr> {
    match &target.kind {
        ExprKind::Attribute { value, attr } => {
            let model = ctx.model;
            let receiver = translate_expr(ctx, value, stmts)?;
            let Some(field) = model.get_field(receiver.typ.cls(model), attr) else {
                return Err(ctx.invalid(
                    "attribute.unknown",
                    format!("`{}` has no field `{}`", receiver.typ.display(model), attr),
                    target.line,
                    target.col,
                ));
            };
            let root = model.field(model.root_field(field));
            let field_ref = FieldRef::new(root.sil_name.clone(), ctx.ir_type(&root.typ));
            let object = to_ref(ctx, &receiver);
            Ok(ir::Expr::field_acc(object, field_ref, perm))
        }
        ExprKind::Call { func, args, keywords } => {
            let access = translate_call(ctx, target, func, args, keywords, None, stmts)?;
            match access.expr {
                ir::Expr::PredicateAcc { name, args, .. } => Ok(ir::Expr::predicate_acc(name, args, perm)),
                ir::Expr::FieldAcc { receiver, field, .. } => Ok(ir::Expr::field_acc(*receiver, field, perm)),
                _ => Err(ctx.invalid(
                    "invalid.access",
                    "permission to something that is neither a field nor a predicate",
                    target.line,
                    target.col,
                )),
            }
        }
        _ => Err(ctx.invalid(
            "invalid.access",
            "permission to something that is neither a field nor a predicate",
            target.line,
            target.col,
        )),
    }
}

/// `Forall(T, lambda x: body)` or `Forall(T, lambda x: (body, [[triggers]]))`
fn translate_quantifier(ctx: &mut MethodContext, universal: bool, domain: &Expr, lambda: &Expr, e: &Expr) -> Result<ir::Expr> {
    let Some(annotation) = TypeExpr::from_annotation(domain) else {
        return Err(ctx.unsupported("quantification over a computed domain", e.line, e.col));
    };
    let pos = ctx.source_pos(domain.line, domain.col);
    let typ = resolve_type(ctx.model, ctx.module(), ctx.frame().cls, &annotation, Some(&pos))?;
    let ExprKind::Lambda { args, body } = &lambda.kind else {
        return Err(ctx.invalid("quantifier.syntax", "quantifier body must be a lambda", e.line, e.col));
    };
    let [name] = args.as_slice() else {
        return Err(ctx.invalid(
            "quantifier.syntax",
            "quantifier lambda must bind exactly one variable",
            e.line,
            e.col,
        ));
    };
    let (body, triggers) = match &body.kind {
        ExprKind::Tuple { elts } if elts.len() == 2 => (&elts[0], Some(&elts[1])),
        _ => (body.as_ref(), None),
    };

    let var = LocalVar::new(ctx.names.freshen(name), ctx.ir_type(&typ));
    ctx.lambda_vars.push((name.clone(), Typed::new(var.to_expr(), typ.clone())));
    let translated = quantifier_parts(ctx, body, triggers, e);
    ctx.lambda_vars.pop();
    let (body, triggers) = translated?;

    let guard = ctx.type_check(var.to_expr(), &typ);
    Ok(if universal {
        ir::Expr::forall(vec![var], triggers, ir::Expr::implies(guard, body))
    } else {
        ir::Expr::exists(vec![var], triggers, ir::Expr::and(guard, body))
    })
}

fn quantifier_parts(
    ctx: &mut MethodContext,
    body: &Expr,
    triggers: Option<&Expr>,
    e: &Expr,
) -> Result<(ir::Expr, Vec<Vec<ir::Expr>>)> {
    let was_pure = std::mem::replace(&mut ctx.pure, true);
    let result = quantifier_terms(ctx, body, triggers, e);
    ctx.pure = was_pure;
    result
}

fn quantifier_terms(
    ctx: &mut MethodContext,
    body: &Expr,
    triggers: Option<&Expr>,
    e: &Expr,
) -> Result<(ir::Expr, Vec<Vec<ir::Expr>>)> {
    let mut scratch = vec![];
    let body = translate_bool(ctx, body, &mut scratch)?;
    let Some(triggers) = triggers else {
        return Ok((body, vec![]));
    };
    let malformed = |ctx: &MethodContext| ctx.invalid("quantifier.syntax", "triggers must be a list of lists", e.line, e.col);
    let ExprKind::List { elts } = &triggers.kind else {
        return Err(malformed(ctx));
    };
    let mut translated = vec![];
    for trigger in elts {
        let ExprKind::List { elts: terms } = &trigger.kind else {
            return Err(malformed(ctx));
        };
        let mut group = vec![];
        for term in terms {
            group.push(translate_hinted(ctx, term, None, &mut scratch)?.expr);
        }
        translated.push(group);
    }
    Ok((body, translated))
}

/// `Previous(x)`: the elements a for loop over `x`'s iterable has produced so far
fn translate_previous(ctx: &mut MethodContext, target: &Expr, e: &Expr) -> Result<Typed> {
    let model = ctx.model;
    let var = match &target.kind {
        ExprKind::Name { id } => match super::expression_translator::resolve(ctx, id) {
            Some(program_model::analyzer::names::Binding::Var(var)) => Some(var),
            _ => None,
        },
        _ => None,
    };
    let Some(iterator) = var.and_then(|v| ctx.loop_iterators.get(&v).cloned()) else {
        return Err(ctx.invalid(
            "invalid.contract.position",
            "`Previous` needs the target variable of an enclosing for loop",
            e.line,
            e.col,
        ));
    };
    let elem = var
        .map(|v| model.var(v).typ.clone())
        .unwrap_or_else(|| ctx.builtin_type("object"));
    let list_cls = model.builtin("list").unwrap_or_default();
    Ok(Typed::new(
        ir::Expr::field(iterator.to_expr(), previous()),
        PyType::generic(list_cls, vec![elem]),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Defaults;
    use crate::type_domain::TypeDomainFactory;
    use program_model::{analyze, InterfaceDecls, Model, SourceProgram};

    fn model() -> Model {
        let program = SourceProgram::from_json(
            r#"{ "modules": [{ "name": "main", "path": "main.py", "body": [{ "kind": "Pass", "line": 1 }] }] }"#,
        )
        .unwrap();
        analyze(&program, &InterfaceDecls::builtins().unwrap()).unwrap()
    }

    fn name(id: &str) -> Expr {
        Expr::new(ExprKind::Name { id: id.to_string() }, 2, 0)
    }

    #[test]
    fn test_forall_over_ints_binds_fresh_variable() {
        let model = model();
        let mut types = TypeDomainFactory::new();
        let defaults = Defaults::new();
        let main = model.module(model.main_modules[0]).main.unwrap();
        let mut names = model.registry.clone();
        let mut ctx = MethodContext::new(&model, &mut types, &defaults, &mut names, main);
        let body = Expr::new(
            ExprKind::Compare {
                left: Box::new(name("i")),
                ops: vec![program_model::syntax::CmpOp::Eq],
                comparators: vec![name("i")],
            },
            2,
            0,
        );
        let lambda = Expr::new(
            ExprKind::Lambda {
                args: vec!["i".to_string()],
                body: Box::new(body),
            },
            2,
            0,
        );
        let mut stmts = vec![];
        let result = translate_contract_call(&mut ctx, "Forall", &[name("int"), lambda], &[], &name("Forall"), &mut stmts)
            .unwrap();
        assert!(stmts.is_empty());
        let ir::Expr::Forall { vars, .. } = result.expr else {
            panic!("expected a quantifier");
        };
        assert_eq!(vars[0].typ, Type::Int);
        assert!(ctx.lambda_vars.is_empty());
    }

    #[test]
    fn test_requires_inside_body_is_rejected() {
        let model = model();
        let mut types = TypeDomainFactory::new();
        let defaults = Defaults::new();
        let main = model.module(model.main_modules[0]).main.unwrap();
        let mut names = model.registry.clone();
        let mut ctx = MethodContext::new(&model, &mut types, &defaults, &mut names, main);
        let mut stmts = vec![];
        let truth = Expr::new(ExprKind::Bool { value: true }, 2, 9);
        let err = translate_contract_call(&mut ctx, "Requires", &[truth], &[], &name("Requires"), &mut stmts)
            .unwrap_err();
        assert_eq!(err.code(), "invalid.contract.position");
    }

    #[test]
    fn test_assert_emits_statement() {
        let model = model();
        let mut types = TypeDomainFactory::new();
        let defaults = Defaults::new();
        let main = model.module(model.main_modules[0]).main.unwrap();
        let mut names = model.registry.clone();
        let mut ctx = MethodContext::new(&model, &mut types, &defaults, &mut names, main);
        let mut stmts = vec![];
        let truth = Expr::new(ExprKind::Bool { value: true }, 2, 7);
        translate_contract_call(&mut ctx, "Assert", &[truth], &[], &name("Assert"), &mut stmts).unwrap();
        assert!(matches!(stmts.as_slice(), [Stmt::Assert(ir::Expr::BoolLit(true), _)]));
    }
}

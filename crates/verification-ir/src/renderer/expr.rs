// Copyright (c) Asymptotic Labs
// SPDX-License-Identifier: Apache-2.0

//! Expression rendering. Every compound subexpression is parenthesized, so the
//! output never depends on operator precedence.

use crate::data::expressions::{BinOp, Expr, LocalVar, UnOp};
use itertools::Itertools;

pub fn render_expr(expr: &Expr) -> String {
    match expr {
        Expr::IntLit(value) if *value < 0 => format!("({})", value),
        Expr::IntLit(value) => value.to_string(),
        Expr::BoolLit(value) => value.to_string(),
        Expr::Null => "null".to_string(),
        Expr::Local(var) => var.name.clone(),
        Expr::Result(_) => "result".to_string(),
        Expr::Field { receiver, field } => format!("{}.{}", render_expr(receiver), field.name),
        Expr::FuncApp { name, args, .. } | Expr::DomainFuncApp { name, args, .. } => {
            format!("{}({})", name, render_list(args))
        }
        Expr::Binary { op: BinOp::PermDiv, lhs, rhs } => {
            format!("{} / {}", render_expr(lhs), render_expr(rhs))
        }
        Expr::Binary { op, lhs, rhs } => {
            format!("({} {} {})", render_expr(lhs), op.symbol(), render_expr(rhs))
        }
        Expr::Unary { op: UnOp::Not, operand } => format!("!{}", render_expr(operand)),
        Expr::Unary { op: UnOp::Neg, operand } => format!("-{}", render_expr(operand)),
        Expr::Cond { cond, then, els } => format!(
            "({} ? {} : {})",
            render_expr(cond),
            render_expr(then),
            render_expr(els)
        ),
        Expr::Old(inner) => format!("old({})", render_expr(inner)),
        Expr::LabelledOld { label, expr } => format!("old[{}]({})", label, render_expr(expr)),
        Expr::Forall {
            vars,
            triggers,
            body,
        } => render_quantifier("forall", vars, triggers, body),
        Expr::Exists {
            vars,
            triggers,
            body,
        } => render_quantifier("exists", vars, triggers, body),
        Expr::FieldAcc {
            receiver,
            field,
            perm,
        } => format!(
            "acc({}.{}, {})",
            render_expr(receiver),
            field.name,
            render_expr(perm)
        ),
        Expr::PredicateAcc { name, args, perm } => {
            format!("acc({}({}), {})", name, render_list(args), render_expr(perm))
        }
        Expr::FullPerm => "write".to_string(),
        Expr::NoPerm => "none".to_string(),
        Expr::WildcardPerm => "wildcard".to_string(),
        Expr::Unfolding { predicate, body } => {
            format!("(unfolding {} in {})", render_expr(predicate), render_expr(body))
        }
        Expr::Let { var, value, body } => format!(
            "(let {} == ({}) in {})",
            var.name,
            render_expr(value),
            render_expr(body)
        ),
        Expr::SeqLit { elems, elem_type } if elems.is_empty() => format!("Seq[{}]()", elem_type),
        Expr::SeqLit { elems, .. } => format!("Seq({})", render_list(elems)),
        Expr::SetLit { elems, elem_type } if elems.is_empty() => format!("Set[{}]()", elem_type),
        Expr::SetLit { elems, .. } => format!("Set({})", render_list(elems)),
        Expr::SeqLength(seq) => format!("|{}|", render_expr(seq)),
        Expr::SeqIndex(seq, index) => format!("{}[{}]", render_expr(seq), render_expr(index)),
        Expr::SeqTake(seq, count) => format!("{}[..{}]", render_expr(seq), render_expr(count)),
        Expr::SeqDrop(seq, count) => format!("{}[{}..]", render_expr(seq), render_expr(count)),
        Expr::SeqRange(from, to) => format!("[{}..{})", render_expr(from), render_expr(to)),
        Expr::Contains { elem, collection } => {
            format!("({} in {})", render_expr(elem), render_expr(collection))
        }
    }
}

/// Render without the outermost parentheses, for statement and contract positions
pub fn render_top(expr: &Expr) -> String {
    match expr {
        Expr::Binary { op, lhs, rhs } if *op != BinOp::PermDiv => {
            format!("{} {} {}", render_expr(lhs), op.symbol(), render_expr(rhs))
        }
        _ => render_expr(expr),
    }
}

pub fn render_list(exprs: &[Expr]) -> String {
    exprs.iter().map(render_expr).join(", ")
}

pub fn render_params(vars: &[LocalVar]) -> String {
    vars.iter()
        .map(|v| format!("{}: {}", v.name, v.typ))
        .join(", ")
}

fn render_quantifier(keyword: &str, vars: &[LocalVar], triggers: &[Vec<Expr>], body: &Expr) -> String {
    let triggers = triggers
        .iter()
        .map(|t| format!("{{ {} }} ", render_list(t)))
        .join("");
    format!(
        "({} {} :: {}{})",
        keyword,
        render_params(vars),
        triggers,
        render_expr(body)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::expressions::FieldRef;
    use crate::data::types::Type;

    #[test]
    fn test_render_quantifier_with_trigger() {
        let t = LocalVar::new("t", Type::domain("PyType"));
        let app = Expr::domain_app("PyType", "issubtype", vec![t.to_expr(), t.to_expr()], Type::Bool);
        let e = Expr::forall(vec![t], vec![vec![app.clone()]], app);
        insta::assert_snapshot!(render_expr(&e), @"(forall t: PyType :: { issubtype(t, t) } issubtype(t, t))");
    }

    #[test]
    fn test_render_access_and_sequences() {
        let r = Expr::local("r", Type::Ref);
        let field = FieldRef::new("list_acc", Type::seq(Type::Ref));
        let acc = Expr::field_acc(r.clone(), field.clone(), Expr::fraction(1, 20));
        assert_eq!(render_expr(&acc), "acc(r.list_acc, 1 / 20)");
        let len = Expr::seq_len(Expr::field(r, field));
        assert_eq!(render_expr(&Expr::binary(BinOp::Le, Expr::int(0), len)), "(0 <= |r.list_acc|)");
        let empty = Expr::SeqLit {
            elems: vec![],
            elem_type: Type::Ref,
        };
        assert_eq!(render_expr(&empty), "Seq[Ref]()");
    }
}

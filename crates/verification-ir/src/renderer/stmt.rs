// Copyright (c) Asymptotic Labs
// SPDX-License-Identifier: Apache-2.0

use crate::data::statements::Stmt;
use crate::renderer::expr::{render_expr, render_list, render_top};
use crate::renderer::writer::IrWriter;
use itertools::Itertools;

pub fn render_block(w: &mut IrWriter, stmts: &[Stmt]) {
    for stmt in stmts {
        render_stmt(w, stmt);
    }
}

pub fn render_stmt(w: &mut IrWriter, stmt: &Stmt) {
    match stmt {
        Stmt::LocalAssign { target, value } => {
            w.line_fmt(format_args!("{} := {}", target.name, render_top(value)))
        }
        Stmt::FieldAssign {
            receiver,
            field,
            value,
        } => w.line_fmt(format_args!(
            "{}.{} := {}",
            render_expr(receiver),
            field.name,
            render_top(value)
        )),
        Stmt::MethodCall {
            method,
            args,
            targets,
            ..
        } => {
            if !targets.is_empty() {
                w.write(&targets.iter().map(|t| t.name.as_str()).join(", "));
                w.write(" := ");
            }
            w.line_fmt(format_args!("{}({})", method, render_list(args)));
        }
        Stmt::New { target, fields } => w.line_fmt(format_args!(
            "{} := new({})",
            target.name,
            fields.iter().map(|f| f.name.as_str()).join(", ")
        )),
        Stmt::Inhale(e, _) => w.line_fmt(format_args!("inhale {}", render_top(e))),
        Stmt::Exhale(e, _) => w.line_fmt(format_args!("exhale {}", render_top(e))),
        Stmt::Assert(e, _) => w.line_fmt(format_args!("assert {}", render_top(e))),
        Stmt::Fold(e, _) => w.line_fmt(format_args!("fold {}", render_expr(e))),
        Stmt::Unfold(e, _) => w.line_fmt(format_args!("unfold {}", render_expr(e))),
        Stmt::If { cond, then, els } => {
            w.write_fmt(format_args!("if ({}) {{", render_top(cond)));
            w.indent(true);
            render_block(w, then);
            w.dedent();
            if els.is_empty() {
                w.line("}");
            } else if let [nested @ Stmt::If { .. }] = els.as_slice() {
                w.write("} else ");
                render_stmt(w, nested);
            } else {
                w.write("} else {");
                w.indent(true);
                render_block(w, els);
                w.dedent();
                w.line("}");
            }
        }
        Stmt::While {
            cond,
            invariants,
            body,
        } => {
            w.write_fmt(format_args!("while ({})", render_top(cond)));
            w.indent(true);
            for inv in invariants {
                w.line_fmt(format_args!("invariant {}", render_top(inv)));
            }
            w.dedent();
            w.write("{");
            w.indent(true);
            render_block(w, body);
            w.dedent();
            w.line("}");
        }
        Stmt::Label { name, invariants } => {
            w.write_fmt(format_args!("label {}", name));
            w.indent(false);
            for inv in invariants {
                w.newline();
                w.write_fmt(format_args!("invariant {}", render_top(inv)));
            }
            w.dedent();
            w.newline();
        }
        Stmt::Goto(name) => w.line_fmt(format_args!("goto {}", name)),
        Stmt::Seqn(stmts) => {
            w.write("{");
            w.indent(true);
            render_block(w, stmts);
            w.dedent();
            w.line("}");
        }
        Stmt::Comment(text) => w.line_fmt(format_args!("// {}", text)),
    }
}

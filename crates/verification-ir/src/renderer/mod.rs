// Copyright (c) Asymptotic Labs
// SPDX-License-Identifier: Apache-2.0

//! Text rendering of a verification program

pub mod expr;
pub mod stmt;
pub mod writer;

use crate::data::declarations::{Assertion, Domain, Function, Method, Predicate};
use crate::data::Program;
use expr::{render_params, render_top};
use stmt::render_block;
use writer::{render_to_string, IrWriter};

pub fn render_program(program: &Program) -> String {
    render_to_string(|w| {
        for domain in program.domains.values() {
            render_domain(w, domain);
            w.newline();
        }
        for field in program.fields.values() {
            w.line_fmt(format_args!("field {}: {}", field.name, field.typ));
        }
        if !program.fields.is_empty() {
            w.newline();
        }
        for function in program.functions.values() {
            render_function(w, function);
            w.newline();
        }
        for predicate in program.predicates.values() {
            render_predicate(w, predicate);
            w.newline();
        }
        for method in program.methods.values() {
            render_method(w, method);
            w.newline();
        }
    })
}

pub fn render_domain(w: &mut IrWriter, domain: &Domain) {
    w.write_fmt(format_args!("domain {} {{", domain.name));
    w.indent(true);
    for func in &domain.functions {
        if func.unique {
            w.write("unique ");
        }
        w.line_fmt(format_args!(
            "function {}({}): {}",
            func.name,
            render_params(&func.params),
            func.ret
        ));
    }
    for axiom in &domain.axioms {
        w.newline();
        w.write_fmt(format_args!("axiom {} {{", axiom.name));
        w.indent(true);
        w.line(&render_top(&axiom.expr));
        w.dedent();
        w.line("}");
    }
    w.dedent();
    w.line("}");
}

fn render_contracts(w: &mut IrWriter, keyword: &str, items: &[Assertion]) {
    for item in items {
        w.line_fmt(format_args!("{} {}", keyword, render_top(&item.expr)));
    }
}

pub fn render_function(w: &mut IrWriter, function: &Function) {
    w.line_fmt(format_args!(
        "function {}({}): {}",
        function.name,
        render_params(&function.params),
        function.ret
    ));
    w.indent(false);
    render_contracts(w, "requires", &function.pres);
    render_contracts(w, "ensures", &function.posts);
    w.dedent();
    if let Some(body) = &function.body {
        w.write("{");
        w.indent(true);
        w.line(&render_top(body));
        w.dedent();
        w.line("}");
    }
}

pub fn render_predicate(w: &mut IrWriter, predicate: &Predicate) {
    w.write_fmt(format_args!(
        "predicate {}({})",
        predicate.name,
        render_params(&predicate.params)
    ));
    match &predicate.body {
        Some(body) => {
            w.write(" {");
            w.indent(true);
            w.line(&render_top(body));
            w.dedent();
            w.line("}");
        }
        None => w.newline(),
    }
}

pub fn render_method(w: &mut IrWriter, method: &Method) {
    w.write_fmt(format_args!("method {}({})", method.name, render_params(&method.params)));
    if !method.returns.is_empty() {
        w.write_fmt(format_args!(" returns ({})", render_params(&method.returns)));
    }
    w.newline();
    w.indent(false);
    render_contracts(w, "requires", &method.pres);
    render_contracts(w, "ensures", &method.posts);
    w.dedent();
    if let Some(body) = &method.body {
        w.write("{");
        w.indent(true);
        for local in &method.locals {
            w.line_fmt(format_args!("var {}: {}", local.name, local.typ));
        }
        render_block(w, body);
        w.dedent();
        w.line("}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::declarations::Declaration;
    use crate::data::expressions::{Expr, LocalVar};
    use crate::data::position::Position;
    use crate::data::statements::Stmt;
    use crate::data::types::Type;

    #[test]
    fn test_render_method_with_labels_and_branches() {
        let err = LocalVar::new("_err", Type::Ref);
        let method = Method {
            name: "m".to_string(),
            params: vec![LocalVar::new("self", Type::Ref)],
            returns: vec![err.clone()],
            pres: vec![Assertion::new(
                Expr::ne(Expr::local("self", Type::Ref), Expr::Null),
                Position::default(),
            )],
            posts: vec![],
            locals: vec![LocalVar::new("code", Type::Int)],
            body: Some(vec![
                Stmt::assign(LocalVar::new("code", Type::Int), Expr::int(0)),
                Stmt::If {
                    cond: Expr::ne(err.to_expr(), Expr::Null),
                    then: vec![Stmt::goto("handler")],
                    els: vec![Stmt::Exhale(Expr::ff(), Position::default())],
                },
                Stmt::label("handler"),
                Stmt::goto("__end"),
                Stmt::label("__end"),
            ]),
            pos: Position::default(),
        };
        let mut program = Program::new();
        program.add(Declaration::Method(method)).unwrap();
        insta::assert_snapshot!(render_program(&program), @r###"
        method m(self: Ref) returns (_err: Ref)
          requires self != null
        {
          var code: Int
          code := 0
          if (_err != null) {
            goto handler
          } else {
            exhale false
          }
          label handler
          goto __end
          label __end
        }
        "###);
    }
}

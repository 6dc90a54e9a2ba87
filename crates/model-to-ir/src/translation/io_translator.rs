// Copyright (c) Asymptotic Labs
// SPDX-License-Identifier: Apache-2.0

//! IO operations and call slots
//!
//! An IO operation becomes an abstract (or defined) IR predicate over its
//! parameters, one function per result parameter and a termination function.
//! A call slot becomes an uninterpreted `Bool` function.

use super::expression_translator::{translate_assertion, translate_pure};
use super::utilities::coerce;
use crate::context::{MethodContext, Typed};
use indexmap::IndexMap;
use program_model::{CallSlotId, IoOperationId, Result, VarId};
use verification_ir::{self as ir, Assertion, Declaration, LocalVar, Type};

/// Bind `vars` under their source names; returns their IR parameters
fn bind_params(ctx: &mut MethodContext, vars: &IndexMap<String, VarId>) -> Vec<LocalVar> {
    let model = ctx.model;
    let mut params = vec![];
    for (name, var) in vars {
        let v = model.var(*var);
        let param = LocalVar::new(v.sil_name.clone(), ctx.ir_type(&v.typ));
        ctx.lambda_vars.push((name.clone(), Typed::new(param.to_expr(), v.typ.clone())));
        params.push(param);
    }
    params
}

/// Name of the function giving the value of `result` of IO operation `op`
pub fn result_function(op: &str, result: &str) -> String {
    format!("{}_{}", op, result)
}

pub fn terminates_function(op: &str) -> String {
    format!("{}_terminates", op)
}

pub fn measure_function(op: &str) -> String {
    format!("{}_measure", op)
}

/// `ctx` is created for the module declaring the operation.
pub fn translate_io_operation(ctx: &mut MethodContext, op: IoOperationId) -> Result<Vec<Declaration>> {
    let model = ctx.model;
    let io = model.io_operation(op);
    let pos = ctx.pos(io.pos.line, io.pos.col);
    let params = bind_params(ctx, &io.params);
    let args = params.iter().map(LocalVar::to_expr).collect::<Vec<_>>();
    let instance = ir::Expr::predicate_acc(io.sil_name.clone(), args.clone(), ir::Expr::WildcardPerm);

    let mut decls = vec![];
    for (name, var) in &io.results {
        let v = model.var(*var);
        let ret = ctx.ir_type(&v.typ);
        let getter = ir::Expr::func_app(result_function(&io.sil_name, name), args.clone(), ret.clone());
        // inside the definition, results read through their functions
        ctx.lambda_vars.push((name.clone(), Typed::new(getter, v.typ.clone())));
        let mut posts = vec![];
        if ret == Type::Ref {
            let check = ctx.type_check(ir::Expr::Result(ret.clone()), &v.typ);
            posts.push(Assertion::new(check, pos.clone()));
        }
        decls.push(Declaration::Function(ir::Function {
            name: result_function(&io.sil_name, name),
            params: params.clone(),
            ret,
            pres: vec![Assertion::new(instance.clone(), pos.clone())],
            posts,
            body: None,
            pos: pos.clone(),
        }));
    }

    let body = match &io.body {
        Some(body) => Some(translate_assertion(ctx, body)?),
        None => None,
    };
    decls.insert(
        0,
        Declaration::Predicate(ir::Predicate {
            name: io.sil_name.clone(),
            params: params.clone(),
            body,
            pos: pos.clone(),
        }),
    );

    let terminates = match &io.terminates {
        Some(cond) => Some(translate_assertion(ctx, cond)?),
        None => None,
    };
    decls.push(Declaration::Function(ir::Function {
        name: terminates_function(&io.sil_name),
        params: params.clone(),
        ret: Type::Bool,
        pres: vec![Assertion::new(instance.clone(), pos.clone())],
        posts: vec![],
        body: terminates,
        pos: pos.clone(),
    }));
    if let Some(measure) = &io.termination_measure {
        let value = translate_pure(ctx, measure, None)?;
        let value = coerce(ctx, &value, &Type::Int);
        decls.push(Declaration::Function(ir::Function {
            name: measure_function(&io.sil_name),
            params,
            ret: Type::Int,
            pres: vec![Assertion::new(instance, pos.clone())],
            posts: vec![Assertion::new(
                ir::Expr::binary(ir::BinOp::Ge, ir::Expr::Result(Type::Int), ir::Expr::int(0)),
                pos.clone(),
            )],
            body: Some(value),
            pos,
        }));
    }
    ctx.lambda_vars.clear();
    Ok(decls)
}

/// `ctx` is created for the module declaring the slot.
pub fn translate_call_slot(ctx: &mut MethodContext, slot: CallSlotId) -> ir::Function {
    let model = ctx.model;
    let call_slot = model.call_slot(slot);
    let params = bind_params(ctx, &call_slot.args);
    ctx.lambda_vars.clear();
    ir::Function {
        name: call_slot.sil_name.clone(),
        params,
        ret: Type::Bool,
        pres: vec![],
        posts: vec![],
        body: None,
        pos: ctx.pos(call_slot.pos.line, call_slot.pos.col),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Defaults;
    use crate::type_domain::TypeDomainFactory;
    use program_model::{analyze, InterfaceDecls, SourceProgram};

    #[test]
    fn test_io_operation_yields_predicate_and_result_functions() {
        let program = SourceProgram::from_json(
            r#"{ "modules": [{ "name": "main", "path": "main.py", "body": [
                { "kind": "FunctionDef", "name": "read_int", "line": 1,
                  "decorators": [{ "kind": "Name", "id": "IOOperation" }],
                  "args": {
                    "args": [
                      { "name": "t_pre", "annotation": { "kind": "Name", "id": "int" } },
                      { "name": "result", "annotation": { "kind": "Name", "id": "int" } }
                    ],
                    "defaults": [{ "kind": "Call", "func": { "kind": "Name", "id": "Result" } }]
                  },
                  "returns": { "kind": "Name", "id": "bool" },
                  "body": [{ "kind": "Expr", "line": 2, "value": { "kind": "Call",
                      "func": { "kind": "Name", "id": "Terminates" }, "args": [{ "kind": "Bool", "value": true }] } }] }
            ] }] }"#,
        )
        .unwrap();
        let model = analyze(&program, &InterfaceDecls::builtins().unwrap()).unwrap();
        let module = model.main_modules[0];
        let op = model.module(module).io_operations["read_int"];
        let mut types = TypeDomainFactory::new();
        let defaults = Defaults::new();
        let mut names = model.registry.clone();
        let mut ctx = MethodContext::for_module(&model, &mut types, &defaults, &mut names, module);
        let decls = translate_io_operation(&mut ctx, op).unwrap();

        let sil_name = &model.io_operation(op).sil_name;
        let names = decls.iter().map(|d| d.name().to_string()).collect::<Vec<_>>();
        assert_eq!(
            names,
            vec![
                sil_name.clone(),
                result_function(sil_name, "result"),
                terminates_function(sil_name)
            ]
        );
        let Declaration::Function(terminates) = &decls[2] else {
            panic!("expected the termination function");
        };
        assert_eq!(terminates.body, Some(ir::Expr::tt()));
        assert!(ctx.lambda_vars.is_empty());
    }
}

// Copyright (c) Asymptotic Labs
// SPDX-License-Identifier: Apache-2.0

//! Shared utilities for translation
//!
//! Provides common functionality used across multiple translators:
//! - Conversion between boxed references and primitive IR values
//! - Truthiness of source values
//! - Member signatures seen through an instantiated receiver type

use crate::context::{MethodContext, Typed};
use crate::prelude::{box_bool, box_int, unbox_bool, unbox_int};
use itertools::Itertools;
use program_model::{ClassId, Model, PyType, Result};
use verification_ir::{Expr, Type};

/// Convert a translated value to the IR type `target`
pub fn coerce(ctx: &MethodContext, value: &Typed, target: &Type) -> Expr {
    let expr = value.expr.clone();
    let source = expr.typ();
    if &source == target {
        return expr;
    }
    match (source, target) {
        (Type::Int, Type::Ref) => box_int(expr),
        (Type::Bool, Type::Ref) => box_bool(expr),
        // bool boxes are int boxes as well
        (Type::Ref, Type::Int) => unbox_int(expr),
        (Type::Ref, Type::Bool) => truthiness(ctx.model, value),
        (Type::Bool, Type::Int) => Expr::cond(expr, Expr::int(1), Expr::int(0)),
        (Type::Int, Type::Bool) => Expr::ne(expr, Expr::int(0)),
        _ => expr,
    }
}

pub fn to_bool(ctx: &MethodContext, value: &Typed) -> Expr {
    coerce(ctx, value, &Type::Bool)
}

pub fn to_ref(ctx: &MethodContext, value: &Typed) -> Expr {
    coerce(ctx, value, &Type::Ref)
}

fn truthiness(model: &Model, value: &Typed) -> Expr {
    let typ = &value.typ;
    let expr = value.expr.clone();
    if model.is_bool(typ) {
        return unbox_bool(expr);
    }
    if model.is_int(typ) {
        return Expr::ne(unbox_int(expr), Expr::int(0));
    }
    if model.is_none(typ) {
        return Expr::ff();
    }
    let bool_member = model
        .get_member(typ.cls(model), "__bool__")
        .filter(|m| !model.method(*m).interface && model.method(*m).is_pure());
    match bool_member {
        Some(member) => Expr::func_app(model.method(member).sil_name.clone(), vec![expr], Type::Bool),
        None => Expr::func_app("object___bool__", vec![expr], Type::Bool),
    }
}

/// Type arguments with which `typ` instantiates its superclass `target`
pub fn instantiation(model: &Model, typ: &PyType, target: ClassId) -> Option<Vec<PyType>> {
    let mut cls = typ.cls(model);
    let mut args = typ.type_args().to_vec();
    loop {
        if cls == target {
            return (!args.is_empty()).then_some(args);
        }
        let class = model.class(cls);
        let sup = class.superclass?;
        args = class
            .superclass_args
            .iter()
            .map(|a| a.substitute(cls, &args))
            .collect();
        cls = sup;
    }
}

/// A member's declared type as seen through a receiver of static type `receiver`
pub fn through_receiver(model: &Model, typ: &PyType, owner: Option<ClassId>, receiver: Option<&PyType>) -> PyType {
    match (owner, receiver) {
        (Some(owner), Some(receiver)) => match instantiation(model, receiver, owner) {
            Some(args) => typ.substitute(owner, &args),
            None => typ.clone(),
        },
        _ => typ.clone(),
    }
}

/// The most precise type covering all of `types`
pub fn join_types(model: &Model, types: &[PyType]) -> PyType {
    let object = || PyType::Class(model.builtin("object").unwrap_or_default());
    let Some(first) = types.first() else {
        return object();
    };
    if types.iter().all(|t| t == first) {
        return first.clone();
    }
    let classes = types.iter().map(|t| t.cls(model)).unique().collect_vec();
    PyType::Class(model.common_superclass(&classes))
}

/// Fails when `what` would need statements in a pure context
pub fn require_impure(ctx: &MethodContext, what: &str, line: usize, col: usize) -> Result<()> {
    if ctx.pure {
        return Err(ctx.invalid(
            "purity.violated",
            format!("{} is not allowed in a pure context", what),
            line,
            col,
        ));
    }
    Ok(())
}

/// Deterministic integer value of a string literal
pub fn string_value(text: &str) -> i64 {
    text.bytes()
        .fold(0i64, |acc, b| acc.wrapping_mul(31).wrapping_add(b as i64))
        .rem_euclid(i64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_string_values_are_stable_and_distinct() {
        assert_eq!(string_value("abc"), string_value("abc"));
        assert_ne!(string_value("abc"), string_value("acb"));
        assert_eq!(string_value(""), 0);
    }
}

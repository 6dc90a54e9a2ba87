// Copyright (c) Asymptotic Labs
// SPDX-License-Identifier: Apache-2.0

//! Resolution of type expressions against the model.

use crate::error::{Result, SourcePos, TranslationError};
use crate::model::{ClassId, Model, ModuleId, PyType};
use crate::syntax::{Expr, ExprKind};
use crate::type_expr::TypeExpr;

/// Typing aliases of built-in classes
fn builtin_alias(name: &str) -> Option<&'static str> {
    Some(match name {
        "List" | "typing.List" => "list",
        "Dict" | "typing.Dict" => "dict",
        "Set" | "typing.Set" => "set",
        "Tuple" | "typing.Tuple" => "tuple",
        "Type" | "typing.Type" => "type",
        "Iterator" | "typing.Iterator" | "Iterable" | "typing.Iterable" => "Iterator",
        "Any" | "typing.Any" => "object",
        _ => return None,
    })
}

pub fn builtin_class(model: &Model, name: &str, pos: Option<&SourcePos>) -> Result<ClassId> {
    model
        .builtin(name)
        .ok_or_else(|| TranslationError::unsupported(format!("missing built-in class `{}`", name), pos.cloned()))
}

/// Resolve a type expression in the scope of `module` and, for class type
/// variables, `cls`
pub fn resolve_type(
    model: &Model,
    module: ModuleId,
    cls: Option<ClassId>,
    typ: &TypeExpr,
    pos: Option<&SourcePos>,
) -> Result<PyType> {
    let resolve_args = |args: &[TypeExpr]| {
        args.iter()
            .map(|a| resolve_type(model, module, cls, a, pos))
            .collect::<Result<Vec<_>>>()
    };
    match typ.name.as_str() {
        "None" | "NoneType" => return Ok(PyType::Class(builtin_class(model, "NoneType", pos)?)),
        "Optional" | "typing.Optional" => {
            let [inner] = typ.args.as_slice() else {
                return Err(TranslationError::unsupported(format!("type `{}`", typ), pos.cloned()));
            };
            return Ok(PyType::Optional(Box::new(resolve_type(model, module, cls, inner, pos)?)));
        }
        "Union" | "typing.Union" => {
            let none = builtin_class(model, "NoneType", pos)?;
            let mut members = vec![];
            let mut optional = false;
            for member in resolve_args(&typ.args)? {
                match member {
                    PyType::Class(c) if c == none => optional = true,
                    PyType::Union(inner) => members.extend(inner),
                    other if !members.contains(&other) => members.push(other),
                    _ => {}
                }
            }
            let core = match members.len() {
                0 => PyType::Class(none),
                1 => members.remove(0),
                _ => PyType::Union(members),
            };
            return Ok(if optional { PyType::Optional(Box::new(core)) } else { core });
        }
        _ => {}
    }

    // type variables
    if typ.args.is_empty() {
        if let Some(var) = cls.and_then(|c| model.class(c).type_vars.get(&typ.name)) {
            return Ok(var.clone());
        }
        if let Some(var) = model.module(module).type_vars.get(&typ.name) {
            return Ok(var.clone());
        }
    }

    let name = builtin_alias(&typ.name).unwrap_or(typ.name.as_str());
    let class = model
        .lookup_class(module, name)
        .ok_or_else(|| TranslationError::unsupported(format!("unknown type `{}`", typ.name), pos.cloned()))?;
    if typ.args.is_empty() && !typ.variadic {
        return Ok(PyType::Class(class));
    }
    let args = resolve_args(&typ.args)?;
    if model.is_builtin(class, "tuple") {
        return Ok(PyType::Generic {
            cls: class,
            args,
            exact_length: !typ.variadic,
        });
    }
    Ok(PyType::generic(class, args))
}

/// Type of a value expression when the type table has no entry for its target
pub fn literal_type(model: &Model, module: ModuleId, value: &Expr) -> Option<PyType> {
    let builtin = |name: &str| model.builtin(name).map(PyType::Class);
    match &value.kind {
        ExprKind::Int { .. } => builtin("int"),
        ExprKind::Bool { .. } => builtin("bool"),
        ExprKind::Str { .. } => builtin("str"),
        ExprKind::NoneLit => builtin("NoneType"),
        ExprKind::List { elts } => {
            let list = model.builtin("list")?;
            let elem = elts
                .first()
                .and_then(|e| literal_type(model, module, e))
                .or_else(|| builtin("object"))?;
            Some(PyType::generic(list, vec![elem]))
        }
        ExprKind::Tuple { elts } => {
            let tuple = model.builtin("tuple")?;
            let args = elts
                .iter()
                .map(|e| literal_type(model, module, e))
                .collect::<Option<Vec<_>>>()?;
            Some(PyType::generic(tuple, args))
        }
        ExprKind::Compare { .. } | ExprKind::BoolOp { .. } => builtin("bool"),
        ExprKind::UnaryOp { operand, .. } => literal_type(model, module, operand),
        ExprKind::BinOp { left, .. } => literal_type(model, module, left),
        ExprKind::Call { func, .. } => {
            let name = func.dotted_name()?;
            match name.as_str() {
                "range" => builtin("range"),
                "len" => builtin("int"),
                "isinstance" | "bool" => builtin("bool"),
                _ => model.lookup_class(module, &name).map(|c| model.class_type(c)),
            }
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Class, Module};

    fn model() -> (Model, ModuleId) {
        let mut model = Model::new();
        let global = model.add_module(Module {
            name: "builtins".to_string(),
            is_global: true,
            ..Default::default()
        });
        for name in ["object", "NoneType", "int", "bool", "list", "tuple"] {
            let id = model.add_class(Class {
                name: name.to_string(),
                ..Default::default()
            });
            model.module_mut(global).classes.insert(name.to_string(), id);
        }
        let user = model.add_module(Module {
            name: "m".to_string(),
            ..Default::default()
        });
        (model, user)
    }

    fn resolve(model: &Model, module: ModuleId, text: &str) -> String {
        let typ = resolve_type(model, module, None, &text.parse().unwrap(), None).unwrap();
        typ.display(model)
    }

    #[test]
    fn test_resolve_builtin_aliases() {
        let (model, m) = model();
        assert_eq!(resolve(&model, m, "List[int]"), "list[int]");
        assert_eq!(resolve(&model, m, "Tuple[int, ...]"), "tuple[int, ...]");
        assert_eq!(resolve(&model, m, "Optional[int]"), "Optional[int]");
        assert_eq!(resolve(&model, m, "Union[int, None]"), "Optional[int]");
        assert_eq!(resolve(&model, m, "Union[int, bool]"), "Union[int, bool]");
        assert_eq!(resolve(&model, m, "Any"), "object");
    }

    #[test]
    fn test_unknown_type_is_unsupported() {
        let (model, m) = model();
        let err = resolve_type(&model, m, None, &"Foo".parse().unwrap(), None).unwrap_err();
        assert_eq!(err.code(), "unsupported");
    }

    #[test]
    fn test_literal_types() {
        let (model, m) = model();
        let list = Expr::new(
            ExprKind::List {
                elts: vec![Expr::new(ExprKind::Int { value: 1 }, 0, 0)],
            },
            0,
            0,
        );
        assert_eq!(literal_type(&model, m, &list).unwrap().display(&model), "list[int]");
    }
}

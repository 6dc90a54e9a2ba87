// Copyright (c) Asymptotic Labs
// SPDX-License-Identifier: Apache-2.0

use crate::error::{Result, SourcePos, TranslationError};
use crate::model::{MethodKind, MethodType};
use crate::syntax::{Expr, ExprKind};
use log::warn;

/// Decorators that may not be combined with any other decorator
const SOLE_DECORATORS: &[&str] = &[
    "IOOperation",
    "property",
    "CallSlot",
    "UniversallyQuantified",
    "CallSlotProof",
];

/// Magic methods a class may define
pub const ALLOWED_MAGIC_METHODS: &[&str] = &[
    "__init__", "__enter__", "__exit__", "__str__", "__repr__", "__bool__", "__hash__",
    "__eq__", "__ne__", "__lt__", "__le__", "__gt__", "__ge__", "__add__", "__sub__",
    "__mul__", "__truediv__", "__floordiv__", "__mod__", "__and__", "__or__", "__xor__",
    "__len__", "__getitem__", "__setitem__", "__contains__", "__iter__",
];

/// The member kind a decorator list selects
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub kind: MethodKind,
    pub method_type: MethodType,
    pub contract_only: bool,
    /// `@name.setter`: the property this function sets
    pub setter_of: Option<String>,
    /// `@UniversallyQuantified` or `@CallSlotProof`
    pub call_slot_helper: bool,
}

pub fn classify(decorators: &[Expr], pos: &SourcePos) -> Result<Classification> {
    let mut names = vec![];
    let mut setter_of = None;
    for decorator in decorators {
        match &decorator.kind {
            ExprKind::Name { id } => names.push(id.as_str()),
            ExprKind::Attribute { value, attr } if attr == "setter" => match value.as_name() {
                Some(property) => {
                    setter_of = Some(property.to_string());
                    names.push("setter");
                }
                None => return Err(TranslationError::unsupported("setter decorator", Some(pos.clone()))),
            },
            _ => {
                return Err(TranslationError::unsupported(
                    "decorator expression",
                    Some(pos.clone()),
                ))
            }
        }
    }

    let has = |name: &str| names.contains(&name);
    let incompatible = || {
        TranslationError::invalid(
            "decorators.incompatible",
            format!("incompatible decorators: {}", names.join(", ")),
            Some(pos.clone()),
        )
    };
    if has("Pure") && has("Predicate") {
        return Err(incompatible());
    }
    if has("staticmethod") && has("classmethod") {
        return Err(incompatible());
    }
    if names.len() > 1 && (names.iter().any(|n| SOLE_DECORATORS.contains(n)) || has("setter")) {
        return Err(incompatible());
    }

    let kind = if has("IOOperation") {
        MethodKind::IOOperation
    } else if has("CallSlot") {
        MethodKind::CallSlot
    } else if has("property") {
        MethodKind::Property
    } else if has("Pure") {
        MethodKind::Pure
    } else if has("Predicate") {
        MethodKind::Predicate
    } else if has("staticmethod") {
        MethodKind::Static
    } else if has("classmethod") {
        MethodKind::ClassMethod
    } else {
        MethodKind::Normal
    };
    let method_type = if has("staticmethod") {
        MethodType::Static
    } else if has("classmethod") {
        MethodType::ClassMethod
    } else {
        MethodType::Normal
    };

    for name in &names {
        let known = matches!(
            *name,
            "Pure"
                | "Predicate"
                | "staticmethod"
                | "classmethod"
                | "property"
                | "setter"
                | "ContractOnly"
                | "IOOperation"
                | "CallSlot"
                | "UniversallyQuantified"
                | "CallSlotProof"
        );
        if !known {
            warn!("{}: ignoring unknown decorator `{}`", pos, name);
        }
    }

    Ok(Classification {
        kind,
        method_type,
        contract_only: has("ContractOnly"),
        setter_of,
        call_slot_helper: has("UniversallyQuantified") || has("CallSlotProof"),
    })
}

pub fn is_magic(name: &str) -> bool {
    name.len() > 4 && name.starts_with("__") && name.ends_with("__")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decorators(names: &[&str]) -> Vec<Expr> {
        names.iter().map(|n| Expr::name(n)).collect()
    }

    fn code(result: Result<Classification>) -> String {
        result.unwrap_err().code().to_string()
    }

    #[test]
    fn test_classify_kinds() {
        let pos = SourcePos::default();
        assert_eq!(classify(&[], &pos).unwrap().kind, MethodKind::Normal);
        assert_eq!(classify(&decorators(&["Pure"]), &pos).unwrap().kind, MethodKind::Pure);
        let static_pure = classify(&decorators(&["staticmethod", "Pure"]), &pos).unwrap();
        assert_eq!(static_pure.kind, MethodKind::Pure);
        assert_eq!(static_pure.method_type, MethodType::Static);
        let class_method = classify(&decorators(&["classmethod"]), &pos).unwrap();
        assert_eq!(class_method.kind, MethodKind::ClassMethod);
        assert_eq!(class_method.method_type, MethodType::ClassMethod);
        assert!(classify(&decorators(&["ContractOnly"]), &pos).unwrap().contract_only);
    }

    #[test]
    fn test_incompatible_decorators() {
        let pos = SourcePos::default();
        assert_eq!(code(classify(&decorators(&["Pure", "Predicate"]), &pos)), "decorators.incompatible");
        assert_eq!(code(classify(&decorators(&["property", "Pure"]), &pos)), "decorators.incompatible");
        assert_eq!(
            code(classify(&decorators(&["IOOperation", "staticmethod"]), &pos)),
            "decorators.incompatible"
        );
    }

    #[test]
    fn test_setter() {
        let pos = SourcePos::default();
        let setter = Expr::new(
            ExprKind::Attribute {
                value: Box::new(Expr::name("size")),
                attr: "setter".to_string(),
            },
            0,
            0,
        );
        let classification = classify(&[setter], &pos).unwrap();
        assert_eq!(classification.setter_of.as_deref(), Some("size"));
        assert_eq!(classification.kind, MethodKind::Normal);
    }

    #[test]
    fn test_magic_names() {
        assert!(is_magic("__init__"));
        assert!(!is_magic("__"));
        assert!(!is_magic("_private"));
    }
}

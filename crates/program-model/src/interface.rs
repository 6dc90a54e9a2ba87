// Copyright (c) Asymptotic Labs
// SPDX-License-Identifier: Apache-2.0

//! Declarations of classes implemented natively by the verifier backend.
//!
//! Members declared here are given fixed IR names (`Class_member`) and their
//! bodies are never translated. Member argument lists include the receiver.

use crate::type_expr::TypeExpr;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

const BUILTINS: &str = include_str!("../resources/builtins.json");

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct InterfaceMember {
    #[serde(default)]
    pub args: Vec<TypeExpr>,
    #[serde(default, rename = "type")]
    pub typ: Option<TypeExpr>,
    /// IR names the backend implementation of this member depends on
    #[serde(default)]
    pub requires: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct InterfaceClass {
    #[serde(default)]
    pub extends: Option<String>,
    /// Number of type parameters, referred to as `T0`, `T1`, ... in member types
    #[serde(default)]
    pub type_vars: usize,
    #[serde(default)]
    pub methods: IndexMap<String, InterfaceMember>,
    #[serde(default)]
    pub functions: IndexMap<String, InterfaceMember>,
    #[serde(default)]
    pub predicates: IndexMap<String, InterfaceMember>,
    #[serde(default)]
    pub fields: IndexMap<String, TypeExpr>,
}

impl InterfaceClass {
    pub fn type_var_name(index: usize) -> String {
        format!("T{}", index)
    }
}

/// Interface classes by name, in declaration order
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(transparent)]
pub struct InterfaceDecls(pub IndexMap<String, InterfaceClass>);

impl InterfaceDecls {
    /// The built-in classes every program can use
    pub fn builtins() -> serde_json::Result<Self> {
        serde_json::from_str(BUILTINS)
    }

    pub fn from_json(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }

    /// Add the classes of `other`; members of a class declared in both are merged,
    /// with `other` winning on conflicts
    pub fn merge(&mut self, other: InterfaceDecls) {
        for (name, class) in other.0 {
            match self.0.get_mut(&name) {
                None => {
                    self.0.insert(name, class);
                }
                Some(existing) => {
                    if class.extends.is_some() {
                        existing.extends = class.extends;
                    }
                    existing.type_vars = existing.type_vars.max(class.type_vars);
                    existing.methods.extend(class.methods);
                    existing.functions.extend(class.functions);
                    existing.predicates.extend(class.predicates);
                    existing.fields.extend(class.fields);
                }
            }
        }
    }

    /// Classes ordered so that every superclass precedes its subclasses
    pub fn in_hierarchy_order(&self) -> Vec<(&String, &InterfaceClass)> {
        let mut ordered: Vec<(&String, &InterfaceClass)> = vec![];
        let mut pending: Vec<(&String, &InterfaceClass)> = self.0.iter().collect();
        while !pending.is_empty() {
            let before = pending.len();
            pending.retain(|(name, class)| {
                let ready = match &class.extends {
                    None => true,
                    Some(sup) => {
                        !self.0.contains_key(sup) || ordered.iter().any(|(n, _)| *n == sup)
                    }
                };
                if ready {
                    ordered.push((name, class));
                }
                !ready
            });
            if pending.len() == before {
                // cyclic `extends`; keep declaration order and let the analyzer report it
                ordered.append(&mut pending);
            }
        }
        ordered
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtins_load() {
        let builtins = InterfaceDecls::builtins().unwrap();
        for name in ["object", "int", "bool", "list", "Exception", "ValueError"] {
            assert!(builtins.0.contains_key(name), "missing {}", name);
        }
        let list = &builtins.0["list"];
        assert_eq!(list.type_vars, 1);
        assert_eq!(list.functions["__getitem__"].typ.as_ref().unwrap().name, "T0");
    }

    #[test]
    fn test_merge_and_order() {
        let mut decls = InterfaceDecls::from_json(r#"{ "B": { "extends": "A" } }"#).unwrap();
        decls.merge(
            InterfaceDecls::from_json(
                r#"{
                    "A": { "functions": { "size": { "args": ["A"], "type": "int" } } },
                    "B": { "methods": { "run": { "args": ["B"], "requires": ["helper"] } } }
                }"#,
            )
            .unwrap(),
        );
        let order: Vec<_> = decls.in_hierarchy_order().into_iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(order, vec!["A", "B"]);
        assert_eq!(decls.0["B"].extends.as_deref(), Some("A"));
        assert_eq!(decls.0["B"].methods["run"].requires, vec!["helper"]);
    }
}

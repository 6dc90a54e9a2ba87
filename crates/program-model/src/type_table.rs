// Copyright (c) Asymptotic Labs
// SPDX-License-Identifier: Apache-2.0

//! Adapter over the externally computed type annotations.
//!
//! Scopes are addressed by their dotted path (`module.Class.method`). A lookup
//! starts in the innermost scope and walks outwards, the same way name
//! resolution does in the source language.

use crate::type_expr::TypeExpr;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Narrowed type of a name at one source location (e.g. after `isinstance`)
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct AltType {
    pub line: usize,
    pub col: usize,
    #[serde(rename = "type")]
    pub typ: TypeExpr,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct TypeEntry {
    #[serde(rename = "type")]
    pub typ: TypeExpr,
    #[serde(default)]
    pub alts: Vec<AltType>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct TypeTable {
    #[serde(default)]
    scopes: BTreeMap<String, BTreeMap<String, TypeEntry>>,
    #[serde(default)]
    returns: BTreeMap<String, TypeExpr>,
}

/// Declared type plus alternate types keyed by `(line, col)`
pub type TypeLookup = (TypeExpr, BTreeMap<(usize, usize), TypeExpr>);

impl TypeTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, scope_path: &[String], name: &str, typ: TypeExpr) {
        self.scopes
            .entry(scope_path.join("."))
            .or_default()
            .insert(name.to_string(), TypeEntry { typ, alts: vec![] });
    }

    pub fn insert_return(&mut self, scope_path: &[String], typ: TypeExpr) {
        self.returns.insert(scope_path.join("."), typ);
    }

    /// Type of `name` as seen from `scope_path`
    pub fn get_type(&self, scope_path: &[String], name: &str) -> Option<TypeLookup> {
        (1..=scope_path.len()).rev().find_map(|len| {
            let entry = self.scopes.get(&scope_path[..len].join("."))?.get(name)?;
            let alts = entry
                .alts
                .iter()
                .map(|alt| ((alt.line, alt.col), alt.typ.clone()))
                .collect();
            Some((entry.typ.clone(), alts))
        })
    }

    /// Declared return type of the function at `scope_path`
    pub fn get_func_type(&self, scope_path: &[String]) -> Option<TypeExpr> {
        self.returns.get(&scope_path.join(".")).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path(parts: &[&str]) -> Vec<String> {
        parts.iter().map(|p| p.to_string()).collect()
    }

    #[test]
    fn test_lookup_walks_outwards() {
        let table: TypeTable = serde_json::from_str(
            r#"{
                "scopes": {
                    "m": { "g": { "type": "int" } },
                    "m.C.f": { "x": { "type": "Optional[C]", "alts": [{ "line": 7, "col": 4, "type": "C" }] } }
                },
                "returns": { "m.C.f": "bool" }
            }"#,
        )
        .unwrap();
        let (typ, alts) = table.get_type(&path(&["m", "C", "f"]), "x").unwrap();
        assert_eq!(typ.to_string(), "Optional[C]");
        assert_eq!(alts[&(7, 4)].to_string(), "C");
        let (global, _) = table.get_type(&path(&["m", "C", "f"]), "g").unwrap();
        assert_eq!(global.to_string(), "int");
        assert!(table.get_type(&path(&["m"]), "x").is_none());
        assert_eq!(
            table.get_func_type(&path(&["m", "C", "f"])).map(|t| t.to_string()),
            Some("bool".to_string())
        );
    }
}

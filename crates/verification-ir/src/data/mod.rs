// Copyright (c) Asymptotic Labs
// SPDX-License-Identifier: Apache-2.0

use std::collections::BTreeSet;
use indexmap::IndexMap;

pub mod declarations;
pub mod expressions;
pub mod position;
pub mod statements;
pub mod types;

use declarations::{Declaration, Domain, Field, Function, Method, Predicate};

/// Trait for declarations that reference other declarations by name
pub trait Dependable {
    /// Name under which the declaration is emitted
    fn name(&self) -> &str;

    /// Names of all other declarations this one mentions
    fn dependencies(&self) -> BTreeSet<String>;
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum IrError {
    #[error("duplicate declaration `{0}`")]
    DuplicateDeclaration(String),
}

// ============================================================================
// Complete Program IR
// ============================================================================

/// Complete verification program.
/// Every declaration kind lives in its own map, kept in insertion order; identifiers
/// are unique across all maps.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Program {
    pub domains: IndexMap<String, Domain>,
    pub fields: IndexMap<String, Field>,
    pub functions: IndexMap<String, Function>,
    pub predicates: IndexMap<String, Predicate>,
    pub methods: IndexMap<String, Method>,
}

impl Program {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether any declaration of any kind is already called `name`
    pub fn contains(&self, name: &str) -> bool {
        self.domains.contains_key(name)
            || self.fields.contains_key(name)
            || self.functions.contains_key(name)
            || self.predicates.contains_key(name)
            || self.methods.contains_key(name)
    }

    /// Add a declaration, rejecting identifiers already in use
    pub fn add(&mut self, decl: Declaration) -> Result<(), IrError> {
        if self.contains(decl.name()) {
            return Err(IrError::DuplicateDeclaration(decl.name().to_string()));
        }
        match decl {
            Declaration::Domain(d) => {
                self.domains.insert(d.name.clone(), d);
            }
            Declaration::Field(f) => {
                self.fields.insert(f.name.clone(), f);
            }
            Declaration::Function(f) => {
                self.functions.insert(f.name.clone(), f);
            }
            Declaration::Predicate(p) => {
                self.predicates.insert(p.name.clone(), p);
            }
            Declaration::Method(m) => {
                self.methods.insert(m.name.clone(), m);
            }
        }
        Ok(())
    }

    /// Iterate over every declaration as a `Dependable`
    pub fn declarations(&self) -> impl Iterator<Item = &dyn Dependable> {
        self.domains
            .values()
            .map(|d| d as &dyn Dependable)
            .chain(self.fields.values().map(|d| d as &dyn Dependable))
            .chain(self.functions.values().map(|d| d as &dyn Dependable))
            .chain(self.predicates.values().map(|d| d as &dyn Dependable))
            .chain(self.methods.values().map(|d| d as &dyn Dependable))
    }

    /// All declared identifiers
    pub fn names(&self) -> Vec<String> {
        self.declarations().map(|d| d.name().to_string()).collect()
    }

    /// Keep only the declarations whose names satisfy `keep`
    pub fn retain(&mut self, keep: impl Fn(&str) -> bool) {
        self.domains.retain(|name, _| keep(name));
        self.fields.retain(|name, _| keep(name));
        self.functions.retain(|name, _| keep(name));
        self.predicates.retain(|name, _| keep(name));
        self.methods.retain(|name, _| keep(name));
    }

    pub fn len(&self) -> usize {
        self.domains.len()
            + self.fields.len()
            + self.functions.len()
            + self.predicates.len()
            + self.methods.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::types::Type;

    #[test]
    fn test_duplicate_names_rejected_across_kinds() {
        let mut program = Program::new();
        program
            .add(Declaration::Field(Field {
                name: "x".to_string(),
                typ: Type::Int,
            }))
            .unwrap();
        let err = program
            .add(Declaration::Predicate(Predicate {
                name: "x".to_string(),
                params: vec![],
                body: None,
                pos: Default::default(),
            }))
            .unwrap_err();
        assert_eq!(err, IrError::DuplicateDeclaration("x".to_string()));
        assert_eq!(program.len(), 1);
    }
}

// Copyright (c) Asymptotic Labs
// SPDX-License-Identifier: Apache-2.0

use crate::error::SourcePos;
use crate::model::{ClassId, FieldId, MethodId, ModuleId, PyType, VarId};
use indexmap::IndexMap;

#[derive(Debug, Clone, Default)]
pub struct Class {
    pub name: String,
    /// IR name of the class (its type constructor in the type domain)
    pub sil_name: String,
    pub module: ModuleId,
    /// Single superclass; `None` only for `object`
    pub superclass: Option<ClassId>,
    /// Type arguments of the superclass, expressed over this class's type variables
    pub superclass_args: Vec<PyType>,
    pub methods: IndexMap<String, MethodId>,
    pub functions: IndexMap<String, MethodId>,
    pub static_methods: IndexMap<String, MethodId>,
    pub predicates: IndexMap<String, MethodId>,
    pub fields: IndexMap<String, FieldId>,
    pub static_fields: IndexMap<String, VarId>,
    /// Type parameters in declaration order
    pub type_vars: IndexMap<String, PyType>,
    /// Implemented by the backend; bodies are never translated
    pub interface: bool,
    /// Set once the class statement has been seen (guards redefinition)
    pub defined: bool,
    pub pos: SourcePos,
}

impl Class {
    /// Any callable member declared directly in this class
    pub fn own_member(&self, name: &str) -> Option<MethodId> {
        self.methods
            .get(name)
            .or_else(|| self.functions.get(name))
            .or_else(|| self.static_methods.get(name))
            .or_else(|| self.predicates.get(name))
            .copied()
    }

    /// All callable members declared directly in this class, in declaration order
    pub fn all_members(&self) -> impl Iterator<Item = MethodId> + '_ {
        self.methods
            .values()
            .chain(self.functions.values())
            .chain(self.static_methods.values())
            .chain(self.predicates.values())
            .copied()
    }

    pub fn is_generic(&self) -> bool {
        !self.type_vars.is_empty()
    }
}

// Copyright (c) Asymptotic Labs
// SPDX-License-Identifier: Apache-2.0

use crate::model::{CallSlotId, ClassId, IoOperationId, MethodId, ModuleId, PyType, VarId};
use crate::syntax::Stmt;
use indexmap::IndexMap;

/// Top-level scope of one source module
#[derive(Debug, Clone, Default)]
pub struct Module {
    /// Dotted module name
    pub name: String,
    pub path: String,
    pub classes: IndexMap<String, ClassId>,
    pub functions: IndexMap<String, MethodId>,
    pub methods: IndexMap<String, MethodId>,
    pub predicates: IndexMap<String, MethodId>,
    pub global_vars: IndexMap<String, VarId>,
    pub io_operations: IndexMap<String, IoOperationId>,
    pub call_slots: IndexMap<String, CallSlotId>,
    pub type_vars: IndexMap<String, PyType>,
    /// Modules whose top-level names are visible unqualified (`from m import *`)
    pub from_imports: Vec<ModuleId>,
    /// Individually imported names: local alias -> (module, name)
    pub imported_names: IndexMap<String, (ModuleId, String)>,
    /// Modules reachable by qualified access (`import m`, `import m as n`)
    pub namespaces: IndexMap<String, ModuleId>,
    /// Module-level statements other than definitions and imports
    pub body: Vec<Stmt>,
    /// Synthesized method holding `body`
    pub main: Option<MethodId>,
    pub source: Option<String>,
    /// Holds the built-in classes
    pub is_global: bool,
}

// Copyright (c) Asymptotic Labs
// SPDX-License-Identifier: Apache-2.0

//! Name classification shared by the analyzer and the translators.

use crate::model::{CallSlotId, ClassId, IoOperationId, MethodId, Model, ModuleId, VarId};

/// Contract pseudo-functions; calls to these never resolve to program members
pub const CONTRACT_FUNCTIONS: &[&str] = &[
    "Requires", "Ensures", "Exsures", "Invariant", "Assert", "Assume", "Fold", "Unfold",
    "Unfolding", "Result", "RaisedException", "Implies", "Old", "Acc", "Rd", "Forall",
    "Exists", "Previous", "list_pred", "Terminates", "TerminationMeasure",
];

/// Contracts that are only valid as leading statements of a body
pub const CONTRACT_STATEMENTS: &[&str] = &["Requires", "Ensures", "Exsures", "Invariant"];

/// Built-in functions with dedicated translations
pub const BUILTIN_FUNCTIONS: &[&str] = &[
    "isinstance", "len", "super", "cast", "range", "print", "bool", "int", "str", "type",
    "list", "set", "dict", "tuple", "TypeVar", "Generic",
];

/// Modules whose imports only bring contract or typing names into scope
pub const LIBRARY_MODULES: &[&str] = &[
    "typing",
    "contracts",
    "nagini_contracts.contracts",
    "nagini_contracts.obligations",
    "nagini_contracts.io_contracts",
];

/// What an unqualified name refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Binding {
    Var(VarId),
    Function(MethodId),
    Class(ClassId),
    Module(ModuleId),
    IoOperation(IoOperationId),
    CallSlot(CallSlotId),
    Contract,
    Builtin,
}

/// Resolve `name` as seen from `method` (if any) inside `module`: locals and
/// arguments first, then module-level names, then built-ins.
pub fn resolve_name(model: &Model, module: ModuleId, method: Option<MethodId>, name: &str) -> Option<Binding> {
    if let Some(method) = method {
        let m = model.method(method);
        let local = m
            .args
            .get(name)
            .or_else(|| m.locals.get(name))
            .copied()
            .or_else(|| {
                [m.var_arg, m.kw_arg]
                    .into_iter()
                    .flatten()
                    .find(|v| model.var(*v).name == name)
            });
        if let Some(var) = local {
            return Some(Binding::Var(var));
        }
    }
    if let Some(var) = model.lookup_global_var(module, name) {
        return Some(Binding::Var(var));
    }
    if let Some(func) = model.lookup_function(module, name) {
        return Some(Binding::Function(func));
    }
    if let Some(cls) = model.lookup_class(module, name) {
        return Some(Binding::Class(cls));
    }
    if let Some(op) = model.lookup_io_operation(module, name) {
        return Some(Binding::IoOperation(op));
    }
    if let Some(slot) = model.lookup_call_slot(module, name) {
        return Some(Binding::CallSlot(slot));
    }
    if model.module(module).namespaces.contains_key(name) {
        return model.lookup_module(module, name).map(Binding::Module);
    }
    if CONTRACT_FUNCTIONS.contains(&name) {
        return Some(Binding::Contract);
    }
    if BUILTIN_FUNCTIONS.contains(&name) {
        return Some(Binding::Builtin);
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SourcePos;
    use crate::model::{Method, MethodKind, Module, PyType, ScopeRef, VarKind};

    #[test]
    fn test_locals_shadow_globals() {
        let mut model = Model::new();
        let module = model.add_module(Module {
            name: "m".to_string(),
            ..Default::default()
        });
        let global = model.add_var("x", PyType::Class(ClassId(0)), VarKind::Global, ScopeRef::Module(module));
        model.module_mut(module).global_vars.insert("x".to_string(), global);
        let method = model.add_method(Method::new("f", module, None, MethodKind::Normal, SourcePos::default()));
        let local = model.add_var("x", PyType::Class(ClassId(0)), VarKind::Local, ScopeRef::Method(method));
        model.method_mut(method).locals.insert("x".to_string(), local);

        assert_eq!(resolve_name(&model, module, Some(method), "x"), Some(Binding::Var(local)));
        assert_eq!(resolve_name(&model, module, None, "x"), Some(Binding::Var(global)));
        assert_eq!(resolve_name(&model, module, None, "Requires"), Some(Binding::Contract));
        assert_eq!(resolve_name(&model, module, None, "len"), Some(Binding::Builtin));
        assert_eq!(resolve_name(&model, module, None, "undefined"), None);
    }
}

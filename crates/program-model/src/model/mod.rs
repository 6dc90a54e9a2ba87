// Copyright (c) Asymptotic Labs
// SPDX-License-Identifier: Apache-2.0

//! Semantic model of a compilation unit.
//!
//! All nodes live in one arena owned by [`Model`] and refer to each other through
//! typed indices, so the cross-referenced graph (class <-> method <-> variable)
//! needs no shared ownership. Nodes are created by the analyzer, completed by
//! the `process` pass, and never removed.

mod class;
mod io;
mod method;
mod module;
mod types;
mod try_block;
mod var;

pub use class::Class;
pub use io::{CallSlot, IOOperation};
pub use method::{Method, MethodKind, MethodType};
pub use module::Module;
pub use try_block::{ExceptionHandler, TryBlock, WithContext};
pub use types::PyType;
pub use var::{Field, Var, VarKind};

use crate::registry::IdentifierRegistry;
use std::collections::BTreeSet;

macro_rules! id_type {
    ($($name:ident),*) => {
        $(
            #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
            pub struct $name(pub usize);
        )*
    };
}

id_type!(ModuleId, ClassId, MethodId, VarId, FieldId, TryBlockId, IoOperationId, CallSlotId);

/// A namespace with a (nullable) superscope
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScopeRef {
    Module(ModuleId),
    Class(ClassId),
    Method(MethodId),
    IoOperation(IoOperationId),
    CallSlot(CallSlotId),
}

impl Default for ScopeRef {
    fn default() -> Self {
        ScopeRef::Module(ModuleId(0))
    }
}

#[derive(Debug, Clone, Default)]
pub struct Model {
    pub modules: Vec<Module>,
    pub classes: Vec<Class>,
    pub methods: Vec<Method>,
    pub vars: Vec<Var>,
    pub fields: Vec<Field>,
    pub try_blocks: Vec<TryBlock>,
    pub io_operations: Vec<IOOperation>,
    pub call_slots: Vec<CallSlot>,
    /// Modules in analysis (import) order, global module first
    pub module_order: Vec<ModuleId>,
    /// Modules given directly by the caller, as opposed to pulled in by imports
    pub main_modules: Vec<ModuleId>,
    pub registry: IdentifierRegistry,
}

impl Model {
    pub fn new() -> Self {
        Self::default()
    }

    // ------------------------------------------------------------------------
    // Arena access
    // ------------------------------------------------------------------------

    pub fn module(&self, id: ModuleId) -> &Module {
        &self.modules[id.0]
    }

    pub fn module_mut(&mut self, id: ModuleId) -> &mut Module {
        &mut self.modules[id.0]
    }

    pub fn class(&self, id: ClassId) -> &Class {
        &self.classes[id.0]
    }

    pub fn class_mut(&mut self, id: ClassId) -> &mut Class {
        &mut self.classes[id.0]
    }

    pub fn method(&self, id: MethodId) -> &Method {
        &self.methods[id.0]
    }

    pub fn method_mut(&mut self, id: MethodId) -> &mut Method {
        &mut self.methods[id.0]
    }

    pub fn var(&self, id: VarId) -> &Var {
        &self.vars[id.0]
    }

    pub fn var_mut(&mut self, id: VarId) -> &mut Var {
        &mut self.vars[id.0]
    }

    pub fn field(&self, id: FieldId) -> &Field {
        &self.fields[id.0]
    }

    pub fn field_mut(&mut self, id: FieldId) -> &mut Field {
        &mut self.fields[id.0]
    }

    pub fn try_block(&self, id: TryBlockId) -> &TryBlock {
        &self.try_blocks[id.0]
    }

    pub fn try_block_mut(&mut self, id: TryBlockId) -> &mut TryBlock {
        &mut self.try_blocks[id.0]
    }

    pub fn io_operation(&self, id: IoOperationId) -> &IOOperation {
        &self.io_operations[id.0]
    }

    pub fn call_slot(&self, id: CallSlotId) -> &CallSlot {
        &self.call_slots[id.0]
    }

    pub fn io_operation_mut(&mut self, id: IoOperationId) -> &mut IOOperation {
        &mut self.io_operations[id.0]
    }

    pub fn call_slot_mut(&mut self, id: CallSlotId) -> &mut CallSlot {
        &mut self.call_slots[id.0]
    }

    pub fn add_module(&mut self, module: Module) -> ModuleId {
        self.modules.push(module);
        ModuleId(self.modules.len() - 1)
    }

    pub fn add_class(&mut self, class: Class) -> ClassId {
        self.classes.push(class);
        ClassId(self.classes.len() - 1)
    }

    pub fn add_method(&mut self, method: Method) -> MethodId {
        self.methods.push(method);
        MethodId(self.methods.len() - 1)
    }

    pub fn add_field(&mut self, field: Field) -> FieldId {
        self.fields.push(field);
        FieldId(self.fields.len() - 1)
    }

    pub fn add_try_block(&mut self, block: TryBlock) -> TryBlockId {
        self.try_blocks.push(block);
        TryBlockId(self.try_blocks.len() - 1)
    }

    pub fn add_io_operation(&mut self, op: IOOperation) -> IoOperationId {
        self.io_operations.push(op);
        IoOperationId(self.io_operations.len() - 1)
    }

    pub fn add_call_slot(&mut self, slot: CallSlot) -> CallSlotId {
        self.call_slots.push(slot);
        CallSlotId(self.call_slots.len() - 1)
    }

    /// Create a variable; its numeric identity is its arena index
    pub fn add_var(&mut self, name: &str, typ: PyType, kind: VarKind, owner: ScopeRef) -> VarId {
        let id = self.vars.len();
        self.vars.push(Var {
            name: name.to_string(),
            sil_name: String::new(),
            typ,
            kind,
            owner,
            id,
            alt_types: Default::default(),
            reads: vec![],
            writes: vec![],
            value: None,
        });
        VarId(id)
    }

    pub fn freshen(&mut self, name: &str) -> String {
        self.registry.freshen(name)
    }

    // ------------------------------------------------------------------------
    // Scopes and name resolution
    // ------------------------------------------------------------------------

    pub fn global_module(&self) -> ModuleId {
        self.modules
            .iter()
            .position(|m| m.is_global)
            .map(ModuleId)
            .unwrap_or_default()
    }

    /// Built-in class by name
    pub fn builtin(&self, name: &str) -> Option<ClassId> {
        self.module(self.global_module()).classes.get(name).copied()
    }

    pub fn superscope(&self, scope: ScopeRef) -> Option<ScopeRef> {
        match scope {
            ScopeRef::Module(_) => None,
            ScopeRef::Class(cls) => Some(ScopeRef::Module(self.class(cls).module)),
            ScopeRef::Method(method) => {
                let method = self.method(method);
                Some(match method.cls {
                    Some(cls) => ScopeRef::Class(cls),
                    None => ScopeRef::Module(method.module),
                })
            }
            ScopeRef::IoOperation(op) => Some(ScopeRef::Module(self.io_operation(op).module)),
            ScopeRef::CallSlot(slot) => Some(ScopeRef::Module(self.call_slot(slot).module)),
        }
    }

    pub fn module_of(&self, scope: ScopeRef) -> ModuleId {
        let mut current = scope;
        loop {
            match current {
                ScopeRef::Module(m) => return m,
                other => match self.superscope(other) {
                    Some(parent) => current = parent,
                    None => return self.global_module(),
                },
            }
        }
    }

    /// Dotted path segments used to address the type table
    pub fn scope_path(&self, scope: ScopeRef) -> Vec<String> {
        let own = match scope {
            ScopeRef::Module(m) => self.module(m).name.clone(),
            ScopeRef::Class(c) => self.class(c).name.clone(),
            ScopeRef::Method(m) => self.method(m).name.clone(),
            ScopeRef::IoOperation(op) => self.io_operation(op).name.clone(),
            ScopeRef::CallSlot(slot) => self.call_slot(slot).name.clone(),
        };
        let mut path = self
            .superscope(scope)
            .map(|parent| self.scope_path(parent))
            .unwrap_or_default();
        path.push(own);
        path
    }

    /// Modules whose names are visible unqualified from `module`, nearest first
    fn visible_modules(&self, module: ModuleId) -> Vec<ModuleId> {
        let mut seen = BTreeSet::new();
        let mut order = vec![];
        let mut stack = vec![module];
        while let Some(current) = stack.pop() {
            if !seen.insert(current) {
                continue;
            }
            order.push(current);
            stack.extend(self.module(current).from_imports.iter().rev());
        }
        let global = self.global_module();
        if seen.insert(global) {
            order.push(global);
        }
        order
    }

    fn lookup<T: Copy>(
        &self,
        module: ModuleId,
        name: &str,
        get: impl Fn(&Module, &str) -> Option<T>,
    ) -> Option<T> {
        if let Some((prefix, last)) = name.rsplit_once('.') {
            let target = self.lookup_module(module, prefix)?;
            return get(self.module(target), last);
        }
        for candidate in self.visible_modules(module) {
            let m = self.module(candidate);
            if let Some(found) = get(m, name) {
                return Some(found);
            }
            if let Some((source, original)) = m.imported_names.get(name) {
                if let Some(found) = get(self.module(*source), original) {
                    return Some(found);
                }
            }
        }
        None
    }

    pub fn lookup_module(&self, module: ModuleId, name: &str) -> Option<ModuleId> {
        if let Some(found) = self.module(module).namespaces.get(name) {
            return Some(*found);
        }
        self.modules
            .iter()
            .position(|m| m.name == name)
            .map(ModuleId)
    }

    pub fn lookup_class(&self, module: ModuleId, name: &str) -> Option<ClassId> {
        self.lookup(module, name, |m, n| m.classes.get(n).copied())
    }

    /// Module-level function, procedure or predicate
    pub fn lookup_function(&self, module: ModuleId, name: &str) -> Option<MethodId> {
        self.lookup(module, name, |m, n| {
            m.functions
                .get(n)
                .or_else(|| m.methods.get(n))
                .or_else(|| m.predicates.get(n))
                .copied()
        })
    }

    pub fn lookup_global_var(&self, module: ModuleId, name: &str) -> Option<VarId> {
        self.lookup(module, name, |m, n| m.global_vars.get(n).copied())
    }

    pub fn lookup_io_operation(&self, module: ModuleId, name: &str) -> Option<IoOperationId> {
        self.lookup(module, name, |m, n| m.io_operations.get(n).copied())
    }

    pub fn lookup_call_slot(&self, module: ModuleId, name: &str) -> Option<CallSlotId> {
        self.lookup(module, name, |m, n| m.call_slots.get(n).copied())
    }

    // ------------------------------------------------------------------------
    // Class hierarchy
    // ------------------------------------------------------------------------

    /// `cls` followed by all its superclasses up to `object`
    pub fn superclass_chain(&self, cls: ClassId) -> Vec<ClassId> {
        let mut chain = vec![cls];
        let mut current = self.class(cls).superclass;
        while let Some(sup) = current {
            if chain.contains(&sup) {
                break;
            }
            chain.push(sup);
            current = self.class(sup).superclass;
        }
        chain
    }

    /// Reflexive, transitive subclass relation
    pub fn issubtype(&self, sub: ClassId, sup: ClassId) -> bool {
        self.superclass_chain(sub).contains(&sup)
    }

    /// Nearest class that all of `classes` inherit from
    pub fn common_superclass(&self, classes: &[ClassId]) -> ClassId {
        let Some((first, rest)) = classes.split_first() else {
            return self.builtin("object").unwrap_or_default();
        };
        self.superclass_chain(*first)
            .into_iter()
            .find(|candidate| rest.iter().all(|c| self.issubtype(*c, *candidate)))
            .unwrap_or_else(|| self.builtin("object").unwrap_or_default())
    }

    pub fn direct_subclasses(&self, cls: ClassId) -> Vec<ClassId> {
        (0..self.classes.len())
            .map(ClassId)
            .filter(|c| self.class(*c).superclass == Some(cls))
            .collect()
    }

    /// Every class below `cls`, deepest first
    pub fn all_subclasses(&self, cls: ClassId) -> Vec<ClassId> {
        let mut result = vec![];
        for sub in self.direct_subclasses(cls) {
            result.extend(self.all_subclasses(sub));
            result.push(sub);
        }
        result
    }

    /// Nearest member called `name` in the superclass chain
    pub fn get_member(&self, cls: ClassId, name: &str) -> Option<MethodId> {
        self.superclass_chain(cls)
            .into_iter()
            .find_map(|c| self.class(c).own_member(name))
    }

    pub fn get_field(&self, cls: ClassId, name: &str) -> Option<FieldId> {
        self.superclass_chain(cls)
            .into_iter()
            .find_map(|c| self.class(c).fields.get(name).copied())
    }

    pub fn get_static_field(&self, cls: ClassId, name: &str) -> Option<VarId> {
        self.superclass_chain(cls)
            .into_iter()
            .find_map(|c| self.class(c).static_fields.get(name).copied())
    }

    /// The field that is materialized for `field`
    pub fn root_field(&self, field: FieldId) -> FieldId {
        let mut current = field;
        while let Some(parent) = self.field(current).inherited {
            if parent == current {
                break;
            }
            current = parent;
        }
        current
    }

    /// Materialized fields an instance of `cls` owns
    pub fn instance_fields(&self, cls: ClassId) -> Vec<FieldId> {
        let mut fields = vec![];
        for c in self.superclass_chain(cls).into_iter().rev() {
            for field in self.class(c).fields.values() {
                let root = self.root_field(*field);
                if !fields.contains(&root) {
                    fields.push(root);
                }
            }
        }
        fields
    }

    /// The type of `self` inside `cls`
    pub fn class_type(&self, cls: ClassId) -> PyType {
        let class = self.class(cls);
        if class.is_generic() {
            PyType::generic(cls, class.type_vars.values().cloned().collect())
        } else {
            PyType::Class(cls)
        }
    }

    pub fn is_builtin(&self, cls: ClassId, name: &str) -> bool {
        self.builtin(name) == Some(cls)
    }

    /// Whether values of this type are represented as IR integers
    pub fn is_int(&self, typ: &PyType) -> bool {
        matches!(typ, PyType::Class(c) if self.is_builtin(*c, "int"))
    }

    /// Whether values of this type are represented as IR booleans
    pub fn is_bool(&self, typ: &PyType) -> bool {
        matches!(typ, PyType::Class(c) if self.is_builtin(*c, "bool"))
    }

    pub fn is_none(&self, typ: &PyType) -> bool {
        matches!(typ, PyType::Class(c) if self.is_builtin(*c, "NoneType"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn class(model: &mut Model, name: &str, sup: Option<ClassId>) -> ClassId {
        let id = model.add_class(Class {
            name: name.to_string(),
            superclass: sup,
            ..Default::default()
        });
        model.module_mut(ModuleId(0)).classes.insert(name.to_string(), id);
        id
    }

    fn hierarchy() -> (Model, [ClassId; 4]) {
        let mut model = Model::new();
        model.add_module(Module {
            name: "builtins".to_string(),
            is_global: true,
            ..Default::default()
        });
        let object = class(&mut model, "object", None);
        let animal = class(&mut model, "Animal", Some(object));
        let dog = class(&mut model, "Dog", Some(animal));
        let cat = class(&mut model, "Cat", Some(animal));
        (model, [object, animal, dog, cat])
    }

    #[test]
    fn test_issubtype_walks_chain() {
        let (model, [object, animal, dog, cat]) = hierarchy();
        assert!(model.issubtype(dog, animal));
        assert!(model.issubtype(dog, object));
        assert!(model.issubtype(dog, dog));
        assert!(!model.issubtype(dog, cat));
        assert!(!model.issubtype(animal, dog));
    }

    #[test]
    fn test_common_superclass() {
        let (model, [object, animal, dog, cat]) = hierarchy();
        assert_eq!(model.common_superclass(&[dog, cat]), animal);
        assert_eq!(model.common_superclass(&[dog, object]), object);
        assert_eq!(model.common_superclass(&[dog]), dog);
        assert_eq!(model.common_superclass(&[]), object);
    }

    #[test]
    fn test_subclasses_deepest_first() {
        let (model, [object, animal, dog, cat]) = hierarchy();
        assert_eq!(model.direct_subclasses(animal), vec![dog, cat]);
        assert_eq!(model.all_subclasses(object), vec![dog, cat, animal]);
    }

    #[test]
    fn test_union_class_is_common_superclass() {
        let (model, [_, animal, dog, cat]) = hierarchy();
        let union = PyType::Union(vec![PyType::Class(dog), PyType::Class(cat)]);
        assert_eq!(union.cls(&model), animal);
        let optional = PyType::Optional(Box::new(PyType::Class(dog)));
        assert_eq!(optional.cls(&model), dog);
    }
}

// Copyright (c) Asymptotic Labs
// SPDX-License-Identifier: Apache-2.0

//! Builds the complete IR program from an analyzed model
//!
//! Pass 1 emits fields, global and static field accessors and the default
//! argument values every body may refer to. Pass 2 translates every member,
//! IO operation and call slot module by module in import order, followed by
//! the override and inherit checks. The prelude and the type domain come last
//! since translation decides which tuple arities and union sizes they need.

use crate::context::{self, is_mutable_global, Defaults, MethodContext};
use crate::pipeline::TranslationOptions;
use crate::prelude;
use crate::translation::io_translator::{translate_call_slot, translate_io_operation};
use crate::translation::method_translator::{
    checks_override, default_values, global_function, inherit_check, needs_inherit_check, override_check,
    static_field_function, translate_function, translate_main, translate_method, translate_predicate,
};
use crate::type_domain::{TypeDomainFactory, TYPE_DOMAIN};
use log::{debug, info, warn};
use program_model::{
    ClassId, IdentifierRegistry, MethodId, MethodKind, Model, ModuleId, Result, TranslationError, VarKind,
};
use std::collections::{BTreeMap, BTreeSet};
use verification_ir::{self as ir, slice_program, Declaration};

/// Source members a caller asked to verify
#[derive(Debug, Default)]
struct Selection {
    members: BTreeSet<MethodId>,
    classes: BTreeSet<ClassId>,
    main: bool,
    active: bool,
}

impl Selection {
    fn resolve(model: &Model, names: &[String]) -> Self {
        let mut selection = Selection {
            active: !names.is_empty(),
            ..Default::default()
        };
        for name in names {
            if name == "main" {
                selection.main = true;
                continue;
            }
            let found = model.main_modules.iter().any(|module| {
                let module = *module;
                match name.rsplit_once('.') {
                    Some((cls, member)) => {
                        let Some(c) = model.lookup_class(module, cls) else {
                            return false;
                        };
                        let Some(m) = model.class(c).own_member(member) else {
                            return false;
                        };
                        selection.members.insert(m);
                        true
                    }
                    None => {
                        if let Some(c) = model.lookup_class(module, name) {
                            selection.classes.insert(c);
                            true
                        } else if let Some(m) = model.lookup_function(module, name) {
                            selection.members.insert(m);
                            true
                        } else {
                            false
                        }
                    }
                }
            });
            if !found {
                warn!("selected name `{}` does not exist; ignoring it", name);
            }
        }
        selection
    }

    fn contains(&self, model: &Model, member: MethodId) -> bool {
        if !self.active || self.members.contains(&member) {
            return true;
        }
        let m = model.method(member);
        let owner = m.cls.or_else(|| {
            // a setter belongs to the class of its property
            model.methods.iter().find(|g| g.setter == Some(member)).and_then(|g| g.cls)
        });
        owner.is_some_and(|c| self.classes.contains(&c))
    }
}

pub struct ProgramBuilder<'m> {
    model: &'m Model,
    options: &'m TranslationOptions,
    types: TypeDomainFactory,
    /// Continues the analyzer's registry; every fresh name of the translation comes from it
    names: IdentifierRegistry,
    selection: Selection,
    roots: BTreeSet<String>,
    program: ir::Program,
}

impl<'m> ProgramBuilder<'m> {
    pub fn new(model: &'m Model, options: &'m TranslationOptions) -> Self {
        Self {
            model,
            options,
            types: TypeDomainFactory::new(),
            names: model.registry.clone(),
            selection: Selection::resolve(model, &options.select),
            roots: BTreeSet::new(),
            program: ir::Program::new(),
        }
    }

    pub fn build(mut self) -> Result<ir::Program> {
        let model = self.model;
        self.create_fields()?;
        let defaults = default_values(model, &mut self.types, &mut self.names)?;
        self.create_accessors(&defaults)?;

        for module in model.module_order.clone() {
            info!("translating module `{}`", model.module(module).name);
            self.translate_module(module, &defaults)?;
        }
        for module in model.module_order.clone() {
            for cls in model.module(module).classes.values().copied() {
                if model.class(cls).interface {
                    continue;
                }
                if self.options.check_overrides {
                    self.create_override_checks(cls, &defaults)?;
                }
                if self.options.check_inheritance {
                    self.create_inherit_checks(cls, &defaults)?;
                }
            }
        }

        for decl in prelude::declarations(model, &self.types) {
            self.add(decl)?;
        }
        let domain = self.types.create_domain(model);
        self.add(Declaration::Domain(domain))?;

        if self.selection.active {
            let always_keep = BTreeSet::from([TYPE_DOMAIN.to_string()]);
            let edges = self.required_edges();
            slice_program(&mut self.program, &self.roots, &edges, &always_keep);
        }
        Ok(self.program)
    }

    fn add(&mut self, decl: Declaration) -> Result<()> {
        debug!("emitting {:?} `{}`", decl.kind(), decl.name());
        self.program
            .add(decl)
            .map_err(|e| TranslationError::invalid("duplicate.declaration", e.to_string(), None))
    }

    fn add_root(&mut self, decl: Declaration) -> Result<()> {
        self.roots.insert(decl.name().to_string());
        self.add(decl)
    }

    // ========================================================================
    // Pass 1
    // ========================================================================

    /// One IR field per field identity; inherited fields reuse their root
    fn create_fields(&mut self) -> Result<()> {
        let model = self.model;
        for field in model.fields.iter().filter(|f| f.inherited.is_none()) {
            self.add(Declaration::Field(ir::Field {
                name: field.sil_name.clone(),
                typ: context::ir_type(model, &field.typ),
            }))?;
        }
        Ok(())
    }

    fn create_accessors(&mut self, defaults: &Defaults) -> Result<()> {
        let model = self.model;
        for (index, var) in model.vars.iter().enumerate() {
            let id = program_model::VarId(index);
            match var.kind {
                VarKind::Global if !is_mutable_global(model, id) => {
                    let function = global_function(model, &mut self.types, id);
                    self.add(Declaration::Function(function))?;
                }
                VarKind::StaticField => {
                    let module = model.module_of(var.owner);
                    let mut ctx = MethodContext::for_module(model, &mut self.types, defaults, &mut self.names, module);
                    let function = static_field_function(&mut ctx, id)?;
                    self.add(Declaration::Function(function))?;
                }
                _ => {}
            }
        }
        Ok(())
    }

    // ========================================================================
    // Pass 2
    // ========================================================================

    fn translate_module(&mut self, id: ModuleId, defaults: &Defaults) -> Result<()> {
        let model = self.model;
        let module = model.module(id);
        let members = module
            .functions
            .values()
            .chain(module.methods.values())
            .chain(module.predicates.values())
            .copied()
            .collect::<Vec<_>>();
        for member in members {
            self.translate_member(member, defaults)?;
        }

        for cls in module.classes.values().copied() {
            let class = model.class(cls);
            if class.interface {
                continue;
            }
            debug!("translating class `{}`", class.name);
            for member in class.all_members().collect::<Vec<_>>() {
                self.translate_member(member, defaults)?;
                if let Some(setter) = model.method(member).setter {
                    self.translate_member(setter, defaults)?;
                }
            }
        }

        for op in module.io_operations.values().copied() {
            let mut ctx = MethodContext::for_module(model, &mut self.types, defaults, &mut self.names, id);
            for decl in translate_io_operation(&mut ctx, op)? {
                self.add(decl)?;
            }
        }
        for slot in module.call_slots.values().copied() {
            let mut ctx = MethodContext::for_module(model, &mut self.types, defaults, &mut self.names, id);
            let function = translate_call_slot(&mut ctx, slot);
            self.add(Declaration::Function(function))?;
        }

        if self.options.main_method && model.main_modules.contains(&id) {
            if let Some(main) = module.main {
                let mut ctx = MethodContext::new(model, &mut self.types, defaults, &mut self.names, main);
                if let Some(method) = translate_main(&mut ctx, id)? {
                    if !self.selection.active || self.selection.main {
                        self.add_root(Declaration::Method(method))?;
                    } else {
                        self.add(Declaration::Method(method))?;
                    }
                }
            }
        }
        Ok(())
    }

    fn translate_member(&mut self, member: MethodId, defaults: &Defaults) -> Result<()> {
        let model = self.model;
        let m = model.method(member);
        if m.interface {
            return Ok(());
        }
        let selected = self.selection.contains(model, member);
        debug!("translating `{}`", m.sil_name);
        let mut ctx = MethodContext::new(model, &mut self.types, defaults, &mut self.names, member);
        let decl = match m.kind {
            MethodKind::Pure | MethodKind::Property => Declaration::Function(translate_function(&mut ctx, member)?),
            MethodKind::Predicate => Declaration::Predicate(translate_predicate(&mut ctx, member)?),
            MethodKind::IOOperation | MethodKind::CallSlot => return Ok(()),
            MethodKind::Normal | MethodKind::Static | MethodKind::ClassMethod => {
                Declaration::Method(translate_method(&mut ctx, member, selected)?)
            }
        };
        if selected {
            self.add_root(decl)
        } else {
            self.add(decl)
        }
    }

    fn create_override_checks(&mut self, cls: ClassId, defaults: &Defaults) -> Result<()> {
        let model = self.model;
        let class = model.class(cls);
        for member in class.all_members().collect::<Vec<_>>() {
            let m = model.method(member);
            let Some(overridden) = m.overrides.filter(|_| checks_override(model, member)) else {
                continue;
            };
            let name = self.names.freshen(&format!("{}_{}_override_check", class.sil_name, m.name));
            let mut ctx = MethodContext::new(model, &mut self.types, defaults, &mut self.names, overridden);
            if let Some(check) = override_check(&mut ctx, member, name)? {
                debug!("override check `{}`", check.name);
                if self.selection.contains(model, member) {
                    self.add_root(Declaration::Method(check))?;
                } else {
                    self.add(Declaration::Method(check))?;
                }
            }
        }
        Ok(())
    }

    /// Inherited (not overridden) methods verified again for `cls`
    fn create_inherit_checks(&mut self, cls: ClassId, defaults: &Defaults) -> Result<()> {
        let model = self.model;
        let class = model.class(cls);
        let mut seen = class.methods.keys().cloned().collect::<BTreeSet<_>>();
        for sup in model.superclass_chain(cls).into_iter().skip(1) {
            for (name, member) in &model.class(sup).methods {
                if !seen.insert(name.clone()) || !needs_inherit_check(model, *member) {
                    continue;
                }
                let check_name = self.names.freshen(&format!("{}_{}_inherit_check", class.sil_name, name));
                let mut ctx = MethodContext::new(model, &mut self.types, defaults, &mut self.names, *member);
                let check = inherit_check(&mut ctx, cls, *member, check_name)?;
                debug!("inherit check `{}`", check.name);
                if !self.selection.active || self.selection.classes.contains(&cls) {
                    self.add_root(Declaration::Method(check))?;
                } else {
                    self.add(Declaration::Method(check))?;
                }
            }
        }
        Ok(())
    }

    // ========================================================================
    // Slicing
    // ========================================================================

    /// Dependencies the IR does not show: interface `requires` lists
    fn required_edges(&self) -> BTreeMap<String, BTreeSet<String>> {
        let mut edges = BTreeMap::<String, BTreeSet<String>>::new();
        for m in self.model.methods.iter().filter(|m| !m.requires.is_empty()) {
            edges
                .entry(m.sil_name.clone())
                .or_default()
                .extend(m.requires.iter().cloned());
        }
        edges
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use program_model::{analyze, InterfaceDecls, SourceProgram};

    const SHAPES: &str = r#"[
        { "kind": "ClassDef", "name": "Shape", "line": 1, "body": [
            { "kind": "FunctionDef", "name": "area", "line": 2,
              "args": { "args": [{ "name": "self" }] },
              "returns": { "kind": "Name", "id": "int" },
              "body": [{ "kind": "Return", "line": 3, "value": { "kind": "Int", "value": 0 } }] }
        ] },
        { "kind": "ClassDef", "name": "Square", "line": 4, "bases": [{ "kind": "Name", "id": "Shape" }], "body": [
            { "kind": "FunctionDef", "name": "side", "line": 5,
              "args": { "args": [{ "name": "self" }] },
              "returns": { "kind": "Name", "id": "int" },
              "body": [{ "kind": "Return", "line": 6, "value": { "kind": "Int", "value": 1 } }] }
        ] },
        { "kind": "FunctionDef", "name": "unrelated", "line": 7,
          "returns": { "kind": "Name", "id": "int" },
          "body": [{ "kind": "Return", "line": 8, "value": { "kind": "Int", "value": 2 } }] }
    ]"#;

    fn model_of(body: &str) -> Model {
        let text = format!(r#"{{ "modules": [{{ "name": "main", "path": "main.py", "body": {} }}] }}"#, body);
        let program = SourceProgram::from_json(&text).unwrap();
        analyze(&program, &InterfaceDecls::builtins().unwrap()).unwrap()
    }

    fn sil_name(model: &Model, cls: &str, member: &str) -> String {
        let cls = model.lookup_class(model.main_modules[0], cls).unwrap();
        let member = model.class(cls).methods[member];
        model.method(member).sil_name.clone()
    }

    #[test]
    fn test_inherited_method_gets_inherit_check() {
        let model = model_of(SHAPES);
        let options = TranslationOptions::default();
        let program = ProgramBuilder::new(&model, &options).build().unwrap();
        assert!(program.methods.keys().any(|name| name.starts_with("Square_area_inherit_check")));
        assert!(!program.methods.keys().any(|name| name.starts_with("Shape_area_inherit_check")));
    }

    #[test]
    fn test_selection_keeps_dependency_closure() {
        let model = model_of(SHAPES);
        let options = TranslationOptions {
            select: vec!["Shape.area".to_string()],
            ..TranslationOptions::default()
        };
        let program = ProgramBuilder::new(&model, &options).build().unwrap();
        assert!(program.methods.contains_key(&sil_name(&model, "Shape", "area")));
        assert!(!program.methods.contains_key(&sil_name(&model, "Square", "side")));
        let unrelated = model.lookup_function(model.main_modules[0], "unrelated").unwrap();
        assert!(!program.methods.contains_key(&model.method(unrelated).sil_name));
        assert!(program.domains.contains_key(TYPE_DOMAIN));
    }

    #[test]
    fn test_translation_is_deterministic() {
        let model = model_of(SHAPES);
        let options = TranslationOptions::default();
        let first = ProgramBuilder::new(&model, &options).build().unwrap();
        let second = ProgramBuilder::new(&model, &options).build().unwrap();
        assert_eq!(first, second);
    }
}

// Copyright (c) Asymptotic Labs
// SPDX-License-Identifier: Apache-2.0

//! Builds the semantic model from the syntax tree.
//!
//! Modules are handled in import order. Each module goes through two phases:
//! `declare` registers imports, type variables, classes with their members and
//! signatures, and module globals; `body` then walks every method body, binding
//! locals, fields, try blocks and loop invariants. A final `process` pass assigns
//! IR names and resolves override and field inheritance links.

mod body;
mod declare;
pub mod decorators;
pub mod names;
mod process;
pub mod types;

use crate::error::{Result, SourcePos, TranslationError};
use crate::interface::{InterfaceClass, InterfaceDecls, InterfaceMember};
use crate::model::{
    Class, ClassId, Method, MethodKind, Model, Module, ModuleId, PyType, ScopeRef, VarKind,
};
use crate::syntax::{SourceModule, SourceProgram, StmtKind};
use crate::type_table::TypeTable;
use log::{debug, info};
use std::collections::{BTreeMap, BTreeSet};
use types::{builtin_class, resolve_type};

pub use names::{resolve_name, Binding};

/// Analyze a whole program against the built-in and user interface declarations
pub fn analyze(program: &SourceProgram, interface: &InterfaceDecls) -> Result<Model> {
    let mut analyzer = Analyzer::new(&program.types);
    analyzer.load_interface(interface)?;
    analyzer.analyze_modules(&program.modules)?;
    analyzer.process()?;
    Ok(analyzer.into_model())
}

pub struct Analyzer<'a> {
    model: Model,
    types: &'a TypeTable,
}

impl<'a> Analyzer<'a> {
    pub fn new(types: &'a TypeTable) -> Self {
        Self {
            model: Model::new(),
            types,
        }
    }

    pub fn into_model(self) -> Model {
        self.model
    }

    fn pos(&self, module: ModuleId, line: usize, col: usize) -> SourcePos {
        let module = self.model.module(module);
        let path = if module.path.is_empty() {
            &module.name
        } else {
            &module.path
        };
        SourcePos::new(path.clone(), line, col)
    }

    // ------------------------------------------------------------------------
    // Interface classes
    // ------------------------------------------------------------------------

    /// Create the global module holding every interface class
    pub fn load_interface(&mut self, decls: &InterfaceDecls) -> Result<()> {
        let global = self.model.add_module(Module {
            name: "builtins".to_string(),
            path: "<builtins>".to_string(),
            is_global: true,
            ..Default::default()
        });
        self.model.module_order.push(global);

        let ordered = decls.in_hierarchy_order();
        for (name, _) in &ordered {
            let id = self.model.add_class(Class {
                name: name.to_string(),
                sil_name: name.to_string(),
                module: global,
                interface: true,
                defined: true,
                pos: SourcePos::new("<builtins>", 0, 0),
                ..Default::default()
            });
            self.model.registry.reserve(name);
            self.model
                .module_mut(global)
                .classes
                .insert(name.to_string(), id);
        }

        let object = builtin_class(&self.model, "object", None)?;
        for (name, decl) in &ordered {
            let cls = self.model.module(global).classes[name.as_str()];
            if cls != object {
                let sup = match &decl.extends {
                    None => object,
                    Some(sup) => self.model.builtin(sup).ok_or_else(|| {
                        TranslationError::unsupported(
                            format!("interface class `{}` extends unknown class `{}`", name, sup),
                            None,
                        )
                    })?,
                };
                if self.model.superclass_chain(sup).contains(&cls) {
                    return Err(TranslationError::invalid(
                        "cyclic.inheritance",
                        format!("interface class `{}` inherits from itself", name),
                        None,
                    ));
                }
                self.model.class_mut(cls).superclass = Some(sup);
            }
            for index in 0..decl.type_vars {
                let var_name = InterfaceClass::type_var_name(index);
                let var = PyType::TypeVar {
                    name: var_name.clone(),
                    bound: Box::new(PyType::Class(object)),
                    class: Some(cls),
                    index,
                };
                self.model.class_mut(cls).type_vars.insert(var_name, var);
            }
        }

        for (name, decl) in &ordered {
            let cls = self.model.module(global).classes[name.as_str()];
            for (field, typ) in &decl.fields {
                let typ = resolve_type(&self.model, global, Some(cls), typ, None)?;
                let sil_name = format!("{}_{}", name, field);
                self.model.registry.reserve(&sil_name);
                let id = self.model.add_field(crate::model::Field {
                    name: field.clone(),
                    sil_name,
                    cls,
                    typ,
                    inherited: None,
                    reads: vec![],
                    writes: vec![],
                });
                self.model.class_mut(cls).fields.insert(field.clone(), id);
            }
            let groups = [
                (MethodKind::Normal, &decl.methods),
                (MethodKind::Pure, &decl.functions),
                (MethodKind::Predicate, &decl.predicates),
            ];
            for (kind, members) in groups {
                for (member, sig) in members {
                    self.declare_interface_member(cls, member, sig, kind)?;
                }
            }
        }
        debug!("loaded {} interface classes", ordered.len());
        Ok(())
    }

    fn declare_interface_member(
        &mut self,
        cls: ClassId,
        name: &str,
        sig: &InterfaceMember,
        kind: MethodKind,
    ) -> Result<()> {
        let class_name = self.model.class(cls).name.clone();
        let global = self.model.class(cls).module;
        let pos = SourcePos::new("<builtins>", 0, 0);
        let mut method = Method::new(name, global, Some(cls), kind, pos);
        method.interface = true;
        method.sil_name = format!("{}_{}", class_name, name);
        method.requires = sig.requires.clone();
        method.return_type = match (&sig.typ, kind) {
            (Some(typ), _) => Some(resolve_type(&self.model, global, Some(cls), typ, None)?),
            (None, MethodKind::Predicate) => None,
            (None, MethodKind::Pure) => {
                return Err(TranslationError::invalid(
                    "function.type.none",
                    format!("interface function `{}` has no return type", method.sil_name),
                    None,
                ))
            }
            (None, _) => None,
        };
        self.model.registry.reserve(&method.sil_name);
        let id = self.model.add_method(method);
        for (index, typ) in sig.args.iter().enumerate() {
            let typ = resolve_type(&self.model, global, Some(cls), typ, None)?;
            let arg_name = if index == 0 {
                "self".to_string()
            } else {
                format!("arg{}", index)
            };
            let var = self
                .model
                .add_var(&arg_name, typ, VarKind::Arg, ScopeRef::Method(id));
            self.model.var_mut(var).sil_name = arg_name.clone();
            let method = self.model.method_mut(id);
            method.args.insert(arg_name, var);
            method.defaults.push(None);
        }
        let class = self.model.class_mut(cls);
        match kind {
            MethodKind::Pure => class.functions.insert(name.to_string(), id),
            MethodKind::Predicate => class.predicates.insert(name.to_string(), id),
            _ => class.methods.insert(name.to_string(), id),
        };
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Source modules
    // ------------------------------------------------------------------------

    pub fn analyze_modules(&mut self, modules: &[SourceModule]) -> Result<()> {
        let ids: Vec<ModuleId> = modules
            .iter()
            .map(|m| {
                self.model.add_module(Module {
                    name: m.name.clone(),
                    path: m.path.clone(),
                    source: m.source.clone(),
                    ..Default::default()
                })
            })
            .collect();

        let (order, imported) = import_order(modules);
        for index in &order {
            self.model.module_order.push(ids[*index]);
            if !imported.contains(index) {
                self.model.main_modules.push(ids[*index]);
            }
        }
        for index in &order {
            info!("analyzing module `{}`", modules[*index].name);
            self.declare_module(ids[*index], &modules[*index])?;
        }
        for index in &order {
            self.analyze_module_bodies(ids[*index])?;
        }
        Ok(())
    }

    /// Resolve a type-table entry of `name` as seen from `path`
    fn table_type(
        &self,
        module: ModuleId,
        cls: Option<ClassId>,
        path: &[String],
        name: &str,
        pos: &SourcePos,
    ) -> Result<Option<(PyType, BTreeMap<(usize, usize), PyType>)>> {
        let Some((typ, alts)) = self.types.get_type(path, name) else {
            return Ok(None);
        };
        let typ = resolve_type(&self.model, module, cls, &typ, Some(pos))?;
        let alts = alts
            .into_iter()
            .map(|(at, alt)| Ok((at, resolve_type(&self.model, module, cls, &alt, Some(pos))?)))
            .collect::<Result<BTreeMap<_, _>>>()?;
        Ok(Some((typ, alts)))
    }
}

/// Module indices in dependency order (imported modules first), plus the set of
/// modules imported by some other module
fn import_order(modules: &[SourceModule]) -> (Vec<usize>, BTreeSet<usize>) {
    let index_of = |name: &str| modules.iter().position(|m| m.name == name);
    let deps: Vec<Vec<usize>> = modules
        .iter()
        .map(|m| {
            let mut deps = vec![];
            for stmt in &m.body {
                match &stmt.kind {
                    StmtKind::ImportFrom { module, .. } => deps.extend(index_of(module)),
                    StmtKind::Import { names } => {
                        deps.extend(names.iter().filter_map(|alias| index_of(&alias.name)))
                    }
                    _ => {}
                }
            }
            deps
        })
        .collect();

    fn visit(index: usize, deps: &[Vec<usize>], visited: &mut BTreeSet<usize>, order: &mut Vec<usize>) {
        if !visited.insert(index) {
            return;
        }
        for dep in &deps[index] {
            visit(*dep, deps, visited, order);
        }
        order.push(index);
    }

    let mut visited = BTreeSet::new();
    let mut order = vec![];
    for index in 0..modules.len() {
        visit(index, &deps, &mut visited, &mut order);
    }
    let imported = deps
        .iter()
        .enumerate()
        .flat_map(|(i, d)| d.iter().filter(move |dep| **dep != i).copied())
        .collect();
    (order, imported)
}

#[cfg(test)]
mod tests {
    use super::*;

    pub(super) fn analyze_json(json: &str) -> Result<Model> {
        let program = SourceProgram::from_json(json).unwrap();
        analyze(&program, &InterfaceDecls::builtins().unwrap())
    }

    #[test]
    fn test_import_order_puts_dependencies_first() {
        let program = SourceProgram::from_json(
            r#"{ "modules": [
                { "name": "main", "body": [
                    { "kind": "ImportFrom", "module": "lib", "names": [{ "name": "*" }] }
                ] },
                { "name": "lib", "body": [] }
            ] }"#,
        )
        .unwrap();
        let (order, imported) = import_order(&program.modules);
        assert_eq!(order, vec![1, 0]);
        assert!(imported.contains(&1));
        assert!(!imported.contains(&0));
    }

    #[test]
    fn test_interface_hierarchy() {
        let model = analyze_json(r#"{ "modules": [] }"#).unwrap();
        let bool_ = model.builtin("bool").unwrap();
        let int = model.builtin("int").unwrap();
        let object = model.builtin("object").unwrap();
        let zero_div = model.builtin("ZeroDivisionError").unwrap();
        let exception = model.builtin("Exception").unwrap();
        assert!(model.issubtype(bool_, int));
        assert!(model.issubtype(zero_div, exception));
        assert_eq!(model.superclass_chain(exception).last(), Some(&object));
        let list = model.builtin("list").unwrap();
        let append = model.get_member(list, "append").unwrap();
        assert_eq!(model.method(append).sil_name, "list_append");
        assert!(model.method(append).interface);
        assert_eq!(model.method(append).args.len(), 2);
    }
}

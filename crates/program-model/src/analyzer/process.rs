// Copyright (c) Asymptotic Labs
// SPDX-License-Identifier: Apache-2.0

//! Naming pass: assigns IR names and resolves inheritance links.
//!
//! Global names (classes, fields, members, module functions, globals, IO
//! operations, call slots, `main`) come first, in module order, from the shared
//! registry. Method-local names (variables, labels) follow from the same
//! registry, so no two names handed out in one compilation are equal.

use super::Analyzer;
use crate::error::{Result, TranslationError};
use crate::model::{ClassId, MethodId, MethodKind, ScopeRef, TryBlockId, VarKind};
use crate::syntax::{Expr, ExprKind};
use itertools::Itertools;
use log::debug;

/// Pure members that may replace the built-in version
const OVERRIDABLE_FUNCTIONS: &[(&str, &str)] =
    &[("object", "__str__"), ("object", "__bool__"), ("dict", "__getitem__")];

fn is_literal(expr: &Expr) -> bool {
    matches!(
        expr.kind,
        ExprKind::Int { .. } | ExprKind::Bool { .. } | ExprKind::Str { .. } | ExprKind::NoneLit
    )
}

impl<'a> Analyzer<'a> {
    pub(super) fn process(&mut self) -> Result<()> {
        let classes = self.user_classes();
        for cls in &classes {
            let name = self.model.class(*cls).name.clone();
            let sil_name = self.model.freshen(&name);
            if self.model.class(*cls).is_generic() {
                // raw constant of the type domain
                self.model.registry.reserve(&format!("{}_basic", sil_name));
            }
            self.model.class_mut(*cls).sil_name = sil_name;
        }
        for cls in &classes {
            self.process_fields(*cls);
            self.process_members(*cls)?;
        }
        self.process_module_names();
        self.process_locals();
        Ok(())
    }

    /// User classes, superclasses before subclasses
    fn user_classes(&self) -> Vec<ClassId> {
        self.model
            .module_order
            .iter()
            .filter(|m| !self.model.module(**m).is_global)
            .flat_map(|m| self.model.module(*m).classes.values().copied())
            .filter(|c| !self.model.class(*c).interface)
            .unique()
            .sorted_by_key(|c| self.model.superclass_chain(*c).len())
            .collect()
    }

    fn process_fields(&mut self, cls: ClassId) {
        let class_sil = self.model.class(cls).sil_name.clone();
        let superclass = self.model.class(cls).superclass;
        let fields = self.model.class(cls).fields.values().copied().collect_vec();
        for field in fields {
            let name = self.model.field(field).name.clone();
            let parent = superclass.and_then(|s| self.model.get_field(s, &name));
            let sil_name = match parent {
                Some(parent) => {
                    self.model.field_mut(field).inherited = Some(parent);
                    let root = self.model.root_field(parent);
                    self.model.field(root).sil_name.clone()
                }
                None => self.model.freshen(&format!("{}_{}", class_sil, name)),
            };
            self.model.field_mut(field).sil_name = sil_name;
        }
        let statics = self.model.class(cls).static_fields.values().copied().collect_vec();
        for var in statics {
            let name = self.model.var(var).name.clone();
            self.model.var_mut(var).sil_name = self.model.freshen(&format!("{}_{}", class_sil, name));
        }
    }

    fn process_members(&mut self, cls: ClassId) -> Result<()> {
        let class_sil = self.model.class(cls).sil_name.clone();
        let members = self.model.class(cls).all_members().collect_vec();
        for member in members {
            let (name, kind, setter) = {
                let m = self.model.method(member);
                (m.name.clone(), m.kind, m.setter)
            };
            let sil_name = if kind == MethodKind::Property {
                format!("{}_{}_getter", class_sil, name)
            } else {
                format!("{}_{}", class_sil, name)
            };
            self.model.method_mut(member).sil_name = self.model.freshen(&sil_name);
            if let Some(setter) = setter {
                let setter_name = self.model.freshen(&format!("{}_{}_setter", class_sil, name));
                self.model.method_mut(setter).sil_name = setter_name;
            }
            self.resolve_override(cls, member)?;
        }
        Ok(())
    }

    /// Link `member` to the member it replaces and check that it may do so
    fn resolve_override(&mut self, cls: ClassId, member: MethodId) -> Result<()> {
        let Some(superclass) = self.model.class(cls).superclass else {
            return Ok(());
        };
        let m = self.model.method(member);
        if m.name == "__init__" {
            return Ok(());
        }
        let Some(overridden) = self.model.get_member(superclass, &m.name) else {
            return Ok(());
        };
        let o = self.model.method(overridden);
        let invalid = |reason: String| {
            Err(TranslationError::invalid("invalid.override", reason, Some(m.pos.clone())))
        };
        let owner = o.cls.map(|c| self.model.class(c).name.as_str()).unwrap_or_default();

        if m.kind == MethodKind::Property || o.kind == MethodKind::Property {
            return invalid(format!("property `{}` cannot be overridden", m.name));
        }
        if m.is_pure() != o.is_pure() || m.is_predicate() != o.is_predicate() {
            return invalid(format!("`{}` changes the kind of `{}.{}`", m.name, owner, o.name));
        }
        if m.is_pure() && !OVERRIDABLE_FUNCTIONS.contains(&(owner, m.name.as_str())) {
            return invalid(format!("pure function `{}.{}` cannot be overridden", owner, o.name));
        }
        if !o.interface {
            if m.args.len() != o.args.len() {
                return invalid(format!("`{}` takes {} arguments, overridden method takes {}", m.name, m.args.len(), o.args.len()));
            }
            for ((name1, _), (name2, _)) in m.args.iter().zip(o.args.iter()) {
                if name1 != name2 {
                    return invalid(format!("argument `{}` is named `{}` in the overridden method", name1, name2));
                }
            }
            // defaults that are not both literals are compared by the override check
            for ((name, _), (own, other)) in m.args.iter().zip(m.defaults.iter().zip(o.defaults.iter())) {
                let differs = match (own, other) {
                    (Some(own), Some(other)) => is_literal(own) && is_literal(other) && own != other,
                    (own, other) => own.is_some() != other.is_some(),
                };
                if differs {
                    return invalid(format!("default value of `{}` differs from overridden method", name));
                }
            }
            for exception in m.declared_exceptions.keys() {
                let allowed = o
                    .declared_exceptions
                    .keys()
                    .any(|sup| self.model.issubtype(*exception, *sup));
                if !allowed {
                    let name = &self.model.class(*exception).name;
                    return invalid(format!("`{}` may raise `{}`, which the overridden method does not declare", m.name, name));
                }
            }
        }
        debug!("`{}` overrides `{}`", m.sil_name, o.sil_name);
        self.model.method_mut(member).overrides = Some(overridden);
        Ok(())
    }

    fn process_module_names(&mut self) {
        let modules = self
            .model
            .module_order
            .iter()
            .copied()
            .filter(|m| !self.model.module(*m).is_global)
            .collect_vec();
        let mut main_taken = false;
        for module in modules {
            let m = self.model.module(module);
            let module_name = m.name.clone();
            let functions = m
                .functions
                .values()
                .chain(m.methods.values())
                .chain(m.predicates.values())
                .copied()
                .collect_vec();
            let globals = m.global_vars.values().copied().collect_vec();
            let io_operations = m.io_operations.values().copied().collect_vec();
            let call_slots = m.call_slots.values().copied().collect_vec();
            let main = m.main;

            for function in functions {
                let name = self.model.method(function).name.clone();
                self.model.method_mut(function).sil_name = self.model.freshen(&name);
            }
            for var in globals {
                let name = self.model.var(var).name.clone();
                self.model.var_mut(var).sil_name = self.model.freshen(&format!("{}_{}", module_name, name));
            }
            for op in io_operations {
                let name = self.model.io_operation(op).name.clone();
                self.model.io_operation_mut(op).sil_name = self.model.freshen(&name);
            }
            for slot in call_slots {
                let name = self.model.call_slot(slot).name.clone();
                self.model.call_slot_mut(slot).sil_name = self.model.freshen(&name);
            }
            if let Some(main) = main {
                // `main` itself is reserved so that no source name can take it
                let name = if main_taken {
                    self.model.freshen("main")
                } else {
                    "main".to_string()
                };
                main_taken = true;
                self.model.method_mut(main).sil_name = name;
            }
        }
    }

    /// Variables and labels, named in scope order
    fn process_locals(&mut self) {
        let mut scopes: Vec<ScopeRef> = vec![];
        for var in &self.model.vars {
            let local = matches!(
                var.owner,
                ScopeRef::Method(_) | ScopeRef::IoOperation(_) | ScopeRef::CallSlot(_)
            );
            if local && var.sil_name.is_empty() && !scopes.contains(&var.owner) {
                scopes.push(var.owner);
            }
        }
        for (index, method) in self.model.methods.iter().enumerate() {
            let scope = ScopeRef::Method(MethodId(index));
            if !method.try_blocks.is_empty() && !scopes.contains(&scope) {
                scopes.push(scope);
            }
        }
        for scope in scopes {
            let vars = (0..self.model.vars.len())
                .filter(|v| self.model.vars[*v].owner == scope && self.model.vars[*v].sil_name.is_empty())
                .collect_vec();
            for var in vars {
                let fresh = self.model.registry.freshen(&self.model.vars[var].name);
                self.model.vars[var].sil_name = fresh;
            }
            if let ScopeRef::Method(method) = scope {
                let blocks = self.model.method(method).try_blocks.clone();
                for block in blocks {
                    self.name_labels(block);
                }
            }
        }
    }

    fn name_labels(&mut self, block: TryBlockId) {
        let stem = if self.model.try_block(block).with_context.is_some() {
            "with"
        } else {
            "try"
        };
        let handler_names = self
            .model
            .try_block(block)
            .handlers
            .iter()
            .map(|h| format!("handler{}", self.model.class(h.exception).name))
            .collect_vec();
        let registry = &mut self.model.registry;
        let try_name = registry.freshen(stem);
        let post_name = registry.freshen(&format!("post_{}", stem));
        let else_name = registry.freshen(&format!("{}_else", stem));
        let finally_name = registry.freshen(&format!("{}_finally", stem));
        let handler_labels = handler_names.iter().map(|name| registry.freshen(name)).collect_vec();
        let b = self.model.try_block_mut(block);
        b.try_name = try_name;
        b.post_name = post_name;
        b.else_name = else_name;
        b.finally_name = finally_name;
        for (handler, label) in b.handlers.iter_mut().zip(handler_labels) {
            handler.label = label;
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::analyzer::tests::analyze_json;
    use crate::model::ModuleId;

    fn animal_program(dog_speak_args: &str) -> String {
        format!(
            r#"{{ "modules": [{{ "name": "zoo", "path": "zoo.py", "body": [
                {{ "kind": "ClassDef", "name": "Animal", "line": 1, "body": [
                    {{ "kind": "FunctionDef", "name": "speak", "line": 2,
                      "args": {{ "args": [{{ "name": "self" }}] }},
                      "returns": {{ "kind": "Name", "id": "int" }},
                      "body": [{{ "kind": "Return", "value": {{ "kind": "Int", "value": 1 }} }}] }},
                    {{ "kind": "FunctionDef", "name": "__init__", "line": 3,
                      "args": {{ "args": [{{ "name": "self" }}] }},
                      "body": [{{ "kind": "Assign", "targets": [
                          {{ "kind": "Attribute", "value": {{ "kind": "Name", "id": "self" }}, "attr": "legs" }}
                      ], "value": {{ "kind": "Int", "value": 4 }} }}] }}
                ] }},
                {{ "kind": "ClassDef", "name": "Dog", "line": 5,
                  "bases": [{{ "kind": "Name", "id": "Animal" }}], "body": [
                    {{ "kind": "FunctionDef", "name": "speak", "line": 6,
                      "args": {{ "args": [{}] }},
                      "returns": {{ "kind": "Name", "id": "int" }},
                      "body": [{{ "kind": "Return", "value": {{ "kind": "Int", "value": 2 }} }}] }},
                    {{ "kind": "FunctionDef", "name": "__init__", "line": 7,
                      "args": {{ "args": [{{ "name": "self" }}] }},
                      "body": [{{ "kind": "Assign", "targets": [
                          {{ "kind": "Attribute", "value": {{ "kind": "Name", "id": "self" }}, "attr": "legs" }}
                      ], "value": {{ "kind": "Int", "value": 3 }} }}] }}
                ] }}
            ] }}] }}"#,
            dog_speak_args
        )
    }

    #[test]
    fn test_override_and_field_inheritance() {
        let model = analyze_json(&animal_program(r#"{ "name": "self" }"#)).unwrap();
        let zoo = model.module(ModuleId(1));
        let animal = zoo.classes["Animal"];
        let dog = zoo.classes["Dog"];
        let dog_speak = model.class(dog).methods["speak"];
        let animal_speak = model.class(animal).methods["speak"];
        assert_eq!(model.method(dog_speak).overrides, Some(animal_speak));
        assert_eq!(model.method(dog_speak).sil_name, "Dog_speak");
        assert_eq!(model.method(animal_speak).sil_name, "Animal_speak");

        let dog_legs = model.class(dog).fields.get("legs").copied();
        let animal_legs = model.class(animal).fields["legs"];
        assert_eq!(model.field(animal_legs).sil_name, "Animal_legs");
        // the subclass write resolves to the inherited field
        assert!(dog_legs.map_or(true, |f| model.root_field(f) == animal_legs));
        assert_eq!(model.instance_fields(dog), vec![animal_legs]);
    }

    #[test]
    fn test_override_with_different_arity() {
        let args = r#"{ "name": "self" }, { "name": "loud", "annotation": { "kind": "Name", "id": "bool" } }"#;
        let err = analyze_json(&animal_program(args)).unwrap_err();
        assert_eq!(err.code(), "invalid.override");
    }

    #[test]
    fn test_fresh_names_avoid_reserved_words() {
        let json = r#"{ "modules": [{ "name": "m", "body": [
            { "kind": "FunctionDef", "name": "method", "line": 1,
              "args": { "args": [{ "name": "result", "annotation": { "kind": "Name", "id": "int" } }] },
              "body": [{ "kind": "Pass" }] },
            { "kind": "FunctionDef", "name": "main", "line": 2, "body": [{ "kind": "Pass" }] }
        ] }] }"#;
        let model = analyze_json(json).unwrap();
        let m = model.module(ModuleId(1));
        let method = model.method(m.methods["method"]);
        assert_eq!(method.sil_name, "method_0");
        assert_eq!(model.var(method.args["result"]).sil_name, "result_0");
        assert_eq!(model.method(m.methods["main"]).sil_name, "main_0");
    }

    #[test]
    fn test_same_local_in_two_functions_gets_distinct_names() {
        let function = |name: &str| {
            format!(
                r#"{{ "kind": "FunctionDef", "name": "{}", "line": 1, "body": [
                    {{ "kind": "Assign", "line": 2, "targets": [{{ "kind": "Name", "id": "y" }}],
                      "value": {{ "kind": "Int", "value": 3 }} }}
                ] }}"#,
                name
            )
        };
        let json = format!(
            r#"{{ "modules": [{{ "name": "m", "body": [{}, {}] }}] }}"#,
            function("f"),
            function("g")
        );
        let model = analyze_json(&json).unwrap();
        let m = model.module(ModuleId(1));
        let names = ["f", "g"]
            .iter()
            .map(|f| {
                let method = model.method(m.methods[*f]);
                model.var(method.locals["y"]).sil_name.clone()
            })
            .collect::<Vec<_>>();
        assert_eq!(names, vec!["y".to_string(), "y_0".to_string()]);
    }
}

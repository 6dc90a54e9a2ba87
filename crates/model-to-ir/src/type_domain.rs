// Copyright (c) Asymptotic Labs
// SPDX-License-Identifier: Apache-2.0

//! Type Domain Factory
//!
//! Encodes the nominal, generic class hierarchy as the IR domain `PyType`:
//! one constructor per class (generic classes take one argument per type
//! parameter, tuples a sequence of element types), `extends_` facts for direct
//! superclasses, self-subtype and sibling-exclusion axioms per class, and the
//! union and tuple axiom families. Union arities are collected while bodies are
//! translated and only emitted when the domain is finally created.

use itertools::Itertools;
use program_model::{ClassId, Model, PyType};
use std::collections::BTreeSet;
use verification_ir::{BinOp, Domain, DomainAxiom, DomainFunc, Expr, LocalVar, Type};

pub const TYPE_DOMAIN: &str = "PyType";

/// How class type variables are turned into type expressions
enum VarEnv<'e> {
    /// Through the runtime type of the receiver, if there is one
    Receiver(Option<&'e Expr>),
    /// Type variables of `class` bound to the given expressions
    Bound(ClassId, &'e [Expr]),
}

#[derive(Debug, Clone, Default)]
pub struct TypeDomainFactory {
    union_arity: usize,
    tuple_arities: BTreeSet<usize>,
}

impl TypeDomainFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raise the watermark of union arities the domain must support
    pub fn require_union_type_size(&mut self, size: usize) {
        self.union_arity = self.union_arity.max(size);
    }

    pub fn union_arity(&self) -> usize {
        self.union_arity
    }

    /// Record a tuple constructor arity used by the translated program
    pub fn require_tuple_arity(&mut self, size: usize) {
        self.tuple_arities.insert(size);
    }

    pub fn tuple_arities(&self) -> &BTreeSet<usize> {
        &self.tuple_arities
    }

    // ------------------------------------------------------------------------
    // Expression builders
    // ------------------------------------------------------------------------

    pub fn pytype() -> Type {
        Type::domain(TYPE_DOMAIN)
    }

    fn app(name: impl Into<String>, args: Vec<Expr>) -> Expr {
        Expr::domain_app(TYPE_DOMAIN, name, args, Self::pytype())
    }

    fn pred(name: &str, args: Vec<Expr>) -> Expr {
        Expr::domain_app(TYPE_DOMAIN, name, args, Type::Bool)
    }

    pub fn r#typeof(expr: Expr) -> Expr {
        Self::app("typeof", vec![expr])
    }

    pub fn issubtype(sub: Expr, sup: Expr) -> Expr {
        Self::pred("issubtype", vec![sub, sup])
    }

    pub fn extends(sub: Expr, sup: Expr) -> Expr {
        Self::pred("extends_", vec![sub, sup])
    }

    fn get_basic(typ: Expr) -> Expr {
        Self::app("get_basic", vec![typ])
    }

    fn get_type_arg(typ: Expr, index: usize) -> Expr {
        Self::app("get_type_arg", vec![typ, Expr::int(index as i64)])
    }

    fn tuple_args(typ: Expr) -> Expr {
        Expr::domain_app(TYPE_DOMAIN, "tuple_args", vec![typ], Type::seq(Self::pytype()))
    }

    fn tuple_arg(typ: Expr, index: Expr) -> Expr {
        Self::app("tuple_arg", vec![typ, index])
    }

    fn union_name(size: usize) -> String {
        format!("union_type_{}", size)
    }

    fn basic_name(model: &Model, cls: ClassId) -> String {
        format!("{}_basic", model.class(cls).sil_name)
    }

    fn is_tuple(model: &Model, cls: ClassId) -> bool {
        model.is_builtin(cls, "tuple")
    }

    /// Literal of a class without type arguments
    pub fn raw_literal(model: &Model, cls: ClassId) -> Expr {
        if Self::is_tuple(model, cls) {
            Self::app("tuple_basic", vec![])
        } else if model.class(cls).is_generic() {
            Self::app(Self::basic_name(model, cls), vec![])
        } else {
            Self::app(model.class(cls).sil_name.clone(), vec![])
        }
    }

    /// Type-domain expression denoting `typ`
    pub fn literal(&mut self, model: &Model, typ: &PyType, receiver: Option<&Expr>) -> Expr {
        self.literal_in(model, typ, &VarEnv::Receiver(receiver))
    }

    fn literal_in(&mut self, model: &Model, typ: &PyType, env: &VarEnv) -> Expr {
        match typ {
            PyType::Class(cls) => Self::raw_literal(model, *cls),
            PyType::Generic {
                cls,
                args,
                exact_length,
            } if Self::is_tuple(model, *cls) => {
                if !exact_length {
                    return Self::app("tuple_basic", vec![]);
                }
                let elems = args.iter().map(|a| self.literal_in(model, a, env)).collect();
                Self::app(
                    "tuple",
                    vec![Expr::SeqLit {
                        elems,
                        elem_type: Self::pytype(),
                    }],
                )
            }
            PyType::Generic { cls, args, .. } => {
                let class = model.class(*cls);
                if args.len() != class.type_vars.len() {
                    return Self::raw_literal(model, *cls);
                }
                let args = args.iter().map(|a| self.literal_in(model, a, env)).collect();
                Self::app(class.sil_name.clone(), args)
            }
            PyType::Union(members) => {
                self.require_union_type_size(members.len());
                let args = members.iter().map(|m| self.literal_in(model, m, env)).collect();
                Self::app(Self::union_name(members.len()), args)
            }
            PyType::Optional(inner) => {
                self.require_union_type_size(2);
                let none = Self::raw_literal(model, model.builtin("NoneType").unwrap_or_default());
                let inner = self.literal_in(model, inner, env);
                Self::app(Self::union_name(2), vec![none, inner])
            }
            PyType::TypeVar {
                bound,
                class,
                index,
                ..
            } => match (env, class) {
                (VarEnv::Bound(owner, vars), Some(c)) if owner == c && *index < vars.len() => {
                    vars[*index].clone()
                }
                (VarEnv::Receiver(Some(receiver)), Some(_)) => {
                    Self::get_type_arg(Self::r#typeof((*receiver).clone()), *index)
                }
                _ => self.literal_in(model, bound, env),
            },
        }
    }

    /// Assertion that the reference `expr` holds a value of type `typ`
    pub fn type_check(&mut self, model: &Model, expr: Expr, typ: &PyType, receiver: Option<&Expr>) -> Expr {
        if expr.typ() != Type::Ref {
            return Expr::tt();
        }
        match typ {
            PyType::Optional(inner) => {
                let check = self.type_check(model, expr.clone(), inner, receiver);
                Expr::or(Expr::eq(expr, Expr::Null), check)
            }
            PyType::Class(cls) if model.is_builtin(*cls, "NoneType") => Expr::eq(expr, Expr::Null),
            PyType::Class(cls) if model.is_builtin(*cls, "object") => Expr::tt(),
            PyType::Generic {
                cls,
                args,
                exact_length: false,
            } if Self::is_tuple(model, *cls) => {
                let runtime = Self::r#typeof(expr);
                let basic = Self::issubtype(runtime.clone(), Self::app("tuple_basic", vec![]));
                let Some(elem) = args.first() else {
                    return basic;
                };
                let elem = self.literal(model, elem, receiver);
                let i = LocalVar::new("i", Type::Int);
                let arg = Self::tuple_arg(runtime.clone(), i.to_expr());
                let in_range = Expr::and(
                    Expr::binary(BinOp::Le, Expr::int(0), i.to_expr()),
                    Expr::binary(BinOp::Lt, i.to_expr(), Expr::seq_len(Self::tuple_args(runtime))),
                );
                let elements = Expr::forall(
                    vec![i],
                    vec![vec![arg.clone()]],
                    Expr::implies(in_range, Self::issubtype(arg, elem)),
                );
                Expr::and(basic, elements)
            }
            _ => {
                let literal = self.literal(model, typ, receiver);
                Self::issubtype(Self::r#typeof(expr), literal)
            }
        }
    }

    // ------------------------------------------------------------------------
    // Domain
    // ------------------------------------------------------------------------

    pub fn create_domain(&mut self, model: &Model) -> Domain {
        let t = Self::pytype();
        let var = |name: &str, typ: Type| LocalVar::new(name, typ);
        let func = |name: &str, params: Vec<LocalVar>, ret: Type| DomainFunc {
            name: name.to_string(),
            params,
            ret,
            unique: false,
        };
        let mut functions = vec![
            func("typeof", vec![var("obj", Type::Ref)], t.clone()),
            func("issubtype", vec![var("sub", t.clone()), var("super", t.clone())], Type::Bool),
            func("isnotsubtype", vec![var("sub", t.clone()), var("super", t.clone())], Type::Bool),
            func("extends_", vec![var("sub", t.clone()), var("super", t.clone())], Type::Bool),
            func("get_basic", vec![var("t", t.clone())], t.clone()),
            func("get_type_arg", vec![var("t", t.clone()), var("index", Type::Int)], t.clone()),
            func("tuple", vec![var("args", Type::seq(t.clone()))], t.clone()),
            func("tuple_args", vec![var("t", t.clone())], Type::seq(t.clone())),
            func("tuple_arg", vec![var("t", t.clone()), var("index", Type::Int)], t.clone()),
            DomainFunc {
                name: "tuple_basic".to_string(),
                params: vec![],
                ret: t.clone(),
                unique: true,
            },
        ];
        let mut axioms = global_axioms();

        let classes = (0..model.classes.len())
            .map(ClassId)
            .filter(|c| !Self::is_tuple(model, *c))
            .collect_vec();
        for cls in &classes {
            let class = model.class(*cls);
            if class.is_generic() {
                let params = (0..class.type_vars.len())
                    .map(|i| var(&format!("arg_{}", i), t.clone()))
                    .collect();
                functions.push(func(&class.sil_name, params, t.clone()));
                functions.push(DomainFunc {
                    name: Self::basic_name(model, *cls),
                    params: vec![],
                    ret: t.clone(),
                    unique: true,
                });
            } else {
                functions.push(DomainFunc {
                    name: class.sil_name.clone(),
                    params: vec![],
                    ret: t.clone(),
                    unique: true,
                });
            }
        }
        for cls in &classes {
            axioms.extend(self.class_axioms(model, *cls));
        }
        for cls in &classes {
            let children = model
                .direct_subclasses(*cls)
                .into_iter()
                .filter(|c| !Self::is_tuple(model, *c))
                .collect_vec();
            for (a, b) in children.iter().tuple_combinations() {
                axioms.push(sibling_exclusion(model, *a, *b));
            }
        }
        // tuple sits below object like any other class
        if let (Some(tuple), Some(object)) = (model.builtin("tuple"), model.builtin("object")) {
            for sibling in model.direct_subclasses(object) {
                if sibling != tuple {
                    axioms.push(sibling_exclusion(model, tuple, sibling));
                }
            }
        }

        for size in 2..=self.union_arity {
            let params = (0..size).map(|i| var(&format!("arg_{}", i), t.clone())).collect();
            functions.push(func(&Self::union_name(size), params, t.clone()));
            axioms.push(union_axiom(size));
        }

        Domain {
            name: TYPE_DOMAIN.to_string(),
            functions,
            axioms,
        }
    }

    fn class_axioms(&mut self, model: &Model, cls: ClassId) -> Vec<DomainAxiom> {
        let class = model.class(cls);
        let t = Self::pytype();
        let mut axioms = vec![];
        if class.is_generic() {
            let vars = (0..class.type_vars.len())
                .map(|i| LocalVar::new(format!("arg_{}", i), t.clone()))
                .collect_vec();
            let args = vars.iter().map(LocalVar::to_expr).collect_vec();
            let instance = Self::app(class.sil_name.clone(), args.clone());
            let basic = Self::raw_literal(model, cls);
            let mut facts = vec![
                Self::issubtype(instance.clone(), instance.clone()),
                Self::issubtype(instance.clone(), basic.clone()),
                Expr::eq(Self::get_basic(instance.clone()), basic.clone()),
            ];
            for (index, arg) in args.iter().enumerate() {
                facts.push(Expr::eq(Self::get_type_arg(instance.clone(), index), arg.clone()));
            }
            if let Some(sup) = class.superclass {
                let sup_type = self.superclass_type(model, cls, sup);
                let sup_lit = self.literal_in(model, &sup_type, &VarEnv::Bound(cls, &args));
                facts.push(Self::extends(instance.clone(), sup_lit));
            }
            axioms.push(DomainAxiom {
                name: format!("{}_subtype", class.sil_name),
                expr: Expr::forall(vars, vec![vec![instance]], Expr::conjoin(facts)),
            });
            let mut basic_facts = vec![Self::issubtype(basic.clone(), basic.clone())];
            if let Some(sup) = class.superclass {
                basic_facts.push(Self::extends(basic, Self::raw_literal(model, sup)));
            }
            axioms.push(DomainAxiom {
                name: format!("{}_basic_subtype", class.sil_name),
                expr: Expr::conjoin(basic_facts),
            });
        } else {
            let literal = Self::raw_literal(model, cls);
            let mut facts = vec![
                Self::issubtype(literal.clone(), literal.clone()),
                Expr::eq(Self::get_basic(literal.clone()), literal.clone()),
            ];
            if let Some(sup) = class.superclass {
                let sup_type = self.superclass_type(model, cls, sup);
                let sup_lit = self.literal_in(model, &sup_type, &VarEnv::Receiver(None));
                facts.push(Self::extends(literal, sup_lit));
            }
            axioms.push(DomainAxiom {
                name: format!("{}_subtype", class.sil_name),
                expr: Expr::conjoin(facts),
            });
        }
        axioms
    }

    /// The superclass of `cls` as instantiated by its declaration
    fn superclass_type(&self, model: &Model, cls: ClassId, sup: ClassId) -> PyType {
        let args = &model.class(cls).superclass_args;
        if args.is_empty() || args.len() != model.class(sup).type_vars.len() {
            PyType::Class(sup)
        } else {
            PyType::generic(sup, args.clone())
        }
    }
}

fn sibling_exclusion(model: &Model, a: ClassId, b: ClassId) -> DomainAxiom {
    let x = LocalVar::new("X", TypeDomainFactory::pytype());
    let sub_a = TypeDomainFactory::issubtype(x.to_expr(), TypeDomainFactory::raw_literal(model, a));
    let sub_b = TypeDomainFactory::issubtype(x.to_expr(), TypeDomainFactory::raw_literal(model, b));
    DomainAxiom {
        name: format!(
            "{}_{}_exclusion",
            model.class(a).sil_name,
            model.class(b).sil_name
        ),
        expr: Expr::forall(
            vec![x],
            vec![vec![sub_a.clone(), sub_b.clone()]],
            Expr::not(Expr::and(sub_a, sub_b)),
        ),
    }
}

fn union_axiom(size: usize) -> DomainAxiom {
    let t = TypeDomainFactory::pytype();
    let x = LocalVar::new("X", t.clone());
    let vars = (0..size)
        .map(|i| LocalVar::new(format!("arg_{}", i), t.clone()))
        .collect_vec();
    let union = TypeDomainFactory::app(
        TypeDomainFactory::union_name(size),
        vars.iter().map(LocalVar::to_expr).collect(),
    );
    let lhs = TypeDomainFactory::issubtype(x.to_expr(), union);
    let rhs = Expr::disjoin(
        vars.iter()
            .map(|v| TypeDomainFactory::issubtype(x.to_expr(), v.to_expr())),
    );
    let mut all = vec![x];
    all.extend(vars);
    DomainAxiom {
        name: format!("union_subtype_{}", size),
        expr: Expr::forall(all, vec![vec![lhs.clone()]], Expr::eq(lhs, rhs)),
    }
}

fn global_axioms() -> Vec<DomainAxiom> {
    type F = TypeDomainFactory;
    let t = F::pytype();
    let s = LocalVar::new("s", t.clone());
    let m = LocalVar::new("m", t.clone());
    let u = LocalVar::new("u", t.clone());
    let r = LocalVar::new("r", Type::Ref);
    let seq = LocalVar::new("seq", Type::seq(t.clone()));
    let seq2 = LocalVar::new("seq2", Type::seq(t.clone()));
    let i = LocalVar::new("i", Type::Int);
    let axiom = |name: &str, expr: Expr| DomainAxiom {
        name: name.to_string(),
        expr,
    };

    let s_m = F::issubtype(s.to_expr(), m.to_expr());
    let m_u = F::issubtype(m.to_expr(), u.to_expr());
    let transitivity = Expr::forall(
        vec![s.clone(), m.clone(), u.clone()],
        vec![vec![s_m.clone(), m_u.clone()]],
        Expr::implies(Expr::and(s_m, m_u), F::issubtype(s.to_expr(), u.to_expr())),
    );

    let extends = F::extends(s.to_expr(), m.to_expr());
    let extends_subtype = Expr::forall(
        vec![s.clone(), m.clone()],
        vec![vec![extends.clone()]],
        Expr::implies(extends, F::issubtype(s.to_expr(), m.to_expr())),
    );

    let not_sub = F::pred("isnotsubtype", vec![s.to_expr(), m.to_expr()]);
    let isnotsubtype = Expr::forall(
        vec![s.clone(), m.clone()],
        vec![vec![not_sub.clone()]],
        Expr::eq(not_sub, Expr::not(F::issubtype(s.to_expr(), m.to_expr()))),
    );

    let typeof_r = F::r#typeof(r.to_expr());
    let none = F::app("NoneType", vec![]);
    let null_none = Expr::forall(
        vec![r.clone()],
        vec![vec![typeof_r.clone()]],
        Expr::eq(F::issubtype(typeof_r, none), Expr::eq(r.to_expr(), Expr::Null)),
    );

    let object = F::app("object", vec![]);
    let object_top = Expr::forall(
        vec![s.clone()],
        vec![vec![F::issubtype(s.to_expr(), object.clone())]],
        F::issubtype(s.to_expr(), object.clone()),
    );

    let tuple = F::app("tuple", vec![seq.to_expr()]);
    let tuple_basic = F::app("tuple_basic", vec![]);
    let tuple_args = Expr::forall(
        vec![seq.clone()],
        vec![vec![tuple.clone()]],
        Expr::conjoin(vec![
            Expr::eq(F::tuple_args(tuple.clone()), seq.to_expr()),
            Expr::eq(F::get_basic(tuple.clone()), tuple_basic.clone()),
            F::issubtype(tuple.clone(), tuple.clone()),
            F::issubtype(tuple.clone(), tuple_basic.clone()),
        ]),
    );
    let tuple_arg_app = F::tuple_arg(tuple.clone(), i.to_expr());
    let in_range = |bound: Expr| {
        Expr::and(
            Expr::binary(BinOp::Le, Expr::int(0), i.to_expr()),
            Expr::binary(BinOp::Lt, i.to_expr(), Expr::seq_len(bound)),
        )
    };
    let tuple_arg = Expr::forall(
        vec![seq.clone(), i.clone()],
        vec![vec![tuple_arg_app.clone()]],
        Expr::implies(
            in_range(seq.to_expr()),
            Expr::eq(tuple_arg_app, Expr::seq_index(seq.to_expr(), i.to_expr())),
        ),
    );
    let tuple2 = F::app("tuple", vec![seq2.to_expr()]);
    let sub_tuple = F::issubtype(tuple.clone(), tuple2);
    let elementwise = Expr::forall(
        vec![i.clone()],
        vec![vec![Expr::seq_index(seq.to_expr(), i.to_expr())]],
        Expr::implies(
            in_range(seq.to_expr()),
            F::issubtype(
                Expr::seq_index(seq.to_expr(), i.to_expr()),
                Expr::seq_index(seq2.to_expr(), i.to_expr()),
            ),
        ),
    );
    let tuple_covariance = Expr::forall(
        vec![seq.clone(), seq2.clone()],
        vec![vec![sub_tuple.clone()]],
        Expr::implies(
            Expr::and(
                Expr::eq(Expr::seq_len(seq.to_expr()), Expr::seq_len(seq2.to_expr())),
                elementwise,
            ),
            sub_tuple,
        ),
    );
    let tuple_object = Expr::and(
        F::issubtype(tuple_basic.clone(), tuple_basic.clone()),
        F::extends(tuple_basic, object),
    );

    vec![
        axiom("issubtype_transitivity", transitivity),
        axiom("extends_implies_subtype", extends_subtype),
        axiom("isnotsubtype_definition", isnotsubtype),
        axiom("null_nonetype", null_none),
        axiom("object_top", object_top),
        axiom("tuple_args_definition", tuple_args),
        axiom("tuple_arg_definition", tuple_arg),
        axiom("tuple_covariance", tuple_covariance),
        axiom("tuple_basic_subtype", tuple_object),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use program_model::{analyze, InterfaceDecls, SourceProgram};

    fn model(json: &str) -> Model {
        let program = SourceProgram::from_json(json).unwrap();
        analyze(&program, &InterfaceDecls::builtins().unwrap()).unwrap()
    }

    fn zoo() -> Model {
        model(
            r#"{ "modules": [{ "name": "zoo", "path": "zoo.py", "body": [
                { "kind": "ClassDef", "name": "Animal", "body": [{ "kind": "Pass" }] },
                { "kind": "ClassDef", "name": "Dog", "bases": [{ "kind": "Name", "id": "Animal" }], "body": [{ "kind": "Pass" }] },
                { "kind": "ClassDef", "name": "Cat", "bases": [{ "kind": "Name", "id": "Animal" }], "body": [{ "kind": "Pass" }] }
            ] }] }"#,
        )
    }

    fn axiom<'d>(domain: &'d Domain, name: &str) -> &'d DomainAxiom {
        domain
            .axioms
            .iter()
            .find(|a| a.name == name)
            .unwrap_or_else(|| panic!("missing axiom {}", name))
    }

    #[test]
    fn test_class_constants_are_unique() {
        let model = zoo();
        let domain = TypeDomainFactory::new().create_domain(&model);
        let dog = domain.functions.iter().find(|f| f.name == "Dog").unwrap();
        assert!(dog.unique);
        assert!(dog.params.is_empty());
        let list = domain.functions.iter().find(|f| f.name == "list").unwrap();
        assert!(!list.unique);
        assert_eq!(list.params.len(), 1);
        assert!(domain.functions.iter().any(|f| f.name == "list_basic" && f.unique));
    }

    #[test]
    fn test_subclass_extends_parent() {
        let model = zoo();
        let domain = TypeDomainFactory::new().create_domain(&model);
        let dog = TypeDomainFactory::app("Dog", vec![]);
        let animal = TypeDomainFactory::app("Animal", vec![]);
        let expected = Expr::conjoin(vec![
            TypeDomainFactory::issubtype(dog.clone(), dog.clone()),
            Expr::eq(TypeDomainFactory::get_basic(dog.clone()), dog.clone()),
            TypeDomainFactory::extends(dog, animal),
        ]);
        assert_eq!(axiom(&domain, "Dog_subtype").expr, expected);
    }

    #[test]
    fn test_siblings_are_excluded() {
        let model = zoo();
        let domain = TypeDomainFactory::new().create_domain(&model);
        let exclusion = axiom(&domain, "Dog_Cat_exclusion");
        let Expr::Forall { vars, body, .. } = &exclusion.expr else {
            panic!("exclusion is not quantified");
        };
        assert_eq!(vars.len(), 1);
        assert!(matches!(**body, Expr::Unary { .. }));
        // a parent and its child are never excluded
        assert!(!domain.axioms.iter().any(|a| a.name == "Animal_Dog_exclusion"));
        assert!(domain.axioms.iter().any(|a| a.name == "int_NoneType_exclusion" || a.name == "NoneType_int_exclusion"));
    }

    #[test]
    fn test_union_watermark() {
        let model = zoo();
        let mut factory = TypeDomainFactory::new();
        let int = PyType::Class(model.builtin("int").unwrap());
        let str_ = PyType::Class(model.builtin("str").unwrap());
        let none = PyType::Class(model.builtin("NoneType").unwrap());
        factory.literal(&model, &PyType::Union(vec![int, str_, none]), None);
        assert_eq!(factory.union_arity(), 3);
        let domain = factory.create_domain(&model);
        assert!(domain.functions.iter().any(|f| f.name == "union_type_2"));
        assert!(domain.functions.iter().any(|f| f.name == "union_type_3"));
        assert!(!domain.functions.iter().any(|f| f.name == "union_type_4"));
        axiom(&domain, "union_subtype_3");
    }

    #[test]
    fn test_optional_check_short_circuits() {
        let model = zoo();
        let mut factory = TypeDomainFactory::new();
        let dog = model.classes.iter().position(|c| c.name == "Dog").map(ClassId).unwrap();
        let x = Expr::local("x", Type::Ref);
        let check = factory.type_check(&model, x.clone(), &PyType::Optional(Box::new(PyType::Class(dog))), None);
        let expected = Expr::or(
            Expr::eq(x.clone(), Expr::Null),
            TypeDomainFactory::issubtype(TypeDomainFactory::r#typeof(x), TypeDomainFactory::app("Dog", vec![])),
        );
        assert_eq!(check, expected);
        assert_eq!(factory.union_arity(), 0);
    }

    #[test]
    fn test_primitive_values_need_no_check() {
        let model = zoo();
        let mut factory = TypeDomainFactory::new();
        let int = PyType::Class(model.builtin("int").unwrap());
        assert!(factory.type_check(&model, Expr::local("n", Type::Int), &int, None).is_true());
    }
}

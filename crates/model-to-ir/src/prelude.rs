// Copyright (c) Asymptotic Labs
// SPDX-License-Identifier: Apache-2.0

//! Built-in declarations every translated program may depend on: the container
//! fields, definedness tracking, boxing of primitive values, and the encodings
//! of the built-in `object`, `int`, `list`, `range`, `Iterator`, `str`, `tuple`,
//! `set` and `dict` members. Unreferenced declarations are sliced away.

use crate::type_domain::TypeDomainFactory;
use program_model::Model;
use verification_ir::{
    Assertion, BinOp, Declaration, Expr, Field, FieldRef, Function, LocalVar, Method, Position, Type,
};

pub const IS_DEFINED: &str = "_isDefined";

pub fn list_acc() -> FieldRef {
    FieldRef::new("list_acc", Type::seq(Type::Ref))
}

pub fn set_acc() -> FieldRef {
    FieldRef::new("set_acc", Type::set(Type::Ref))
}

pub fn dict_acc() -> FieldRef {
    FieldRef::new("dict_acc", Type::set(Type::Ref))
}

pub fn iter_index() -> FieldRef {
    FieldRef::new("__iter_index", Type::Int)
}

pub fn previous() -> FieldRef {
    FieldRef::new("__previous", Type::seq(Type::Ref))
}

pub fn container() -> FieldRef {
    FieldRef::new("__container", Type::Ref)
}

pub fn is_defined(id: i64) -> Expr {
    Expr::func_app(IS_DEFINED, vec![Expr::int(id)], Type::Bool)
}

/// Read of a local that must have been assigned before
pub fn check_defined(value: Expr, id: i64) -> Expr {
    let name = match value.typ() {
        Type::Int => "_checkDefinedInt",
        Type::Bool => "_checkDefinedBool",
        _ => "_checkDefined",
    };
    let typ = value.typ();
    Expr::func_app(name, vec![value, Expr::int(id)], typ)
}

pub fn box_int(value: Expr) -> Expr {
    match value {
        Expr::FuncApp { name, mut args, .. } if name == "int___unbox__" && args.len() == 1 => args.remove(0),
        value => Expr::func_app("__prim__int___box__", vec![value], Type::Ref),
    }
}

pub fn box_bool(value: Expr) -> Expr {
    match value {
        Expr::FuncApp { name, mut args, .. } if name == "bool___unbox__" && args.len() == 1 => args.remove(0),
        value => Expr::func_app("__prim__bool___box__", vec![value], Type::Ref),
    }
}

pub fn unbox_int(value: Expr) -> Expr {
    match value {
        Expr::FuncApp { name, mut args, .. } if name == "__prim__int___box__" && args.len() == 1 => args.remove(0),
        value => Expr::func_app("int___unbox__", vec![value], Type::Int),
    }
}

pub fn unbox_bool(value: Expr) -> Expr {
    match value {
        Expr::FuncApp { name, mut args, .. } if name == "__prim__bool___box__" && args.len() == 1 => args.remove(0),
        value => Expr::func_app("bool___unbox__", vec![value], Type::Bool),
    }
}

pub fn tuple_create_name(arity: usize) -> String {
    format!("tuple___create{}__", arity)
}

// ============================================================================
// Declarations
// ============================================================================

fn var(name: &str, typ: Type) -> LocalVar {
    LocalVar::new(name, typ)
}

fn assertions(exprs: Vec<Expr>) -> Vec<Assertion> {
    exprs
        .into_iter()
        .map(|e| Assertion::new(e, Position::default()))
        .collect()
}

fn function(
    name: &str,
    params: Vec<LocalVar>,
    ret: Type,
    pres: Vec<Expr>,
    posts: Vec<Expr>,
    body: Option<Expr>,
) -> Declaration {
    Declaration::Function(Function {
        name: name.to_string(),
        params,
        ret,
        pres: assertions(pres),
        posts: assertions(posts),
        body,
        pos: Position::default(),
    })
}

fn method(name: &str, params: Vec<LocalVar>, returns: Vec<LocalVar>, pres: Vec<Expr>, posts: Vec<Expr>) -> Declaration {
    Declaration::Method(Method {
        name: name.to_string(),
        params,
        returns,
        pres: assertions(pres),
        posts: assertions(posts),
        locals: vec![],
        body: None,
        pos: Position::default(),
    })
}

fn field(f: FieldRef) -> Declaration {
    Declaration::Field(Field {
        name: f.name,
        typ: f.typ,
    })
}

struct Builder<'m> {
    model: &'m Model,
}

impl Builder<'_> {
    fn lit(&self, class: &str) -> Expr {
        match self.model.builtin(class) {
            Some(cls) => TypeDomainFactory::raw_literal(self.model, cls),
            None => Expr::domain_app(crate::TYPE_DOMAIN, class, vec![], TypeDomainFactory::pytype()),
        }
    }

    fn has_type(&self, e: Expr, class: &str) -> Expr {
        TypeDomainFactory::issubtype(TypeDomainFactory::r#typeof(e), self.lit(class))
    }

    fn typeof_is(&self, e: Expr, class: &str) -> Expr {
        Expr::eq(TypeDomainFactory::r#typeof(e), self.lit(class))
    }
}

fn lt(a: Expr, b: Expr) -> Expr {
    Expr::binary(BinOp::Lt, a, b)
}

fn le(a: Expr, b: Expr) -> Expr {
    Expr::binary(BinOp::Le, a, b)
}

fn in_bounds(index: Expr, seq: Expr) -> Expr {
    Expr::and(le(Expr::int(0), index.clone()), lt(index, Expr::seq_len(seq)))
}

fn empty_refs() -> Expr {
    Expr::SeqLit {
        elems: vec![],
        elem_type: Type::Ref,
    }
}

/// All prelude declarations, including one tuple constructor per used arity
pub fn declarations(model: &Model, types: &TypeDomainFactory) -> Vec<Declaration> {
    let b = Builder { model };
    let mut decls = vec![
        field(list_acc()),
        field(set_acc()),
        field(dict_acc()),
        field(iter_index()),
        field(previous()),
        field(container()),
    ];
    decls.extend(definedness());
    decls.extend(boxing(&b));
    decls.extend(object_and_int(&b));
    decls.extend(list());
    decls.extend(range(&b));
    decls.extend(iterator(&b));
    decls.extend(strings(&b));
    decls.extend(tuples(types));
    decls.extend(collections());
    decls
}

fn definedness() -> Vec<Declaration> {
    let id = var("id", Type::Int);
    let checked = |name: &str, typ: Type| {
        let val = var("val", typ.clone());
        function(
            name,
            vec![val.clone(), id.clone()],
            typ,
            vec![Expr::func_app(IS_DEFINED, vec![id.to_expr()], Type::Bool)],
            vec![],
            Some(val.to_expr()),
        )
    };
    vec![
        function(IS_DEFINED, vec![id.clone()], Type::Bool, vec![], vec![], None),
        checked("_checkDefined", Type::Ref),
        checked("_checkDefinedInt", Type::Int),
        checked("_checkDefinedBool", Type::Bool),
    ]
}

fn boxing(b: &Builder) -> Vec<Declaration> {
    let prim_int = var("prim", Type::Int);
    let prim_bool = var("prim", Type::Bool);
    let boxed = var("box", Type::Ref);
    let result_ref = Expr::Result(Type::Ref);
    vec![
        function(
            "__prim__int___box__",
            vec![prim_int.clone()],
            Type::Ref,
            vec![],
            vec![
                b.typeof_is(result_ref.clone(), "int"),
                Expr::eq(unbox_int(result_ref.clone()), prim_int.to_expr()),
            ],
            None,
        ),
        function(
            "int___unbox__",
            vec![boxed.clone()],
            Type::Int,
            vec![b.has_type(boxed.to_expr(), "int")],
            vec![Expr::implies(
                Expr::not(b.has_type(boxed.to_expr(), "bool")),
                Expr::eq(box_int(Expr::Result(Type::Int)), boxed.to_expr()),
            )],
            None,
        ),
        function(
            "__prim__bool___box__",
            vec![prim_bool.clone()],
            Type::Ref,
            vec![],
            vec![
                b.typeof_is(result_ref.clone(), "bool"),
                Expr::eq(unbox_bool(result_ref.clone()), prim_bool.to_expr()),
                Expr::eq(
                    unbox_int(result_ref),
                    Expr::cond(prim_bool.to_expr(), Expr::int(1), Expr::int(0)),
                ),
            ],
            None,
        ),
        function(
            "bool___unbox__",
            vec![boxed.clone()],
            Type::Bool,
            vec![b.has_type(boxed.to_expr(), "bool")],
            vec![Expr::eq(box_bool(Expr::Result(Type::Bool)), boxed.to_expr())],
            None,
        ),
    ]
}

fn object_and_int(b: &Builder) -> Vec<Declaration> {
    let this = var("self", Type::Ref);
    let other = var("other", Type::Ref);
    let both_int = Expr::and(b.has_type(this.to_expr(), "int"), b.has_type(other.to_expr(), "int"));
    let int_div = |name: &str, op: BinOp| {
        let this = var("self", Type::Int);
        let other = var("other", Type::Int);
        function(
            name,
            vec![this.clone(), other.clone()],
            Type::Int,
            vec![Expr::ne(other.to_expr(), Expr::int(0))],
            vec![],
            Some(Expr::binary(op, this.to_expr(), other.to_expr())),
        )
    };
    vec![
        function(
            "object___eq__",
            vec![this.clone(), other.clone()],
            Type::Bool,
            vec![],
            vec![
                Expr::implies(Expr::eq(this.to_expr(), other.to_expr()), Expr::Result(Type::Bool)),
                Expr::implies(
                    both_int,
                    Expr::eq(
                        Expr::Result(Type::Bool),
                        Expr::eq(unbox_int(this.to_expr()), unbox_int(other.to_expr())),
                    ),
                ),
            ],
            None,
        ),
        function(
            "object___bool__",
            vec![this.clone()],
            Type::Bool,
            vec![],
            vec![
                Expr::implies(Expr::eq(this.to_expr(), Expr::Null), Expr::not(Expr::Result(Type::Bool))),
                Expr::implies(
                    b.has_type(this.to_expr(), "int"),
                    Expr::eq(
                        Expr::Result(Type::Bool),
                        Expr::ne(unbox_int(this.to_expr()), Expr::int(0)),
                    ),
                ),
            ],
            None,
        ),
        int_div("int___floordiv__", BinOp::Div),
        int_div("int___mod__", BinOp::Mod),
    ]
}

fn list() -> Vec<Declaration> {
    let this = var("self", Type::Ref);
    let item = var("item", Type::Ref);
    let key = var("key", Type::Int);
    let res = var("_res", Type::Ref);
    let elems = Expr::field(this.to_expr(), list_acc());
    let full = |e: Expr| Expr::field_acc(e, list_acc(), Expr::FullPerm);
    let read = Expr::field_acc(this.to_expr(), list_acc(), Expr::WildcardPerm);
    let i = var("i", Type::Int);
    let elem_i = Expr::seq_index(elems.clone(), i.to_expr());

    let unchanged_except_key = Expr::forall(
        vec![i.clone()],
        vec![vec![elem_i.clone()]],
        Expr::implies(
            Expr::and(in_bounds(i.to_expr(), elems.clone()), Expr::ne(i.to_expr(), key.to_expr())),
            Expr::eq(elem_i, Expr::old(Expr::seq_index(elems.clone(), i.to_expr()))),
        ),
    );

    vec![
        method(
            "list___init__",
            vec![],
            vec![res.clone()],
            vec![],
            vec![
                full(res.to_expr()),
                Expr::eq(Expr::field(res.to_expr(), list_acc()), empty_refs()),
            ],
        ),
        method(
            "list_append",
            vec![this.clone(), item.clone()],
            vec![],
            vec![full(this.to_expr())],
            vec![
                full(this.to_expr()),
                Expr::eq(
                    elems.clone(),
                    Expr::binary(
                        BinOp::Append,
                        Expr::old(elems.clone()),
                        Expr::SeqLit {
                            elems: vec![item.to_expr()],
                            elem_type: Type::Ref,
                        },
                    ),
                ),
            ],
        ),
        method(
            "list___setitem__",
            vec![this.clone(), key.clone(), item.clone()],
            vec![],
            vec![full(this.to_expr()), in_bounds(key.to_expr(), elems.clone())],
            vec![
                full(this.to_expr()),
                Expr::eq(Expr::seq_len(elems.clone()), Expr::old(Expr::seq_len(elems.clone()))),
                Expr::eq(Expr::seq_index(elems.clone(), key.to_expr()), item.to_expr()),
                unchanged_except_key,
            ],
        ),
        function(
            "list___len__",
            vec![this.clone()],
            Type::Int,
            vec![read.clone()],
            vec![],
            Some(Expr::seq_len(elems.clone())),
        ),
        function(
            "list___getitem__",
            vec![this.clone(), key.clone()],
            Type::Ref,
            vec![read.clone(), in_bounds(key.to_expr(), elems.clone())],
            vec![],
            Some(Expr::seq_index(elems.clone(), key.to_expr())),
        ),
        function(
            "list___contains__",
            vec![this.clone(), item.clone()],
            Type::Bool,
            vec![read],
            vec![],
            Some(Expr::contains(item.to_expr(), elems.clone())),
        ),
        iter_method(
            "list___iter__",
            &this,
            vec![Expr::field_acc(this.to_expr(), list_acc(), Expr::fraction(1, 10))],
            vec![Expr::field_acc(this.to_expr(), list_acc(), Expr::fraction(1, 20))],
            elems,
        ),
    ]
}

/// `C___iter__`: a fresh iterator positioned before the first element of `elems`
fn iter_method(name: &str, this: &LocalVar, pres: Vec<Expr>, mut posts: Vec<Expr>, elems: Expr) -> Declaration {
    let res = var("_res", Type::Ref);
    let it = res.to_expr();
    let full = |f: FieldRef| Expr::field_acc(it.clone(), f, Expr::FullPerm);
    posts.extend([
        Expr::field_acc(it.clone(), list_acc(), Expr::fraction(1, 20)),
        Expr::eq(Expr::field(it.clone(), list_acc()), elems),
        full(container()),
        Expr::eq(Expr::field(it.clone(), container()), this.to_expr()),
        full(iter_index()),
        Expr::eq(Expr::field(it.clone(), iter_index()), Expr::int(0)),
        full(previous()),
        Expr::eq(Expr::field(it.clone(), previous()), empty_refs()),
    ]);
    method(name, vec![this.clone()], vec![res], pres, posts)
}

fn range(b: &Builder) -> Vec<Declaration> {
    let this = var("self", Type::Ref);
    let start = var("start", Type::Int);
    let stop = var("stop", Type::Int);
    let result = Expr::Result(Type::Ref);
    let seq_of = |e: Expr| Expr::func_app("range___sil_seq__", vec![e], Type::seq(Type::Ref));
    let seq = seq_of(result.clone());
    let i = var("i", Type::Int);
    let elem = Expr::seq_index(seq.clone(), i.to_expr());
    let span = Expr::binary(BinOp::Sub, stop.to_expr(), start.to_expr());
    let elements = Expr::forall(
        vec![i.clone()],
        vec![vec![elem.clone()]],
        Expr::implies(
            in_bounds(i.to_expr(), seq.clone()),
            Expr::and(
                b.typeof_is(elem.clone(), "int"),
                Expr::eq(unbox_int(elem), Expr::binary(BinOp::Add, start.to_expr(), i.to_expr())),
            ),
        ),
    );
    vec![
        function(
            "range___create__",
            vec![start.clone(), stop.clone()],
            Type::Ref,
            vec![],
            vec![
                b.typeof_is(result.clone(), "range"),
                Expr::eq(
                    Expr::seq_len(seq),
                    Expr::cond(le(start.to_expr(), stop.to_expr()), span, Expr::int(0)),
                ),
                elements,
            ],
            None,
        ),
        function(
            "range___sil_seq__",
            vec![this.clone()],
            Type::seq(Type::Ref),
            vec![],
            vec![],
            None,
        ),
        function(
            "range___len__",
            vec![this.clone()],
            Type::Int,
            vec![],
            vec![],
            Some(Expr::seq_len(seq_of(this.to_expr()))),
        ),
        iter_method("range___iter__", &this, vec![], vec![], seq_of(this.to_expr())),
    ]
}

fn iterator(b: &Builder) -> Vec<Declaration> {
    let this = var("self", Type::Ref);
    let res = var("_res", Type::Ref);
    let err = var("_err", Type::Ref);
    let me = this.to_expr();
    let elems = Expr::field(me.clone(), list_acc());
    let index = Expr::field(me.clone(), iter_index());
    let prev = Expr::field(me.clone(), previous());
    let old_index = Expr::old(index.clone());
    let full = |f: FieldRef| Expr::field_acc(me.clone(), f, Expr::FullPerm);
    let part = Expr::field_acc(me.clone(), list_acc(), Expr::fraction(1, 40));

    let success = Expr::conjoin(vec![
        Expr::eq(err.to_expr(), Expr::Null),
        Expr::eq(index.clone(), Expr::binary(BinOp::Add, old_index.clone(), Expr::int(1))),
        Expr::eq(res.to_expr(), Expr::seq_index(elems.clone(), old_index.clone())),
        Expr::eq(prev.clone(), Expr::seq_take(elems.clone(), old_index.clone())),
    ]);
    let failure = Expr::conjoin(vec![
        Expr::ne(err.to_expr(), Expr::Null),
        b.typeof_is(err.to_expr(), "StopIteration"),
        Expr::eq(index.clone(), old_index.clone()),
        Expr::eq(prev, elems.clone()),
    ]);
    let has_next = lt(old_index, Expr::seq_len(elems.clone()));

    // only list iterators borrowed from their container
    let old_container = Expr::old(Expr::field(me.clone(), container()));
    let release = Expr::implies(
        b.has_type(old_container.clone(), "list"),
        Expr::field_acc(old_container, list_acc(), Expr::fraction(1, 20)),
    );

    vec![
        method(
            "Iterator___next__",
            vec![this.clone()],
            vec![res.clone(), err.clone()],
            vec![part.clone(), full(iter_index()), full(previous())],
            vec![
                part,
                Expr::eq(elems.clone(), Expr::old(elems.clone())),
                full(iter_index()),
                full(previous()),
                Expr::implies(has_next.clone(), success),
                Expr::implies(Expr::not(has_next), failure),
            ],
        ),
        method(
            "Iterator___del__",
            vec![this.clone()],
            vec![],
            vec![
                Expr::field_acc(me.clone(), list_acc(), Expr::fraction(1, 20)),
                full(container()),
                full(iter_index()),
                full(previous()),
            ],
            vec![release],
        ),
    ]
}

fn strings(b: &Builder) -> Vec<Declaration> {
    let this = var("self", Type::Ref);
    let len = var("len", Type::Int);
    let value = var("value", Type::Int);
    let result = Expr::Result(Type::Ref);
    vec![
        function(
            "str___create__",
            vec![len.clone(), value.clone()],
            Type::Ref,
            vec![],
            vec![
                b.typeof_is(result.clone(), "str"),
                Expr::eq(
                    Expr::func_app("str___len__", vec![result.clone()], Type::Int),
                    len.to_expr(),
                ),
                Expr::eq(
                    Expr::func_app("str___val__", vec![result], Type::Int),
                    value.to_expr(),
                ),
            ],
            None,
        ),
        function(
            "str___len__",
            vec![this.clone()],
            Type::Int,
            vec![],
            vec![le(Expr::int(0), Expr::Result(Type::Int))],
            None,
        ),
        function("str___val__", vec![this], Type::Int, vec![], vec![], None),
    ]
}

fn tuples(types: &TypeDomainFactory) -> Vec<Declaration> {
    let this = var("self", Type::Ref);
    let key = var("key", Type::Int);
    let val = |e: Expr| Expr::func_app("tuple___val__", vec![e], Type::seq(Type::Ref));
    let mut decls = vec![
        function("tuple___val__", vec![this.clone()], Type::seq(Type::Ref), vec![], vec![], None),
        function(
            "tuple___len__",
            vec![this.clone()],
            Type::Int,
            vec![],
            vec![],
            Some(Expr::seq_len(val(this.to_expr()))),
        ),
        function(
            "tuple___getitem__",
            vec![this.clone(), key.clone()],
            Type::Ref,
            vec![in_bounds(key.to_expr(), val(this.to_expr()))],
            vec![],
            Some(Expr::seq_index(val(this.to_expr()), key.to_expr())),
        ),
    ];
    for arity in types.tuple_arities() {
        let elems = (0..*arity).map(|i| var(&format!("e{}", i), Type::Ref)).collect::<Vec<_>>();
        let elem_types = (0..*arity)
            .map(|i| var(&format!("t{}", i), TypeDomainFactory::pytype()))
            .collect::<Vec<_>>();
        let result = Expr::Result(Type::Ref);
        let tuple_type = Expr::domain_app(
            crate::TYPE_DOMAIN,
            "tuple",
            vec![Expr::SeqLit {
                elems: elem_types.iter().map(LocalVar::to_expr).collect(),
                elem_type: TypeDomainFactory::pytype(),
            }],
            TypeDomainFactory::pytype(),
        );
        let mut params = elems.clone();
        params.extend(elem_types);
        decls.push(function(
            &tuple_create_name(*arity),
            params,
            Type::Ref,
            vec![],
            vec![
                Expr::ne(result.clone(), Expr::Null),
                Expr::eq(TypeDomainFactory::r#typeof(result.clone()), tuple_type),
                Expr::eq(
                    val(result),
                    Expr::SeqLit {
                        elems: elems.iter().map(LocalVar::to_expr).collect(),
                        elem_type: Type::Ref,
                    },
                ),
            ],
            None,
        ));
    }
    decls
}

fn collections() -> Vec<Declaration> {
    let this = var("self", Type::Ref);
    let item = var("item", Type::Ref);
    let mut decls = vec![];
    for (class, acc) in [("set", set_acc()), ("dict", dict_acc())] {
        let read = Expr::field_acc(this.to_expr(), acc.clone(), Expr::WildcardPerm);
        decls.push(function(
            &format!("{}___len__", class),
            vec![this.clone()],
            Type::Int,
            vec![read.clone()],
            vec![le(Expr::int(0), Expr::Result(Type::Int))],
            None,
        ));
        decls.push(function(
            &format!("{}___contains__", class),
            vec![this.clone(), item.clone()],
            Type::Bool,
            vec![read],
            vec![],
            Some(Expr::contains(item.to_expr(), Expr::field(this.to_expr(), acc))),
        ));
    }
    decls
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_box_unbox_cancel() {
        let n = Expr::local("n", Type::Int);
        assert_eq!(unbox_int(box_int(n.clone())), n);
        let r = Expr::local("r", Type::Ref);
        assert_eq!(box_bool(unbox_bool(r.clone())), r);
        assert!(matches!(unbox_int(r), Expr::FuncApp { name, .. } if name == "int___unbox__"));
    }

    #[test]
    fn test_check_defined_follows_value_type() {
        let checked = check_defined(Expr::local("x", Type::Int), 7);
        assert_eq!(
            checked,
            Expr::func_app("_checkDefinedInt", vec![Expr::local("x", Type::Int), Expr::int(7)], Type::Int)
        );
    }

    #[test]
    fn test_source_names_cannot_take_prelude_names() {
        let program = program_model::SourceProgram::from_json(r#"{ "modules": [{ "name": "m", "body": [] }] }"#).unwrap();
        let model = program_model::analyze(&program, &program_model::InterfaceDecls::builtins().unwrap()).unwrap();
        let mut types = TypeDomainFactory::new();
        types.require_tuple_arity(2);
        types.require_tuple_arity(7);
        let registry = program_model::IdentifierRegistry::new();
        for decl in declarations(&model, &types) {
            assert!(registry.is_used(decl.name()), "`{}` is not reserved", decl.name());
        }
    }
}

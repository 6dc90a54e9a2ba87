// Copyright (c) Asymptotic Labs
// SPDX-License-Identifier: Apache-2.0

use crate::data::types::Type;

/// A typed local variable or parameter
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LocalVar {
    pub name: String,
    pub typ: Type,
}

impl LocalVar {
    pub fn new(name: impl Into<String>, typ: Type) -> Self {
        Self {
            name: name.into(),
            typ,
        }
    }

    pub fn to_expr(&self) -> Expr {
        Expr::Local(self.clone())
    }
}

/// Reference to a declared field
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FieldRef {
    pub name: String,
    pub typ: Type,
}

impl FieldRef {
    pub fn new(name: impl Into<String>, typ: Type) -> Self {
        Self {
            name: name.into(),
            typ,
        }
    }
}

/// Binary operations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinOp {
    Add, Sub, Mul, Div, Mod,
    Eq, Ne, Lt, Le, Gt, Ge,
    And, Or, Implies,
    /// Sequence concatenation `++`
    Append,
    /// Permission fraction `a / b`
    PermDiv,
}

impl BinOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "\\",
            BinOp::Mod => "%",
            BinOp::Eq => "==",
            BinOp::Ne => "!=",
            BinOp::Lt => "<",
            BinOp::Le => "<=",
            BinOp::Gt => ">",
            BinOp::Ge => ">=",
            BinOp::And => "&&",
            BinOp::Or => "||",
            BinOp::Implies => "==>",
            BinOp::Append => "++",
            BinOp::PermDiv => "/",
        }
    }

    /// Whether the result of the operation is a boolean
    pub fn is_boolean(&self) -> bool {
        matches!(
            self,
            BinOp::Eq
                | BinOp::Ne
                | BinOp::Lt
                | BinOp::Le
                | BinOp::Gt
                | BinOp::Ge
                | BinOp::And
                | BinOp::Or
                | BinOp::Implies
        )
    }
}

/// Unary operations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnOp {
    Not,
    Neg,
}

/// IR expression
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Expr {
    IntLit(i64),
    BoolLit(bool),
    Null,

    /// Local variable or parameter
    Local(LocalVar),

    /// `result` inside a function postcondition
    Result(Type),

    /// Field read `receiver.field`
    Field {
        receiver: Box<Expr>,
        field: FieldRef,
    },

    /// Application of a (non-domain) function
    FuncApp {
        name: String,
        args: Vec<Expr>,
        typ: Type,
    },

    /// Application of a domain function
    DomainFuncApp {
        domain: String,
        name: String,
        args: Vec<Expr>,
        typ: Type,
    },

    Binary {
        op: BinOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },

    Unary {
        op: UnOp,
        operand: Box<Expr>,
    },

    /// `cond ? then : els`
    Cond {
        cond: Box<Expr>,
        then: Box<Expr>,
        els: Box<Expr>,
    },

    Old(Box<Expr>),

    /// `old[label](expr)`
    LabelledOld {
        label: String,
        expr: Box<Expr>,
    },

    Forall {
        vars: Vec<LocalVar>,
        triggers: Vec<Vec<Expr>>,
        body: Box<Expr>,
    },

    Exists {
        vars: Vec<LocalVar>,
        triggers: Vec<Vec<Expr>>,
        body: Box<Expr>,
    },

    /// `acc(receiver.field, perm)`
    FieldAcc {
        receiver: Box<Expr>,
        field: FieldRef,
        perm: Box<Expr>,
    },

    /// `acc(name(args), perm)`
    PredicateAcc {
        name: String,
        args: Vec<Expr>,
        perm: Box<Expr>,
    },

    FullPerm,
    NoPerm,
    WildcardPerm,

    /// `unfolding acc(pred, perm) in body`
    Unfolding {
        predicate: Box<Expr>,
        body: Box<Expr>,
    },

    /// `let var == (value) in body`
    Let {
        var: LocalVar,
        value: Box<Expr>,
        body: Box<Expr>,
    },

    /// Explicit sequence; empty sequences render with their element type
    SeqLit {
        elems: Vec<Expr>,
        elem_type: Type,
    },

    SeqLength(Box<Expr>),
    SeqIndex(Box<Expr>, Box<Expr>),
    SeqTake(Box<Expr>, Box<Expr>),
    SeqDrop(Box<Expr>, Box<Expr>),

    /// Integer range sequence `[from..to)`
    SeqRange(Box<Expr>, Box<Expr>),

    /// Explicit set
    SetLit {
        elems: Vec<Expr>,
        elem_type: Type,
    },

    /// Membership `elem in collection`
    Contains {
        elem: Box<Expr>,
        collection: Box<Expr>,
    },
}

impl Default for Expr {
    fn default() -> Self {
        Expr::BoolLit(true)
    }
}

// ============================================================================
// Construction helpers
// ============================================================================

impl Expr {
    pub fn local(name: impl Into<String>, typ: Type) -> Self {
        Expr::Local(LocalVar::new(name, typ))
    }

    pub fn int(value: i64) -> Self {
        Expr::IntLit(value)
    }

    pub fn tt() -> Self {
        Expr::BoolLit(true)
    }

    pub fn ff() -> Self {
        Expr::BoolLit(false)
    }

    pub fn binary(op: BinOp, lhs: Expr, rhs: Expr) -> Self {
        Expr::Binary {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        }
    }

    pub fn eq(lhs: Expr, rhs: Expr) -> Self {
        Self::binary(BinOp::Eq, lhs, rhs)
    }

    pub fn ne(lhs: Expr, rhs: Expr) -> Self {
        Self::binary(BinOp::Ne, lhs, rhs)
    }

    /// Conjunction, dropping literal `true` operands
    pub fn and(lhs: Expr, rhs: Expr) -> Self {
        match (&lhs, &rhs) {
            (Expr::BoolLit(true), _) => rhs,
            (_, Expr::BoolLit(true)) => lhs,
            _ => Self::binary(BinOp::And, lhs, rhs),
        }
    }

    /// Disjunction, dropping literal `false` operands
    pub fn or(lhs: Expr, rhs: Expr) -> Self {
        match (&lhs, &rhs) {
            (Expr::BoolLit(false), _) => rhs,
            (_, Expr::BoolLit(false)) => lhs,
            _ => Self::binary(BinOp::Or, lhs, rhs),
        }
    }

    pub fn implies(lhs: Expr, rhs: Expr) -> Self {
        match lhs {
            Expr::BoolLit(true) => rhs,
            _ => Self::binary(BinOp::Implies, lhs, rhs),
        }
    }

    pub fn not(operand: Expr) -> Self {
        match operand {
            Expr::BoolLit(b) => Expr::BoolLit(!b),
            Expr::Unary {
                op: UnOp::Not,
                operand,
            } => *operand,
            _ => Expr::Unary {
                op: UnOp::Not,
                operand: Box::new(operand),
            },
        }
    }

    pub fn conjoin(items: impl IntoIterator<Item = Expr>) -> Self {
        items.into_iter().fold(Expr::tt(), Expr::and)
    }

    pub fn disjoin(items: impl IntoIterator<Item = Expr>) -> Self {
        items.into_iter().fold(Expr::ff(), Expr::or)
    }

    pub fn cond(cond: Expr, then: Expr, els: Expr) -> Self {
        Expr::Cond {
            cond: Box::new(cond),
            then: Box::new(then),
            els: Box::new(els),
        }
    }

    pub fn func_app(name: impl Into<String>, args: Vec<Expr>, typ: Type) -> Self {
        Expr::FuncApp {
            name: name.into(),
            args,
            typ,
        }
    }

    pub fn domain_app(
        domain: impl Into<String>,
        name: impl Into<String>,
        args: Vec<Expr>,
        typ: Type,
    ) -> Self {
        Expr::DomainFuncApp {
            domain: domain.into(),
            name: name.into(),
            args,
            typ,
        }
    }

    pub fn field(receiver: Expr, field: FieldRef) -> Self {
        Expr::Field {
            receiver: Box::new(receiver),
            field,
        }
    }

    pub fn field_acc(receiver: Expr, field: FieldRef, perm: Expr) -> Self {
        Expr::FieldAcc {
            receiver: Box::new(receiver),
            field,
            perm: Box::new(perm),
        }
    }

    pub fn predicate_acc(name: impl Into<String>, args: Vec<Expr>, perm: Expr) -> Self {
        Expr::PredicateAcc {
            name: name.into(),
            args,
            perm: Box::new(perm),
        }
    }

    /// Fractional permission `num / den`
    pub fn fraction(num: i64, den: i64) -> Self {
        Self::binary(BinOp::PermDiv, Expr::IntLit(num), Expr::IntLit(den))
    }

    pub fn old(expr: Expr) -> Self {
        Expr::Old(Box::new(expr))
    }

    pub fn forall(vars: Vec<LocalVar>, triggers: Vec<Vec<Expr>>, body: Expr) -> Self {
        Expr::Forall {
            vars,
            triggers,
            body: Box::new(body),
        }
    }

    pub fn exists(vars: Vec<LocalVar>, triggers: Vec<Vec<Expr>>, body: Expr) -> Self {
        Expr::Exists {
            vars,
            triggers,
            body: Box::new(body),
        }
    }

    pub fn seq_len(seq: Expr) -> Self {
        Expr::SeqLength(Box::new(seq))
    }

    pub fn seq_index(seq: Expr, index: Expr) -> Self {
        Expr::SeqIndex(Box::new(seq), Box::new(index))
    }

    pub fn seq_take(seq: Expr, count: Expr) -> Self {
        Expr::SeqTake(Box::new(seq), Box::new(count))
    }

    pub fn seq_drop(seq: Expr, count: Expr) -> Self {
        Expr::SeqDrop(Box::new(seq), Box::new(count))
    }

    pub fn contains(elem: Expr, collection: Expr) -> Self {
        Expr::Contains {
            elem: Box::new(elem),
            collection: Box::new(collection),
        }
    }

    pub fn is_true(&self) -> bool {
        matches!(self, Expr::BoolLit(true))
    }

    /// Whether this expression is a permission-carrying assertion (or contains one)
    pub fn is_impure(&self) -> bool {
        let mut impure = false;
        self.visit(&mut |e| {
            if matches!(e, Expr::FieldAcc { .. } | Expr::PredicateAcc { .. }) {
                impure = true;
            }
        });
        impure
    }

    /// Best-effort static type of the expression
    pub fn typ(&self) -> Type {
        match self {
            Expr::IntLit(_) | Expr::SeqLength(_) => Type::Int,
            Expr::BoolLit(_)
            | Expr::Forall { .. }
            | Expr::Exists { .. }
            | Expr::FieldAcc { .. }
            | Expr::PredicateAcc { .. }
            | Expr::Contains { .. } => Type::Bool,
            Expr::Unary { op: UnOp::Not, .. } => Type::Bool,
            Expr::Unary { op: UnOp::Neg, .. } => Type::Int,
            Expr::Null => Type::Ref,
            Expr::Local(var) => var.typ.clone(),
            Expr::Result(typ)
            | Expr::FuncApp { typ, .. }
            | Expr::DomainFuncApp { typ, .. } => typ.clone(),
            Expr::Field { field, .. } => field.typ.clone(),
            Expr::Binary { op, lhs, .. } => match op {
                BinOp::PermDiv => Type::Perm,
                op if op.is_boolean() => Type::Bool,
                _ => lhs.typ(),
            },
            Expr::Cond { then, .. } => then.typ(),
            Expr::Old(inner) | Expr::LabelledOld { expr: inner, .. } => inner.typ(),
            Expr::FullPerm | Expr::NoPerm | Expr::WildcardPerm => Type::Perm,
            Expr::Unfolding { body, .. } | Expr::Let { body, .. } => body.typ(),
            Expr::SeqLit { elem_type, .. } => Type::seq(elem_type.clone()),
            Expr::SetLit { elem_type, .. } => Type::set(elem_type.clone()),
            Expr::SeqIndex(seq, _) => seq.typ().element().cloned().unwrap_or(Type::Ref),
            Expr::SeqTake(seq, _) | Expr::SeqDrop(seq, _) => seq.typ(),
            Expr::SeqRange(..) => Type::seq(Type::Int),
        }
    }

    /// Pre-order traversal over this expression and all subexpressions
    pub fn visit(&self, f: &mut impl FnMut(&Expr)) {
        f(self);
        match self {
            Expr::IntLit(_)
            | Expr::BoolLit(_)
            | Expr::Null
            | Expr::Local(_)
            | Expr::Result(_)
            | Expr::FullPerm
            | Expr::NoPerm
            | Expr::WildcardPerm => {}
            Expr::Field { receiver, .. } => receiver.visit(f),
            Expr::FuncApp { args, .. } | Expr::DomainFuncApp { args, .. } => {
                args.iter().for_each(|a| a.visit(f))
            }
            Expr::Binary { lhs, rhs, .. } => {
                lhs.visit(f);
                rhs.visit(f);
            }
            Expr::Unary { operand, .. } => operand.visit(f),
            Expr::Cond { cond, then, els } => {
                cond.visit(f);
                then.visit(f);
                els.visit(f);
            }
            Expr::Old(inner) | Expr::LabelledOld { expr: inner, .. } => inner.visit(f),
            Expr::Forall { triggers, body, .. } | Expr::Exists { triggers, body, .. } => {
                triggers.iter().flatten().for_each(|t| t.visit(f));
                body.visit(f);
            }
            Expr::FieldAcc { receiver, perm, .. } => {
                receiver.visit(f);
                perm.visit(f);
            }
            Expr::PredicateAcc { args, perm, .. } => {
                args.iter().for_each(|a| a.visit(f));
                perm.visit(f);
            }
            Expr::Unfolding { predicate, body } => {
                predicate.visit(f);
                body.visit(f);
            }
            Expr::Let { value, body, .. } => {
                value.visit(f);
                body.visit(f);
            }
            Expr::SeqLit { elems, .. } | Expr::SetLit { elems, .. } => {
                elems.iter().for_each(|e| e.visit(f))
            }
            Expr::SeqLength(inner) => inner.visit(f),
            Expr::SeqIndex(a, b)
            | Expr::SeqTake(a, b)
            | Expr::SeqDrop(a, b)
            | Expr::SeqRange(a, b) => {
                a.visit(f);
                b.visit(f);
            }
            Expr::Contains { elem, collection } => {
                elem.visit(f);
                collection.visit(f);
            }
        }
    }

    /// Rebuild the expression bottom-up, replacing each node by `f(node)`
    pub fn transform(self, f: &mut impl FnMut(Expr) -> Expr) -> Expr {
        let rebuilt = match self {
            Expr::Field { receiver, field } => Expr::Field {
                receiver: Box::new(receiver.transform(f)),
                field,
            },
            Expr::FuncApp { name, args, typ } => Expr::FuncApp {
                name,
                args: args.into_iter().map(|a| a.transform(f)).collect(),
                typ,
            },
            Expr::DomainFuncApp {
                domain,
                name,
                args,
                typ,
            } => Expr::DomainFuncApp {
                domain,
                name,
                args: args.into_iter().map(|a| a.transform(f)).collect(),
                typ,
            },
            Expr::Binary { op, lhs, rhs } => Expr::Binary {
                op,
                lhs: Box::new(lhs.transform(f)),
                rhs: Box::new(rhs.transform(f)),
            },
            Expr::Unary { op, operand } => Expr::Unary {
                op,
                operand: Box::new(operand.transform(f)),
            },
            Expr::Cond { cond, then, els } => Expr::Cond {
                cond: Box::new(cond.transform(f)),
                then: Box::new(then.transform(f)),
                els: Box::new(els.transform(f)),
            },
            Expr::Old(inner) => Expr::Old(Box::new(inner.transform(f))),
            Expr::LabelledOld { label, expr } => Expr::LabelledOld {
                label,
                expr: Box::new(expr.transform(f)),
            },
            Expr::Forall {
                vars,
                triggers,
                body,
            } => Expr::Forall {
                vars,
                triggers: transform_triggers(triggers, f),
                body: Box::new(body.transform(f)),
            },
            Expr::Exists {
                vars,
                triggers,
                body,
            } => Expr::Exists {
                vars,
                triggers: transform_triggers(triggers, f),
                body: Box::new(body.transform(f)),
            },
            Expr::FieldAcc {
                receiver,
                field,
                perm,
            } => Expr::FieldAcc {
                receiver: Box::new(receiver.transform(f)),
                field,
                perm: Box::new(perm.transform(f)),
            },
            Expr::PredicateAcc { name, args, perm } => Expr::PredicateAcc {
                name,
                args: args.into_iter().map(|a| a.transform(f)).collect(),
                perm: Box::new(perm.transform(f)),
            },
            Expr::Unfolding { predicate, body } => Expr::Unfolding {
                predicate: Box::new(predicate.transform(f)),
                body: Box::new(body.transform(f)),
            },
            Expr::Let { var, value, body } => Expr::Let {
                var,
                value: Box::new(value.transform(f)),
                body: Box::new(body.transform(f)),
            },
            Expr::SeqLit { elems, elem_type } => Expr::SeqLit {
                elems: elems.into_iter().map(|e| e.transform(f)).collect(),
                elem_type,
            },
            Expr::SetLit { elems, elem_type } => Expr::SetLit {
                elems: elems.into_iter().map(|e| e.transform(f)).collect(),
                elem_type,
            },
            Expr::SeqLength(inner) => Expr::SeqLength(Box::new(inner.transform(f))),
            Expr::SeqIndex(a, b) => Expr::SeqIndex(Box::new(a.transform(f)), Box::new(b.transform(f))),
            Expr::SeqTake(a, b) => Expr::SeqTake(Box::new(a.transform(f)), Box::new(b.transform(f))),
            Expr::SeqDrop(a, b) => Expr::SeqDrop(Box::new(a.transform(f)), Box::new(b.transform(f))),
            Expr::SeqRange(a, b) => Expr::SeqRange(Box::new(a.transform(f)), Box::new(b.transform(f))),
            Expr::Contains { elem, collection } => Expr::Contains {
                elem: Box::new(elem.transform(f)),
                collection: Box::new(collection.transform(f)),
            },
            leaf => leaf,
        };
        f(rebuilt)
    }

    /// Replace local variables by name
    pub fn substitute(self, replace: &impl Fn(&LocalVar) -> Option<Expr>) -> Expr {
        self.transform(&mut |e| match &e {
            Expr::Local(var) => replace(var).unwrap_or(e),
            _ => e,
        })
    }

    /// Names of declarations referenced by this expression
    pub fn referenced_names(&self, out: &mut Vec<String>) {
        self.visit(&mut |e| e.own_names(out));
    }

    /// Names referenced by this node alone, not its subexpressions
    pub fn own_names(&self, out: &mut Vec<String>) {
        match self {
            Expr::FuncApp { name, .. } | Expr::PredicateAcc { name, .. } => out.push(name.clone()),
            Expr::DomainFuncApp { domain, .. } => out.push(domain.clone()),
            Expr::Field { field, .. } | Expr::FieldAcc { field, .. } => out.push(field.name.clone()),
            Expr::Local(var) => out.extend(var.typ.domain_names().into_iter().map(String::from)),
            Expr::Forall { vars, .. } | Expr::Exists { vars, .. } => out.extend(
                vars.iter()
                    .flat_map(|v| v.typ.domain_names())
                    .map(String::from),
            ),
            _ => {}
        }
    }
}

fn transform_triggers(triggers: Vec<Vec<Expr>>, f: &mut impl FnMut(Expr) -> Expr) -> Vec<Vec<Expr>> {
    triggers
        .into_iter()
        .map(|t| t.into_iter().map(|e| e.transform(f)).collect())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conjoin_drops_true() {
        let a = Expr::local("a", Type::Bool);
        let b = Expr::local("b", Type::Bool);
        let conj = Expr::conjoin(vec![Expr::tt(), a.clone(), Expr::tt(), b.clone()]);
        assert_eq!(conj, Expr::binary(BinOp::And, a, b));
        assert_eq!(Expr::conjoin(vec![]), Expr::tt());
    }

    #[test]
    fn test_double_negation_cancels() {
        let a = Expr::local("a", Type::Bool);
        assert_eq!(Expr::not(Expr::not(a.clone())), a);
    }

    #[test]
    fn test_substitute_replaces_locals() {
        let x = Expr::local("x", Type::Ref);
        let e = Expr::eq(x, Expr::Null);
        let replaced = e.substitute(&|v| (v.name == "x").then(|| Expr::local("y", Type::Ref)));
        assert_eq!(replaced, Expr::eq(Expr::local("y", Type::Ref), Expr::Null));
    }

    #[test]
    fn test_referenced_names() {
        let e = Expr::and(
            Expr::func_app("f", vec![Expr::local("t", Type::domain("PyType"))], Type::Bool),
            Expr::field_acc(Expr::local("r", Type::Ref), FieldRef::new("list_acc", Type::seq(Type::Ref)), Expr::FullPerm),
        );
        let mut names = vec![];
        e.referenced_names(&mut names);
        assert_eq!(names, vec!["f", "PyType", "list_acc"]);
    }
}

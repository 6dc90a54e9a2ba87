// Copyright (c) Asymptotic Labs
// SPDX-License-Identifier: Apache-2.0

//! Syntax tree handed over by the external parser.
//!
//! The tree is read from JSON; every node is an object whose `kind` field names
//! the node type, with optional 1-based `line`/`col` fields. Statement nodes get a
//! numeric id after loading so that later passes can key side tables by node.

use crate::type_table::TypeTable;
use serde::{Deserialize, Serialize};

pub type NodeId = usize;

/// Everything the parser and type inferencer produce for one compilation
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SourceProgram {
    pub modules: Vec<SourceModule>,
    #[serde(default)]
    pub types: TypeTable,
}

impl SourceProgram {
    pub fn from_json(text: &str) -> serde_json::Result<Self> {
        let mut program: SourceProgram = serde_json::from_str(text)?;
        program.number_nodes();
        Ok(program)
    }

    /// Assign statement ids in traversal order
    pub fn number_nodes(&mut self) {
        let mut next = 1;
        for module in &mut self.modules {
            number_block(&mut module.body, &mut next);
        }
    }
}

fn number_block(stmts: &mut [Stmt], next: &mut NodeId) {
    for stmt in stmts {
        stmt.id = *next;
        *next += 1;
        for block in stmt.kind.blocks_mut() {
            number_block(block, next);
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SourceModule {
    /// Dotted module name
    pub name: String,
    #[serde(default)]
    pub path: String,
    pub body: Vec<Stmt>,
    /// Source text, used for diagnostics only
    #[serde(default)]
    pub source: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Stmt {
    #[serde(flatten)]
    pub kind: StmtKind,
    #[serde(default)]
    pub line: usize,
    #[serde(default)]
    pub col: usize,
    #[serde(skip)]
    pub id: NodeId,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(tag = "kind")]
pub enum StmtKind {
    FunctionDef {
        name: String,
        #[serde(default)]
        args: Arguments,
        body: Vec<Stmt>,
        #[serde(default)]
        decorators: Vec<Expr>,
        #[serde(default)]
        returns: Option<Expr>,
    },
    ClassDef {
        name: String,
        #[serde(default)]
        bases: Vec<Expr>,
        body: Vec<Stmt>,
        #[serde(default)]
        decorators: Vec<Expr>,
    },
    Assign {
        targets: Vec<Expr>,
        value: Expr,
    },
    AnnAssign {
        target: Expr,
        annotation: Expr,
        #[serde(default)]
        value: Option<Expr>,
    },
    AugAssign {
        target: Expr,
        op: Operator,
        value: Expr,
    },
    Expr {
        value: Expr,
    },
    If {
        test: Expr,
        body: Vec<Stmt>,
        #[serde(default)]
        orelse: Vec<Stmt>,
    },
    While {
        test: Expr,
        body: Vec<Stmt>,
        #[serde(default)]
        orelse: Vec<Stmt>,
    },
    For {
        target: Expr,
        iter: Expr,
        body: Vec<Stmt>,
        #[serde(default)]
        orelse: Vec<Stmt>,
    },
    Try {
        body: Vec<Stmt>,
        #[serde(default)]
        handlers: Vec<ExceptHandler>,
        #[serde(default)]
        orelse: Vec<Stmt>,
        #[serde(default)]
        finalbody: Vec<Stmt>,
    },
    With {
        items: Vec<WithItem>,
        body: Vec<Stmt>,
    },
    Raise {
        #[serde(default)]
        exc: Option<Expr>,
    },
    Return {
        #[serde(default)]
        value: Option<Expr>,
    },
    Break,
    Continue,
    Pass,
    Assert {
        test: Expr,
        #[serde(default)]
        msg: Option<Expr>,
    },
    ImportFrom {
        module: String,
        names: Vec<Alias>,
    },
    Import {
        names: Vec<Alias>,
    },
    Global {
        names: Vec<String>,
    },
}

impl StmtKind {
    /// Nested statement blocks, in source order
    pub fn blocks(&self) -> Vec<&Vec<Stmt>> {
        match self {
            StmtKind::FunctionDef { body, .. }
            | StmtKind::ClassDef { body, .. }
            | StmtKind::With { body, .. } => vec![body],
            StmtKind::If { body, orelse, .. }
            | StmtKind::While { body, orelse, .. }
            | StmtKind::For { body, orelse, .. } => vec![body, orelse],
            StmtKind::Try {
                body,
                handlers,
                orelse,
                finalbody,
            } => {
                let mut blocks = vec![body];
                blocks.extend(handlers.iter().map(|h| &h.body));
                blocks.push(orelse);
                blocks.push(finalbody);
                blocks
            }
            _ => vec![],
        }
    }

    fn blocks_mut(&mut self) -> Vec<&mut Vec<Stmt>> {
        match self {
            StmtKind::FunctionDef { body, .. }
            | StmtKind::ClassDef { body, .. }
            | StmtKind::With { body, .. } => vec![body],
            StmtKind::If { body, orelse, .. }
            | StmtKind::While { body, orelse, .. }
            | StmtKind::For { body, orelse, .. } => vec![body, orelse],
            StmtKind::Try {
                body,
                handlers,
                orelse,
                finalbody,
            } => {
                let mut blocks = vec![body];
                blocks.extend(handlers.iter_mut().map(|h| &mut h.body));
                blocks.push(orelse);
                blocks.push(finalbody);
                blocks
            }
            _ => vec![],
        }
    }
}

impl Stmt {
    /// Pre-order walk over this statement and every nested statement,
    /// not descending into nested function or class definitions
    pub fn walk<'a>(&'a self, f: &mut impl FnMut(&'a Stmt)) {
        f(self);
        if matches!(self.kind, StmtKind::FunctionDef { .. } | StmtKind::ClassDef { .. }) {
            return;
        }
        for block in self.kind.blocks() {
            for stmt in block {
                stmt.walk(f);
            }
        }
    }

    /// The call expression if this statement is a bare call `f(...)`
    pub fn as_call(&self) -> Option<(&str, &[Expr])> {
        match &self.kind {
            StmtKind::Expr { value } => value.as_named_call(),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Arguments {
    #[serde(default)]
    pub args: Vec<Arg>,
    /// Default values, aligned with the last arguments
    #[serde(default)]
    pub defaults: Vec<Expr>,
    #[serde(default)]
    pub vararg: Option<Arg>,
    #[serde(default)]
    pub kwarg: Option<Arg>,
}

impl Arguments {
    /// Default value of the argument at `index`, if any
    pub fn default_for(&self, index: usize) -> Option<&Expr> {
        let first_with_default = self.args.len().checked_sub(self.defaults.len())?;
        index
            .checked_sub(first_with_default)
            .and_then(|i| self.defaults.get(i))
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Arg {
    pub name: String,
    #[serde(default)]
    pub annotation: Option<Expr>,
    #[serde(default)]
    pub line: usize,
    #[serde(default)]
    pub col: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ExceptHandler {
    #[serde(default, rename = "type")]
    pub typ: Option<Expr>,
    #[serde(default)]
    pub name: Option<String>,
    pub body: Vec<Stmt>,
    #[serde(default)]
    pub line: usize,
    #[serde(default)]
    pub col: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WithItem {
    pub context_expr: Expr,
    #[serde(default)]
    pub optional_vars: Option<Expr>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Alias {
    pub name: String,
    #[serde(default)]
    pub asname: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Keyword {
    /// `None` for `**kwargs` splats
    #[serde(default)]
    pub arg: Option<String>,
    pub value: Expr,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Expr {
    #[serde(flatten)]
    pub kind: ExprKind,
    #[serde(default)]
    pub line: usize,
    #[serde(default)]
    pub col: usize,
}

/// Expressions compare structurally; positions are ignored
impl PartialEq for Expr {
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(tag = "kind")]
pub enum ExprKind {
    Name {
        id: String,
    },
    Int {
        value: i64,
    },
    Bool {
        value: bool,
    },
    Str {
        value: String,
    },
    #[serde(rename = "None")]
    NoneLit,
    Attribute {
        value: Box<Expr>,
        attr: String,
    },
    Call {
        func: Box<Expr>,
        #[serde(default)]
        args: Vec<Expr>,
        #[serde(default)]
        keywords: Vec<Keyword>,
    },
    BinOp {
        left: Box<Expr>,
        op: Operator,
        right: Box<Expr>,
    },
    UnaryOp {
        op: UnaryOperator,
        operand: Box<Expr>,
    },
    BoolOp {
        op: BoolOperator,
        values: Vec<Expr>,
    },
    Compare {
        left: Box<Expr>,
        ops: Vec<CmpOp>,
        comparators: Vec<Expr>,
    },
    IfExp {
        test: Box<Expr>,
        body: Box<Expr>,
        orelse: Box<Expr>,
    },
    List {
        elts: Vec<Expr>,
    },
    Tuple {
        elts: Vec<Expr>,
    },
    Set {
        elts: Vec<Expr>,
    },
    Dict {
        keys: Vec<Expr>,
        values: Vec<Expr>,
    },
    Subscript {
        value: Box<Expr>,
        slice: Box<Expr>,
    },
    Slice {
        #[serde(default)]
        lower: Option<Box<Expr>>,
        #[serde(default)]
        upper: Option<Box<Expr>>,
        #[serde(default)]
        step: Option<Box<Expr>>,
    },
    Starred {
        value: Box<Expr>,
    },
    Lambda {
        args: Vec<String>,
        body: Box<Expr>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub enum Operator {
    Add,
    Sub,
    Mult,
    Div,
    FloorDiv,
    Mod,
    BitAnd,
    BitOr,
    BitXor,
}

impl Operator {
    /// Name of the dunder method implementing the operator
    pub fn magic_name(&self) -> &'static str {
        match self {
            Operator::Add => "__add__",
            Operator::Sub => "__sub__",
            Operator::Mult => "__mul__",
            Operator::Div => "__truediv__",
            Operator::FloorDiv => "__floordiv__",
            Operator::Mod => "__mod__",
            Operator::BitAnd => "__and__",
            Operator::BitOr => "__or__",
            Operator::BitXor => "__xor__",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub enum UnaryOperator {
    Not,
    USub,
    UAdd,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub enum BoolOperator {
    And,
    Or,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub enum CmpOp {
    Eq,
    NotEq,
    Lt,
    LtE,
    Gt,
    GtE,
    Is,
    IsNot,
    In,
    NotIn,
}

impl CmpOp {
    pub fn magic_name(&self) -> &'static str {
        match self {
            CmpOp::Eq | CmpOp::Is => "__eq__",
            CmpOp::NotEq | CmpOp::IsNot => "__ne__",
            CmpOp::Lt => "__lt__",
            CmpOp::LtE => "__le__",
            CmpOp::Gt => "__gt__",
            CmpOp::GtE => "__ge__",
            CmpOp::In | CmpOp::NotIn => "__contains__",
        }
    }
}

impl Expr {
    pub fn new(kind: ExprKind, line: usize, col: usize) -> Self {
        Self { kind, line, col }
    }

    pub fn name(id: &str) -> Self {
        Self::new(ExprKind::Name { id: id.to_string() }, 0, 0)
    }

    pub fn as_name(&self) -> Option<&str> {
        match &self.kind {
            ExprKind::Name { id } => Some(id),
            _ => None,
        }
    }

    /// `(callee name, args)` for a call whose callee is a plain name
    pub fn as_named_call(&self) -> Option<(&str, &[Expr])> {
        match &self.kind {
            ExprKind::Call { func, args, .. } => func.as_name().map(|n| (n, args.as_slice())),
            _ => None,
        }
    }

    /// Dotted rendering of a name or attribute chain (`a.b.c`)
    pub fn dotted_name(&self) -> Option<String> {
        match &self.kind {
            ExprKind::Name { id } => Some(id.clone()),
            ExprKind::Attribute { value, attr } => {
                value.dotted_name().map(|prefix| format!("{}.{}", prefix, attr))
            }
            _ => None,
        }
    }

    /// Immediate subexpressions in evaluation order
    pub fn children(&self) -> Vec<&Expr> {
        match &self.kind {
            ExprKind::Name { .. }
            | ExprKind::Int { .. }
            | ExprKind::Bool { .. }
            | ExprKind::Str { .. }
            | ExprKind::NoneLit => vec![],
            ExprKind::Attribute { value, .. } | ExprKind::Starred { value } => vec![value],
            ExprKind::Call {
                func,
                args,
                keywords,
            } => {
                let mut children = vec![func.as_ref()];
                children.extend(args.iter());
                children.extend(keywords.iter().map(|k| &k.value));
                children
            }
            ExprKind::BinOp { left, right, .. } => vec![left, right],
            ExprKind::UnaryOp { operand, .. } => vec![operand],
            ExprKind::BoolOp { values, .. }
            | ExprKind::List { elts: values }
            | ExprKind::Tuple { elts: values }
            | ExprKind::Set { elts: values } => values.iter().collect(),
            ExprKind::Compare {
                left, comparators, ..
            } => std::iter::once(left.as_ref()).chain(comparators.iter()).collect(),
            ExprKind::IfExp { test, body, orelse } => vec![test, body, orelse],
            ExprKind::Dict { keys, values } => keys.iter().chain(values.iter()).collect(),
            ExprKind::Subscript { value, slice } => vec![value, slice],
            ExprKind::Slice { lower, upper, step } => [lower, upper, step]
                .into_iter()
                .flatten()
                .map(|b| b.as_ref())
                .collect(),
            ExprKind::Lambda { body, .. } => vec![body],
        }
    }

    /// Pre-order walk over this expression and all subexpressions
    pub fn walk<'a>(&'a self, f: &mut impl FnMut(&'a Expr)) {
        f(self);
        for child in self.children() {
            child.walk(f);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_number_nodes() {
        let json = r#"{
            "modules": [{
                "name": "m",
                "body": [
                    {"kind": "FunctionDef", "name": "f", "line": 1, "body": [
                        {"kind": "While", "test": {"kind": "Bool", "value": true}, "body": [
                            {"kind": "Break"}
                        ]},
                        {"kind": "Return", "value": {"kind": "None"}}
                    ]}
                ]
            }]
        }"#;
        let program = SourceProgram::from_json(json).unwrap();
        let func = &program.modules[0].body[0];
        assert_eq!(func.id, 1);
        let StmtKind::FunctionDef { body, .. } = &func.kind else {
            panic!("expected function")
        };
        assert_eq!(body[0].id, 2);
        assert!(matches!(body[0].kind, StmtKind::While { .. }));
        let StmtKind::While { body: loop_body, .. } = &body[0].kind else {
            unreachable!()
        };
        assert_eq!(loop_body[0].id, 3);
        assert_eq!(body[1].id, 4);
    }

    #[test]
    fn test_default_alignment() {
        let args = Arguments {
            args: ["a", "b", "c"]
                .iter()
                .map(|n| Arg {
                    name: n.to_string(),
                    annotation: None,
                    line: 0,
                    col: 0,
                })
                .collect(),
            defaults: vec![Expr::new(ExprKind::Int { value: 3 }, 0, 0)],
            vararg: None,
            kwarg: None,
        };
        assert!(args.default_for(0).is_none());
        assert!(args.default_for(1).is_none());
        assert!(matches!(
            args.default_for(2).map(|e| &e.kind),
            Some(ExprKind::Int { value: 3 })
        ));
    }
}

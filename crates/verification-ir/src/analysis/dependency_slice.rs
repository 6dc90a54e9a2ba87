// Copyright (c) Asymptotic Labs
// SPDX-License-Identifier: Apache-2.0

//! Restrict a program to the declarations reachable from a set of roots
//!
//! Every declaration contributes edges to the names it mentions in its signature,
//! contracts and body. Callers may add edges the IR alone cannot show (for example
//! interface `requires` lists or superclass links). The resulting program holds the
//! roots, the always-kept names and their transitive dependencies, in the original
//! order.

use crate::data::Program;
use log::debug;
use petgraph::graphmap::DiGraphMap;
use petgraph::visit::Dfs;
use std::collections::{BTreeMap, BTreeSet};

pub fn slice_program(
    program: &mut Program,
    roots: &BTreeSet<String>,
    extra_edges: &BTreeMap<String, BTreeSet<String>>,
    always_keep: &BTreeSet<String>,
) {
    let reachable = reachable_names(program, roots, extra_edges, always_keep);
    let before = program.len();
    program.retain(|name| reachable.contains(name));
    debug!("slicing kept {} of {} declarations", program.len(), before);
}

fn reachable_names(
    program: &Program,
    roots: &BTreeSet<String>,
    extra_edges: &BTreeMap<String, BTreeSet<String>>,
    always_keep: &BTreeSet<String>,
) -> BTreeSet<String> {
    let dependencies: Vec<(String, BTreeSet<String>)> = program
        .declarations()
        .map(|decl| (decl.name().to_string(), decl.dependencies()))
        .collect();

    let mut graph = DiGraphMap::<&str, ()>::new();
    for (name, deps) in &dependencies {
        graph.add_node(name.as_str());
        for dep in deps {
            graph.add_edge(name.as_str(), dep.as_str(), ());
        }
    }
    for (name, deps) in extra_edges {
        for dep in deps {
            graph.add_edge(name.as_str(), dep.as_str(), ());
        }
    }

    let mut reachable = BTreeSet::new();
    for root in roots.iter().chain(always_keep.iter()) {
        if !graph.contains_node(root.as_str()) {
            continue;
        }
        let mut dfs = Dfs::new(&graph, root.as_str());
        while let Some(node) = dfs.next(&graph) {
            reachable.insert(node.to_string());
        }
    }
    reachable
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::declarations::{Declaration, Field, Function, Method};
    use crate::data::expressions::{Expr, FieldRef};
    use crate::data::statements::Stmt;
    use crate::data::types::Type;

    fn function(name: &str, body: Expr) -> Declaration {
        Declaration::Function(Function {
            name: name.to_string(),
            params: vec![],
            ret: Type::Int,
            pres: vec![],
            posts: vec![],
            body: Some(body),
            pos: Default::default(),
        })
    }

    fn method(name: &str, body: Vec<Stmt>) -> Declaration {
        Declaration::Method(Method {
            name: name.to_string(),
            params: vec![],
            returns: vec![],
            pres: vec![],
            posts: vec![],
            locals: vec![],
            body: Some(body),
            pos: Default::default(),
        })
    }

    fn sample_program() -> Program {
        let mut program = Program::new();
        program
            .add(Declaration::Field(Field {
                name: "val".to_string(),
                typ: Type::Int,
            }))
            .unwrap();
        program.add(function("leaf", Expr::int(1))).unwrap();
        program
            .add(function("mid", Expr::func_app("leaf", vec![], Type::Int)))
            .unwrap();
        program.add(function("unused", Expr::int(2))).unwrap();
        program
            .add(method(
                "main",
                vec![Stmt::FieldAssign {
                    receiver: Expr::Null,
                    field: FieldRef::new("val", Type::Int),
                    value: Expr::func_app("mid", vec![], Type::Int),
                }],
            ))
            .unwrap();
        program
    }

    #[test]
    fn test_slice_keeps_transitive_dependencies() {
        let mut program = sample_program();
        let roots = BTreeSet::from(["main".to_string()]);
        slice_program(&mut program, &roots, &BTreeMap::new(), &BTreeSet::new());
        assert_eq!(program.names(), vec!["val", "leaf", "mid", "main"]);
    }

    #[test]
    fn test_slice_follows_extra_edges() {
        let mut program = sample_program();
        let roots = BTreeSet::from(["leaf".to_string()]);
        let extra = BTreeMap::from([(
            "leaf".to_string(),
            BTreeSet::from(["unused".to_string()]),
        )]);
        slice_program(&mut program, &roots, &extra, &BTreeSet::new());
        assert_eq!(program.names(), vec!["leaf", "unused"]);
    }

    #[test]
    fn test_unknown_roots_are_ignored() {
        let mut program = sample_program();
        let roots = BTreeSet::from(["nope".to_string()]);
        let keep = BTreeSet::from(["val".to_string()]);
        slice_program(&mut program, &roots, &BTreeMap::new(), &keep);
        assert_eq!(program.names(), vec!["val"]);
    }
}

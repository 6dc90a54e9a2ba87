// Copyright (c) Asymptotic Labs
// SPDX-License-Identifier: Apache-2.0

use log::debug;
use std::collections::BTreeSet;

/// Keywords of the IR and names claimed by generated declarations.
/// No freshened source name may equal one of these.
pub const RESERVED_NAMES: &[&str] = &[
    // IR keywords
    "method", "function", "predicate", "field", "domain", "axiom", "var", "returns",
    "requires", "ensures", "invariant", "label", "goto", "result", "old", "acc",
    "forall", "exists", "true", "false", "null", "Int", "Bool", "Ref", "Seq", "Set",
    "Multiset", "Perm", "write", "none", "wildcard", "epsilon", "inhale", "exhale",
    "assert", "assume", "fold", "unfold", "unfolding", "in", "new", "if", "elseif",
    "else", "while", "import", "union", "intersection", "setminus", "subset", "perm",
    "let", "fresh", "constraining", "package", "apply", "wand", "unique", "Map",
    // generated locals and fields
    "_res", "_err", "_val", "list_acc", "set_acc", "dict_acc", "__iter_index",
    "__previous", "__container", "__end", "main",
    // type domain
    "PyType", "extends_", "issubtype", "isnotsubtype", "typeof", "get_basic",
    "tuple", "tuple_args", "tuple_arg", "tuple_basic", "get_type_arg",
    // definedness and boxing helpers
    "_isDefined", "_checkDefined", "_checkDefinedInt", "_checkDefinedBool",
    "__prim__int___box__", "__prim__bool___box__", "int___unbox__", "bool___unbox__",
    // built-in members
    "object___eq__", "object___bool__", "int___floordiv__", "int___mod__",
    "list___init__", "list_append", "list___setitem__", "list___len__", "list___getitem__",
    "list___contains__", "list___iter__", "range___create__", "range___sil_seq__",
    "range___len__", "range___iter__", "Iterator___next__", "Iterator___del__",
    "str___create__", "str___len__", "str___val__", "tuple___val__", "tuple___len__",
    "tuple___getitem__", "set___len__", "set___contains__", "dict___len__", "dict___contains__",
];

/// Generated names indexed by an arity, as `(prefix, suffix)` around the number
const RESERVED_FAMILIES: &[(&str, &str)] =
    &[("union_type_", ""), ("union_subtype_", ""), ("tuple___create", "__")];

fn in_reserved_family(name: &str) -> bool {
    RESERVED_FAMILIES.iter().any(|(prefix, suffix)| {
        name.strip_prefix(prefix)
            .and_then(|rest| rest.strip_suffix(suffix))
            .is_some_and(|n| !n.is_empty() && n.bytes().all(|b| b.is_ascii_digit()))
    })
}

/// Registry of every IR identifier handed out during one compilation.
///
/// A single registry is shared by all scopes so that identifiers are unique across
/// the whole emitted program. Names are allocated in traversal order, which makes
/// the result a pure function of the input.
#[derive(Debug, Clone)]
pub struct IdentifierRegistry {
    used: BTreeSet<String>,
}

impl IdentifierRegistry {
    /// Registry pre-seeded with the reserved names
    pub fn new() -> Self {
        Self {
            used: RESERVED_NAMES.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// Return `name` if unused, otherwise the first free `name_0`, `name_1`, ...;
    /// the result is registered.
    pub fn freshen(&mut self, name: &str) -> String {
        let name = sanitize(name);
        if !in_reserved_family(&name) && self.used.insert(name.clone()) {
            return name;
        }
        let fresh = (0..)
            .map(|i| format!("{}_{}", name, i))
            .find(|candidate| !self.is_used(candidate))
            .unwrap_or_default();
        debug!("freshened `{}` to `{}`", name, fresh);
        self.used.insert(fresh.clone());
        fresh
    }

    /// Claim a fixed name; returns false if it was already taken
    pub fn reserve(&mut self, name: &str) -> bool {
        self.used.insert(name.to_string())
    }

    pub fn is_used(&self, name: &str) -> bool {
        self.used.contains(name) || in_reserved_family(name)
    }
}

impl Default for IdentifierRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Map characters the IR does not accept in identifiers to `_`
fn sanitize(name: &str) -> String {
    let mut out: String = name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' || c == '$' { c } else { '_' })
        .collect();
    if out.is_empty() || out.starts_with(|c: char| c.is_ascii_digit()) {
        out.insert(0, '_');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_freshen_appends_counter() {
        let mut registry = IdentifierRegistry::new();
        assert_eq!(registry.freshen("x"), "x");
        assert_eq!(registry.freshen("x"), "x_0");
        assert_eq!(registry.freshen("x"), "x_1");
        assert_eq!(registry.freshen("x_0"), "x_0_0");
    }

    #[test]
    fn test_reserved_names_are_never_returned() {
        let mut registry = IdentifierRegistry::new();
        assert_eq!(registry.freshen("method"), "method_0");
        assert_eq!(registry.freshen("issubtype"), "issubtype_0");
        assert_eq!(registry.freshen("_res"), "_res_0");
    }

    #[test]
    fn test_arity_families_are_reserved() {
        let mut registry = IdentifierRegistry::new();
        assert_eq!(registry.freshen("union_type_6"), "union_type_6_0");
        assert_eq!(registry.freshen("tuple___create12__"), "tuple___create12___0");
        assert_eq!(registry.freshen("union_type_"), "union_type_");
        assert_eq!(registry.freshen("list___init__"), "list___init___0");
    }

    #[test]
    fn test_freshen_is_deterministic_and_unique() {
        let names = ["a", "b", "a", "a_0", "b", "a"];
        let run = || {
            let mut registry = IdentifierRegistry::new();
            names.iter().map(|n| registry.freshen(n)).collect::<Vec<_>>()
        };
        let first = run();
        assert_eq!(first, run());
        let unique: BTreeSet<_> = first.iter().collect();
        assert_eq!(unique.len(), first.len());
    }

    #[test]
    fn test_sanitize() {
        assert_eq!(sanitize("a.b"), "a_b");
        assert_eq!(sanitize("1x"), "_1x");
    }
}

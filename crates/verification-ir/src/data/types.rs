// Copyright (c) Asymptotic Labs
// SPDX-License-Identifier: Apache-2.0

use std::fmt::{Display, Formatter};

/// IR value types
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Type {
    Int,
    Bool,
    Ref,
    Perm,
    Seq(Box<Type>),
    Set(Box<Type>),
    /// A type declared by a domain (e.g. `PyType`)
    Domain(String),
}

impl Type {
    pub fn seq(elem: Type) -> Self {
        Type::Seq(Box::new(elem))
    }

    pub fn set(elem: Type) -> Self {
        Type::Set(Box::new(elem))
    }

    pub fn domain(name: impl Into<String>) -> Self {
        Type::Domain(name.into())
    }

    /// Element type of a collection type
    pub fn element(&self) -> Option<&Type> {
        match self {
            Type::Seq(elem) | Type::Set(elem) => Some(elem),
            _ => None,
        }
    }

    /// Domain names mentioned by this type
    pub fn domain_names(&self) -> Vec<&str> {
        match self {
            Type::Domain(name) => vec![name.as_str()],
            Type::Seq(elem) | Type::Set(elem) => elem.domain_names(),
            _ => vec![],
        }
    }
}

impl Display for Type {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Type::Int => write!(f, "Int"),
            Type::Bool => write!(f, "Bool"),
            Type::Ref => write!(f, "Ref"),
            Type::Perm => write!(f, "Perm"),
            Type::Seq(elem) => write!(f, "Seq[{}]", elem),
            Type::Set(elem) => write!(f, "Set[{}]", elem),
            Type::Domain(name) => write!(f, "{}", name),
        }
    }
}

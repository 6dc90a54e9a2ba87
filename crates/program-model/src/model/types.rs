// Copyright (c) Asymptotic Labs
// SPDX-License-Identifier: Apache-2.0

use crate::model::{ClassId, Model};
use itertools::Itertools;

/// Static type of a source-level value
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PyType {
    /// Plain (non-generic, or raw generic) class
    Class(ClassId),

    /// Instantiated generic class; tuples with `exact_length == false` are
    /// `Tuple[T, ...]`
    Generic {
        cls: ClassId,
        args: Vec<PyType>,
        exact_length: bool,
    },

    /// Union of at least two members
    Union(Vec<PyType>),

    /// `None` or the wrapped type
    Optional(Box<PyType>),

    /// Type variable; `class` is set for class-level variables, which are
    /// resolved through the receiver's runtime type at position `index`
    TypeVar {
        name: String,
        bound: Box<PyType>,
        class: Option<ClassId>,
        index: usize,
    },
}

impl PyType {
    pub fn generic(cls: ClassId, args: Vec<PyType>) -> Self {
        PyType::Generic {
            cls,
            args,
            exact_length: true,
        }
    }

    /// The class that represents this type for member lookup: the class itself,
    /// the nearest common superclass of a union, the wrapped class of an optional,
    /// or the bound of a type variable.
    pub fn cls(&self, model: &Model) -> ClassId {
        match self {
            PyType::Class(cls) | PyType::Generic { cls, .. } => *cls,
            PyType::Union(members) => {
                let classes = members.iter().map(|m| m.cls(model)).collect_vec();
                model.common_superclass(&classes)
            }
            PyType::Optional(inner) => inner.cls(model),
            PyType::TypeVar { bound, .. } => bound.cls(model),
        }
    }

    /// Type arguments of an instantiated generic
    pub fn type_args(&self) -> &[PyType] {
        match self {
            PyType::Generic { args, .. } => args,
            PyType::Optional(inner) => inner.type_args(),
            _ => &[],
        }
    }

    /// Members of a union (the optional's `None` is not listed)
    pub fn union_members(&self) -> Option<&[PyType]> {
        match self {
            PyType::Union(members) => Some(members),
            _ => None,
        }
    }

    pub fn is_optional(&self) -> bool {
        matches!(self, PyType::Optional(_))
    }

    /// Replace class type variables by the given arguments
    pub fn substitute(&self, class: ClassId, args: &[PyType]) -> PyType {
        match self {
            PyType::TypeVar {
                class: Some(owner),
                index,
                ..
            } if *owner == class && *index < args.len() => args[*index].clone(),
            PyType::Generic {
                cls,
                args: inner,
                exact_length,
            } => PyType::Generic {
                cls: *cls,
                args: inner.iter().map(|a| a.substitute(class, args)).collect(),
                exact_length: *exact_length,
            },
            PyType::Union(members) => {
                PyType::Union(members.iter().map(|m| m.substitute(class, args)).collect())
            }
            PyType::Optional(inner) => PyType::Optional(Box::new(inner.substitute(class, args))),
            other => other.clone(),
        }
    }

    /// Human-readable rendering for diagnostics
    pub fn display(&self, model: &Model) -> String {
        match self {
            PyType::Class(cls) => model.class(*cls).name.clone(),
            PyType::Generic {
                cls,
                args,
                exact_length,
            } => {
                let mut items = args.iter().map(|a| a.display(model)).collect_vec();
                if !exact_length {
                    items.push("...".to_string());
                }
                format!("{}[{}]", model.class(*cls).name, items.join(", "))
            }
            PyType::Union(members) => format!(
                "Union[{}]",
                members.iter().map(|m| m.display(model)).join(", ")
            ),
            PyType::Optional(inner) => format!("Optional[{}]", inner.display(model)),
            PyType::TypeVar { name, .. } => name.clone(),
        }
    }
}

// Copyright (c) Asymptotic Labs
// SPDX-License-Identifier: Apache-2.0

//! Type expressions as written by the type inferencer: `int`, `List[int]`,
//! `Optional[m.Foo]`, `Tuple[int, ...]`, `Union[A, B]`.

use crate::syntax::{Expr, ExprKind};
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TypeExpr {
    /// Possibly dotted name
    pub name: String,
    pub args: Vec<TypeExpr>,
    /// `Tuple[T, ...]`
    pub variadic: bool,
}

impl TypeExpr {
    pub fn simple(name: &str) -> Self {
        Self {
            name: name.to_string(),
            args: vec![],
            variadic: false,
        }
    }

    /// Convert an annotation expression into a type expression
    pub fn from_annotation(expr: &Expr) -> Option<Self> {
        match &expr.kind {
            ExprKind::NoneLit => Some(Self::simple("None")),
            ExprKind::Str { value } => value.parse().ok(),
            ExprKind::Name { .. } | ExprKind::Attribute { .. } => {
                expr.dotted_name().map(|n| Self::simple(&n))
            }
            ExprKind::Subscript { value, slice } => {
                let name = value.dotted_name()?;
                let items: Vec<&Expr> = match &slice.kind {
                    ExprKind::Tuple { elts } => elts.iter().collect(),
                    _ => vec![slice.as_ref()],
                };
                let variadic = items.last().and_then(|e| e.as_name()) == Some("...");
                let args = items
                    .iter()
                    .filter(|e| e.as_name() != Some("..."))
                    .map(|e| Self::from_annotation(e))
                    .collect::<Option<Vec<_>>>()?;
                Some(Self {
                    name,
                    args,
                    variadic,
                })
            }
            _ => None,
        }
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("malformed type expression `{input}`: {reason}")]
pub struct TypeParseError {
    input: String,
    reason: String,
}

impl FromStr for TypeExpr {
    type Err = TypeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let error = |reason: &str| TypeParseError {
            input: s.to_string(),
            reason: reason.to_string(),
        };
        let tokens = tokenize(s);
        let mut pos = 0;
        let result = parse_type(&tokens, &mut pos).map_err(|r| error(&r))?;
        if pos != tokens.len() {
            return Err(error("trailing input"));
        }
        Ok(result)
    }
}

fn tokenize(s: &str) -> Vec<String> {
    let mut tokens = vec![];
    let mut current = String::new();
    for c in s.chars() {
        match c {
            '[' | ']' | ',' => {
                if !current.is_empty() {
                    tokens.push(std::mem::take(&mut current));
                }
                tokens.push(c.to_string());
            }
            c if c.is_whitespace() => {
                if !current.is_empty() {
                    tokens.push(std::mem::take(&mut current));
                }
            }
            c => current.push(c),
        }
    }
    if !current.is_empty() {
        tokens.push(current);
    }
    tokens
}

fn parse_type(tokens: &[String], pos: &mut usize) -> Result<TypeExpr, String> {
    let name = tokens.get(*pos).ok_or("unexpected end")?.clone();
    if matches!(name.as_str(), "[" | "]" | ",") {
        return Err(format!("unexpected `{}`", name));
    }
    *pos += 1;
    let mut args = vec![];
    let mut variadic = false;
    if tokens.get(*pos).map(String::as_str) == Some("[") {
        *pos += 1;
        loop {
            if tokens.get(*pos).map(String::as_str) == Some("...") {
                variadic = true;
                *pos += 1;
            } else {
                args.push(parse_type(tokens, pos)?);
            }
            match tokens.get(*pos).map(String::as_str) {
                Some(",") => *pos += 1,
                Some("]") => {
                    *pos += 1;
                    break;
                }
                _ => return Err("expected `,` or `]`".to_string()),
            }
        }
    }
    Ok(TypeExpr {
        name,
        args,
        variadic,
    })
}

impl TryFrom<String> for TypeExpr {
    type Error = TypeParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<TypeExpr> for String {
    fn from(value: TypeExpr) -> Self {
        value.to_string()
    }
}

impl Display for TypeExpr {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name)?;
        if !self.args.is_empty() || self.variadic {
            let mut items = self.args.iter().map(|a| a.to_string()).collect_vec();
            if self.variadic {
                items.push("...".to_string());
            }
            write!(f, "[{}]", items.join(", "))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_nested() {
        let t: TypeExpr = "Optional[List[m.Foo]]".parse().unwrap();
        assert_eq!(t.name, "Optional");
        assert_eq!(t.args[0].name, "List");
        assert_eq!(t.args[0].args[0].name, "m.Foo");
        assert_eq!(t.to_string(), "Optional[List[m.Foo]]");
    }

    #[test]
    fn test_parse_variadic_tuple() {
        let t: TypeExpr = "Tuple[int, ...]".parse().unwrap();
        assert!(t.variadic);
        assert_eq!(t.args.len(), 1);
        assert_eq!(t.to_string(), "Tuple[int, ...]");
    }

    #[test]
    fn test_reject_malformed() {
        assert!("List[int".parse::<TypeExpr>().is_err());
        assert!("List[int]]".parse::<TypeExpr>().is_err());
        assert!("".parse::<TypeExpr>().is_err());
    }

    #[test]
    fn test_from_annotation() {
        let annotation = Expr::new(
            ExprKind::Subscript {
                value: Box::new(Expr::name("Dict")),
                slice: Box::new(Expr::new(
                    ExprKind::Tuple {
                        elts: vec![Expr::name("str"), Expr::name("int")],
                    },
                    0,
                    0,
                )),
            },
            0,
            0,
        );
        let t = TypeExpr::from_annotation(&annotation).unwrap();
        assert_eq!(t.to_string(), "Dict[str, int]");
    }
}

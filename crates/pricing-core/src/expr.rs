//! # Expression Tree
//!
//! Typed form of a rule's `logic`, parsed once when a pack is compiled.
//!
//! ## Grammar
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  JSON                              Expr                                 │
//! │  ────                              ────                                 │
//! │  12.5 / true / "EUR" / null   ──►  Literal(value)                       │
//! │  {"var": "order.baseValue"}   ──►  Var { path, default: None }          │
//! │  {"var": ["order.x", 0]}      ──►  Var { path, default: Some(0) }       │
//! │  {"op": [a, b, ...]}          ──►  Operator { name: "op", args }        │
//! │  {"op": a}                    ──►  Operator { name: "op", args: [a] }   │
//! │  [a, b, ...]                  ──►  List([a, b, ...])                    │
//! │                                                                         │
//! │  An object with zero or several keys is malformed.                      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Parsing does not check operator names: the registry can change after a
//! pack is compiled, so unknown operators surface at evaluation time.

use serde_json::Value;

use crate::error::EvalError;

/// Name of the variable lookup form.
pub const VAR: &str = "var";

/// A parsed expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Constant value.
    Literal(Value),

    /// Dotted-path lookup against the evaluation context.
    Var {
        /// Path segments; empty means the whole context.
        path: Vec<String>,
        /// Used when the path resolves to nothing.
        default: Option<Box<Expr>>,
    },

    /// Operator application.
    Operator { name: String, args: Vec<Expr> },

    /// Sequence whose elements are evaluated in order.
    List(Vec<Expr>),
}

impl Expr {
    /// Parses a JSON logic tree.
    pub fn parse(value: &Value) -> Result<Expr, EvalError> {
        match value {
            Value::Object(map) => {
                if map.len() != 1 {
                    return Err(EvalError::Malformed(format!(
                        "operator object must have exactly one key, found {}",
                        map.len()
                    )));
                }
                let Some((name, raw_args)) = map.iter().next() else {
                    return Err(EvalError::Malformed("empty operator object".to_string()));
                };
                if name == VAR {
                    return Self::parse_var(raw_args);
                }
                let args = match raw_args {
                    Value::Array(items) => items.iter().map(Expr::parse).collect::<Result<_, _>>()?,
                    single => vec![Expr::parse(single)?],
                };
                Ok(Expr::Operator {
                    name: name.clone(),
                    args,
                })
            }
            Value::Array(items) => Ok(Expr::List(
                items.iter().map(Expr::parse).collect::<Result<_, _>>()?,
            )),
            literal => Ok(Expr::Literal(literal.clone())),
        }
    }

    fn parse_var(raw: &Value) -> Result<Expr, EvalError> {
        let (path, default) = match raw {
            Value::Array(items) => match items.as_slice() {
                [] => (Value::Null, None),
                [path] => (path.clone(), None),
                [path, default] => (path.clone(), Some(Box::new(Expr::parse(default)?))),
                _ => return Err(EvalError::arity(VAR, "1 or 2", items.len())),
            },
            other => (other.clone(), None),
        };

        let path = match path {
            Value::Null => String::new(),
            Value::String(s) => s,
            Value::Number(n) => n.to_string(),
            other => {
                return Err(EvalError::type_mismatch(
                    VAR,
                    "string path",
                    crate::value::type_name(&other),
                ))
            }
        };

        Ok(Expr::Var {
            path: split_path(&path),
            default,
        })
    }

    /// Convenience constructor for a variable reference.
    pub fn var(path: &str) -> Expr {
        Expr::Var {
            path: split_path(path),
            default: None,
        }
    }
}

fn split_path(path: &str) -> Vec<String> {
    if path.is_empty() {
        Vec::new()
    } else {
        path.split('.').map(str::to_string).collect()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

//! # Operator Registry
//!
//! Name → native function table consulted by the evaluator before any of its
//! own special forms.
//!
//! ## Dispatch Order
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Expr::Operator { name, args }                                          │
//! │          │                                                              │
//! │          ▼                                                              │
//! │  ┌─────────────────────┐  hit   ┌──────────────────────────────────┐    │
//! │  │ registry.get(name)  │ ─────► │ evaluate args left → right       │    │
//! │  └─────────┬───────────┘        │ call native fn(&[Value])         │    │
//! │            │ miss               └──────────────────────────────────┘    │
//! │            ▼                                                            │
//! │  ┌─────────────────────┐                                                │
//! │  │ special forms       │  if, and, or, foreach, foreach_sum (lazy)      │
//! │  └─────────┬───────────┘                                                │
//! │            │ miss                                                       │
//! │            ▼                                                            │
//! │     EvalError::UnknownOperator                                          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Registration Order
//! `OperatorRegistry::default()` registers the generic built-ins first
//! (arithmetic, comparisons, `sum`, `min`, `max`, `!`, `!!`) and then the
//! pricing operators `round` and `allocate`. Anything registered afterwards
//! replaces the entry of the same name, built-in or not.
//!
//! ## Usage
//! ```rust
//! use pricing_core::operators::OperatorRegistry;
//! use serde_json::json;
//!
//! let mut registry = OperatorRegistry::default();
//! registry.register("double", |args| {
//!     let n = args.first().and_then(|v| v.as_f64()).unwrap_or(0.0);
//!     Ok(json!(n * 2.0))
//! });
//! assert!(registry.contains("double"));
//! ```

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::error::{EvalError, EvalResult};
use crate::value::{compare, expect_number, is_truthy, loose_eq, number, round_to, strict_eq};

/// A native operator: receives fully evaluated arguments in order.
pub type NativeFn = Arc<dyn Fn(&[Value]) -> EvalResult + Send + Sync>;

// =============================================================================
// Registry
// =============================================================================

/// Operator table shared read-only by concurrent runs.
#[derive(Clone)]
pub struct OperatorRegistry {
    ops: HashMap<String, NativeFn>,
}

impl OperatorRegistry {
    /// Registry with no operators at all. Only the evaluator's special forms
    /// remain available.
    pub fn empty() -> Self {
        OperatorRegistry {
            ops: HashMap::new(),
        }
    }

    /// Registry with every built-in and pricing operator.
    pub fn with_builtins() -> Self {
        let mut registry = Self::empty();
        registry.register_core_builtins();
        registry.register_pricing_operators();
        registry
    }

    /// Registers `f` under `name`, returning the entry it replaced.
    pub fn register<F>(&mut self, name: impl Into<String>, f: F) -> Option<NativeFn>
    where
        F: Fn(&[Value]) -> EvalResult + Send + Sync + 'static,
    {
        self.ops.insert(name.into(), Arc::new(f))
    }

    /// Looks up an operator by name.
    pub fn get(&self, name: &str) -> Option<&NativeFn> {
        self.ops.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.ops.contains_key(name)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.ops.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    fn register_core_builtins(&mut self) {
        // Arithmetic
        self.register("+", add);
        self.register("-", subtract);
        self.register("*", multiply);
        self.register("/", divide);
        self.register("%", modulo);

        // Comparison
        self.register("==", |args| binary("==", args, |a, b| Value::Bool(loose_eq(a, b))));
        self.register("!=", |args| binary("!=", args, |a, b| Value::Bool(!loose_eq(a, b))));
        self.register("===", |args| binary("===", args, |a, b| Value::Bool(strict_eq(a, b))));
        self.register("!==", |args| binary("!==", args, |a, b| Value::Bool(!strict_eq(a, b))));
        self.register(">", |args| binary(">", args, |a, b| Value::Bool(compare(a, b).is_some_and(|o| o.is_gt()))));
        self.register(">=", |args| binary(">=", args, |a, b| Value::Bool(compare(a, b).is_some_and(|o| o.is_ge()))));
        self.register("<", |args| chained("<", args, |o| o.is_lt()));
        self.register("<=", |args| chained("<=", args, |o| o.is_le()));

        // Aggregation
        self.register("sum", sum);
        self.register("min", |args| extremum("min", args, f64::min));
        self.register("max", |args| extremum("max", args, f64::max));

        // Logic
        self.register("!", |args| {
            expect_arity("!", args, 1)?;
            Ok(Value::Bool(!is_truthy(&args[0])))
        });
        self.register("!!", |args| {
            expect_arity("!!", args, 1)?;
            Ok(Value::Bool(is_truthy(&args[0])))
        });
    }

    fn register_pricing_operators(&mut self) {
        self.register("round", round);
        self.register("allocate", allocate);
    }
}

impl Default for OperatorRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

impl fmt::Debug for OperatorRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OperatorRegistry")
            .field("operators", &self.names())
            .finish()
    }
}

// =============================================================================
// Helpers
// =============================================================================

fn expect_arity(operator: &str, args: &[Value], expected: usize) -> Result<(), EvalError> {
    if args.len() == expected {
        Ok(())
    } else {
        Err(EvalError::arity(operator, expected.to_string(), args.len()))
    }
}

fn binary(operator: &str, args: &[Value], f: impl Fn(&Value, &Value) -> Value) -> EvalResult {
    expect_arity(operator, args, 2)?;
    Ok(f(&args[0], &args[1]))
}

/// `<` and `<=` also accept `a < b < c` ("between").
fn chained(operator: &str, args: &[Value], holds: impl Fn(std::cmp::Ordering) -> bool) -> EvalResult {
    if !(2..=3).contains(&args.len()) {
        return Err(EvalError::arity(operator, "2 or 3", args.len()));
    }
    let ok = args
        .windows(2)
        .all(|pair| compare(&pair[0], &pair[1]).is_some_and(&holds));
    Ok(Value::Bool(ok))
}

/// Arguments with one level of array flattening: `sum([1, [2, 3]])` = 6.
fn flattened(args: &[Value]) -> impl Iterator<Item = &Value> {
    args.iter().flat_map(|arg| match arg {
        Value::Array(items) => items.iter().collect::<Vec<_>>(),
        other => vec![other],
    })
}

// =============================================================================
// Arithmetic
// =============================================================================

fn add(args: &[Value]) -> EvalResult {
    let mut total = 0.0;
    for arg in args {
        total += expect_number("+", arg)?;
    }
    number("+", total)
}

fn subtract(args: &[Value]) -> EvalResult {
    match args {
        [only] => number("-", -expect_number("-", only)?),
        [a, b] => number("-", expect_number("-", a)? - expect_number("-", b)?),
        _ => Err(EvalError::arity("-", "1 or 2", args.len())),
    }
}

fn multiply(args: &[Value]) -> EvalResult {
    if args.is_empty() {
        return Err(EvalError::arity("*", "at least 1", 0));
    }
    let mut product = 1.0;
    for arg in args {
        product *= expect_number("*", arg)?;
    }
    number("*", product)
}

fn divide(args: &[Value]) -> EvalResult {
    expect_arity("/", args, 2)?;
    let divisor = expect_number("/", &args[1])?;
    if divisor == 0.0 {
        return Err(EvalError::DivisionByZero("/".to_string()));
    }
    number("/", expect_number("/", &args[0])? / divisor)
}

fn modulo(args: &[Value]) -> EvalResult {
    expect_arity("%", args, 2)?;
    let divisor = expect_number("%", &args[1])?;
    if divisor == 0.0 {
        return Err(EvalError::DivisionByZero("%".to_string()));
    }
    number("%", expect_number("%", &args[0])? % divisor)
}

fn sum(args: &[Value]) -> EvalResult {
    let mut total = 0.0;
    for value in flattened(args) {
        total += expect_number("sum", value)?;
    }
    number("sum", total)
}

fn extremum(operator: &str, args: &[Value], pick: fn(f64, f64) -> f64) -> EvalResult {
    let mut best: Option<f64> = None;
    for value in flattened(args) {
        let n = expect_number(operator, value)?;
        best = Some(best.map_or(n, |b| pick(b, n)));
    }
    match best {
        Some(n) => number(operator, n),
        None => Ok(Value::Null),
    }
}

// =============================================================================
// Pricing Operators
// =============================================================================

/// `round(value[, precision])`: half away from zero, default precision 0.
pub fn round(args: &[Value]) -> EvalResult {
    let (value, precision) = match args {
        [value] => (expect_number("round", value)?, 0),
        [value, precision] => (
            expect_number("round", value)?,
            expect_number("round", precision)? as i32,
        ),
        _ => return Err(EvalError::arity("round", "1 or 2", args.len())),
    };
    number("round", round_to(value, precision))
}

/// `allocate(total, divisor)` or `allocate(total, [weights...])`.
///
/// ```text
/// allocate(900, 3)          → 300
/// allocate(900, 0)          → 0
/// allocate(900, [1, 2, 1])  → [225, 450, 225]
/// allocate(900, [0, 0])     → DivisionByZero
/// ```
pub fn allocate(args: &[Value]) -> EvalResult {
    expect_arity("allocate", args, 2)?;
    let total = expect_number("allocate", &args[0])?;

    match &args[1] {
        Value::Array(weights) => {
            let weights = weights
                .iter()
                .map(|w| expect_number("allocate", w))
                .collect::<Result<Vec<f64>, _>>()?;
            let weight_sum: f64 = weights.iter().sum();
            if weight_sum == 0.0 {
                return Err(EvalError::DivisionByZero("allocate".to_string()));
            }
            let parts = weights
                .iter()
                .map(|w| number("allocate", total * w / weight_sum))
                .collect::<Result<Vec<Value>, _>>()?;
            Ok(Value::Array(parts))
        }
        divisor => {
            let divisor = expect_number("allocate", divisor)?;
            if divisor == 0.0 {
                return number("allocate", 0.0);
            }
            number("allocate", total / divisor)
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    fn call(name: &str, args: &[Value]) -> EvalResult {
        let registry = OperatorRegistry::default();
        let op = registry.get(name).expect("operator registered");
        op(args)
    }

    #[test]
    fn test_arithmetic() {
        assert_eq!(call("+", &[json!(1), json!(2), json!(3.5)]).unwrap(), json!(6.5));
        assert_eq!(call("+", &[]).unwrap(), json!(0.0));
        assert_eq!(call("-", &[json!(5)]).unwrap(), json!(-5.0));
        assert_eq!(call("-", &[json!(5), json!(2)]).unwrap(), json!(3.0));
        assert_eq!(call("*", &[json!(1000), json!(0.9)]).unwrap(), json!(900.0));
        assert_eq!(call("/", &[json!(9), json!(2)]).unwrap(), json!(4.5));
        assert_eq!(call("%", &[json!(7), json!(3)]).unwrap(), json!(1.0));
    }

    #[test]
    fn test_null_reads_as_zero_in_arithmetic() {
        assert_eq!(call("+", &[json!(null), json!(4)]).unwrap(), json!(4.0));
    }

    #[test]
    fn test_division_by_zero_is_error() {
        assert!(matches!(
            call("/", &[json!(1), json!(0)]),
            Err(EvalError::DivisionByZero(_))
        ));
        assert!(call("%", &[json!(1), json!(0)]).is_err());
    }

    #[test]
    fn test_arity_errors() {
        assert!(matches!(call("/", &[json!(1)]), Err(EvalError::Arity { .. })));
        assert!(matches!(call("-", &[]), Err(EvalError::Arity { .. })));
        assert!(matches!(call("*", &[]), Err(EvalError::Arity { .. })));
        assert!(matches!(
            call("allocate", &[json!(1)]),
            Err(EvalError::Arity { .. })
        ));
    }

    #[test]
    fn test_type_mismatch() {
        assert!(matches!(
            call("+", &[json!(1), json!("abc")]),
            Err(EvalError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn test_comparisons() {
        assert_eq!(call(">", &[json!(1080), json!(1000)]).unwrap(), json!(true));
        assert_eq!(call(">=", &[json!(5), json!(5)]).unwrap(), json!(true));
        assert_eq!(call("<", &[json!(1), json!(5), json!(10)]).unwrap(), json!(true));
        assert_eq!(call("<=", &[json!(1), json!(11), json!(10)]).unwrap(), json!(false));
        assert_eq!(call("==", &[json!(1), json!("1")]).unwrap(), json!(true));
        assert_eq!(call("===", &[json!(1), json!("1")]).unwrap(), json!(false));
        assert_eq!(call("!=", &[json!("a"), json!("b")]).unwrap(), json!(true));
    }

    #[test]
    fn test_sum_flattens_sequences() {
        assert_eq!(call("sum", &[json!([1, 2, 3])]).unwrap(), json!(6.0));
        assert_eq!(call("sum", &[json!(1), json!([2, 3])]).unwrap(), json!(6.0));
        assert_eq!(call("sum", &[json!([])]).unwrap(), json!(0.0));
    }

    #[test]
    fn test_min_max() {
        assert_eq!(call("min", &[json!(3), json!(1), json!(2)]).unwrap(), json!(1.0));
        assert_eq!(call("max", &[json!([3, 7])]).unwrap(), json!(7.0));
        assert_eq!(call("max", &[]).unwrap(), json!(null));
    }

    #[test]
    fn test_negation() {
        assert_eq!(call("!", &[json!(0)]).unwrap(), json!(true));
        assert_eq!(call("!!", &[json!("x")]).unwrap(), json!(true));
    }

    #[test]
    fn test_round() {
        assert_eq!(call("round", &[json!(180.456), json!(2)]).unwrap(), json!(180.46));
        assert_eq!(call("round", &[json!(2.5)]).unwrap(), json!(3.0));
        assert!(call("round", &[]).is_err());
    }

    #[test]
    fn test_allocate_scalar() {
        assert_eq!(call("allocate", &[json!(900), json!(3)]).unwrap(), json!(300.0));
        assert_eq!(call("allocate", &[json!(900), json!(0)]).unwrap(), json!(0.0));
    }

    #[test]
    fn test_allocate_weights() {
        assert_eq!(
            call("allocate", &[json!(900), json!([1, 2, 1])]).unwrap(),
            json!([225.0, 450.0, 225.0])
        );
        assert!(matches!(
            call("allocate", &[json!(900), json!([0, 0])]),
            Err(EvalError::DivisionByZero(_))
        ));
    }

    #[test]
    fn test_register_overwrites() {
        let mut registry = OperatorRegistry::default();
        let previous = registry.register("round", |_| Ok(json!(42)));
        assert!(previous.is_some());

        let op = registry.get("round").unwrap();
        assert_eq!(op(&[json!(1.5)]).unwrap(), json!(42));
    }

    #[test]
    fn test_empty_registry() {
        let registry = OperatorRegistry::empty();
        assert!(registry.names().is_empty());
        assert!(!registry.contains("+"));
    }

    proptest! {
        #[test]
        fn prop_allocate_preserves_total(
            total in 0.0f64..1_000_000.0,
            weights in prop::collection::vec(1u32..1000, 1..12),
        ) {
            let weights_json: Vec<Value> = weights.iter().map(|w| json!(w)).collect();
            let parts = allocate(&[json!(total), Value::Array(weights_json)]).unwrap();
            let allocated: f64 = parts
                .as_array()
                .unwrap()
                .iter()
                .map(|p| p.as_f64().unwrap())
                .sum();
            prop_assert!((allocated - total).abs() <= 1e-6 * total.max(1.0));
        }
    }
}

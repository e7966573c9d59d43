//! # Value Semantics
//!
//! Coercion, truthiness and comparison rules for JSON values flowing through
//! the evaluator.
//!
//! ## Coercion Table
//! ```text
//! ┌──────────────┬────────────────┬──────────────┐
//! │ JSON value   │ as number      │ truthy?      │
//! ├──────────────┼────────────────┼──────────────┤
//! │ null         │ 0              │ no           │
//! │ true / false │ 1 / 0          │ itself       │
//! │ number       │ itself         │ != 0         │
//! │ "12.5"       │ 12.5           │ non-empty    │
//! │ ""           │ 0              │ no           │
//! │ "abc"        │ (none)         │ yes          │
//! │ [...]        │ (none)         │ non-empty    │
//! │ {...}        │ (none)         │ yes          │
//! └──────────────┴────────────────┴──────────────┘
//! ```
//!
//! A missing variable resolves to `null`, so it reads as 0 only when an
//! arithmetic operator consumes it. Ordering comparisons against `null`
//! have no result and evaluate to `false`.

use std::cmp::Ordering;

use serde_json::{Number, Value};

use crate::error::{EvalError, EvalResult};

// =============================================================================
// Numbers
// =============================================================================

/// Coerces a value to a number, or `None` when it has no numeric reading.
pub fn to_number(value: &Value) -> Option<f64> {
    match value {
        Value::Null => Some(0.0),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        Value::Number(n) => n.as_f64(),
        Value::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                Some(0.0)
            } else {
                trimmed.parse::<f64>().ok().filter(|f| f.is_finite())
            }
        }
        Value::Array(_) | Value::Object(_) => None,
    }
}

/// Coerces an operator argument to a number or reports a type mismatch.
pub fn expect_number(operator: &str, value: &Value) -> Result<f64, EvalError> {
    to_number(value).ok_or_else(|| EvalError::type_mismatch(operator, "number", type_name(value)))
}

/// Wraps an arithmetic result, rejecting NaN and infinities.
pub fn number(operator: &str, value: f64) -> EvalResult {
    Number::from_f64(value)
        .map(Value::Number)
        .ok_or_else(|| EvalError::NonFinite(operator.to_string()))
}

/// Rounds half away from zero to `precision` decimal places.
///
/// `round_to(180.456, 2)` → 180.46, `round_to(-0.5, 0)` → -1.0.
pub fn round_to(value: f64, precision: i32) -> f64 {
    let factor = 10f64.powi(precision);
    (value * factor).round() / factor
}

/// Numeric view used when routing a rule result into an Order field.
///
/// Stricter than [`to_number`]: only real numbers are accepted, so a rule
/// that yields `true` or `"abc"` is reported instead of silently writing 1.
pub fn as_field_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        _ => None,
    }
}

// =============================================================================
// Truthiness & Equality
// =============================================================================

/// JsonLogic truthiness.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(false),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(_) => true,
    }
}

/// `==`: numbers compare by value; mixed scalar types coerce to numbers.
pub fn loose_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Null, Value::Null) => true,
        (Value::Null, _) | (_, Value::Null) => false,
        (Value::String(x), Value::String(y)) => x == y,
        (Value::Array(_) | Value::Object(_), _) | (_, Value::Array(_) | Value::Object(_)) => a == b,
        _ => match (to_number(a), to_number(b)) {
            (Some(x), Some(y)) => x == y,
            _ => false,
        },
    }
}

/// `===`: same JSON type and same value. `1` and `1.0` are equal.
pub fn strict_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
        _ => a == b,
    }
}

/// Ordering for `<`, `<=`, `>`, `>=`. Two strings compare lexically,
/// anything else numerically; `None` when no ordering exists, including
/// when either side is `null`.
pub fn compare(a: &Value, b: &Value) -> Option<Ordering> {
    if a.is_null() || b.is_null() {
        return None;
    }
    if let (Value::String(x), Value::String(y)) = (a, b) {
        if x.parse::<f64>().is_err() || y.parse::<f64>().is_err() {
            return Some(x.cmp(y));
        }
    }
    let x = to_number(a)?;
    let y = to_number(b)?;
    x.partial_cmp(&y)
}

/// Short type name for error messages.
pub fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_to_number_coercion() {
        assert_eq!(to_number(&json!(null)), Some(0.0));
        assert_eq!(to_number(&json!(true)), Some(1.0));
        assert_eq!(to_number(&json!("12.5")), Some(12.5));
        assert_eq!(to_number(&json!("")), Some(0.0));
        assert_eq!(to_number(&json!("abc")), None);
        assert_eq!(to_number(&json!([1])), None);
    }

    #[test]
    fn test_number_rejects_non_finite() {
        assert_eq!(number("+", 1.5).unwrap(), json!(1.5));
        assert!(matches!(number("/", f64::INFINITY), Err(EvalError::NonFinite(_))));
        assert!(number("*", f64::NAN).is_err());
    }

    #[test]
    fn test_round_half_away_from_zero() {
        assert_eq!(round_to(2.5, 0), 3.0);
        assert_eq!(round_to(-2.5, 0), -3.0);
        assert_eq!(round_to(180.456, 2), 180.46);
    }

    #[test]
    fn test_truthiness() {
        assert!(!is_truthy(&json!(null)));
        assert!(!is_truthy(&json!(0)));
        assert!(!is_truthy(&json!("")));
        assert!(!is_truthy(&json!([])));
        assert!(is_truthy(&json!("0")));
        assert!(is_truthy(&json!([0])));
        assert!(is_truthy(&json!({})));
    }

    #[test]
    fn test_equality() {
        assert!(loose_eq(&json!(1), &json!("1")));
        assert!(loose_eq(&json!(1), &json!(1.0)));
        assert!(!loose_eq(&json!(null), &json!(0)));
        assert!(!strict_eq(&json!(1), &json!("1")));
        assert!(strict_eq(&json!(1), &json!(1.0)));
    }

    #[test]
    fn test_compare() {
        assert_eq!(compare(&json!(2), &json!("10")), Some(Ordering::Less));
        assert_eq!(compare(&json!("b"), &json!("a")), Some(Ordering::Greater));
        assert_eq!(compare(&json!({}), &json!(1)), None);
    }

    #[test]
    fn test_compare_with_null_has_no_ordering() {
        assert_eq!(compare(&json!(null), &json!(1)), None);
        assert_eq!(compare(&json!(0), &json!(null)), None);
        assert_eq!(compare(&json!(null), &json!(null)), None);
    }

    #[test]
    fn test_field_number_is_strict() {
        assert_eq!(as_field_number(&json!(900)), Some(900.0));
        assert_eq!(as_field_number(&json!(true)), None);
        assert_eq!(as_field_number(&json!("900")), None);
    }
}

//! # Expression Evaluator
//!
//! Recursively evaluates an [`Expr`] against a read-only context.
//!
//! ## Context Shape
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  EvalContext                                                            │
//! │  ├── data  = { "order": { "baseValue": 900, "items": [...], ... } }     │
//! │  └── item  = current element inside foreach / foreach_sum (optional)    │
//! │                                                                         │
//! │  {"var": "order.baseValue"}     → data.order.baseValue                  │
//! │  {"var": "order.items.0.qty"}   → data.order.items[0].qty               │
//! │  {"var": "item.value"}          → item.value (when bound)               │
//! │  {"var": "order.nope"}          → null (or the var's default)           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The evaluator never holds a mutable reference to anything: writing a
//! result back into the Order is the pipeline's job.

use serde_json::Value;

use crate::error::{EvalError, EvalResult};
use crate::expr::Expr;
use crate::operators::OperatorRegistry;
use crate::value::{expect_number, is_truthy, number, type_name};

/// Segment name that addresses the current iteration element.
pub const ITEM_BINDING: &str = "item";

// =============================================================================
// Context
// =============================================================================

/// Read-only data visible to an expression.
#[derive(Debug, Clone, Copy)]
pub struct EvalContext<'a> {
    pub data: &'a Value,
    pub item: Option<&'a Value>,
}

impl<'a> EvalContext<'a> {
    /// Top-level context with no iteration binding.
    pub fn new(data: &'a Value) -> Self {
        EvalContext { data, item: None }
    }

    /// Same data, with `item` bound to `element`.
    fn with_item<'b>(&self, element: &'b Value) -> EvalContext<'b>
    where
        'a: 'b,
    {
        EvalContext {
            data: self.data,
            item: Some(element),
        }
    }

    /// Resolves dotted path segments. `None` when any segment is missing.
    pub fn resolve(&self, path: &[String]) -> Option<&'a Value> {
        let (mut current, rest) = match (self.item, path.split_first()) {
            (Some(item), Some((head, rest))) if head == ITEM_BINDING => (item, rest),
            _ => (self.data, path),
        };

        for segment in rest {
            current = match current {
                Value::Object(map) => map.get(segment)?,
                Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
                _ => return None,
            };
        }
        Some(current)
    }
}

// =============================================================================
// Evaluator
// =============================================================================

/// Evaluates expressions using one operator registry.
#[derive(Debug, Clone, Copy)]
pub struct Evaluator<'r> {
    registry: &'r OperatorRegistry,
}

impl<'r> Evaluator<'r> {
    pub fn new(registry: &'r OperatorRegistry) -> Self {
        Evaluator { registry }
    }

    /// Evaluates `expr` against `ctx`.
    pub fn evaluate(&self, expr: &Expr, ctx: &EvalContext<'_>) -> EvalResult {
        match expr {
            Expr::Literal(value) => Ok(value.clone()),

            Expr::Var { path, default } => match ctx.resolve(path) {
                Some(value) if !value.is_null() => Ok(value.clone()),
                _ => match default {
                    Some(default) => self.evaluate(default, ctx),
                    None => Ok(Value::Null),
                },
            },

            Expr::List(items) => items
                .iter()
                .map(|item| self.evaluate(item, ctx))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Array),

            Expr::Operator { name, args } => {
                // Registered operators shadow the special forms below.
                if let Some(op) = self.registry.get(name) {
                    let resolved = args
                        .iter()
                        .map(|arg| self.evaluate(arg, ctx))
                        .collect::<Result<Vec<_>, _>>()?;
                    return op(&resolved);
                }

                match name.as_str() {
                    "if" | "?:" => self.eval_if(args, ctx),
                    "and" => self.eval_and_or(name, args, ctx, false),
                    "or" => self.eval_and_or(name, args, ctx, true),
                    "foreach" => self.eval_foreach(args, ctx),
                    "foreach_sum" => self.eval_foreach_sum(args, ctx),
                    _ => Err(EvalError::UnknownOperator(name.clone())),
                }
            }
        }
    }

    /// Parses and evaluates a raw JSON logic tree in one step.
    #[cfg(test)]
    fn evaluate_json(&self, logic: &Value, data: &Value) -> EvalResult {
        let expr = Expr::parse(logic)?;
        self.evaluate(&expr, &EvalContext::new(data))
    }

    // =========================================================================
    // Special Forms
    // =========================================================================

    /// `[cond1, then1, cond2, then2, ..., else]`
    fn eval_if(&self, args: &[Expr], ctx: &EvalContext<'_>) -> EvalResult {
        for chunk in args.chunks(2) {
            match chunk {
                [cond, then] => {
                    if is_truthy(&self.evaluate(cond, ctx)?) {
                        return self.evaluate(then, ctx);
                    }
                }
                [otherwise] => return self.evaluate(otherwise, ctx),
                _ => {}
            }
        }
        Ok(Value::Null)
    }

    /// Short-circuits on the first value whose truthiness equals `stop_on`.
    fn eval_and_or(
        &self,
        name: &str,
        args: &[Expr],
        ctx: &EvalContext<'_>,
        stop_on: bool,
    ) -> EvalResult {
        if args.is_empty() {
            return Err(EvalError::arity(name, "at least 1", 0));
        }
        let mut last = Value::Null;
        for arg in args {
            last = self.evaluate(arg, ctx)?;
            if is_truthy(&last) == stop_on {
                break;
            }
        }
        Ok(last)
    }

    fn iteration_source(
        &self,
        operator: &str,
        args: &[Expr],
        ctx: &EvalContext<'_>,
    ) -> Result<Vec<Value>, EvalError> {
        if args.len() != 2 {
            return Err(EvalError::arity(operator, "2", args.len()));
        }
        match self.evaluate(&args[0], ctx)? {
            Value::Array(items) => Ok(items),
            Value::Null => Ok(Vec::new()),
            other => Err(EvalError::type_mismatch(operator, "array", type_name(&other))),
        }
    }

    /// `foreach(collection, body)` → one body result per element.
    fn eval_foreach(&self, args: &[Expr], ctx: &EvalContext<'_>) -> EvalResult {
        let elements = self.iteration_source("foreach", args, ctx)?;
        let body = &args[1];
        elements
            .iter()
            .map(|element| self.evaluate(body, &ctx.with_item(element)))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array)
    }

    /// `foreach_sum(collection, body)` → sum of the body results.
    fn eval_foreach_sum(&self, args: &[Expr], ctx: &EvalContext<'_>) -> EvalResult {
        let elements = self.iteration_source("foreach_sum", args, ctx)?;
        let body = &args[1];
        let mut total = 0.0;
        for element in &elements {
            let value = self.evaluate(body, &ctx.with_item(element))?;
            total += expect_number("foreach_sum", &value)?;
        }
        number("foreach_sum", total)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn order_data() -> Value {
        json!({
            "order": {
                "baseValue": 1000,
                "discountPercentage": 0.1,
                "items": [
                    {"sku": "A", "value": 300, "qty": 2},
                    {"sku": "B", "value": 400, "qty": 1}
                ],
                "appliedTaxes": {"VAT": 180}
            }
        })
    }

    fn eval(logic: Value) -> EvalResult {
        let registry = OperatorRegistry::default();
        Evaluator::new(&registry).evaluate_json(&logic, &order_data())
    }

    #[test]
    fn test_var_lookup() {
        assert_eq!(eval(json!({"var": "order.baseValue"})).unwrap(), json!(1000));
        assert_eq!(eval(json!({"var": "order.items.1.sku"})).unwrap(), json!("B"));
        assert_eq!(eval(json!({"var": "order.appliedTaxes.VAT"})).unwrap(), json!(180));
        assert_eq!(eval(json!({"var": "order.missing"})).unwrap(), json!(null));
        assert_eq!(eval(json!({"var": ["order.missing", 7]})).unwrap(), json!(7));
        assert_eq!(eval(json!({"var": "order.items.9.value"})).unwrap(), json!(null));
    }

    #[test]
    fn test_missing_var_is_zero_in_arithmetic() {
        assert_eq!(
            eval(json!({"+": [{"var": "order.nope"}, 5]})).unwrap(),
            json!(5.0)
        );
    }

    #[test]
    fn test_comparison_with_missing_var_is_false() {
        assert_eq!(eval(json!({"<": [{"var": "order.missing"}, 1]})).unwrap(), json!(false));
        assert_eq!(eval(json!({">=": [{"var": "order.missing"}, 0]})).unwrap(), json!(false));
        assert_eq!(
            eval(json!({"<": [{"var": ["order.missing", 0]}, 1]})).unwrap(),
            json!(true)
        );
    }

    #[test]
    fn test_literal() {
        assert_eq!(eval(json!(42)).unwrap(), json!(42));
        assert_eq!(eval(json!("EUR")).unwrap(), json!("EUR"));
    }

    #[test]
    fn test_nested_arithmetic() {
        let logic = json!({"*": [{"var": "order.baseValue"}, {"-": [1, {"var": "order.discountPercentage"}]}]});
        assert_eq!(eval(logic).unwrap(), json!(900.0));
    }

    #[test]
    fn test_if_chain() {
        let logic = json!({"if": [
            {">": [{"var": "order.baseValue"}, 5000]}, "large",
            {">": [{"var": "order.baseValue"}, 500]}, "medium",
            "small"
        ]});
        assert_eq!(eval(logic).unwrap(), json!("medium"));
        assert_eq!(eval(json!({"if": [false, 1]})).unwrap(), json!(null));
    }

    #[test]
    fn test_and_or_short_circuit() {
        // The unknown operator on the right is never evaluated
        assert_eq!(eval(json!({"and": [false, {"boom": []}]})).unwrap(), json!(false));
        assert_eq!(eval(json!({"or": [1, {"boom": []}]})).unwrap(), json!(1));
        assert_eq!(eval(json!({"and": [1, 2]})).unwrap(), json!(2));
    }

    #[test]
    fn test_foreach_produces_sequence() {
        let logic = json!({"foreach": [
            {"var": "order.items"},
            {"*": [{"var": "item.value"}, {"var": "item.qty"}]}
        ]});
        assert_eq!(eval(logic).unwrap(), json!([600.0, 400.0]));
    }

    #[test]
    fn test_foreach_sees_order() {
        let logic = json!({"foreach": [
            {"var": "order.items"},
            {"+": [{"var": "item.qty"}, {"var": "order.baseValue"}]}
        ]});
        assert_eq!(eval(logic).unwrap(), json!([1002.0, 1001.0]));
    }

    #[test]
    fn test_foreach_sum_accumulates() {
        let logic = json!({"foreach_sum": [
            {"var": "order.items"},
            {"*": [{"var": "item.value"}, {"var": "item.qty"}]}
        ]});
        assert_eq!(eval(logic).unwrap(), json!(1000.0));
    }

    #[test]
    fn test_sum_over_foreach() {
        let logic = json!({"sum": [{"foreach": [
            {"var": "order.items"},
            {"var": "item.qty"}
        ]}]});
        assert_eq!(eval(logic).unwrap(), json!(3.0));
    }

    #[test]
    fn test_foreach_over_missing_collection() {
        let logic = json!({"foreach_sum": [{"var": "order.nothing"}, 1]});
        assert_eq!(eval(logic).unwrap(), json!(0.0));
    }

    #[test]
    fn test_foreach_type_errors() {
        assert!(matches!(
            eval(json!({"foreach": [{"var": "order.baseValue"}, 1]})),
            Err(EvalError::TypeMismatch { .. })
        ));
        assert!(matches!(
            eval(json!({"foreach": [[1, 2]]})),
            Err(EvalError::Arity { .. })
        ));
    }

    #[test]
    fn test_unknown_operator() {
        assert_eq!(
            eval(json!({"frobnicate": [1]})),
            Err(EvalError::UnknownOperator("frobnicate".to_string()))
        );
    }

    #[test]
    fn test_registered_operator_shadows_special_form() {
        let mut registry = OperatorRegistry::default();
        registry.register("if", |_| Ok(json!("registered")));
        let result = Evaluator::new(&registry)
            .evaluate_json(&json!({"if": [true, 1, 2]}), &order_data())
            .unwrap();
        assert_eq!(result, json!("registered"));
    }

    #[test]
    fn test_registered_round_wins_over_builtin() {
        let mut registry = OperatorRegistry::default();
        registry.register("round", |_| Ok(json!(-1)));
        let result = Evaluator::new(&registry)
            .evaluate_json(&json!({"round": [2.5]}), &order_data())
            .unwrap();
        assert_eq!(result, json!(-1));
    }

    #[test]
    fn test_args_evaluated_before_native_call() {
        let logic = json!({"allocate": [{"var": "order.baseValue"}, [1, {"var": "order.items.1.qty"}, 2]]});
        assert_eq!(eval(logic).unwrap(), json!([250.0, 250.0, 500.0]));
    }

    #[test]
    fn test_evaluation_does_not_mutate_data() {
        let data = order_data();
        let before = data.clone();
        let registry = OperatorRegistry::default();
        let _ = Evaluator::new(&registry)
            .evaluate_json(&json!({"foreach": [{"var": "order.items"}, {"var": "item"}]}), &data);
        assert_eq!(data, before);
    }
}

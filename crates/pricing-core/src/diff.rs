//! # State Fragments
//!
//! Flattens Orders to shallow key → value maps, diffs two of them, and
//! applies a diff back onto an Order.
//!
//! ## Flattened Keys
//! ```text
//! ┌────────────────────────┬──────────────────────────────────────────────┐
//! │ key                    │ value                                        │
//! ├────────────────────────┼──────────────────────────────────────────────┤
//! │ id, currency,          │ string                                       │
//! │ correlationId,         │                                              │
//! │ rulesVersion           │                                              │
//! │ items                  │ whole item array (compared as one value)     │
//! │ baseValue, totalValue, │ number                                       │
//! │ discountPercentage     │                                              │
//! │ totalItems             │ integer                                      │
//! │ appliedTaxes.<name>    │ number, one key per tax                      │
//! └────────────────────────┴──────────────────────────────────────────────┘
//! ```
//!
//! A fragment only holds keys whose value changed (or appeared). The engine
//! diffs against the hydrated, version-stamped snapshot, so applying a
//! fragment to that snapshot reproduces the final order. On the submitted
//! order it reproduces every priced field.

use serde_json::{json, Number, Value};

use crate::error::FragmentError;
use crate::types::{Item, Order, StateFragment};

const TAX_KEY_PREFIX: &str = "appliedTaxes.";

fn float(value: f64) -> Value {
    Number::from_f64(value).map(Value::Number).unwrap_or(Value::Null)
}

/// Flattens an order to its fragment keys.
pub fn flatten(order: &Order) -> StateFragment {
    let mut flat = StateFragment::new();

    flat.insert("id".to_string(), Value::String(order.id.clone()));
    flat.insert("currency".to_string(), Value::String(order.currency.clone()));
    flat.insert(
        "correlationId".to_string(),
        Value::String(order.correlation_id.clone()),
    );
    flat.insert(
        "rulesVersion".to_string(),
        Value::String(order.rules_version.clone()),
    );

    let items = order
        .items
        .iter()
        .map(|item| json!({"sku": item.sku, "value": float(item.value), "qty": item.qty}))
        .collect();
    flat.insert("items".to_string(), Value::Array(items));

    flat.insert("baseValue".to_string(), float(order.base_value));
    flat.insert("totalValue".to_string(), float(order.total_value));
    flat.insert("totalItems".to_string(), json!(order.total_items));
    flat.insert(
        "discountPercentage".to_string(),
        float(order.discount_percentage),
    );

    for (name, amount) in &order.applied_taxes {
        flat.insert(format!("{}{}", TAX_KEY_PREFIX, name), float(*amount));
    }

    flat
}

/// Keys of `after` whose value differs from, or is missing in, `before`.
pub fn diff(before: &Order, after: &Order) -> StateFragment {
    let before = flatten(before);
    flatten(after)
        .into_iter()
        .filter(|(key, value)| before.get(key) != Some(value))
        .collect()
}

/// Applies a fragment to a copy of `order`.
///
/// ## Errors
/// - `UnknownKey` for keys outside the flattened key set
/// - `InvalidValue` when a value has the wrong JSON type
pub fn apply_fragment(order: &Order, fragment: &StateFragment) -> Result<Order, FragmentError> {
    let mut order = order.clone();

    for (key, value) in fragment {
        match key.as_str() {
            "id" => order.id = string_value(key, value)?,
            "currency" => order.currency = string_value(key, value)?,
            "correlationId" => order.correlation_id = string_value(key, value)?,
            "rulesVersion" => order.rules_version = string_value(key, value)?,
            "items" => {
                order.items = serde_json::from_value::<Vec<Item>>(value.clone()).map_err(|e| {
                    FragmentError::InvalidValue {
                        key: key.clone(),
                        reason: e.to_string(),
                    }
                })?
            }
            "baseValue" => order.base_value = number_value(key, value)?,
            "totalValue" => order.total_value = number_value(key, value)?,
            "discountPercentage" => order.discount_percentage = number_value(key, value)?,
            "totalItems" => {
                order.total_items = value.as_i64().ok_or_else(|| FragmentError::InvalidValue {
                    key: key.clone(),
                    reason: "expected an integer".to_string(),
                })?
            }
            other => match other.strip_prefix(TAX_KEY_PREFIX) {
                Some(name) if !name.is_empty() => {
                    let amount = number_value(key, value)?;
                    order.applied_taxes.insert(name.to_string(), amount);
                }
                _ => return Err(FragmentError::UnknownKey(key.clone())),
            },
        }
    }

    Ok(order)
}

fn string_value(key: &str, value: &Value) -> Result<String, FragmentError> {
    value
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| FragmentError::InvalidValue {
            key: key.to_string(),
            reason: "expected a string".to_string(),
        })
}

fn number_value(key: &str, value: &Value) -> Result<f64, FragmentError> {
    value.as_f64().ok_or_else(|| FragmentError::InvalidValue {
        key: key.to_string(),
        reason: "expected a number".to_string(),
    })
}

// =============================================================================
// Unit Tests
// =============================================================================

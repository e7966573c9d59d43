//! # Output Targets
//!
//! The closed set of Order fields a rule may write to.
//!
//! ```text
//! output_key                      OutputTarget
//! ──────────                      ────────────
//! order.baseValue / baseValue  →  BaseValue
//! order.totalValue             →  TotalValue
//! order.appliedTaxes.VAT       →  AppliedTax("VAT")
//! anything else                →  rejected when the pack is compiled
//! ```

use std::fmt;
use std::str::FromStr;

use crate::types::Order;

const ORDER_PREFIX: &str = "order.";
const TAX_PREFIX: &str = "appliedTaxes.";

/// A writable Order field.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum OutputTarget {
    BaseValue,
    AppliedTax(String),
    TotalValue,
}

impl OutputTarget {
    /// Writes `value` into the addressed field. The tax map entry is created
    /// on first write.
    pub fn apply(&self, order: &mut Order, value: f64) {
        match self {
            OutputTarget::BaseValue => order.base_value = value,
            OutputTarget::TotalValue => order.total_value = value,
            OutputTarget::AppliedTax(name) => {
                order.applied_taxes.insert(name.clone(), value);
            }
        }
    }
}

impl FromStr for OutputTarget {
    type Err = String;

    fn from_str(key: &str) -> Result<Self, Self::Err> {
        let field = key.strip_prefix(ORDER_PREFIX).unwrap_or(key);
        match field {
            "baseValue" => Ok(OutputTarget::BaseValue),
            "totalValue" => Ok(OutputTarget::TotalValue),
            other => match other.strip_prefix(TAX_PREFIX) {
                Some(name) if !name.is_empty() && !name.contains('.') => {
                    Ok(OutputTarget::AppliedTax(name.to_string()))
                }
                _ => Err(format!("'{}' is not a writable order field", key)),
            },
        }
    }
}

impl fmt::Display for OutputTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputTarget::BaseValue => write!(f, "order.baseValue"),
            OutputTarget::TotalValue => write!(f, "order.totalValue"),
            OutputTarget::AppliedTax(name) => write!(f, "order.appliedTaxes.{}", name),
        }
    }
}

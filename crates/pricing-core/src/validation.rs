//! # Validation Module
//!
//! Input checks run at the edges: by the CLI before an order reaches the
//! engine, and by pack compilation before a rule pack is accepted.
//!
//! ## Validation Layers
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Layer 1: Transport (CLI / service)                                     │
//! │  ├── JSON deserialization (types)                                       │
//! │  └── validate_order: skus, quantities, discount range                   │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: Pack compilation                                              │
//! │  ├── validate_version, validate_rule_id                                 │
//! │  └── output keys parsed into OutputTarget                               │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Evaluation                                                    │
//! │  └── type / arity errors stay local to one rule                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The engine itself does not call `validate_order`: it prices whatever it is
//! given, and a bad value simply makes the rules that touch it fail.

use crate::error::ValidationError;
use crate::types::Order;
use crate::{MAX_ITEM_QUANTITY, MAX_ORDER_ITEMS};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

// =============================================================================
// String Validators
// =============================================================================

/// Validates a SKU.
///
/// ## Rules
/// - Must not be empty
/// - At most 50 characters
/// - Letters, numbers, hyphens and underscores only
///
/// ## Example
/// ```rust
/// use pricing_core::validation::validate_sku;
///
/// assert!(validate_sku("SKU-001").is_ok());
/// assert!(validate_sku("").is_err());
/// ```
pub fn validate_sku(sku: &str) -> ValidationResult<()> {
    let sku = sku.trim();

    if sku.is_empty() {
        return Err(ValidationError::Required {
            field: "sku".to_string(),
        });
    }

    if sku.len() > 50 {
        return Err(ValidationError::TooLong {
            field: "sku".to_string(),
            max: 50,
        });
    }

    if !sku
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-' || c == '_')
    {
        return Err(ValidationError::InvalidFormat {
            field: "sku".to_string(),
            reason: "must contain only letters, numbers, hyphens, and underscores".to_string(),
        });
    }

    Ok(())
}

/// Validates a rules version label such as `v1.0` or `1.2-beta`.
///
/// ## Rules
/// - Must not be empty
/// - At most 32 characters
/// - Letters, numbers, `.`, `-` and `_` only (it becomes part of a file name)
pub fn validate_version(version: &str) -> ValidationResult<()> {
    if version.trim().is_empty() {
        return Err(ValidationError::Required {
            field: "version".to_string(),
        });
    }

    if version.len() > 32 {
        return Err(ValidationError::TooLong {
            field: "version".to_string(),
            max: 32,
        });
    }

    if !version
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_'))
    {
        return Err(ValidationError::InvalidFormat {
            field: "version".to_string(),
            reason: "must contain only letters, numbers, '.', '-' and '_'".to_string(),
        });
    }

    Ok(())
}

/// Validates a rule id.
pub fn validate_rule_id(id: &str) -> ValidationResult<()> {
    if id.trim().is_empty() {
        return Err(ValidationError::Required {
            field: "rule id".to_string(),
        });
    }

    if id.len() > 100 {
        return Err(ValidationError::TooLong {
            field: "rule id".to_string(),
            max: 100,
        });
    }

    Ok(())
}

// =============================================================================
// Numeric Validators
// =============================================================================

/// Validates an item quantity.
///
/// ## Example
/// ```rust
/// use pricing_core::validation::validate_quantity;
///
/// assert!(validate_quantity(2).is_ok());
/// assert!(validate_quantity(-1).is_err());
/// ```
pub fn validate_quantity(qty: i64) -> ValidationResult<()> {
    if qty < 0 {
        return Err(ValidationError::Negative {
            field: "qty".to_string(),
        });
    }

    if qty > MAX_ITEM_QUANTITY {
        return Err(ValidationError::OutOfRange {
            field: "qty".to_string(),
            min: 0.0,
            max: MAX_ITEM_QUANTITY as f64,
        });
    }

    Ok(())
}

/// Validates a monetary amount: finite and not negative.
pub fn validate_amount(field: &str, amount: f64) -> ValidationResult<()> {
    if !amount.is_finite() {
        return Err(ValidationError::NotFinite {
            field: field.to_string(),
        });
    }

    if amount < 0.0 {
        return Err(ValidationError::Negative {
            field: field.to_string(),
        });
    }

    Ok(())
}

/// Validates a fractional discount (0.0 ..= 1.0).
pub fn validate_discount(discount: f64) -> ValidationResult<()> {
    if !discount.is_finite() || !(0.0..=1.0).contains(&discount) {
        return Err(ValidationError::OutOfRange {
            field: "discountPercentage".to_string(),
            min: 0.0,
            max: 1.0,
        });
    }
    Ok(())
}

// =============================================================================
// Order Validation
// =============================================================================

/// Validates an incoming order before it is priced.
pub fn validate_order(order: &Order) -> ValidationResult<()> {
    if order.items.len() > MAX_ORDER_ITEMS {
        return Err(ValidationError::OutOfRange {
            field: "items".to_string(),
            min: 0.0,
            max: MAX_ORDER_ITEMS as f64,
        });
    }

    for item in &order.items {
        validate_sku(&item.sku)?;
        validate_amount("value", item.value)?;
        validate_quantity(item.qty)?;
    }

    validate_amount("baseValue", order.base_value)?;
    validate_discount(order.discount_percentage)?;

    for (name, amount) in &order.applied_taxes {
        if name.is_empty() {
            return Err(ValidationError::Required {
                field: "tax name".to_string(),
            });
        }
        if !amount.is_finite() {
            return Err(ValidationError::NotFinite {
                field: format!("appliedTaxes.{}", name),
            });
        }
    }

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Item;

    #[test]
    fn test_validate_sku() {
        assert!(validate_sku("SKU-001").is_ok());
        assert!(validate_sku("item_42").is_ok());
        assert!(validate_sku("").is_err());
        assert!(validate_sku("   ").is_err());
        assert!(validate_sku("has space").is_err());
        assert!(validate_sku(&"A".repeat(51)).is_err());
    }

    #[test]
    fn test_validate_version() {
        assert!(validate_version("v1.0").is_ok());
        assert!(validate_version("2024_q3-beta").is_ok());
        assert!(validate_version("").is_err());
        assert!(validate_version("../etc/passwd").is_err());
        assert!(validate_version(&"9".repeat(33)).is_err());
    }

    #[test]
    fn test_validate_rule_id() {
        assert!(validate_rule_id("vat_rule").is_ok());
        assert!(validate_rule_id(" ").is_err());
    }

    #[test]
    fn test_validate_quantity() {
        assert!(validate_quantity(0).is_ok());
        assert!(validate_quantity(MAX_ITEM_QUANTITY).is_ok());
        assert!(validate_quantity(MAX_ITEM_QUANTITY + 1).is_err());
        assert!(matches!(
            validate_quantity(-1),
            Err(ValidationError::Negative { .. })
        ));
    }

    #[test]
    fn test_validate_order() {
        let mut order = Order {
            items: vec![Item::new("A", 500.0, 2)],
            discount_percentage: 0.1,
            ..Default::default()
        };
        assert!(validate_order(&order).is_ok());

        order.discount_percentage = 1.5;
        assert!(validate_order(&order).is_err());

        order.discount_percentage = 0.0;
        order.items[0].value = f64::NAN;
        assert!(matches!(
            validate_order(&order),
            Err(ValidationError::NotFinite { .. })
        ));
    }
}

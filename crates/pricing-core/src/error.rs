//! # Error Types
//!
//! Domain-specific error types for pricing-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  EngineError        - fatal, aborts the run, no EngineResult            │
//! │  ├── PackLoad(PackLoadError)  pack missing / unparseable / invalid      │
//! │  └── Cancelled                caller aborted between rules              │
//! │                                                                         │
//! │  EvalError          - local to ONE rule; the rule is skipped,           │
//! │                       the phase continues                               │
//! │                                                                         │
//! │  FragmentError      - applying a state fragment to an Order             │
//! │  ValidationError    - input validation failures                         │
//! │                                                                         │
//! │  GuardViolation is NOT an error: it is a collected business rejection   │
//! │  (see types.rs).                                                        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

// =============================================================================
// Evaluation Error
// =============================================================================

/// Failure while parsing or evaluating a single rule's logic.
///
/// ## Scope
/// An `EvalError` never aborts a run. The pipeline records a `failed`
/// execution step for the rule and moves on to the next one.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EvalError {
    /// No registered operator or special form carries this name.
    #[error("Unknown operator: {0}")]
    UnknownOperator(String),

    /// Operator called with the wrong number of arguments.
    #[error("Operator '{operator}' expects {expected} argument(s), got {actual}")]
    Arity {
        operator: String,
        expected: String,
        actual: usize,
    },

    /// Argument or result of the wrong shape.
    #[error("Operator '{operator}' expected {expected}, found {found}")]
    TypeMismatch {
        operator: String,
        expected: String,
        found: String,
    },

    /// Division (or proportional split) by zero.
    #[error("Division by zero in '{0}'")]
    DivisionByZero(String),

    /// Arithmetic produced NaN or infinity.
    #[error("Operator '{0}' produced a non-finite number")]
    NonFinite(String),

    /// Expression tree does not follow the grammar.
    #[error("Malformed expression: {0}")]
    Malformed(String),

    /// The order snapshot could not be exposed to the evaluator.
    #[error("Evaluation context unavailable: {0}")]
    Context(String),
}

impl EvalError {
    /// Creates an arity error.
    pub fn arity(operator: impl Into<String>, expected: impl Into<String>, actual: usize) -> Self {
        EvalError::Arity {
            operator: operator.into(),
            expected: expected.into(),
            actual,
        }
    }

    /// Creates a type mismatch error.
    pub fn type_mismatch(
        operator: impl Into<String>,
        expected: impl Into<String>,
        found: impl Into<String>,
    ) -> Self {
        EvalError::TypeMismatch {
            operator: operator.into(),
            expected: expected.into(),
            found: found.into(),
        }
    }
}

/// Result of evaluating an expression.
pub type EvalResult = Result<serde_json::Value, EvalError>;

// =============================================================================
// Pack Load Error
// =============================================================================

/// Failure to obtain a usable rule pack. Always fatal for the run.
///
/// ## When This Occurs
/// - No pack exists for the requested version
/// - The pack file is not valid JSON/YAML
/// - A rule writes to an output key outside the addressable set
/// - Two rules share an id
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PackLoadError {
    #[error("Rule pack not found: {version}")]
    NotFound { version: String },

    #[error("Rule pack {version} could not be parsed: {reason}")]
    Parse { version: String, reason: String },

    #[error("Rule pack {version} is invalid: {reason}")]
    InvalidPack { version: String, reason: String },

    #[error("Rule '{rule_id}' in pack {version} is invalid: {reason}")]
    InvalidRule {
        version: String,
        rule_id: String,
        reason: String,
    },

    #[error("Rule pack {version} could not be read: {reason}")]
    Io { version: String, reason: String },
}

impl PackLoadError {
    /// Creates a NotFound error for a version.
    pub fn not_found(version: impl Into<String>) -> Self {
        PackLoadError::NotFound {
            version: version.into(),
        }
    }

    /// Returns true if the pack simply does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, PackLoadError::NotFound { .. })
    }
}

// =============================================================================
// Engine Error
// =============================================================================

/// Fatal errors returned by `Engine::run_engine`.
///
/// No partial `EngineResult` accompanies either variant; the caller's order
/// is never touched.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EngineError {
    #[error("Rule pack load failed: {0}")]
    PackLoad(#[from] PackLoadError),

    #[error("Engine run cancelled")]
    Cancelled,
}

// =============================================================================
// Fragment Error
// =============================================================================

/// Errors while applying a state fragment to an order.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FragmentError {
    #[error("Unknown fragment key: {0}")]
    UnknownKey(String),

    #[error("Invalid value for fragment key {key}: {reason}")]
    InvalidValue { key: String, reason: String },
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// Used by the transport edge (CLI) before an order reaches the engine, and
/// by rule-pack compilation.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: f64, max: f64 },

    /// Value must not be negative.
    #[error("{field} must not be negative")]
    Negative { field: String },

    /// Value must be a finite number.
    #[error("{field} must be a finite number")]
    NotFinite { field: String },

    /// Invalid format.
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// Duplicate value (e.g., duplicate rule id).
    #[error("{field} '{value}' already exists")]
    Duplicate { field: String, value: String },
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = EvalError::arity("allocate", "2", 3);
        assert_eq!(
            err.to_string(),
            "Operator 'allocate' expects 2 argument(s), got 3"
        );

        let err = PackLoadError::not_found("v9.9");
        assert_eq!(err.to_string(), "Rule pack not found: v9.9");
        assert!(err.is_not_found());
    }

    #[test]
    fn test_pack_error_converts_to_engine_error() {
        let engine_err: EngineError = PackLoadError::not_found("v1.0").into();
        assert!(matches!(engine_err, EngineError::PackLoad(_)));
    }

    #[test]
    fn test_validation_error_messages() {
        let err = ValidationError::Required {
            field: "sku".to_string(),
        };
        assert_eq!(err.to_string(), "sku is required");
    }
}

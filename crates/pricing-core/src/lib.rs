//! # pricing-core: Rule Evaluation Engine
//!
//! Computes derived pricing fields (base value, allocations, taxes, totals)
//! and business guards for an order by interpreting a versioned rule pack.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Pricing Engine Architecture                      │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                 Callers (pricing-cli, services)                 │   │
//! │  │        parse order JSON ──► run_engine ──► render result        │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │             ★ pricing-core (THIS CRATE) ★                       │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌───────────┐  ┌───────────┐  │   │
//! │  │   │ operators │◄─│ evaluator │◄─│ pipeline  │◄─│  engine   │  │   │
//! │  │   │ registry  │  │   Expr    │  │  phases   │  │ run_engine│  │   │
//! │  │   └───────────┘  └───────────┘  │  guards   │  └─────┬─────┘  │   │
//! │  │                                 └───────────┘        │        │   │
//! │  │                                      diff ◄──────────┘        │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO FILES • NO NETWORK • DETERMINISTIC               │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │ RulePackProvider                       │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │              pricing-packs (rule-pack files & caches)           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Order, RulePack, EngineResult and friends
//! - [`expr`] - Typed expression tree parsed from rule logic
//! - [`operators`] - Operator registry (`round`, `allocate`, arithmetic, ...)
//! - [`evaluator`] - Expression evaluation against a read-only context
//! - [`pack`] - Rule pack compilation and validation
//! - [`pipeline`] - Fixed-phase rule execution
//! - [`diff`] - State fragments
//! - [`engine`] - `run_engine` entry point
//!
//! ## Example Usage
//!
//! ```rust
//! use std::sync::Arc;
//! use pricing_core::{CompiledRulePack, Engine, Item, Order, PackLoadError,
//!                    RulePack, RulePackProvider, RunContext};
//! use serde_json::json;
//!
//! struct OnePack(Arc<CompiledRulePack>);
//!
//! impl RulePackProvider for OnePack {
//!     fn load(&self, version: &str) -> Result<Arc<CompiledRulePack>, PackLoadError> {
//!         if version == self.0.version {
//!             Ok(self.0.clone())
//!         } else {
//!             Err(PackLoadError::not_found(version))
//!         }
//!     }
//! }
//!
//! let pack: RulePack = serde_json::from_value(json!({
//!     "version": "v1.0",
//!     "rules": [{
//!         "id": "vat", "phase": "taxes",
//!         "logic": {"*": [{"var": "order.baseValue"}, 0.25]},
//!         "output_key": "order.appliedTaxes.VAT"
//!     }]
//! })).unwrap();
//! let engine = Engine::new(OnePack(Arc::new(CompiledRulePack::compile(pack).unwrap())));
//!
//! let order = Order { items: vec![Item::new("A", 100.0, 2)], ..Default::default() };
//! let result = engine.run_engine(&RunContext::new("req-1"), &order, "1.0").unwrap();
//!
//! assert_eq!(result.state_fragment["totalValue"], json!(250.0));
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod cancel;
pub mod diff;
pub mod engine;
pub mod error;
pub mod evaluator;
pub mod expr;
pub mod operators;
pub mod pack;
pub mod pipeline;
pub mod target;
pub mod types;
pub mod validation;
pub mod value;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use cancel::{cancellation_pair, CancellationHandle, CancellationSignal};
pub use diff::{apply_fragment, diff, flatten};
pub use engine::{normalize_version, Engine, RulePackProvider, RunContext};
pub use error::{EngineError, EvalError, FragmentError, PackLoadError, ValidationError};
pub use evaluator::{EvalContext, Evaluator};
pub use expr::Expr;
pub use operators::{NativeFn, OperatorRegistry};
pub use pack::{CompiledRule, CompiledRulePack, RuleOutput};
pub use target::OutputTarget;
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// `reason` of every guard violation.
pub const GUARD_REASON: &str = "Violation Detected";

/// Context of a guard violation whose rule has no `error_message`.
pub const DEFAULT_GUARD_MESSAGE: &str = "Guard condition triggered";

/// Maximum number of lines accepted in one order.
pub const MAX_ORDER_ITEMS: usize = 1000;

/// Maximum quantity of a single line.
pub const MAX_ITEM_QUANTITY: i64 = 100_000;

//! # Domain Types
//!
//! Core domain types shared by the evaluator, the pipeline and the callers.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │     Order       │   │    RulePack     │   │  EngineResult   │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  id, currency   │   │  version        │   │  stateFragment  │       │
//! │  │  items[]        │   │  description    │   │  serverDelta    │       │
//! │  │  baseValue      │   │  rules[]        │   │  rulesVersion   │       │
//! │  │  appliedTaxes   │   │   └ RuleConfig  │   │  executionLog   │       │
//! │  │  totalValue     │   └─────────────────┘   │  guardsHit      │       │
//! │  └─────────────────┘                         └─────────────────┘       │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │     Phase       │   │  ExecutionStep  │   │ GuardViolation  │       │
//! │  │  baseline       │   │  phase, ruleId  │   │  ruleId         │       │
//! │  │  orderAdjust    │   │  action         │   │  reason         │       │
//! │  │  allocation     │   │  message        │   │  context        │       │
//! │  │  taxes, totals  │   └─────────────────┘   └─────────────────┘       │
//! │  │  guards         │                                                    │
//! │  └─────────────────┘                                                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Wire Format
//! Every type serializes with the camelCase JSON names used by existing
//! clients (`baseValue`, `appliedTaxes`, `guardsHit`, ...). Rule packs keep
//! their snake_case `output_key` / `error_message` fields.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

// =============================================================================
// Order
// =============================================================================

/// A single order line.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Item {
    /// Stock Keeping Unit.
    pub sku: String,

    /// Unit value.
    pub value: f64,

    /// Quantity ordered.
    pub qty: i64,
}

impl Item {
    /// Creates a new item.
    pub fn new(sku: impl Into<String>, value: f64, qty: i64) -> Self {
        Item {
            sku: sku.into(),
            value,
            qty,
        }
    }

    /// Line value (unit value × quantity).
    #[inline]
    pub fn line_value(&self) -> f64 {
        self.value * self.qty as f64
    }
}

/// The record the pipeline computes prices for.
///
/// ## Ownership
/// The caller owns the Order before and after a run. During a run the
/// engine works on its own scratch copy, so a failed or cancelled run never
/// leaves a half-priced order behind.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Order {
    pub id: String,

    pub currency: String,

    /// Tracing id propagated from the transport layer.
    pub correlation_id: String,

    /// Version of the pack that last priced this order.
    pub rules_version: String,

    pub items: Vec<Item>,

    pub base_value: f64,

    pub total_value: f64,

    /// Sum of item quantities. Derived during hydration.
    pub total_items: i64,

    /// Fractional discount (0.1 = 10%).
    pub discount_percentage: f64,

    /// Tax name → amount. Keys are free-form.
    pub applied_taxes: BTreeMap<String, f64>,
}

impl Order {
    /// Sum of all applied tax amounts.
    pub fn tax_total(&self) -> f64 {
        self.applied_taxes.values().sum()
    }

    /// Sum of item quantities.
    pub fn item_count(&self) -> i64 {
        self.items.iter().map(|i| i.qty).sum()
    }

    /// Sum of line values (value × qty) over all items.
    pub fn items_value(&self) -> f64 {
        self.items.iter().map(Item::line_value).sum()
    }
}

// =============================================================================
// Phase
// =============================================================================

/// Pipeline phase. Phases always execute in [`Phase::ORDERED`] order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Phase {
    Baseline,
    OrderAdjust,
    Allocation,
    Taxes,
    Totals,
    Guards,
}

impl Phase {
    /// Execution order of the pipeline.
    pub const ORDERED: [Phase; 6] = [
        Phase::Baseline,
        Phase::OrderAdjust,
        Phase::Allocation,
        Phase::Taxes,
        Phase::Totals,
        Phase::Guards,
    ];

    /// Wire name of the phase.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Phase::Baseline => "baseline",
            Phase::OrderAdjust => "orderAdjust",
            Phase::Allocation => "allocation",
            Phase::Taxes => "taxes",
            Phase::Totals => "totals",
            Phase::Guards => "guards",
        }
    }

    /// Returns true for the terminal guard phase.
    #[inline]
    pub const fn is_guard(&self) -> bool {
        matches!(self, Phase::Guards)
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Phase {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Phase::ORDERED
            .iter()
            .copied()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| format!("unknown phase '{}'", s))
    }
}

// =============================================================================
// Rule Pack (external representation)
// =============================================================================

/// One rule as authored in a pack file.
///
/// `phase` stays a plain string here: packs may carry phases this engine
/// does not know, which are reported and skipped at compile time instead of
/// failing the whole pack.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleConfig {
    pub id: String,

    pub phase: String,

    /// Expression tree (JsonLogic-style).
    pub logic: Value,

    /// Dotted field path the result is written to. Ignored for guards.
    #[serde(default)]
    pub output_key: String,

    /// Context message for guard violations.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

/// A versioned, ordered collection of rules.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RulePack {
    pub version: String,

    #[serde(default)]
    pub description: String,

    #[serde(default)]
    pub rules: Vec<RuleConfig>,
}

// =============================================================================
// Execution Log
// =============================================================================

/// What happened to a non-guard rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepAction {
    /// Result was written to the rule's output key.
    Compute,
    /// Evaluation failed or produced an unroutable value; nothing written.
    Failed,
}

/// Audit entry for one non-guard rule. Never read back by the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionStep {
    pub phase: Phase,
    pub rule_id: String,
    pub action: StepAction,
    pub message: String,
}

// =============================================================================
// Guard Violation
// =============================================================================

/// A business rejection raised by a guard rule. Not an error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GuardViolation {
    pub rule_id: String,
    pub reason: String,
    pub context: String,
}

// =============================================================================
// Engine Result
// =============================================================================

/// Flat key → value view of an Order (`appliedTaxes.VAT`, `baseValue`, ...).
pub type StateFragment = BTreeMap<String, Value>;

/// Outcome of one successful engine run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineResult {
    /// Only the fields that changed between the submitted and final order.
    pub state_fragment: StateFragment,

    /// True when the fragment is non-empty.
    #[serde(rename = "serverDelta")]
    pub authoritative_change: bool,

    pub rules_version: String,

    pub execution_log: Vec<ExecutionStep>,

    #[serde(rename = "guardsHit")]
    pub guard_violations: Vec<GuardViolation>,
}

impl EngineResult {
    /// Returns true if at least one guard fired.
    pub fn is_blocked(&self) -> bool {
        !self.guard_violations.is_empty()
    }

    /// Number of rules that failed to evaluate.
    pub fn failed_steps(&self) -> usize {
        self.execution_log
            .iter()
            .filter(|s| s.action == StepAction::Failed)
            .count()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

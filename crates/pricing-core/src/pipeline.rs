//! # Rule Pipeline
//!
//! Drives a compiled pack over one Order, phase by phase.
//!
//! ## Run Sequence
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  hydrate(order)         totalItems = Σ qty                              │
//! │                         baseValue  = Σ value×qty   (only when 0)        │
//! │        │                                                                │
//! │        ▼                                                                │
//! │  baseline → orderAdjust → allocation → taxes → totals                   │
//! │        │   per rule, in pack order:                                     │
//! │        │     cancelled?          → EngineError::Cancelled               │
//! │        │     evaluate({order})                                          │
//! │        │       Err / non-number  → log `failed`, nothing written        │
//! │        │       null              → skipped silently                     │
//! │        │       number            → write output key, log `compute`      │
//! │        ▼                                                                │
//! │  finalize_totals        totalValue = baseValue + Σ appliedTaxes         │
//! │        │                                                                │
//! │        ▼                                                                │
//! │  guards                 `true` → GuardViolation (all guards run)        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Rules within a phase run strictly in sequence: a rule may read what an
//! earlier rule of the same phase wrote.

use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::cancel::CancellationSignal;
use crate::error::{EngineError, EvalError, EvalResult};
use crate::evaluator::{EvalContext, Evaluator};
use crate::operators::OperatorRegistry;
use crate::pack::{CompiledRule, CompiledRulePack, RuleOutput};
use crate::types::{ExecutionStep, GuardViolation, Order, Phase, StepAction};
use crate::value::{as_field_number, type_name};
use crate::{DEFAULT_GUARD_MESSAGE, GUARD_REASON};

/// What one pipeline run produced.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineOutcome {
    /// Snapshot taken after hydration, before phase 0.
    pub initial: Order,
    /// Final, finalized order.
    pub order: Order,
    pub execution_log: Vec<ExecutionStep>,
    pub guard_violations: Vec<GuardViolation>,
}

/// Executes rule packs against orders.
#[derive(Debug, Clone, Copy)]
pub struct Pipeline<'r> {
    evaluator: Evaluator<'r>,
    default_guard_message: &'r str,
}

impl<'r> Pipeline<'r> {
    pub fn new(registry: &'r OperatorRegistry) -> Self {
        Pipeline {
            evaluator: Evaluator::new(registry),
            default_guard_message: DEFAULT_GUARD_MESSAGE,
        }
    }

    /// Context used for guards that carry no `error_message`.
    pub fn with_default_guard_message(mut self, message: &'r str) -> Self {
        self.default_guard_message = message;
        self
    }

    /// Runs every phase over `order` (a scratch copy owned by this call).
    pub fn run(
        &self,
        pack: &CompiledRulePack,
        mut order: Order,
        cancel: &CancellationSignal,
    ) -> Result<PipelineOutcome, EngineError> {
        if cancel.is_cancelled() {
            return Err(EngineError::Cancelled);
        }

        hydrate(&mut order);
        let initial = order.clone();

        let mut execution_log = Vec::new();
        let mut guard_violations = Vec::new();

        for phase in Phase::ORDERED {
            if phase.is_guard() {
                finalize_totals(&mut order);
            }

            for rule in pack.rules_for(phase) {
                if cancel.is_cancelled() {
                    debug!(rule_id = %rule.id, phase = %phase, "Run cancelled before rule");
                    return Err(EngineError::Cancelled);
                }

                let result = self.evaluate_rule(rule, &order);

                match &rule.output {
                    RuleOutput::Guard => {
                        if let Some(violation) = self.check_guard(rule, result) {
                            guard_violations.push(violation);
                        }
                    }
                    RuleOutput::Field(target) => {
                        let step = match result {
                            Ok(Value::Null) => {
                                debug!(rule_id = %rule.id, phase = %phase, "Rule produced null; skipped");
                                continue;
                            }
                            Ok(value) => match as_field_number(&value) {
                                Some(n) => {
                                    target.apply(&mut order, n);
                                    debug!(rule_id = %rule.id, phase = %phase, target = %target, value = n, "Rule applied");
                                    log_entry(phase, rule, StepAction::Compute, format!("Updated {}", target))
                                }
                                None => {
                                    let message = format!(
                                        "Result for {} is not a number (got {})",
                                        target,
                                        type_name(&value)
                                    );
                                    warn!(rule_id = %rule.id, phase = %phase, "{}", message);
                                    log_entry(phase, rule, StepAction::Failed, message)
                                }
                            },
                            Err(e) => {
                                warn!(rule_id = %rule.id, phase = %phase, error = %e, "Rule evaluation failed");
                                log_entry(phase, rule, StepAction::Failed, e.to_string())
                            }
                        };
                        execution_log.push(step);
                    }
                }
            }
        }

        Ok(PipelineOutcome {
            initial,
            order,
            execution_log,
            guard_violations,
        })
    }

    /// Evaluates one rule against `{"order": <snapshot>}`.
    fn evaluate_rule(&self, rule: &CompiledRule, order: &Order) -> EvalResult {
        let expr = rule.logic.as_ref().map_err(Clone::clone)?;
        let snapshot = serde_json::to_value(order).map_err(|e| EvalError::Context(e.to_string()))?;
        let data = json!({ "order": snapshot });
        self.evaluator.evaluate(expr, &EvalContext::new(&data))
    }

    fn check_guard(&self, rule: &CompiledRule, result: EvalResult) -> Option<GuardViolation> {
        match result {
            Ok(Value::Bool(true)) => {
                debug!(rule_id = %rule.id, "Guard fired");
                Some(GuardViolation {
                    rule_id: rule.id.clone(),
                    reason: GUARD_REASON.to_string(),
                    context: rule
                        .error_message
                        .clone()
                        .unwrap_or_else(|| self.default_guard_message.to_string()),
                })
            }
            Ok(_) => None,
            Err(e) => {
                warn!(rule_id = %rule.id, error = %e, "Guard evaluation failed; ignored");
                None
            }
        }
    }
}

fn log_entry(phase: Phase, rule: &CompiledRule, action: StepAction, message: String) -> ExecutionStep {
    ExecutionStep {
        phase,
        rule_id: rule.id.clone(),
        action,
        message,
    }
}

// =============================================================================
// Hydration & Finalization
// =============================================================================

/// Seeds derived fields before phase 0.
pub fn hydrate(order: &mut Order) {
    order.total_items = order.item_count();
    if order.base_value == 0.0 {
        order.base_value = order.items_value();
    }
}

/// Recomputes the total from base value and taxes, overriding any rule.
pub fn finalize_totals(order: &mut Order) {
    order.total_value = order.base_value + order.tax_total();
}

// =============================================================================
// Unit Tests
// =============================================================================

//! # Compiled Rule Packs
//!
//! Turns an authored [`RulePack`] into the immutable form the pipeline runs.
//!
//! ## Compilation
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  RulePack (JSON / YAML)                                                 │
//! │     │                                                                   │
//! │     ├── version empty / bad chars        → PackLoadError::InvalidPack   │
//! │     ├── rule id empty or duplicated      → PackLoadError::InvalidRule   │
//! │     ├── output_key not a writable field  → PackLoadError::InvalidRule   │
//! │     │   (guards excepted)                                               │
//! │     ├── unknown phase                    → warn!, rule never runs       │
//! │     └── logic does not parse             → kept; the rule fails at run  │
//! │                                            time with a `failed` entry   │
//! │     ▼                                                                   │
//! │  CompiledRulePack (shared as Arc, never mutated)                        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::collections::HashSet;

use tracing::warn;

use crate::error::{EvalError, PackLoadError};
use crate::expr::Expr;
use crate::target::OutputTarget;
use crate::types::{Phase, RulePack};
use crate::validation::{validate_rule_id, validate_version};

/// Where a rule's result goes.
#[derive(Debug, Clone, PartialEq)]
pub enum RuleOutput {
    /// Numeric result written to an Order field.
    Field(OutputTarget),
    /// Boolean result; `true` raises a guard violation.
    Guard,
}

/// A rule ready for execution.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledRule {
    pub id: String,
    pub phase: Phase,
    /// Parsed logic, or the parse error reported each time the rule runs.
    pub logic: Result<Expr, EvalError>,
    pub output: RuleOutput,
    pub error_message: Option<String>,
}

/// An immutable, validated rule pack.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledRulePack {
    pub version: String,
    pub description: String,
    rules: Vec<CompiledRule>,
    /// Ids of rules excluded because their phase is unknown.
    skipped: Vec<String>,
}

impl CompiledRulePack {
    /// Validates and compiles an authored pack.
    pub fn compile(pack: RulePack) -> Result<Self, PackLoadError> {
        let version = pack.version;
        validate_version(&version).map_err(|e| PackLoadError::InvalidPack {
            version: version.clone(),
            reason: e.to_string(),
        })?;

        let mut seen = HashSet::new();
        let mut rules = Vec::with_capacity(pack.rules.len());
        let mut skipped = Vec::new();

        for rule in pack.rules {
            let invalid = |reason: String| PackLoadError::InvalidRule {
                version: version.clone(),
                rule_id: rule.id.clone(),
                reason,
            };

            validate_rule_id(&rule.id).map_err(|e| invalid(e.to_string()))?;
            if !seen.insert(rule.id.clone()) {
                return Err(invalid("duplicate rule id".to_string()));
            }

            let phase = match rule.phase.parse::<Phase>() {
                Ok(phase) => phase,
                Err(_) => {
                    warn!(
                        version = %version,
                        rule_id = %rule.id,
                        phase = %rule.phase,
                        "Rule has an unknown phase and will never run"
                    );
                    skipped.push(rule.id);
                    continue;
                }
            };

            let output = if phase.is_guard() {
                RuleOutput::Guard
            } else {
                RuleOutput::Field(rule.output_key.parse::<OutputTarget>().map_err(&invalid)?)
            };

            let logic = Expr::parse(&rule.logic);
            if let Err(e) = &logic {
                warn!(
                    version = %version,
                    rule_id = %rule.id,
                    error = %e,
                    "Rule logic is malformed; the rule will fail when evaluated"
                );
            }

            rules.push(CompiledRule {
                id: rule.id,
                phase,
                logic,
                output,
                error_message: rule.error_message,
            });
        }

        Ok(CompiledRulePack {
            version,
            description: pack.description,
            rules,
            skipped,
        })
    }

    /// Rules of one phase, in pack order.
    pub fn rules_for(&self, phase: Phase) -> impl Iterator<Item = &CompiledRule> {
        self.rules.iter().filter(move |r| r.phase == phase)
    }

    /// All runnable rules, in pack order.
    pub fn rules(&self) -> &[CompiledRule] {
        &self.rules
    }

    /// Ids of rules that will never run.
    pub fn skipped(&self) -> &[String] {
        &self.skipped
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

impl TryFrom<RulePack> for CompiledRulePack {
    type Error = PackLoadError;

    fn try_from(pack: RulePack) -> Result<Self, Self::Error> {
        Self::compile(pack)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

//! # Engine
//!
//! The single entry point: `run_engine(context, order, version)`.
//!
//! ## Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  run_engine(ctx, &order, "1.0")                                         │
//! │     │                                                                   │
//! │     ├── normalize_version("1.0")          → "v1.0"                      │
//! │     ├── provider.load("v1.0")             → Arc<CompiledRulePack>       │
//! │     │        └── Err → EngineError::PackLoad (no result)                │
//! │     ├── working = order.clone()                                         │
//! │     │   working.rulesVersion = "v1.0"                                   │
//! │     ├── Pipeline::run(pack, working, ctx.cancellation)                  │
//! │     │        └── Err → EngineError::Cancelled (no result)               │
//! │     └── diff(initial, final)              → EngineResult                │
//! │           initial = hydrated, stamped snapshot before phase 0           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Hydration and the version stamp happen before the initial snapshot, so
//! the fragment only carries what rules and total finalization changed.
//!
//! The caller's order is only ever read. Concurrent runs can share one
//! `Engine` and one loaded pack.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::{debug, info, info_span, warn};

use crate::cancel::CancellationSignal;
use crate::diff::diff;
use crate::error::{EngineError, EvalResult, PackLoadError};
use crate::operators::OperatorRegistry;
use crate::pack::CompiledRulePack;
use crate::pipeline::Pipeline;
use crate::types::{EngineResult, Order};
use crate::DEFAULT_GUARD_MESSAGE;

// =============================================================================
// Rule Pack Provider
// =============================================================================

/// Source of compiled rule packs.
///
/// Implementations live outside the core (files, caches, in-memory maps).
/// `version` is always already normalized (`v` prefix).
pub trait RulePackProvider: Send + Sync {
    fn load(&self, version: &str) -> Result<Arc<CompiledRulePack>, PackLoadError>;
}

impl<T: RulePackProvider + ?Sized> RulePackProvider for Arc<T> {
    fn load(&self, version: &str) -> Result<Arc<CompiledRulePack>, PackLoadError> {
        (**self).load(version)
    }
}

impl<T: RulePackProvider + ?Sized> RulePackProvider for &T {
    fn load(&self, version: &str) -> Result<Arc<CompiledRulePack>, PackLoadError> {
        (**self).load(version)
    }
}

/// Ensures a `v` prefix: `"1.0"` → `"v1.0"`, `"v1.0"` unchanged.
pub fn normalize_version(version: &str) -> String {
    let trimmed = version.trim();
    if trimmed.starts_with('v') {
        trimmed.to_string()
    } else {
        format!("v{}", trimmed)
    }
}

// =============================================================================
// Run Context
// =============================================================================

/// Per-run metadata supplied by the caller.
#[derive(Debug, Clone)]
pub struct RunContext {
    pub correlation_id: String,
    /// Who asked for the run (service, user, CLI).
    pub requested_by: Option<String>,
    pub requested_at: DateTime<Utc>,
    pub cancellation: CancellationSignal,
}

impl RunContext {
    /// Context stamped with the current time and no cancellation.
    pub fn new(correlation_id: impl Into<String>) -> Self {
        RunContext {
            correlation_id: correlation_id.into(),
            requested_by: None,
            requested_at: Utc::now(),
            cancellation: CancellationSignal::never(),
        }
    }

    pub fn with_cancellation(mut self, signal: CancellationSignal) -> Self {
        self.cancellation = signal;
        self
    }

    pub fn requested_by(mut self, who: impl Into<String>) -> Self {
        self.requested_by = Some(who.into());
        self
    }
}

// =============================================================================
// Engine
// =============================================================================

/// Rule engine bound to a pack provider and an operator registry.
pub struct Engine<P> {
    provider: P,
    registry: Arc<OperatorRegistry>,
    default_guard_message: String,
}

impl<P: RulePackProvider> Engine<P> {
    /// Engine with the default operator registry.
    pub fn new(provider: P) -> Self {
        Self::with_registry(provider, Arc::new(OperatorRegistry::default()))
    }

    /// Engine sharing an existing registry.
    pub fn with_registry(provider: P, registry: Arc<OperatorRegistry>) -> Self {
        Engine {
            provider,
            registry,
            default_guard_message: DEFAULT_GUARD_MESSAGE.to_string(),
        }
    }

    /// Overrides the context message of guards without `error_message`.
    pub fn with_default_guard_message(mut self, message: impl Into<String>) -> Self {
        self.default_guard_message = message.into();
        self
    }

    /// Registers a native operator, shadowing any built-in of that name.
    ///
    /// If the registry is shared with other engines it is copied first, so
    /// they keep their own table.
    pub fn register_operator<F>(&mut self, name: impl Into<String>, f: F)
    where
        F: Fn(&[Value]) -> EvalResult + Send + Sync + 'static,
    {
        Arc::make_mut(&mut self.registry).register(name, f);
    }

    pub fn registry(&self) -> &OperatorRegistry {
        &self.registry
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    /// Prices `order` with the pack for `rules_version`.
    ///
    /// ## Errors
    /// - `EngineError::PackLoad` when the pack cannot be obtained
    /// - `EngineError::Cancelled` when `ctx.cancellation` fires mid-run
    pub fn run_engine(
        &self,
        ctx: &RunContext,
        order: &Order,
        rules_version: &str,
    ) -> Result<EngineResult, EngineError> {
        let version = normalize_version(rules_version);
        let span = info_span!(
            "run_engine",
            correlation_id = %ctx.correlation_id,
            order_id = %order.id,
            rules_version = %version,
            requested_by = ctx.requested_by.as_deref().unwrap_or("-"),
            requested_at = %ctx.requested_at.to_rfc3339()
        );
        let _guard = span.enter();

        let pack = self.provider.load(&version).map_err(|e| {
            warn!(error = %e, "Rule pack unavailable");
            e
        })?;
        debug!(rules = pack.len(), skipped = pack.skipped().len(), "Rule pack loaded");

        let mut working = order.clone();
        working.rules_version = version.clone();

        let outcome = Pipeline::new(&self.registry)
            .with_default_guard_message(&self.default_guard_message)
            .run(&pack, working, &ctx.cancellation)?;

        let state_fragment = diff(&outcome.initial, &outcome.order);
        let authoritative_change = !state_fragment.is_empty();

        info!(
            changed = state_fragment.len(),
            steps = outcome.execution_log.len(),
            guards_hit = outcome.guard_violations.len(),
            "Engine run complete"
        );

        Ok(EngineResult {
            state_fragment,
            authoritative_change,
            rules_version: version,
            execution_log: outcome.execution_log,
            guard_violations: outcome.guard_violations,
        })
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cancel::cancellation_pair;
    use crate::types::{Item, RulePack, StepAction};
    use serde_json::json;
    use std::collections::HashMap;

    struct MapProvider(HashMap<String, Arc<CompiledRulePack>>);

    impl RulePackProvider for MapProvider {
        fn load(&self, version: &str) -> Result<Arc<CompiledRulePack>, PackLoadError> {
            self.0
                .get(version)
                .cloned()
                .ok_or_else(|| PackLoadError::not_found(version))
        }
    }

    fn v1_pack() -> CompiledRulePack {
        let pack: RulePack = serde_json::from_value(json!({
            "version": "v1.0",
            "description": "Standard pricing",
            "rules": [
                {
                    "id": "base_discounted",
                    "phase": "orderAdjust",
                    "logic": {"*": [
                        {"sum": [{"foreach": [
                            {"var": "order.items"},
                            {"*": [{"var": "item.value"}, {"var": "item.qty"}]}
                        ]}]},
                        {"-": [1, {"var": "order.discountPercentage"}]}
                    ]},
                    "output_key": "order.baseValue"
                },
                {
                    "id": "vat",
                    "phase": "taxes",
                    "logic": {"round": [{"*": [{"var": "order.baseValue"}, 0.2]}, 2]},
                    "output_key": "order.appliedTaxes.VAT"
                },
                {
                    "id": "max_total",
                    "phase": "guards",
                    "logic": {">": [{"var": "order.totalValue"}, 5000]},
                    "error_message": "Order total exceeds limit"
                }
            ]
        }))
        .unwrap();
        CompiledRulePack::compile(pack).unwrap()
    }

    fn empty_pack() -> CompiledRulePack {
        let pack: RulePack = serde_json::from_value(json!({"version": "v0.1", "rules": []})).unwrap();
        CompiledRulePack::compile(pack).unwrap()
    }

    fn engine() -> Engine<MapProvider> {
        let mut packs = HashMap::new();
        packs.insert("v1.0".to_string(), Arc::new(v1_pack()));
        packs.insert("v0.1".to_string(), Arc::new(empty_pack()));
        Engine::new(MapProvider(packs))
    }

    /// Items and discount only; derived fields are left for the engine.
    fn order() -> Order {
        Order {
            items: vec![Item::new("A", 500.0, 2)],
            discount_percentage: 0.1,
            ..Default::default()
        }
    }

    #[test]
    fn test_normalize_version() {
        assert_eq!(normalize_version("1.0"), "v1.0");
        assert_eq!(normalize_version("v1.0"), "v1.0");
        assert_eq!(normalize_version(" 2 "), "v2");
    }

    #[test]
    fn test_end_to_end() {
        let result = engine()
            .run_engine(&RunContext::new("c-1"), &order(), "1.0")
            .unwrap();

        let keys: Vec<&str> = result.state_fragment.keys().map(String::as_str).collect();
        assert_eq!(keys, ["appliedTaxes.VAT", "baseValue", "totalValue"]);
        assert_eq!(result.state_fragment.len(), 3);
        assert_eq!(result.state_fragment["baseValue"], json!(900.0));
        assert_eq!(result.state_fragment["appliedTaxes.VAT"], json!(180.0));
        assert_eq!(result.state_fragment["totalValue"], json!(1080.0));
        assert!(result.authoritative_change);
        assert_eq!(result.rules_version, "v1.0");
        assert!(result.guard_violations.is_empty());

        let steps: Vec<(&str, StepAction)> = result
            .execution_log
            .iter()
            .map(|s| (s.rule_id.as_str(), s.action))
            .collect();
        assert_eq!(
            steps,
            [("base_discounted", StepAction::Compute), ("vat", StepAction::Compute)]
        );
    }

    #[test]
    fn test_caller_order_untouched() {
        let submitted = order();
        let copy = submitted.clone();
        engine()
            .run_engine(&RunContext::new("c-1"), &submitted, "v1.0")
            .unwrap();
        assert_eq!(submitted, copy);
    }

    #[test]
    fn test_deterministic_runs() {
        let engine = engine();
        let ctx = RunContext::new("c-1");
        let first = engine.run_engine(&ctx, &order(), "v1.0").unwrap();
        let second = engine.run_engine(&ctx, &order(), "v1.0").unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_missing_pack_is_fatal() {
        let err = engine()
            .run_engine(&RunContext::new("c-1"), &order(), "9.9")
            .unwrap_err();
        assert_eq!(err, EngineError::PackLoad(PackLoadError::not_found("v9.9")));
    }

    #[test]
    fn test_guard_blocks_large_order() {
        let mut big = order();
        big.items = vec![Item::new("A", 5000.0, 2)];
        let result = engine()
            .run_engine(&RunContext::new("c-1"), &big, "v1.0")
            .unwrap();
        assert!(result.is_blocked());
        assert_eq!(result.guard_violations[0].rule_id, "max_total");
        assert_eq!(result.guard_violations[0].context, "Order total exceeds limit");
    }

    #[test]
    fn test_bookkeeping_fields_stay_out_of_fragment() {
        let result = engine()
            .run_engine(&RunContext::new("c-1"), &order(), "v1.0")
            .unwrap();
        assert!(!result.state_fragment.contains_key("rulesVersion"));
        assert!(!result.state_fragment.contains_key("totalItems"));
        assert_eq!(result.rules_version, "v1.0");
    }

    #[test]
    fn test_empty_pack_over_consistent_order_is_unchanged() {
        let consistent = Order {
            base_value: 1000.0,
            total_value: 1000.0,
            ..Default::default()
        };
        let result = engine()
            .run_engine(&RunContext::new("c-1"), &consistent, "0.1")
            .unwrap();
        assert!(result.state_fragment.is_empty());
        assert!(!result.authoritative_change);
        assert!(result.execution_log.is_empty());
    }

    #[test]
    fn test_requested_by_recorded_on_context() {
        let ctx = RunContext::new("c-1").requested_by("checkout");
        assert_eq!(ctx.requested_by.as_deref(), Some("checkout"));
        assert!(engine().run_engine(&ctx, &order(), "v1.0").is_ok());
    }

    #[test]
    fn test_register_operator_shadows_round() {
        let mut engine = engine();
        engine.register_operator("round", |_| Ok(json!(1.0)));
        let result = engine
            .run_engine(&RunContext::new("c-1"), &order(), "v1.0")
            .unwrap();
        assert_eq!(result.state_fragment["appliedTaxes.VAT"], json!(1.0));
    }

    #[test]
    fn test_register_operator_copies_shared_registry() {
        let shared = Arc::new(OperatorRegistry::default());
        let mut engine = Engine::with_registry(MapProvider(HashMap::new()), shared.clone());
        engine.register_operator("double", |_| Ok(json!(2)));

        assert!(engine.registry().contains("double"));
        assert!(!shared.contains("double"));
    }

    #[test]
    fn test_cancelled_run_returns_no_result() {
        let (handle, signal) = cancellation_pair();
        handle.cancel();
        let ctx = RunContext::new("c-1").with_cancellation(signal);

        let submitted = order();
        let err = engine().run_engine(&ctx, &submitted, "v1.0").unwrap_err();
        assert_eq!(err, EngineError::Cancelled);
        assert_eq!(submitted, order());
    }

    #[test]
    fn test_concurrent_runs_share_engine() {
        let engine = Arc::new(engine());
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let engine = Arc::clone(&engine);
                std::thread::spawn(move || {
                    engine
                        .run_engine(&RunContext::new("c"), &order(), "v1.0")
                        .unwrap()
                })
            })
            .collect();

        let results: Vec<EngineResult> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert!(results.windows(2).all(|w| w[0] == w[1]));
    }
}

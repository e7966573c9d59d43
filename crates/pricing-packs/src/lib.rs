//! # pricing-packs: Rule-Pack Providers and Run Caches
//!
//! Everything the engine needs from outside its pure core: rule packs read
//! from disk, a cache that keeps compiled packs between runs, and an
//! idempotency store for retried requests.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Rule-Pack Data Flow                              │
//! │                                                                         │
//! │  Engine::run_engine(ctx, order, "v1.0")                                 │
//! │       │ RulePackProvider::load("v1.0")                                  │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                 pricing-packs (THIS CRATE)                      │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────────┐     ┌───────────────────┐               │   │
//! │  │   │ CachedRulePack-   │────►│ FileRulePack-     │──► rules/     │   │
//! │  │   │ Provider (RwLock) │     │ Provider          │   v1.0_rules  │   │
//! │  │   └───────────────────┘     └───────────────────┘     .json     │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────────┐     ┌───────────────────┐               │   │
//! │  │   │ InMemoryRulePack- │     │ IdempotencyStore  │               │   │
//! │  │   │ Provider          │     │ key → EngineResult│               │   │
//! │  │   └───────────────────┘     └───────────────────┘               │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`file`] - `<dir>/<version>_rules.{json,yaml,yml}` loader
//! - [`cache`] - Read-mostly compiled-pack cache
//! - [`memory`] - In-process packs
//! - [`idempotency`] - Idempotency-key result store
//! - [`error`] - Pack store error types
//!
//! ## Usage
//!
//! ```rust,no_run
//! use pricing_core::{Engine, Order, RunContext};
//! use pricing_packs::{CachedRulePackProvider, FileRulePackProvider};
//!
//! let provider = CachedRulePackProvider::new(FileRulePackProvider::new("rules"));
//! let engine = Engine::new(provider);
//! let result = engine.run_engine(&RunContext::new("req-1"), &Order::default(), "1.0");
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod cache;
pub mod error;
pub mod file;
pub mod idempotency;
pub mod memory;

// =============================================================================
// Re-exports
// =============================================================================

pub use cache::CachedRulePackProvider;
pub use error::{PackStoreError, PackStoreResult};
pub use file::{read_pack_file, FileRulePackProvider};
pub use idempotency::{IdempotencyEntry, IdempotencyStore};
pub use memory::InMemoryRulePackProvider;
